use glam::Vec3;
use tidewater_common::Viewport;

/// One presented frame, 8-bit sRGB RGBA, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
}

fn encode(linear: f32) -> u8 {
    let c = if linear.is_finite() { linear.clamp(0.0, 1.0) } else { 0.0 };
    let srgb = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (srgb * 255.0).round() as u8
}

impl Image {
    /// Encode linear colors; missing pixels are black.
    pub fn from_linear(viewport: Viewport, colors: &[Vec3]) -> Self {
        let pixels = (0..viewport.pixel_count())
            .map(|i| {
                let c = colors.get(i).copied().unwrap_or(Vec3::ZERO);
                [encode(c.x), encode(c.y), encode(c.z), 255]
            })
            .collect();
        Self {
            width: viewport.width,
            height: viewport.height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }

    /// Mean of each channel over the whole image, in `[0, 255]`.
    pub fn average_color(&self) -> Vec3 {
        if self.pixels.is_empty() {
            return Vec3::ZERO;
        }
        let sum = self.pixels.iter().fold(Vec3::ZERO, |acc, p| {
            acc + Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32)
        });
        sum / self.pixels.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_srgb_and_clamps() {
        let image = Image::from_linear(
            Viewport::new(3, 1),
            &[Vec3::ZERO, Vec3::ONE, Vec3::new(2.0, -1.0, f32::NAN)],
        );
        assert_eq!(image.pixel(0, 0), Some([0, 0, 0, 255]));
        assert_eq!(image.pixel(1, 0), Some([255, 255, 255, 255]));
        assert_eq!(image.pixel(2, 0), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(3, 0), None);
        assert_eq!(image.to_rgba8().len(), 12);
    }

    #[test]
    fn mid_grey_is_brightened() {
        let image = Image::from_linear(Viewport::new(1, 1), &[Vec3::splat(0.5)]);
        assert_eq!(image.pixels[0][0], 188);
    }

    #[test]
    fn short_input_pads_black() {
        let image = Image::from_linear(Viewport::new(2, 2), &[Vec3::ONE]);
        assert_eq!(image.pixels.len(), 4);
        assert_eq!(image.average_color(), Vec3::splat(255.0 / 4.0));
    }
}
