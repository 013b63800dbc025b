use glam::Vec3;
use tidewater_assets::Shape;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    pub normal: Vec3,
}

/// Nearest intersection in front of `origin`; `dir` must be normalized.
pub fn intersect(shape: &Shape, origin: Vec3, dir: Vec3) -> Option<Hit> {
    match *shape {
        Shape::Ground { height } => {
            if dir.y.abs() <= f32::EPSILON {
                return None;
            }
            let t = (height - origin.y) / dir.y;
            let normal = if origin.y >= height { Vec3::Y } else { Vec3::NEG_Y };
            (t > 0.0).then_some(Hit { t, normal })
        }
        Shape::Sphere { center, radius } => {
            let oc = origin - center;
            let b = oc.dot(dir);
            let c = oc.length_squared() - radius * radius;
            let disc = b * b - c;
            if disc < 0.0 {
                return None;
            }
            let root = disc.sqrt();
            let t = [-b - root, -b + root].into_iter().find(|t| *t > 0.0)?;
            let normal = (origin + dir * t - center) / radius;
            Some(Hit { t, normal })
        }
        Shape::Box {
            center,
            half_extents,
        } => {
            let inv = dir.recip();
            let t0 = (center - half_extents - origin) * inv;
            let t1 = (center + half_extents - origin) * inv;
            let near = t0.min(t1);
            let far = t0.max(t1);
            let enter = near.max_element();
            let exit = far.min_element();
            // Rays starting inside the box see nothing.
            if !(enter <= exit) || enter <= 0.0 {
                return None;
            }
            let axis = if enter == near.x {
                Vec3::X
            } else if enter == near.y {
                Vec3::Y
            } else {
                Vec3::Z
            };
            let normal = -axis * dir.dot(axis).signum();
            Some(Hit { t: enter, normal })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_is_hit_from_either_side() {
        let ground = Shape::Ground { height: -2.0 };
        let hit = intersect(&ground, Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y).unwrap();
        assert_eq!(hit.t, 5.0);
        assert_eq!(hit.normal, Vec3::Y);
        let hit = intersect(&ground, Vec3::new(0.0, -3.0, 0.0), Vec3::Y).unwrap();
        assert_eq!(hit.normal, Vec3::NEG_Y);
        assert!(intersect(&ground, Vec3::new(0.0, 3.0, 0.0), Vec3::X).is_none());
        assert!(intersect(&ground, Vec3::new(0.0, 3.0, 0.0), Vec3::Y).is_none());
    }

    #[test]
    fn sphere_hit_and_miss() {
        let sphere = Shape::Sphere {
            center: Vec3::new(0.0, 0.0, -5.0),
            radius: 1.0,
        };
        let hit = intersect(&sphere, Vec3::ZERO, Vec3::NEG_Z).unwrap();
        assert!((hit.t - 4.0).abs() < 1e-5);
        assert!(hit.normal.abs_diff_eq(Vec3::Z, 1e-5));
        assert!(intersect(&sphere, Vec3::ZERO, Vec3::Z).is_none());
        assert!(intersect(&sphere, Vec3::new(3.0, 0.0, 0.0), Vec3::NEG_Z).is_none());
    }

    #[test]
    fn box_faces_report_outward_normals() {
        let cube = Shape::Box {
            center: Vec3::ZERO,
            half_extents: Vec3::ONE,
        };
        let top = intersect(&cube, Vec3::new(0.2, 5.0, 0.3), Vec3::NEG_Y).unwrap();
        assert_eq!(top.t, 4.0);
        assert_eq!(top.normal, Vec3::Y);
        let side = intersect(&cube, Vec3::new(-4.0, 0.0, 0.0), Vec3::X).unwrap();
        assert_eq!(side.t, 3.0);
        assert_eq!(side.normal, Vec3::NEG_X);
        assert!(intersect(&cube, Vec3::ZERO, Vec3::X).is_none());
        assert!(intersect(&cube, Vec3::new(0.0, 5.0, 0.0), Vec3::Y).is_none());
    }
}
