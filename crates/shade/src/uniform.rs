//! Host-owned uniform values.
//!
//! Graph structure never changes after setup; what changes each frame is the
//! contents of a [`UniformSet`]. The host writes it during an explicit update
//! phase and then hands it, immutably, to evaluation.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::field::{Field, FieldType};

/// Elapsed time in seconds.
pub const TIME: &str = "time";
/// Camera eye height along the up axis.
pub const CAMERA_HEIGHT: &str = "camera_height";
/// Height of the water plane along the up axis.
pub const WATER_HEIGHT: &str = "water_height";
pub const CAMERA_NEAR: &str = "camera_near";
pub const CAMERA_FAR: &str = "camera_far";
/// Authoritative underwater classification for the frame.
pub const UNDERWATER: &str = "underwater";
/// Smoothed underwater overlay opacity in `[0, 0.95]`.
pub const OVERLAY_OPACITY: &str = "overlay_opacity";

/// A concrete per-fragment or per-frame value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Scalar(f32),
    Vector3(Vec3),
    Boolean(bool),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Scalar(_) => FieldType::Scalar,
            Value::Vector3(_) => FieldType::Vector3,
            Value::Boolean(_) => FieldType::Boolean,
        }
    }

    /// Scalar view; vectors collapse to their x component.
    pub fn as_scalar(&self) -> f32 {
        match *self {
            Value::Scalar(s) => s,
            Value::Vector3(v) => v.x,
            Value::Boolean(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Vector view; scalars are splatted.
    pub fn as_vector(&self) -> Vec3 {
        match *self {
            Value::Vector3(v) => v,
            other => Vec3::splat(other.as_scalar()),
        }
    }

    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Boolean(b) => b,
            other => other.as_scalar() != 0.0,
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Scalar(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value as f32)
    }
}

impl From<Vec3> for Value {
    fn from(value: Vec3) -> Self {
        Value::Vector3(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

/// Named uniform values for one frame.
///
/// The first value written under a name fixes that uniform's type; later
/// writes of a different type are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniformSet {
    values: BTreeMap<String, Value>,
}

impl UniformSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), GraphError> {
        let value = value.into();
        match self.values.get_mut(name) {
            Some(existing) if existing.field_type() != value.field_type() => {
                Err(GraphError::UniformValueType {
                    name: name.to_string(),
                    expected: existing.field_type(),
                    actual: value.field_type(),
                })
            }
            Some(existing) => {
                *existing = value;
                Ok(())
            }
            None => {
                self.values.insert(name.to_string(), value);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Field reading the [`TIME`] uniform.
pub fn time() -> Field {
    Field::uniform(TIME, FieldType::Scalar)
}

pub fn camera_height() -> Field {
    Field::uniform(CAMERA_HEIGHT, FieldType::Scalar)
}

pub fn water_height() -> Field {
    Field::uniform(WATER_HEIGHT, FieldType::Scalar)
}

pub fn camera_near() -> Field {
    Field::uniform(CAMERA_NEAR, FieldType::Scalar)
}

pub fn camera_far() -> Field {
    Field::uniform(CAMERA_FAR, FieldType::Scalar)
}

pub fn underwater() -> Field {
    Field::uniform(UNDERWATER, FieldType::Boolean)
}

pub fn overlay_opacity() -> Field {
    Field::uniform(OVERLAY_OPACITY, FieldType::Scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_overwrite_same_type() {
        let mut u = UniformSet::new();
        u.set(TIME, 1.0).unwrap();
        u.set(TIME, 2.0).unwrap();
        assert_eq!(u.get(TIME), Some(Value::Scalar(2.0)));
        assert_eq!(u.len(), 1);
    }

    #[test]
    fn type_change_is_rejected() {
        let mut u = UniformSet::new();
        u.set(UNDERWATER, false).unwrap();
        let err = u.set(UNDERWATER, 1.0).unwrap_err();
        assert!(matches!(err, GraphError::UniformValueType { .. }));
        assert_eq!(u.get(UNDERWATER), Some(Value::Boolean(false)));
    }

    #[test]
    fn value_views_broadcast() {
        assert_eq!(Value::Scalar(0.5).as_vector(), Vec3::splat(0.5));
        assert_eq!(Value::Vector3(Vec3::new(3.0, 1.0, 2.0)).as_scalar(), 3.0);
        assert!(Value::Scalar(2.0).as_bool());
        assert!(!Value::Boolean(false).as_bool());
    }

    #[test]
    fn uniform_set_round_trips_through_json() {
        let mut u = UniformSet::new();
        u.set(WATER_HEIGHT, 0.25).unwrap();
        u.set("tint", Vec3::new(0.1, 0.2, 0.3)).unwrap();
        let json = serde_json::to_string(&u).unwrap();
        let back: UniformSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("tint"), u.get("tint"));
        assert_eq!(back.get(WATER_HEIGHT), Some(Value::Scalar(0.25)));
    }
}
