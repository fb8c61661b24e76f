//! Payload types carried by properties.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::descriptor::PropertyType;
use crate::property::Property;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector {
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorXy {
    pub x: f32,
    pub y: f32,
}

impl VectorXy {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl Display for VectorXy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The decoded payload of a property. The variant is chosen from the descriptor's type when the
/// property is created and never changes afterwards.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Int(u32),
    Float(f32),
    Vector(Vector),
    VectorXy(VectorXy),
    String(String),
    Array(Vec<Property>),
    Int64(u64),
}

impl PropertyValue {
    /// The default payload for a property of the given type.
    #[must_use]
    pub fn default_for(property_type: PropertyType) -> Self {
        match property_type {
            PropertyType::Int => PropertyValue::Int(0),
            PropertyType::Float => PropertyValue::Float(0.0),
            PropertyType::Vector => PropertyValue::Vector(Vector::default()),
            PropertyType::VectorXy => PropertyValue::VectorXy(VectorXy::default()),
            PropertyType::String => PropertyValue::String(String::new()),
            PropertyType::Array => PropertyValue::Array(Vec::new()),
            PropertyType::Int64 => PropertyValue::Int64(0),
        }
    }

    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Vector(_) => PropertyType::Vector,
            PropertyValue::VectorXy(_) => PropertyType::VectorXy,
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Array(_) => PropertyType::Array,
            PropertyValue::Int64(_) => PropertyType::Int64,
        }
    }
}

impl Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PropertyValue::Int(value) => write!(f, "{value}"),
            PropertyValue::Float(value) => write!(f, "{value}"),
            PropertyValue::Vector(value) => write!(f, "{value}"),
            PropertyValue::VectorXy(value) => write!(f, "{value}"),
            PropertyValue::String(value) => f.write_str(value),
            PropertyValue::Int64(value) => write!(f, "{value}"),
            PropertyValue::Array(children) => {
                f.write_str("[")?;
                for (index, child) in children.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", child.value())?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A Rust type that one of the `PropertyValue` variants holds. Used for typed reads.
pub trait PropertyKind: Sized {
    const PROPERTY_TYPE: PropertyType;

    /// Borrows the payload if `value` is the variant for `Self`.
    fn from_value(value: &PropertyValue) -> Option<&Self>;
}

macro_rules! impl_property_kind {
    ($ty:ty, $variant:ident) => {
        impl PropertyKind for $ty {
            const PROPERTY_TYPE: PropertyType = PropertyType::$variant;

            fn from_value(value: &PropertyValue) -> Option<&Self> {
                match value {
                    PropertyValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_property_kind!(u32, Int);
impl_property_kind!(f32, Float);
impl_property_kind!(Vector, Vector);
impl_property_kind!(VectorXy, VectorXy);
impl_property_kind!(String, String);
impl_property_kind!(Vec<Property>, Array);
impl_property_kind!(u64, Int64);
