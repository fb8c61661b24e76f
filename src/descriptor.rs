/*!

Descriptors say what a property is: its type tag and the attributes a decoder needs to read it
off the wire (bit width, value range, flags, and for arrays the element descriptor).

Descriptors are built once, usually from a `DescriptorTable`, and then shared read-only through
`Arc<PropertyInfo>` by every property created from them.

*/

use std::fmt::{self, Display};
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap as HashMap;
use serde::{Deserialize, Serialize};

use crate::error::PropertyError;
use crate::property::Property;

/// The closed set of property types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// Unsigned 32-bit integer.
    Int,
    Float,
    /// Three component vector.
    Vector,
    /// Two component vector.
    VectorXy,
    String,
    /// Ordered sequence of nested properties.
    Array,
    /// Unsigned 64-bit integer.
    Int64,
}

impl PropertyType {
    pub const ALL: [PropertyType; 7] = [
        PropertyType::Int,
        PropertyType::Float,
        PropertyType::Vector,
        PropertyType::VectorXy,
        PropertyType::String,
        PropertyType::Array,
        PropertyType::Int64,
    ];

    /// The numeric tag this type has on the wire and in descriptor tables.
    #[must_use]
    pub fn tag(self) -> u32 {
        match self {
            PropertyType::Int => 0,
            PropertyType::Float => 1,
            PropertyType::Vector => 2,
            PropertyType::VectorXy => 3,
            PropertyType::String => 4,
            PropertyType::Array => 5,
            PropertyType::Int64 => 6,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PropertyType::Int => "Int",
            PropertyType::Float => "Float",
            PropertyType::Vector => "Vector",
            PropertyType::VectorXy => "VectorXy",
            PropertyType::String => "String",
            PropertyType::Array => "Array",
            PropertyType::Int64 => "Int64",
        }
    }
}

impl TryFrom<u32> for PropertyType {
    type Error = PropertyError;

    fn try_from(tag: u32) -> Result<Self, Self::Error> {
        PropertyType::ALL
            .into_iter()
            .find(|property_type| property_type.tag() == tag)
            .ok_or(PropertyError::UnknownPropertyType(tag))
    }
}

impl Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encoding flags carried by a descriptor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyFlags(u32);

impl PropertyFlags {
    pub const NONE: PropertyFlags = PropertyFlags(0);
    /// Integers are not sign extended.
    pub const UNSIGNED: PropertyFlags = PropertyFlags(1 << 0);
    /// Floats use the world coordinate encoding.
    pub const COORD: PropertyFlags = PropertyFlags(1 << 1);
    /// Floats are raw IEEE-754 bits.
    pub const NO_SCALE: PropertyFlags = PropertyFlags(1 << 2);
    /// Floats are in `[-1, 1]`; vectors are unit length with an implied z.
    pub const NORMAL: PropertyFlags = PropertyFlags(1 << 5);
    /// Integers are variable-length encoded.
    pub const VARINT: PropertyFlags = PropertyFlags(1 << 19);

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        PropertyFlags(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: PropertyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: PropertyFlags) -> Self {
        PropertyFlags(self.0 | other.0)
    }
}

impl std::ops::BitOr for PropertyFlags {
    type Output = PropertyFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// The descriptor of a single property.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyInfo {
    name: String,
    property_type: PropertyType,
    flags: PropertyFlags,
    num_bits: u32,
    low_value: f32,
    high_value: f32,
    num_elements: u32,
    array_element: Option<Arc<PropertyInfo>>,
}

impl PropertyInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            flags: PropertyFlags::NONE,
            num_bits: 32,
            low_value: 0.0,
            high_value: 1.0,
            num_elements: 0,
            array_element: None,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_bits(mut self, num_bits: u32) -> Self {
        self.num_bits = num_bits;
        self
    }

    /// Sets the range quantized floats are scaled into.
    #[must_use]
    pub fn with_range(mut self, low_value: f32, high_value: f32) -> Self {
        self.low_value = low_value;
        self.high_value = high_value;
        self
    }

    /// Sets the maximum element count and the descriptor shared by every element of an array.
    #[must_use]
    pub fn with_elements(mut self, num_elements: u32, element: Arc<PropertyInfo>) -> Self {
        self.num_elements = num_elements;
        self.array_element = Some(element);
        self
    }

    /// Wraps the descriptor for sharing between properties.
    #[must_use]
    pub fn shared(self) -> Arc<PropertyInfo> {
        Arc::new(self)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    #[must_use]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    #[must_use]
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    #[must_use]
    pub fn low_value(&self) -> f32 {
        self.low_value
    }

    #[must_use]
    pub fn high_value(&self) -> f32 {
        self.high_value
    }

    #[must_use]
    pub fn num_elements(&self) -> u32 {
        self.num_elements
    }

    #[must_use]
    pub fn array_element(&self) -> Option<&Arc<PropertyInfo>> {
        self.array_element.as_ref()
    }
}

/// The on-disk form of a descriptor. The type is a raw tag so that unknown tags surface as
/// `PropertyError::UnknownPropertyType` rather than as a JSON error.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPropertyInfo {
    name: String,
    #[serde(rename = "type")]
    type_tag: u32,
    #[serde(default)]
    flags: PropertyFlags,
    #[serde(default = "default_num_bits")]
    num_bits: u32,
    #[serde(default)]
    low_value: f32,
    #[serde(default = "default_high_value")]
    high_value: f32,
    #[serde(default)]
    num_elements: u32,
    #[serde(default)]
    element: Option<Box<RawPropertyInfo>>,
}

fn default_num_bits() -> u32 {
    32
}

fn default_high_value() -> f32 {
    1.0
}

impl TryFrom<RawPropertyInfo> for PropertyInfo {
    type Error = PropertyError;

    fn try_from(raw: RawPropertyInfo) -> Result<Self, Self::Error> {
        let property_type = PropertyType::try_from(raw.type_tag)?;
        let array_element = match raw.element {
            Some(element) => Some(Arc::new(PropertyInfo::try_from(*element)?)),
            None => None,
        };
        if property_type == PropertyType::Array && array_element.is_none() {
            return Err(PropertyError::MissingArrayElement(raw.name));
        }
        Ok(PropertyInfo {
            name: raw.name,
            property_type,
            flags: raw.flags,
            num_bits: raw.num_bits,
            low_value: raw.low_value,
            high_value: raw.high_value,
            num_elements: raw.num_elements,
            array_element,
        })
    }
}

/// The set of descriptors known to a decoder, addressable by name.
#[derive(Debug, Default, Clone)]
pub struct DescriptorTable {
    descriptors: Vec<Arc<PropertyInfo>>,
    by_name: HashMap<String, usize>,
}

impl DescriptorTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor. Names must be unique within a table.
    pub fn insert(&mut self, info: PropertyInfo) -> Result<Arc<PropertyInfo>, PropertyError> {
        if self.by_name.contains_key(info.name()) {
            return Err(PropertyError::PropertyError(format!(
                "duplicate descriptor `{}`",
                info.name()
            )));
        }
        let info = Arc::new(info);
        self.by_name
            .insert(info.name().to_string(), self.descriptors.len());
        self.descriptors.push(Arc::clone(&info));
        Ok(info)
    }

    /// Parses a JSON array of descriptors.
    pub fn from_json_str(json: &str) -> Result<Self, PropertyError> {
        let raw: Vec<RawPropertyInfo> = serde_json::from_str(json)?;
        let mut table = DescriptorTable::new();
        for entry in raw {
            table.insert(PropertyInfo::try_from(entry)?)?;
        }
        Ok(table)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, PropertyError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<PropertyInfo>> {
        self.by_name.get(name).map(|index| &self.descriptors[*index])
    }

    /// Creates a fresh property for the named descriptor.
    pub fn instantiate(&self, name: &str) -> Result<Property, PropertyError> {
        self.get(name)
            .map(|info| Property::new(Arc::clone(info)))
            .ok_or_else(|| PropertyError::PropertyError(format!("no descriptor named `{name}`")))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterates descriptors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PropertyInfo>> {
        self.descriptors.iter()
    }
}
