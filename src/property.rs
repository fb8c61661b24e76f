/*!

A `Property` is one replicated value: a shared descriptor, a typed payload, and the tick at which
the payload was last decoded.

- Created from a descriptor with `Property::new`, holding the default payload for the
  descriptor's type and no `updated_at`.
- Mutated in place, and only by `Property::update`, which asks a `PropertyValueUnpacker` to decode
  the next value from a `Bitstream` and then stamps the tick.
- Cloned to take a snapshot. Clones are deep: an array clones every child, so a snapshot never
  observes later updates to the original, or the other way round.

For array properties the unpacker is handed the live child sequence for the duration of one
`update` call and decides how many children exist and which are created, updated, or dropped.

*/

use std::fmt::{self, Display};
use std::sync::Arc;

use log::{debug, trace};

use crate::bitstream::Bitstream;
use crate::descriptor::{PropertyInfo, PropertyType};
use crate::error::PropertyError;
use crate::unpacker::PropertyValueUnpacker;
use crate::value::{PropertyKind, PropertyValue};

/// A discrete update step of the replicated simulation.
pub type Tick = u32;

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    info: Arc<PropertyInfo>,
    value: PropertyValue,
    /// `None` until the first successful decode.
    updated_at: Option<Tick>,
}

impl Property {
    /// Creates a default-valued property of the type declared by `info`.
    #[must_use]
    pub fn new(info: Arc<PropertyInfo>) -> Self {
        let value = PropertyValue::default_for(info.property_type());
        Self {
            info,
            value,
            updated_at: None,
        }
    }

    #[must_use]
    pub fn info(&self) -> &Arc<PropertyInfo> {
        &self.info
    }

    #[must_use]
    pub fn property_type(&self) -> PropertyType {
        self.value.property_type()
    }

    /// The tick of the most recent successful decode.
    #[must_use]
    pub fn updated_at(&self) -> Option<Tick> {
        self.updated_at
    }

    /// Whether the property has been decoded at least once.
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        self.updated_at.is_some()
    }

    #[must_use]
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Returns the payload as a `T`.
    ///
    /// Panics if `T` is not the payload type of this property. The type is fixed by the
    /// descriptor, so a mismatch is a bug in the caller. Use [`Property::try_value_as`] to probe.
    #[must_use]
    pub fn value_as<T: PropertyKind>(&self) -> &T {
        match T::from_value(&self.value) {
            Some(value) => value,
            None => panic!(
                "property `{}` has type {} but was read as {}",
                self.info.name(),
                self.property_type(),
                T::PROPERTY_TYPE
            ),
        }
    }

    /// Returns the payload as a `T`, or `None` if `T` is not the payload type.
    #[must_use]
    pub fn try_value_as<T: PropertyKind>(&self) -> Option<&T> {
        T::from_value(&self.value)
    }

    /// The child properties of an array, or `None` for any other type.
    #[must_use]
    pub fn children(&self) -> Option<&[Property]> {
        match &self.value {
            PropertyValue::Array(children) => Some(children),
            _ => None,
        }
    }

    /// Decodes the value for `tick` from `stream` and records `tick` as `updated_at`.
    ///
    /// Scalar, vector and string payloads are replaced only if decoding succeeds. Array payloads
    /// are reconciled in place by the unpacker. Either way `updated_at` is left untouched when an
    /// error is returned, and the caller must treat the tick as not applied.
    pub fn update<U>(
        &mut self,
        tick: Tick,
        unpacker: &U,
        stream: &mut Bitstream,
    ) -> Result<(), PropertyError>
    where
        U: PropertyValueUnpacker + ?Sized,
    {
        let info = &self.info;
        let result = match &mut self.value {
            PropertyValue::Int(value) => unpacker.unpack_int(info, stream).map(|v| *value = v),
            PropertyValue::Float(value) => unpacker.unpack_float(info, stream).map(|v| *value = v),
            PropertyValue::Vector(value) => {
                unpacker.unpack_vector(info, stream).map(|v| *value = v)
            }
            PropertyValue::VectorXy(value) => {
                unpacker.unpack_vector_xy(info, stream).map(|v| *value = v)
            }
            PropertyValue::String(value) => {
                unpacker.unpack_string(info, stream).map(|v| *value = v)
            }
            PropertyValue::Int64(value) => unpacker.unpack_int64(info, stream).map(|v| *value = v),
            PropertyValue::Array(children) => unpacker.unpack_array(tick, children, info, stream),
        };

        match result {
            Ok(()) => {
                trace!("decoded `{}` at tick {tick}: {}", self.info.name(), self.value);
                self.updated_at = Some(tick);
                Ok(())
            }
            Err(error) => {
                debug!("failed to decode `{}` at tick {tick}: {error}", self.info.name());
                Err(error)
            }
        }
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
