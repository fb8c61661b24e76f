//! Typed, versioned property values for replicated game state
//!
//! A replay or a live game stream describes the state of every entity as a set of *properties*,
//! each with a declared type, and sends compact bit-packed updates for them tick by tick. This
//! crate is the value model those updates are decoded into:
//! * [`PropertyInfo`] describes a property: its [`PropertyType`] and the attributes a decoder
//!   needs (bit width, range, flags, element descriptor for arrays). Descriptors are usually
//!   loaded into a [`DescriptorTable`].
//! * [`Property`] holds the current value of one property and the tick it was last decoded at.
//!   Arrays hold child properties, each versioned on its own.
//! * [`PropertyValueUnpacker`] is the decoder a property asks to read its next value from a
//!   [`Bitstream`]. [`DefaultUnpacker`] implements the replay wire format.
//!
//! ```rust
//! use tickprop::{BitWriter, Bitstream, DefaultUnpacker, Property, PropertyFlags, PropertyInfo,
//!     PropertyType, Vector};
//!
//! let info = PropertyInfo::new("m_vecOrigin", PropertyType::Vector)
//!     .with_flags(PropertyFlags::NO_SCALE)
//!     .shared();
//! let mut origin = Property::new(info);
//!
//! let mut writer = BitWriter::new();
//! for component in [1.0f32, 2.0, 3.0] {
//!     writer.write_bits(component.to_bits(), 32);
//! }
//! let bytes = writer.into_bytes();
//!
//! origin.update(5, &DefaultUnpacker::new(), &mut Bitstream::new(&bytes)).unwrap();
//! assert_eq!(*origin.value_as::<Vector>(), Vector::new(1.0, 2.0, 3.0));
//! assert_eq!(origin.updated_at(), Some(5));
//!
//! // Snapshots are plain clones and never see later updates.
//! let snapshot = origin.clone();
//! assert_eq!(snapshot.updated_at(), Some(5));
//! ```
pub mod bitstream;
pub mod descriptor;
pub mod error;
pub mod log;
pub mod options;
pub mod property;
pub mod unpacker;
pub mod value;

pub use bitstream::{BitWriter, Bitstream};
pub use descriptor::{DescriptorTable, PropertyFlags, PropertyInfo, PropertyType};
pub use error::PropertyError;
pub use options::DecodeOptions;
pub use property::{Property, Tick};
pub use unpacker::{DefaultUnpacker, PropertyValueUnpacker};
pub use value::{PropertyKind, PropertyValue, Vector, VectorXy};

pub use rustc_hash::FxHashMap as HashMap;
