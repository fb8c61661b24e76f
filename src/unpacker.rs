/*!

The decoding side of property updates.

`PropertyValueUnpacker` is what `Property::update` calls to read a value off the wire. There is
one method per payload type, each taking the property's descriptor and the stream, plus
`unpack_array`, which is handed the array's live children and owns the whole reconciliation: how
many elements there are, and which children are created, updated or dropped.

`DefaultUnpacker` implements the replay encoding:

| type     | encoding                                                                       |
|----------|--------------------------------------------------------------------------------|
| Int      | `VARINT`: varint; otherwise `num_bits` bits, sign extended unless `UNSIGNED`   |
| Int64    | as Int, 64-bit                                                                  |
| Float    | `COORD`, `NO_SCALE` (raw IEEE-754), `NORMAL`, or quantized into the range       |
| Vector   | x, y as floats; z as a float, or implied from unit length when `NORMAL`        |
| VectorXy | x, y as floats                                                                  |
| String   | length prefix, then bytes                                                       |
| Array    | element count in `floor(log2(num_elements)) + 1` bits, then each element        |

Arrays are reconciled by position.

*/

use std::sync::Arc;

use log::trace;

use crate::bitstream::Bitstream;
use crate::descriptor::{PropertyFlags, PropertyInfo};
use crate::error::PropertyError;
use crate::options::DecodeOptions;
use crate::property::{Property, Tick};
use crate::value::{Vector, VectorXy};

const COORD_INTEGER_BITS: u32 = 14;
const COORD_FRACTIONAL_BITS: u32 = 5;
const COORD_RESOLUTION: f32 = 1.0 / (1 << COORD_FRACTIONAL_BITS) as f32;

const NORMAL_FRACTIONAL_BITS: u32 = 11;
const NORMAL_RESOLUTION: f32 = 1.0 / ((1 << NORMAL_FRACTIONAL_BITS) - 1) as f32;

/// Reads typed values from a bitstream on behalf of properties.
pub trait PropertyValueUnpacker {
    fn unpack_int(&self, info: &PropertyInfo, stream: &mut Bitstream) -> Result<u32, PropertyError>;

    fn unpack_float(&self, info: &PropertyInfo, stream: &mut Bitstream)
        -> Result<f32, PropertyError>;

    fn unpack_vector(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<Vector, PropertyError>;

    fn unpack_vector_xy(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<VectorXy, PropertyError>;

    fn unpack_string(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<String, PropertyError>;

    fn unpack_int64(&self, info: &PropertyInfo, stream: &mut Bitstream)
        -> Result<u64, PropertyError>;

    /// Brings `children` in line with the array encoded at the cursor.
    ///
    /// `children` is only borrowed for this call. New children should be created with
    /// `Property::new` from the element descriptor and decoded with `Property::update` at `tick`.
    fn unpack_array(
        &self,
        tick: Tick,
        children: &mut Vec<Property>,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<(), PropertyError>;
}

/// The unpacker for the replay wire format.
#[derive(Debug, Clone, Default)]
pub struct DefaultUnpacker {
    options: DecodeOptions,
}

impl DefaultUnpacker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also applies `options.decode_log_level`, when set, to the global log settings.
    #[must_use]
    pub fn with_options(options: DecodeOptions) -> Self {
        if let Some(level) = options.decode_log_level {
            crate::log::set_decode_level(level);
        }
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    fn unpack_coord(stream: &mut Bitstream) -> Result<f32, PropertyError> {
        let has_integer = stream.read_bool()?;
        let has_fraction = stream.read_bool()?;
        if !has_integer && !has_fraction {
            return Ok(0.0);
        }
        let negative = stream.read_bool()?;
        let integer = if has_integer {
            stream.read_bits(COORD_INTEGER_BITS)? + 1
        } else {
            0
        };
        let fraction = if has_fraction {
            stream.read_bits(COORD_FRACTIONAL_BITS)?
        } else {
            0
        };
        let value = integer as f32 + fraction as f32 * COORD_RESOLUTION;
        Ok(if negative { -value } else { value })
    }

    fn unpack_normal(stream: &mut Bitstream) -> Result<f32, PropertyError> {
        let negative = stream.read_bool()?;
        let fraction = stream.read_bits(NORMAL_FRACTIONAL_BITS)?;
        let value = fraction as f32 * NORMAL_RESOLUTION;
        Ok(if negative { -value } else { value })
    }

    fn unpack_quantized(info: &PropertyInfo, stream: &mut Bitstream) -> Result<f32, PropertyError> {
        let bits = info.num_bits();
        if bits == 0 || bits > 32 {
            return Err(PropertyError::InvalidBitCount(bits));
        }
        let raw = stream.read_bits(bits)?;
        let fraction = f64::from(raw) / ((1u64 << bits) - 1) as f64;
        let low = f64::from(info.low_value());
        let high = f64::from(info.high_value());
        Ok((low + (high - low) * fraction) as f32)
    }
}

/// Sign extends the low `bits` bits of `raw`.
fn sign_extend(raw: u64, bits: u32) -> u64 {
    if bits == 0 || bits >= 64 {
        return raw;
    }
    let sign = 1u64 << (bits - 1);
    if raw & sign == 0 {
        raw
    } else {
        raw | !((1u64 << bits) - 1)
    }
}

impl PropertyValueUnpacker for DefaultUnpacker {
    fn unpack_int(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<u32, PropertyError> {
        if info.flags().contains(PropertyFlags::VARINT) {
            return stream.read_var_u32();
        }
        let raw = stream.read_bits(info.num_bits())?;
        if info.flags().contains(PropertyFlags::UNSIGNED) {
            return Ok(raw);
        }
        // Negative values are kept in two's complement.
        Ok(sign_extend(u64::from(raw), info.num_bits()) as u32)
    }

    fn unpack_float(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<f32, PropertyError> {
        let flags = info.flags();
        if flags.contains(PropertyFlags::COORD) {
            Self::unpack_coord(stream)
        } else if flags.contains(PropertyFlags::NO_SCALE) {
            Ok(f32::from_bits(stream.read_bits(32)?))
        } else if flags.contains(PropertyFlags::NORMAL) {
            Self::unpack_normal(stream)
        } else {
            Self::unpack_quantized(info, stream)
        }
    }

    fn unpack_vector(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<Vector, PropertyError> {
        let x = self.unpack_float(info, stream)?;
        let y = self.unpack_float(info, stream)?;
        if !info.flags().contains(PropertyFlags::NORMAL) {
            let z = self.unpack_float(info, stream)?;
            return Ok(Vector::new(x, y, z));
        }
        let negative = stream.read_bool()?;
        let squared = x * x + y * y;
        let z = if squared < 1.0 {
            (1.0 - squared).sqrt()
        } else {
            0.0
        };
        Ok(Vector::new(x, y, if negative { -z } else { z }))
    }

    fn unpack_vector_xy(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<VectorXy, PropertyError> {
        let x = self.unpack_float(info, stream)?;
        let y = self.unpack_float(info, stream)?;
        Ok(VectorXy::new(x, y))
    }

    fn unpack_string(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<String, PropertyError> {
        let length = stream.read_bits(self.options.string_length_bits)? as usize;
        if length > self.options.max_string_length {
            return Err(PropertyError::ValueOutOfRange {
                name: info.name().to_string(),
                value: length as u64,
                max: self.options.max_string_length as u64,
            });
        }
        let bytes = stream.read_bytes(length)?;
        if self.options.strict_utf8 {
            Ok(String::from_utf8(bytes)?)
        } else {
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    fn unpack_int64(
        &self,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<u64, PropertyError> {
        if info.flags().contains(PropertyFlags::VARINT) {
            return stream.read_var_u64();
        }
        let raw = stream.read_bits_u64(info.num_bits())?;
        if info.flags().contains(PropertyFlags::UNSIGNED) {
            return Ok(raw);
        }
        Ok(sign_extend(raw, info.num_bits()))
    }

    fn unpack_array(
        &self,
        tick: Tick,
        children: &mut Vec<Property>,
        info: &PropertyInfo,
        stream: &mut Bitstream,
    ) -> Result<(), PropertyError> {
        let element = info
            .array_element()
            .ok_or_else(|| PropertyError::MissingArrayElement(info.name().to_string()))?;

        let max_elements = info.num_elements();
        let count_bits = u32::BITS - max_elements.leading_zeros();
        let count = stream.read_bits(count_bits)?;
        if count > max_elements {
            return Err(PropertyError::ValueOutOfRange {
                name: info.name().to_string(),
                value: u64::from(count),
                max: u64::from(max_elements),
            });
        }
        let count = count as usize;

        trace!(
            "reconciling `{}` at tick {tick}: {} -> {count} elements",
            info.name(),
            children.len()
        );

        let kept = count.min(children.len());
        for child in &mut children[..kept] {
            child.update(tick, self, stream)?;
        }
        // New elements join the sequence only once all of them have decoded.
        let mut appended = Vec::with_capacity(count - kept);
        for _ in kept..count {
            let mut child = Property::new(Arc::clone(element));
            child.update(tick, self, stream)?;
            appended.push(child);
        }
        children.truncate(kept);
        children.append(&mut appended);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitWriter;
    use crate::descriptor::PropertyType;
    use assert_approx_eq::assert_approx_eq;
    use log::LevelFilter;

    fn int_info(bits: u32, flags: PropertyFlags) -> PropertyInfo {
        PropertyInfo::new("m_int", PropertyType::Int)
            .with_bits(bits)
            .with_flags(flags)
    }

    #[test]
    fn unsigned_and_signed_ints() {
        let mut writer = BitWriter::new();
        writer.write_bits(1000, 10);
        writer.write_bits(0b1_1111_1110, 9);
        let bytes = writer.into_bytes();
        let mut stream = Bitstream::new(&bytes);
        let unpacker = DefaultUnpacker::new();

        let unsigned = int_info(10, PropertyFlags::UNSIGNED);
        assert_eq!(unpacker.unpack_int(&unsigned, &mut stream).unwrap(), 1000);

        let signed = int_info(9, PropertyFlags::NONE);
        let value = unpacker.unpack_int(&signed, &mut stream).unwrap();
        assert_eq!(value as i32, -2);
    }

    #[test]
    fn varint_ints() {
        let mut writer = BitWriter::new();
        writer.write_var_u32(123_456);
        writer.write_var_u64(1 << 40);
        let bytes = writer.into_bytes();
        let mut stream = Bitstream::new(&bytes);
        let unpacker = DefaultUnpacker::new();

        let info = int_info(32, PropertyFlags::VARINT);
        assert_eq!(unpacker.unpack_int(&info, &mut stream).unwrap(), 123_456);
        let info =
            PropertyInfo::new("m_steamID", PropertyType::Int64).with_flags(PropertyFlags::VARINT);
        assert_eq!(unpacker.unpack_int64(&info, &mut stream).unwrap(), 1 << 40);
    }

    #[test]
    fn fixed_width_int64() {
        let mut writer = BitWriter::new();
        writer.write_bits_u64(0xffff_ffff_ffff, 48);
        writer.write_bits_u64(u64::MAX, 64);
        let bytes = writer.into_bytes();
        let mut stream = Bitstream::new(&bytes);
        let unpacker = DefaultUnpacker::new();

        let info = PropertyInfo::new("m_id", PropertyType::Int64)
            .with_bits(48)
            .with_flags(PropertyFlags::UNSIGNED);
        assert_eq!(unpacker.unpack_int64(&info, &mut stream).unwrap(), 0xffff_ffff_ffff);

        let info = PropertyInfo::new("m_id", PropertyType::Int64).with_bits(64);
        assert_eq!(unpacker.unpack_int64(&info, &mut stream).unwrap(), u64::MAX);
    }

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0b0111, 4), 0b0111);
        assert_eq!(sign_extend(0b1000, 4) as i64, -8);
        assert_eq!(sign_extend(0xff, 0), 0xff);
        assert_eq!(sign_extend(u64::MAX, 64), u64::MAX);
    }

    #[test]
    fn quantized_float() {
        let mut writer = BitWriter::new();
        writer.write_bits(0, 8);
        writer.write_bits(255, 8);
        writer.write_bits(51, 8);
        let bytes = writer.into_bytes();
        let mut stream = Bitstream::new(&bytes);
        let unpacker = DefaultUnpacker::new();

        let info = PropertyInfo::new("m_flMana", PropertyType::Float)
            .with_bits(8)
            .with_range(-100.0, 155.0);
        assert_approx_eq!(unpacker.unpack_float(&info, &mut stream).unwrap(), -100.0);
        assert_approx_eq!(unpacker.unpack_float(&info, &mut stream).unwrap(), 155.0);
        assert_approx_eq!(unpacker.unpack_float(&info, &mut stream).unwrap(), -49.0);
    }

    #[test]
    fn quantized_float_needs_a_bit_width() {
        let bytes = [0u8; 8];
        let mut stream = Bitstream::new(&bytes);
        let info = PropertyInfo::new("m_flBroken", PropertyType::Float).with_bits(0);
        assert!(matches!(
            DefaultUnpacker::new().unpack_float(&info, &mut stream),
            Err(PropertyError::InvalidBitCount(0))
        ));
    }

    #[test]
    fn raw_coord_and_normal_floats() {
        let mut writer = BitWriter::new();
        // NO_SCALE
        writer.write_bits(1.25f32.to_bits(), 32);
        // COORD: -10.5
        writer.write_bool(true);
        writer.write_bool(true);
        writer.write_bool(true);
        writer.write_bits(9, COORD_INTEGER_BITS);
        writer.write_bits(16, COORD_FRACTIONAL_BITS);
        // COORD: zero
        writer.write_bool(false);
        writer.write_bool(false);
        // NORMAL: -1.0
        writer.write_bool(true);
        writer.write_bits((1 << NORMAL_FRACTIONAL_BITS) - 1, NORMAL_FRACTIONAL_BITS);
        let bytes = writer.into_bytes();
        let mut stream = Bitstream::new(&bytes);
        let unpacker = DefaultUnpacker::new();

        let float = |flags| PropertyInfo::new("m_fl", PropertyType::Float).with_flags(flags);
        assert_eq!(
            unpacker
                .unpack_float(&float(PropertyFlags::NO_SCALE), &mut stream)
                .unwrap(),
            1.25
        );
        assert_approx_eq!(
            unpacker
                .unpack_float(&float(PropertyFlags::COORD), &mut stream)
                .unwrap(),
            -10.5
        );
        assert_eq!(
            unpacker
                .unpack_float(&float(PropertyFlags::COORD), &mut stream)
                .unwrap(),
            0.0
        );
        assert_approx_eq!(
            unpacker
                .unpack_float(&float(PropertyFlags::NORMAL), &mut stream)
                .unwrap(),
            -1.0
        );
        assert_eq!(stream.position(), 68);
    }

    #[test]
    fn vectors() {
        let mut writer = BitWriter::new();
        for component in [1.0f32, 2.0, 3.0, 4.0, 5.0] {
            writer.write_bits(component.to_bits(), 32);
        }
        let bytes = writer.into_bytes();
        let mut stream = Bitstream::new(&bytes);
        let unpacker = DefaultUnpacker::new();

        let info = PropertyInfo::new("m_vecOrigin", PropertyType::Vector)
            .with_flags(PropertyFlags::NO_SCALE);
        assert_eq!(
            unpacker.unpack_vector(&info, &mut stream).unwrap(),
            Vector::new(1.0, 2.0, 3.0)
        );
        let info = PropertyInfo::new("m_vecXy", PropertyType::VectorXy)
            .with_flags(PropertyFlags::NO_SCALE);
        assert_eq!(
            unpacker.unpack_vector_xy(&info, &mut stream).unwrap(),
            VectorXy::new(4.0, 5.0)
        );
    }

    #[test]
    fn normal_vector_implies_z() {
        let mut writer = BitWriter::new();
        // x = 0, y = 0, z negative
        writer.write_bool(false);
        writer.write_bits(0, NORMAL_FRACTIONAL_BITS);
        writer.write_bool(false);
        writer.write_bits(0, NORMAL_FRACTIONAL_BITS);
        writer.write_bool(true);
        let bytes = writer.into_bytes();
        let mut stream = Bitstream::new(&bytes);

        let info = PropertyInfo::new("m_vecNormal", PropertyType::Vector)
            .with_flags(PropertyFlags::NORMAL);
        let vector = DefaultUnpacker::new()
            .unpack_vector(&info, &mut stream)
            .unwrap();
        assert_eq!(vector.x, 0.0);
        assert_eq!(vector.y, 0.0);
        assert_approx_eq!(vector.z, -1.0);
    }

    #[test]
    fn strings() {
        let mut writer = BitWriter::new();
        writer.write_bits(4, 9);
        writer.write_bytes(b"axe!");
        writer.write_bits(0, 9);
        let bytes = writer.into_bytes();
        let mut stream = Bitstream::new(&bytes);
        let info = PropertyInfo::new("m_iszName", PropertyType::String);
        let unpacker = DefaultUnpacker::new();

        assert_eq!(unpacker.unpack_string(&info, &mut stream).unwrap(), "axe!");
        assert_eq!(unpacker.unpack_string(&info, &mut stream).unwrap(), "");
    }

    #[test]
    fn string_limits_and_utf8() {
        let mut writer = BitWriter::new();
        writer.write_bits(2, 9);
        writer.write_bytes(&[0xff, 0x41]);
        let bytes = writer.into_bytes();
        let info = PropertyInfo::new("m_iszName", PropertyType::String);

        let strict = DefaultUnpacker::new();
        assert!(matches!(
            strict.unpack_string(&info, &mut Bitstream::new(&bytes)),
            Err(PropertyError::InvalidUtf8(_))
        ));

        let lossy = DefaultUnpacker::with_options(DecodeOptions {
            strict_utf8: false,
            ..DecodeOptions::default()
        });
        assert_eq!(
            lossy.unpack_string(&info, &mut Bitstream::new(&bytes)).unwrap(),
            "\u{fffd}A"
        );

        let short = DefaultUnpacker::with_options(DecodeOptions {
            max_string_length: 1,
            ..DecodeOptions::default()
        });
        assert!(matches!(
            short.unpack_string(&info, &mut Bitstream::new(&bytes)),
            Err(PropertyError::ValueOutOfRange { value: 2, max: 1, .. })
        ));
    }

    fn items_info() -> PropertyInfo {
        let element = int_info(8, PropertyFlags::UNSIGNED).shared();
        PropertyInfo::new("m_hItems", PropertyType::Array).with_elements(6, element)
    }

    fn encode_items(values: &[u32]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        // floor(log2(6)) + 1
        writer.write_bits(values.len() as u32, 3);
        for value in values {
            writer.write_bits(*value, 8);
        }
        writer.into_bytes()
    }

    #[test]
    fn array_grows_updates_and_truncates_by_position() {
        let info = items_info();
        let unpacker = DefaultUnpacker::new();
        let mut children = Vec::new();

        let bytes = encode_items(&[1, 2, 3]);
        unpacker
            .unpack_array(1, &mut children, &info, &mut Bitstream::new(&bytes))
            .unwrap();
        let values: Vec<u32> = children.iter().map(|c| *c.value_as::<u32>()).collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert!(children.iter().all(|c| c.updated_at() == Some(1)));

        let bytes = encode_items(&[9]);
        unpacker
            .unpack_array(2, &mut children, &info, &mut Bitstream::new(&bytes))
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(*children[0].value_as::<u32>(), 9);
        assert_eq!(children[0].updated_at(), Some(2));
    }

    #[test]
    fn truncated_growth_leaves_no_undecoded_element() {
        let info = items_info();
        let unpacker = DefaultUnpacker::new();
        let mut children = Vec::new();
        let bytes = encode_items(&[10]);
        unpacker
            .unpack_array(1, &mut children, &info, &mut Bitstream::new(&bytes))
            .unwrap();

        let mut writer = BitWriter::new();
        writer.write_bits(2, 3);
        writer.write_bits(11, 8);
        writer.write_bits(0b11, 2);
        let bytes = writer.into_bytes();
        let result = unpacker.unpack_array(2, &mut children, &info, &mut Bitstream::new(&bytes));

        assert!(matches!(result, Err(PropertyError::UnexpectedEndOfStream { .. })));
        assert_eq!(children.len(), 1);
        assert!(children.iter().all(|c| c.updated_at().is_some()));
    }

    #[test]
    fn failed_shrink_keeps_every_element() {
        let info = items_info();
        let unpacker = DefaultUnpacker::new();
        let mut children = Vec::new();
        let bytes = encode_items(&[1, 2, 3]);
        unpacker
            .unpack_array(1, &mut children, &info, &mut Bitstream::new(&bytes))
            .unwrap();

        // Count of one, then the stream ends before the element.
        let bytes = [0b0000_0001u8];
        let result = unpacker.unpack_array(2, &mut children, &info, &mut Bitstream::new(&bytes));

        assert!(result.is_err());
        let values: Vec<u32> = children.iter().map(|c| *c.value_as::<u32>()).collect();
        assert_eq!(values, vec![1, 2, 3]);
        assert!(children.iter().all(|c| c.updated_at() == Some(1)));
    }

    #[test]
    fn array_count_above_maximum_is_rejected() {
        let info = items_info();
        let bytes = encode_items(&[1, 1, 1, 1, 1, 1, 1]);
        let mut children = Vec::new();
        let result = DefaultUnpacker::new().unpack_array(
            1,
            &mut children,
            &info,
            &mut Bitstream::new(&bytes),
        );
        assert!(matches!(
            result,
            Err(PropertyError::ValueOutOfRange { value: 7, max: 6, .. })
        ));
        assert!(children.is_empty());
    }

    #[test]
    fn array_without_element_descriptor() {
        let info = PropertyInfo::new("m_hBroken", PropertyType::Array);
        let mut children = Vec::new();
        let result = DefaultUnpacker::new().unpack_array(
            1,
            &mut children,
            &info,
            &mut Bitstream::new(&[0u8]),
        );
        assert!(matches!(result, Err(PropertyError::MissingArrayElement(_))));
    }

    #[test]
    fn options_set_the_decode_log_level() {
        let _guard = crate::log::LOG_TEST_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let unpacker = DefaultUnpacker::with_options(DecodeOptions {
            decode_log_level: Some(LevelFilter::Trace),
            ..DecodeOptions::default()
        });
        assert_eq!(crate::log::decode_level(), LevelFilter::Trace);

        let _ = DefaultUnpacker::with_options(DecodeOptions::default());
        assert_eq!(crate::log::decode_level(), LevelFilter::Trace);

        crate::log::set_decode_level(LevelFilter::Debug);
        assert_eq!(unpacker.options().decode_log_level, Some(LevelFilter::Trace));
    }

    #[test]
    fn usable_as_trait_object() {
        let unpacker: Box<dyn PropertyValueUnpacker> = Box::new(DefaultUnpacker::new());
        let info = int_info(4, PropertyFlags::UNSIGNED).shared();
        let mut property = Property::new(info);
        let bytes = [0b0000_1011u8];
        property
            .update(3, unpacker.as_ref(), &mut Bitstream::new(&bytes))
            .unwrap();
        assert_eq!(*property.value_as::<u32>(), 11);
    }
}
