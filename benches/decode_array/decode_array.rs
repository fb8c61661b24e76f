use criterion::{criterion_group, criterion_main, Criterion};
use tickprop::{
    BitWriter, Bitstream, DefaultUnpacker, Property, PropertyFlags, PropertyInfo, PropertyType,
};

static ELEMENTS: u32 = 64;
static TICKS: u32 = 300;

fn encoded_update(tick: u32) -> Vec<u8> {
    let mut writer = BitWriter::new();
    // floor(log2(64)) + 1
    writer.write_bits(ELEMENTS, 7);
    for index in 0..ELEMENTS {
        writer.write_var_u32(tick.wrapping_mul(31).wrapping_add(index));
    }
    writer.into_bytes()
}

fn inventory() -> Property {
    let element = PropertyInfo::new("m_hItems.element", PropertyType::Int)
        .with_flags(PropertyFlags::VARINT)
        .shared();
    Property::new(
        PropertyInfo::new("m_hItems", PropertyType::Array)
            .with_elements(ELEMENTS, element)
            .shared(),
    )
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let unpacker = DefaultUnpacker::new();
    let updates: Vec<Vec<u8>> = (0..TICKS).map(encoded_update).collect();

    c.bench_function("decode array over ticks", |bencher| {
        bencher.iter_with_large_drop(|| {
            let mut property = inventory();
            for (tick, bytes) in (0..TICKS).zip(&updates) {
                property
                    .update(tick, &unpacker, &mut Bitstream::new(bytes))
                    .expect("failed to decode update");
            }
            property
        });
    });

    let mut property = inventory();
    property
        .update(0, &unpacker, &mut Bitstream::new(&updates[0]))
        .expect("failed to decode update");
    c.bench_function("snapshot array", |bencher| {
        bencher.iter_with_large_drop(|| property.clone());
    });
}

criterion_group!(property_benches, criterion_benchmark);
criterion_main!(property_benches);
