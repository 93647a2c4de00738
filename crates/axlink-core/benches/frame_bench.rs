use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use axlink_core::constants::PID_NO_LAYER3;
use axlink_core::frame::address::{Address, AddressField};
use axlink_core::frame::control::SFrameKind;
use axlink_core::frame::wire::Ax25Frame;
use axlink_core::types::SeqMode;

fn field() -> AddressField {
    AddressField::direct(
        Address::parse("N0CALL-1").unwrap(),
        Address::parse("W1AW-5").unwrap(),
        true,
    )
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    let i_frame = Ax25Frame::information(field(), 3, 5, false, PID_NO_LAYER3, vec![0xAA; 256]);
    let i_raw = i_frame.serialize(SeqMode::Mod8);
    group.throughput(Throughput::Bytes(i_raw.len() as u64));

    group.bench_function("parse_i_mod8", |b| {
        b.iter(|| Ax25Frame::parse(&i_raw, SeqMode::Mod8).unwrap());
    });

    group.bench_function("serialize_i_mod8", |b| {
        b.iter(|| i_frame.serialize(SeqMode::Mod8));
    });

    let rr = Ax25Frame::supervisory(field(), SFrameKind::Rr, 5, true);
    let rr_raw = rr.serialize(SeqMode::Mod8);

    group.bench_function("parse_rr_mod8", |b| {
        b.iter(|| Ax25Frame::parse(&rr_raw, SeqMode::Mod8).unwrap());
    });

    let i128 = Ax25Frame::information(field(), 99, 120, true, PID_NO_LAYER3, vec![0xBB; 256]);
    let i128_raw = i128.serialize(SeqMode::Mod128);

    group.bench_function("parse_i_mod128", |b| {
        b.iter(|| Ax25Frame::parse(&i128_raw, SeqMode::Mod128).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_frame);
criterion_main!(benches);
