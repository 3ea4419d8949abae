use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use rts_core::{Button, Frame, build_pulse_train};

fn bench_encode(c: &mut Criterion) {
    c.bench_function("frame_encode", |b| {
        b.iter(|| Frame::encode(black_box(0x1234AB), Button::Down.mask(), black_box(0xCAFE)));
    });

    let frame = Frame::encode(0x1234AB, Button::Down.mask(), 0xCAFE);
    c.bench_function("pulse_train_repeat_2", |b| {
        b.iter(|| build_pulse_train(black_box(&frame), 2));
    });
}

criterion_group!(benches, bench_encode);
criterion_main!(benches);
