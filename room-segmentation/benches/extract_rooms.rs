use criterion::{black_box, criterion_group, criterion_main, Criterion};
use room_segmentation::{extract_rooms, ClassLabel, SegmentationMask};

fn synthetic_plan() -> SegmentationMask {
    let mut mask = SegmentationMask::filled(1024, 768, ClassLabel::Background);
    mask.fill_rect(20, 20, 984, 728, ClassLabel::Wall);
    let labels = [
        ClassLabel::Kitchen,
        ClassLabel::LivingRoom,
        ClassLabel::Bedroom,
        ClassLabel::Bathroom,
        ClassLabel::Hallway,
        ClassLabel::Storage,
    ];
    for (i, label) in labels.iter().enumerate() {
        let col = (i % 3) as u32;
        let row = (i / 3) as u32;
        mask.fill_rect(30 + col * 330, 30 + row * 360, 310, 340, *label);
    }
    mask
}

fn bench_extract(c: &mut Criterion) {
    let mask = synthetic_plan();
    c.bench_function("extract_rooms 1024x768", |b| {
        b.iter(|| extract_rooms(black_box(&mask), 500.0))
    });
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
