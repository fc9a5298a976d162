use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use nobg::{
    build_archive, composite, BackgroundColor, OutputItem, PngCompression, PngEncoder,
};

fn cutout(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn benchmark_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");
    for size in [256u32, 1024] {
        let image = cutout(size, size);
        group.bench_with_input(BenchmarkId::new("white", size), &image, |b, image| {
            b.iter(|| composite(black_box(image.clone()), Some(BackgroundColor::white())));
        });
    }
    group.finish();
}

fn benchmark_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("png_encode");
    group.sample_size(20);
    let image = cutout(512, 512);
    for compression in [PngCompression::Fast, PngCompression::Default, PngCompression::Best] {
        let encoder = PngEncoder::new(compression);
        group.bench_with_input(
            BenchmarkId::from_parameter(compression),
            &image,
            |b, image| {
                b.iter(|| encoder.encode(black_box(image)));
            },
        );
    }
    group.finish();
}

fn benchmark_archive(c: &mut Criterion) {
    let encoder = PngEncoder::default();
    let items: Vec<OutputItem> = (0..8)
        .filter_map(|i| {
            encoder
                .encode(&cutout(128, 128))
                .ok()
                .map(|bytes| OutputItem::new(format!("image{i}_noBg.png"), bytes))
        })
        .collect();

    c.bench_function("archive_8_items", |b| {
        b.iter(|| build_archive(black_box(&items)));
    });
}

criterion_group!(
    finishing_benches,
    benchmark_composite,
    benchmark_encode,
    benchmark_archive
);
criterion_main!(finishing_benches);
