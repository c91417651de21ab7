//! Benchmarks for masking, color matching and compositing

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use faceswap::{
    accel::Acceleration,
    blend::{
        clone::CloneMode,
        color::{ColorMatcher, ColorMethod},
        mask::{hull_mask, FeatherMode, MaskBuilder},
        BlendMethod, Blender,
    },
    capabilities::Capabilities,
    landmarks::LandmarkSet,
};
use opencv::{
    core::{Mat, Point, Scalar, Size, CV_8UC3},
    imgproc,
    prelude::*,
};
use std::f32::consts::PI;

fn face_landmarks() -> LandmarkSet {
    let points: Vec<(f32, f32)> = (0..68)
        .map(|i| {
            let ring = if i < 27 { 100.0 } else { 45.0 };
            let theta = 2.0 * PI * i as f32 / 27.0;
            (240.0 + ring * theta.cos(), 240.0 + ring * theta.sin())
        })
        .collect();
    LandmarkSet::from_tuples(&points).unwrap()
}

fn face_frame(color: Scalar) -> Mat {
    let mut frame = Mat::new_rows_cols_with_default(480, 480, CV_8UC3, Scalar::all(60.0)).unwrap();
    imgproc::circle(&mut frame, Point::new(240, 240), 100, color, imgproc::FILLED, imgproc::LINE_8, 0).unwrap();
    frame
}

fn benchmark_masks(c: &mut Criterion) {
    let mut group = c.benchmark_group("masks");
    let landmarks = face_landmarks();
    let size = Size::new(480, 480);

    for (name, mode) in [("gaussian", FeatherMode::Gaussian), ("distance", FeatherMode::Distance)] {
        let builder = MaskBuilder::new(mode, 6, 15.0, Acceleration::cpu());
        group.bench_function(name, |b| {
            b.iter(|| black_box(builder.build(&landmarks, size).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_color(c: &mut Criterion) {
    let mut group = c.benchmark_group("color");
    let source = face_frame(Scalar::new(70.0, 110.0, 200.0, 0.0));
    let target = face_frame(Scalar::new(120.0, 140.0, 170.0, 0.0));
    let mask = hull_mask(&face_landmarks(), Size::new(480, 480)).unwrap();
    let caps = Capabilities::detect();

    for (name, method) in [("mean_gain", ColorMethod::MeanGain), ("histogram", ColorMethod::Histogram)] {
        let matcher = ColorMatcher::new(method, 0.7, &caps);
        group.bench_function(name, |b| {
            b.iter(|| black_box(matcher.correct(&source, &target, &mask, None).unwrap()));
        });
    }

    group.finish();
}

fn benchmark_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");
    group.sample_size(20);
    let landmarks = face_landmarks();
    let aligned = face_frame(Scalar::new(70.0, 110.0, 200.0, 0.0));
    let frame = face_frame(Scalar::new(120.0, 140.0, 170.0, 0.0));

    for (name, method) in [
        ("seamless", BlendMethod::Seamless),
        ("alpha", BlendMethod::Alpha),
        ("laplacian", BlendMethod::Laplacian),
    ] {
        let masks = MaskBuilder::new(FeatherMode::Gaussian, 6, 15.0, Acceleration::cpu());
        let blender = Blender::new(method, masks, CloneMode::Normal, 4);
        let mask = blender.face_mask(&landmarks, &frame).unwrap();
        group.bench_function(name, |b| {
            b.iter(|| black_box(blender.composite(&aligned, &frame, &mask, &landmarks).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_masks, benchmark_color, benchmark_composite);
criterion_main!(benches);
