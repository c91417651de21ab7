//! Alignment of source faces onto target landmarks


use faceswap::{
    accel::Acceleration,
    capabilities::Capabilities,
    landmarks::LandmarkSet,
    warp::{
        anchor_transform,
        triangulation::{delaunay_triangles, doubled_area, with_frame_corners},
        WarpEngine, WarpMode,
    },
    Error,
};
use opencv::{
    core::{Mat, Scalar, Size, Vec3b, CV_8UC3},
    prelude::*,
};
use test_helpers::*;

fn frame_size() -> Size {
    Size::new(FRAME_SIZE, FRAME_SIZE)
}

/// Gradient image so misplaced pixels show up as value differences
fn gradient_frame() -> Mat {
    let mut frame = create_test_image(FRAME_SIZE, FRAME_SIZE, CV_8UC3).unwrap();
    for y in 0..FRAME_SIZE {
        for x in 0..FRAME_SIZE {
            let px = frame.at_2d_mut::<Vec3b>(y, x).unwrap();
            *px = Vec3b::from([x as u8, y as u8, ((x + y) / 2) as u8]);
        }
    }
    frame
}

/// Mean absolute channel difference over the central region
fn interior_difference(a: &Mat, b: &Mat, margin: i32) -> f64 {
    let mut total = 0.0;
    let mut count = 0.0;
    for y in margin..FRAME_SIZE - margin {
        for x in margin..FRAME_SIZE - margin {
            let pa = a.at_2d::<Vec3b>(y, x).unwrap();
            let pb = b.at_2d::<Vec3b>(y, x).unwrap();
            for c in 0..3 {
                total += f64::from(pa[c].abs_diff(pb[c]));
                count += 1.0;
            }
        }
    }
    total / count
}

#[test]
fn test_triangulation_covers_frame() {
    let landmarks = face_landmarks();
    let points = with_frame_corners(landmarks.points(), FRAME_SIZE, FRAME_SIZE);
    let triangles = delaunay_triangles(&points, FRAME_SIZE, FRAME_SIZE).unwrap();
    assert!(!triangles.is_empty());

    let area: f32 = triangles
        .iter()
        .map(|t| doubled_area(points[t[0]], points[t[1]], points[t[2]]).abs() / 2.0)
        .sum();
    let frame_area = (FRAME_SIZE - 1) as f32 * (FRAME_SIZE - 1) as f32;
    assert!((area - frame_area).abs() / frame_area < 0.01, "covered {area} of {frame_area}");

    for index in 0..points.len() {
        assert!(
            triangles.iter().any(|t| t.contains(&index)),
            "point {index} is not used by any triangle"
        );
    }
    for t in &triangles {
        assert!(t.iter().all(|&i| i < points.len()));
        assert!(t[0] != t[1] && t[1] != t[2] && t[0] != t[2]);
    }
}

#[test]
fn test_triangulation_with_points_outside_frame() {
    let landmarks = face_landmarks().translated(-80.0, 0.0);
    let points = with_frame_corners(landmarks.points(), FRAME_SIZE, FRAME_SIZE);
    let triangles = delaunay_triangles(&points, FRAME_SIZE, FRAME_SIZE).unwrap();
    assert!(!triangles.is_empty());
}

#[test]
fn test_affine_identity() {
    let source = gradient_frame();
    let landmarks = face_landmarks();
    let engine = WarpEngine::new(WarpMode::Affine, &Capabilities::baseline(), Acceleration::cpu()).unwrap();

    let aligned = engine.align(&source, &landmarks, &landmarks, frame_size()).unwrap();
    assert_eq!(aligned.size().unwrap(), frame_size());
    assert_eq!(aligned.typ(), CV_8UC3);
    assert!(interior_difference(&aligned, &source, 2) < 0.5);
}

#[test]
fn test_affine_follows_translation() {
    let source = create_face_frame(Scalar::new(30.0, 160.0, 220.0, 0.0)).unwrap();
    let landmarks = face_landmarks();
    let target = landmarks.translated(20.0, 10.0);
    let engine = WarpEngine::new(WarpMode::Affine, &Capabilities::baseline(), Acceleration::cpu()).unwrap();

    let aligned = engine.align(&source, &landmarks, &target, frame_size()).unwrap();
    assert_eq!(*aligned.at_2d::<Vec3b>(110, 120).unwrap(), Vec3b::from([30, 160, 220]));
    // uncovered area on the left is filled with black
    assert_eq!(*aligned.at_2d::<Vec3b>(100, 5).unwrap(), Vec3b::from([0, 0, 0]));
}

#[test]
fn test_mesh_identity_within_tolerance() {
    let source = gradient_frame();
    let landmarks = face_landmarks();
    let engine = WarpEngine::new(WarpMode::Triangulated, &Capabilities::baseline(), Acceleration::cpu()).unwrap();

    let aligned = engine.align(&source, &landmarks, &landmarks, frame_size()).unwrap();
    assert_eq!(aligned.size().unwrap(), frame_size());
    assert!(interior_difference(&aligned, &source, 5) < 3.0);
}

#[test]
fn test_mesh_output_matches_requested_size() {
    let source = gradient_frame();
    let source_landmarks = face_landmarks();
    let target = synthetic_landmarks(60.0, 60.0, 40.0);
    let engine = WarpEngine::new(WarpMode::Triangulated, &Capabilities::baseline(), Acceleration::cpu()).unwrap();

    let aligned = engine.align(&source, &source_landmarks, &target, Size::new(120, 140)).unwrap();
    assert_eq!(aligned.size().unwrap(), Size::new(120, 140));
    assert_eq!(aligned.typ(), CV_8UC3);
}

#[test]
fn test_degenerate_anchors_rejected() {
    let collapsed = LandmarkSet::from_tuples(&[(10.0, 10.0); 68]).unwrap();
    assert!(matches!(
        anchor_transform(&collapsed, &face_landmarks()),
        Err(Error::WarpError(_))
    ));
}

#[test]
fn test_smooth_requires_capability() {
    let result = WarpEngine::new(WarpMode::Smooth, &Capabilities::baseline(), Acceleration::cpu());
    assert!(matches!(result, Err(Error::CapabilityUnavailable(_))));
}

#[cfg(feature = "smooth-warp")]
#[test]
fn test_smooth_identity_within_tolerance() {
    let source = gradient_frame();
    let landmarks = face_landmarks();
    let engine = WarpEngine::new(WarpMode::Smooth, &Capabilities::detect(), Acceleration::cpu()).unwrap();

    let aligned = engine.align(&source, &landmarks, &landmarks, frame_size()).unwrap();
    assert!(interior_difference(&aligned, &source, 2) < 1.0);
}
