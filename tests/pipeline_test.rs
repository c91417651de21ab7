//! Frame, scan and swap passes over in-memory video


use faceswap::{
    accel::Acceleration,
    capabilities::Capabilities,
    config::Config,
    identity::IdentityRegistry,
    pipeline::{CancellationToken, SwapPipeline},
    Error,
};
use opencv::{
    core::{Mat, Point, Rect, Scalar, CV_8UC3},
    imgproc,
};
use test_helpers::*;

const TARGET_COLOR: (f64, f64, f64) = (120.0, 140.0, 190.0);

fn target_frame() -> Mat {
    let (b, g, r) = TARGET_COLOR;
    create_face_frame(Scalar::new(b, g, r, 0.0)).unwrap()
}

fn scan_config() -> Config {
    let mut config = Config::default();
    config.scan.frame_stride = 1;
    config.scan.progress_interval = 1;
    config
}

fn pipeline(config: &Config) -> SwapPipeline {
    init_logging();
    SwapPipeline::from_config(config, &Capabilities::detect(), Acceleration::cpu()).unwrap()
}

/// Registry with one identity (encoding 0.0) whose swap source is a striped face
fn ready_registry() -> IdentityRegistry {
    let mut registry = IdentityRegistry::new(0.6).unwrap();
    registry.register(Mat::default(), encoding_with(0.0), face_bbox(), face_landmarks());
    let source = create_striped_face_frame(Scalar::new(70.0, 110.0, 210.0, 0.0)).unwrap();
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.0))]);
    registry.assign_swap_source(0, &source, &mut analyzer).unwrap();
    registry
}

fn frames(count: usize) -> Vec<Mat> {
    (0..count).map(|_| target_frame()).collect()
}

#[test]
fn test_swap_changes_only_the_face_region() {
    let registry = ready_registry();
    let mut pipeline = pipeline(&Config::default());
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.1))]);
    let frame = target_frame();

    let outcome = pipeline.process_frame(&frame, &registry, &mut analyzer, Some(0.0)).unwrap();
    assert_eq!(outcome.swapped, 1);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.frame.size().unwrap(), frame.size().unwrap());
    assert_eq!(outcome.frame.typ(), frame.typ());

    // hull bounds grown by the feather and the clone anchor offset
    let face_area = Rect::new(30, 50, 140, 125);
    let (inside, outside) = count_changed(&outcome.frame, &frame, face_area, 2).unwrap();
    assert!(inside > 500, "only {inside} pixels changed inside the face");
    assert_eq!(outside, 0);
}

#[test]
fn test_unknown_face_left_unchanged() {
    let registry = ready_registry();
    let mut pipeline = pipeline(&Config::default());
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(4.0))]);
    let frame = target_frame();

    let outcome = pipeline.process_frame(&frame, &registry, &mut analyzer, None).unwrap();
    assert_eq!(outcome.swapped, 0);
    assert_eq!(outcome.skipped, 1);
    let (inside, outside) = count_changed(&outcome.frame, &frame, face_bbox(), 0).unwrap();
    assert_eq!(inside + outside, 0);
}

/// 400x200 frame with two target faces, centred at x = 100 and x = 300
fn two_face_frame() -> Mat {
    let (b, g, r) = TARGET_COLOR;
    let mut frame = Mat::new_rows_cols_with_default(FRAME_SIZE, 2 * FRAME_SIZE, CV_8UC3, Scalar::all(60.0)).unwrap();
    for cx in [100, 300] {
        imgproc::circle(
            &mut frame,
            Point::new(cx, 100),
            FACE_RADIUS as i32,
            Scalar::new(b, g, r, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
    }
    frame
}

#[test]
fn test_two_faces_of_one_identity_are_both_swapped() {
    let registry = ready_registry();
    let mut pipeline = pipeline(&Config::default());

    let left = ScriptedFace::new(encoding_with(0.0));
    let right = ScriptedFace {
        bbox: Rect::new(250, 50, 100, 100),
        landmarks: synthetic_landmarks(300.0, 100.0, FACE_RADIUS),
        ..ScriptedFace::new(encoding_with(0.05))
    };
    let mut analyzer = MockAnalyzer::always(vec![left, right]);
    let frame = two_face_frame();
    let left_area = Rect::new(30, 50, 140, 125);
    let right_area = Rect::new(230, 50, 140, 125);

    // a second frame checks the shared smoother was not dragged across faces
    for timestamp in [0.0, 1.0 / 30.0] {
        let outcome = pipeline.process_frame(&frame, &registry, &mut analyzer, Some(timestamp)).unwrap();
        assert_eq!(outcome.swapped, 2);
        assert_eq!(outcome.failed, 0);

        let (left_changed, beyond_left) = count_changed(&outcome.frame, &frame, left_area, 2).unwrap();
        let (right_changed, _) = count_changed(&outcome.frame, &frame, right_area, 2).unwrap();
        assert!(left_changed > 500, "only {left_changed} pixels changed on the left face");
        assert!(right_changed > 500, "only {right_changed} pixels changed on the right face");
        assert_eq!(beyond_left, right_changed, "pixels changed outside both faces");
    }
}

#[test]
fn test_face_errors_do_not_abort_frame() {
    let registry = ready_registry();
    let mut pipeline = pipeline(&Config::default());
    let mut failing = ScriptedFace::failing();
    failing.bbox = Rect::new(0, 0, 20, 20);
    let mut analyzer = MockAnalyzer::always(vec![failing, ScriptedFace::new(encoding_with(0.0))]);

    let outcome = pipeline.process_frame(&target_frame(), &registry, &mut analyzer, None).unwrap();
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.swapped, 1);
}

#[test]
fn test_empty_frame_is_an_error() {
    let registry = ready_registry();
    let mut pipeline = pipeline(&Config::default());
    let result = pipeline.process_frame(&Mat::default(), &registry, &mut MockAnalyzer::nothing(), None);
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_scan_clusters_identities() {
    let config = scan_config();
    let mut pipeline = pipeline(&config);
    let mut registry = config.identity_registry().unwrap();
    let mut source = MemorySource::new(frames(3), 30.0);
    let mut analyzer = MockAnalyzer::scripted(vec![
        vec![ScriptedFace::new(encoding_with(0.0))],
        vec![ScriptedFace::new(encoding_with(1.0))],
        vec![ScriptedFace::new(encoding_with(0.1))],
    ]);
    let mut progress = Vec::new();

    let report = pipeline
        .scan(&mut source, &mut registry, &mut analyzer, &mut |p| progress.push(p), &CancellationToken::new())
        .unwrap();

    assert_eq!(report.frames_read, 3);
    assert_eq!(report.frames_analyzed, 3);
    assert_eq!(report.faces_seen, 3);
    assert_eq!(report.identities, 2);
    assert!(!report.cancelled);
    assert_eq!(registry.len(), 2);
    assert!(!registry.is_ready());

    // cropped face images come from the frame
    let record = &registry.records()[0];
    assert!(record.face_image.rows() > 0);
    assert_eq!(record.face_rect, face_bbox());

    // detection runs at the configured scale
    assert!(analyzer.scales.iter().all(|&s| (s - config.detection.scale_factor).abs() < 1e-12));

    assert_eq!(progress.last().copied(), Some(100.0));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_scan_respects_frame_stride() {
    let mut config = scan_config();
    config.scan.frame_stride = 2;
    let mut pipeline = pipeline(&config);
    let mut registry = config.identity_registry().unwrap();
    let mut source = MemorySource::new(frames(5), 30.0);
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.0))]);

    let report = pipeline
        .scan(&mut source, &mut registry, &mut analyzer, &mut |_| {}, &CancellationToken::new())
        .unwrap();

    // frames 0, 2 and 4
    assert_eq!(report.frames_read, 5);
    assert_eq!(report.frames_analyzed, 3);
    assert_eq!(analyzer.detect_calls, 3);
    assert_eq!(report.identities, 1);
}

#[test]
fn test_scan_counts_face_errors() {
    let config = scan_config();
    let mut pipeline = pipeline(&config);
    let mut registry = config.identity_registry().unwrap();
    let mut source = MemorySource::new(frames(2), 30.0);
    let mut analyzer = MockAnalyzer::scripted(vec![vec![ScriptedFace::failing()], vec![ScriptedFace::new(encoding_with(2.0))]]);

    let report = pipeline
        .scan(&mut source, &mut registry, &mut analyzer, &mut |_| {}, &CancellationToken::new())
        .unwrap();
    assert_eq!(report.face_errors, 1);
    assert_eq!(report.identities, 1);
}

#[test]
fn test_scan_cancel_and_read_error_clear_registry() {
    let config = scan_config();
    let mut pipeline = pipeline(&config);
    let mut registry = config.identity_registry().unwrap();
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.0))]);

    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    let mut source = MemorySource::new(frames(4), 30.0);
    let report = pipeline
        .scan(&mut source, &mut registry, &mut analyzer, &mut |_| handle.cancel(), &cancel)
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.frames_read, 1);
    assert!(registry.is_empty());

    let mut source = MemorySource::new(frames(4), 30.0).failing_after(2);
    let result = pipeline.scan(&mut source, &mut registry, &mut analyzer, &mut |_| {}, &CancellationToken::new());
    assert!(matches!(result, Err(Error::IoError(_))));
    assert!(registry.is_empty());
}

#[test]
fn test_swap_pass_writes_every_frame() {
    let config = scan_config();
    let mut pipeline = pipeline(&config);
    let registry = ready_registry();
    let mut source = MemorySource::new(frames(3), 30.0);
    let mut sink = MemorySink::default();
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.0))]);
    let mut progress = Vec::new();

    let report = pipeline
        .swap(
            &mut source,
            &mut sink,
            &registry,
            &mut analyzer,
            &mut |p| progress.push(p),
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(report.frames, 3);
    assert_eq!(report.faces_swapped, 3);
    assert!(!report.cancelled);
    assert_eq!(sink.frames.len(), 3);
    assert!(sink.finished);
    assert!(!sink.discarded);
    assert_eq!(progress.last().copied(), Some(100.0));
}

#[test]
fn test_swap_cancel_discards_output() {
    let config = scan_config();
    let mut pipeline = pipeline(&config);
    let registry = ready_registry();
    let mut source = MemorySource::new(frames(5), 30.0);
    let mut sink = MemorySink::default();
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.0))]);

    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    let report = pipeline
        .swap(&mut source, &mut sink, &registry, &mut analyzer, &mut |_| handle.cancel(), &cancel)
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.frames, 1);
    assert!(sink.discarded);
    assert!(!sink.finished);
    assert!(sink.frames.is_empty());
}

#[test]
fn test_swap_read_error_discards_output() {
    let mut pipeline = pipeline(&Config::default());
    let registry = ready_registry();
    let mut source = MemorySource::new(frames(3), 30.0).failing_after(1);
    let mut sink = MemorySink::default();
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.0))]);

    let result = pipeline.swap(
        &mut source,
        &mut sink,
        &registry,
        &mut analyzer,
        &mut |_| {},
        &CancellationToken::new(),
    );
    assert!(result.is_err());
    assert!(sink.discarded);
}

#[test]
fn test_swap_requires_identities() {
    let mut pipeline = pipeline(&Config::default());
    let registry = IdentityRegistry::new(0.6).unwrap();
    let mut source = MemorySource::new(frames(1), 30.0);
    let mut sink = MemorySink::default();

    let result = pipeline.swap(
        &mut source,
        &mut sink,
        &registry,
        &mut MockAnalyzer::nothing(),
        &mut |_| {},
        &CancellationToken::new(),
    );
    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert!(sink.frames.is_empty());
}

#[test]
fn test_identity_without_source_is_skipped() {
    let mut pipeline = pipeline(&Config::default());
    let mut registry = IdentityRegistry::new(0.6).unwrap();
    registry.register(Mat::default(), encoding_with(0.0), face_bbox(), face_landmarks());
    let mut source = MemorySource::new(frames(2), 30.0);
    let mut sink = MemorySink::default();
    let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.0))]);

    let report = pipeline
        .swap(&mut source, &mut sink, &registry, &mut analyzer, &mut |_| {}, &CancellationToken::new())
        .unwrap();
    assert_eq!(report.faces_swapped, 0);
    assert_eq!(report.faces_skipped, 2);
    assert_eq!(sink.frames.len(), 2);
}

#[test]
fn test_alternative_strategies_run_end_to_end() {
    let registry = ready_registry();
    let frame = target_frame();

    let mut configs = Vec::new();
    let mut modes = vec!["triangulated"];
    if Capabilities::detect().smooth_warp {
        modes.push("smooth");
    }
    for mode in modes {
        let mut config = Config::default();
        config.warp.mode = serde_yaml::from_str(mode).unwrap();
        configs.push(config);
    }
    for method in ["alpha", "laplacian"] {
        let mut config = Config::default();
        config.blend.method = serde_yaml::from_str(method).unwrap();
        config.color.method = serde_yaml::from_str("histogram").unwrap();
        configs.push(config);
    }

    for config in configs {
        let mut pipeline = pipeline(&config);
        let mut analyzer = MockAnalyzer::always(vec![ScriptedFace::new(encoding_with(0.0))]);
        let outcome = pipeline.process_frame(&frame, &registry, &mut analyzer, Some(0.0)).unwrap();
        assert_eq!(outcome.swapped, 1);
        assert_eq!(outcome.frame.size().unwrap(), frame.size().unwrap());
    }
}
