//! Video file adapters


use faceswap::{
    video::{FrameSink, FrameSource, VideoFileSink, VideoFileSource},
    Error,
};
use opencv::core::{Scalar, Size};
use test_helpers::*;

#[test]
fn test_missing_input_reports_video_open() {
    let result = VideoFileSource::open("/nonexistent/clip.avi", 30.0);
    assert!(result.is_err());
}

#[test]
fn test_bad_codec_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let result = VideoFileSink::create(dir.path().join("out.avi"), "MJPEG", 30.0, Size::new(FRAME_SIZE, FRAME_SIZE));
    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[test]
fn test_written_file_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.avi");
    let frame = create_face_frame(Scalar::new(90.0, 150.0, 200.0, 0.0)).unwrap();

    let mut sink = VideoFileSink::create(&path, "MJPG", 25.0, Size::new(FRAME_SIZE, FRAME_SIZE)).unwrap();
    for _ in 0..4 {
        sink.write_frame(&frame).unwrap();
    }
    sink.finish().unwrap();
    assert!(path.exists());

    let mut source = VideoFileSource::open(&path, 30.0).unwrap();
    let info = source.info();
    assert_eq!(info.size(), Size::new(FRAME_SIZE, FRAME_SIZE));
    assert!(info.fps > 0.0);

    let mut read = 0;
    while source.read_frame().unwrap().is_some() {
        read += 1;
    }
    assert_eq!(read, 4);
}

#[test]
fn test_discard_removes_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.avi");
    let frame = create_face_frame(Scalar::all(128.0)).unwrap();

    let mut sink = VideoFileSink::create(&path, "MJPG", 25.0, Size::new(FRAME_SIZE, FRAME_SIZE)).unwrap();
    sink.write_frame(&frame).unwrap();
    sink.discard().unwrap();

    assert!(!path.exists());
    assert!(sink.write_frame(&frame).is_err());
}
