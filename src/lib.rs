//! Face swapping for video frames.
//!
//! This library replaces faces in video with chosen source faces using:
//! - `OpenCV` for warping, masking, blending and video I/O
//! - Pluggable face detection, landmark and encoding models behind a trait
//! - Temporal filters for stable landmarks across frames
//!
//! The swap for one face consists of:
//! 1. Aligning the source face to the target landmarks (affine, mesh or thin-plate warp)
//! 2. Building a feathered convex-hull mask over the target face
//! 3. Matching the source colors to the target
//! 4. Compositing with seamless cloning, alpha blending or a Laplacian pyramid
//!
//! Across a video, a scan pass clusters faces into identities by encoding
//! distance, swap sources are assigned per identity, and a swap pass writes
//! the output.
//!
//! # Examples
//!
//! ## Smoothing landmarks
//!
//! ```
//! use faceswap::filters::{create_filter, LandmarkFilter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut filter = create_filter("one_euro:30:1.0:0.002:1.0")?;
//!
//! // The first sample passes through unchanged
//! let first = filter.update(&[100.0, 50.0], Some(0.0));
//! assert_eq!(first, vec![100.0, 50.0]);
//!
//! let smoothed = filter.update(&[104.0, 49.0], Some(1.0 / 30.0));
//! println!("Smoothed: {:?}", smoothed);
//!
//! // Reset before feeding another track
//! filter.reset();
//! # Ok(())
//! # }
//! ```
//!
//! ## Whole video
//!
//! ```no_run
//! use faceswap::{
//!     accel::Acceleration, capabilities::Capabilities, config::Config,
//!     detection::FaceAnalyzer, pipeline::{CancellationToken, SwapPipeline},
//! };
//!
//! # fn run(analyzer: &mut dyn FaceAnalyzer) -> faceswap::Result<()> {
//! let config = Config::from_file("faceswap.yaml")?;
//! let mut pipeline = SwapPipeline::from_config(&config, &Capabilities::detect(), Acceleration::cpu())?;
//! let mut registry = config.identity_registry()?;
//! let cancel = CancellationToken::new();
//!
//! pipeline.scan_file("input.mp4", &mut registry, analyzer, &mut |p| println!("{p:.0}%"), &cancel)?;
//! for index in 0..registry.len() {
//!     registry.assign_swap_source_from_path(index, "source.jpg", analyzer)?;
//! }
//!
//! if registry.is_ready() {
//!     let report = pipeline.swap_file(
//!         "input.mp4",
//!         "output.mp4",
//!         &config.video.codec,
//!         &registry,
//!         analyzer,
//!         &mut |_| {},
//!         &cancel,
//!     )?;
//!     println!("Swapped {} faces", report.faces_swapped);
//! }
//! # Ok(())
//! # }
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

/// Landmark sets and face encodings
pub mod landmarks;

/// Temporal filters for landmark streams
pub mod filters;

/// Geometric alignment of source faces
pub mod warp;

/// Masking, color matching and compositing
pub mod blend;

/// Registry of distinct identities in a video
pub mod identity;

/// Face detection collaborator interface
pub mod detection;

/// Single-face swap
pub mod swapper;

/// Frame-, scan- and swap-pass orchestration
pub mod pipeline;

/// Frame sources and sinks
pub mod video;

/// Optional acceleration hook
pub mod accel;

/// Optional capability detection
pub mod capabilities;

/// Utility functions for rectangles, crops and numeric conversions
pub mod utils;

pub use error::{Error, Result};
