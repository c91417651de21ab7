//! Video-level orchestration: per-frame swapping, the identity scan pass and
//! the swap pass.
//!
//! Everything here runs sequentially in file order. Landmark smoothers and
//! color-gain smoothers are keyed by identity index and reset at the start of
//! each pass. Only the first face matching an identity in a frame feeds its
//! smoothers.

use crate::{
    accel::Acceleration,
    blend::color::GainSmoother,
    capabilities::Capabilities,
    config::Config,
    detection::{analyze_region, FaceAnalyzer},
    filters::{create_filter, LandmarkSmoother},
    identity::IdentityRegistry,
    swapper::FaceSwapper,
    utils::{crop, ensure_bgr, image_rect, pad_rect},
    video::{FrameSink, FrameSource, VideoFileSink, VideoFileSource},
    Error, Result,
};
use log::{debug, info, warn};
use opencv::{core::Mat, prelude::*};
use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Cooperative cancellation flag shared with the thread driving a pass
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, not cancelled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the pass stops at the next frame boundary
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of processing one frame
pub struct FrameOutcome {
    /// Output frame
    pub frame: Mat,
    /// Faces replaced
    pub swapped: usize,
    /// Faces left alone (no identity or no source)
    pub skipped: usize,
    /// Faces whose processing failed
    pub failed: usize,
}

/// Totals of a scan pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Frames read from the source
    pub frames_read: usize,
    /// Frames run through detection
    pub frames_analyzed: usize,
    /// Faces detected in analysed frames
    pub faces_seen: usize,
    /// Faces that failed landmark or encoding extraction
    pub face_errors: usize,
    /// Distinct identities registered
    pub identities: usize,
    /// Stopped early by cancellation
    pub cancelled: bool,
}

/// Totals of a swap pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapReport {
    /// Frames written
    pub frames: usize,
    /// Faces replaced
    pub faces_swapped: usize,
    /// Faces without a matching identity or source
    pub faces_skipped: usize,
    /// Faces whose processing failed
    pub faces_failed: usize,
    /// Stopped early by cancellation; the output was discarded
    pub cancelled: bool,
}

/// Orchestrates detection, identity lookup, smoothing and swapping
pub struct SwapPipeline {
    swapper: FaceSwapper,
    detection_scale: f64,
    frame_stride: usize,
    crop_padding: i32,
    progress_interval: usize,
    fps_fallback: f64,
    filter_description: String,
    color_temporal_alpha: f64,
    smoothers: HashMap<usize, LandmarkSmoother>,
    gains: HashMap<usize, GainSmoother>,
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = done as f64 / total as f64 * 100.0;
    value.min(100.0)
}

impl SwapPipeline {
    /// Build a pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or asks for an
    /// unavailable capability
    pub fn from_config(config: &Config, capabilities: &Capabilities, accel: Acceleration) -> Result<Self> {
        config.validate()?;
        let swapper = config.face_swapper(capabilities, accel)?;
        info!(
            "Swap pipeline: {} warp, {} smoothing",
            swapper.warp_engine().mode(),
            config.smoothing.filter_description()
        );
        Ok(Self {
            swapper,
            detection_scale: config.detection.scale_factor,
            frame_stride: config.scan.frame_stride,
            crop_padding: config.scan.crop_padding,
            progress_interval: config.scan.progress_interval,
            fps_fallback: config.video.fps_fallback,
            filter_description: config.smoothing.filter_description(),
            color_temporal_alpha: config.color.temporal_alpha,
            smoothers: HashMap::new(),
            gains: HashMap::new(),
        })
    }

    /// Forget all per-identity smoothing state
    pub fn reset_tracks(&mut self) {
        self.smoothers.clear();
        self.gains.clear();
    }

    /// Swap every recognised face in `frame`
    ///
    /// Per-face failures are logged and counted; the returned frame carries
    /// whatever faces succeeded. `timestamp` (seconds) feeds the landmark
    /// smoothers. A second face matching an already-swapped identity in the
    /// same frame is swapped with its raw landmarks and unsmoothed gains.
    ///
    /// # Errors
    ///
    /// Returns an error only for an empty or unsupported input frame
    pub fn process_frame<A: FaceAnalyzer + ?Sized>(
        &mut self,
        frame: &Mat,
        registry: &IdentityRegistry,
        analyzer: &mut A,
        timestamp: Option<f64>,
    ) -> Result<FrameOutcome> {
        let input = ensure_bgr(frame)?;
        let mut outcome = FrameOutcome {
            frame: input.try_clone()?,
            swapped: 0,
            skipped: 0,
            failed: 0,
        };

        let regions = match analyzer.detect(&input, self.detection_scale) {
            Ok(regions) => regions,
            Err(e) => {
                warn!("Face detection failed, frame left unchanged: {}", e);
                return Ok(outcome);
            }
        };

        let mut tracked = HashSet::new();
        for region in regions {
            let face = match analyze_region(analyzer, &input, region) {
                Ok(face) => face,
                Err(e) => {
                    warn!("Skipping face at {:?}: {}", region.bbox, e);
                    outcome.failed += 1;
                    continue;
                }
            };

            let Some(index) = registry.find_match(&face.encoding) else {
                debug!("Face at {:?} matches no identity", region.bbox);
                outcome.skipped += 1;
                continue;
            };
            let Some(source) = registry.get(index).and_then(|r| r.swap_source.as_ref()) else {
                debug!("Identity {} has no swap source", index);
                outcome.skipped += 1;
                continue;
            };

            // one track per identity; repeat matches in the same frame go unsmoothed
            let (landmarks, gains) = if tracked.insert(index) {
                let smoother = match self.smoothers.entry(index) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        entry.insert(LandmarkSmoother::new(create_filter(&self.filter_description)?))
                    }
                };
                let landmarks = smoother.smooth(&face.landmarks, timestamp).unwrap_or_else(|e| {
                    warn!("Landmark smoothing failed for identity {}: {}", index, e);
                    face.landmarks.clone()
                });
                let alpha = self.color_temporal_alpha;
                let gains = self.gains.entry(index).or_insert_with(|| GainSmoother::new(alpha));
                (landmarks, Some(gains))
            } else {
                debug!("Identity {} matched again at {:?}, landmarks left raw", index, region.bbox);
                (face.landmarks.clone(), None)
            };

            match self.swapper.swap_face(&outcome.frame, &landmarks, source, gains) {
                Ok(swapped) => {
                    outcome.frame = swapped;
                    outcome.swapped += 1;
                }
                Err(e) => {
                    warn!("Swap failed for identity {}: {}", index, e);
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Cluster the faces of a video into identities
    ///
    /// Clears `registry`, then analyses every `frame_stride`-th frame starting
    /// with the first. `progress` receives a percentage every
    /// `progress_interval` frames and once at the end. On cancellation or a
    /// read error the registry is cleared again.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame cannot be read
    pub fn scan<S, A>(
        &mut self,
        source: &mut S,
        registry: &mut IdentityRegistry,
        analyzer: &mut A,
        progress: &mut dyn FnMut(f64),
        cancel: &CancellationToken,
    ) -> Result<ScanReport>
    where
        S: FrameSource + ?Sized,
        A: FaceAnalyzer + ?Sized,
    {
        registry.clear();
        let total = source.info().frame_count;
        let mut report = ScanReport::default();
        info!("Scanning for identities ({} frames, stride {})", total, self.frame_stride);

        loop {
            if cancel.is_cancelled() {
                info!("Scan cancelled after {} frames", report.frames_read);
                registry.clear();
                report.cancelled = true;
                return Ok(report);
            }

            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    registry.clear();
                    return Err(e);
                }
            };
            let index = report.frames_read;
            report.frames_read += 1;

            if index % self.frame_stride == 0 {
                report.frames_analyzed += 1;
                self.scan_frame(&frame, registry, analyzer, &mut report);
            }

            if report.frames_read % self.progress_interval == 0 {
                progress(percent(report.frames_read, total));
            }
        }

        report.identities = registry.len();
        progress(100.0);
        info!(
            "Scan complete: {} identities from {} faces in {} analysed frames",
            report.identities, report.faces_seen, report.frames_analyzed
        );
        Ok(report)
    }

    fn scan_frame<A: FaceAnalyzer + ?Sized>(
        &self,
        frame: &Mat,
        registry: &mut IdentityRegistry,
        analyzer: &mut A,
        report: &mut ScanReport,
    ) {
        let frame = match ensure_bgr(frame) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping unreadable frame {}: {}", report.frames_read - 1, e);
                return;
            }
        };
        let regions = match analyzer.detect(&frame, self.detection_scale) {
            Ok(regions) => regions,
            Err(e) => {
                warn!("Face detection failed on frame {}: {}", report.frames_read - 1, e);
                return;
            }
        };

        for region in regions {
            report.faces_seen += 1;
            let face = match analyze_region(analyzer, &frame, region) {
                Ok(face) => face,
                Err(e) => {
                    warn!("Error processing face at {:?}: {}", region.bbox, e);
                    report.face_errors += 1;
                    continue;
                }
            };
            if registry.find_match(&face.encoding).is_some() {
                continue;
            }

            let image = image_rect(&frame);
            let face_image = pad_rect(region.bbox, self.crop_padding, image.width, image.height)
                .and_then(|rect| crop(&frame, rect).ok())
                .unwrap_or_default();
            registry.register(face_image, face.encoding, region.bbox, face.landmarks);
        }
    }

    /// Swap faces in every frame of `source`, writing to `sink`
    ///
    /// On cancellation or error the sink's partial output is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no identities are registered, or the
    /// first read, frame or write error
    pub fn swap<S, K, A>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        registry: &IdentityRegistry,
        analyzer: &mut A,
        progress: &mut dyn FnMut(f64),
        cancel: &CancellationToken,
    ) -> Result<SwapReport>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
        A: FaceAnalyzer + ?Sized,
    {
        if registry.is_empty() {
            return Err(Error::InvalidInput("No identities registered; run a scan first".to_string()));
        }
        if !registry.is_ready() {
            warn!("Not every identity has a swap source; those faces will be left unchanged");
        }

        self.reset_tracks();
        let info = source.info();
        let fps = if info.fps > 0.0 { info.fps } else { self.fps_fallback };
        let mut report = SwapReport::default();
        info!("Swapping faces in {} frames", info.frame_count);

        match self.swap_frames(source, sink, registry, analyzer, progress, cancel, fps, &mut report) {
            Ok(()) if report.cancelled => {
                info!("Swap cancelled after {} frames, discarding output", report.frames);
                sink.discard()?;
                Ok(report)
            }
            Ok(()) => {
                sink.finish()?;
                progress(100.0);
                info!(
                    "Swap complete: {} frames, {} faces swapped, {} skipped, {} failed",
                    report.frames, report.faces_swapped, report.faces_skipped, report.faces_failed
                );
                Ok(report)
            }
            Err(e) => {
                if let Err(discard_err) = sink.discard() {
                    warn!("Failed to discard partial output: {}", discard_err);
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn swap_frames<S, K, A>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        registry: &IdentityRegistry,
        analyzer: &mut A,
        progress: &mut dyn FnMut(f64),
        cancel: &CancellationToken,
        fps: f64,
        report: &mut SwapReport,
    ) -> Result<()>
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
        A: FaceAnalyzer + ?Sized,
    {
        let total = source.info().frame_count;
        loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }
            let Some(frame) = source.read_frame()? else {
                return Ok(());
            };

            #[allow(clippy::cast_precision_loss)]
            let timestamp = report.frames as f64 / fps;
            let outcome = self.process_frame(&frame, registry, analyzer, Some(timestamp))?;
            sink.write_frame(&outcome.frame)?;

            report.frames += 1;
            report.faces_swapped += outcome.swapped;
            report.faces_skipped += outcome.skipped;
            report.faces_failed += outcome.failed;

            if report.frames % self.progress_interval == 0 {
                progress(percent(report.frames, total));
            }
        }
    }

    /// [`scan`](Self::scan) over a video file
    ///
    /// # Errors
    ///
    /// Returns [`Error::VideoOpen`] if the file cannot be opened
    pub fn scan_file<A, P>(
        &mut self,
        path: P,
        registry: &mut IdentityRegistry,
        analyzer: &mut A,
        progress: &mut dyn FnMut(f64),
        cancel: &CancellationToken,
    ) -> Result<ScanReport>
    where
        A: FaceAnalyzer + ?Sized,
        P: AsRef<Path>,
    {
        registry.clear();
        let mut source = VideoFileSource::open(path, self.fps_fallback)?;
        self.scan(&mut source, registry, analyzer, progress, cancel)
    }

    /// [`swap`](Self::swap) from one video file into another
    ///
    /// # Errors
    ///
    /// Returns [`Error::VideoOpen`] if the input cannot be opened, or any error of the pass
    #[allow(clippy::too_many_arguments)]
    pub fn swap_file<A, P, Q>(
        &mut self,
        input: P,
        output: Q,
        codec: &str,
        registry: &IdentityRegistry,
        analyzer: &mut A,
        progress: &mut dyn FnMut(f64),
        cancel: &CancellationToken,
    ) -> Result<SwapReport>
    where
        A: FaceAnalyzer + ?Sized,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let mut source = VideoFileSource::open(input, self.fps_fallback)?;
        let info = source.info();
        let mut sink = VideoFileSink::create(output, codec, info.fps, info.size())?;
        self.swap(&mut source, &mut sink, registry, analyzer, progress, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(5, 10), 50.0);
        assert_eq!(percent(12, 10), 100.0);
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }
}
