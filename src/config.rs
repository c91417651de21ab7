//! Configuration management for the face swap pipeline

use crate::{
    accel::Acceleration,
    blend::{
        clone::CloneMode,
        color::{ColorMatcher, ColorMethod},
        mask::{FeatherMode, MaskBuilder},
        BlendMethod, Blender,
    },
    capabilities::Capabilities,
    constants::{
        DEFAULT_COLOR_STRENGTH, DEFAULT_COLOR_TEMPORAL_ALPHA, DEFAULT_CROP_PADDING, DEFAULT_DETECTION_SCALE,
        DEFAULT_EMA_ALPHA, DEFAULT_FEATHER_AMOUNT, DEFAULT_FEATHER_RADIUS, DEFAULT_FPS, DEFAULT_KALMAN_MEASURE_VAR,
        DEFAULT_KALMAN_PROCESS_VAR, DEFAULT_ONE_EURO_BETA, DEFAULT_ONE_EURO_D_CUTOFF, DEFAULT_ONE_EURO_FREQ,
        DEFAULT_ONE_EURO_MIN_CUTOFF, DEFAULT_PROGRESS_INTERVAL, DEFAULT_PYRAMID_LEVELS, DEFAULT_RECOGNITION_THRESHOLD,
        DEFAULT_SCAN_FRAME_STRIDE, MAX_PYRAMID_LEVELS,
    },
    filters::{create_filter, LandmarkFilter, LandmarkSmoother},
    identity::IdentityRegistry,
    swapper::FaceSwapper,
    warp::{WarpEngine, WarpMode},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Face detection parameters
    pub detection: DetectionConfig,

    /// Identity matching parameters
    pub recognition: RecognitionConfig,

    /// Identity scan pass parameters
    pub scan: ScanConfig,

    /// Compositing configuration
    pub blend: BlendConfig,

    /// Color correction configuration
    pub color: ColorConfig,

    /// Alignment configuration
    pub warp: WarpConfig,

    /// Landmark smoothing configuration
    pub smoothing: SmoothingConfig,

    /// Video output configuration
    pub video: VideoConfig,
}

/// Face detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Factor the detector may downscale frames by (0.0-1.0]
    pub scale_factor: f64,
}

/// Identity matching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Encodings closer than this belong to the same person
    pub threshold: f64,
}

/// Identity scan pass parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Analyse every N-th frame, starting with the first
    pub frame_stride: usize,

    /// Pixels added around a face box when storing its crop
    pub crop_padding: i32,

    /// Frames between progress reports
    pub progress_interval: usize,
}

/// Compositing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// Compositing method
    pub method: BlendMethod,

    /// Gaussian feather half-size in pixels
    pub feather_amount: i32,

    /// Mask feathering mode
    pub feather_mode: FeatherMode,

    /// Ramp width of the distance feather in pixels
    pub feather_radius: f32,

    /// Pyramid levels for the Laplacian blend (1-8)
    pub pyramid_levels: usize,

    /// Seamless clone gradient mode
    pub clone_mode: CloneMode,
}

/// Color correction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Enable color correction
    pub enabled: bool,

    /// Matching method
    pub method: ColorMethod,

    /// Histogram match strength (0.0-1.0)
    pub strength: f64,

    /// Weight of the newest frame when smoothing gains over time (0.0-1.0]
    pub temporal_alpha: f64,
}

/// Alignment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    /// Alignment mode
    pub mode: WarpMode,
}

/// Landmark smoothing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMethod {
    /// Raw landmarks
    None,
    /// Exponential moving average
    Ema,
    /// Adaptive low-pass
    #[default]
    OneEuro,
    /// Per-dimension Kalman filter
    Kalman,
}

/// Landmark smoothing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Strategy
    pub method: SmoothingMethod,

    /// EMA parameters
    pub ema: EmaConfig,

    /// Adaptive low-pass parameters
    pub one_euro: OneEuroConfig,

    /// Kalman parameters
    pub kalman: KalmanConfig,
}

/// EMA parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaConfig {
    /// Weight of the newest sample (0.0-1.0]
    pub alpha: f64,
}

/// Adaptive low-pass parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OneEuroConfig {
    /// Sampling frequency in Hz
    pub freq: f64,

    /// Cutoff at zero speed
    pub min_cutoff: f64,

    /// Speed coefficient
    pub beta: f64,

    /// Derivative cutoff
    pub d_cutoff: f64,
}

/// Kalman parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process noise variance
    pub process_var: f64,

    /// Measurement noise variance
    pub measure_var: f64,
}

/// Video output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame rate assumed when the input reports none
    pub fps_fallback: f64,

    /// Four-character output codec
    pub codec: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_DETECTION_SCALE,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_RECOGNITION_THRESHOLD,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            frame_stride: DEFAULT_SCAN_FRAME_STRIDE,
            crop_padding: DEFAULT_CROP_PADDING,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            method: BlendMethod::Seamless,
            feather_amount: DEFAULT_FEATHER_AMOUNT,
            feather_mode: FeatherMode::Gaussian,
            feather_radius: DEFAULT_FEATHER_RADIUS,
            pyramid_levels: DEFAULT_PYRAMID_LEVELS,
            clone_mode: CloneMode::Normal,
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: ColorMethod::MeanGain,
            strength: DEFAULT_COLOR_STRENGTH,
            temporal_alpha: DEFAULT_COLOR_TEMPORAL_ALPHA,
        }
    }
}

impl Default for EmaConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_EMA_ALPHA,
        }
    }
}

impl Default for OneEuroConfig {
    fn default() -> Self {
        Self {
            freq: DEFAULT_ONE_EURO_FREQ,
            min_cutoff: DEFAULT_ONE_EURO_MIN_CUTOFF,
            beta: DEFAULT_ONE_EURO_BETA,
            d_cutoff: DEFAULT_ONE_EURO_D_CUTOFF,
        }
    }
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            process_var: DEFAULT_KALMAN_PROCESS_VAR,
            measure_var: DEFAULT_KALMAN_MEASURE_VAR,
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps_fallback: DEFAULT_FPS,
            codec: "mp4v".to_string(),
        }
    }
}

impl SmoothingConfig {
    /// Filter description understood by [`create_filter`]
    #[must_use]
    pub fn filter_description(&self) -> String {
        match self.method {
            SmoothingMethod::None => "none".to_string(),
            SmoothingMethod::Ema => format!("ema:{}", self.ema.alpha),
            SmoothingMethod::OneEuro => format!(
                "one_euro:{}:{}:{}:{}",
                self.one_euro.freq, self.one_euro.min_cutoff, self.one_euro.beta, self.one_euro.d_cutoff
            ),
            SmoothingMethod::Kalman => format!("kalman:{}:{}", self.kalman.process_var, self.kalman.measure_var),
        }
    }

    /// Fresh filter for one track
    pub fn create_filter(&self) -> Result<Box<dyn LandmarkFilter>> {
        create_filter(&self.filter_description())
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::IoError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| Error::IoError(e.to_string()))?;

        Ok(())
    }

    /// Landmark smoother for one identity track
    pub fn create_smoother(&self) -> Result<LandmarkSmoother> {
        Ok(LandmarkSmoother::new(self.smoothing.create_filter()?))
    }

    /// Identity registry with the configured threshold
    pub fn identity_registry(&self) -> Result<IdentityRegistry> {
        IdentityRegistry::new(self.recognition.threshold)
    }

    /// Warp engine for the configured mode
    pub fn warp_engine(&self, capabilities: &Capabilities, accel: Acceleration) -> Result<WarpEngine> {
        WarpEngine::new(self.warp.mode, capabilities, accel)
    }

    /// Blender with the configured mask and method
    #[must_use]
    pub fn blender(&self, accel: Acceleration) -> Blender {
        let masks = MaskBuilder::new(
            self.blend.feather_mode,
            self.blend.feather_amount,
            self.blend.feather_radius,
            accel,
        );
        Blender::new(self.blend.method, masks, self.blend.clone_mode, self.blend.pyramid_levels)
    }

    /// Color matcher, `None` when color correction is disabled
    #[must_use]
    pub fn color_matcher(&self, capabilities: &Capabilities) -> Option<ColorMatcher> {
        self.color
            .enabled
            .then(|| ColorMatcher::new(self.color.method, self.color.strength, capabilities))
    }

    /// Complete single-face swapper
    pub fn face_swapper(&self, capabilities: &Capabilities, accel: Acceleration) -> Result<FaceSwapper> {
        Ok(FaceSwapper::new(
            self.warp_engine(capabilities, accel.clone())?,
            self.color_matcher(capabilities),
            self.blender(accel),
        ))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Detection and matching
        if !(self.detection.scale_factor > 0.0 && self.detection.scale_factor <= 1.0) {
            return Err(Error::ConfigError(
                "Detection scale factor must be in (0.0, 1.0]".to_string(),
            ));
        }
        if !(self.recognition.threshold.is_finite() && self.recognition.threshold > 0.0) {
            return Err(Error::ConfigError(
                "Recognition threshold must be positive".to_string(),
            ));
        }

        // Scan pass
        if self.scan.frame_stride == 0 {
            return Err(Error::ConfigError("Scan frame stride must be greater than 0".to_string()));
        }
        if self.scan.progress_interval == 0 {
            return Err(Error::ConfigError(
                "Progress interval must be greater than 0".to_string(),
            ));
        }
        if self.scan.crop_padding < 0 {
            return Err(Error::ConfigError("Crop padding must not be negative".to_string()));
        }

        // Blending
        if self.blend.feather_amount < 0 {
            return Err(Error::ConfigError("Feather amount must not be negative".to_string()));
        }
        if !(self.blend.feather_radius.is_finite() && self.blend.feather_radius > 0.0) {
            return Err(Error::ConfigError("Feather radius must be positive".to_string()));
        }
        if !(1..=MAX_PYRAMID_LEVELS).contains(&self.blend.pyramid_levels) {
            return Err(Error::ConfigError(format!(
                "Pyramid levels must be between 1 and {}",
                MAX_PYRAMID_LEVELS
            )));
        }

        // Color correction
        if !(0.0..=1.0).contains(&self.color.strength) {
            return Err(Error::ConfigError(
                "Color strength must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(self.color.temporal_alpha > 0.0 && self.color.temporal_alpha <= 1.0) {
            return Err(Error::ConfigError(
                "Color temporal alpha must be in (0.0, 1.0]".to_string(),
            ));
        }

        // Smoothing parameters are checked by the filter factory
        self.smoothing
            .create_filter()
            .map_err(|e| Error::ConfigError(format!("Invalid smoothing settings: {}", e)))?;

        // Video
        if !(self.video.fps_fallback.is_finite() && self.video.fps_fallback > 0.0) {
            return Err(Error::ConfigError("Fallback FPS must be positive".to_string()));
        }
        if self.video.codec.chars().count() != 4 {
            return Err(Error::ConfigError(format!(
                "Codec must be four characters, got '{}'",
                self.video.codec
            )));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Face Swap Configuration

# Face detection
detection:
  scale_factor: 0.5

# Identity matching
recognition:
  threshold: 0.6

# Identity scan pass
scan:
  frame_stride: 10
  crop_padding: 50
  progress_interval: 10

# Compositing: seamless | alpha | laplacian
blend:
  method: seamless
  feather_amount: 6
  feather_mode: gaussian
  feather_radius: 15.0
  pyramid_levels: 4
  clone_mode: normal

# Color correction: mean_gain | histogram
color:
  enabled: true
  method: mean_gain
  strength: 0.7
  temporal_alpha: 0.6

# Alignment: affine | triangulated | smooth
warp:
  mode: affine

# Landmark smoothing: none | ema | one_euro | kalman
smoothing:
  method: one_euro
  ema:
    alpha: 0.4
  one_euro:
    freq: 30.0
    min_cutoff: 1.0
    beta: 0.002
    d_cutoff: 1.0
  kalman:
    process_var: 0.001
    measure_var: 0.1

# Video output
video:
  fps_fallback: 30.0
  codec: "mp4v"
"#;
