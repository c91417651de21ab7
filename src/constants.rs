//! Constants used throughout the library

use std::ops::Range;

/// Number of facial landmarks for full face
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Length of a face identity encoding
pub const ENCODING_LENGTH: usize = 128;

/// Landmark index ranges (68-point layout)
pub const JAW: Range<usize> = 0..17;
pub const RIGHT_EYEBROW: Range<usize> = 17..22;
pub const LEFT_EYEBROW: Range<usize> = 22..27;
pub const NOSE: Range<usize> = 27..36;
pub const LEFT_EYE: Range<usize> = 36..42;
pub const RIGHT_EYE: Range<usize> = 42..48;
pub const MOUTH: Range<usize> = 48..68;

/// Jaw plus both eyebrows, the outline used for face masks
pub const FACE_OUTLINE: Range<usize> = 0..27;

/// Default frames per second assumption
pub const DEFAULT_FPS: f64 = 30.0;

/// Identity matching
pub const DEFAULT_RECOGNITION_THRESHOLD: f64 = 0.6;
pub const DEFAULT_DETECTION_SCALE: f64 = 0.5;
pub const DEFAULT_SCAN_FRAME_STRIDE: usize = 10;
pub const DEFAULT_CROP_PADDING: i32 = 50;
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10;

/// Default filter parameters
pub const DEFAULT_EMA_ALPHA: f64 = 0.4;
pub const DEFAULT_ONE_EURO_FREQ: f64 = 30.0;
pub const DEFAULT_ONE_EURO_MIN_CUTOFF: f64 = 1.0;
pub const DEFAULT_ONE_EURO_BETA: f64 = 0.002;
pub const DEFAULT_ONE_EURO_D_CUTOFF: f64 = 1.0;
pub const DEFAULT_KALMAN_PROCESS_VAR: f64 = 1e-3;
pub const DEFAULT_KALMAN_MEASURE_VAR: f64 = 1e-1;

/// Smallest time step the adaptive filter will divide by
pub const MIN_TIME_DELTA: f64 = 1e-6;

/// Blending defaults
pub const DEFAULT_FEATHER_AMOUNT: i32 = 6;
pub const DEFAULT_FEATHER_RADIUS: f32 = 15.0;
pub const DEFAULT_PYRAMID_LEVELS: usize = 4;
pub const MAX_PYRAMID_LEVELS: usize = 8;
pub const DEFAULT_COLOR_STRENGTH: f64 = 0.7;
pub const DEFAULT_COLOR_TEMPORAL_ALPHA: f64 = 0.6;

/// Padding around landmarks when extracting a face region
pub const FACE_REGION_PADDING: i32 = 20;

/// Distance tolerance when mapping triangulation vertices back to point indices
pub const TRIANGLE_VERTEX_TOLERANCE: f32 = 2.0;
