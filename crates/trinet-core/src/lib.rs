//! trinet-core — three-stage cascaded face detection and portrait retouching.
//!
//! The detector runs a proposal network over an image pyramid, then refines
//! surviving boxes with two crop classifiers, the last of which also predicts
//! five facial landmarks. The landmarks drive red-eye correction and eye-level
//! pose alignment. Networks run via ONNX Runtime behind the [`Evaluator`] trait.

pub mod alignment;
pub mod annotate;
pub mod config;
pub mod detector;
pub mod evaluator;
pub mod frame;
pub mod nms;
pub mod onnx;
pub mod pyramid;
pub mod redeye;
pub mod refine;
pub mod retouch;
pub mod rotate;
pub mod stage;
pub mod types;

pub use config::{ConfigError, DetectorConfig};
pub use detector::{DetectorError, FaceDetector};
pub use evaluator::{Evaluator, EvaluatorError, NetOutput, Stage};
pub use frame::Frame;
pub use onnx::OnnxEvaluator;
pub use retouch::{retouch, RetouchReport};
pub use rotate::{rotate_bilinear, Layout};
pub use types::{BoundingBox, Metric, Rgb};
