//! The network evaluator seam.
//!
//! The cascade only needs per-cell scores and regression maps from each stage;
//! how they are computed (ONNX Runtime, a remote service, a test stub) lives
//! behind [`Evaluator`].

use ndarray::{Array2, Array3, ArrayView3};
use thiserror::Error;

/// Input side of the refine stage's crops.
pub const REFINE_INPUT_SIZE: usize = 24;
/// Input side of the output stage's crops.
pub const OUTPUT_INPUT_SIZE: usize = 48;

#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("model output missing: {0}")]
    MissingOutput(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// One of the three cascade stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Fully convolutional proposal network run over the whole pyramid level.
    Proposal,
    /// 24×24 crop classifier.
    Refine,
    /// 48×48 crop classifier with landmarks.
    Output,
}

impl Stage {
    /// Position in the cascade, used to index per-stage thresholds.
    pub fn index(self) -> usize {
        match self {
            Stage::Proposal => 0,
            Stage::Refine => 1,
            Stage::Output => 2,
        }
    }

    /// Fixed square input side for crop stages; `None` for the proposal stage.
    pub fn input_size(self) -> Option<usize> {
        match self {
            Stage::Proposal => None,
            Stage::Refine => Some(REFINE_INPUT_SIZE),
            Stage::Output => Some(OUTPUT_INPUT_SIZE),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Proposal => "proposal",
            Stage::Refine => "refine",
            Stage::Output => "output",
        }
    }
}

/// Decoded network output for one input.
///
/// Crop stages produce a single cell (`rows == cols == 1`).
#[derive(Debug, Clone)]
pub struct NetOutput {
    /// Foreground probability per cell, shape `(rows, cols)`.
    pub scores: Array2<f32>,
    /// Box regression deltas, shape `(4, rows, cols)`.
    pub regression: Array3<f32>,
    /// Fractional landmark offsets, shape `(10, rows, cols)`: five x values then five y values.
    pub landmarks: Option<Array3<f32>>,
}

impl NetOutput {
    /// Whether the regression (and landmark) maps line up with the score map.
    pub fn is_consistent(&self) -> bool {
        let (rows, cols) = self.scores.dim();
        let lm_ok = self
            .landmarks
            .as_ref()
            .map_or(true, |lm| lm.dim() == (10, rows, cols));
        self.regression.dim() == (4, rows, cols) && lm_ok
    }
}

/// Runs a cascade stage's network on a normalised planar `(3, h, w)` tensor.
///
/// Calls are blocking and sequential; implementations may thread internally.
pub trait Evaluator {
    fn evaluate(
        &mut self,
        stage: Stage,
        input: ArrayView3<f32>,
    ) -> Result<NetOutput, EvaluatorError>;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(
        &mut self,
        stage: Stage,
        input: ArrayView3<f32>,
    ) -> Result<NetOutput, EvaluatorError> {
        (**self).evaluate(stage, input)
    }
}
