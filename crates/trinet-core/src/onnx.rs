//! ONNX Runtime backend for the three cascade networks.
//!
//! Expects `det1.onnx`, `det2.onnx` and `det3.onnx` (proposal, refine, output)
//! in one model directory. Each takes a `(1, 3, h, w)` float tensor.

use crate::evaluator::{Evaluator, EvaluatorError, NetOutput, Stage};
use ndarray::{Array2, Array3, ArrayView3, Axis};
use ort::session::Session;
use ort::value::{DynValue, TensorRef};
use std::path::Path;

/// Model file per stage, in cascade order.
pub const MODEL_FILES: [&str; 3] = ["det1.onnx", "det2.onnx", "det3.onnx"];

const SCORE_OUTPUT: &str = "prob1";
const LANDMARK_OUTPUT: &str = "conv6-3";
const SCORE_CHANNELS: usize = 2;
const REGRESSION_CHANNELS: usize = 4;
const LANDMARK_CHANNELS: usize = 10;

/// Output tensor positions for one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputIndices {
    scores: usize,
    regression: usize,
    landmarks: Option<usize>,
}

struct StageNet {
    session: Session,
    outputs: OutputIndices,
}

/// [`Evaluator`] backed by one ONNX Runtime session per stage.
pub struct OnnxEvaluator {
    proposal: StageNet,
    refine: StageNet,
    output: StageNet,
}

impl OnnxEvaluator {
    /// Load all three networks from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EvaluatorError> {
        Ok(Self {
            proposal: load_stage(model_dir, Stage::Proposal)?,
            refine: load_stage(model_dir, Stage::Refine)?,
            output: load_stage(model_dir, Stage::Output)?,
        })
    }

    fn net_mut(&mut self, stage: Stage) -> &mut StageNet {
        match stage {
            Stage::Proposal => &mut self.proposal,
            Stage::Refine => &mut self.refine,
            Stage::Output => &mut self.output,
        }
    }
}

fn load_stage(model_dir: &Path, stage: Stage) -> Result<StageNet, EvaluatorError> {
    let path = model_dir.join(MODEL_FILES[stage.index()]);
    if !path.exists() {
        return Err(EvaluatorError::ModelNotFound(path.display().to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(&path)?;

    let output_names: Vec<String> =
        session.outputs().iter().map(|o| o.name().to_string()).collect();
    tracing::info!(
        stage = stage.name(),
        path = %path.display(),
        outputs = ?output_names,
        "loaded cascade model"
    );

    let outputs = discover_output_indices(stage, &output_names)?;
    tracing::debug!(stage = stage.name(), ?outputs, "output tensor mapping");
    Ok(StageNet { session, outputs })
}

fn regression_output(stage: Stage) -> &'static str {
    match stage {
        Stage::Proposal => "conv4-2",
        Stage::Refine => "conv5-2",
        Stage::Output => "conv6-2",
    }
}

/// Locate score, regression and landmark outputs by name, falling back to
/// position (scores, regression, landmarks) when the names are not the usual ones.
fn discover_output_indices(
    stage: Stage,
    names: &[String],
) -> Result<OutputIndices, EvaluatorError> {
    let wants_landmarks = stage == Stage::Output;
    let required = if wants_landmarks { 3 } else { 2 };
    if names.len() < required {
        return Err(EvaluatorError::MissingOutput(format!(
            "{} network needs {required} outputs, got {}",
            stage.name(),
            names.len()
        )));
    }

    let find = |target: &str| names.iter().position(|n| n == target);
    let named = (
        find(SCORE_OUTPUT),
        find(regression_output(stage)),
        if wants_landmarks { find(LANDMARK_OUTPUT) } else { None },
    );

    match named {
        (Some(scores), Some(regression), landmarks) if !wants_landmarks || landmarks.is_some() => {
            Ok(OutputIndices { scores, regression, landmarks })
        }
        _ => {
            tracing::info!(
                stage = stage.name(),
                ?names,
                "output names not recognised, using positional mapping"
            );
            Ok(OutputIndices {
                scores: 0,
                regression: 1,
                landmarks: wants_landmarks.then_some(2),
            })
        }
    }
}

/// Reshape a `(1, C, H, W)` or `(1, C)` output into `(C, H, W)`.
fn decode_map(
    name: &str,
    shape: &[i64],
    data: &[f32],
    channels: usize,
) -> Result<Array3<f32>, EvaluatorError> {
    let c = channels as i64;
    let (rows, cols) = match *shape {
        [1, ch, h, w] if ch == c && h >= 0 && w >= 0 => (h as usize, w as usize),
        [1, ch] if ch == c => (1, 1),
        _ => {
            return Err(EvaluatorError::InferenceFailed(format!(
                "{name}: unexpected shape {shape:?}, want {channels} channels"
            )))
        }
    };
    Array3::from_shape_vec((channels, rows, cols), data.to_vec())
        .map_err(|e| EvaluatorError::InferenceFailed(format!("{name}: {e}")))
}

fn extract_map(
    value: &DynValue,
    what: &str,
    channels: usize,
) -> Result<Array3<f32>, EvaluatorError> {
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(|e| EvaluatorError::InferenceFailed(format!("{what}: {e}")))?;
    decode_map(what, shape, data, channels)
}

/// Foreground plane of a two-class softmax map.
fn foreground(probs: Array3<f32>) -> Array2<f32> {
    probs.index_axis_move(Axis(0), 1)
}

impl Evaluator for OnnxEvaluator {
    fn evaluate(
        &mut self,
        stage: Stage,
        input: ArrayView3<f32>,
    ) -> Result<NetOutput, EvaluatorError> {
        let net = self.net_mut(stage);
        let indices = net.outputs;
        let batch = input.insert_axis(Axis(0));
        let batch = batch.as_standard_layout();

        let outputs = net.session.run(ort::inputs![TensorRef::from_array_view(batch.view())?])?;

        let scores = foreground(extract_map(&outputs[indices.scores], "scores", SCORE_CHANNELS)?);
        let regression =
            extract_map(&outputs[indices.regression], "regression", REGRESSION_CHANNELS)?;
        let landmarks = match indices.landmarks {
            Some(idx) => Some(extract_map(&outputs[idx], "landmarks", LANDMARK_CHANNELS)?),
            None => None,
        };

        tracing::trace!(stage = stage.name(), cells = ?scores.dim(), "stage evaluated");
        Ok(NetOutput { scores, regression, landmarks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_named_outputs_in_any_order() {
        let idx = discover_output_indices(Stage::Proposal, &names(&["conv4-2", "prob1"])).unwrap();
        assert_eq!(idx, OutputIndices { scores: 1, regression: 0, landmarks: None });

        let idx =
            discover_output_indices(Stage::Output, &names(&["conv6-2", "conv6-3", "prob1"]))
                .unwrap();
        assert_eq!(idx, OutputIndices { scores: 2, regression: 0, landmarks: Some(1) });
    }

    #[test]
    fn test_unknown_names_fall_back_to_position() {
        let idx = discover_output_indices(Stage::Refine, &names(&["out0", "out1"])).unwrap();
        assert_eq!(idx, OutputIndices { scores: 0, regression: 1, landmarks: None });

        // Landmark output missing by name: the whole mapping is positional.
        let idx =
            discover_output_indices(Stage::Output, &names(&["prob1", "conv6-2", "x"])).unwrap();
        assert_eq!(idx, OutputIndices { scores: 0, regression: 1, landmarks: Some(2) });
    }

    #[test]
    fn test_too_few_outputs_rejected() {
        let err =
            discover_output_indices(Stage::Output, &names(&["prob1", "conv6-2"])).unwrap_err();
        assert!(matches!(err, EvaluatorError::MissingOutput(_)));
    }

    #[test]
    fn test_decode_full_map() {
        let data: Vec<f32> = (0..2 * 3 * 4).map(|v| v as f32).collect();
        let map = decode_map("scores", &[1, 2, 3, 4], &data, 2).unwrap();
        assert_eq!(map.dim(), (2, 3, 4));
        let fg = foreground(map);
        assert_eq!(fg.dim(), (3, 4));
        assert_eq!(fg[[0, 0]], 12.0);
        assert_eq!(fg[[2, 3]], 23.0);
    }

    #[test]
    fn test_decode_flat_crop_output() {
        let map = decode_map("regression", &[1, 4], &[0.1, 0.2, 0.3, 0.4], 4).unwrap();
        assert_eq!(map.dim(), (4, 1, 1));
        assert_eq!(map[[3, 0, 0]], 0.4);
    }

    #[test]
    fn test_decode_wrong_channels_rejected() {
        let err = decode_map("landmarks", &[1, 8], &[0.0; 8], 10).unwrap_err();
        assert!(matches!(err, EvaluatorError::InferenceFailed(_)));
    }

    #[test]
    fn test_missing_model_dir() {
        let err = OnnxEvaluator::load(Path::new("/nonexistent/trinet-models")).err().unwrap();
        assert!(matches!(err, EvaluatorError::ModelNotFound(ref p) if p.ends_with("det1.onnx")));
    }
}
