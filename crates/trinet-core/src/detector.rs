//! Three-stage cascaded face detector.
//!
//! Proposal → suppress → refine → Refine stage → suppress → refine →
//! Output stage → refine → suppress (min-area overlap). Any stage that
//! leaves no candidates ends detection early with an empty result.

use crate::config::{ConfigError, DetectorConfig};
use crate::evaluator::{Evaluator, EvaluatorError};
use crate::frame::Frame;
use crate::nms::nms;
use crate::pyramid::scale_pyramid;
use crate::refine::refine;
use crate::stage;
use crate::types::{BoundingBox, Metric};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error("invalid frame: {width}x{height}x{channels} with {len} bytes")]
    InvalidFrame {
        width: u32,
        height: u32,
        channels: u32,
        len: usize,
    },
    #[error("{stage} stage output has unexpected shape: {detail}")]
    ShapeMismatch { stage: &'static str, detail: String },
    #[error("evaluator: {0}")]
    Evaluator(#[from] EvaluatorError),
}

/// Cascaded face detector over a pluggable network [`Evaluator`].
pub struct FaceDetector<E> {
    evaluator: E,
    config: DetectorConfig,
}

impl<E: Evaluator> FaceDetector<E> {
    /// Build a detector, rejecting configurations the cascade cannot run.
    pub fn new(evaluator: E, config: DetectorConfig) -> Result<Self, DetectorError> {
        config.validate()?;
        tracing::info!(
            min_face_size = config.min_face_size,
            pyramid_factor = config.pyramid_factor,
            score_thresholds = ?config.score_thresholds,
            nms_thresholds = ?config.nms_thresholds,
            "face detector ready"
        );
        Ok(Self { evaluator, config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Change the smallest detectable face side. Zero is ignored.
    pub fn set_min_face(&mut self, min_face_size: u32) {
        if min_face_size == 0 {
            tracing::warn!("ignoring zero minimum face size");
            return;
        }
        self.config.min_face_size = min_face_size;
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn into_evaluator(self) -> E {
        self.evaluator
    }

    /// Detect faces in a frame, returning boxes with landmarks in descending score order.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError> {
        if !frame.is_consistent() {
            return Err(DetectorError::InvalidFrame {
                width: frame.width,
                height: frame.height,
                channels: frame.channels,
                len: frame.data.len(),
            });
        }
        let (width, height) = (frame.width, frame.height);
        let cfg = &self.config;

        let scales = scale_pyramid(width, height, cfg.min_face_size, cfg.pyramid_factor);
        if scales.is_empty() {
            tracing::debug!(
                width,
                height,
                min_face_size = cfg.min_face_size,
                "image smaller than minimum face"
            );
            return Ok(Vec::new());
        }

        let image = frame.to_tensor();
        let view = image.view();

        let proposals = stage::propose(
            &mut self.evaluator,
            view,
            &scales,
            cfg.score_thresholds[0],
            cfg.nms_thresholds[0],
        )?;
        tracing::debug!(scales = scales.len(), proposals = proposals.len(), "proposal stage");
        if proposals.is_empty() {
            return Ok(Vec::new());
        }
        let proposals = nms(proposals, cfg.nms_thresholds[0], Metric::Union);
        let proposals = refine(proposals, width, height, true);

        let refined = stage::refine_boxes(
            &mut self.evaluator,
            view,
            proposals,
            cfg.score_thresholds[1],
        )?;
        tracing::debug!(refined = refined.len(), "refine stage");
        if refined.is_empty() {
            return Ok(Vec::new());
        }
        let refined = nms(refined, cfg.nms_thresholds[1], Metric::Union);
        let refined = refine(refined, width, height, true);

        let output =
            stage::output_boxes(&mut self.evaluator, view, refined, cfg.score_thresholds[2])?;
        tracing::debug!(output = output.len(), "output stage");
        if output.is_empty() {
            return Ok(Vec::new());
        }
        let output = refine(output, width, height, true);
        let faces = nms(output, cfg.nms_thresholds[2], Metric::Min);

        tracing::debug!(faces = faces.len(), "detection complete");
        Ok(faces)
    }
}
