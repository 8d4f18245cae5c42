use opencv::core::{Rect, Size};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use serde::Serialize;

use crate::config::{AppConfig, PipelineConfig};
use crate::error::{ImageError, PipelineError, RecognitionError};
use crate::metrics;
use crate::plate_detection::bounding_box_render::BoundingBoxRender;
use crate::plate_detection::detection_filter::{crop_rect, filter_detections};
use crate::plate_detection::dnn_ocr::TesseractOcr;
use crate::plate_detection::image_reader::encode_jpeg;
use crate::plate_detection::object_detector::ObjectDetector;
use crate::plate_detection::preprocess::preprocess_plate;
use crate::plate_detection::{Detection, PlateDetector, TextRecognizer};
use crate::plate_text::{join_fragments, normalize, NormalizedPlate};
use crate::registry::MatchResult;

/// One line of the per-frame report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlateReport {
    pub plate: String,
    pub owner: String,
}

/// Annotated copy of the frame plus one report per accepted detection.
#[derive(Debug)]
pub struct FrameResult {
    pub image: Mat,
    pub message: String,
    pub detections: Vec<PlateReport>,
}

impl FrameResult {
    pub fn encode_jpeg(&self) -> Result<Vec<u8>, ImageError> {
        encode_jpeg(&self.image)
    }
}

pub fn summary(count: usize) -> String {
    if count == 0 {
        "No plate detected.".to_string()
    } else {
        format!("Detected {count} plate(s).")
    }
}

/// Filter, preprocess, recognize, resolve and annotate the detections of a
/// frame. The owner lookup is injected so the pipeline knows nothing about
/// the registry behind it.
pub struct PlatePipeline<R> {
    recognizer: R,
    config: PipelineConfig,
    renderer: BoundingBoxRender,
}

impl<R: TextRecognizer> PlatePipeline<R> {
    pub fn new(recognizer: R, config: PipelineConfig) -> Self {
        Self {
            recognizer,
            config,
            renderer: BoundingBoxRender::default(),
        }
    }

    pub fn process<F>(
        &mut self,
        frame: &Mat,
        detections: &[Detection],
        mut resolve_owner: F,
    ) -> Result<FrameResult, PipelineError>
    where
        F: FnMut(&NormalizedPlate) -> MatchResult,
    {
        let _timer = metrics::FRAME_PROCESSING_TIME.start_timer();
        metrics::FRAMES_PROCESSED.inc();

        let mut image = frame.try_clone()?;
        let accepted = filter_detections(detections, &self.config);
        metrics::PLATES_DETECTED.inc_by(accepted.len() as u64);
        tracing::debug!(
            total = detections.len(),
            accepted = accepted.len(),
            "filtered detections"
        );

        let frame_size = Size::new(frame.cols(), frame.rows());
        let mut reports = Vec::with_capacity(accepted.len());
        for (index, detection) in accepted.iter().enumerate() {
            let span = tracing::debug_span!("detection", index);
            let _enter = span.enter();

            let result = match crop_rect(&detection.bbox, self.config.crop_padding, frame_size) {
                Some(rect) => {
                    let plate = self.read_plate(frame, rect);
                    if plate.is_placeholder() {
                        MatchResult::no_match(plate.as_str())
                    } else {
                        resolve_owner(&plate)
                    }
                }
                None => {
                    tracing::debug!(bbox = ?detection.bbox, "crop is empty");
                    metrics::record_outcome(metrics::OUTCOME_EMPTY_CROP);
                    MatchResult::no_match(NormalizedPlate::unknown().as_str())
                }
            };

            if let Err(e) = self.renderer.draw_plate(
                &mut image,
                &detection.bbox,
                &result.matched_plate,
                result.owner.as_deref(),
            ) {
                tracing::warn!(error = %e, "cannot annotate detection");
            }

            reports.push(PlateReport {
                plate: result.matched_plate,
                owner: result
                    .owner
                    .unwrap_or_else(|| self.config.no_owner_placeholder.clone()),
            });
        }

        Ok(FrameResult {
            image,
            message: summary(reports.len()),
            detections: reports,
        })
    }

    /// Recognized plate for one crop. Engine failures become `Error`.
    fn read_plate(&mut self, frame: &Mat, rect: Rect) -> NormalizedPlate {
        match self.recognize_crop(frame, rect) {
            Ok(text) => {
                let plate = normalize(&text);
                if plate.is_placeholder() {
                    metrics::record_outcome(metrics::OUTCOME_UNKNOWN);
                } else {
                    metrics::record_outcome(metrics::OUTCOME_OK);
                }
                tracing::debug!(raw = %text, plate = %plate, "recognized");
                plate
            }
            Err(e) => {
                tracing::warn!(error = %e, "plate recognition failed");
                metrics::record_outcome(metrics::OUTCOME_ERROR);
                NormalizedPlate::error()
            }
        }
    }

    fn recognize_crop(&mut self, frame: &Mat, rect: Rect) -> Result<String, RecognitionError> {
        let crop = Mat::roi(frame, rect)?.try_clone()?;
        let binary = preprocess_plate(&crop, &self.config.preprocess)?;
        let fragments = self
            .recognizer
            .recognize(&binary, &self.config.ocr_allowlist)?;
        Ok(join_fragments(&fragments))
    }
}

/// Detector and pipeline bundled for whole-image processing.
pub struct PlateEngine<D, R> {
    detector: D,
    pipeline: PlatePipeline<R>,
}

impl PlateEngine<ObjectDetector, TesseractOcr> {
    /// Loads both engines. Each worker owns its own instance.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let detector = ObjectDetector::plate_detector(&config.detector)?;
        let recognizer = TesseractOcr::new(&config.ocr)?;
        Ok(Self::new(
            detector,
            PlatePipeline::new(recognizer, config.pipeline.clone()),
        ))
    }
}

impl<D: PlateDetector, R: TextRecognizer> PlateEngine<D, R> {
    pub fn new(detector: D, pipeline: PlatePipeline<R>) -> Self {
        Self { detector, pipeline }
    }

    pub fn process_image<F>(
        &mut self,
        frame: &Mat,
        resolve_owner: F,
    ) -> Result<FrameResult, PipelineError>
    where
        F: FnMut(&NormalizedPlate) -> MatchResult,
    {
        let detections = self.detector.detect(frame)?;
        let result = self.pipeline.process(frame, &detections, resolve_owner)?;
        tracing::info!(
            detections = detections.len(),
            plates = result.detections.len(),
            message = %result.message,
            "frame processed"
        );
        Ok(result)
    }
}
