use opencv::core::{Rect, Scalar, Size, Vector, CV_32F};
use opencv::dnn;
use opencv::dnn::blob_from_image;
use opencv::dnn::nms_boxes;
use opencv::dnn::Net;
use opencv::dnn::DNN_BACKEND_CUDA;
use opencv::dnn::DNN_BACKEND_OPENCV;
use opencv::dnn::DNN_TARGET_CPU;
use opencv::dnn::DNN_TARGET_CUDA;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;
use opencv::prelude::NetTrait;
use opencv::prelude::NetTraitConst;

use super::{BoxXyxy, Detection, PlateDetector};
use crate::config::{DetectorConfig, YoloLayout};
use crate::error::DetectionError;

/// Raw box proposal before non maximum suppression, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    pub class_id: i32,
    pub score: f32,
    pub rect: Rect,
}

/// Scale from network input to frame coordinates.
#[derive(Debug, Clone, Copy)]
pub struct InputScale {
    pub x_factor: f32,
    pub y_factor: f32,
}

fn to_rect(cx: f32, cy: f32, w: f32, h: f32, scale: InputScale) -> Rect {
    let left = (cx - 0.5 * w) * scale.x_factor;
    let top = (cy - 0.5 * h) * scale.y_factor;
    let width = w * scale.x_factor;
    let height = h * scale.y_factor;
    Rect::new(left as i32, top as i32, width as i32, height as i32)
}

/// Decodes a `[1, 4 + classes, anchors]` output laid out row major.
pub fn decode_yolov8(
    data: &[f32],
    channels: usize,
    anchors: usize,
    scale: InputScale,
    min_score: f32,
) -> Vec<Proposal> {
    let mut proposals = Vec::new();
    if channels < 5 || data.len() < channels * anchors {
        return proposals;
    }
    let at = |c: usize, i: usize| data[c * anchors + i];

    for i in 0..anchors {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for c in 4..channels {
            let score = at(c, i);
            if score > best_score {
                best_score = score;
                best_class = c - 4;
            }
        }
        if best_score < min_score {
            continue;
        }
        proposals.push(Proposal {
            class_id: best_class as i32,
            score: best_score,
            rect: to_rect(at(0, i), at(1, i), at(2, i), at(3, i), scale),
        });
    }
    proposals
}

/// Decodes a `[1, anchors, 5 + classes]` output. The score is objectness
/// times the best class probability.
pub fn decode_yolov5(
    data: &[f32],
    anchors: usize,
    row_len: usize,
    scale: InputScale,
    min_score: f32,
) -> Vec<Proposal> {
    let mut proposals = Vec::new();
    if row_len < 6 || data.len() < row_len * anchors {
        return proposals;
    }

    for row in data.chunks_exact(row_len).take(anchors) {
        let objectness = row[4];
        if objectness < min_score {
            continue;
        }
        let mut best_class = 0;
        let mut best_prob = f32::MIN;
        for (c, &prob) in row[5..].iter().enumerate() {
            if prob > best_prob {
                best_prob = prob;
                best_class = c;
            }
        }
        let score = objectness * best_prob;
        if score < min_score {
            continue;
        }
        proposals.push(Proposal {
            class_id: best_class as i32,
            score,
            rect: to_rect(row[0], row[1], row[2], row[3], scale),
        });
    }
    proposals
}

/// Corner form of a proposal rectangle. Saturates for the huge sizes a
/// non finite model output decodes to.
pub fn to_xyxy(rect: Rect) -> BoxXyxy {
    BoxXyxy::new(
        rect.x,
        rect.y,
        rect.x.saturating_add(rect.width),
        rect.y.saturating_add(rect.height),
    )
}

/// Class agnostic NMS, returning detections ordered by OpenCV's ranking.
pub fn suppress(
    proposals: &[Proposal],
    min_score: f32,
    nms_threshold: f32,
) -> opencv::Result<Vec<Detection>> {
    let boxes: Vector<Rect> = proposals.iter().map(|p| p.rect).collect();
    let confidences: Vector<f32> = proposals.iter().map(|p| p.score).collect();

    let mut indices = Vector::<i32>::default();
    nms_boxes(&boxes, &confidences, min_score, nms_threshold, &mut indices, 1.0, 0)?;

    let mut output = Vec::with_capacity(indices.len());
    for i in indices {
        let Some(p) = proposals.get(i as usize) else {
            continue;
        };
        output.push(Detection::new(p.class_id, p.score, to_xyxy(p.rect)));
    }
    Ok(output)
}

/// YOLO plate detector running on OpenCV's DNN module.
pub struct ObjectDetector {
    classifier: Net,
    config: DetectorConfig,
}

impl ObjectDetector {
    pub fn plate_detector(config: &DetectorConfig) -> Result<Self, DetectionError> {
        let mut classifier =
            dnn::read_net_from_onnx(&config.model_path).map_err(|source| {
                DetectionError::ModelLoad {
                    path: config.model_path.clone(),
                    source,
                }
            })?;

        if config.use_gpu {
            classifier.set_preferable_backend(DNN_BACKEND_CUDA)?;
            classifier.set_preferable_target(DNN_TARGET_CUDA)?;
        } else {
            classifier.set_preferable_backend(DNN_BACKEND_OPENCV)?;
            classifier.set_preferable_target(DNN_TARGET_CPU)?;
        }
        tracing::info!(
            model = %config.model_path,
            gpu = config.use_gpu,
            layout = ?config.layout,
            "plate detector loaded"
        );

        Ok(ObjectDetector {
            classifier,
            config: config.clone(),
        })
    }

    fn post_process(
        &self,
        img_rows: i32,
        img_cols: i32,
        output: &Mat,
    ) -> opencv::Result<Vec<Detection>> {
        let scale = InputScale {
            x_factor: img_cols as f32 / self.config.input_size as f32,
            y_factor: img_rows as f32 / self.config.input_size as f32,
        };
        let shape = output.mat_size();
        let dims: &[i32] = &shape;
        if dims.len() != 3 {
            tracing::warn!(?dims, "unexpected detector output shape");
            return Ok(Vec::new());
        }
        let data = output.data_typed::<f32>()?;
        let (d1, d2) = (dims[1] as usize, dims[2] as usize);

        let proposals = match self.config.layout {
            YoloLayout::Yolov8 => decode_yolov8(data, d1, d2, scale, self.config.min_score),
            YoloLayout::Yolov5 => decode_yolov5(data, d1, d2, scale, self.config.min_score),
        };
        suppress(&proposals, self.config.min_score, self.config.nms_threshold)
    }
}

impl PlateDetector for ObjectDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, DetectionError> {
        let size = self.config.input_size;
        let blob = blob_from_image(
            frame,
            1.0 / 255.0,
            Size::new(size, size),
            Scalar::default(),
            true,
            false,
            CV_32F,
        )?;

        // Set the input of the network
        self.classifier.set_input(&blob, "", 1.0, Scalar::default())?;

        let output_names = self.classifier.get_unconnected_out_layers_names()?;
        let mut output_values = Vector::<Mat>::default();
        self.classifier.forward(&mut output_values, &output_names)?;

        let mut detections = Vec::new();
        for output in output_values.iter() {
            detections.extend(self.post_process(frame.rows(), frame.cols(), &output)?);
        }
        tracing::debug!(count = detections.len(), "plate detections");
        Ok(detections)
    }
}
