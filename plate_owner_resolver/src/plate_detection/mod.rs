pub mod bounding_box_render;
pub mod detection_filter;
pub mod dnn_ocr;
pub mod image_reader;
pub mod object_detector;
pub mod preprocess;

use opencv::prelude::Mat;
use serde::Serialize;

use crate::error::{DetectionError, RecognitionError};

/// Pixel box given by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxXyxy {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoxXyxy {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// One object found by the detection engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub class_id: i32,
    pub confidence: f32,
    pub bbox: BoxXyxy,
}

impl Detection {
    pub fn new(class_id: i32, confidence: f32, bbox: BoxXyxy) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// Finds candidate plates in a BGR frame.
pub trait PlateDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, DetectionError>;
}

/// Reads text from a preprocessed single channel image, restricted to the
/// characters in `allowlist`. Returns zero or more text fragments.
pub trait TextRecognizer {
    fn recognize(&mut self, image: &Mat, allowlist: &str) -> Result<Vec<String>, RecognitionError>;
}

impl<T: PlateDetector + ?Sized> PlateDetector for Box<T> {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, DetectionError> {
        (**self).detect(frame)
    }
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for Box<T> {
    fn recognize(&mut self, image: &Mat, allowlist: &str) -> Result<Vec<String>, RecognitionError> {
        (**self).recognize(image, allowlist)
    }
}

impl<T: TextRecognizer + ?Sized> TextRecognizer for &mut T {
    fn recognize(&mut self, image: &Mat, allowlist: &str) -> Result<Vec<String>, RecognitionError> {
        (**self).recognize(image, allowlist)
    }
}
