use std::collections::VecDeque;

use opencv::core::{Rect, Scalar, CV_8UC3};
use opencv::imgproc::{rectangle, LINE_8};
use opencv::prelude::*;

use plate_owner_resolver::config::{PipelineConfig, ResolverConfig};
use plate_owner_resolver::error::{DetectionError, RecognitionError, StoreError};
use plate_owner_resolver::plate_detection::{BoxXyxy, Detection, PlateDetector, TextRecognizer};
use plate_owner_resolver::registry::InMemoryRecordStore;
use plate_owner_resolver::{
    MatchResult, NormalizedPlate, OwnerResolver, PlateEngine, PlatePipeline, PlateReport,
    RecordStore, RegistryEntry,
};

/// Replays canned recognition results, one per call.
struct ScriptedOcr {
    replies: VecDeque<Result<Vec<String>, String>>,
    calls: usize,
}

impl ScriptedOcr {
    fn new(replies: Vec<Result<Vec<&str>, &str>>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|r| {
                    r.map(|lines| lines.into_iter().map(String::from).collect())
                        .map_err(String::from)
                })
                .collect(),
            calls: 0,
        }
    }
}

impl TextRecognizer for ScriptedOcr {
    fn recognize(&mut self, image: &Mat, allowlist: &str) -> Result<Vec<String>, RecognitionError> {
        self.calls += 1;
        assert_eq!(image.channels(), 1);
        assert!(!allowlist.is_empty());
        match self.replies.pop_front() {
            Some(Ok(lines)) => Ok(lines),
            Some(Err(message)) => Err(RecognitionError::Engine(message)),
            None => Ok(Vec::new()),
        }
    }
}

struct FixedDetector(Vec<Detection>);

impl PlateDetector for FixedDetector {
    fn detect(&mut self, _frame: &Mat) -> Result<Vec<Detection>, DetectionError> {
        Ok(self.0.clone())
    }
}

struct BrokenStore;

impl RecordStore for BrokenStore {
    fn snapshot(&self) -> Result<Vec<RegistryEntry>, StoreError> {
        Err(StoreError::Unavailable(rusqlite::Error::InvalidQuery))
    }
}

fn frame() -> Mat {
    let mut image =
        Mat::new_rows_cols_with_default(480, 640, CV_8UC3, Scalar::all(200.0)).expect("mat");
    // bright plate with one dark stroke
    rectangle(&mut image, Rect::new(200, 300, 160, 50), Scalar::all(240.0), -1, LINE_8, 0)
        .expect("draw");
    rectangle(&mut image, Rect::new(215, 310, 20, 30), Scalar::all(20.0), -1, LINE_8, 0)
        .expect("draw");
    image
}

fn plate_detection(confidence: f32) -> Detection {
    Detection::new(0, confidence, BoxXyxy::new(200, 300, 360, 350))
}

fn registry() -> OwnerResolver<InMemoryRecordStore> {
    let store = InMemoryRecordStore::new(vec![RegistryEntry {
        plate: "51F12345".to_string(),
        owner_name: "Nguyen Van A".to_string(),
        phone: "0900000000".to_string(),
        vehicle_info: String::new(),
    }]);
    OwnerResolver::new(store, ResolverConfig::default())
}

fn report(plate: &str, owner: &str) -> PlateReport {
    PlateReport {
        plate: plate.to_string(),
        owner: owner.to_string(),
    }
}

#[test]
fn recognizes_and_resolves_a_registered_plate() {
    let resolver = registry();
    let mut pipeline = PlatePipeline::new(
        ScriptedOcr::new(vec![Ok(vec!["51F-123.45"])]),
        PipelineConfig::default(),
    );

    let result = pipeline
        .process(&frame(), &[plate_detection(0.9)], |plate| resolver.resolve(plate))
        .expect("process");

    assert_eq!(result.message, "Detected 1 plate(s).");
    assert_eq!(
        result.detections,
        vec![report("51F12345", "Nguyen Van A (0900000000)")]
    );
}

#[test]
fn no_surviving_detection_leaves_image_untouched() {
    let input = frame();
    let mut pipeline = PlatePipeline::new(ScriptedOcr::new(vec![]), PipelineConfig::default());
    let detections = [
        Detection::new(1, 0.99, BoxXyxy::new(200, 300, 360, 350)),
        plate_detection(0.1),
    ];

    let mut lookups = 0;
    let result = pipeline
        .process(&input, &detections, |plate| {
            lookups += 1;
            MatchResult::no_match(plate.as_str())
        })
        .expect("process");

    assert_eq!(result.message, "No plate detected.");
    assert!(result.detections.is_empty());
    assert_eq!(lookups, 0);
    assert_eq!(
        result.image.data_bytes().expect("bytes"),
        input.data_bytes().expect("bytes")
    );
}

#[test]
fn every_accepted_detection_gets_a_result() {
    let resolver = registry();
    let mut ocr = ScriptedOcr::new(vec![
        Ok(vec!["51F-123.45"]),
        Err("engine crashed"),
        Ok(vec!["1."]),
    ]);
    let detections = [
        plate_detection(0.9),
        Detection::new(0, 0.8, BoxXyxy::new(20, 20, 180, 70)),
        // entirely outside the frame
        Detection::new(0, 0.9, BoxXyxy::new(700, 10, 760, 40)),
        Detection::new(0, 0.5, BoxXyxy::new(400, 100, 560, 150)),
        Detection::new(2, 0.9, BoxXyxy::new(10, 400, 100, 450)),
        plate_detection(0.2),
    ];

    let mut pipeline = PlatePipeline::new(&mut ocr, PipelineConfig::default());
    let mut looked_up = Vec::new();
    let result = pipeline
        .process(&frame(), &detections, |plate| {
            looked_up.push(plate.clone());
            resolver.resolve(plate)
        })
        .expect("process");

    assert_eq!(result.message, "Detected 4 plate(s).");
    assert_eq!(
        result.detections,
        vec![
            report("51F12345", "Nguyen Van A (0900000000)"),
            report("Error", "No information"),
            report("Unknown", "No information"),
            report("Unknown", "No information"),
        ]
    );
    // placeholders never reach the registry
    assert_eq!(looked_up, vec![plate_owner_resolver::normalize("51F12345")]);
    drop(pipeline);
    // the out-of-frame box is never recognized
    assert_eq!(ocr.calls, 3);
}

#[test]
fn extreme_box_coordinates_still_produce_a_report() {
    let resolver = registry();
    let mut pipeline = PlatePipeline::new(
        ScriptedOcr::new(vec![Ok(vec!["51F-123.45"])]),
        PipelineConfig::default(),
    );
    let detections = [Detection::new(
        0,
        0.9,
        BoxXyxy::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX),
    )];

    let result = pipeline
        .process(&frame(), &detections, |plate| resolver.resolve(plate))
        .expect("process");

    assert_eq!(result.message, "Detected 1 plate(s).");
    assert_eq!(
        result.detections,
        vec![report("51F12345", "Nguyen Van A (0900000000)")]
    );
}

#[test]
fn unreadable_registry_is_no_match() {
    let resolver = OwnerResolver::new(BrokenStore, ResolverConfig::default());
    let mut pipeline = PlatePipeline::new(
        ScriptedOcr::new(vec![Ok(vec!["51F-123.45"])]),
        PipelineConfig::default(),
    );

    let result = pipeline
        .process(&frame(), &[plate_detection(0.9)], |plate| resolver.resolve(plate))
        .expect("process");

    assert_eq!(result.detections, vec![report("51F12345", "No information")]);
}

#[test]
fn near_miss_is_reported_as_read() {
    let resolver = registry();
    let mut pipeline = PlatePipeline::new(
        ScriptedOcr::new(vec![Ok(vec!["30A", "999.99"])]),
        PipelineConfig::default(),
    );

    let result = pipeline
        .process(&frame(), &[plate_detection(0.9)], |plate| resolver.resolve(plate))
        .expect("process");

    assert_eq!(result.detections, vec![report("30A99999", "No information")]);
}

#[test]
fn one_character_misread_still_matches() {
    let resolver = registry();
    let mut pipeline = PlatePipeline::new(
        ScriptedOcr::new(vec![Ok(vec!["51F-123.46"])]),
        PipelineConfig::default(),
    );

    let result = pipeline
        .process(&frame(), &[plate_detection(0.9)], |plate| resolver.resolve(plate))
        .expect("process");

    // 51F12346 vs 51F12345 scores 88
    assert_eq!(
        result.detections,
        vec![report("51F12345", "Nguyen Van A (0900000000)")]
    );
}

#[test]
fn engine_runs_detector_then_pipeline() {
    let resolver = registry();
    let detector = FixedDetector(vec![plate_detection(0.9), plate_detection(0.1)]);
    let pipeline = PlatePipeline::new(
        ScriptedOcr::new(vec![Ok(vec!["51F-123.45"])]),
        PipelineConfig::default(),
    );
    let mut engine = PlateEngine::new(detector, pipeline);

    let input = frame();
    let result = engine
        .process_image(&input, |plate: &NormalizedPlate| resolver.resolve(plate))
        .expect("process");

    assert_eq!(result.message, "Detected 1 plate(s).");
    assert_eq!((result.image.rows(), result.image.cols()), (480, 640));
    assert_ne!(
        result.image.data_bytes().expect("bytes"),
        input.data_bytes().expect("bytes")
    );
    assert!(!result.encode_jpeg().expect("jpeg").is_empty());
}
