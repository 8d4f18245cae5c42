use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref FRAMES_PROCESSED: IntCounter = {
        let metric = IntCounter::new("plates_frames_processed_total", "Frames run through the pipeline")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref PLATES_DETECTED: IntCounter = {
        let metric = IntCounter::new(
            "plates_detected_total",
            "Detections that passed the class and confidence gate",
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref PLATES_MATCHED: IntCounter = {
        let metric = IntCounter::new("plates_matched_total", "Plates resolved to a registered owner")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref RECOGNITION_OUTCOMES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new("plates_recognition_outcomes_total", "Recognition outcome per detection"),
            &["outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref STORE_FAILURES: IntCounter = {
        let metric = IntCounter::new("plates_store_failures_total", "Registry snapshots that could not be read")
            .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref FRAME_PROCESSING_TIME: Histogram = {
        let metric = Histogram::with_opts(HistogramOpts::new(
            "plates_frame_processing_seconds",
            "Time spent processing one frame",
        ))
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

pub const OUTCOME_OK: &str = "ok";
pub const OUTCOME_UNKNOWN: &str = "unknown";
pub const OUTCOME_ERROR: &str = "error";
pub const OUTCOME_EMPTY_CROP: &str = "empty_crop";

pub fn record_outcome(outcome: &str) {
    RECOGNITION_OUTCOMES.with_label_values(&[outcome]).inc();
}

/// Renders every metric in the Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e))
    })
}
