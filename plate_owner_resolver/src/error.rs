use thiserror::Error;

/// Failure of the text recognition engine for one crop.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognition engine failed: {0}")]
    Engine(String),
    #[error("image is not suitable for recognition: {0}")]
    Image(#[from] opencv::Error),
}

/// Failure of the plate detection engine for one frame.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("cannot load detection model {path}: {source}")]
    ModelLoad {
        path: String,
        #[source]
        source: opencv::Error,
    },
    #[error("detection inference failed: {0}")]
    Inference(#[from] opencv::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
    #[error("plate {0} is already registered")]
    DuplicatePlate(String),
    #[error("invalid registry entry: {0}")]
    InvalidEntry(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("cannot read image {0}")]
    Unreadable(String),
    #[error("cannot list {path}: {source}")]
    Listing {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write image {0}")]
    Unwritable(String),
    #[error(transparent)]
    OpenCv(#[from] opencv::Error),
}

/// Frame-level failures. Per-detection failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot copy frame for annotation: {0}")]
    Frame(#[from] opencv::Error),
    #[error(transparent)]
    Detection(#[from] DetectionError),
}
