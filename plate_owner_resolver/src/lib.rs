pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod plate_detection;
pub mod plate_text;
pub mod registry;

pub use config::AppConfig;
pub use pipeline::{FrameResult, PlateEngine, PlatePipeline, PlateReport};
pub use plate_text::{normalize, NormalizedPlate};
pub use registry::{MatchResult, OwnerResolver, RecordStore, RegistryEntry};
