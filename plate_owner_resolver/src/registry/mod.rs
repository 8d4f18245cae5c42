pub mod fuzzy;
pub mod sqlite_store;

use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::error::StoreError;
use crate::metrics;
use crate::plate_text::NormalizedPlate;

pub use sqlite_store::SqliteRecordStore;

/// A registered plate and its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub plate: String,
    pub owner_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub vehicle_info: String,
}

impl RegistryEntry {
    /// `"<owner_name> (<phone>)"`, the owner text shown for a match.
    pub fn owner_display(&self) -> String {
        format!("{} ({})", self.owner_name, self.phone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub matched_plate: String,
    pub owner: Option<String>,
}

impl MatchResult {
    pub fn no_match(plate: &str) -> Self {
        Self {
            matched_plate: plate.to_string(),
            owner: None,
        }
    }
}

/// Source of registry snapshots. Every call must return the full, current
/// registry in a stable order.
pub trait RecordStore {
    fn snapshot(&self) -> Result<Vec<RegistryEntry>, StoreError>;
}

impl<S: RecordStore + ?Sized> RecordStore for &S {
    fn snapshot(&self) -> Result<Vec<RegistryEntry>, StoreError> {
        (**self).snapshot()
    }
}

/// Vec backed store, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    entries: Vec<RegistryEntry>,
}

impl InMemoryRecordStore {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: RegistryEntry) {
        self.entries.push(entry);
    }
}

impl RecordStore for InMemoryRecordStore {
    fn snapshot(&self) -> Result<Vec<RegistryEntry>, StoreError> {
        Ok(self.entries.clone())
    }
}

/// Plate to owner lookup handed to the pipeline.
///
/// Reads a fresh snapshot for every plate. A store failure is logged and
/// reported as "no match" so the frame keeps going.
pub struct OwnerResolver<S> {
    store: S,
    config: ResolverConfig,
}

impl<S: RecordStore> OwnerResolver<S> {
    pub fn new(store: S, config: ResolverConfig) -> Self {
        Self { store, config }
    }

    pub fn resolve(&self, plate: &NormalizedPlate) -> MatchResult {
        if plate.is_placeholder() {
            return MatchResult::no_match(plate.as_str());
        }
        let entries = match self.store.snapshot() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(plate = %plate, error = %e, "registry lookup failed");
                metrics::STORE_FAILURES.inc();
                return MatchResult::no_match(plate.as_str());
            }
        };
        let result = fuzzy::resolve(plate, &entries, self.config.match_threshold);
        if result.owner.is_some() {
            metrics::PLATES_MATCHED.inc();
        }
        result
    }
}
