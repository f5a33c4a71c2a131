//! Whole-file JSON persistence of the record map.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::error::StoreError;
use super::merge::{MergeStats, merge_into};
use super::model::ProjectMap;
use crate::currency::{CurrencyConverter, StaticRates};
use crate::fs::{read_optional, write_atomic};
use crate::pagination::{BatchSink, Edge};

/// A record map stored as one pretty-printed JSON object keyed by id.
///
/// Every [`apply`](Self::apply) loads the whole file, merges and rewrites it,
/// so a crash mid-run loses at most the batch in flight.
#[derive(Clone)]
pub struct RecordStore {
    path: PathBuf,
    converter: Arc<dyn CurrencyConverter>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            converter: Arc::new(StaticRates::default()),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn CurrencyConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the map. A missing file is an empty store; so is an unparsable
    /// one, after it has been copied aside to `<name>.corrupt`.
    pub async fn load(&self) -> Result<ProjectMap, StoreError> {
        let Some(text) = read_optional(&self.path)
            .await
            .map_err(|e| StoreError::io(&self.path, e))?
        else {
            return Ok(ProjectMap::new());
        };
        if text.trim().is_empty() {
            return Ok(ProjectMap::new());
        }

        match serde_json::from_str(&text) {
            Ok(map) => Ok(map),
            Err(error) => {
                let backup = self.path.with_extension("json.corrupt");
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %error,
                    "Record store is unreadable; starting empty"
                );
                tokio::fs::copy(&self.path, &backup)
                    .await
                    .map_err(|e| StoreError::io(&backup, e))?;
                Ok(ProjectMap::new())
            }
        }
    }

    pub async fn save(&self, map: &ProjectMap) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(map)?;
        write_atomic(&self.path, &bytes)
            .await
            .map_err(|e| StoreError::io(&self.path, e))
    }

    /// Load, merge `edges`, save.
    pub async fn apply(&self, edges: &[Edge]) -> Result<MergeStats, StoreError> {
        let mut map = self.load().await?;
        let stats = merge_into(&mut map, edges, Utc::now(), self.converter.as_ref());
        self.save(&map).await?;
        info!(
            new = stats.new,
            updated = stats.updated,
            total = map.len(),
            "Saved/updated projects"
        );
        Ok(stats)
    }

    /// Identifiers already in the store.
    pub async fn known_ids(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.load().await?.into_keys().collect())
    }
}

#[async_trait]
impl BatchSink for RecordStore {
    async fn flush(&mut self, edges: Vec<Edge>) -> Result<MergeStats, StoreError> {
        self.apply(&edges).await
    }
}
