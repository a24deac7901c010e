//! The gateway proper: column-name resolution, caching, and the rate
//! monitor wired over any [`SheetsBackend`] (spec.md §4.1).

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::backend::{CellUpdate, Row, SheetsBackend};
use crate::error::StoreError;
use crate::format::normalize_column_name;
use crate::rate_monitor::{RateMonitor, WriteKind};

type ColumnMap = HashMap<String, usize>;

/// Named-column read/write adaptor over a [`SheetsBackend`].
///
/// The per-worksheet `normalized_name -> index` map is cached indefinitely
/// and invalidated by any schema-mutating operation or on demand — callers
/// never receive the map itself, only resolved indices (spec.md §9).
pub struct SheetsGateway<B: SheetsBackend> {
    backend: B,
    column_maps: DashMap<String, Arc<ColumnMap>>,
    rate_monitor: RateMonitor,
}

impl<B: SheetsBackend> SheetsGateway<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            column_maps: DashMap::new(),
            rate_monitor: RateMonitor::new(),
        }
    }

    pub fn rate_monitor(&self) -> &RateMonitor {
        &self.rate_monitor
    }

    /// Drop the cached column map for `worksheet`; the next lookup re-reads
    /// the header row.
    pub fn invalidate_column_map(&self, worksheet: &str) {
        self.column_maps.remove(worksheet);
    }

    async fn column_map(&self, worksheet: &str) -> Result<Arc<ColumnMap>, StoreError> {
        if let Some(map) = self.column_maps.get(worksheet) {
            return Ok(Arc::clone(&map));
        }
        let header = self.backend.header_row(worksheet).await?;
        let map: ColumnMap = header
            .iter()
            .enumerate()
            .map(|(i, name)| (normalize_column_name(name), i))
            .collect();
        let map = Arc::new(map);
        self.column_maps.insert(worksheet.to_string(), Arc::clone(&map));
        Ok(map)
    }

    /// Resolve a logical column name to its 0-based physical index.
    pub async fn get_column_index(&self, worksheet: &str, logical_column: &str) -> Result<usize, StoreError> {
        let map = self.column_map(worksheet).await?;
        map.get(&normalize_column_name(logical_column))
            .copied()
            .ok_or_else(|| StoreError::SchemaInvalid {
                worksheet: worksheet.to_string(),
                column: logical_column.to_string(),
            })
    }

    /// Validate at startup that every name in `required_columns` resolves.
    pub async fn validate_schema(&self, worksheet: &str, required_columns: &[&str]) -> Result<(), StoreError> {
        for col in required_columns {
            self.get_column_index(worksheet, col).await?;
        }
        Ok(())
    }

    /// Resolve several logical column names at once, keyed by the name as
    /// given (not normalized) — convenience for row encode/decode call
    /// sites that need a whole column set.
    pub async fn column_indices(
        &self,
        worksheet: &str,
        names: &[&str],
    ) -> Result<HashMap<String, usize>, StoreError> {
        let mut out = HashMap::with_capacity(names.len());
        for name in names {
            out.insert((*name).to_string(), self.get_column_index(worksheet, name).await?);
        }
        Ok(out)
    }

    pub async fn read_worksheet(&self, worksheet: &str) -> Result<Vec<Row>, StoreError> {
        self.rate_monitor.record(WriteKind::Read);
        self.backend.read_worksheet(worksheet).await
    }

    /// All writes go through a single batched call; never loop per-cell at
    /// the call site (spec.md §4.1).
    pub async fn batch_update(&self, worksheet: &str, updates: &[CellUpdate]) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        self.rate_monitor.record(WriteKind::BatchUpdate);
        self.backend.batch_update(worksheet, updates).await
    }

    pub async fn append_rows(&self, worksheet: &str, rows: &[Row]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.rate_monitor.record(WriteKind::Append);
        self.backend.append_rows(worksheet, rows).await
    }
}
