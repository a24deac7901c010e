//! In-memory fakes for `spool-store`/`spool-workflow`'s dependency-injected
//! seams, shared by every crate's integration tests (spec.md §8 scenarios).
//!
//! `FakeSheetsBackend` implements [`SheetsBackend`] entirely in memory, so
//! `spool-repo`/`spool-audit`/`spool-workflow` tests exercise the exact
//! same gateway/repository/workflow code the real `GoogleSheetsBackend`
//! does, with no network involved.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use spool_schemas::{Role, Worker};
use spool_store::backend::{CellUpdate, Row};
use spool_store::format::{format_date, format_datetime};
use spool_store::{columns, worksheets, SheetsBackend, StoreError};
use spool_workflow::{EventSink, OccupationEvent, WorkerDirectory};

struct WorksheetData {
    header: Vec<String>,
    rows: Vec<Row>,
    fail_appends: bool,
}

/// An entirely in-memory [`SheetsBackend`]. Pre-seeded with the three
/// required worksheets' headers (spec.md §6); rows are added via the
/// `push_*`/`seed_*` helpers below.
pub struct FakeSheetsBackend {
    sheets: Mutex<HashMap<String, WorksheetData>>,
}

impl Default for FakeSheetsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSheetsBackend {
    pub fn new() -> Self {
        let mut sheets = HashMap::new();
        sheets.insert(
            worksheets::OPERACIONES.to_string(),
            WorksheetData {
                header: columns::OPERACIONES.iter().map(|s| s.to_string()).collect(),
                rows: Vec::new(),
                fail_appends: false,
            },
        );
        sheets.insert(
            worksheets::UNIONES.to_string(),
            WorksheetData {
                header: columns::UNIONES.iter().map(|s| s.to_string()).collect(),
                rows: Vec::new(),
                fail_appends: false,
            },
        );
        sheets.insert(
            worksheets::METADATA.to_string(),
            WorksheetData {
                header: columns::METADATA.iter().map(|s| s.to_string()).collect(),
                rows: Vec::new(),
                fail_appends: false,
            },
        );
        Self { sheets: Mutex::new(sheets) }
    }

    /// Replace `worksheet`'s data rows wholesale (physical column order
    /// must match the worksheet's header).
    pub fn seed_rows(&self, worksheet: &str, rows: Vec<Row>) {
        let mut guard = self.sheets.lock().expect("fake backend mutex poisoned");
        guard.get_mut(worksheet).expect("unknown worksheet").rows = rows;
    }

    /// Append a single spool row to `Operaciones` built from named cells,
    /// defaulting every other column to empty. Column order follows
    /// [`columns::OPERACIONES`], so this stays correct if that list grows.
    pub fn push_spool_row(&self, cells: HashMap<&str, Value>) {
        self.push_row(worksheets::OPERACIONES, columns::OPERACIONES, cells);
    }

    pub fn push_union_row(&self, cells: HashMap<&str, Value>) {
        self.push_row(worksheets::UNIONES, columns::UNIONES, cells);
    }

    fn push_row(&self, worksheet: &str, column_order: &[&str], cells: HashMap<&str, Value>) {
        let row: Row = column_order
            .iter()
            .map(|col| cells.get(col).cloned().unwrap_or(Value::String(String::new())))
            .collect();
        let mut guard = self.sheets.lock().expect("fake backend mutex poisoned");
        guard.get_mut(worksheet).expect("unknown worksheet").rows.push(row);
    }

    pub fn rows(&self, worksheet: &str) -> Vec<Row> {
        self.sheets
            .lock()
            .expect("fake backend mutex poisoned")
            .get(worksheet)
            .map(|d| d.rows.clone())
            .unwrap_or_default()
    }

    /// Make every subsequent `append_rows` on `worksheet` fail (used to
    /// exercise audit-degraded paths, spec.md §4.4/§4.7).
    pub fn fail_appends(&self, worksheet: &str) {
        self.sheets
            .lock()
            .expect("fake backend mutex poisoned")
            .get_mut(worksheet)
            .expect("unknown worksheet")
            .fail_appends = true;
    }
}

#[async_trait]
impl SheetsBackend for FakeSheetsBackend {
    async fn header_row(&self, worksheet: &str) -> Result<Vec<String>, StoreError> {
        self.sheets
            .lock()
            .expect("fake backend mutex poisoned")
            .get(worksheet)
            .map(|d| d.header.clone())
            .ok_or_else(|| StoreError::SchemaInvalid {
                worksheet: worksheet.to_string(),
                column: "*".to_string(),
            })
    }

    async fn read_worksheet(&self, worksheet: &str) -> Result<Vec<Row>, StoreError> {
        Ok(self
            .sheets
            .lock()
            .expect("fake backend mutex poisoned")
            .get(worksheet)
            .map(|d| d.rows.clone())
            .unwrap_or_default())
    }

    async fn batch_update(&self, worksheet: &str, updates: &[CellUpdate]) -> Result<(), StoreError> {
        let mut guard = self.sheets.lock().expect("fake backend mutex poisoned");
        let data = guard.get_mut(worksheet).ok_or_else(|| StoreError::SchemaInvalid {
            worksheet: worksheet.to_string(),
            column: "*".to_string(),
        })?;
        for u in updates {
            if u.cell.row >= data.rows.len() {
                data.rows.resize(u.cell.row + 1, Vec::new());
            }
            let row = &mut data.rows[u.cell.row];
            if u.cell.col >= row.len() {
                row.resize(u.cell.col + 1, Value::Null);
            }
            row[u.cell.col] = u.value.clone();
        }
        Ok(())
    }

    async fn append_rows(&self, worksheet: &str, rows: &[Row]) -> Result<(), StoreError> {
        let mut guard = self.sheets.lock().expect("fake backend mutex poisoned");
        let data = guard.get_mut(worksheet).ok_or_else(|| StoreError::SchemaInvalid {
            worksheet: worksheet.to_string(),
            column: "*".to_string(),
        })?;
        if data.fail_appends {
            return Err(StoreError::Transport("fake backend: append_rows forced failure".to_string()));
        }
        data.rows.extend_from_slice(rows);
        Ok(())
    }
}

/// One row's worth of spool fixture input for [`seed_spool`].
pub struct SpoolFixture {
    pub tag_spool: String,
    pub ot: String,
    pub fecha_materiales: Option<NaiveDate>,
    pub total_uniones: u32,
}

/// Seed a spool row with every aggregate at zero and no occupation —
/// the state a v4 spool starts in before any ARM/SOLD work (spec.md §3).
pub fn seed_spool(backend: &FakeSheetsBackend, fixture: SpoolFixture) {
    let mut cells: HashMap<&str, Value> = HashMap::new();
    cells.insert("TAG_SPOOL", Value::String(fixture.tag_spool));
    cells.insert("OT", Value::String(fixture.ot));
    if let Some(d) = fixture.fecha_materiales {
        cells.insert("Fecha_Materiales", Value::String(format_date(d)));
    }
    cells.insert("version", Value::String(uuid::Uuid::nil().to_string()));
    cells.insert("Total_Uniones", Value::from(fixture.total_uniones));
    cells.insert("Uniones_ARM_Completadas", Value::from(0));
    cells.insert("Uniones_SOLD_Completadas", Value::from(0));
    cells.insert("Pulgadas_ARM", Value::from(0.0));
    cells.insert("Pulgadas_SOLD", Value::from(0.0));
    cells.insert("Repair_Cycle", Value::from(0));
    backend.push_spool_row(cells);
}

/// Seed one pending union (neither ARM nor SOLD started).
pub fn seed_union(backend: &FakeSheetsBackend, tag_spool: &str, n_union: u8, dn_union: f64, tipo_union: &str) {
    let mut cells: HashMap<&str, Value> = HashMap::new();
    cells.insert("TAG_SPOOL", Value::String(tag_spool.to_string()));
    cells.insert("N_UNION", Value::from(n_union));
    cells.insert("DN_UNION", Value::from(dn_union));
    cells.insert("TIPO_UNION", Value::String(tipo_union.to_string()));
    cells.insert("version", Value::String(uuid::Uuid::nil().to_string()));
    backend.push_union_row(cells);
}

/// Mark a union's ARM (and optionally SOLD) as already complete, for
/// fixtures that need to start mid-workflow.
#[allow(clippy::too_many_arguments)]
pub fn seed_union_completed(
    backend: &FakeSheetsBackend,
    tag_spool: &str,
    n_union: u8,
    dn_union: f64,
    tipo_union: &str,
    arm_done: bool,
    sold_done: bool,
    at: DateTime<Utc>,
) {
    let mut cells: HashMap<&str, Value> = HashMap::new();
    cells.insert("TAG_SPOOL", Value::String(tag_spool.to_string()));
    cells.insert("N_UNION", Value::from(n_union));
    cells.insert("DN_UNION", Value::from(dn_union));
    cells.insert("TIPO_UNION", Value::String(tipo_union.to_string()));
    cells.insert("version", Value::String(uuid::Uuid::nil().to_string()));
    if arm_done {
        cells.insert("ARM_FECHA_INICIO", Value::String(format_datetime(at)));
        cells.insert("ARM_FECHA_FIN", Value::String(format_datetime(at)));
        cells.insert("ARM_WORKER", Value::String("MR(93)".to_string()));
    }
    if sold_done {
        cells.insert("SOL_FECHA_INICIO", Value::String(format_datetime(at)));
        cells.insert("SOL_FECHA_FIN", Value::String(format_datetime(at)));
        cells.insert("SOL_WORKER", Value::String("MR(93)".to_string()));
    }
    backend.push_union_row(cells);
}

/// Fixed worker roster, keyed by id (spec.md §3: "read-only to this core").
pub struct StaticWorkerDirectory {
    workers: HashMap<String, Worker>,
}

impl Default for StaticWorkerDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticWorkerDirectory {
    pub fn new() -> Self {
        Self { workers: HashMap::new() }
    }

    pub fn with_worker(mut self, id: &str, initials: &str, roles: Vec<Role>) -> Self {
        self.workers.insert(
            id.to_string(),
            Worker { id: id.to_string(), initials: initials.to_string(), active: true, roles },
        );
        self
    }
}

#[async_trait]
impl WorkerDirectory for StaticWorkerDirectory {
    async fn get(&self, worker_id: &str) -> Option<Worker> {
        self.workers.get(worker_id).cloned()
    }
}

/// Records every published event instead of fanning it out anywhere
/// (spec.md §4.10's bus is exercised for real only in `spool-daemon`).
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<OccupationEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OccupationEvent> {
        self.events.lock().expect("recording sink mutex poisoned").clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, event: OccupationEvent) {
        self.events.lock().expect("recording sink mutex poisoned").push(event);
    }
}
