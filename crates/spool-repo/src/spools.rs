//! Spool Repository (spec.md §4.6, C6).
//!
//! Occupation and metrics writes are single-attempt, version-guarded
//! batched updates: each method re-reads the current row, compares against
//! `expected_version`, and returns [`RepoError::VersionConflict`] on
//! mismatch rather than retrying itself — the retry-with-recompute loop
//! (spec.md §4.3) is owned by the caller via [`crate::conflict::retry_on_conflict`],
//! because only the caller (Occupation Workflow) knows how to rebuild its
//! write intent from fresh state.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use spool_schemas::{Inches, Operacion, Spool, TagSpool, WorkerId};
use spool_store::format::{format_datetime, parse_date, parse_datetime};
use spool_store::{columns, worksheets, CellRef, CellUpdate, Row, SheetsBackend, SheetsGateway};
use uuid::Uuid;

use crate::error::RepoError;
use crate::value_ext::{as_f64, as_str, as_u64, non_empty_str};

fn malformed(detail: impl Into<String>) -> RepoError {
    RepoError::MalformedRow {
        worksheet: worksheets::OPERACIONES.to_string(),
        detail: detail.into(),
    }
}

fn decode_spool(row: &Row, idx: &HashMap<String, usize>) -> Result<Spool, RepoError> {
    let cell = |name: &str| -> Option<&Value> { idx.get(name).and_then(|&i| row.get(i)) };

    let tag_spool = cell("TAG_SPOOL")
        .and_then(as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed("TAG_SPOOL missing"))?;
    let ot = cell("OT").and_then(as_str).unwrap_or_default().to_string();
    let fecha_materiales: Option<NaiveDate> = cell("Fecha_Materiales").and_then(as_str).and_then(parse_date);
    let ocupado_por = cell("Ocupado_Por").and_then(non_empty_str);
    let fecha_ocupacion: Option<DateTime<Utc>> = cell("Fecha_Ocupacion").and_then(as_str).and_then(parse_datetime);
    let version = cell("version")
        .and_then(as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::nil);
    let estado_detalle = cell("Estado_Detalle").and_then(as_str).unwrap_or_default().to_string();
    let total_uniones = cell("Total_Uniones").and_then(as_u64).unwrap_or(0) as u32;
    let uniones_arm_completadas = cell("Uniones_ARM_Completadas").and_then(as_u64).unwrap_or(0) as u32;
    let uniones_sold_completadas = cell("Uniones_SOLD_Completadas").and_then(as_u64).unwrap_or(0) as u32;
    let pulgadas_arm = cell("Pulgadas_ARM").and_then(as_f64).map(Inches::from_f64).unwrap_or(Inches::ZERO);
    let pulgadas_sold = cell("Pulgadas_SOLD").and_then(as_f64).map(Inches::from_f64).unwrap_or(Inches::ZERO);
    let armador = cell("Armador").and_then(non_empty_str);
    let soldador = cell("Soldador").and_then(non_empty_str);
    let fecha_armado = cell("Fecha_Armado").and_then(as_str).and_then(parse_datetime);
    let fecha_soldadura = cell("Fecha_Soldadura").and_then(as_str).and_then(parse_datetime);
    let repair_cycle = cell("Repair_Cycle").and_then(as_u64).unwrap_or(0) as u8;

    Ok(Spool {
        tag_spool,
        ot,
        fecha_materiales,
        ocupado_por,
        fecha_ocupacion,
        version,
        estado_detalle,
        total_uniones,
        uniones_arm_completadas,
        uniones_sold_completadas,
        pulgadas_arm,
        pulgadas_sold,
        armador,
        soldador,
        fecha_armado,
        fecha_soldadura,
        repair_cycle,
    })
}

/// ARM or SOLD metrics to write atomically onto the spool aggregate row
/// (spec.md §4.7 step 5).
#[derive(Debug, Clone, Copy)]
pub struct SpoolMetricsUpdate {
    pub op: Operacion,
    pub completadas: u32,
    pub pulgadas: Inches,
}

pub struct SpoolRepository<B: SheetsBackend> {
    gateway: Arc<SheetsGateway<B>>,
}

impl<B: SheetsBackend> Clone for SpoolRepository<B> {
    fn clone(&self) -> Self {
        Self { gateway: Arc::clone(&self.gateway) }
    }
}

impl<B: SheetsBackend> SpoolRepository<B> {
    pub fn new(gateway: Arc<SheetsGateway<B>>) -> Self {
        Self { gateway }
    }

    async fn column_map(&self) -> Result<HashMap<String, usize>, RepoError> {
        Ok(self
            .gateway
            .column_indices(worksheets::OPERACIONES, columns::OPERACIONES)
            .await?)
    }

    async fn locate(&self, tag: &TagSpool) -> Result<(usize, HashMap<String, usize>, Spool), RepoError> {
        let idx = self.column_map().await?;
        let tag_col = idx["TAG_SPOOL"];
        let rows = self.gateway.read_worksheet(worksheets::OPERACIONES).await?;
        let (row_i, row) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.get(tag_col).and_then(as_str) == Some(tag.as_str()))
            .ok_or_else(|| RepoError::SpoolNotFound(tag.clone()))?;
        let spool = decode_spool(row, &idx)?;
        Ok((row_i, idx, spool))
    }

    pub async fn get(&self, tag: &TagSpool) -> Result<Option<Spool>, RepoError> {
        match self.locate(tag).await {
            Ok((_, _, spool)) => Ok(Some(spool)),
            Err(RepoError::SpoolNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn check_version(tag: &TagSpool, current: Uuid, expected: Uuid) -> Result<(), RepoError> {
        if current != expected {
            return Err(RepoError::VersionConflict(tag.clone()));
        }
        Ok(())
    }

    async fn write_version_guarded(
        &self,
        tag: &TagSpool,
        expected_version: Uuid,
        cells: Vec<(&'static str, Value)>,
    ) -> Result<Uuid, RepoError> {
        let (row_i, idx, spool) = self.locate(tag).await?;
        Self::check_version(tag, spool.version, expected_version)?;

        let new_version = Uuid::new_v4();
        let sheet_row = row_i + 1;
        let mut updates: Vec<CellUpdate> = cells
            .into_iter()
            .map(|(name, value)| CellUpdate {
                cell: CellRef { row: sheet_row, col: idx[name] },
                value,
            })
            .collect();
        updates.push(CellUpdate {
            cell: CellRef { row: sheet_row, col: idx["version"] },
            value: Value::String(new_version.to_string()),
        });

        self.gateway.batch_update(worksheets::OPERACIONES, &updates).await?;
        Ok(new_version)
    }

    /// INICIAR / TOMAR: set `ocupado_por` + `fecha_ocupacion`.
    pub async fn set_occupation(
        &self,
        tag: &TagSpool,
        worker_id: &WorkerId,
        at: DateTime<Utc>,
        expected_version: Uuid,
    ) -> Result<Uuid, RepoError> {
        self.write_version_guarded(
            tag,
            expected_version,
            vec![
                ("Ocupado_Por", Value::String(worker_id.clone())),
                ("Fecha_Ocupacion", Value::String(format_datetime(at))),
            ],
        )
        .await
    }

    /// FINALIZAR / PAUSAR / COMPLETAR / CANCELAR: clear occupation markers.
    pub async fn clear_occupation(&self, tag: &TagSpool, expected_version: Uuid) -> Result<Uuid, RepoError> {
        self.write_version_guarded(
            tag,
            expected_version,
            vec![
                ("Ocupado_Por", Value::String(String::new())),
                ("Fecha_Ocupacion", Value::String(String::new())),
            ],
        )
        .await
    }

    /// Recompute `uniones_{op}_completadas` / `pulgadas_{op}` (spec.md §4.7 step 5).
    pub async fn set_metrics(
        &self,
        tag: &TagSpool,
        update: SpoolMetricsUpdate,
        expected_version: Uuid,
    ) -> Result<Uuid, RepoError> {
        let (completadas_col, pulgadas_col) = match update.op {
            Operacion::Arm => ("Uniones_ARM_Completadas", "Pulgadas_ARM"),
            Operacion::Sold => ("Uniones_SOLD_Completadas", "Pulgadas_SOLD"),
            other => return Err(malformed(format!("set_metrics not defined for {other}"))),
        };
        self.write_version_guarded(
            tag,
            expected_version,
            vec![
                (completadas_col, Value::from(update.completadas)),
                (pulgadas_col, Value::from(update.pulgadas.as_f64())),
            ],
        )
        .await
    }

    /// Legacy v3 write: the spool-level `{Armador,Fecha_Armado}` /
    /// `{Soldador,Fecha_Soldadura}` pair, written directly with no
    /// per-union rows involved (spec.md §4.7 TOMAR/PAUSAR/COMPLETAR).
    pub async fn set_legacy_operation(
        &self,
        tag: &TagSpool,
        op: Operacion,
        worker_id: &WorkerId,
        at: DateTime<Utc>,
        expected_version: Uuid,
    ) -> Result<Uuid, RepoError> {
        let (worker_col, fecha_col) = match op {
            Operacion::Arm => ("Armador", "Fecha_Armado"),
            Operacion::Sold => ("Soldador", "Fecha_Soldadura"),
            other => return Err(malformed(format!("set_legacy_operation not defined for {other}"))),
        };
        self.write_version_guarded(
            tag,
            expected_version,
            vec![
                (worker_col, Value::String(worker_id.clone())),
                (fecha_col, Value::String(format_datetime(at))),
            ],
        )
        .await
    }

    /// Write the state machines' pretty-printed projection (spec.md §4.9).
    pub async fn set_estado_detalle(
        &self,
        tag: &TagSpool,
        estado_detalle: &str,
        expected_version: Uuid,
    ) -> Result<Uuid, RepoError> {
        self.write_version_guarded(
            tag,
            expected_version,
            vec![("Estado_Detalle", Value::String(estado_detalle.to_string()))],
        )
        .await
    }

    /// Apply an inspection result (spec.md §4.9: `estado_detalle` +
    /// `repair_cycle` move together — `repair_cycle` only advances on a
    /// REJECTED verdict, never on APROBADO).
    pub async fn set_metrologia_result(
        &self,
        tag: &TagSpool,
        estado_detalle: &str,
        repair_cycle: u8,
        expected_version: Uuid,
    ) -> Result<Uuid, RepoError> {
        self.write_version_guarded(
            tag,
            expected_version,
            vec![
                ("Estado_Detalle", Value::String(estado_detalle.to_string())),
                ("Repair_Cycle", Value::from(repair_cycle)),
            ],
        )
        .await
    }

    /// `total_uniones > 0` (spec.md §4.6, §6).
    pub fn is_v4(spool: &Spool) -> bool {
        spool.is_v4()
    }
}
