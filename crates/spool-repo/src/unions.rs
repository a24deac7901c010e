//! Union Repository (spec.md §4.5, C5).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use spool_schemas::{Inches, Operacion, TagSpool, Union};
use spool_store::format::{format_datetime, parse_date, parse_datetime};
use spool_store::{columns, worksheets, CellRef, CellUpdate, Row, SheetsBackend, SheetsGateway};
use uuid::Uuid;

use crate::error::RepoError;
use crate::value_ext::{as_f64, as_str, as_u64, non_empty_str};

fn malformed(detail: impl Into<String>) -> RepoError {
    RepoError::MalformedRow {
        worksheet: worksheets::UNIONES.to_string(),
        detail: detail.into(),
    }
}

fn decode_union(row: &Row, idx: &HashMap<String, usize>) -> Result<Union, RepoError> {
    let cell = |name: &str| -> Option<&Value> { idx.get(name).and_then(|&i| row.get(i)) };

    let tag_spool = cell("TAG_SPOOL")
        .and_then(as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed("TAG_SPOOL missing"))?;
    let n_union = cell("N_UNION")
        .and_then(as_u64)
        .map(|v| v as u8)
        .ok_or_else(|| malformed("N_UNION missing or not numeric"))?;
    let dn_union = cell("DN_UNION").and_then(as_f64).map(Inches::from_f64).unwrap_or(Inches::ZERO);
    let tipo_union = cell("TIPO_UNION").and_then(as_str).unwrap_or_default().to_string();

    let arm_fecha_inicio = cell("ARM_FECHA_INICIO").and_then(as_str).and_then(parse_datetime);
    let arm_fecha_fin = cell("ARM_FECHA_FIN").and_then(as_str).and_then(parse_datetime);
    let arm_worker = cell("ARM_WORKER").and_then(non_empty_str);
    let sol_fecha_inicio = cell("SOL_FECHA_INICIO").and_then(as_str).and_then(parse_datetime);
    let sol_fecha_fin = cell("SOL_FECHA_FIN").and_then(as_str).and_then(parse_datetime);
    let sol_worker = cell("SOL_WORKER").and_then(non_empty_str);
    let ndt_fecha = cell("NDT_FECHA").and_then(as_str).and_then(parse_date);
    let ndt_status = cell("NDT_STATUS").and_then(non_empty_str);
    let version = cell("version")
        .and_then(as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::nil);
    let creado_por = cell("Creado_Por").and_then(non_empty_str);
    let fecha_creacion = cell("Fecha_Creacion").and_then(as_str).and_then(parse_datetime);
    let modificado_por = cell("Modificado_Por").and_then(non_empty_str);
    let fecha_modificacion = cell("Fecha_Modificacion").and_then(as_str).and_then(parse_datetime);

    Ok(Union {
        tag_spool,
        n_union,
        dn_union,
        tipo_union,
        arm_fecha_inicio,
        arm_fecha_fin,
        arm_worker,
        sol_fecha_inicio,
        sol_fecha_fin,
        sol_worker,
        ndt_fecha,
        ndt_status,
        version,
        creado_por,
        fecha_creacion,
        modificado_por,
        fecha_modificacion,
    })
}

/// One union's outcome from a FINALIZAR batch write (spec.md §4.7 step 4).
#[derive(Debug, Clone)]
pub struct UnionCompletion {
    pub n_union: u8,
    pub worker_rendered: String,
    pub at: DateTime<Utc>,
}

pub struct UnionRepository<B: SheetsBackend> {
    gateway: Arc<SheetsGateway<B>>,
}

impl<B: SheetsBackend> Clone for UnionRepository<B> {
    fn clone(&self) -> Self {
        Self { gateway: Arc::clone(&self.gateway) }
    }
}

impl<B: SheetsBackend> UnionRepository<B> {
    pub fn new(gateway: Arc<SheetsGateway<B>>) -> Self {
        Self { gateway }
    }

    async fn column_map(&self) -> Result<HashMap<String, usize>, RepoError> {
        Ok(self
            .gateway
            .column_indices(worksheets::UNIONES, columns::UNIONES)
            .await?)
    }

    /// `(data-row index, decoded union)` for every row matching `tag`. The
    /// row index excludes the header and is what [`Self::batch_set`]
    /// addresses writes against.
    async fn by_spool_indexed(&self, tag: &TagSpool) -> Result<Vec<(usize, Union)>, RepoError> {
        let idx = self.column_map().await?;
        let tag_col = idx["TAG_SPOOL"];
        let rows = self.gateway.read_worksheet(worksheets::UNIONES).await?;
        rows.iter()
            .enumerate()
            .filter(|(_, row)| row.get(tag_col).and_then(as_str) == Some(tag.as_str()))
            .map(|(i, row)| Ok((i, decode_union(row, &idx)?)))
            .collect()
    }

    pub async fn by_spool(&self, tag: &TagSpool) -> Result<Vec<Union>, RepoError> {
        Ok(self.by_spool_indexed(tag).await?.into_iter().map(|(_, u)| u).collect())
    }

    /// ARM: unions with `arm_fecha_fin = ∅`. SOLD: `arm_fecha_fin ≠ ∅ ∧ sol_fecha_fin = ∅`.
    pub async fn available_for(&self, tag: &TagSpool, op: Operacion) -> Result<Vec<Union>, RepoError> {
        let all = self.by_spool(tag).await?;
        Ok(all.into_iter().filter(|u| is_available(u, op)).collect())
    }

    pub async fn count_completed(&self, tag: &TagSpool, op: Operacion) -> Result<u32, RepoError> {
        let all = self.by_spool(tag).await?;
        Ok(count_completed_of(&all, op))
    }

    pub async fn sum_pulgadas(&self, tag: &TagSpool, op: Operacion) -> Result<Inches, RepoError> {
        let all = self.by_spool(tag).await?;
        Ok(sum_pulgadas_of(&all, op))
    }

    /// All-or-nothing batch write: rejects any row whose `{op}_fecha_fin`
    /// is already set (invariant iii) before issuing the single batched
    /// call (spec.md §4.5, §4.7 step 4).
    pub async fn batch_set(
        &self,
        tag: &TagSpool,
        op: Operacion,
        completions: &[UnionCompletion],
    ) -> Result<(), RepoError> {
        if completions.is_empty() {
            return Ok(());
        }
        let idx = self.column_map().await?;
        let indexed = self.by_spool_indexed(tag).await?;

        let (inicio_col, fin_col, worker_col) = match op {
            Operacion::Arm => (idx["ARM_FECHA_INICIO"], idx["ARM_FECHA_FIN"], idx["ARM_WORKER"]),
            Operacion::Sold => (idx["SOL_FECHA_INICIO"], idx["SOL_FECHA_FIN"], idx["SOL_WORKER"]),
            other => return Err(malformed(format!("batch_set not defined for {other}"))),
        };

        let mut updates = Vec::with_capacity(completions.len() * 3);
        for c in completions {
            let (row_i, union) = indexed
                .iter()
                .find(|(_, u)| u.n_union == c.n_union)
                .ok_or_else(|| malformed(format!("union {} not found for {tag}", c.n_union)))?;
            if union.is_complete(op) {
                return Err(RepoError::UnionAlreadyComplete {
                    tag_spool: tag.clone(),
                    n_union: c.n_union,
                });
            }
            let ts = format_datetime(c.at);
            let sheet_row = row_i + 1; // header occupies physical row 0
            updates.push(CellUpdate {
                cell: CellRef { row: sheet_row, col: inicio_col },
                value: Value::String(ts.clone()),
            });
            updates.push(CellUpdate {
                cell: CellRef { row: sheet_row, col: fin_col },
                value: Value::String(ts),
            });
            updates.push(CellUpdate {
                cell: CellRef { row: sheet_row, col: worker_col },
                value: Value::String(c.worker_rendered.clone()),
            });
        }

        self.gateway.batch_update(worksheets::UNIONES, &updates).await?;
        Ok(())
    }
}

pub fn is_available(u: &Union, op: Operacion) -> bool {
    match op {
        Operacion::Arm => u.arm_fecha_fin.is_none(),
        Operacion::Sold => u.arm_fecha_fin.is_some() && u.sol_fecha_fin.is_none(),
        _ => false,
    }
}

pub fn count_completed_of(unions: &[Union], op: Operacion) -> u32 {
    unions.iter().filter(|u| u.is_complete(op)).count() as u32
}

pub fn sum_pulgadas_of(unions: &[Union], op: Operacion) -> Inches {
    unions.iter().filter(|u| u.is_complete(op)).map(|u| u.dn_union).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(n: u8, tipo: &str, arm_done: bool, sold_done: bool) -> Union {
        Union {
            tag_spool: "OT-001".into(),
            n_union: n,
            dn_union: Inches::from_f64(2.0),
            tipo_union: tipo.into(),
            arm_fecha_inicio: arm_done.then(Utc::now),
            arm_fecha_fin: arm_done.then(Utc::now),
            arm_worker: arm_done.then(|| "MR(93)".to_string()),
            sol_fecha_inicio: sold_done.then(Utc::now),
            sol_fecha_fin: sold_done.then(Utc::now),
            sol_worker: sold_done.then(|| "MR(93)".to_string()),
            ndt_fecha: None,
            ndt_status: None,
            version: Uuid::nil(),
            creado_por: None,
            fecha_creacion: None,
            modificado_por: None,
            fecha_modificacion: None,
        }
    }

    #[test]
    fn availability_respects_arm_before_sold() {
        let pending = u(1, "BW", false, false);
        let armed = u(2, "BW", true, false);
        let sold = u(3, "BW", true, true);

        assert!(is_available(&pending, Operacion::Arm));
        assert!(!is_available(&pending, Operacion::Sold));
        assert!(is_available(&armed, Operacion::Sold));
        assert!(!is_available(&armed, Operacion::Arm));
        assert!(!is_available(&sold, Operacion::Sold));
    }

    #[test]
    fn aggregate_counts_and_sums() {
        let unions = vec![u(1, "BW", true, false), u(2, "BW", true, true), u(3, "BW", false, false)];
        assert_eq!(count_completed_of(&unions, Operacion::Arm), 2);
        assert_eq!(count_completed_of(&unions, Operacion::Sold), 1);
        assert_eq!(sum_pulgadas_of(&unions, Operacion::Arm).as_f64(), 4.0);
    }
}
