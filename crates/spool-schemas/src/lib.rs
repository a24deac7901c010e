//! Shared data model for the spool occupation/union workflow core.
//!
//! Every other crate in the workspace depends on this one and nothing else
//! for row shapes — mirrors how the original workspace centered all wire
//! types in a single `*-schemas` crate consumed everywhere.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod ids;

pub use ids::{TagSpool, WorkerId};

// ---------------------------------------------------------------------------
// Inches — a 1-decimal fixed point, never a bare f64 (spec.md §3, §4.5/§4.6)
// ---------------------------------------------------------------------------

/// Diameter-in-inches metric, always rounded to one decimal place.
///
/// Stored internally as tenths of an inch so summation across many unions
/// cannot drift away from the one-decimal contract the spec requires for
/// `pulgadas_arm` / `pulgadas_sold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inches(i64);

impl Inches {
    pub const ZERO: Inches = Inches(0);

    /// Construct from a decimal value, rounding to the nearest tenth.
    pub fn from_f64(v: f64) -> Self {
        Inches((v * 10.0).round() as i64)
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 10.0
    }

    pub fn tenths(&self) -> i64 {
        self.0
    }
}

impl std::iter::Sum for Inches {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Inches(iter.map(|i| i.0).sum())
    }
}

impl std::ops::Add for Inches {
    type Output = Inches;
    fn add(self, rhs: Self) -> Self::Output {
        Inches(self.0 + rhs.0)
    }
}

impl fmt::Display for Inches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_f64())
    }
}

// ---------------------------------------------------------------------------
// Worker — read-only to this core (spec.md §3)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Arm,
    Sold,
    Metrologia,
    Ayudante,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub initials: String,
    pub active: bool,
    pub roles: Vec<Role>,
}

impl Worker {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Render as `INITIALS(ID)`, the wire format used in every worker column
    /// (spec.md §6).
    pub fn rendered(&self) -> String {
        format!("{}({})", self.initials, self.id)
    }
}

// ---------------------------------------------------------------------------
// Operacion / Accion / EventoTipo — closed enums (spec.md §3, §6)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operacion {
    Arm,
    Sold,
    Metrologia,
    Reparacion,
}

impl fmt::Display for Operacion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operacion::Arm => "ARM",
            Operacion::Sold => "SOLD",
            Operacion::Metrologia => "METROLOGIA",
            Operacion::Reparacion => "REPARACION",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Accion {
    Tomar,
    Pausar,
    Completar,
    Iniciar,
    Finalizar,
    Cancelar,
    AutoTrigger,
}

/// The closed set of audit event types (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventoTipo {
    TomarSpool,
    PausarSpool,
    CompletarSpool,
    IniciarSpool,
    FinalizarSpool,
    SpoolCancelado,
    SpoolArmPausado,
    SpoolArmCompletado,
    SpoolSoldPausado,
    SpoolSoldCompletado,
    UnionArmRegistrada,
    UnionSoldRegistrada,
    MetrologiaCompletada,
    MetrologiaAutoTriggered,
    ReparacionTomar,
    ReparacionCompletar,
    MigrationGeneric,
}

// ---------------------------------------------------------------------------
// Spool (carrete) — spec.md §3
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spool {
    pub tag_spool: TagSpool,
    pub ot: String,
    pub fecha_materiales: Option<NaiveDate>,
    pub ocupado_por: Option<WorkerId>,
    pub fecha_ocupacion: Option<DateTime<Utc>>,
    pub version: Uuid,
    pub estado_detalle: String,
    pub total_uniones: u32,
    pub uniones_arm_completadas: u32,
    pub uniones_sold_completadas: u32,
    pub pulgadas_arm: Inches,
    pub pulgadas_sold: Inches,
    /// Legacy v3 spool-level worker/date columns (spec.md §6). Unused by
    /// v4 spools, which track these per-union instead.
    pub armador: Option<WorkerId>,
    pub soldador: Option<WorkerId>,
    pub fecha_armado: Option<DateTime<Utc>>,
    pub fecha_soldadura: Option<DateTime<Utc>>,
    /// Repair cycles consumed so far, `0..=3` (spec.md §4.9, §9, glossary).
    /// Cycle 3 with a REJECTED metrology result is terminal `BLOQUEADO`.
    pub repair_cycle: u8,
}

/// Repair cycles before a spool is supervisor-only `BLOQUEADO` (spec.md §4.9, §9).
pub const MAX_REPAIR_CYCLES: u8 = 3;

impl Spool {
    /// `total_uniones > 0` ⇒ v4 spool with per-union rows (spec.md §4.6, §6).
    pub fn is_v4(&self) -> bool {
        self.total_uniones > 0
    }

    pub fn is_occupied(&self) -> bool {
        self.ocupado_por.is_some()
    }
}

// ---------------------------------------------------------------------------
// Union — spec.md §3
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Union {
    pub tag_spool: TagSpool,
    /// Union ordinal within a spool, `1..=20`.
    pub n_union: u8,
    pub dn_union: Inches,
    pub tipo_union: String,
    pub arm_fecha_inicio: Option<DateTime<Utc>>,
    pub arm_fecha_fin: Option<DateTime<Utc>>,
    pub arm_worker: Option<String>,
    pub sol_fecha_inicio: Option<DateTime<Utc>>,
    pub sol_fecha_fin: Option<DateTime<Utc>>,
    pub sol_worker: Option<String>,
    pub ndt_fecha: Option<NaiveDate>,
    pub ndt_status: Option<String>,
    pub version: Uuid,
    pub creado_por: Option<String>,
    pub fecha_creacion: Option<DateTime<Utc>>,
    pub modificado_por: Option<String>,
    pub fecha_modificacion: Option<DateTime<Utc>>,
}

/// Free-weld family: a union requiring only ARM (spec.md §4.7 step 9).
pub const TIPO_UNION_FREE_WELD: &str = "FW";

impl Union {
    pub fn is_free_weld(&self) -> bool {
        self.tipo_union.eq_ignore_ascii_case(TIPO_UNION_FREE_WELD)
    }

    pub fn fecha_fin(&self, op: Operacion) -> Option<DateTime<Utc>> {
        match op {
            Operacion::Arm => self.arm_fecha_fin,
            Operacion::Sold => self.sol_fecha_fin,
            _ => None,
        }
    }

    pub fn is_complete(&self, op: Operacion) -> bool {
        self.fecha_fin(op).is_some()
    }

    /// Invariant (i): `sol_fecha_fin ≠ ∅ ⇒ arm_fecha_fin ≠ ∅`.
    pub fn satisfies_arm_before_sold(&self) -> bool {
        self.sol_fecha_fin.is_none() || self.arm_fecha_fin.is_some()
    }

    /// Invariant (ii): `{op}_fecha_fin ≠ ∅ ⇒ {op}_worker ≠ ∅ ∧ {op}_fecha_inicio ≠ ∅`.
    pub fn satisfies_completion_invariant(&self, op: Operacion) -> bool {
        let (fin, worker, inicio) = match op {
            Operacion::Arm => (self.arm_fecha_fin, &self.arm_worker, self.arm_fecha_inicio),
            Operacion::Sold => (self.sol_fecha_fin, &self.sol_worker, self.sol_fecha_inicio),
            _ => return true,
        };
        fin.is_none() || (worker.is_some() && inicio.is_some())
    }
}

// ---------------------------------------------------------------------------
// Audit Event — spec.md §3, §4.4, §6
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub evento_tipo: EventoTipo,
    pub tag_spool: TagSpool,
    /// `None` for spool-scope events; set to the union number for per-union events.
    pub n_union: Option<u8>,
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub operacion: Operacion,
    pub accion: Accion,
    pub fecha_operacion: NaiveDate,
    pub metadata_json: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inches_rounds_to_one_decimal() {
        let a = Inches::from_f64(2.04);
        let b = Inches::from_f64(2.06);
        assert_eq!(a.as_f64(), 2.0);
        assert_eq!(b.as_f64(), 2.1);
    }

    #[test]
    fn inches_sum_is_exact_in_tenths() {
        let vals = vec![Inches::from_f64(1.1), Inches::from_f64(2.2), Inches::from_f64(0.2)];
        let total: Inches = vals.into_iter().sum();
        assert_eq!(total.as_f64(), 3.5);
    }

    #[test]
    fn worker_rendered_format() {
        let w = Worker {
            id: "93".to_string(),
            initials: "MR".to_string(),
            active: true,
            roles: vec![Role::Arm],
        };
        assert_eq!(w.rendered(), "MR(93)");
    }

    #[test]
    fn union_arm_before_sold_invariant() {
        let mut u = sample_union();
        assert!(u.satisfies_arm_before_sold());
        u.sol_fecha_fin = Some(Utc::now());
        assert!(!u.satisfies_arm_before_sold());
        u.arm_fecha_fin = Some(Utc::now());
        assert!(u.satisfies_arm_before_sold());
    }

    fn sample_union() -> Union {
        Union {
            tag_spool: "OT-001".to_string(),
            n_union: 1,
            dn_union: Inches::from_f64(4.0),
            tipo_union: "BW".to_string(),
            arm_fecha_inicio: None,
            arm_fecha_fin: None,
            arm_worker: None,
            sol_fecha_inicio: None,
            sol_fecha_fin: None,
            sol_worker: None,
            ndt_fecha: None,
            ndt_status: None,
            version: Uuid::nil(),
            creado_por: None,
            fecha_creacion: None,
            modificado_por: None,
            fecha_modificacion: None,
        }
    }
}
