//! State Machines (spec.md §4.9, C9).
//!
//! Three machines per spool — ARM, SOLD, METROLOGIA — hydrated fresh from
//! row fields on every request rather than persisted (spec.md §9: "the
//! v3.0→v4.0 lesson: keep one source of truth"). `estado_detalle` is the
//! machines' pretty-printed projection written back to the spool row.

use std::fmt;

use spool_schemas::{Spool, Union, MAX_REPAIR_CYCLES};

/// ARM or SOLD machine state, derived per-union from the aggregate counters
/// plus current occupation (spec.md §4.9: `PENDIENTE → EN_PROGRESO →
/// (PAUSADO ⇄ EN_PROGRESO) → COMPLETADO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Pendiente,
    EnProgreso,
    Pausado,
    Completado,
}

impl OpState {
    /// `total` is the spool's `total_uniones`; `completadas` the matching
    /// `{op}_completadas` aggregate; `occupied` whether the spool is
    /// currently held by a worker (spec.md §4.9, §3).
    pub fn hydrate(total: u32, completadas: u32, occupied: bool) -> Self {
        if total == 0 {
            return OpState::Pendiente;
        }
        if completadas >= total {
            return OpState::Completado;
        }
        if occupied {
            return OpState::EnProgreso;
        }
        if completadas > 0 {
            return OpState::Pausado;
        }
        OpState::Pendiente
    }
}

impl fmt::Display for OpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpState::Pendiente => "PENDIENTE",
            OpState::EnProgreso => "EN_PROGRESO",
            OpState::Pausado => "PAUSADO",
            OpState::Completado => "COMPLETADO",
        };
        write!(f, "{s}")
    }
}

/// METROLOGIA machine state (spec.md §4.9): `NO_APLICA → PENDIENTE →
/// (APROBADO | RECHAZADO → PENDIENTE_REPARACION → …)`, cycle 3 REJECTED is
/// terminal `BLOQUEADO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetrologiaState {
    NoAplica,
    Pendiente,
    Aprobado,
    PendienteReparacion,
    Bloqueado,
}

impl MetrologiaState {
    /// Hydrate from the spool's `estado_detalle` projection and
    /// `repair_cycle` counter. `estado_detalle` values other than the ones
    /// this machine writes (legacy/unknown strings) hydrate as `NoAplica` —
    /// the safe default for a spool metrology has never touched.
    pub fn hydrate(estado_detalle: &str, repair_cycle: u8) -> Self {
        match estado_detalle {
            "PENDIENTE_METROLOGIA" => MetrologiaState::Pendiente,
            "METROLOGIA_APROBADA" => MetrologiaState::Aprobado,
            "PENDIENTE_REPARACION" => {
                if repair_cycle >= MAX_REPAIR_CYCLES {
                    MetrologiaState::Bloqueado
                } else {
                    MetrologiaState::PendienteReparacion
                }
            }
            "BLOQUEADO" => MetrologiaState::Bloqueado,
            _ => MetrologiaState::NoAplica,
        }
    }
}

impl fmt::Display for MetrologiaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetrologiaState::NoAplica => "NO_APLICA",
            MetrologiaState::Pendiente => "PENDIENTE_METROLOGIA",
            MetrologiaState::Aprobado => "METROLOGIA_APROBADA",
            MetrologiaState::PendienteReparacion => "PENDIENTE_REPARACION",
            MetrologiaState::Bloqueado => "BLOQUEADO",
        };
        write!(f, "{s}")
    }
}

/// Outcome of a metrology inspection (not modelled by spec.md's HTTP
/// boundary directly, but named so `apply_metrology_result` has a typed
/// input instead of a bare bool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetrologyResult {
    Aprobado,
    Rechazado,
}

/// Apply an inspection result against the current repair cycle (spec.md
/// §4.9, §9, glossary). Returns the next `estado_detalle` string and the
/// `repair_cycle` to persist. REJECTED at cycle `MAX_REPAIR_CYCLES` is
/// terminal `BLOQUEADO`; otherwise it advances the cycle and re-queues for
/// repair.
pub fn apply_metrology_result(result: MetrologyResult, repair_cycle: u8) -> (&'static str, u8) {
    match result {
        MetrologyResult::Aprobado => ("METROLOGIA_APROBADA", repair_cycle),
        MetrologyResult::Rechazado => {
            if repair_cycle >= MAX_REPAIR_CYCLES {
                ("BLOQUEADO", repair_cycle)
            } else {
                ("PENDIENTE_REPARACION", repair_cycle + 1)
            }
        }
    }
}

/// The three composed inner machines for one spool (spec.md §4.9: "the
/// outer Spool machine holds three independent inner machines").
#[derive(Debug, Clone, Copy)]
pub struct SpoolMachine {
    pub arm: OpState,
    pub sold: OpState,
    pub metrologia: MetrologiaState,
}

impl SpoolMachine {
    pub fn hydrate(spool: &Spool) -> Self {
        let occupied = spool.is_occupied();
        Self {
            arm: OpState::hydrate(spool.total_uniones, spool.uniones_arm_completadas, occupied),
            sold: OpState::hydrate(spool.total_uniones, spool.uniones_sold_completadas, occupied),
            metrologia: MetrologiaState::hydrate(&spool.estado_detalle, spool.repair_cycle),
        }
    }

    /// Pretty-printed projection written back to `Estado_Detalle` (spec.md
    /// §4.9). Metrology, once active, dominates the display string; before
    /// that the two per-operation machines are shown side by side.
    pub fn display(&self) -> String {
        if self.metrologia != MetrologiaState::NoAplica {
            return self.metrologia.to_string();
        }
        format!("ARM:{} SOLD:{}", self.arm, self.sold)
    }
}

/// ARM closure: every free-weld union has `arm_fecha_fin` set (spec.md
/// §4.7 step 9 — FW needs only ARM).
fn arm_closure(unions: &[Union]) -> bool {
    unions
        .iter()
        .filter(|u| u.is_free_weld())
        .all(|u| u.arm_fecha_fin.is_some())
}

/// SOLD closure: every non-free-weld union has `sol_fecha_fin` set.
fn sold_closure(unions: &[Union]) -> bool {
    unions
        .iter()
        .filter(|u| !u.is_free_weld())
        .all(|u| u.sol_fecha_fin.is_some())
}

/// `should_trigger_metrology` (spec.md §4.7 step 9, §9 Open Questions):
/// trigger iff ARM closure AND SOLD closure both hold — never on a single
/// operation's closure alone, even for FW-only spools (arm_closure already
/// covers that case since sold_closure is vacuously true with no non-FW
/// unions).
pub fn should_trigger_metrology(unions: &[Union]) -> bool {
    !unions.is_empty() && arm_closure(unions) && sold_closure(unions)
}
