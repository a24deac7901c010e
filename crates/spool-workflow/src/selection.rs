//! Union Selection Engine (spec.md §4.8, C8).
//!
//! Pure algorithmic core of FINALIZAR — spec.md §4.7 steps 2-3 and 6. Takes
//! a fresh availability read and a client's requested ids and returns a
//! plan; it never touches the network or the lock. The caller (Occupation
//! Workflow) executes the plan through the repositories and the
//! Version/Conflict Service.

use chrono::{DateTime, Utc};
use spool_repo::UnionCompletion;
use spool_schemas::Union;

/// Auto-determined outcome (spec.md §4.7 step 6, §8 property 5). Never
/// driven by client intent — purely a function of `k` vs `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizarAction {
    Completar,
    Pausar,
    Cancelado,
}

/// The plan for one FINALIZAR attempt, computed against one fresh
/// availability read (spec.md §4.8).
#[derive(Debug, Clone)]
pub struct SelectionPlan {
    pub action: FinalizarAction,
    /// `n_union`s present in the client's submission but no longer
    /// available at this fresh read (raced away by a concurrent writer).
    pub unavailable: Vec<u8>,
    /// `selected_ids ∩ ids(available)` — what this attempt actually writes.
    pub selected: Vec<u8>,
    /// `|selected|` (spec.md §4.7 step 2).
    pub k: u32,
    /// `|available|`, computed from the same fresh read (spec.md §4.7 step 2).
    pub n: u32,
    /// Row-level batch write intent for [`spool_repo::UnionRepository::batch_set`].
    pub completions: Vec<UnionCompletion>,
}

impl SelectionPlan {
    pub fn is_cancelado(&self) -> bool {
        matches!(self.action, FinalizarAction::Cancelado)
    }

    pub fn is_completar(&self) -> bool {
        matches!(self.action, FinalizarAction::Completar)
    }
}

/// Run spec.md §4.7 steps 2-3 and 6 against one fresh `available` read.
///
/// `selected_ids` may reference unions no longer available (raced away);
/// those are reported in `unavailable` but otherwise ignored — `selected`
/// is always a subset of `available`, so `k ≤ n` holds by construction.
/// The spec's step-6 "`k > n`" race describes a union completing *after*
/// this intersection but *before* the batch write actually lands; that is
/// caught downstream by [`spool_repo::RepoError::UnionAlreadyComplete`] and
/// handled by retrying this whole plan against a new fresh read (spec.md
/// §4.7 step 4, step 6).
pub fn plan_finalizar(
    selected_ids: &[u8],
    available: &[Union],
    worker_rendered: &str,
    now: DateTime<Utc>,
) -> SelectionPlan {
    let n = available.len() as u32;
    let available_ids: std::collections::HashSet<u8> = available.iter().map(|u| u.n_union).collect();

    let mut selected = Vec::new();
    let mut unavailable = Vec::new();
    for &id in selected_ids {
        if available_ids.contains(&id) {
            selected.push(id);
        } else {
            unavailable.push(id);
        }
    }
    let k = selected.len() as u32;

    let action = if k == 0 {
        FinalizarAction::Cancelado
    } else if k == n {
        FinalizarAction::Completar
    } else {
        FinalizarAction::Pausar
    };

    let completions = selected
        .iter()
        .map(|&n_union| UnionCompletion {
            n_union,
            worker_rendered: worker_rendered.to_string(),
            at: now,
        })
        .collect();

    SelectionPlan {
        action,
        unavailable,
        selected,
        k,
        n,
        completions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_schemas::Inches;
    use uuid::Uuid;

    fn available_union(n: u8) -> Union {
        Union {
            tag_spool: "OT-001".into(),
            n_union: n,
            dn_union: Inches::from_f64(2.0),
            tipo_union: "BW".into(),
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

    #[test]
    fn partial_selection_pauses() {
        let available: Vec<_> = (1..=10).map(available_union).collect();
        let selected: Vec<u8> = (1..=7).collect();
        let plan = plan_finalizar(&selected, &available, "MR(93)", Utc::now());
        assert_eq!(plan.action, FinalizarAction::Pausar);
        assert_eq!(plan.k, 7);
        assert_eq!(plan.n, 10);
        assert_eq!(plan.completions.len(), 7);
        assert!(plan.unavailable.is_empty());
    }

    #[test]
    fn full_selection_completes() {
        let available: Vec<_> = (1..=3).map(available_union).collect();
        let selected: Vec<u8> = vec![1, 2, 3];
        let plan = plan_finalizar(&selected, &available, "MR(93)", Utc::now());
        assert!(plan.is_completar());
    }

    #[test]
    fn empty_selection_cancels() {
        let available: Vec<_> = (1..=3).map(available_union).collect();
        let plan = plan_finalizar(&[], &available, "MR(93)", Utc::now());
        assert!(plan.is_cancelado());
        assert_eq!(plan.completions.len(), 0);
    }

    #[test]
    fn raced_away_ids_are_excluded_but_reported() {
        // S4: available shrank to {U3} between dispatch and this read;
        // client still submitted {U2, U3}.
        let available = vec![available_union(3)];
        let plan = plan_finalizar(&[2, 3], &available, "MR(93)", Utc::now());
        assert_eq!(plan.selected, vec![3]);
        assert_eq!(plan.unavailable, vec![2]);
        assert_eq!(plan.k, 1);
        assert_eq!(plan.n, 1);
        assert!(plan.is_completar());
    }
}
