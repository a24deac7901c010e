//! Occupation Workflow (C7), Union Selection Engine (C8), and State
//! Machines (C9) — spec.md §4.7, §4.8, §4.9. The part that composes every
//! other crate in the workspace into the actual INICIAR/FINALIZAR
//! behavior.

pub mod error;
pub mod occupation;
pub mod selection;
pub mod state_machine;

pub use error::DomainError;
pub use occupation::{
    EventSink, FinalizarOutcome, IniciarOutcome, LegacyOutcome, OccupationEvent, OccupationEventKind,
    OccupationWorkflow, WorkerDirectory,
};
pub use selection::{plan_finalizar, FinalizarAction, SelectionPlan};
pub use state_machine::{
    apply_metrology_result, should_trigger_metrology, MetrologiaState, MetrologyResult, OpState, SpoolMachine,
};
