//! Tabular Store Gateway (spec.md §4.1, C1).
//!
//! A named-column read/write adaptor over an external spreadsheet-like
//! store. Generic over [`SheetsBackend`] so the HTTP-calling
//! [`GoogleSheetsBackend`] and `spool-testkit`'s in-memory fake share one
//! contract end to end.

pub mod backend;
pub mod error;
pub mod format;
pub mod gateway;
pub mod rate_monitor;

pub use backend::{CellRef, CellUpdate, GoogleSheetsBackend, Row, SheetsBackend};
pub use error::StoreError;
pub use gateway::SheetsGateway;
pub use rate_monitor::{RateMonitor, WriteKind};

/// Logical worksheet names the core depends on (spec.md §6).
pub mod worksheets {
    pub const OPERACIONES: &str = "Operaciones";
    pub const UNIONES: &str = "Uniones";
    pub const METADATA: &str = "Metadata";
}

/// Required logical columns per worksheet (spec.md §6), validated at boot
/// via [`gateway::SheetsGateway::validate_schema`].
pub mod columns {
    pub const OPERACIONES: &[&str] = &[
        "TAG_SPOOL",
        "OT",
        "Fecha_Materiales",
        "Armador",
        "Soldador",
        "Fecha_Armado",
        "Fecha_Soldadura",
        "Ocupado_Por",
        "Fecha_Ocupacion",
        "version",
        "Estado_Detalle",
        "Total_Uniones",
        "Uniones_ARM_Completadas",
        "Uniones_SOLD_Completadas",
        "Pulgadas_ARM",
        "Pulgadas_SOLD",
        "Repair_Cycle",
    ];

    pub const UNIONES: &[&str] = &[
        "ID",
        "TAG_SPOOL",
        "N_UNION",
        "DN_UNION",
        "TIPO_UNION",
        "ARM_FECHA_INICIO",
        "ARM_FECHA_FIN",
        "ARM_WORKER",
        "SOL_FECHA_INICIO",
        "SOL_FECHA_FIN",
        "SOL_WORKER",
        "NDT_FECHA",
        "NDT_STATUS",
        "version",
        "Creado_Por",
        "Fecha_Creacion",
        "Modificado_Por",
        "Fecha_Modificacion",
    ];

    pub const METADATA: &[&str] = &[
        "ID",
        "Timestamp",
        "Evento_Tipo",
        "TAG_SPOOL",
        "Worker_ID",
        "Worker_Nombre",
        "Operacion",
        "Accion",
        "Fecha_Operacion",
        "Metadata_JSON",
        "N_UNION",
    ];
}
