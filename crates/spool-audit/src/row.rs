use serde_json::Value;
use spool_schemas::AuditEvent;
use spool_store::format::format_date;
use spool_store::{worksheets, Row, SheetsBackend, SheetsGateway, StoreError};

/// Build a physical row for `evt`, sized and ordered to match the Metadata
/// worksheet's current header (column order is free — spec.md §6).
pub async fn event_to_row<B: SheetsBackend>(
    gateway: &SheetsGateway<B>,
    evt: &AuditEvent,
) -> Result<Row, StoreError> {
    let fields: [(&str, Value); 11] = [
        ("ID", Value::String(evt.event_id.to_string())),
        ("Timestamp", Value::String(evt.timestamp.to_rfc3339())),
        ("Evento_Tipo", serde_json::to_value(evt.evento_tipo).unwrap()),
        ("TAG_SPOOL", Value::String(evt.tag_spool.clone())),
        ("Worker_ID", Value::String(evt.worker_id.clone())),
        ("Worker_Nombre", Value::String(evt.worker_name.clone())),
        ("Operacion", serde_json::to_value(evt.operacion).unwrap()),
        ("Accion", serde_json::to_value(evt.accion).unwrap()),
        ("Fecha_Operacion", Value::String(format_date(evt.fecha_operacion))),
        ("Metadata_JSON", Value::String(evt.metadata_json.to_string())),
        (
            "N_UNION",
            evt.n_union.map(|n| Value::from(n)).unwrap_or(Value::Null),
        ),
    ];

    let mut width = 0usize;
    let mut indexed = Vec::with_capacity(fields.len());
    for (col, val) in fields {
        let idx = gateway.get_column_index(worksheets::METADATA, col).await?;
        width = width.max(idx + 1);
        indexed.push((idx, val));
    }

    let mut row = vec![Value::Null; width];
    for (idx, val) in indexed {
        row[idx] = val;
    }
    Ok(row)
}
