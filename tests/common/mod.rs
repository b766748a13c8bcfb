use serde_json::{Value, json};
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;

pub fn payment_payload(out_order_no: &str, event_type: &str, notify_id: &str) -> Value {
    json!({
        "out_order_no": out_order_no,
        "event_type": event_type,
        "notify_id": notify_id,
    })
}

/// Writes payloads as a JSON-lines file for CLI ingestion.
pub fn write_jsonl(path: &Path, payloads: &[Value]) -> Result<(), Error> {
    let mut file = File::create(path)?;
    for payload in payloads {
        writeln!(file, "{payload}")?;
    }
    Ok(())
}
