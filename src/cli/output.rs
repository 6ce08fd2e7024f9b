use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

/// Envelope for `--json` output.
#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub data: T,
}

pub fn json_ok<T: Serialize>(data: T) -> JsonResponse<T> {
    JsonResponse {
        status: "ok",
        timestamp: Utc::now(),
        version: crate::VERSION,
        data,
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}
