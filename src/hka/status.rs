use serde::{Deserialize, Serialize};

/// Normalized vendor document status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Stamped,
    Cancelled,
    Processing,
    Failed,
    NotFound,
}

impl DocumentState {
    /// Map the vendor's free-form status string. Unknown values are treated
    /// as still in progress.
    pub fn from_vendor(raw: &str) -> Self {
        let normalized = raw.trim().to_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "ACEPTADO" | "AUTORIZADO" | "PROCESADO" | "TIMBRADO" => DocumentState::Stamped,
            "ANULADO" | "CANCELADO" => DocumentState::Cancelled,
            "RECHAZADO" | "ERROR" | "FALLIDO" => DocumentState::Failed,
            "NO ENCONTRADO" | "NO EXISTE" | "NOT FOUND" => DocumentState::NotFound,
            _ => DocumentState::Processing,
        }
    }
}
