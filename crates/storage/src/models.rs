use serde::{Deserialize, Serialize};

/// One row of scan_results. The `risks` column holds a JSON array; decoding
/// into typed findings happens in the core store.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScanRow {
    pub id: i64,
    pub file_path: String,
    pub content: String,
    pub risks: String,
    pub analysis: String,
    pub timestamp: String,
}
