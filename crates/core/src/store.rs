//! Relational store of scan records.

use crate::models::{RiskCount, RiskFinding, ScanRecord};
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use storage::models::ScanRow;
use tracing::warn;

#[derive(Clone)]
pub struct ScanStore {
    pool: SqlitePool,
}

impl ScanStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert(&self, record: &ScanRecord) -> anyhow::Result<()> {
        let risks_json = serde_json::to_string(&record.risks)?;
        sqlx::query(
            r#"
            INSERT INTO scan_results (file_path, content, risks, analysis, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&record.file_path)
        .bind(&record.content)
        .bind(risks_json)
        .bind(&record.analysis)
        .bind(record.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert scan record for {}", record.file_path))?;
        Ok(())
    }

    /// Invalidates stale results for a directory: deletes every record
    /// whose file_path starts with that prefix.
    pub async fn delete_prefix(&self, prefix: &str) -> anyhow::Result<u64> {
        let pattern = format!("{}%", prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
        let res = sqlx::query("DELETE FROM scan_results WHERE file_path LIKE ?1 ESCAPE '\\'")
            .bind(pattern)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn load_all(&self) -> anyhow::Result<Vec<ScanRecord>> {
        let rows = sqlx::query_as::<_, ScanRow>(
            "SELECT id, file_path, content, risks, analysis, timestamp FROM scan_results ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }

    /// Substring search over file_path and the serialized risks column,
    /// for the results browser.
    pub async fn search(&self, term: &str) -> anyhow::Result<Vec<ScanRecord>> {
        let pattern = format!("%{}%", term);
        let rows = sqlx::query_as::<_, ScanRow>(
            r#"
            SELECT id, file_path, content, risks, analysis, timestamp FROM scan_results
            WHERE file_path LIKE ?1 OR risks LIKE ?1
            ORDER BY id
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(record_from_row).collect())
    }

    /// Rebuilds the aggregate purely from stored rows.
    pub async fn risk_count(&self) -> anyhow::Result<RiskCount> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT risks FROM scan_results")
            .fetch_all(&self.pool)
            .await?;
        let mut count = RiskCount::default();
        for (risks_json,) in rows {
            for finding in decode_risks(&risks_json) {
                count.add(&finding);
            }
        }
        Ok(count)
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM scan_results")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn record_from_row(row: ScanRow) -> ScanRecord {
    ScanRecord {
        file_path: row.file_path,
        content: row.content,
        risks: decode_risks(&row.risks),
        analysis: row.analysis,
        timestamp: parse_timestamp(&row.timestamp),
    }
}

fn decode_risks(json: &str) -> Vec<RiskFinding> {
    match serde_json::from_str(json) {
        Ok(risks) => risks,
        Err(e) => {
            warn!("Dropping undecodable risks column: {e}");
            Vec::new()
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;

    async fn store() -> ScanStore {
        let pool = storage::connect("sqlite::memory:").await.unwrap();
        storage::init(&pool).await.unwrap();
        ScanStore::new(pool)
    }

    fn record(path: &str, risk: &str, severity: Severity) -> ScanRecord {
        ScanRecord {
            file_path: path.to_string(),
            content: "image registry latest".to_string(),
            risks: vec![RiskFinding {
                risk_name: risk.to_string(),
                severity,
            }],
            analysis: "### Risk: ...".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_load_round_trips_typed_risks() {
        let store = store().await;
        store
            .insert(&record("/configs/a.yml", "Poor credential hygiene", Severity::High))
            .await
            .unwrap();
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].risks[0].risk_name, "Poor credential hygiene");
        assert_eq!(all[0].risks[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn delete_prefix_removes_only_matching_records() {
        let store = store().await;
        store
            .insert(&record("/configs/a.yml", "A", Severity::Low))
            .await
            .unwrap();
        store
            .insert(&record("/other/b.yml", "B", Severity::Low))
            .await
            .unwrap();
        let deleted = store.delete_prefix("/configs").await.unwrap();
        assert_eq!(deleted, 1);
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].file_path, "/other/b.yml");
    }

    #[tokio::test]
    async fn risk_count_replays_stored_rows() {
        let store = store().await;
        store
            .insert(&record("/c/a.yml", "Dependency chain abuse", Severity::Medium))
            .await
            .unwrap();
        store
            .insert(&record("/c/b.yml", "Dependency chain abuse", Severity::Medium))
            .await
            .unwrap();
        let count = store.risk_count().await.unwrap();
        assert_eq!(count.0["Dependency chain abuse"].medium, 2);
    }

    #[tokio::test]
    async fn search_matches_path_and_risk_substrings() {
        let store = store().await;
        store
            .insert(&record("/c/deploy.yml", "Poor credential hygiene", Severity::High))
            .await
            .unwrap();
        assert_eq!(store.search("deploy").await.unwrap().len(), 1);
        assert_eq!(store.search("credential").await.unwrap().len(), 1);
        assert!(store.search("nothing-here").await.unwrap().is_empty());
    }
}
