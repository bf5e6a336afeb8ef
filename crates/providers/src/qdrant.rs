use crate::ProviderError;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
    pub vector_size: u64,
}

#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    cfg: QdrantConfig,
}

impl QdrantClient {
    pub fn new(cfg: QdrantConfig) -> Self {
        Self {
            client: Client::new(),
            cfg,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.cfg.api_key {
            builder.header("api-key", key)
        } else {
            builder
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.bytes().await.unwrap_or(Bytes::from_static(b""));
            return Err(ProviderError::RequestFailed(format!(
                "status {} body {:?}",
                status, body
            )));
        }
        Ok(resp)
    }

    pub async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
    ) -> Result<QdrantSearchResponse, ProviderError> {
        #[derive(Serialize)]
        struct SearchRequest {
            vector: Vec<f32>,
            limit: u64,
            with_payload: bool,
        }
        let url = format!(
            "{}/collections/{}/points/search",
            self.cfg.url, self.cfg.collection
        );
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let resp = self
            .authed(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let resp = Self::check(resp).await?;
        let parsed: QdrantSearchResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(parsed)
    }

    pub async fn upsert(&self, points: Vec<QdrantPoint>) -> Result<(), ProviderError> {
        let url = format!(
            "{}/collections/{}/points",
            self.cfg.url, self.cfg.collection
        );
        let req = QdrantUpsert { points };
        let resp = self
            .authed(self.client.put(url).json(&req))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn delete_points(&self, ids: Vec<String>) -> Result<(), ProviderError> {
        #[derive(Serialize)]
        struct DeletePoints {
            points: Vec<String>,
        }
        let url = format!(
            "{}/collections/{}/points/delete",
            self.cfg.url, self.cfg.collection
        );
        let body = DeletePoints { points: ids };
        let resp = self
            .authed(self.client.post(url).json(&body))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Pages through the whole collection and returns every point id.
    pub async fn list_ids(&self) -> Result<Vec<String>, ProviderError> {
        #[derive(Serialize)]
        struct ScrollRequest {
            limit: u64,
            with_payload: bool,
            with_vector: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            offset: Option<serde_json::Value>,
        }
        #[derive(Deserialize)]
        struct ScrollResult {
            points: Vec<ScrolledPoint>,
            next_page_offset: Option<serde_json::Value>,
        }
        #[derive(Deserialize)]
        struct ScrolledPoint {
            id: serde_json::Value,
        }
        #[derive(Deserialize)]
        struct ScrollResponse {
            result: ScrollResult,
        }

        let url = format!(
            "{}/collections/{}/points/scroll",
            self.cfg.url, self.cfg.collection
        );
        let mut ids = Vec::new();
        let mut offset: Option<serde_json::Value> = None;
        loop {
            let body = ScrollRequest {
                limit: 256,
                with_payload: false,
                with_vector: false,
                offset: offset.take(),
            };
            let resp = self
                .authed(self.client.post(&url).json(&body))
                .send()
                .await
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
            let resp = Self::check(resp).await?;
            let parsed: ScrollResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
            for p in parsed.result.points {
                match p.id {
                    serde_json::Value::String(s) => ids.push(s),
                    other => ids.push(other.to_string()),
                }
            }
            match parsed.result.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(ids)
    }

    /// Drops and recreates the collection with a cosine-distance index.
    pub async fn recreate_collection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/collections/{}", self.cfg.url, self.cfg.collection);
        // Deleting a missing collection is fine; ignore the 404.
        let _ = self
            .authed(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        let body = serde_json::json!({
            "vectors": { "size": self.cfg.vector_size, "distance": "Cosine" }
        });
        let resp = self
            .authed(self.client.put(&url).json(&body))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct QdrantUpsert {
    pub points: Vec<QdrantPoint>,
}

#[derive(Debug, Serialize)]
pub struct QdrantPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct QdrantSearchResponse {
    pub result: Vec<SearchResult>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SearchResult {
    pub id: serde_json::Value,
    pub score: f32,
    pub payload: Option<serde_json::Value>,
}
