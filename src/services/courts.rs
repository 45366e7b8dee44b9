use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::errors::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct CourtInfo {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[async_trait]
pub trait CourtRegistry: Send + Sync {
    /// Resolves a court that exists and is active. A missing, inactive or refused court is
    /// `CourtUnavailable`; a transport failure is `DependencyUnavailable`.
    async fn active_court(&self, court_id: i64, token: &str) -> Result<CourtInfo, AppError>;
}

pub struct HttpCourtRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCourtRegistry {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl CourtRegistry for HttpCourtRegistry {
    async fn active_court(&self, court_id: i64, token: &str) -> Result<CourtInfo, AppError> {
        let url = format!("{}/courts/{court_id}", self.base_url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(court_id, "court registry unreachable: {e}");
                AppError::DependencyUnavailable("court registry unreachable".to_string())
            })?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::CourtUnavailable(court_id));
        }
        // The registry authorizes the read with the caller's own token.
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::info!(court_id, %status, "court registry refused the lookup");
            return Err(AppError::CourtUnavailable(court_id));
        }
        if !status.is_success() {
            tracing::warn!(court_id, %status, "court registry returned an error");
            return Err(AppError::DependencyUnavailable(format!(
                "court registry returned {status}"
            )));
        }

        let court: CourtInfo = resp.json().await.map_err(|e| {
            tracing::warn!(court_id, "unreadable court registry response: {e}");
            AppError::DependencyUnavailable("unreadable court registry response".to_string())
        })?;

        if !court.is_active {
            return Err(AppError::CourtUnavailable(court_id));
        }
        Ok(court)
    }
}
