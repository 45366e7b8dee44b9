use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::AppError;

#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Names of every permission granted to `user_id` through its roles.
    async fn permissions_for(&self, user_id: i64, token: &str) -> Result<Vec<String>, AppError>;
}

/// The access control store lists permissions either by name or as `{id, name}` records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PermissionEntry {
    Name(String),
    Record { name: String },
}

impl PermissionEntry {
    fn into_name(self) -> String {
        match self {
            PermissionEntry::Name(name) | PermissionEntry::Record { name } => name,
        }
    }
}

pub struct HttpAccessControl {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAccessControl {
    pub fn new(base_url: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl AccessControl for HttpAccessControl {
    async fn permissions_for(&self, user_id: i64, token: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/users/{user_id}/permissions", self.base_url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(user_id, "access control store unreachable: {e}");
                AppError::DependencyUnavailable("access control store unreachable".to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(user_id, %status, "permission lookup failed");
            return Err(AppError::DependencyUnavailable(format!(
                "access control store returned {status}"
            )));
        }

        let entries: Vec<PermissionEntry> = resp.json().await.map_err(|e| {
            tracing::warn!(user_id, "unreadable permission list: {e}");
            AppError::DependencyUnavailable("unreadable permission list".to_string())
        })?;

        Ok(entries.into_iter().map(PermissionEntry::into_name).collect())
    }
}
