use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::auth::TokenVerifier;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::access::AccessControl;
use crate::services::courts::CourtRegistry;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub tokens: TokenVerifier,
    pub courts: Box<dyn CourtRegistry>,
    pub access: Box<dyn AccessControl>,
}

impl AppState {
    /// The single connection handle; never hold it across an `.await`.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal("database lock poisoned".to_string()))
    }
}
