//! Admin user management commands.
//!
//! # Usage
//!
//! ```bash
//! toybox admin create -e admin@example.com -n "Admin Name" -p 'long-passphrase'
//! ```
//!
//! # Environment Variables
//!
//! Reads the same environment as the API server (`DATABASE_URL`, `JWT_SECRET`,
//! `JWT_REFRESH_SECRET`, ...). `API_STORE` must be `postgres`.

use thiserror::Error;

use toybox_api::config::{ApiConfig, ConfigError, StoreBackend};
use toybox_api::db::{self, PgStore};
use toybox_api::services::{AuthError, AuthService, TokenService};
use toybox_core::UserId;

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("admin accounts can only be created in a postgres store")]
    NotPersistent,

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Create an admin user, or promote the existing account with this email.
///
/// # Returns
///
/// The ID of the admin user.
pub async fn create_user(email: &str, name: &str, password: &str) -> Result<UserId, AdminError> {
    let config = ApiConfig::from_env()?;

    let StoreBackend::Postgres { database_url } = &config.store else {
        return Err(AdminError::NotPersistent);
    };

    tracing::info!("Connecting to database...");
    let store = PgStore::new(db::create_pool(database_url).await?);
    let tokens = TokenService::new(&config.auth);

    let user = AuthService::new(&store, &tokens)
        .ensure_admin(name, email, password)
        .await?;

    tracing::info!(
        "Admin user ready! ID: {}, Email: {}",
        user.id,
        user.email.as_str()
    );

    Ok(user.id)
}
