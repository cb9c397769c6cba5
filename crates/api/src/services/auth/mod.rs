//! Authentication service.
//!
//! Provides password registration and login, token refresh, and the admin
//! account bootstrap.

mod error;
pub mod tokens;

pub use error::AuthError;
pub use tokens::{Claims, TokenError, TokenKind, TokenPair, TokenService};

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use tracing::instrument;

use toybox_core::{Email, Role, UserId};

use crate::db::{RepositoryError, Store};
use crate::models::{NewUser, User};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash checked when the email is unknown, so both login failures cost one
/// Argon2 verification.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("toybox-unknown-account").ok());

/// Authentication service.
///
/// Handles registration, login, token refresh, and password changes.
pub struct AuthService<'a> {
    store: &'a dyn Store,
    tokens: &'a TokenService,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn Store, tokens: &'a TokenService) -> Self {
        Self { store, tokens }
    }

    /// Register a new customer and issue their tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingName` if the name is blank.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, TokenPair), AuthError> {
        let user = self.create_user(name, email, password, Role::Customer).await?;
        let tokens = self.tokens.issue_pair(&user)?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok((user, tokens))
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, TokenPair), AuthError> {
        // A malformed email cannot belong to anyone
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some((user, password_hash)) = self.store.credentials_by_email(&email).await? else {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, dummy);
            }
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &password_hash)?;

        let tokens = self.tokens.issue_pair(&user)?;
        Ok((user, tokens))
    }

    /// Login to the admin console. Only accounts with the admin role pass.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` for bad credentials or a
    /// non-admin account.
    pub async fn admin_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, TokenPair), AuthError> {
        let (user, tokens) = self.login(email, password).await?;

        if user.role != Role::Admin {
            tracing::warn!(user_id = %user.id, "Non-admin attempted admin login");
            return Err(AuthError::InvalidCredentials);
        }

        Ok((user, tokens))
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The refresh token itself is not rotated. The account is re-read so that
    /// role changes apply to the new access token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingToken` if no token was sent.
    /// Returns `AuthError::Token` if it fails verification.
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<String, AuthError> {
        let token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let claims = self.tokens.verify(token, TokenKind::Refresh)?;

        let user = self
            .store
            .user_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(self.tokens.issue(&user, TokenKind::Access)?)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.store
            .user_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Change a user's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `old_password` is wrong.
    /// Returns `AuthError::WeakPassword` if `new_password` is too short.
    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let (_, password_hash) = self
            .store
            .credentials_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        verify_password(old_password, &password_hash)?;
        validate_password(new_password)?;

        let new_hash = hash_password(new_password)?;
        self.store
            .update_password_hash(user_id, &new_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Make sure an admin account exists for `email`.
    ///
    /// Creates the account if missing. An existing account is promoted to
    /// admin and keeps its password.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a new account's name, email, or password.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn ensure_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let parsed = Email::parse(email)?;

        if let Some((mut user, _)) = self.store.credentials_by_email(&parsed).await? {
            if user.role != Role::Admin {
                self.store.set_role(user.id, Role::Admin).await?;
                user.role = Role::Admin;
                tracing::info!(user_id = %user.id, "Existing user promoted to admin");
            }
            return Ok(user);
        }

        let user = self.create_user(name, email, password, Role::Admin).await?;
        tracing::info!(user_id = %user.id, "Admin account created");
        Ok(user)
    }

    async fn create_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::MissingName);
        }

        // Validate email
        let email = Email::parse(email)?;

        // Validate password
        validate_password(password)?;

        // Hash password
        let password_hash = hash_password(password)?;

        self.store
            .create_user(&NewUser {
                name: name.to_owned(),
                email,
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id with a random salt.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password doesn't match.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
