//! Zefest Session Module
//! Access/refresh token and cached profile bookkeeping on top of the local store

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::storage::{KeyValueStore, StorageError, StorageKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub bonus_available: f64,
    #[serde(default)]
    pub referral_code: String,
}

/// Body returned by `/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub refresh: String,
    pub access: String,
    #[serde(default)]
    pub exp: Option<String>,
    pub data: User,
}

/// Persist the tokens and profile from a successful login
pub fn save_auth(store: &dyn KeyValueStore, auth: &AuthResponse) -> Result<(), StorageError> {
    store.set(StorageKey::AccessToken, &auth.access)?;
    store.set(StorageKey::RefreshToken, &auth.refresh)?;
    store.set(StorageKey::User, &serde_json::to_string(&auth.data)?)?;
    debug!(user_id = %auth.data.id, "stored auth session");
    Ok(())
}

/// Cached profile, `None` when absent or unreadable
pub fn current_user(store: &dyn KeyValueStore) -> Option<User> {
    let raw = store.get(StorageKey::User)?;
    match serde_json::from_str(&raw) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!("cached user profile is unreadable: {}", e);
            None
        }
    }
}

pub fn access_token(store: &dyn KeyValueStore) -> Option<String> {
    store
        .get(StorageKey::AccessToken)
        .filter(|token| !token.is_empty())
}

pub fn refresh_token(store: &dyn KeyValueStore) -> Option<String> {
    store
        .get(StorageKey::RefreshToken)
        .filter(|token| !token.is_empty())
}

pub fn store_access_token(store: &dyn KeyValueStore, token: &str) -> Result<(), StorageError> {
    store.set(StorageKey::AccessToken, token)
}

pub fn is_authenticated(store: &dyn KeyValueStore) -> bool {
    access_token(store).is_some()
}

/// Push registration token handed over by the messaging plugin
pub fn store_fcm_token(store: &dyn KeyValueStore, token: &str) -> Result<(), StorageError> {
    store.set(StorageKey::FcmToken, token)
}

pub fn fcm_token(store: &dyn KeyValueStore) -> Option<String> {
    store.get(StorageKey::FcmToken)
}

/// Drop everything the client remembers, as the app does on logout
pub fn logout(store: &dyn KeyValueStore) -> Result<(), StorageError> {
    store.clear()
}
