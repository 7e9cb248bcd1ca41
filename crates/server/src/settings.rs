//! Cached system settings. The SQL store is the source of truth; the KV
//! cache is the hot path read on every request by the auth middleware.

use shared_types::{AppError, AuthMode, SettingKey, SystemSetting};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::cache::{keys, Cache};
use crate::repo;

const SETTINGS_CACHE_TTL_SECS: u64 = 300;

#[derive(Clone)]
pub struct SettingsService {
    pool: Pool<Postgres>,
    cache: Cache,
}

impl SettingsService {
    pub fn new(pool: Pool<Postgres>, cache: Cache) -> Self {
        Self { pool, cache }
    }

    /// Read a setting: cache, then store, then the built-in default.
    pub async fn get(&self, key: SettingKey) -> serde_json::Value {
        let cache_key = keys::setting(key.as_str());
        if let Some(value) = self.cache.get_json::<serde_json::Value>(&cache_key).await {
            return value;
        }

        let value = match repo::settings::find(&self.pool, key.as_str()).await {
            Ok(Some(row)) => row.value,
            Ok(None) => key.default_value(),
            Err(e) => {
                tracing::error!(key = key.as_str(), error = %e, "Settings read failed, using default");
                return key.default_value();
            }
        };

        self.cache
            .set_json(&cache_key, &value, SETTINGS_CACHE_TTL_SECS)
            .await;
        value
    }

    /// Write a setting. The key must be one of the enumerated settings.
    pub async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        updated_by: Option<Uuid>,
    ) -> Result<SystemSetting, AppError> {
        let known = SettingKey::parse(key)
            .ok_or_else(|| AppError::bad_request(format!("Unknown setting key: {key}")))?;

        let row = repo::settings::upsert(&self.pool, known.as_str(), &value, updated_by).await?;
        self.cache.delete(&keys::setting(known.as_str())).await;
        Ok(row)
    }

    /// Write several settings at once, skipping null values.
    pub async fn set_many(
        &self,
        values: serde_json::Map<String, serde_json::Value>,
        updated_by: Option<Uuid>,
    ) -> Result<Vec<SystemSetting>, AppError> {
        // Validate every key before writing any of them.
        for key in values.keys() {
            if SettingKey::parse(key).is_none() {
                return Err(AppError::bad_request(format!("Unknown setting key: {key}")));
            }
        }

        let mut written = Vec::new();
        for (key, value) in values {
            if value.is_null() {
                continue;
            }
            written.push(self.set(&key, value, updated_by).await?);
        }
        Ok(written)
    }

    /// Remove an override; subsequent reads return the default.
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        let known = SettingKey::parse(key)
            .ok_or_else(|| AppError::bad_request(format!("Unknown setting key: {key}")))?;

        repo::settings::delete(&self.pool, known.as_str()).await?;
        self.cache.delete(&keys::setting(known.as_str())).await;
        Ok(())
    }

    pub async fn auth_mode(&self) -> AuthMode {
        let value = self.get(SettingKey::AuthMode).await;
        AuthMode::from_str_or_default(value.as_str().unwrap_or("standard"))
    }

    pub async fn signup_enabled(&self) -> bool {
        self.get(SettingKey::SignupEnabled)
            .await
            .as_bool()
            .unwrap_or(true)
    }

    pub async fn default_user_id(&self) -> Option<Uuid> {
        self.get(SettingKey::DefaultUserId)
            .await
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}
