use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a user inside an organization. Owner is implicitly a member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, utoipa::ToSchema)]
pub enum OrgRole {
    Owner,
    #[default]
    Member,
}

impl OrgRole {
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "owner" => OrgRole::Owner,
            _ => OrgRole::Member,
        }
    }

    /// Lowercase string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Owner => "owner",
            OrgRole::Member => "member",
        }
    }
}

/// Kind discriminator for authentication providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    Oidc,
    Ldap,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::Oidc => "oidc",
            ProviderKind::Ldap => "ldap",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(ProviderKind::Local),
            "oidc" => Some(ProviderKind::Oidc),
            "ldap" => Some(ProviderKind::Ldap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct OrganizationMember {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    /// bcrypt hash; None for SSO-only accounts.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// API key row. `key_hash` is SHA-256 of the plaintext; the plaintext is
/// shown to the user exactly once at creation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct ApiKey {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

/// Authentication provider row. `config` is a kind-specific JSON object
/// validated against the typed config structs in the server.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct AuthProvider {
    pub id: Uuid,
    pub kind: String,
    pub slug: String,
    pub name: String,
    pub icon: Option<String>,
    pub enabled: bool,
    pub is_default: bool,
    pub display_order: i32,
    pub allow_auto_register: bool,
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuthProvider {
    pub fn kind(&self) -> Option<ProviderKind> {
        ProviderKind::parse(&self.kind)
    }
}

/// Link between a user and an external (or local) provider identity.
/// Unique per (provider, provider_user_id).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct UserIdentity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub provider_user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Pending OIDC authorization state. Single use, 5-minute TTL, mirrored
/// in the KV cache under `oidc:state:<state>`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OidcState {
    pub state: String,
    pub nonce: String,
    pub provider_id: Uuid,
    pub redirect_uri: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// In-app notification, per user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct SystemSetting {
    pub key: String,
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// The closed set of recognized system settings. Writes against any other
/// key are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    SignupEnabled,
    AuthMode,
    DefaultUserId,
}

impl SettingKey {
    pub const ALL: [SettingKey; 3] = [
        SettingKey::SignupEnabled,
        SettingKey::AuthMode,
        SettingKey::DefaultUserId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::SignupEnabled => "auth.signup_enabled",
            SettingKey::AuthMode => "auth.mode",
            SettingKey::DefaultUserId => "auth.default_user_id",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auth.signup_enabled" => Some(SettingKey::SignupEnabled),
            "auth.mode" => Some(SettingKey::AuthMode),
            "auth.default_user_id" => Some(SettingKey::DefaultUserId),
            _ => None,
        }
    }

    pub fn default_value(&self) -> serde_json::Value {
        match self {
            SettingKey::SignupEnabled => serde_json::Value::Bool(true),
            SettingKey::AuthMode => serde_json::Value::String("standard".to_string()),
            SettingKey::DefaultUserId => serde_json::Value::Null,
        }
    }
}

/// Authentication mode controlled by the `auth.mode` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Standard,
    None,
}

impl AuthMode {
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "none" => AuthMode::None,
            _ => AuthMode::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Standard => "standard",
            AuthMode::None => "none",
        }
    }
}

/// Normalize an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Provider slugs are URL path segments: `^[a-z0-9-]{2,50}$`.
pub fn is_valid_provider_slug(slug: &str) -> bool {
    let len = slug.len();
    (2..=50).contains(&len)
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
