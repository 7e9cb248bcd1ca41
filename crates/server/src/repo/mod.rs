pub mod alert_history;
pub mod alert_rules;
pub mod api_keys;
pub mod identities;
pub mod logs;
pub mod notifications;
pub mod oidc_states;
pub mod organizations;
pub mod projects;
pub mod providers;
pub mod sessions;
pub mod settings;
pub mod sigma_rules;
pub mod spans;
pub mod traces;
pub mod users;
