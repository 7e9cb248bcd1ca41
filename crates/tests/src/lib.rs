//! Integration tests driving the axum router against a real Postgres.
//! Every test skips (with a note) when neither TEST_DATABASE_URL nor
//! DATABASE_URL is set.

#[cfg(test)]
mod common;

#[cfg(test)]
mod otlp_ingest_tests;

#[cfg(test)]
mod logs_query_tests;

#[cfg(test)]
mod auth_identity_tests;

#[cfg(test)]
mod auth_http_tests;

#[cfg(test)]
mod admin_provider_tests;

#[cfg(test)]
mod alert_tests;
