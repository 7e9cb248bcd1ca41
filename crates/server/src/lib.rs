pub mod config;

pub mod db;

pub mod error_convert;

pub mod telemetry;

pub mod health;

pub mod cache;

pub mod cursor;

pub mod otlp;

pub mod repo;

pub mod auth;

pub mod live_tail;

pub mod jobs;

pub mod mailer;

pub mod detection;

pub mod alerts;

pub mod settings;

pub mod bootstrap;

pub mod rate_limit;

pub mod rest;

pub mod openapi;
