// src/config.rs

use std::env;
use dotenvy::dotenv;

use crate::models::subject::Subject;

/// Number of most recent results kept per topic.
pub const RECENT_WINDOW_SIZE: usize = 10;

/// Weight of the rolling-window accuracy in the mastery blend.
pub const RECENT_WEIGHT: f64 = 0.6;

/// Weight of the lifetime accuracy in the mastery blend.
pub const OVERALL_WEIGHT: f64 = 0.4;

/// Mastery score assigned to a record that has never been scored.
pub const NEUTRAL_MASTERY: f64 = 0.5;

/// Scores below this are `easy`.
pub const MEDIUM_THRESHOLD: f64 = 0.5;

/// Scores at or above this are `hard`.
pub const HARD_THRESHOLD: f64 = 0.8;

pub const MAX_TOPIC_LENGTH: usize = 200;

/// Which record store backs the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Required when `storage` is `Postgres`.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub storage: StorageBackend,
    pub port: u16,
    pub rust_log: String,
    /// Catalog loaded into the memory backend at startup, from
    /// `MEMORY_SUBJECTS` (`id:code:title` entries separated by `;`).
    pub memory_subjects: Vec<Subject>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        let storage = match env::var("STORAGE").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("postgres") | Err(_) => StorageBackend::Postgres,
            Ok(other) => return Err(format!("Unknown STORAGE backend '{}'", other)),
        };

        let database_url = env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err("DATABASE_URL must be set".to_string());
        }

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let memory_subjects = match env::var("MEMORY_SUBJECTS") {
            Ok(raw) => parse_subjects(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            database_url,
            db_max_connections,
            storage,
            port,
            rust_log,
            memory_subjects,
        })
    }
}

fn parse_subjects(raw: &str) -> Result<Vec<Subject>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':').map(str::trim);
            let (Some(id), Some(code), Some(title)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(format!("MEMORY_SUBJECTS entry '{}' is not id:code:title", entry));
            };
            let id = id
                .parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| format!("MEMORY_SUBJECTS id '{}' is not a positive integer", id))?;
            if code.is_empty() {
                return Err(format!("MEMORY_SUBJECTS entry '{}' has an empty code", entry));
            }
            Ok(Subject {
                id,
                subject_code: code.to_string(),
                title: title.to_string(),
            })
        })
        .collect()
}
