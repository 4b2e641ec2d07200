// src/utils/config.rs
use std::time::Duration;

use crate::utils::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TARGET_LANGUAGE: &str = "ENGLISH";

const API_KEY_VAR: &str = "OPENAI_API_KEY";
const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
const MODEL_VAR: &str = "KID_MODEL";
const LANGUAGE_VAR: &str = "KID_TARGET_LANGUAGE";

/// Process configuration, resolved once in `main` and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub target_language: String,
    /// No timeout unless one is asked for.
    pub timeout: Option<Duration>,
}

impl Settings {
    /// Reads settings from the process environment, after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, AppError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => tracing::debug!("No .env file found"),
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty(API_KEY_VAR).ok_or_else(|| {
            AppError::Config(format!("{} is not set (environment or .env file)", API_KEY_VAR))
        })?;

        Ok(Self {
            api_key,
            base_url: non_empty(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: non_empty(MODEL_VAR).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            target_language: non_empty(LANGUAGE_VAR)
                .unwrap_or_else(|| DEFAULT_TARGET_LANGUAGE.to_string()),
            timeout: None,
        })
    }

    /// Applies command-line overrides on top of the environment.
    pub fn with_overrides(
        mut self,
        model: Option<String>,
        language: Option<String>,
        base_url: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(language) = language {
            self.target_language = language;
        }
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        if let Some(secs) = timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        self
    }
}
