use std::env;
use std::fmt;

use crate::core::config::Config;

/// Environment variables checked for the API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Where a new key can be obtained.
pub const API_KEY_CONSOLE_URL: &str = "https://aistudio.google.com/app/apikey";

const QUICK_FIXES: &[&str] = &[
    "export GEMINI_API_KEY=\"your-actual-api-key\"",
    "or add api_key = \"...\" to the config file",
];

#[derive(Debug)]
pub struct CredentialError {
    message: String,
    quick_fixes: &'static [&'static str],
}

impl CredentialError {
    pub fn missing_api_key() -> Self {
        Self {
            message: format!(
                "No API key found: none of {} is set and the config file has no api_key entry.\nGet an API key from: {API_KEY_CONSOLE_URL}",
                API_KEY_ENV_VARS.join(", ")
            ),
            quick_fixes: QUICK_FIXES,
        }
    }

    pub fn quick_fixes(&self) -> &'static [&'static str] {
        self.quick_fixes
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CredentialError {}

/// Discover the API key: environment variables first, then the config file.
///
/// A missing key is not fatal to startup; callers run the session with the
/// completion client unavailable and report the error instead.
pub fn resolve_api_key(config: &Config) -> Result<String, CredentialError> {
    for var in API_KEY_ENV_VARS {
        if let Ok(value) = env::var(var) {
            if !value.trim().is_empty() {
                return Ok(value);
            }
        }
    }

    if let Some(key) = &config.api_key {
        if !key.trim().is_empty() {
            return Ok(key.clone());
        }
    }

    Err(CredentialError::missing_api_key())
}
