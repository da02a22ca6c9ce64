use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fanfou_core::{CredentialField, CredentialSource, EnvSource, TokenPair};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Token pair persisted by `fanfou auth login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(flatten)]
    pub pair: TokenPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub saved_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn new(pair: TokenPair, username: Option<String>) -> Self {
        Self {
            pair,
            username,
            saved_at: Utc::now(),
        }
    }
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", to_pretty_json(&err));
    std::process::exit(1);
}

pub fn to_pretty_json(value: &Value) -> String {
    fanfou_mcp_runtime::to_pretty_json(value)
}

pub fn config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fanfou");
    config_dir.join("config.json")
}

pub fn load_token_from(path: &Path) -> Option<StoredToken> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

pub fn save_token_to(path: &Path, token: &StoredToken) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(token)?;

    // Write with restricted permissions (0o600)
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data.as_bytes())?;

    Ok(())
}

/// Returns whether a stored token existed.
pub fn remove_token_at(path: &Path) -> Result<bool, std::io::Error> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Environment first; the stored token pair fills in only when neither token
/// variable is set, so an explicit env pair is never mixed with a stored one.
pub struct CliSource {
    env: EnvSource,
    stored: Option<TokenPair>,
}

impl CliSource {
    pub fn load() -> Self {
        Self::with_stored(load_token_from(&config_path()).map(|token| token.pair))
    }

    pub fn with_stored(stored: Option<TokenPair>) -> Self {
        Self {
            env: EnvSource,
            stored,
        }
    }

    fn env_has_token(&self) -> bool {
        [CredentialField::OAuthToken, CredentialField::OAuthTokenSecret]
            .into_iter()
            .any(|field| self.env.lookup(field).is_some_and(|v| !v.trim().is_empty()))
    }
}

impl CredentialSource for CliSource {
    fn lookup(&self, field: CredentialField) -> Option<String> {
        let stored = self.stored.as_ref().filter(|_| !self.env_has_token());
        match (field, stored) {
            (CredentialField::OAuthToken, Some(pair)) => Some(pair.token.clone()),
            (CredentialField::OAuthTokenSecret, Some(pair)) => Some(pair.secret.clone()),
            _ => self.env.lookup(field),
        }
    }
}

// Unix-specific imports for file permissions
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

// No-op on non-unix (won't compile for Windows without this)
#[cfg(not(unix))]
trait OpenOptionsExt {
    fn mode(&mut self, _mode: u32) -> &mut Self;
}

#[cfg(not(unix))]
impl OpenOptionsExt for std::fs::OpenOptions {
    fn mode(&mut self, _mode: u32) -> &mut Self {
        self
    }
}
