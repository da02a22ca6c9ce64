use clap::Subcommand;
use fanfou_core::{CredentialField, CredentialSource, EnvSource, FieldNaming, StaticSource, resolve};
use fanfou_mcp_runtime::{Endpoints, client};
use serde_json::json;

use crate::util::{StoredToken, config_path, remove_token_at, save_token_to, to_pretty_json};

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Exchange username/password for an OAuth token pair (x_auth) and store it
    Login {
        /// FanFou login name (falls back to FANFOU_USERNAME)
        #[arg(long)]
        username: Option<String>,
        /// FanFou password (falls back to FANFOU_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },
    /// Delete the stored token pair
    Logout,
}

pub async fn run(endpoints: Endpoints, command: AuthCommands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        AuthCommands::Login { username, password } => login(endpoints, username, password).await,
        AuthCommands::Logout => logout(),
    }
}

async fn login(
    endpoints: Endpoints,
    username: Option<String>,
    password: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let source = login_source(&EnvSource, username, password);
    let credentials = resolve(&source)?;
    let login = credentials.login()?;

    let pair = client::login(&client::http_client(), &endpoints, credentials.consumer(), login).await?;
    let path = config_path();
    save_token_to(&path, &StoredToken::new(pair.clone(), Some(login.username.clone())))?;
    tracing::info!(event = "cli_login", username = %login.username);

    let output = json!({
        "status": "authenticated",
        "oauth_token": pair.token,
        "oauth_token_secret": pair.secret,
        "stored_at": path.display().to_string(),
        "hint": format!(
            "Later commands use the stored pair. To use it elsewhere, export {} and {}.",
            CredentialField::OAuthToken.env_var(),
            CredentialField::OAuthTokenSecret.env_var()
        ),
    });
    println!("{}", to_pretty_json(&output));
    Ok(())
}

fn logout() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path();
    let removed = remove_token_at(&path)?;
    let output = json!({
        "status": if removed { "logged_out" } else { "not_logged_in" },
        "path": path.display().to_string(),
    });
    println!("{}", to_pretty_json(&output));
    Ok(())
}

/// Consumer key from the environment, login pair from flags or environment.
/// Token variables are left out so login always performs the exchange.
fn login_source(
    env: &dyn CredentialSource,
    username: Option<String>,
    password: Option<String>,
) -> StaticSource {
    let mut source = StaticSource::new(FieldNaming::Env);
    for field in [CredentialField::ApiKey, CredentialField::ApiSecret] {
        if let Some(value) = env.lookup(field) {
            source = source.with(field, value);
        }
    }
    for (field, flag) in [
        (CredentialField::Username, username),
        (CredentialField::Password, password),
    ] {
        if let Some(value) = flag.or_else(|| env.lookup(field)) {
            source = source.with(field, value);
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanfou_core::{FanfouError, Grant};

    fn env() -> StaticSource {
        StaticSource::new(FieldNaming::Env)
            .with(CredentialField::ApiKey, "ck")
            .with(CredentialField::ApiSecret, "cs")
            .with(CredentialField::OAuthToken, "old")
            .with(CredentialField::OAuthTokenSecret, "old-secret")
            .with(CredentialField::Username, "env-user")
            .with(CredentialField::Password, "env-pw")
    }

    #[test]
    fn flags_override_environment_and_tokens_are_ignored() {
        let source = login_source(&env(), Some("alice".into()), None);
        let credentials = resolve(&source).unwrap();
        assert!(matches!(credentials.grant(), Grant::Password(_)));
        let login = credentials.login().unwrap();
        assert_eq!(login.username, "alice");
        assert_eq!(login.password, "env-pw");
    }

    #[test]
    fn missing_password_is_reported_by_env_name() {
        let bare = StaticSource::new(FieldNaming::Env)
            .with(CredentialField::ApiKey, "ck")
            .with(CredentialField::ApiSecret, "cs");
        let err = resolve(&login_source(&bare, Some("alice".into()), None)).unwrap_err();
        match err {
            FanfouError::MissingCredentials { missing, .. } => {
                assert!(missing.iter().any(|m| m.contains("FANFOU_")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
