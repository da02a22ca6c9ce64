use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FanfouError;

/// One of the six values a caller can supply to authenticate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    ApiKey,
    ApiSecret,
    OAuthToken,
    OAuthTokenSecret,
    Username,
    Password,
}

impl CredentialField {
    pub const ALL: [CredentialField; 6] = [
        CredentialField::ApiKey,
        CredentialField::ApiSecret,
        CredentialField::OAuthToken,
        CredentialField::OAuthTokenSecret,
        CredentialField::Username,
        CredentialField::Password,
    ];

    pub fn env_var(self) -> &'static str {
        match self {
            CredentialField::ApiKey => "FANFOU_API_KEY",
            CredentialField::ApiSecret => "FANFOU_API_SECRET",
            CredentialField::OAuthToken => "FANFOU_OAUTH_TOKEN",
            CredentialField::OAuthTokenSecret => "FANFOU_OAUTH_TOKEN_SECRET",
            CredentialField::Username => "FANFOU_USERNAME",
            CredentialField::Password => "FANFOU_PASSWORD",
        }
    }

    pub fn header_name(self) -> &'static str {
        match self {
            CredentialField::ApiKey => "X-Fanfou-Api-Key",
            CredentialField::ApiSecret => "X-Fanfou-Api-Secret",
            CredentialField::OAuthToken => "X-Fanfou-OAuth-Token",
            CredentialField::OAuthTokenSecret => "X-Fanfou-OAuth-Token-Secret",
            CredentialField::Username => "X-Fanfou-Username",
            CredentialField::Password => "X-Fanfou-Password",
        }
    }
}

/// How a source names its fields in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldNaming {
    Env,
    Header,
}

impl FieldNaming {
    pub fn label(self, field: CredentialField) -> &'static str {
        match self {
            FieldNaming::Env => field.env_var(),
            FieldNaming::Header => field.header_name(),
        }
    }

    fn consumer_hint(self) -> String {
        format!(
            "Provide the FanFou application key pair via {} and {}.",
            self.label(CredentialField::ApiKey),
            self.label(CredentialField::ApiSecret)
        )
    }

    fn grant_hint(self) -> String {
        format!(
            "Provide either {} and {}, or {} and {} (then call generate_oauth_token once and keep the minted token pair).",
            self.label(CredentialField::OAuthToken),
            self.label(CredentialField::OAuthTokenSecret),
            self.label(CredentialField::Username),
            self.label(CredentialField::Password)
        )
    }

    fn login_hint(self) -> String {
        format!(
            "Minting an OAuth token requires {} and {}.",
            self.label(CredentialField::Username),
            self.label(CredentialField::Password)
        )
    }
}

/// Where credential values come from: process environment, inbound headers,
/// or anything else that can answer per-field lookups.
pub trait CredentialSource {
    fn lookup(&self, field: CredentialField) -> Option<String>;

    fn naming(&self) -> FieldNaming {
        FieldNaming::Env
    }
}

/// Reads `FANFOU_*` variables from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl CredentialSource for EnvSource {
    fn lookup(&self, field: CredentialField) -> Option<String> {
        std::env::var(field.env_var()).ok()
    }
}

/// Fixed set of values, used by tests and by callers that pre-collect input.
#[derive(Debug, Clone)]
pub struct StaticSource {
    values: HashMap<CredentialField, String>,
    naming: FieldNaming,
}

impl StaticSource {
    pub fn new(naming: FieldNaming) -> Self {
        Self {
            values: HashMap::new(),
            naming,
        }
    }

    pub fn with(mut self, field: CredentialField, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }
}

impl CredentialSource for StaticSource {
    fn lookup(&self, field: CredentialField) -> Option<String> {
        self.values.get(&field).cloned()
    }

    fn naming(&self) -> FieldNaming {
        self.naming
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConsumerKey {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for ConsumerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerKey")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// OAuth access token pair, either supplied or minted by x_auth login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    #[serde(rename = "oauth_token")]
    pub token: String,
    #[serde(rename = "oauth_token_secret")]
    pub secret: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct LoginPair {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for LoginPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPair")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// How a session obtains its access token.
#[derive(Debug, Clone, Copy)]
pub enum Grant<'a> {
    Token(&'a TokenPair),
    Password(&'a LoginPair),
}

#[derive(Debug, Clone)]
enum Pairs {
    Token(TokenPair),
    Login(LoginPair),
    Both(TokenPair, LoginPair),
}

/// A complete, validated credential set: the consumer key pair plus at least
/// one of the token pair and the login pair.
#[derive(Debug, Clone)]
pub struct Credentials {
    consumer: ConsumerKey,
    pairs: Pairs,
    naming: FieldNaming,
}

impl Credentials {
    pub fn with_token(consumer: ConsumerKey, token: TokenPair) -> Self {
        Self {
            consumer,
            pairs: Pairs::Token(token),
            naming: FieldNaming::Env,
        }
    }

    pub fn consumer(&self) -> &ConsumerKey {
        &self.consumer
    }

    /// The token pair wins whenever both pairs are complete.
    pub fn grant(&self) -> Grant<'_> {
        match &self.pairs {
            Pairs::Token(token) | Pairs::Both(token, _) => Grant::Token(token),
            Pairs::Login(login) => Grant::Password(login),
        }
    }

    /// The login pair, required by the token-minting tool regardless of
    /// whether a token pair is also present.
    pub fn login(&self) -> Result<&LoginPair, FanfouError> {
        match &self.pairs {
            Pairs::Login(login) | Pairs::Both(_, login) => Ok(login),
            Pairs::Token(_) => Err(FanfouError::MissingCredentials {
                missing: [CredentialField::Username, CredentialField::Password]
                    .into_iter()
                    .map(|field| self.naming.label(field).to_string())
                    .collect(),
                hint: self.naming.login_hint(),
            }),
        }
    }
}

fn present(source: &dyn CredentialSource, field: CredentialField) -> Option<String> {
    source
        .lookup(field)
        .filter(|value| !value.trim().is_empty())
}

/// Decide which credential set a call uses.
///
/// Performs no network I/O: the login exchange for a password grant happens
/// later, when a session is opened.
pub fn resolve(source: &dyn CredentialSource) -> Result<Credentials, FanfouError> {
    let naming = source.naming();

    let key = present(source, CredentialField::ApiKey);
    let secret = present(source, CredentialField::ApiSecret);
    let (key, secret) = match (key, secret) {
        (Some(key), Some(secret)) => (key, secret),
        (key, secret) => {
            let mut missing = Vec::new();
            if key.is_none() {
                missing.push(naming.label(CredentialField::ApiKey).to_string());
            }
            if secret.is_none() {
                missing.push(naming.label(CredentialField::ApiSecret).to_string());
            }
            return Err(FanfouError::MissingCredentials {
                missing,
                hint: naming.consumer_hint(),
            });
        }
    };

    let token = match (
        present(source, CredentialField::OAuthToken),
        present(source, CredentialField::OAuthTokenSecret),
    ) {
        (Some(token), Some(secret)) => Some(TokenPair { token, secret }),
        _ => None,
    };
    let login = match (
        present(source, CredentialField::Username),
        present(source, CredentialField::Password),
    ) {
        (Some(username), Some(password)) => Some(LoginPair { username, password }),
        _ => None,
    };

    let pairs = match (token, login) {
        (Some(token), Some(login)) => Pairs::Both(token, login),
        (Some(token), None) => Pairs::Token(token),
        (None, Some(login)) => Pairs::Login(login),
        (None, None) => {
            let missing = [
                CredentialField::OAuthToken,
                CredentialField::OAuthTokenSecret,
                CredentialField::Username,
                CredentialField::Password,
            ]
            .into_iter()
            .filter(|field| present(source, *field).is_none())
            .map(|field| naming.label(field).to_string())
            .collect();
            return Err(FanfouError::MissingCredentials {
                missing,
                hint: naming.grant_hint(),
            });
        }
    };

    Ok(Credentials {
        consumer: ConsumerKey { key, secret },
        pairs,
        naming,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consumer_only(naming: FieldNaming) -> StaticSource {
        StaticSource::new(naming)
            .with(CredentialField::ApiKey, "ck")
            .with(CredentialField::ApiSecret, "cs")
    }

    fn missing_of(err: FanfouError) -> Vec<String> {
        match err {
            FanfouError::MissingCredentials { missing, .. } => missing,
            other => panic!("expected MissingCredentials, got {other:?}"),
        }
    }

    #[test]
    fn no_grant_pair_names_all_four_env_fields() {
        let err = resolve(&consumer_only(FieldNaming::Env)).unwrap_err();
        assert_eq!(
            missing_of(err),
            vec![
                "FANFOU_OAUTH_TOKEN",
                "FANFOU_OAUTH_TOKEN_SECRET",
                "FANFOU_USERNAME",
                "FANFOU_PASSWORD"
            ]
        );
    }

    #[test]
    fn half_pairs_report_only_the_absent_halves() {
        let source = consumer_only(FieldNaming::Header)
            .with(CredentialField::OAuthToken, "t")
            .with(CredentialField::Password, "pw");
        let err = resolve(&source).unwrap_err();
        assert_eq!(
            missing_of(err),
            vec!["X-Fanfou-OAuth-Token-Secret", "X-Fanfou-Username"]
        );
    }

    #[test]
    fn blank_values_count_as_missing() {
        let source = consumer_only(FieldNaming::Env)
            .with(CredentialField::OAuthToken, "  ")
            .with(CredentialField::OAuthTokenSecret, "s");
        let err = resolve(&source).unwrap_err();
        assert!(missing_of(err).contains(&"FANFOU_OAUTH_TOKEN".to_string()));
    }

    #[test]
    fn missing_consumer_key_is_reported_first() {
        let source = StaticSource::new(FieldNaming::Env)
            .with(CredentialField::ApiSecret, "cs")
            .with(CredentialField::OAuthToken, "t")
            .with(CredentialField::OAuthTokenSecret, "s");
        let err = resolve(&source).unwrap_err();
        assert_eq!(missing_of(err), vec!["FANFOU_API_KEY"]);
    }

    #[test]
    fn token_pair_wins_over_login_pair() {
        let source = consumer_only(FieldNaming::Env)
            .with(CredentialField::OAuthToken, "t")
            .with(CredentialField::OAuthTokenSecret, "s")
            .with(CredentialField::Username, "u")
            .with(CredentialField::Password, "p");
        let creds = resolve(&source).unwrap();
        match creds.grant() {
            Grant::Token(pair) => assert_eq!(pair.token, "t"),
            Grant::Password(_) => panic!("token pair must take precedence"),
        }
        assert_eq!(creds.login().unwrap().username, "u");
    }

    #[test]
    fn login_pair_alone_yields_password_grant() {
        let source = consumer_only(FieldNaming::Env)
            .with(CredentialField::Username, "u")
            .with(CredentialField::Password, "p");
        let creds = resolve(&source).unwrap();
        assert!(matches!(creds.grant(), Grant::Password(login) if login.password == "p"));
    }

    #[test]
    fn login_accessor_names_missing_fields_by_source() {
        let source = consumer_only(FieldNaming::Header)
            .with(CredentialField::OAuthToken, "t")
            .with(CredentialField::OAuthTokenSecret, "s");
        let creds = resolve(&source).unwrap();
        let err = creds.login().unwrap_err();
        assert_eq!(
            missing_of(err),
            vec!["X-Fanfou-Username", "X-Fanfou-Password"]
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let pair = TokenPair {
            token: "t".into(),
            secret: "very-secret".into(),
        };
        assert!(!format!("{pair:?}").contains("very-secret"));
    }
}
