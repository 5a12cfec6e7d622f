use crate::application_impl::RotationMode;
use anyhow::{Result, anyhow};
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub jwt: Jwt,
    #[serde(default)]
    pub auth: Auth,
    pub user: User,
    pub revocation: Revocation,
    #[serde(default)]
    pub hashing: Hashing,
    /// Google sign-in; disabled when absent.
    #[serde(default)]
    pub google: Option<Google>,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Deserialize)]
pub struct Jwt {
    pub secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    /// Seconds.
    pub access_token_ttl: u64,
    /// Seconds.
    pub refresh_token_ttl: u64,
}

impl fmt::Debug for Jwt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jwt")
            .field("secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Auth {
    pub rotation: RotationMode,
    pub invalidate_on_reuse: bool,
    pub allow_self_assigned_roles: bool,
    pub min_password_len: usize,
}

impl Default for Auth {
    fn default() -> Self {
        Auth {
            rotation: RotationMode::Sequential,
            invalidate_on_reuse: false,
            allow_self_assigned_roles: false,
            min_password_len: 8,
        }
    }
}

#[derive(Deserialize)]
pub struct User {
    pub backend: String, // "memory" or "mysql"
    pub dsn: Option<String>,
}

#[derive(Deserialize)]
pub struct Revocation {
    pub backend: String, // "memory" or "redis"
    pub dsn: Option<String>,
    /// Optional key namespace; empty stores bare `user-{id}` keys.
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct Google {
    pub client_id: String,
    /// JSON Web Key Set used to check ID token signatures.
    pub jwks_path: String,
}

// DSNs carry credentials.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("backend", &self.backend)
            .field("dsn", &self.dsn.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl fmt::Debug for Revocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revocation")
            .field("backend", &self.backend)
            .field("dsn", &self.dsn.as_ref().map(|_| "<redacted>"))
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hashing {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for Hashing {
    fn default() -> Self {
        Hashing {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "GATEKEEPER";

/// Reads the settings file, then applies `GATEKEEPER__SECTION__KEY`
/// environment overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);
    build(Config::builder().add_source(File::with_name(path)))
}

fn build(builder: ConfigBuilder<DefaultState>) -> Result<Settings> {
    let settings: Settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
