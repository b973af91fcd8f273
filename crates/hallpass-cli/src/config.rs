//! Configuration file management for hallpass.
//!
//! Provides a TOML-based config file at `~/.config/hallpass/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use hallpass_core::proposer::DEFAULT_PROPOSAL_TIMEOUT;
use hallpass_db::config::DbConfig;

pub const PROPOSER_COMMAND_ENV: &str = "HALLPASS_PROPOSER_COMMAND";
pub const PROPOSER_TIMEOUT_ENV: &str = "HALLPASS_PROPOSER_TIMEOUT_SECS";

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default, skip_serializing_if = "ProposerSection::is_empty")]
    pub proposer: ProposerSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
    /// Pool size; the pool default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposerSection {
    /// Program that reads a prompt on stdin and answers on stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProposerSection {
    fn is_empty(&self) -> bool {
        self.command.is_none() && self.args.is_empty() && self.timeout_secs.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the hallpass config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/hallpass` or `~/.config/hallpass`,
/// also on macOS where `dirs::config_dir()` points elsewhere.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("hallpass");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("hallpass")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file if there is one.
///
/// A missing file is `Ok(None)`; a file that exists but does not parse is
/// an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(&path).map(Some)
}

/// Serialize and write `config` to `path`, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix since the URL may hold a password.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(&config_path(), config)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Environment values that take part in resolution.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    pub database_url: Option<String>,
    pub proposer_command: Option<String>,
    pub proposer_timeout_secs: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            database_url: var(DbConfig::URL_ENV),
            proposer_command: var(PROPOSER_COMMAND_ENV),
            proposer_timeout_secs: var(PROPOSER_TIMEOUT_ENV),
        }
    }
}

/// External command used to generate seating proposals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposerCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct HallpassConfig {
    pub db_config: DbConfig,
    pub proposer: Option<ProposerCommand>,
    pub proposal_timeout: Duration,
    pub bind: String,
    pub port: u16,
}

impl HallpassConfig {
    /// Resolve from the real environment and config file.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = load_config()?;
        Self::resolve_from(cli_db_url, &EnvOverrides::from_env(), file.as_ref())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `HALLPASS_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Proposer: `HALLPASS_PROPOSER_COMMAND` (split on whitespace) > `proposer.command` + `proposer.args` > none
    /// - Timeout: `HALLPASS_PROPOSER_TIMEOUT_SECS` > `proposer.timeout_secs` > 120s
    pub fn resolve_from(
        cli_db_url: Option<&str>,
        env: &EnvOverrides,
        file: Option<&ConfigFile>,
    ) -> Result<Self> {
        let db_url = match (cli_db_url, &env.database_url, file) {
            (Some(url), _, _) => url.to_owned(),
            (None, Some(url), _) => url.clone(),
            (None, None, Some(cfg)) => cfg.database.url.clone(),
            (None, None, None) => DbConfig::DEFAULT_URL.to_owned(),
        };

        let proposer = match (&env.proposer_command, file.and_then(|f| f.proposer.command.as_ref())) {
            (Some(line), _) => parse_command_line(line),
            (None, Some(program)) if !program.trim().is_empty() => Some(ProposerCommand {
                program: program.trim().to_owned(),
                args: file.map(|f| f.proposer.args.clone()).unwrap_or_default(),
            }),
            _ => None,
        };

        let timeout_secs = match (&env.proposer_timeout_secs, file.and_then(|f| f.proposer.timeout_secs)) {
            (Some(raw), _) => raw.trim().parse::<u64>().with_context(|| {
                format!("{PROPOSER_TIMEOUT_ENV} must be a whole number of seconds, got {raw:?}")
            })?,
            (None, Some(secs)) => secs,
            (None, None) => DEFAULT_PROPOSAL_TIMEOUT.as_secs(),
        };
        if timeout_secs == 0 {
            bail!("proposer timeout must be at least one second");
        }

        let server = file.map(|f| f.server.clone()).unwrap_or_default();

        let mut db_config = DbConfig::new(db_url);
        if let Some(max) = file.and_then(|f| f.database.max_connections) {
            db_config = db_config.with_max_connections(max);
        }

        Ok(Self {
            db_config,
            proposer,
            proposal_timeout: Duration::from_secs(timeout_secs),
            bind: server.bind,
            port: server.port,
        })
    }
}

fn parse_command_line(line: &str) -> Option<ProposerCommand> {
    let mut words = line.split_whitespace().map(str::to_owned);
    let program = words.next()?;
    Some(ProposerCommand {
        program,
        args: words.collect(),
    })
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
