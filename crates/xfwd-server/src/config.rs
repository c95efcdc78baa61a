//! Server configuration: TOML file + CLI overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use xfwd_core::{XfwdError, XfwdResult};

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub x11: X11Section,
    #[serde(default)]
    pub forward: ForwardSection,
}

/// `[x11]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct X11Section {
    #[serde(default = "default_display_host")]
    pub display_host: String,
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    #[serde(default = "default_display_offset")]
    pub display_offset: u16,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u16,
    /// Directory for authority files; the system temp dir when unset.
    #[serde(default)]
    pub authority_dir: Option<String>,
}

impl Default for X11Section {
    fn default() -> Self {
        Self {
            display_host: default_display_host(),
            base_port: default_base_port(),
            display_offset: default_display_offset(),
            max_attempts: default_max_attempts(),
            authority_dir: None,
        }
    }
}

/// `[forward]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwardSection {
    /// Display the direct session dials for every forwarded connection.
    #[serde(default = "default_target")]
    pub target: String,
}

impl Default for ForwardSection {
    fn default() -> Self {
        Self {
            target: default_target(),
        }
    }
}

fn default_display_host() -> String {
    "localhost".to_string()
}
fn default_base_port() -> u16 {
    6000
}
fn default_display_offset() -> u16 {
    10
}
fn default_max_attempts() -> u16 {
    50
}
fn default_target() -> String {
    "127.0.0.1:6000".to_string()
}

/// Display allocation settings.
///
/// Candidate ports are `base_port + display_offset + n` for
/// `n in 0..max_attempts`; the display number is `display_offset + n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Config {
    pub display_host: String,
    pub base_port: u16,
    pub display_offset: u16,
    pub max_attempts: u16,
    pub authority_dir: Option<PathBuf>,
}

impl Default for X11Config {
    fn default() -> Self {
        X11Section::default().into()
    }
}

impl From<X11Section> for X11Config {
    fn from(section: X11Section) -> Self {
        Self {
            display_host: section.display_host,
            base_port: section.base_port,
            display_offset: section.display_offset,
            max_attempts: section.max_attempts,
            authority_dir: section.authority_dir.as_deref().map(expand_tilde_str),
        }
    }
}

/// Resolved server configuration (paths expanded, CLI overrides applied).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub x11: X11Config,
    pub target: String,
}

impl ServerConfig {
    /// Load config from TOML file, then apply CLI overrides.
    pub fn load(
        config_path: Option<&Path>,
        cli_target: Option<&str>,
        cli_display_offset: Option<u16>,
    ) -> XfwdResult<Self> {
        let file_config = match config_path {
            Some(path) => {
                let expanded = expand_tilde(path);
                if expanded.exists() {
                    info!(path = %expanded.display(), "loading config file");
                    let content = std::fs::read_to_string(&expanded)?;
                    parse_config(&content)?
                } else {
                    info!(path = %expanded.display(), "config file not found, using defaults");
                    ConfigFile::default()
                }
            }
            None => ConfigFile::default(),
        };

        let mut x11 = X11Config::from(file_config.x11);
        if let Some(offset) = cli_display_offset {
            x11.display_offset = offset;
        }
        let target = cli_target
            .map(|s| s.to_string())
            .unwrap_or(file_config.forward.target);

        Ok(Self { x11, target })
    }
}

fn parse_config(content: &str) -> XfwdResult<ConfigFile> {
    toml::from_str::<ConfigFile>(content)
        .map_err(|e| XfwdError::Config(format!("config parse error: {e}")))
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    expand_tilde_str(&s)
}

fn expand_tilde_str(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}
