//! Session configuration management
//!
//! This crate handles the configuration model for debug harness sessions,
//! and parsing of VS Code-style `launch.json` files (comments allowed).

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use eyre::Context;
use serde::Deserialize;

/// The default port the harness DAP server listens on
pub const DEFAULT_DAP_PORT: u16 = 4711;

/// The default host the harness DAP server binds to
pub const DEFAULT_DAP_HOST: &str = "127.0.0.1";

/// Whether a session launches the harness process itself, or attaches to one
/// started elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Launch,
    Attach,
}

impl FromStr for RequestKind {
    type Err = eyre::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "launch" => Ok(Self::Launch),
            "attach" => Ok(Self::Attach),
            other => Err(eyre::eyre!("invalid request kind {other}")),
        }
    }
}

/// A single debug session configuration.
///
/// For launch requests `program` points at the Go package directory of the
/// debug harness; the session runs it from `cwd` (defaulting to the program
/// directory) with `env` overlaid on the inherited environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub name: String,
    pub request: RequestKind,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub program: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub build_args: Vec<String>,
}

fn default_host() -> String {
    DEFAULT_DAP_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_DAP_PORT
}

impl SessionConfig {
    /// Configuration for launching the harness found at `program`.
    pub fn launch(program: impl Into<PathBuf>) -> Self {
        Self {
            name: String::new(),
            request: RequestKind::Launch,
            host: default_host(),
            port: default_port(),
            program: Some(program.into()),
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            build_args: Vec::new(),
        }
    }

    /// Configuration for attaching to a harness already serving on
    /// `host:port`.
    pub fn attach(host: impl Into<String>, port: u16) -> Self {
        Self {
            name: String::new(),
            request: RequestKind::Attach,
            host: host.into(),
            port,
            program: None,
            args: Vec::new(),
            cwd: None,
            env: HashMap::new(),
            build_args: Vec::new(),
        }
    }

    /// The directory the harness process runs from: `cwd` if given,
    /// otherwise the program directory.
    pub fn working_directory(&self) -> Option<&Path> {
        self.cwd.as_deref().or(self.program.as_deref())
    }
}

/// Deserializable model for a VS Code launch configuration file
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFormat {
    VsCode {
        #[serde(rename = "version")]
        _version: String,
        configurations: Vec<SessionConfig>,
    },
}

/// Load the configuration named `name` from a launch configuration file.
pub fn load(
    name: impl AsRef<str>,
    mut r: impl std::io::Read,
) -> eyre::Result<Option<SessionConfig>> {
    let mut contents = String::new();
    r.read_to_string(&mut contents)
        .wrap_err("reading configuration contents")?;
    let configuration = from_str(name, &contents).wrap_err("parsing launch configuration")?;
    Ok(configuration)
}

fn from_str(name: impl AsRef<str>, contents: &str) -> eyre::Result<Option<SessionConfig>> {
    let config = jsonc_to_serde(contents).wrap_err("parsing jsonc configuration")?;
    let name = name.as_ref();
    match config {
        ConfigFormat::VsCode { configurations, .. } => {
            for configuration in configurations {
                if configuration.name == name {
                    return Ok(Some(configuration));
                }
            }
        }
    }
    Ok(None)
}

fn jsonc_to_serde(input: &str) -> eyre::Result<ConfigFormat> {
    let value = jsonc_parser::parse_to_serde_value(input, &Default::default())
        .wrap_err("parsing jsonc configuration")?;
    let Some(config_format_value) = value else {
        eyre::bail!("no configuration found");
    };
    let config_format = serde_json::from_value(config_format_value)
        .wrap_err("deserializing serde_json::Value value")?;
    Ok(config_format)
}

/// Load the configuration named `name` from the file at `path`.
pub fn load_from_path(
    name: impl AsRef<str>,
    path: impl AsRef<Path>,
) -> eyre::Result<Option<SessionConfig>> {
    let f = std::fs::File::open(path).wrap_err("opening input path")?;
    let config = crate::load(name, f).context("loading file from given path")?;
    Ok(config)
}
