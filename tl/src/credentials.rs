//! API key storage
//!
//! The key is looked up in an environment variable first and then in a
//! credentials file. Not having a key is a normal state.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

/// Errors reading or writing the credentials file
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential file I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key must not be empty")]
    Empty,
}

/// An API key; `Debug` never prints the secret
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting blank input
    pub fn new(key: impl Into<String>) -> Result<Self, CredentialError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self(key))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(****)")
    }
}

/// Where a resolved key came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Env(String),
    File(PathBuf),
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Env(var) => write!(f, "environment variable {}", var),
            KeySource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Secret storage for the text-generation API key
#[derive(Debug, Clone)]
pub struct CredentialStore {
    env_var: Option<String>,
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(env_var: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            env_var: Some(env_var.into()),
            path: path.into(),
        }
    }

    /// A store that only consults the credentials file
    pub fn file_only(path: impl Into<PathBuf>) -> Self {
        Self {
            env_var: None,
            path: path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.llm.api_key_env.clone(), config.storage.credentials_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve the key, if one is configured
    pub fn get(&self) -> Result<Option<ApiKey>, CredentialError> {
        Ok(self.resolve()?.map(|(key, _)| key))
    }

    /// Resolve the key along with where it came from
    pub fn resolve(&self) -> Result<Option<(ApiKey, KeySource)>, CredentialError> {
        if let Some(var) = &self.env_var
            && let Ok(value) = std::env::var(var)
            && let Ok(key) = ApiKey::new(value)
        {
            debug!(%var, "resolve: key found in environment");
            return Ok(Some((key, KeySource::Env(var.clone()))));
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "resolve: no credentials file");
                return Ok(None);
            }
            Err(source) => {
                return Err(CredentialError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        match ApiKey::new(content) {
            Ok(key) => Ok(Some((key, KeySource::File(self.path.clone())))),
            Err(_) => {
                debug!("resolve: credentials file is empty");
                Ok(None)
            }
        }
    }

    /// Persist a key to the credentials file (owner read/write only)
    pub fn set(&self, key: &ApiKey) -> Result<(), CredentialError> {
        let io_err = |source| CredentialError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path).map_err(io_err)?;
        writeln!(file, "{}", key.expose()).map_err(io_err)?;
        info!(path = %self.path.display(), "Stored API key");
        Ok(())
    }

    /// Remove the credentials file; returns whether one existed
    pub fn clear(&self) -> Result<bool, CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Removed API key");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CredentialError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
