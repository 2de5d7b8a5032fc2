//! Credential resolution for service passwords, keys and tokens.
//!
//! A credential field in a target section is either a literal secret or an
//! `@oracle:` directive deferring the lookup:
//!
//! ```text
//! password = "hunter2"                    literal
//! password = "@oracle:use_keyring"        SecretStore lookup by service URI + user
//! password = "@oracle:ask_password"       interactive prompt (general.interactive)
//! password = "@oracle:eval:pass show rm"  first line of the command's stdout
//! ```
//!
//! An empty or missing field behaves like `@oracle:use_keyring`. The secret
//! store itself is pluggable; [`EnvSecretStore`] is the default.
//!
//! # Usage
//!
//! ```no_run
//! use tasksync::credentials::{CredentialResolver, EnvSecretStore};
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let resolver = CredentialResolver::new(Arc::new(EnvSecretStore::new()), false);
//! let password = resolver
//!     .resolve("@oracle:eval:echo s3cret", "gerrit://https://review.example.com", "alice")
//!     .await?;
//! assert_eq!(password, "s3cret");
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

pub const ORACLE_PREFIX: &str = "@oracle:";

/// How a credential field should be resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Oracle {
    Literal(String),
    UseKeyring,
    AskPassword,
    Eval(String),
}

impl Oracle {
    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() {
            return Ok(Oracle::UseKeyring);
        }
        let Some(directive) = value.strip_prefix(ORACLE_PREFIX) else {
            return Ok(Oracle::Literal(value.to_string()));
        };
        match directive {
            "use_keyring" => Ok(Oracle::UseKeyring),
            "ask_password" => Ok(Oracle::AskPassword),
            other => match other.strip_prefix("eval:") {
                Some(cmd) if !cmd.trim().is_empty() => Ok(Oracle::Eval(cmd.to_string())),
                _ => bail!("Unknown credential oracle: {}", value),
            },
        }
    }
}

/// Backend holding secrets keyed by a service URI and a user name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the stored secret, or `None` if there is no entry.
    async fn get(&self, service: &str, username: &str) -> Result<Option<String>>;
}

/// Reads secrets from `TASKSYNC_SECRET_<SERVICE>_<USER>` environment variables.
///
/// The service URI and user are upper-cased and every character outside
/// `[A-Z0-9]` becomes `_`, so `gerrit://https://r.example.com` + `alice`
/// maps to `TASKSYNC_SECRET_GERRIT___HTTPS___R_EXAMPLE_COM_ALICE`.
#[derive(Clone, Debug, Default)]
pub struct EnvSecretStore;

impl EnvSecretStore {
    pub fn new() -> Self {
        Self
    }

    pub fn variable_name(service: &str, username: &str) -> String {
        let key: String = format!("{}_{}", service, username)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("TASKSYNC_SECRET_{}", key)
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, service: &str, username: &str) -> Result<Option<String>> {
        let name = Self::variable_name(service, username);
        debug!(variable = %name, "Looking up secret in environment");
        Ok(std::env::var(&name).ok().filter(|v| !v.is_empty()))
    }
}

/// In-memory store, handy for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore {
    entries: Arc<RwLock<HashMap<(String, String), String>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, service: &str, username: &str, secret: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (service.to_string(), username.to_string()),
                secret.to_string(),
            );
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, service: &str, username: &str) -> Result<Option<String>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&(service.to_string(), username.to_string()))
            .cloned())
    }
}

/// Resolves credential fields through the oracle rules and a [`SecretStore`].
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn SecretStore>,
    interactive: bool,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn SecretStore>, interactive: bool) -> Self {
        Self { store, interactive }
    }

    /// Resolves `value` for the secret-store entry `(service, username)`.
    pub async fn resolve(&self, value: &str, service: &str, username: &str) -> Result<String> {
        match Oracle::parse(value)? {
            Oracle::Literal(secret) => Ok(secret),
            Oracle::UseKeyring => self
                .store
                .get(service, username)
                .await?
                .ok_or_else(|| anyhow!("No secret stored for {} (user {})", service, username)),
            Oracle::AskPassword => self.ask_password(service, username).await,
            Oracle::Eval(cmd) => eval_command(&cmd).await,
        }
    }

    async fn ask_password(&self, service: &str, username: &str) -> Result<String> {
        if !self.interactive {
            bail!(
                "Password for {} (user {}) must be entered interactively, but general.interactive is off",
                service,
                username
            );
        }
        let prompt = format!("Password for {} at {}:", username, service);
        tokio::task::spawn_blocking(move || {
            inquire::Password::new(&prompt)
                .without_confirmation()
                .prompt()
                .context("Password prompt failed")
        })
        .await
        .context("Password prompt task panicked")?
    }
}

/// Runs `sh -c cmd` and returns the first line of stdout, trimmed.
async fn eval_command(cmd: &str) -> Result<String> {
    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .await
        .with_context(|| format!("Failed to run credential command: {}", cmd))?;
    if !output.status.success() {
        bail!(
            "Credential command exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let stdout = String::from_utf8(output.stdout).context("Credential command output is not UTF-8")?;
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(store: MemorySecretStore, interactive: bool) -> CredentialResolver {
        CredentialResolver::new(Arc::new(store), interactive)
    }

    #[test]
    fn test_oracle_parse() {
        assert_eq!(Oracle::parse("secret").unwrap(), Oracle::Literal("secret".into()));
        assert_eq!(Oracle::parse("").unwrap(), Oracle::UseKeyring);
        assert_eq!(Oracle::parse("@oracle:use_keyring").unwrap(), Oracle::UseKeyring);
        assert_eq!(Oracle::parse("@oracle:ask_password").unwrap(), Oracle::AskPassword);
        assert_eq!(
            Oracle::parse("@oracle:eval:pass show x").unwrap(),
            Oracle::Eval("pass show x".into())
        );
        assert!(Oracle::parse("@oracle:bogus").is_err());
        assert!(Oracle::parse("@oracle:eval:").is_err());
    }

    #[test]
    fn test_env_variable_name() {
        assert_eq!(
            EnvSecretStore::variable_name("redmine://bob@https://rm.example.com/", "bob"),
            "TASKSYNC_SECRET_REDMINE___BOB_HTTPS___RM_EXAMPLE_COM__BOB"
        );
    }

    #[tokio::test]
    async fn test_literal_passes_through() {
        let r = resolver(MemorySecretStore::new(), false);
        assert_eq!(r.resolve("hunter2", "gerrit://x", "alice").await.unwrap(), "hunter2");
    }

    #[tokio::test]
    async fn test_keyring_lookup_uses_service_and_user() {
        let store = MemorySecretStore::new();
        store.insert("gerrit://https://review.example.com", "alice", "from-store");
        let r = resolver(store, false);

        let secret = r
            .resolve("@oracle:use_keyring", "gerrit://https://review.example.com", "alice")
            .await
            .unwrap();
        assert_eq!(secret, "from-store");

        let empty = r
            .resolve("", "gerrit://https://review.example.com", "alice")
            .await
            .unwrap();
        assert_eq!(empty, "from-store");

        let err = r
            .resolve("", "gerrit://https://review.example.com", "bob")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No secret stored"));
    }

    #[tokio::test]
    async fn test_store_survives_poisoned_lock() {
        let store = MemorySecretStore::new();
        let entries = store.entries.clone();
        let poisoner = std::thread::spawn(move || {
            let _guard = entries.write().unwrap();
            panic!("writer died holding the lock");
        });
        assert!(poisoner.join().is_err());
        assert!(store.entries.is_poisoned());

        store.insert("svc", "alice", "s3cret");
        assert_eq!(store.get("svc", "alice").await.unwrap(), Some("s3cret".to_string()));
    }

    #[tokio::test]
    async fn test_eval_takes_first_line() {
        let r = resolver(MemorySecretStore::new(), false);
        let secret = r
            .resolve("@oracle:eval:printf '  tok3n \\nsecond'", "x", "y")
            .await
            .unwrap();
        assert_eq!(secret, "tok3n");
    }

    #[tokio::test]
    async fn test_eval_failure_is_an_error() {
        let r = resolver(MemorySecretStore::new(), false);
        assert!(r.resolve("@oracle:eval:exit 3", "x", "y").await.is_err());
    }

    #[tokio::test]
    async fn test_ask_password_requires_interactive() {
        let r = resolver(MemorySecretStore::new(), false);
        let err = r.resolve("@oracle:ask_password", "x", "y").await.unwrap_err();
        assert!(err.to_string().contains("interactively"));
    }
}
