use std::{collections::HashMap, path::PathBuf};

use anyhow::{anyhow, bail, Context};

pub const DEFAULT_PORT: u16 = 8050;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMode {
    None,
    /// Username to password.
    Basic(HashMap<String, String>),
}

/// Settings read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub auth: AuthMode,
    pub port: u16,
    pub debug: bool,
    pub study_name: Option<String>,
    pub config_path: Option<String>,
    pub database_path: Option<PathBuf>,
    pub tls: Option<(PathBuf, PathBuf)>,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let auth = match var("AUTH_TYPE").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("none") => AuthMode::None,
            Some("basic") => {
                let users = var("BASIC_AUTH_USERS").context("AUTH_TYPE=basic requires BASIC_AUTH_USERS")?;
                AuthMode::Basic(parse_basic_users(&users)?)
            }
            Some(other) => bail!("Unsupported AUTH_TYPE '{other}'"),
        };

        let port = match var("SERVER_PORT") {
            Some(port) => port.parse().with_context(|| format!("Invalid SERVER_PORT '{port}'"))?,
            None => DEFAULT_PORT,
        };

        let debug = match var("DEBUG_MODE") {
            Some(debug) => matches!(debug.to_lowercase().as_str(), "true" | "1" | "yes"),
            None => true,
        };

        let tls = match (var("TLS_CERT"), var("TLS_KEY")) {
            (Some(cert), Some(key)) => Some((PathBuf::from(cert), PathBuf::from(key))),
            (None, None) => None,
            _ => bail!("TLS_CERT and TLS_KEY must be set together"),
        };

        Ok(ServerConfig {
            auth,
            port,
            debug,
            study_name: var("STUDY_NAME"),
            config_path: var("CONFIG_PATH"),
            database_path: var("DB_PATH").map(PathBuf::from),
            tls,
        })
    }

    /// Study config location, when both parts are known.
    pub fn study_source(&self) -> Option<(&str, &str)> {
        Some((self.config_path.as_deref()?, self.study_name.as_deref()?))
    }
}

fn parse_basic_users(users: &str) -> anyhow::Result<HashMap<String, String>> {
    users.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((user, password)) if !user.is_empty() => Ok((user.to_string(), password.to_string())),
            _ => Err(anyhow!("Malformed BASIC_AUTH_USERS entry '{entry}'")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.auth, AuthMode::None);
        assert_eq!(config.port, 8050);
        assert!(config.debug);
        assert!(config.tls.is_none());
        assert!(config.study_source().is_none());
    }

    #[test]
    fn basic_auth_users() {
        let config = config(&[("AUTH_TYPE", "basic"), ("BASIC_AUTH_USERS", "admin:secret, viewer:pw")]).unwrap();
        let AuthMode::Basic(users) = config.auth else { panic!("expected basic auth") };
        assert_eq!(users.get("admin").map(String::as_str), Some("secret"));
        assert_eq!(users.get("viewer").map(String::as_str), Some("pw"));
    }

    #[test]
    fn rejected_settings() {
        assert!(config(&[("AUTH_TYPE", "cognito")]).is_err());
        assert!(config(&[("AUTH_TYPE", "basic")]).is_err());
        assert!(config(&[("AUTH_TYPE", "basic"), ("BASIC_AUTH_USERS", "nopassword")]).is_err());
        assert!(config(&[("SERVER_PORT", "http")]).is_err());
        assert!(config(&[("TLS_CERT", "cert.pem")]).is_err());
    }

    #[test]
    fn study_source_and_debug() {
        let config = config(&[
            ("STUDY_NAME", "stage"),
            ("CONFIG_PATH", "https://example.com/configs/"),
            ("DEBUG_MODE", "false"),
        ]).unwrap();
        assert_eq!(config.study_source(), Some(("https://example.com/configs/", "stage")));
        assert!(!config.debug);
    }
}
