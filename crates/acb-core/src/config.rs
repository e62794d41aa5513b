use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Deserialize;

use crate::{domain::AccountConfig, errors::Error, Result};

const DEFAULT_CONFIG_FILE: &str = "config.json";
const DEFAULT_CONNECT_RETRIES: u32 = 5;
const DEFAULT_CONNECT_RETRY_DELAY_MS: u64 = 1000;

/// What to do with an account when one of its channels cannot be resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelFailurePolicy {
    /// Log the channel and keep watching the others.
    #[default]
    SkipChannel,
    /// Treat the whole account as failed.
    FailAccount,
}

impl FromStr for ChannelFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "skip" | "skip-channel" => Ok(Self::SkipChannel),
            "fail" | "fail-account" => Ok(Self::FailAccount),
            other => Err(Error::Config(format!(
                "ACB_CHANNEL_FAILURE must be `skip` or `fail-account`, got `{other}`"
            ))),
        }
    }
}

/// Typed configuration: the accounts document plus runtime settings from env.
#[derive(Clone, Debug)]
pub struct Config {
    pub config_path: PathBuf,
    pub accounts: Vec<AccountConfig>,

    // Storage
    pub session_dir: PathBuf,
    pub log_dir: PathBuf,

    // Connection
    pub connect_retries: u32,
    pub connect_retry_delay: Duration,

    // Behavior
    pub channel_failure: ChannelFailurePolicy,
}

#[derive(Debug, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<AccountConfig>,
}

impl Config {
    /// Load `.env`, then the accounts document from `path` (or `ACB_CONFIG`,
    /// or `config.json`), then runtime settings from the environment.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let config_path = path
            .or_else(|| env_path("ACB_CONFIG"))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let text = fs::read_to_string(&config_path).map_err(|e| {
            Error::Config(format!(
                "cannot read accounts file {}: {e}",
                config_path.display()
            ))
        })?;
        let accounts = parse_accounts(&text)?;

        let session_dir = env_path("ACB_SESSION_DIR").unwrap_or_else(|| PathBuf::from("."));
        let log_dir = env_path("ACB_LOG_DIR").unwrap_or_else(|| PathBuf::from("."));
        ensure_dir(&session_dir)?;
        ensure_dir(&log_dir)?;

        let connect_retries = env_u32("ACB_CONNECT_RETRIES")
            .unwrap_or(DEFAULT_CONNECT_RETRIES)
            .max(1);
        let connect_retry_delay = Duration::from_millis(
            env_u64("ACB_CONNECT_RETRY_DELAY_MS").unwrap_or(DEFAULT_CONNECT_RETRY_DELAY_MS),
        );

        let channel_failure = match env_str("ACB_CHANNEL_FAILURE").and_then(non_empty) {
            Some(v) => v.parse()?,
            None => ChannelFailurePolicy::default(),
        };

        Ok(Self {
            config_path,
            accounts,
            session_dir,
            log_dir,
            connect_retries,
            connect_retry_delay,
            channel_failure,
        })
    }
}

/// Parse and validate the accounts document.
pub fn parse_accounts(text: &str) -> Result<Vec<AccountConfig>> {
    let file: AccountsFile = serde_json::from_str(text)?;
    validate_accounts(&file.accounts)?;
    Ok(file.accounts)
}

fn validate_accounts(accounts: &[AccountConfig]) -> Result<()> {
    let mut phones = HashSet::new();
    for (idx, acc) in accounts.iter().enumerate() {
        let phone = acc.phone.trim();
        if phone.is_empty() {
            return Err(Error::Config(format!("accounts[{idx}]: phone is empty")));
        }
        if acc.api_id <= 0 {
            return Err(Error::Config(format!(
                "accounts[{idx}] ({phone}): api_id must be positive"
            )));
        }
        if acc.api_hash.trim().is_empty() {
            return Err(Error::Config(format!(
                "accounts[{idx}] ({phone}): api_hash is empty"
            )));
        }
        if !phones.insert(phone.to_string()) {
            return Err(Error::Config(format!(
                "accounts[{idx}]: phone {phone} is listed more than once"
            )));
        }
        for (cidx, ch) in acc.channels.iter().enumerate() {
            if ch.username.trim().is_empty() {
                return Err(Error::Config(format!(
                    "accounts[{idx}] ({phone}): channels[{cidx}].username is empty"
                )));
            }
        }
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
