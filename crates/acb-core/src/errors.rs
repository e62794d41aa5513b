use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the core can
/// contain failures at the right level (per event, per channel, per account).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path: {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("cannot resolve channel {channel}: {reason}")]
    Resolve { channel: String, reason: String },

    #[error("send failed: {0}")]
    Send(String),

    #[error("input error: {0}")]
    Input(String),

    /// Failure while bringing one account online. Display is the cause only;
    /// callers prefix the account themselves.
    #[error("{source}")]
    Initialization {
        account: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap `self` as an initialization failure of `account` (idempotent).
    pub fn for_account(self, account: &str) -> Self {
        match self {
            Error::Initialization { .. } => self,
            other => Error::Initialization {
                account: account.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The account an initialization failure belongs to, if any.
    pub fn account(&self) -> Option<&str> {
        match self {
            Error::Initialization { account, .. } => Some(account),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialization_wraps_once_and_displays_cause() {
        let err = Error::Connect("timed out".to_string())
            .for_account("+100")
            .for_account("+200");
        assert_eq!(err.account(), Some("+100"));
        assert_eq!(err.to_string(), "connection failed: timed out");
    }
}
