use std::path::PathBuf;

use crate::{domain::SessionToken, utils::file_safe_key, Result};

/// Per-account session token files (`session_<phone>.session`).
///
/// A missing or unreadable file is "no prior session", never an error.
#[derive(Clone, Debug)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, account: &str) -> PathBuf {
        self.dir
            .join(format!("session_{}.session", file_safe_key(account)))
    }

    pub async fn load(&self, account: &str) -> SessionToken {
        let path = self.path_for(account);
        match tokio::fs::read(&path).await {
            Ok(bytes) => SessionToken::new(bytes),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no stored session");
                SessionToken::empty()
            }
        }
    }

    pub async fn save(&self, account: &str, token: &SessionToken) -> Result<()> {
        tokio::fs::write(self.path_for(account), token.as_bytes()).await?;
        Ok(())
    }
}
