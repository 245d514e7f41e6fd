use std::fmt;
use std::path::PathBuf;

use clap::Args;

use common::crypto::{KeyError, PrivateKey, StoreError};

/// Create a new identity key
#[derive(Args, Debug, Clone)]
pub struct Keygen {
    /// Replace an existing key file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    #[error("key file {0:?} already exists, pass --force to replace it")]
    Exists(PathBuf),
    #[error("failed to generate key: {0}")]
    Key(#[from] KeyError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
pub struct KeygenOutput {
    pub path: PathBuf,
    pub public_key: String,
}

impl fmt::Display for KeygenOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "wrote {}", self.path.display())?;
        write!(f, "public key: {}", self.public_key)
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Keygen {
    type Error = KeygenError;
    type Output = KeygenOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let store = &ctx.key_store;
        if store.exists() && !self.force {
            return Err(KeygenError::Exists(store.path().to_path_buf()));
        }

        let key = PrivateKey::generate()?;
        store.save(&key)?;
        tracing::info!(path = ?store.path(), "saved new identity key");

        Ok(KeygenOutput {
            path: store.path().to_path_buf(),
            public_key: key.public().to_base64(),
        })
    }
}
