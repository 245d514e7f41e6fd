use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use common::crypto::StoreError;
use dslink::{ConfigError, ConnError, Negotiator, Settings, SettingsError};

/// Run the broker handshake and report the session it produces
#[derive(Args, Debug, Clone)]
pub struct Connect {
    /// Broker handshake endpoint, e.g. http://localhost:8080/conn
    #[arg(long)]
    pub broker: Option<String>,

    /// Link name, used as the dsId prefix
    #[arg(long)]
    pub name: Option<String>,

    /// Static token issued by the broker
    #[arg(long)]
    pub token: Option<String>,

    #[arg(long)]
    pub requester: bool,

    #[arg(long)]
    pub responder: bool,

    /// Encoding to offer; repeat in order of preference
    #[arg(long = "format")]
    pub formats: Vec<String>,

    /// Limit in seconds for each handshake step
    #[arg(long)]
    pub timeout: Option<u64>,

    /// TOML settings file; flags take precedence over it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Conn(#[from] ConnError),
}

#[derive(Debug)]
pub struct ConnectOutput {
    pub ds_id: String,
    pub session: String,
    pub path: String,
    pub format: String,
    pub version: String,
}

impl fmt::Display for ConnectOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "connected as {}", self.ds_id)?;
        writeln!(f, "  session: {}", self.session)?;
        writeln!(f, "  path:    {}", self.path)?;
        writeln!(f, "  format:  {}", self.format)?;
        write!(f, "  broker:  {}", self.version)
    }
}

impl Connect {
    /// File settings with this command's flags applied on top
    fn settings(&self) -> Result<Settings, SettingsError> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(broker) = &self.broker {
            settings.broker = Some(broker.clone());
        }
        if let Some(name) = &self.name {
            settings.name = Some(name.clone());
        }
        if let Some(token) = &self.token {
            settings.token = Some(token.clone());
        }
        settings.requester |= self.requester;
        settings.responder |= self.responder;
        if !self.formats.is_empty() {
            settings.formats = self.formats.clone();
        }
        if let Some(secs) = self.timeout {
            settings.handshake_timeout_secs = secs;
            settings.upgrade_timeout_secs = secs;
        }
        Ok(settings)
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Connect {
    type Error = ConnectError;
    type Output = ConnectOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let settings = self.settings()?;
        let key = Arc::new(ctx.key_store.load_or_generate()?);
        let config = settings.into_builder(key)?.build()?;

        let mut negotiator = Negotiator::new(config)?;
        let connection = negotiator.dial().await?;

        let output = ConnectOutput {
            ds_id: connection.ds_id().to_string(),
            session: connection.session().id.clone(),
            path: connection.session().path.clone(),
            format: connection.codec().name().to_string(),
            version: connection.session().version.clone(),
        };

        let mut stream = connection.into_stream();
        if let Err(e) = stream.close(None).await {
            tracing::warn!(error = %e, "failed to close stream cleanly");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect() -> Connect {
        Connect {
            broker: None,
            name: None,
            token: None,
            requester: false,
            responder: false,
            formats: Vec::new(),
            timeout: None,
            config: None,
        }
    }

    #[test]
    fn test_flags_without_file() {
        let op = Connect {
            broker: Some("http://localhost:8080/conn".into()),
            name: Some("cli-".into()),
            responder: true,
            formats: vec!["msgpack".into()],
            timeout: Some(5),
            ..connect()
        };
        let settings = op.settings().unwrap();
        assert_eq!(settings.broker.as_deref(), Some("http://localhost:8080/conn"));
        assert_eq!(settings.name.as_deref(), Some("cli-"));
        assert!(settings.responder);
        assert_eq!(settings.formats, vec!["msgpack"]);
        assert_eq!(settings.handshake_timeout_secs, 5);
        assert_eq!(settings.upgrade_timeout_secs, 5);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("link.toml");
        std::fs::write(
            &path,
            "broker = \"http://file:8080/conn\"\nname = \"file-\"\nrequester = true\n",
        )
        .unwrap();

        let op = Connect {
            name: Some("cli-".into()),
            config: Some(path),
            ..connect()
        };
        let settings = op.settings().unwrap();
        assert_eq!(settings.broker.as_deref(), Some("http://file:8080/conn"));
        assert_eq!(settings.name.as_deref(), Some("cli-"));
        assert!(settings.requester);
        assert_eq!(settings.formats, vec!["json", "msgpack"]);
    }
}
