use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use common::crypto::PrivateKey;

use crate::codec;
use crate::config::LinkConfigBuilder;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown message format {0:?}")]
    UnknownFormat(String),
}

/// Link settings as written in a TOML file
///
/// ```toml
/// broker = "http://localhost:8080/conn"
/// name = "weather-"
/// responder = true
/// formats = ["msgpack", "json"]
///
/// [link_data]
/// zone = "north"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Broker handshake endpoint
    #[serde(default)]
    pub broker: Option<String>,
    /// Link name, the dsId prefix
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub requester: bool,
    #[serde(default)]
    pub responder: bool,
    /// Encodings to offer, in order of preference
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    #[serde(default)]
    pub link_data: Map<String, Value>,
    #[serde(default = "default_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub upgrade_timeout_secs: u64,
    #[serde(default = "default_compression")]
    pub compression: bool,
}

fn default_formats() -> Vec<String> {
    vec![codec::JSON.to_string(), codec::MSGPACK.to_string()]
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_compression() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: None,
            name: None,
            token: None,
            requester: false,
            responder: false,
            formats: default_formats(),
            link_data: Map::new(),
            handshake_timeout_secs: default_timeout_secs(),
            upgrade_timeout_secs: default_timeout_secs(),
            compression: default_compression(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Seed a [`LinkConfigBuilder`] with these settings
    ///
    /// Broker and name are only set when present, so callers can still
    /// supply them afterwards. Validation is left to
    /// [`LinkConfigBuilder::build`].
    pub fn into_builder(self, key: Arc<PrivateKey>) -> Result<LinkConfigBuilder, SettingsError> {
        let mut builder = LinkConfigBuilder::default()
            .key(key)
            .handshake_timeout(Duration::from_secs(self.handshake_timeout_secs))
            .upgrade_timeout(Duration::from_secs(self.upgrade_timeout_secs))
            .compression(self.compression);

        if let Some(broker) = self.broker {
            builder = builder.broker(broker);
        }
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(token) = self.token {
            builder = builder.token(token);
        }
        if self.requester {
            builder = builder.requester();
        }
        if self.responder {
            builder = builder.responder();
        }
        for format in &self.formats {
            let codec = codec::by_name(format)
                .ok_or_else(|| SettingsError::UnknownFormat(format.clone()))?;
            builder = builder.codec(codec);
        }
        for (key, value) in self.link_data {
            builder = builder.link_data(key, value);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.formats, vec!["json", "msgpack"]);
        assert_eq!(settings.handshake_timeout_secs, 60);
        assert_eq!(settings.upgrade_timeout_secs, 60);
        assert!(settings.compression);
    }

    #[test]
    fn test_parse_full_file() {
        let settings = Settings::parse(
            r#"
            broker = "http://localhost:8080/conn"
            name = "weather-"
            token = "abcdefghijklmnopqrst"
            responder = true
            formats = ["msgpack"]
            handshake_timeout_secs = 5
            compression = false

            [link_data]
            zone = "north"
            "#,
        )
        .unwrap();

        assert_eq!(settings.broker.as_deref(), Some("http://localhost:8080/conn"));
        assert_eq!(settings.name.as_deref(), Some("weather-"));
        assert!(settings.responder);
        assert!(!settings.requester);
        assert_eq!(settings.formats, vec!["msgpack"]);
        assert_eq!(settings.handshake_timeout_secs, 5);
        assert_eq!(settings.upgrade_timeout_secs, 60);
        assert_eq!(settings.link_data["zone"], "north");
    }

    #[test]
    fn test_into_config() {
        let key = Arc::new(PrivateKey::generate().unwrap());
        let settings = Settings {
            broker: Some("http://localhost:8080/conn".into()),
            name: Some("weather-".into()),
            token: Some("abcdefghijklmnopqrst".into()),
            requester: true,
            formats: vec!["msgpack".into(), "json".into()],
            handshake_timeout_secs: 5,
            ..Settings::default()
        };

        let config = settings.into_builder(key.clone()).unwrap().build().unwrap();
        assert_eq!(config.ds_id(), key.ds_id("weather-"));
        assert_eq!(config.token(), Some("abcdefghijklmnop"));
        assert!(config.is_requester());
        assert!(!config.is_responder());
        assert_eq!(config.codecs().names(), vec!["msgpack", "json"]);
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.upgrade_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let key = Arc::new(PrivateKey::generate().unwrap());
        let settings = Settings {
            formats: vec!["json".into(), "cbor".into()],
            ..Settings::default()
        };
        let err = settings.into_builder(key).unwrap_err();
        assert!(matches!(err, SettingsError::UnknownFormat(f) if f == "cbor"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Settings::load(&dir.path().join("link.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Read { .. }));
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("link.toml");
        fs::write(&path, "broker = [").unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
