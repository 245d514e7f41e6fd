use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::key_codec::{KeyCodec, P256Codec};
use super::keys::{KeyError, PrivateKey};

/// File name used when no key location is given
pub const DEFAULT_KEY_FILE: &str = ".dslink.key";

/// Errors that can occur while loading or saving the identity key
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl StoreError {
    fn storage(path: &Path, source: std::io::Error) -> Self {
        StoreError::Storage {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk home of a single identity key
///
/// The file holds the key's single line text form. Writes go to a temporary
/// file next to the target and are renamed into place, so a failed save
/// leaves any previous key untouched.
///
/// # Examples
///
/// ```ignore
/// let store = KeyStore::default(); // ./.dslink.key
/// let key = store.load_or_generate()?;
/// println!("{}", key.ds_id("my-link-"));
/// ```
#[derive(Clone)]
pub struct KeyStore {
    path: PathBuf,
    codec: Arc<dyn KeyCodec>,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_FILE)
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore").field("path", &self.path).finish()
    }
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            codec: Arc::new(P256Codec),
        }
    }

    /// Store at `path`, or at [`DEFAULT_KEY_FILE`] when `None`
    pub fn at(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::new(path),
            None => Self::default(),
        }
    }

    /// Replace the codec used to read and write the key text
    pub fn with_codec(mut self, codec: Arc<dyn KeyCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and decode the stored key
    pub fn load(&self) -> Result<PrivateKey, StoreError> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::storage(&self.path, e))?;
        let key = self.codec.decode(&text)?;
        tracing::debug!(path = %self.path.display(), "loaded identity key");
        Ok(key)
    }

    /// Encode and persist `key`, replacing any existing file atomically
    pub fn save(&self, key: &PrivateKey) -> Result<(), StoreError> {
        let text = self.codec.encode(key);
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::storage(&self.path, e))?;
        tmp.write_all(text.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::storage(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::storage(&self.path, e.error))?;

        tracing::debug!(path = %self.path.display(), "saved identity key");
        Ok(())
    }

    /// Load the stored key, generating and saving a new one if none exists
    pub fn load_or_generate(&self) -> Result<PrivateKey, StoreError> {
        if self.exists() {
            return self.load();
        }
        tracing::info!(path = %self.path.display(), "no identity key found, generating one");
        let key = self.codec.generate(&mut rand_core::OsRng)?;
        self.save(&key)?;
        Ok(key)
    }
}

/// Load a key from `path`, or from [`DEFAULT_KEY_FILE`] when `None`
pub fn load_key(path: Option<&Path>) -> Result<PrivateKey, StoreError> {
    KeyStore::at(path).load()
}

/// Save a key to `path`, or to [`DEFAULT_KEY_FILE`] when `None`
pub fn save_key(key: &PrivateKey, path: Option<&Path>) -> Result<(), StoreError> {
    KeyStore::at(path).save(key)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.key");
        let key = PrivateKey::generate().unwrap();

        save_key(&key, Some(path.as_path())).unwrap();
        assert!(path.is_file());

        let loaded = load_key(Some(path.as_path())).unwrap();
        assert_eq!(loaded.to_text(), key.to_text());
    }

    #[test]
    fn test_file_holds_single_line_text_form() {
        let dir = TempDir::new().unwrap();
        let store = KeyStore::new(dir.path().join("id.key"));
        let key = PrivateKey::generate().unwrap();
        store.save(&key).unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(contents, key.to_text());
        assert!(!contents.contains('\n'));
    }

    #[test]
    fn test_save_overwrites_previous_key() {
        let dir = TempDir::new().unwrap();
        let store = KeyStore::new(dir.path().join("id.key"));
        let first = PrivateKey::generate().unwrap();
        let second = PrivateKey::generate().unwrap();

        store.save(&first).unwrap();
        store.save(&second).unwrap();
        assert_eq!(store.load().unwrap(), second);
    }

    #[test]
    fn test_failed_save_leaves_previous_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("id.key");
        let key = PrivateKey::generate().unwrap();
        KeyStore::new(&path).save(&key).unwrap();

        // a directory in the way of the rename makes persist fail
        let blocked = dir.path().join("blocked");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("inner"), "x").unwrap();
        let err = KeyStore::new(&blocked)
            .save(&PrivateKey::generate().unwrap())
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage { .. }));

        assert_eq!(KeyStore::new(&path).load().unwrap(), key);
        // no temp files left behind beside the real ones
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = KeyStore::new(dir.path().join("missing.key")).load().unwrap_err();
        assert!(matches!(err, StoreError::Storage { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.key");
        std::fs::write(&path, "a b c").unwrap();
        let err = KeyStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Key(KeyError::MalformedKey(_))));
    }

    #[test]
    fn test_load_or_generate_persists_once() {
        let dir = TempDir::new().unwrap();
        let store = KeyStore::new(dir.path().join("id.key"));
        assert!(!store.exists());

        let first = store.load_or_generate().unwrap();
        assert!(store.exists());
        let second = store.load_or_generate().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_default_location() {
        assert_eq!(KeyStore::default().path(), Path::new(DEFAULT_KEY_FILE));
        assert_eq!(KeyStore::at(None).path(), Path::new(".dslink.key"));
    }
}
