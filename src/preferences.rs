//! Persistent user preferences and the selected model.
//!
//! Preferences are a flat map of string keys to string values.  The file-backed
//! store keeps them in a small YAML document and rewrites it on every change.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::error::{Error, Result};
use crate::models::{DEFAULT_MODEL, KnownModel, is_valid_model};

/// Key under which the selected model id is stored.
pub const MODEL_PREFERENCE_KEY: &str = "ai-chatbot-selected-model";

const PREFERENCES_ENV: &str = "CHATTERBOX_PREFERENCES";
const PREFERENCES_FILE: &str = "preferences.yaml";

/// A string key-value store that outlives the process.
pub trait PreferenceStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Preferences kept in a YAML file.
#[derive(Debug)]
pub struct FilePreferenceStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FilePreferenceStore {
    /// Use the file at `path`.  The file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Use the file named by CHATTERBOX_PREFERENCES, or the per-user default.
    pub fn from_env() -> Self {
        Self::new(default_preferences_path())
    }

    /// Where the preferences live.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(Error::io(
                    format!("failed to read {}", self.path.display()),
                    e,
                ));
            }
        };
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_yaml::from_str(&contents)?)
    }

    fn store(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::io(format!("failed to create {}", parent.display()), e)
                })?;
            }
        }
        let yaml = serde_yaml::to_string(values)?;
        fs::write(&self.path, yaml)
            .map_err(|e| Error::io(format!("failed to write {}", self.path.display()), e))
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = match self.load() {
            Ok(values) => values,
            Err(err @ Error::Serialization { .. }) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "preferences file is corrupt; starting over"
                );
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        values.insert(key.to_string(), value.to_string());
        self.store(&values)
    }
}

/// Preferences that last as long as the process.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn default_preferences_path() -> PathBuf {
    preferences_path(env::var_os(PREFERENCES_ENV).map(PathBuf::from))
}

// An explicit path wins; otherwise the per-user config directory.
fn preferences_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| dirs::config_dir().map(|dir| dir.join("chatterbox").join(PREFERENCES_FILE)))
        .unwrap_or_else(|| PathBuf::from(".chatterbox-preferences.yaml"))
}

/// The model the user has chosen, kept in step with a [`PreferenceStore`].
pub struct ModelSelection {
    model: KnownModel,
    store: Box<dyn PreferenceStore>,
}

impl ModelSelection {
    /// Read the stored selection.
    ///
    /// A missing, unreadable or unknown value yields [`DEFAULT_MODEL`]; the store is
    /// not rewritten until the selection changes.
    pub fn load(store: Box<dyn PreferenceStore>) -> Self {
        let model = match store.get(MODEL_PREFERENCE_KEY) {
            Ok(Some(id)) if is_valid_model(&id) => id.parse().unwrap_or(DEFAULT_MODEL),
            Ok(Some(id)) => {
                tracing::info!(stored = %id, "ignoring unknown stored model");
                DEFAULT_MODEL
            }
            Ok(None) => DEFAULT_MODEL,
            Err(err) => {
                tracing::warn!(error = %err, "could not read model preference");
                DEFAULT_MODEL
            }
        };
        Self { model, store }
    }

    /// Start from `model` without consulting the store.
    pub fn with_model(model: KnownModel, store: Box<dyn PreferenceStore>) -> Self {
        Self { model, store }
    }

    /// The current selection.
    pub fn model(&self) -> KnownModel {
        self.model
    }

    /// Change the selection and persist it.
    ///
    /// The in-memory selection changes even if persisting fails.
    pub fn set(&mut self, model: KnownModel) -> Result<()> {
        self.model = model;
        self.store.set(MODEL_PREFERENCE_KEY, model.as_str())
    }

    /// Change the selection by id.  Unknown ids are rejected and change nothing.
    pub fn set_by_id(&mut self, id: &str) -> Result<KnownModel> {
        let model: KnownModel = id.parse()?;
        self.set(model)?;
        Ok(model)
    }
}

impl std::fmt::Debug for ModelSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSelection")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
