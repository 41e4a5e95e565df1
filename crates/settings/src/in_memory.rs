use crate::errors::SettingError;
use crate::key_path::KeyPath;
use crate::store::{LOCKED_SETTINGS_KEY, SettingsStore};
use paths::ConfigScope;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use toml_edit::{Array, Value};

/// InMemoryStore: a store without backing file.
///
/// Used wherever a real file is not wanted (tests, dry runs). It follows the
/// same writability contract as [`crate::FileTomlStore`] and counts persist
/// calls so callers can assert on sync behaviour.
#[derive(Debug)]
pub struct InMemoryStore {
    scope: ConfigScope,
    writable: bool,
    exists: AtomicBool,
    values: BTreeMap<KeyPath, Value>,
    persisted: Mutex<BTreeMap<KeyPath, Value>>,
    persist_count: AtomicUsize,
}

impl InMemoryStore {
    pub fn new(scope: ConfigScope, writable: bool) -> Self {
        Self {
            scope,
            writable,
            exists: AtomicBool::new(false),
            values: BTreeMap::new(),
            persisted: Mutex::new(BTreeMap::new()),
            persist_count: AtomicUsize::new(0),
        }
    }

    /// Seed a value regardless of writability (simulates existing file content).
    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        let key = KeyPath::parse(key);
        let value = value.into();
        self.values.insert(key.clone(), value.clone());
        self.persisted_map().insert(key, value);
        self.exists.store(true, Ordering::SeqCst);
        self
    }

    /// Seed the administrator lock list.
    pub fn with_locked(self, fields: &[&str]) -> Self {
        let array: Array = fields.iter().copied().collect();
        self.with_value(LOCKED_SETTINGS_KEY, Value::Array(array))
    }

    pub fn persist_count(&self) -> usize {
        self.persist_count.load(Ordering::SeqCst)
    }

    /// Value as of the last successful `persist`.
    pub fn persisted(&self, key: &str) -> Option<Value> {
        self.persisted_map().get(&KeyPath::parse(key)).cloned()
    }

    fn persisted_map(&self) -> std::sync::MutexGuard<'_, BTreeMap<KeyPath, Value>> {
        match self.persisted.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn ensure_writable(&self) -> Result<(), SettingError> {
        if self.writable {
            Ok(())
        } else {
            Err(SettingError::StoreReadOnly(self.scope))
        }
    }
}

impl SettingsStore for InMemoryStore {
    fn scope(&self) -> ConfigScope {
        self.scope
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn exists(&self) -> bool {
        self.exists.load(Ordering::SeqCst)
    }

    fn file_identity(&self) -> String {
        format!("memory:{}", self.scope)
    }

    fn load(&mut self) -> Result<(), SettingError> {
        let snapshot = self.persisted_map().clone();
        self.values = snapshot;
        Ok(())
    }

    fn get(&self, key: &KeyPath) -> Result<Option<Value>, SettingError> {
        if key.is_empty() {
            return Err(SettingError::InvalidKey(key.to_string()));
        }
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &KeyPath, value: Value) -> Result<(), SettingError> {
        self.ensure_writable()?;
        if key.is_empty() {
            return Err(SettingError::InvalidKey(key.to_string()));
        }
        self.values.insert(key.clone(), value);
        Ok(())
    }

    fn remove(&mut self, key: &KeyPath) -> Result<(), SettingError> {
        self.ensure_writable()?;
        self.values.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SettingError> {
        self.ensure_writable()?;
        self.values.clear();
        Ok(())
    }

    fn persist(&self) -> Result<(), SettingError> {
        self.ensure_writable()?;
        *self.persisted_map() = self.values.clone();
        self.exists.store(true, Ordering::SeqCst);
        self.persist_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
