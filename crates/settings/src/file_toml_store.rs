use crate::errors::SettingError;
use crate::key_path::KeyPath;
use crate::store::SettingsStore;
use fs2::FileExt;
use paths::ConfigScope;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Table, Value};
use tracing::{debug, trace};

/// FileTomlStore: file-backed store using `toml_edit::DocumentMut`.
///
/// Notes:
/// - Edits are applied in place on the document so comments and layout of
///   unrelated keys survive a round trip.
/// - Persist writes a temporary file next to the target and renames it into
///   place while holding an advisory lock on a sidecar `.lock` file, so a
///   concurrent reader (or another process) never sees a half-written file.
/// - Writability is the requested mode AND what the filesystem allows.
pub struct FileTomlStore {
    path: PathBuf,
    doc: DocumentMut,
    writable: bool,
    scope: ConfigScope,
}

impl FileTomlStore {
    /// Open a TOML-backed store.
    ///
    /// With `writable` requested, parent directories are created if possible;
    /// failure to create them (or to open the file for writing) downgrades
    /// the store to read-only instead of failing.
    pub fn open(
        path: impl Into<PathBuf>,
        scope: ConfigScope,
        writable: bool,
    ) -> Result<Self, SettingError> {
        let path = path.into();
        let writable = writable && probe_writable(&path);

        let mut store = Self {
            path,
            doc: DocumentMut::new(),
            writable,
            scope,
        };
        store.load()?;

        debug!(
            scope = %scope,
            path = %store.path.display(),
            writable = store.writable,
            exists = store.exists(),
            "opened settings store"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("toml.tmp")
    }

    /// Acquires an exclusive lock on the sidecar lock file, runs `f`, then
    /// releases the lock.
    fn with_lock<F, R>(&self, f: F) -> Result<R, SettingError>
    where
        F: FnOnce() -> Result<R, SettingError>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        file.lock_exclusive()?;
        let res = f();
        file.unlock()?;
        res
    }

    fn ensure_parent_dir(&self) -> Result<(), SettingError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<(), SettingError> {
        if self.writable {
            Ok(())
        } else {
            Err(SettingError::StoreReadOnly(self.scope))
        }
    }
}

impl SettingsStore for FileTomlStore {
    fn scope(&self) -> ConfigScope {
        self.scope
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn file_identity(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&mut self) -> Result<(), SettingError> {
        // Missing (or not a regular file): behave like an empty document.
        if !self.path.is_file() {
            self.doc = DocumentMut::new();
            return Ok(());
        }
        self.doc = match std::fs::read_to_string(&self.path) {
            Ok(s) => s.parse::<DocumentMut>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DocumentMut::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(())
    }

    fn get(&self, key: &KeyPath) -> Result<Option<Value>, SettingError> {
        let Some((last, parents)) = key.split_last() else {
            return Err(SettingError::InvalidKey(key.to_string()));
        };

        // Walk nested tables using toml_edit read-only APIs
        let mut cur_table = self.doc.as_table();
        for seg in parents {
            match cur_table.get(seg).and_then(Item::as_table) {
                Some(t) => cur_table = t,
                None => return Ok(None),
            }
        }
        Ok(cur_table.get(last).and_then(Item::as_value).cloned())
    }

    fn set(&mut self, key: &KeyPath, value: Value) -> Result<(), SettingError> {
        self.ensure_writable()?;
        let Some((last, parents)) = key.split_last() else {
            return Err(SettingError::InvalidKey(key.to_string()));
        };

        let mut table: &mut Table = self.doc.as_table_mut();
        for seg in parents {
            table = table
                .entry(seg)
                .or_insert(Item::Table(Table::new()))
                .as_table_mut()
                .ok_or_else(|| SettingError::InvalidKey(key.to_string()))?;
        }
        table.insert(last, Item::Value(value));
        trace!(scope = %self.scope, key = %key, "set");
        Ok(())
    }

    fn remove(&mut self, key: &KeyPath) -> Result<(), SettingError> {
        self.ensure_writable()?;
        let Some((last, parents)) = key.split_last() else {
            return Err(SettingError::InvalidKey(key.to_string()));
        };

        let mut table: &mut Table = self.doc.as_table_mut();
        for seg in parents {
            match table.get_mut(seg).and_then(Item::as_table_mut) {
                Some(t) => table = t,
                None => return Ok(()),
            }
        }
        table.remove(last);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SettingError> {
        self.ensure_writable()?;
        self.doc = DocumentMut::new();
        Ok(())
    }

    fn persist(&self) -> Result<(), SettingError> {
        self.ensure_writable()?;
        self.ensure_parent_dir()?;
        let bytes = self.doc.to_string().into_bytes();
        let tmp = self.tmp_path();
        self.with_lock(|| {
            // write temp file
            let mut f = File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
            // atomic rename
            std::fs::rename(&tmp, &self.path)?;
            // fsync parent dir
            #[cfg(unix)]
            if let Some(dir) = self.path.parent() {
                File::open(dir)?.sync_all()?;
            }
            Ok(())
        })?;
        debug!(scope = %self.scope, path = %self.path.display(), "settings persisted");
        Ok(())
    }
}

/// Whether `path` can be written (creating parent directories if needed).
///
/// Persisting creates a temp file and a lock file next to `path` and renames
/// over it, so the directory has to accept new files even when `path` exists.
fn probe_writable(path: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };
    if std::fs::create_dir_all(parent).is_err() {
        return false;
    }
    if path.exists() && OpenOptions::new().append(true).open(path).is_err() {
        return false;
    }
    let probe = parent.join(format!(".{}.probe", std::process::id()));
    match OpenOptions::new().write(true).create_new(true).open(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove_nested_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store =
            FileTomlStore::open(dir.path().join("a.toml"), ConfigScope::User, true).expect("open");

        let key = KeyPath::parse("tls.key_length");
        store.set(&key, Value::from(4096_i64)).expect("set");
        assert_eq!(
            store.get(&key).expect("get").and_then(|v| v.as_integer()),
            Some(4096)
        );

        store.remove(&key).expect("remove");
        assert!(store.get(&key).expect("get").is_none());
    }

    #[test]
    fn set_through_scalar_is_invalid_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store =
            FileTomlStore::open(dir.path().join("a.toml"), ConfigScope::User, true).expect("open");
        store
            .set(&KeyPath::parse("core"), Value::from("scalar"))
            .expect("set scalar");

        let err = store
            .set(&KeyPath::parse("core.port"), Value::from(1_i64))
            .unwrap_err();
        assert!(matches!(err, SettingError::InvalidKey(_)));
    }

    #[test]
    fn read_only_store_refuses_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = FileTomlStore::open(dir.path().join("ro.toml"), ConfigScope::System, false)
            .expect("open");

        assert!(!store.is_writable());
        let err = store
            .set(&KeyPath::parse("core.port"), Value::from(1_i64))
            .unwrap_err();
        assert!(matches!(err, SettingError::StoreReadOnly(ConfigScope::System)));
        assert!(matches!(
            store.persist().unwrap_err(),
            SettingError::StoreReadOnly(_)
        ));
        assert!(!dir.path().join("ro.toml").exists());
    }

    #[cfg(unix)]
    #[test]
    fn writable_file_in_read_only_directory_is_read_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let locked_dir = dir.path().join("etc");
        std::fs::create_dir(&locked_dir).expect("mkdir");
        let path = locked_dir.join("s.toml");
        std::fs::write(&path, "[core]\nport = 1\n").expect("seed");
        std::fs::set_permissions(&locked_dir, std::fs::Permissions::from_mode(0o555))
            .expect("chmod");

        // Permission bits are not enforced for root.
        let enforced = File::create(locked_dir.join("x")).is_err();
        if enforced {
            let store = FileTomlStore::open(&path, ConfigScope::System, true).expect("open");
            assert!(!store.is_writable());
            assert_eq!(
                store
                    .get(&KeyPath::parse("core.port"))
                    .expect("get")
                    .and_then(|v| v.as_integer()),
                Some(1)
            );
        }

        std::fs::set_permissions(&locked_dir, std::fs::Permissions::from_mode(0o755))
            .expect("chmod back");
    }

    #[test]
    fn persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("s.toml");
        let mut store = FileTomlStore::open(&path, ConfigScope::User, true).expect("open");
        store
            .set(&KeyPath::parse("core.screen_name"), Value::from("desk"))
            .expect("set");
        store.persist().expect("persist");

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
    }
}
