//! File-backed model store with backup rotation.
//!
//! # Responsibility
//! - Keep one serialized model at `<home>/data/model.xml`.
//! - Copy the current file to `<home>/data/backups/` before every
//!   destructive write (save over an existing file, remove).
//!
//! # Invariants
//! - Backup first, then write. A failed backup leaves the model file
//!   untouched.
//! - Writes go to a temporary file in the data directory that is renamed
//!   over `model.xml`, so readers never observe a half-written model.
//! - Directory/file type mismatches are distinct errors checked before any
//!   write.

use crate::model::course::{effective_model_name, CourseModel};
use crate::persistence::xml::{read_document, read_model_name, write_document, CourseDocument};
use crate::persistence::{StoreError, StoreResult};
use chrono::Local;
use log::{error, info, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;

pub const DATA_DIR_NAME: &str = "data";
pub const BACKUP_DIR_NAME: &str = "backups";
pub const MODEL_FILE_NAME: &str = "model.xml";

const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%3f";
const MAX_BACKUP_SUFFIX: u32 = 999;

/// Persistence store for one visual model.
#[derive(Debug, Clone)]
pub struct ModelFileStore {
    data_dir: PathBuf,
    backup_dir: PathBuf,
    model_path: PathBuf,
}

impl ModelFileStore {
    /// Opens the store below `application_home`, creating the data
    /// directory when missing.
    pub fn new(application_home: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = application_home.as_ref().join(DATA_DIR_NAME);
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir).map_err(|source| StoreError::Io {
                action: "create data directory",
                path: data_dir.clone(),
                source,
            })?;
        }
        Ok(Self::at_data_dir(data_dir))
    }

    /// Store over an existing data directory; nothing is created.
    pub fn at_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            backup_dir: data_dir.join(BACKUP_DIR_NAME),
            model_path: data_dir.join(MODEL_FILE_NAME),
            data_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Whether a readable model is stored. Errors count as "no model".
    pub fn has_model(&self) -> bool {
        matches!(self.model_name(), Ok(Some(_)))
    }

    /// Name of the stored model, reading only the document root.
    ///
    /// # Errors
    /// - `ModelNotAFile` when the model path is a directory.
    /// - `Io` when the file cannot be read.
    /// - `Parse` when the root element cannot be parsed.
    pub fn model_name(&self) -> StoreResult<Option<String>> {
        let Some(text) = self.read_model_text()? else {
            return Ok(None);
        };
        read_model_name(&text)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: self.model_path.clone(),
                source,
            })
    }

    /// Saves `model`, named `name_override` when given.
    ///
    /// # Errors
    /// - Directory/file checks, backup and write failures as `StoreError`.
    pub fn save(&self, model: &CourseModel, name_override: Option<&str>) -> StoreResult<()> {
        let name = effective_model_name(model.name(), name_override);
        self.save_document(&CourseDocument::from_model(model, &name))
    }

    /// Writes an already assembled document.
    pub fn save_document(&self, document: &CourseDocument) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.write_with_backup(document);
        match &result {
            Ok(backed_up) => info!(
                "event=model_save module=store status=ok records={} backup={} duration_ms={}",
                document.records.len(),
                backed_up,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=model_save module=store status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result.map(|_| ())
    }

    /// Replaces the content of `into` with the stored model.
    ///
    /// Leaves `into` empty when no model is stored.
    pub fn load(&self, into: &mut CourseModel) -> StoreResult<()> {
        into.clear();
        let Some(text) = self.read_model_text()? else {
            info!("event=model_load module=store status=ok stored=false");
            return Ok(());
        };
        let document = read_document(&text).map_err(|source| StoreError::Parse {
            path: self.model_path.clone(),
            source,
        })?;
        info!(
            "event=model_load module=store status=ok stored=true records={}",
            document.records.len()
        );
        document.into_model(into);
        Ok(())
    }

    /// Backs up and deletes the stored model. No-op when no model file is
    /// stored, including when something other than a file sits at the model
    /// path.
    ///
    /// # Errors
    /// - Backup failures; the model is then left in place.
    /// - `RemoveIncomplete` when the model path still exists afterwards.
    pub fn remove(&self) -> StoreResult<()> {
        if !self.model_path.is_file() {
            if self.model_path.exists() {
                warn!(
                    "event=model_remove module=store status=warn reason=not_a_file path={}",
                    self.model_path.display()
                );
            }
            return Ok(());
        }
        self.backup()?;

        fs::remove_file(&self.model_path).map_err(|source| StoreError::Io {
            action: "remove model",
            path: self.model_path.clone(),
            source,
        })?;

        if self.model_path.exists() {
            return Err(StoreError::RemoveIncomplete(self.model_path.clone()));
        }
        info!("event=model_remove module=store status=ok");
        Ok(())
    }

    /// Backup files, oldest first.
    pub fn backups(&self) -> StoreResult<Vec<PathBuf>> {
        if !self.backup_dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = backup_prefix();
        let entries = fs::read_dir(&self.backup_dir).map_err(|source| StoreError::Io {
            action: "list backups",
            path: self.backup_dir.clone(),
            source,
        })?;

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                action: "list backups",
                path: self.backup_dir.clone(),
                source,
            })?;
            let is_backup = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&prefix));
            if is_backup {
                backups.push(entry.path());
            }
        }
        backups.sort();
        Ok(backups)
    }

    fn read_model_text(&self) -> StoreResult<Option<String>> {
        if !self.model_path.exists() {
            return Ok(None);
        }
        if !self.model_path.is_file() {
            return Err(StoreError::ModelNotAFile(self.model_path.clone()));
        }
        fs::read_to_string(&self.model_path)
            .map(Some)
            .map_err(|source| StoreError::Io {
                action: "read model",
                path: self.model_path.clone(),
                source,
            })
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if !self.data_dir.exists() {
            return Err(StoreError::DataDirMissing(self.data_dir.clone()));
        }
        if !self.data_dir.is_dir() {
            return Err(StoreError::DataDirNotADirectory(self.data_dir.clone()));
        }
        if self.model_path.exists() && !self.model_path.is_file() {
            return Err(StoreError::ModelNotAFile(self.model_path.clone()));
        }
        Ok(())
    }

    /// Returns whether a backup was taken.
    fn write_with_backup(&self, document: &CourseDocument) -> StoreResult<bool> {
        self.ensure_writable()?;
        let text = write_document(document).map_err(|source| StoreError::Parse {
            path: self.model_path.clone(),
            source,
        })?;

        let backed_up = self.model_path.exists();
        if backed_up {
            self.backup()?;
        }
        self.write_atomically(text.as_bytes())?;
        Ok(backed_up)
    }

    fn write_atomically(&self, bytes: &[u8]) -> StoreResult<()> {
        let io_error = |source: io::Error| StoreError::Io {
            action: "write model",
            path: self.model_path.clone(),
            source,
        };

        let mut staged = NamedTempFile::new_in(&self.data_dir).map_err(io_error)?;
        staged.write_all(bytes).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged
            .persist(&self.model_path)
            .map_err(|err| io_error(err.error))?;
        Ok(())
    }

    fn backup(&self) -> StoreResult<PathBuf> {
        if self.backup_dir.exists() && !self.backup_dir.is_dir() {
            return Err(StoreError::BackupDirNotADirectory(self.backup_dir.clone()));
        }
        fs::create_dir_all(&self.backup_dir).map_err(|source| StoreError::Io {
            action: "create backup directory",
            path: self.backup_dir.clone(),
            source,
        })?;

        let base_name = format!(
            "{}{}",
            backup_prefix(),
            Local::now().format(BACKUP_TIMESTAMP_FORMAT)
        );
        let (path, mut target) = self.create_backup_file(&base_name)?;
        let backup_error = |source: io::Error| StoreError::Io {
            action: "back up model",
            path: path.clone(),
            source,
        };

        let copied = File::open(&self.model_path)
            .and_then(|mut source| io::copy(&mut source, &mut target))
            .and_then(|_| target.sync_all());
        if let Err(source) = copied {
            drop(target);
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(
                    "event=model_backup module=store status=warn reason=partial_backup_kept file={} error={}",
                    path.display(),
                    cleanup
                );
            }
            return Err(backup_error(source));
        }

        info!(
            "event=model_backup module=store status=ok file={}",
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        Ok(path)
    }

    /// Creates a new backup file, adding `.1`, `.2`, ... when a backup with
    /// the same timestamp exists.
    fn create_backup_file(&self, base_name: &str) -> StoreResult<(PathBuf, File)> {
        for suffix in 0..=MAX_BACKUP_SUFFIX {
            let file_name = if suffix == 0 {
                base_name.to_string()
            } else {
                format!("{base_name}.{suffix}")
            };
            let path = self.backup_dir.join(file_name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(StoreError::Io {
                        action: "create backup",
                        path,
                        source,
                    })
                }
            }
        }
        Err(StoreError::Io {
            action: "create backup",
            path: self.backup_dir.join(base_name),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "too many backups with the same timestamp",
            ),
        })
    }
}

fn backup_prefix() -> String {
    format!("{MODEL_FILE_NAME}_backup_")
}

#[cfg(test)]
mod tests {
    use super::{ModelFileStore, MODEL_FILE_NAME};
    use crate::model::component::VisualComponent;
    use crate::model::course::CourseModel;
    use crate::model::reference::EntityKind;
    use crate::persistence::StoreError;
    use std::fs;

    fn model_with_point(name: &str) -> CourseModel {
        let mut model = CourseModel::new(name);
        model.add(VisualComponent::new(EntityKind::Point, "P1"));
        model
    }

    #[test]
    fn new_creates_data_dir_and_reports_no_model() {
        let home = tempfile::tempdir().unwrap();
        let store = ModelFileStore::new(home.path()).unwrap();
        assert!(store.data_dir().is_dir());
        assert!(!store.has_model());
        assert_eq!(store.model_name().unwrap(), None);
        assert!(store.backups().unwrap().is_empty());
    }

    #[test]
    fn first_save_takes_no_backup_and_overwrite_does() {
        let home = tempfile::tempdir().unwrap();
        let store = ModelFileStore::new(home.path()).unwrap();

        store.save(&model_with_point("A"), None).unwrap();
        assert!(store.backups().unwrap().is_empty());

        store.save(&model_with_point("B"), None).unwrap();
        let backups = store.backups().unwrap();
        assert_eq!(backups.len(), 1);
        let backup_name = backups[0].file_name().unwrap().to_str().unwrap();
        assert!(backup_name.starts_with(&format!("{MODEL_FILE_NAME}_backup_")));
        assert!(fs::read_to_string(&backups[0]).unwrap().contains("name=\"A\""));
        assert_eq!(store.model_name().unwrap().as_deref(), Some("B"));
    }

    #[test]
    fn save_rejects_model_path_that_is_a_directory() {
        let home = tempfile::tempdir().unwrap();
        let store = ModelFileStore::new(home.path()).unwrap();
        fs::create_dir(store.model_path()).unwrap();

        let err = store.save(&model_with_point("A"), None).unwrap_err();
        assert!(matches!(err, StoreError::ModelNotAFile(_)), "{err}");
        assert!(store.backups().unwrap().is_empty());
    }

    #[test]
    fn save_rejects_missing_or_non_directory_data_dir() {
        let home = tempfile::tempdir().unwrap();
        let missing = ModelFileStore::at_data_dir(home.path().join("absent"));
        assert!(matches!(
            missing.save(&model_with_point("A"), None),
            Err(StoreError::DataDirMissing(_))
        ));

        let file_path = home.path().join("plain-file");
        fs::write(&file_path, b"x").unwrap();
        let not_dir = ModelFileStore::at_data_dir(&file_path);
        assert!(matches!(
            not_dir.save(&model_with_point("A"), None),
            Err(StoreError::DataDirNotADirectory(_))
        ));
    }

    #[test]
    fn failed_backup_leaves_model_untouched() {
        let home = tempfile::tempdir().unwrap();
        let store = ModelFileStore::new(home.path()).unwrap();
        store.save(&model_with_point("A"), None).unwrap();
        fs::write(store.backup_dir(), b"not a directory").unwrap();

        let err = store.save(&model_with_point("B"), None).unwrap_err();
        assert!(matches!(err, StoreError::BackupDirNotADirectory(_)), "{err}");
        assert_eq!(store.model_name().unwrap().as_deref(), Some("A"));
    }

    #[test]
    fn remove_leaves_a_directory_at_the_model_path_alone() {
        let home = tempfile::tempdir().unwrap();
        let store = ModelFileStore::new(home.path()).unwrap();
        fs::create_dir(store.model_path()).unwrap();

        store.remove().unwrap();
        assert!(store.model_path().is_dir());
        assert!(!store.has_model());
        assert!(store.backups().unwrap().is_empty());
    }

    #[test]
    fn failed_copy_deletes_the_partial_backup() {
        let home = tempfile::tempdir().unwrap();
        let store = ModelFileStore::new(home.path()).unwrap();
        fs::create_dir(store.model_path()).unwrap();

        let err = store.backup().unwrap_err();
        assert!(matches!(err, StoreError::Io { action: "back up model", .. }), "{err}");
        assert!(store.backup_dir().is_dir());
        assert!(store.backups().unwrap().is_empty());
        assert_eq!(fs::read_dir(store.backup_dir()).unwrap().count(), 0);
    }

    #[test]
    fn unparsable_model_is_a_wrapped_parse_error() {
        let home = tempfile::tempdir().unwrap();
        let store = ModelFileStore::new(home.path()).unwrap();
        fs::write(store.model_path(), "<garbage").unwrap();

        let err = store.model_name().unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }), "{err}");
        assert!(!store.has_model());
    }
}
