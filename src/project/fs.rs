//! Directory-per-project storage.
//!
//! Layout under the projects root:
//!
//! ```text
//! <id>/project.toml        metadata
//! <id>/<file_id>_<name>    uploaded audio
//! <id>/<file_id>.txt       transcript of that file
//! <id>/memo.txt            generated memo
//! ```

use super::{FileStatus, ProjectFile, ProjectRecord, ProjectStore};
use crate::error::{NarrataError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

const METADATA_FILE: &str = "project.toml";
const MEMO_FILE: &str = "memo.txt";

/// Filesystem-backed project store.
pub struct FsProjectStore {
    root: PathBuf,
    /// Serializes read-modify-write cycles on metadata files.
    write_lock: Mutex<()>,
}

impl FsProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn short_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
    }

    fn validate_id(id: &str) -> Result<()> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(NarrataError::InvalidInput(format!("Invalid id: {:?}", id)));
        }
        Ok(())
    }

    fn project_dir(&self, id: &str) -> Result<PathBuf> {
        Self::validate_id(id)?;
        let dir = self.root.join(id);
        if !dir.join(METADATA_FILE).exists() {
            return Err(NarrataError::ProjectNotFound(id.to_string()));
        }
        Ok(dir)
    }

    fn read_record(&self, dir: &Path) -> Result<ProjectRecord> {
        let content = std::fs::read_to_string(dir.join(METADATA_FILE))?;
        let mut record: ProjectRecord = toml::from_str(&content)?;
        record.path = dir.to_path_buf();
        Ok(record)
    }

    fn write_record(&self, record: &ProjectRecord) -> Result<()> {
        let content = toml::to_string_pretty(record)
            .map_err(|e| NarrataError::Project(format!("Failed to serialize project: {}", e)))?;
        std::fs::write(record.path.join(METADATA_FILE), content)?;
        Ok(())
    }

    /// Load, modify and save a record under the write lock.
    fn update<F>(&self, id: &str, f: F) -> Result<ProjectRecord>
    where
        F: FnOnce(&mut ProjectRecord) -> Result<()>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let dir = self.project_dir(id)?;
        let mut record = self.read_record(&dir)?;
        f(&mut record)?;
        self.write_record(&record)?;
        Ok(record)
    }

    fn stored_file_name(file_id: &str, file_name: &str) -> String {
        format!("{}_{}", file_id, file_name)
    }

    fn transcript_path(dir: &Path, file_id: &str) -> PathBuf {
        dir.join(format!("{}.txt", file_id))
    }

    fn read_optional(path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ProjectStore for FsProjectStore {
    fn create(&self, name: &str, narrator: Option<&str>) -> Result<ProjectRecord> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut id = Self::short_id();
        while self.root.join(&id).exists() {
            id = Self::short_id();
        }
        let path = self.root.join(&id);
        std::fs::create_dir_all(&path)?;

        let record = ProjectRecord {
            id: id.clone(),
            name: name.trim().to_string(),
            narrator: narrator.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            created_at: Utc::now(),
            status: BTreeMap::new(),
            files: BTreeMap::new(),
            path,
        };
        self.write_record(&record)?;

        info!("Created project {} ({})", record.name, id);
        Ok(record)
    }

    fn load(&self, id: &str) -> Result<ProjectRecord> {
        let dir = self.project_dir(id)?;
        self.read_record(&dir)
    }

    fn list_all(&self) -> Result<Vec<ProjectRecord>> {
        let mut projects = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let dir = entry?.path();
            if !dir.join(METADATA_FILE).exists() {
                continue;
            }
            match self.read_record(&dir) {
                Ok(record) => projects.push(record),
                Err(e) => debug!("Skipping unreadable project {}: {}", dir.display(), e),
            }
        }
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(projects)
    }

    fn rename(&self, id: &str, name: &str, narrator: Option<&str>) -> Result<ProjectRecord> {
        self.update(id, |record| {
            record.name = name.trim().to_string();
            record.narrator = narrator.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string);
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let dir = self.project_dir(id)?;
        std::fs::remove_dir_all(&dir)?;
        info!("Deleted project {}", id);
        Ok(())
    }

    fn add_file(&self, id: &str, file_name: &str, data: &[u8]) -> Result<String> {
        // Keep only the final path component of whatever name we were given.
        let file_name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| NarrataError::InvalidInput(format!("Invalid file name: {:?}", file_name)))?
            .to_string();

        let file_id = Self::short_id();
        self.update(id, |record| {
            std::fs::write(record.path.join(Self::stored_file_name(&file_id, &file_name)), data)?;
            record.files.insert(
                file_id.clone(),
                ProjectFile {
                    name: file_name.clone(),
                    status: FileStatus::Ready,
                    added_at: Utc::now(),
                },
            );
            Ok(())
        })?;

        info!("Added {} to project {} as {}", file_name, id, file_id);
        Ok(file_id)
    }

    fn delete_file(&self, id: &str, file_id: &str) -> Result<()> {
        Self::validate_id(file_id)?;
        self.update(id, |record| {
            let file = record.files.remove(file_id).ok_or_else(|| {
                NarrataError::Project(format!("File {} not found in project {}", file_id, id))
            })?;
            for path in [
                record.path.join(Self::stored_file_name(file_id, &file.name)),
                Self::transcript_path(&record.path, file_id),
            ] {
                if path.exists() {
                    std::fs::remove_file(&path)?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    fn set_file_status(&self, id: &str, file_id: &str, status: FileStatus) -> Result<()> {
        self.update(id, |record| {
            let file = record.files.get_mut(file_id).ok_or_else(|| {
                NarrataError::Project(format!("File {} not found in project {}", file_id, id))
            })?;
            file.status = status;
            Ok(())
        })?;
        Ok(())
    }

    fn audio_path(&self, id: &str, file_id: &str) -> Result<PathBuf> {
        let record = self.load(id)?;
        let file = record.files.get(file_id).ok_or_else(|| {
            NarrataError::Project(format!("File {} not found in project {}", file_id, id))
        })?;
        Ok(record.path.join(Self::stored_file_name(file_id, &file.name)))
    }

    fn set_status(&self, id: &str, key: &str, value: &str) -> Result<()> {
        self.update(id, |record| {
            if value.is_empty() {
                record.status.remove(key);
            } else {
                record.status.insert(key.to_string(), value.to_string());
            }
            Ok(())
        })?;
        Ok(())
    }

    fn status(&self, id: &str, key: &str) -> Result<Option<String>> {
        Ok(self.load(id)?.status.get(key).cloned())
    }

    fn read_transcript(&self, id: &str, file_id: &str) -> Result<Option<String>> {
        Self::validate_id(file_id)?;
        let dir = self.project_dir(id)?;
        Self::read_optional(&Self::transcript_path(&dir, file_id))
    }

    fn write_transcript(&self, id: &str, file_id: &str, text: &str) -> Result<()> {
        Self::validate_id(file_id)?;
        let dir = self.project_dir(id)?;
        std::fs::write(Self::transcript_path(&dir, file_id), text)?;
        Ok(())
    }

    fn read_memo(&self, id: &str) -> Result<Option<String>> {
        let dir = self.project_dir(id)?;
        Self::read_optional(&dir.join(MEMO_FILE))
    }

    fn write_memo(&self, id: &str, memo: &str) -> Result<()> {
        let dir = self.project_dir(id)?;
        std::fs::write(dir.join(MEMO_FILE), memo)?;
        Ok(())
    }

    fn reset(&self, id: &str) -> Result<()> {
        self.update(id, |record| {
            record.status.remove(super::STATUS_GENERATING);
            for file in record.files.values_mut() {
                file.status = FileStatus::Ready;
            }
            Ok(())
        })?;
        Ok(())
    }
}
