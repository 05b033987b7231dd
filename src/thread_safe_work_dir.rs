use crate::catalog::{merge_patch, new_id, Document};
use crate::errors::*;
use crate::workdir::WorkDir;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone)]
pub struct ThreadSafeWorkDir {
    pub work_dir: Arc<RwLock<WorkDir>>,
}

impl ThreadSafeWorkDir {
    pub fn new(work_dir: WorkDir) -> Self {
        Self {
            work_dir: Arc::new(RwLock::new(work_dir)),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, WorkDir>> {
        self.work_dir.read().map_err(|_| Error::Locked)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, WorkDir>> {
        self.work_dir.write().map_err(|_| Error::Locked)
    }

    /// Reload the catalog when its files were changed behind our back.
    /// Returns whether a reload happened.
    pub fn check_for_updates(&self) -> Result<bool> {
        if !self.read()?.changed_on_disk() {
            return Ok(false);
        }

        // Check again and load under the write lock, so a write that landed
        // in between is either on disk for the reload or already recorded
        let mut workdir = self.write()?;
        if !workdir.changed_on_disk() {
            return Ok(false);
        }

        let path = workdir.path.to_path_buf();
        log::info!("Noticed update for {}", path.display());
        *workdir = WorkDir::new(path)?;
        Ok(true)
    }

    /// Store a new document built from a request body. The server assigns
    /// `_id` and the timestamps; `prepare` runs under the write lock so it can
    /// check the document against the rest of the catalog.
    pub fn create<T, F>(&self, body: Value, now: DateTime<Utc>, prepare: F) -> Result<T>
    where
        T: Document,
        F: FnOnce(&WorkDir, &mut T) -> Result<()>,
    {
        let mut body = body;
        if let Value::Object(fields) = &mut body {
            for key in ["_id", "createdAt", "updatedAt"] {
                fields.remove(key);
            }
        }
        let mut item: T = serde_json::from_value(body)
            .map_err(|e| Error::BadRequest(format!("Invalid {}: {}", T::LABEL, e)))?;
        item.set_id(new_id());
        item.stamp(now);

        let mut work_dir = self.write()?;
        prepare(&*work_dir, &mut item)?;
        item.validate()?;
        work_dir.insert(item.clone())?;
        Ok(item)
    }

    /// Merge `patch` into the stored document and persist the result.
    pub fn update<T, F>(&self, id: &str, patch: Value, now: DateTime<Utc>, prepare: F) -> Result<T>
    where
        T: Document,
        F: FnOnce(&WorkDir, &mut T) -> Result<()>,
    {
        let mut work_dir = self.write()?;
        let mut item = merge_patch(work_dir.find::<T>(id)?, patch)?;
        item.stamp(now);
        prepare(&*work_dir, &mut item)?;
        item.validate()?;
        work_dir.insert(item.clone())?;
        Ok(item)
    }

    pub fn delete<T: Document>(&self, id: &str) -> Result<T> {
        self.write()?.remove::<T>(id)
    }
}
