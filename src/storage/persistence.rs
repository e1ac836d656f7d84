//! Chain state persistence
//!
//! Saves the chain state as JSON with rotating backups, plus the
//! deployments file front ends read.

use crate::chain::ChainState;
use crate::config::{ConfigError, Deployments};
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub state_file: String,
    pub deployments_file: String,
    pub backup_enabled: bool,
    pub max_backups: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".dex_data"),
            state_file: "chain.json".to_string(),
            deployments_file: "config.json".to_string(),
            backup_enabled: true,
            max_backups: 5,
        }
    }
}

/// Chain state storage manager
///
/// Saves are serialized and never move the state file backwards: a
/// snapshot lower than the last one written is skipped.
pub struct Storage {
    config: StorageConfig,
    /// Height of the last snapshot written by this instance
    last_saved: Mutex<Option<u64>>,
}

impl Storage {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self {
            config,
            last_saved: Mutex::new(None),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    fn state_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.state_file)
    }

    fn deployments_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.deployments_file)
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup.{}", self.config.state_file, index))
    }

    /// Save the chain state to disk
    ///
    /// Returns `Ok(false)` when a newer snapshot has already been written.
    pub fn save(&self, state: &ChainState) -> Result<bool, StorageError> {
        let mut last_saved = self.last_saved.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = *last_saved {
            if state.height() < last {
                log::debug!(
                    "Skipping stale snapshot at height {} (saved {})",
                    state.height(),
                    last
                );
                return Ok(false);
            }
        }

        self.write_state(state)?;
        *last_saved = Some(state.height());
        Ok(true)
    }

    /// Write `state` as the current chain state, whatever its height
    fn write_state(&self, state: &ChainState) -> Result<(), StorageError> {
        let path = self.state_path();

        if self.config.backup_enabled && path.exists() {
            self.rotate_backups()?;
            fs::copy(&path, self.backup_path(0))?;
        }

        // Write to a fresh temporary file first, then rename into place
        let mut temp = NamedTempFile::new_in(&self.config.data_dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, state)?;
            writer.flush()?;
        }
        temp.persist(&path).map_err(|e| e.error)?;

        log::debug!("Chain state saved to {:?} (height {})", path, state.height());
        Ok(())
    }

    /// Load the chain state from disk
    pub fn load(&self) -> Result<ChainState, StorageError> {
        let path = self.state_path();

        if !path.exists() {
            return Err(StorageError::InvalidData(
                "Chain state file not found".to_string(),
            ));
        }

        load_from_file(&path)
    }

    pub fn exists(&self) -> bool {
        self.state_path().exists()
    }

    pub fn save_deployments(&self, deployments: &Deployments) -> Result<(), StorageError> {
        Ok(deployments.save(&self.deployments_path())?)
    }

    pub fn load_deployments(&self) -> Result<Deployments, StorageError> {
        Ok(Deployments::load(&self.deployments_path())?)
    }

    fn rotate_backups(&self) -> Result<(), StorageError> {
        if self.config.max_backups == 0 {
            return Ok(());
        }

        let oldest = self.backup_path(self.config.max_backups - 1);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for i in (0..self.config.max_backups - 1).rev() {
            let current = self.backup_path(i);
            if current.exists() {
                fs::rename(&current, self.backup_path(i + 1))?;
            }
        }

        Ok(())
    }

    /// Make backup `backup_index` the current chain state
    ///
    /// The replaced state is rotated into the backups like any other save.
    pub fn restore_backup(&self, backup_index: usize) -> Result<ChainState, StorageError> {
        let backup_path = self.backup_path(backup_index);

        if !backup_path.exists() {
            return Err(StorageError::InvalidData(format!(
                "Backup {} not found",
                backup_index
            )));
        }

        let state = load_from_file(&backup_path)?;
        let mut last_saved = self.last_saved.lock().unwrap_or_else(|e| e.into_inner());
        self.write_state(&state)?;
        *last_saved = Some(state.height());

        log::info!("Restored backup {} (height {})", backup_index, state.height());
        Ok(state)
    }

    /// List available backups
    pub fn list_backups(&self) -> Vec<usize> {
        (0..self.config.max_backups)
            .filter(|i| self.backup_path(*i).exists())
            .collect()
    }
}

/// Load chain state from a specific file path
pub fn load_from_file(path: &Path) -> Result<ChainState, StorageError> {
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
