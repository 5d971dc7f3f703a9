use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::PathBuf;

/// All computed paths used by snipcycle
#[derive(Debug, Clone)]
pub struct Paths {
    /// ~/.snipcycle
    pub base_dir: PathBuf,
    /// ~/.snipcycle/config.json
    pub config_file: PathBuf,
    /// ~/.snipcycle/backups
    pub backups_dir: PathBuf,
    /// $XDG_RUNTIME_DIR/snipcycle/trigger.sock, or ~/.snipcycle/trigger.sock
    pub socket_path: PathBuf,
}

impl Paths {
    pub fn new() -> Result<Self> {
        let base_dirs = BaseDirs::new().context("Failed to determine home directory")?;
        let base_dir = base_dirs.home_dir().join(".snipcycle");

        let socket_path = match base_dirs.runtime_dir() {
            Some(runtime) => runtime.join("snipcycle").join("trigger.sock"),
            None => base_dir.join("trigger.sock"),
        };

        Ok(Self {
            config_file: base_dir.join("config.json"),
            backups_dir: base_dir.join("backups"),
            socket_path,
            base_dir,
        })
    }

    /// Use a different config file; backups and socket stay where they are
    pub fn with_config_file(mut self, config_file: PathBuf) -> Self {
        self.config_file = config_file;
        self
    }

    /// Ensure the base directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create base directory: {:?}", self.base_dir)
        })?;
        Ok(())
    }
}
