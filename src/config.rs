use std::path::{Path, PathBuf};

use burn::config::Config;

use crate::error::Error;

// The derive expands to code that names the two-argument std `Result`.

#[derive(Config, Debug)]
pub struct TrainerConfig {
    /// Directory the upload service mounts training images into.
    #[config(default = "PathBuf::from(\"/app/training_images\")")]
    pub images_dir: PathBuf,
}

impl TrainerConfig {
    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        Self::load(path)
            .map_err(|e| Error::Config(format!("failed to load {}: {e}", path.display())))
    }

    pub fn to_file(&self, path: &Path) -> crate::error::Result<()> {
        self.save(path)
            .map_err(|e| Error::Config(format!("failed to save {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn defaults_to_mounted_volume() {
        let config = TrainerConfig::new();
        assert_eq!(config.images_dir, PathBuf::from("/app/training_images"));
    }

    #[test]
    fn survives_a_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        TrainerConfig::new()
            .with_images_dir(PathBuf::from("data/cats"))
            .to_file(&path)
            .unwrap();
        let loaded = TrainerConfig::from_file(&path).unwrap();

        assert_eq!(loaded.images_dir, PathBuf::from("data/cats"));
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let dir = tempdir().unwrap();

        let err = TrainerConfig::from_file(&dir.path().join("missing.json")).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
    }
}
