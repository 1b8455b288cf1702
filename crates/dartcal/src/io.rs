//! JSON persistence for configs, records and history.

use crate::board::BoardError;
use crate::config::CalibrationConfig;
use crate::record::{CalibrationRecord, History};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Board(#[from] BoardError),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

impl CalibrationConfig {
    /// Load a JSON config from disk and validate the board radii.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let cfg: Self = read_json(path.as_ref())?;
        cfg.radii.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json(self, path.as_ref())
    }
}

impl CalibrationRecord {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        read_json(path.as_ref())
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json(self, path.as_ref())
    }
}

impl History {
    /// Load a history file; a missing file is an empty history.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let records: Vec<CalibrationRecord> = read_json(path)?;
        Ok(Self::from_records(records))
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        write_json(self, path.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardRadii;

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let cfg = CalibrationConfig {
            robust: true,
            ..CalibrationConfig::default()
        };
        cfg.write_json(&path).expect("write");
        assert_eq!(CalibrationConfig::load_json(&path).expect("load"), cfg);
    }

    #[test]
    fn invalid_radii_are_rejected_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let cfg = CalibrationConfig {
            radii: BoardRadii {
                double_inner: 180.0,
                ..BoardRadii::STANDARD
            },
            ..CalibrationConfig::default()
        };
        cfg.write_json(&path).expect("write");
        assert!(matches!(
            CalibrationConfig::load_json(&path),
            Err(IoError::Board(BoardError::NotIncreasing))
        ));
    }

    #[test]
    fn missing_history_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let history = History::load_json(dir.path().join("none.json")).expect("load");
        assert!(history.is_empty());
    }

    #[test]
    fn malformed_json_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("record.json");
        fs::write(&path, "{\"H\": 3}").expect("write");
        assert!(matches!(
            CalibrationRecord::load_json(&path),
            Err(IoError::Json(_))
        ));
    }
}
