use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::{ResultSink, StoreError};
use crate::core::detection::DetectionResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredResult {
    #[serde(flatten)]
    result: DetectionResult,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

/// 本地缓存：整份历史以 JSON 数组保存在单个文件中，最新的在前
///
/// An unreadable or corrupt file is treated as an empty history; the next
/// save overwrites it.
pub struct JsonFileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        info!("Result cache at {}", path.display());
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Vec<StoredResult> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!("Failed to read {}: {}", self.path.display(), err);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!("Ignoring corrupt result cache {}: {}", self.path.display(), err);
                Vec::new()
            }
        }
    }

    fn write_all(&self, records: &[StoredResult]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(records)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Wrote {} results to {}", records.len(), self.path.display());
        Ok(())
    }

    fn retain(&self, keep: impl Fn(&StoredResult) -> bool) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read_all();
        let before = records.len();
        records.retain(|r| keep(r));
        let removed = before - records.len();
        if removed > 0 {
            self.write_all(&records)?;
        }
        Ok(removed)
    }
}

impl ResultSink for JsonFileSink {
    fn save(&self, result: &DetectionResult, owner: Option<&str>) -> Result<String, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read_all();
        records.retain(|r| r.result.id != result.id);
        records.insert(
            0,
            StoredResult {
                result: result.clone(),
                user_id: owner.map(str::to_string),
            },
        );
        self.write_all(&records)?;
        Ok(result.id.clone())
    }

    fn list(&self, owner: Option<&str>) -> Result<Vec<DetectionResult>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .read_all()
            .into_iter()
            .filter(|r| owner.is_none() || r.user_id.as_deref() == owner)
            .map(|r| r.result)
            .collect())
    }

    fn get(&self, id: &str) -> Result<DetectionResult, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_all()
            .into_iter()
            .find(|r| r.result.id == id)
            .map(|r| r.result)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn clear_owner(&self, owner: &str) -> Result<usize, StoreError> {
        self.retain(|r| r.user_id.as_deref() != Some(owner))
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        self.retain(|_| false)
    }
}
