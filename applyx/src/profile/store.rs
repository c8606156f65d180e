use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{ChatError, Result};
use crate::models::Profile;

pub const PROFILE_NOT_FOUND: &str = "Profile chưa được tạo";

/// The one stored profile, kept as a JSON file.
///
/// Every write replaces the whole file through a temp file and a rename, so
/// the file on disk is always either absent or a complete profile. Writers
/// are serialized so an update never merges over a half-finished save.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, profile: Profile) -> Result<Profile> {
        let _guard = self.write_lock.lock().await;
        self.write(&profile).await?;
        Ok(profile)
    }

    pub async fn get(&self) -> Result<Profile> {
        let raw = self.read_raw().await?;
        serde_json::from_slice(&raw).map_err(|e| self.corrupt(&e))
    }

    /// Merge the top-level fields of `partial` over the stored profile.
    /// With nothing stored yet, `partial` must be a complete profile.
    pub async fn update(&self, partial: Value) -> Result<Profile> {
        let Value::Object(fields) = partial else {
            return Err(ChatError::InvalidInput(
                "Dữ liệu cập nhật profile phải là một JSON object".to_string(),
            ));
        };

        let _guard = self.write_lock.lock().await;
        let merged = match self.read_raw().await {
            Ok(raw) => {
                let mut current: Value =
                    serde_json::from_slice(&raw).map_err(|e| self.corrupt(&e))?;
                let Value::Object(ref mut stored) = current else {
                    return Err(ChatError::corrupt(
                        self.path.display().to_string(),
                        "profile is not a JSON object",
                    ));
                };
                stored.extend(fields);
                current
            }
            Err(ChatError::NotFound(_)) => Value::Object(fields),
            Err(e) => return Err(e),
        };

        let profile: Profile = serde_json::from_value(merged)
            .map_err(|e| ChatError::InvalidInput(format!("Profile không hợp lệ: {e}")))?;
        self.write(&profile).await?;
        Ok(profile)
    }

    /// Remove the profile. Returns false if there was none.
    pub async fn delete(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Deleted profile");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Caller holds `write_lock`.
    async fn write(&self, profile: &Profile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_vec_pretty(profile)?).await?;
        fs::rename(&tmp_path, &self.path).await?;
        info!(path = %self.path.display(), "Saved profile");
        Ok(())
    }

    async fn read_raw(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path).await {
            Ok(raw) => Ok(raw),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ChatError::NotFound(PROFILE_NOT_FOUND.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn corrupt(&self, err: &serde_json::Error) -> ChatError {
        ChatError::corrupt(self.path.display().to_string(), err.to_string())
    }
}
