//! Saved survey results, one file per session.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Session ids are caller supplied, so they are percent-encoded before
    /// being used as a file name.
    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.txt", urlencoding::encode(session_id)))
    }

    /// Overwrite the saved result for `session_id`.
    pub async fn save(&self, session_id: &str, result: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(session_id);
        let tmp_path = path.with_extension("txt.tmp");
        fs::write(&tmp_path, result).await?;
        fs::rename(&tmp_path, &path).await?;
        info!(session_id, path = %path.display(), "Saved result");
        Ok(())
    }

    /// The saved result, or `None` if nothing was saved for this session.
    pub async fn load(&self, session_id: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(session_id)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete the saved result. Returns whether there was one.
    pub async fn remove(&self, session_id: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => {
                debug!(session_id, "Removed result");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn results_are_kept_per_session() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results"));

        store.save("s1", r#"{"careers":[]}"#).await.unwrap();
        store.save("s2", "other").await.unwrap();
        store.save("s1", r#"{"careers":[{"rank":1}]}"#).await.unwrap();

        assert_eq!(
            store.load("s1").await.unwrap().as_deref(),
            Some(r#"{"careers":[{"rank":1}]}"#)
        );
        assert_eq!(store.load("s2").await.unwrap().as_deref(), Some("other"));
        assert_eq!(store.load("s3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_deletes_only_that_session() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results"));
        store.save("s1", "a").await.unwrap();
        store.save("s2", "b").await.unwrap();

        assert!(store.remove("s1").await.unwrap());
        assert!(!store.remove("s1").await.unwrap());
        assert_eq!(store.load("s1").await.unwrap(), None);
        assert_eq!(store.load("s2").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn remove_without_directory_is_a_no_op() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("never-created"));
        assert!(!store.remove("s1").await.unwrap());
    }

    #[tokio::test]
    async fn hostile_ids_stay_inside_the_directory() {
        let dir = tempdir().unwrap();
        let results = dir.path().join("results");
        let store = ResultStore::new(&results);
        store.save("../../escape", "x").await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(&results).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load("../../escape").await.unwrap().as_deref(), Some("x"));
        assert!(!dir.path().join("escape.txt").exists());
    }
}
