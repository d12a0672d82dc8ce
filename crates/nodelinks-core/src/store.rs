//! JSON document persistence: read / write / delete one pretty-printed document.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error_handling::utils::{config_error, io_error};
use crate::error_handling::Result;

#[derive(Clone, Debug)]
pub struct JsonDocument {
    path: PathBuf,
}

impl JsonDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::metadata(&self.path).await.is_ok()
    }

    /// Ok(None) when the document does not exist; Config error when it does not parse
    /// (invalid UTF-8 included).
    pub async fn read<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read document", Some(&self.path), e)),
        };
        // Bad encoding is a parse failure like any other.
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| config_error("parse document", Some(&self.path.display().to_string()), e))
    }

    /// Serialize fully, write to a sibling temp file, then rename over the document.
    pub async fn write<T: Serialize>(&self, value: &T) -> Result<()> {
        let body = serde_json::to_string_pretty(value)
            .map_err(|e| config_error("serialize document", None, e))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create document directory", Some(parent), e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error("write document", Some(&tmp), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error("replace document", Some(&self.path), e))
    }

    /// Returns whether a document was removed.
    pub async fn delete(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("delete document", Some(&self.path), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::NodelinksError;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_missing_document_reads_as_none() {
        let td = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(td.path().join("settings.json"));
        let value: Option<HashMap<String, String>> = doc.read().await.unwrap();
        assert!(value.is_none());
        assert!(!doc.delete().await.unwrap());
    }

    #[tokio::test]
    async fn test_write_then_delete() {
        let td = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(td.path().join("nested").join("doc.json"));
        let mut map = HashMap::new();
        map.insert("repo".to_string(), "registry.npmjs.org".to_string());
        doc.write(&map).await.unwrap();

        let back: HashMap<String, String> = doc.read().await.unwrap().unwrap();
        assert_eq!(back.get("repo").map(String::as_str), Some("registry.npmjs.org"));
        assert!(!td.path().join("nested").join("doc.json.tmp").exists());

        assert!(doc.delete().await.unwrap());
        assert!(!doc.exists().await);
    }

    #[tokio::test]
    async fn test_malformed_document_is_config_error() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let doc = JsonDocument::new(&path);
        let err = doc.read::<HashMap<String, String>>().await.unwrap_err();
        assert!(matches!(err, NodelinksError::Config { .. }));

        std::fs::write(&path, [0xff, 0xfe, b'{']).unwrap();
        let err = doc.read::<HashMap<String, String>>().await.unwrap_err();
        assert!(matches!(err, NodelinksError::Config { .. }));
    }
}
