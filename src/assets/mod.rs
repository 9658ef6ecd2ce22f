//! Asset publisher
//!
//! Writes uploaded bytes under the asset root and returns the public URL
//! they will be served from. Independent of cluster state.

use crate::error::CoordinatorError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

const DEFAULT_FILETYPE: &str = "png";
const DEFAULT_LOCATION: &str = "assets";

/// Upload parameters; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishRequest {
    pub name: Option<String>,
    pub filetype: Option<String>,
    pub location: Option<String>,
}

/// Where a published asset can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedAsset {
    pub url: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Persists assets to disk
#[derive(Debug, Clone)]
pub struct AssetPublisher {
    root: PathBuf,
    base_url: String,
}

impl AssetPublisher {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Write `bytes` to `<root>/<location>/<name>.<filetype>`
    pub async fn publish(
        &self,
        request: &PublishRequest,
        bytes: &[u8],
    ) -> Result<PublishedAsset, CoordinatorError> {
        if bytes.is_empty() {
            return Err(CoordinatorError::EmptyAsset);
        }

        let filetype = segment(request.filetype.as_deref(), DEFAULT_FILETYPE)?;
        let location = segment(request.location.as_deref(), DEFAULT_LOCATION)?;
        let name = match request.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => segment(Some(name), "")?,
            _ => Uuid::new_v4().simple().to_string(),
        };

        let directory = self.root.join(&location);
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| CoordinatorError::AssetWriteFailed {
                path: directory.clone(),
                source,
            })?;

        let file_name = format!("{name}.{filetype}");
        let path = directory.join(&file_name);
        info!(path = %path.display(), bytes = bytes.len(), "Writing asset");
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| CoordinatorError::AssetWriteFailed {
                path: path.clone(),
                source,
            })?;

        Ok(PublishedAsset {
            url: format!("{}/{location}/{file_name}", self.base_url),
            path,
        })
    }
}

/// Validate one path segment, falling back to `default` when blank
fn segment(raw: Option<&str>, default: &str) -> Result<String, CoordinatorError> {
    let value = match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => default,
    };

    let unsafe_segment = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if unsafe_segment {
        return Err(CoordinatorError::InvalidAssetPath {
            component: value.to_string(),
        });
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_with_defaults_and_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = AssetPublisher::new(dir.path(), "https://cdn.example.com/");

        let asset = publisher
            .publish(&PublishRequest::default(), b"\x89PNG")
            .await
            .unwrap();

        assert!(asset.url.starts_with("https://cdn.example.com/assets/"));
        assert!(asset.url.ends_with(".png"));
        assert_eq!(std::fs::read(&asset.path).unwrap(), b"\x89PNG");
        assert!(asset.path.starts_with(dir.path().join("assets")));
    }

    #[tokio::test]
    async fn honours_explicit_name_type_and_location() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = AssetPublisher::new(dir.path(), "https://cdn.example.com");
        let request = PublishRequest {
            name: Some("chart".to_string()),
            filetype: Some("svg".to_string()),
            location: Some("stats".to_string()),
        };

        let asset = publisher.publish(&request, b"<svg/>").await.unwrap();
        assert_eq!(asset.url, "https://cdn.example.com/stats/chart.svg");
        assert_eq!(asset.path, dir.path().join("stats").join("chart.svg"));
    }

    #[tokio::test]
    async fn rejects_empty_upload() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = AssetPublisher::new(dir.path(), "http://localhost");
        let err = publisher
            .publish(&PublishRequest::default(), b"")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::EmptyAsset));
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = AssetPublisher::new(dir.path(), "http://localhost");

        for (name, location) in [("../escape", "assets"), ("ok", ".."), ("ok", "a/b")] {
            let request = PublishRequest {
                name: Some(name.to_string()),
                filetype: None,
                location: Some(location.to_string()),
            };
            let err = publisher.publish(&request, b"x").await.unwrap_err();
            assert_eq!(err.error_type_label(), "invalid_asset_path");
        }
    }

    #[tokio::test]
    async fn unwritable_root_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let publisher = AssetPublisher::new(&blocker, "http://localhost");
        let err = publisher
            .publish(&PublishRequest::default(), b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::AssetWriteFailed { .. }));
    }
}
