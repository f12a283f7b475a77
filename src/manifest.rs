//! JSON records stored next to the blobs: `info.json` and `manifest.json`.

use serde::{Deserialize, Serialize};

/// Entry name of the singleton info record.
pub const INFO_FILE: &str = "info.json";
/// Entry name of the singleton manifest.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Engine version plus the caller's backup metadata.
///
/// `backup` is opaque here; the persistence layer decides its shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(rename = "DockerVersion", default)]
    pub docker_version: String,
    #[serde(rename = "Backup", default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<serde_json::Value>,
}

impl Info {
    pub fn new(docker_version: impl Into<String>) -> Self {
        Self { docker_version: docker_version.into(), backup: None }
    }

    pub fn with_backup(mut self, backup: serde_json::Value) -> Self {
        self.backup = Some(backup);
        self
    }
}

/// One exported unit. Every string is a blob path as returned by the writer
/// (`blobs/<algo>/<hex>`), usable as a `read_blobs` suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "Config", default)]
    pub config: String,
    #[serde(rename = "Image", default)]
    pub image: String,
    #[serde(rename = "Volume", default)]
    pub volume: Vec<String>,
    #[serde(rename = "Network", default)]
    pub network: Vec<String>,
}

impl Manifest {
    /// Every blob path this record refers to, config first.
    pub fn blob_paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.config.as_str())
            .chain(std::iter::once(self.image.as_str()))
            .chain(self.volume.iter().map(String::as_str))
            .chain(self.network.iter().map(String::as_str))
            .filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_manifest_decodes() {
        let m: Vec<Manifest> = serde_json::from_str(r#"[{"Volume":["v1"]}]"#).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].volume, vec!["v1".to_string()]);
        assert!(m[0].config.is_empty());
        assert!(m[0].network.is_empty());
    }

    #[test]
    fn info_field_names() {
        let json = serde_json::to_string(&Info::new("24.0.0")).unwrap();
        assert_eq!(json, r#"{"DockerVersion":"24.0.0"}"#);
        let back: Info = serde_json::from_str(r#"{"DockerVersion":"24.0.0","Backup":{"ID":7}}"#).unwrap();
        assert_eq!(back.backup.unwrap()["ID"], 7);
    }

    #[test]
    fn blob_paths_skip_empty() {
        let m = Manifest {
            config: "blobs/sha256/aa".into(),
            volume: vec!["blobs/sha256/bb".into()],
            ..Default::default()
        };
        assert_eq!(m.blob_paths().collect::<Vec<_>>(), ["blobs/sha256/aa", "blobs/sha256/bb"]);
    }
}
