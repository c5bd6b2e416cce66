//! JSON description of an image tree.
//!
//! ```json
//! {
//!   "scatter": true,
//!   "entries": [
//!     { "type": "dir", "path": "/docs" },
//!     { "type": "file", "path": "/docs/a.txt", "text": "hello\n" },
//!     { "type": "file", "path": "/zeros", "fill": { "byte": 0, "len": 4096 } }
//!   ]
//! }
//! ```
//!
//! Entries are applied in order, so parents must come before children.

use crate::ImageBuilder;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    #[serde(default)]
    pub scatter: bool,
    pub entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ManifestEntry {
    Dir {
        path: String,
    },
    File {
        path: String,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        fill: Option<Fill>,
    },
}

/// `len` copies of `byte`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub byte: u8,
    pub len: usize,
}

impl ImageManifest {
    pub fn build(&self) -> Result<ImageBuilder> {
        let mut builder = if self.scatter {
            ImageBuilder::new().scattered()
        } else {
            ImageBuilder::new()
        };
        for entry in &self.entries {
            match entry {
                ManifestEntry::Dir { path } => {
                    builder.add_dir(path)?;
                }
                ManifestEntry::File { path, text, fill } => {
                    let content = match (text, fill) {
                        (Some(_), Some(_)) => bail!("{path}: give either text or fill, not both"),
                        (Some(text), None) => text.as_bytes().to_vec(),
                        (None, Some(fill)) => vec![fill.byte; fill.len],
                        (None, None) => Vec::new(),
                    };
                    builder.add_file(path, &content)?;
                }
            }
        }
        Ok(builder)
    }
}

pub fn load_manifest(path: &Path) -> Result<ImageManifest> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid manifest json {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "scatter": true,
        "entries": [
            { "type": "dir", "path": "/docs" },
            { "type": "file", "path": "/docs/a.txt", "text": "hello\n" },
            { "type": "file", "path": "/zeros", "fill": { "byte": 0, "len": 4096 } },
            { "type": "file", "path": "/empty" }
        ]
    }"#;

    #[test]
    fn parses_and_builds() {
        let manifest: ImageManifest = serde_json::from_str(SAMPLE).unwrap();
        assert!(manifest.scatter);
        assert_eq!(manifest.entries.len(), 4);
        assert_eq!(
            manifest.entries[0],
            ManifestEntry::Dir {
                path: "/docs".into()
            }
        );
        manifest.build().unwrap();
    }

    #[test]
    fn rejects_text_and_fill_together() {
        let manifest = ImageManifest {
            scatter: false,
            entries: vec![ManifestEntry::File {
                path: "/x".into(),
                text: Some("a".into()),
                fill: Some(Fill { byte: 1, len: 2 }),
            }],
        };
        assert!(manifest.build().is_err());
    }

    #[test]
    fn children_need_parents_first() {
        let manifest: ImageManifest = serde_json::from_str(
            r#"{ "entries": [ { "type": "file", "path": "/d/x", "text": "x" } ] }"#,
        )
        .unwrap();
        assert!(manifest.build().is_err());
    }

    #[test]
    fn loads_from_disk() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), SAMPLE).unwrap();
        let manifest = load_manifest(file.path()).unwrap();
        assert_eq!(manifest.entries.len(), 4);
        assert!(load_manifest(Path::new("/nonexistent/manifest.json")).is_err());
    }
}
