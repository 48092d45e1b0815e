//! Screenshots and report attachments

use std::path::{Path, PathBuf};

use image::GenericImageView;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// A screenshot that was written and decoded successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    pub path: PathBuf,
    pub sha256: String,
    pub width: u32,
    pub height: u32,
}

/// Something attached to a scenario report, either a file or inline text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl Attachment {
    pub fn png(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            content_type: "image/png".to_string(),
            path: Some(path.into()),
            body: None,
        }
    }

    pub fn text(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: "text/plain".to_string(),
            path: None,
            body: Some(body.into()),
        }
    }
}

/// `<root>/<category>/<id>.png`
///
/// Path separators and characters Windows rejects are replaced so a label
/// always maps to exactly one path segment.
pub fn screenshot_path(root: &Path, category: &str, id: &str) -> PathBuf {
    root.join(path_segment(category))
        .join(format!("{}.png", path_segment(id)))
}

fn path_segment(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Resolve `path` against the current directory
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Create the parent directories of `path`. Safe to race with other scenarios.
pub fn ensure_parent(path: &Path) -> E2eResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Check the file decodes as an image and record its digest and size.
pub fn inspect_screenshot(path: &Path) -> E2eResult<ScreenshotArtifact> {
    if !path.is_file() {
        return Err(E2eError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("screenshot not written: {}", path.display()),
        )));
    }

    let data = std::fs::read(path)?;
    let img = image::load_from_memory(&data)?;
    let (width, height) = img.dimensions();

    let mut hasher = Sha256::new();
    hasher.update(&data);
    let sha256 = hex::encode(hasher.finalize());

    debug!("Screenshot {} ({}x{}, sha256 {})", path.display(), width, height, &sha256[..12]);

    Ok(ScreenshotArtifact {
        path: path.to_path_buf(),
        sha256,
        width,
        height,
    })
}
