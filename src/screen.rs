//! Screen snapshots for order history extraction
//!
//! Snapshots come from an external screenshot tool or an existing image file,
//! and are normalized to a portrait phone-sized JPEG before upload.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::config::ScreenConfig;
use crate::{Error, Result};

/// Width of a normalized snapshot
pub const SNAPSHOT_WIDTH: u32 = 720;

/// Height of a normalized snapshot
pub const SNAPSHOT_HEIGHT: u32 = 1280;

/// JPEG quality of a normalized snapshot
pub const SNAPSHOT_QUALITY: u8 = 70;

const PATH_PLACEHOLDER: &str = "{path}";

/// An encoded image ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ScreenImage {
    #[must_use]
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        }
    }
}

/// Produces one image of the user's screen
#[async_trait]
pub trait ScreenSnapshotProvider: Send + Sync {
    /// Take a snapshot
    ///
    /// # Errors
    ///
    /// Returns error if the screen cannot be captured or decoded
    async fn snapshot(&self) -> Result<ScreenImage>;
}

/// Runs a screenshot tool that writes to a file
#[derive(Debug, Clone)]
pub struct CommandSnapshot {
    program: String,
    args: Vec<String>,
}

impl CommandSnapshot {
    /// Parse a command template such as `grim {path}`
    ///
    /// Without a `{path}` placeholder the output path is appended.
    ///
    /// # Errors
    ///
    /// Returns error if the template is empty
    pub fn from_template(template: &str) -> Result<Self> {
        let mut words = template.split_whitespace().map(ToString::to_string);
        let program = words
            .next()
            .ok_or_else(|| Error::Config("screen capture command is empty".to_string()))?;
        let mut args: Vec<String> = words.collect();

        if !args.iter().any(|a| a.contains(PATH_PLACEHOLDER)) {
            args.push(PATH_PLACEHOLDER.to_string());
        }

        Ok(Self { program, args })
    }

    /// Find a screenshot tool on this machine
    #[must_use]
    pub fn detect() -> Option<Self> {
        let candidates: &[&str] = if cfg!(target_os = "macos") {
            &["screencapture -x {path}"]
        } else {
            &[
                "grim {path}",
                "gnome-screenshot -f {path}",
                "import -window root {path}",
            ]
        };

        candidates
            .iter()
            .filter_map(|t| Self::from_template(t).ok())
            .find(|c| which::which(&c.program).is_ok())
    }

    /// Configured command, or an auto-detected one
    ///
    /// `None` when the scan is disabled or no tool is available.
    #[must_use]
    pub fn from_config(config: &ScreenConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        match config.command.as_deref() {
            Some(template) => match Self::from_template(template) {
                Ok(command) => Some(command),
                Err(e) => {
                    tracing::warn!(error = %e, "invalid screen capture command");
                    None
                }
            },
            None => Self::detect(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn args_for(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace(PATH_PLACEHOLDER, &path))
            .collect()
    }
}

#[async_trait]
impl ScreenSnapshotProvider for CommandSnapshot {
    async fn snapshot(&self) -> Result<ScreenImage> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("screen.png");

        tracing::debug!(program = %self.program, "capturing screen");

        let output = tokio::process::Command::new(&self.program)
            .args(self.args_for(&path))
            .output()
            .await
            .map_err(|e| Error::Screen(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Screen(format!(
                "{} exited with code {}: {}",
                self.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        normalize_async(bytes).await
    }
}

/// Reads an existing screenshot from disk
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ScreenSnapshotProvider for FileSnapshot {
    async fn snapshot(&self) -> Result<ScreenImage> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| Error::Screen(format!("cannot read {}: {e}", self.path.display())))?;
        normalize_async(bytes).await
    }
}

async fn normalize_async(bytes: Vec<u8>) -> Result<ScreenImage> {
    tokio::task::spawn_blocking(move || normalize_snapshot(&bytes))
        .await
        .map_err(|e| Error::Screen(e.to_string()))?
}

/// Decode any supported image and re-encode it as a 720x1280 JPEG
///
/// # Errors
///
/// Returns error if the bytes are not a readable image
pub fn normalize_snapshot(bytes: &[u8]) -> Result<ScreenImage> {
    let resized = image::load_from_memory(bytes)?
        .resize_exact(SNAPSHOT_WIDTH, SNAPSHOT_HEIGHT, FilterType::Triangle)
        .to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, SNAPSHOT_QUALITY)
        .encode_image(&resized)?;

    tracing::debug!(bytes = jpeg.len(), "snapshot normalized");
    Ok(ScreenImage::jpeg(jpeg))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbImage};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_normalize_resizes_to_portrait_jpeg() {
        let image = normalize_snapshot(&png(64, 32)).unwrap();

        assert_eq!(image.mime_type, "image/jpeg");
        let decoded = image::load_from_memory(&image.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (SNAPSHOT_WIDTH, SNAPSHOT_HEIGHT));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(normalize_snapshot(b"not an image"), Err(Error::Image(_))));
    }

    #[test]
    fn test_template_placeholder() {
        let command = CommandSnapshot::from_template("grim -t png {path}").unwrap();
        assert_eq!(command.program(), "grim");
        assert_eq!(
            command.args_for(Path::new("/tmp/s.png")),
            vec!["-t", "png", "/tmp/s.png"]
        );

        let appended = CommandSnapshot::from_template("scrot").unwrap();
        assert_eq!(appended.args_for(Path::new("/tmp/s.png")), vec!["/tmp/s.png"]);

        assert!(CommandSnapshot::from_template("   ").is_err());
    }

    #[test]
    fn test_disabled_scan_has_no_command() {
        let config = ScreenConfig {
            enabled: false,
            command: Some("grim {path}".to_string()),
        };
        assert!(CommandSnapshot::from_config(&config).is_none());
    }

    #[tokio::test]
    async fn test_file_snapshot_missing_file() {
        let result = FileSnapshot::new("/nonexistent/screen.png").snapshot().await;
        assert!(matches!(result, Err(Error::Screen(_))));
    }
}
