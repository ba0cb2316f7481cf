use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::media::{DEFAULT_IMAGE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS, MediaExtensions};
use crate::timer::DEFAULT_VIDEO_BUFFER;

/// How much of a file feeds its content signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureMode {
    /// File length plus the leading and trailing windows.
    Sampled,
    /// Hash of the whole file.
    Full,
}

impl Default for SignatureMode {
    fn default() -> Self {
        Self::Sampled
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SearchOptions {
    /// Base URL of the search service; a session's `searchHost` wins.
    pub host: String,
    /// Results requested per page.
    pub page_size: usize,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Bounds the wait for each page; expiry is reported as a search error.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            host: "http://localhost:5000".to_string(),
            page_size: 100,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(15),
        }
    }
}

/// Engine tuning loaded from YAML. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    pub signature_mode: SignatureMode,
    /// Bytes read from each end of a file in `sampled` mode.
    pub signature_window_bytes: usize,
    /// Entries each consumer keeps for stepping backwards.
    pub history_capacity: usize,
    /// Time added to a clip's length before the fallback timer skips it.
    #[serde(with = "humantime_serde")]
    pub video_buffer: Duration,
    /// Skip dot-files and dot-directories while walking folders.
    pub skip_hidden: bool,
    /// Read EXIF capture date and GPS position from images.
    pub read_capture_metadata: bool,
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
    pub search: SearchOptions,
    /// Optional deterministic seed for draws and duration jitter.
    pub seed: Option<u64>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            signature_mode: SignatureMode::default(),
            signature_window_bytes: 2 * 1024,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            video_buffer: DEFAULT_VIDEO_BUFFER,
            skip_hidden: true,
            read_capture_metadata: true,
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            search: SearchOptions::default(),
            seed: None,
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&s)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        // An empty document means "all defaults".
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.signature_window_bytes > 0,
            "signature-window-bytes must be greater than zero"
        );
        ensure!(
            self.history_capacity > 0,
            "history-capacity must be greater than zero"
        );
        ensure!(
            !self.search.host.trim().is_empty(),
            "search.host must not be empty"
        );
        ensure!(
            self.search.page_size > 0,
            "search.page-size must be greater than zero"
        );
        ensure!(
            !self.search.read_timeout.is_zero(),
            "search.read-timeout must be greater than zero"
        );
        ensure!(
            !self.image_extensions.is_empty() || !self.video_extensions.is_empty(),
            "at least one image or video extension is required"
        );
        Ok(self)
    }

    pub fn extensions(&self) -> MediaExtensions {
        MediaExtensions::new(&self.image_extensions, &self.video_extensions)
    }
}
