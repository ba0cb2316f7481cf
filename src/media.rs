//! Media item model shared by the sources, the pool and the presenters.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "nef", "cr2", "dng",
];

pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "m4v", "avi", "mts", "m2ts", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Where the bytes of an item live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    File(PathBuf),
    Remote(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Human readable place, resolved lazily by whoever has a geocoder.
    pub placename: Option<String>,
}

/// One playable item.
///
/// Items are created by a content source during enumeration and never
/// mutated afterwards; the pool and the histories share them through `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    /// Content signature for files, server identifier for remote matches.
    pub id: String,
    pub locator: Locator,
    pub kind: MediaKind,
    pub captured_at: Option<NaiveDateTime>,
    pub location: Option<GeoLocation>,
    /// Clip length, known for remote videos.
    pub duration: Option<Duration>,
    /// Folder name (or remote grouping) used when there is no placename.
    pub parent_label: String,
}

impl MediaItem {
    /// Build an item for a file on disk with no capture metadata yet.
    pub fn from_file(id: String, path: PathBuf, kind: MediaKind) -> Self {
        let parent_label = parent_label(&path);
        Self {
            id,
            locator: Locator::File(path),
            kind,
            captured_at: None,
            location: None,
            duration: None,
            parent_label,
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.locator {
            Locator::File(path) => Some(path),
            Locator::Remote(_) => None,
        }
    }

    /// Whether the backing media can still be shown.
    ///
    /// Files may disappear between enumeration and display; remote items are
    /// assumed reachable and fail later in the presenter if they are not.
    pub fn is_available(&self) -> bool {
        match &self.locator {
            Locator::File(path) => path.exists(),
            Locator::Remote(_) => true,
        }
    }

    /// Single line of text describing when and where the item was captured.
    ///
    /// Falls back to the parent label when no placename is known.
    pub fn caption(&self) -> String {
        let date = self
            .captured_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string());
        let place = self
            .location
            .as_ref()
            .and_then(|loc| loc.placename.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(self.parent_label.as_str());

        match (date, place.is_empty()) {
            (Some(date), false) => format!("{date}   {place}"),
            (Some(date), true) => date,
            (None, _) => place.to_string(),
        }
    }
}

fn parent_label(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extension lists used to classify files during a folder walk.
#[derive(Debug, Clone)]
pub struct MediaExtensions {
    image: Vec<String>,
    video: Vec<String>,
}

impl Default for MediaExtensions {
    fn default() -> Self {
        Self::new(
            DEFAULT_IMAGE_EXTENSIONS.iter().copied(),
            DEFAULT_VIDEO_EXTENSIONS.iter().copied(),
        )
    }
}

impl MediaExtensions {
    pub fn new<I, V>(image: I, video: V) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        let normalize = |ext: &str| ext.trim_start_matches('.').to_ascii_lowercase();
        Self {
            image: image.into_iter().map(|e| normalize(e.as_ref())).collect(),
            video: video.into_iter().map(|e| normalize(e.as_ref())).collect(),
        }
    }

    /// Classify `path` by extension; `None` for unsupported files.
    pub fn classify(&self, path: &Path) -> Option<MediaKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if self.image.iter().any(|e| *e == ext) {
            Some(MediaKind::Image)
        } else if self.video.iter().any(|e| *e == ext) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }
}
