//! Session descriptors: what to show and how long each slide stays up.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::Error;
use crate::timer::SlideDurations;

/// File extension of saved session descriptors.
pub const SESSION_EXTENSION: &str = "slideshow";

const DEFAULT_SLIDE_SECONDS: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub path: PathBuf,
}

/// A saved slideshow, stored as JSON.
///
/// A session is either folder based or search based, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    /// Must be present in a stored file; may be empty for scratch sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_slide_seconds")]
    pub slide_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_seconds_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    /// Overrides the configured search host for this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_host: Option<String>,
    /// Where the descriptor was loaded from or will be saved to.
    #[serde(skip)]
    pub filename: Option<PathBuf>,
}

fn default_slide_seconds() -> f64 {
    DEFAULT_SLIDE_SECONDS
}

impl Default for SessionDescriptor {
    fn default() -> Self {
        Self {
            name: None,
            slide_seconds: DEFAULT_SLIDE_SECONDS,
            slide_seconds_max: None,
            folders: Vec::new(),
            search_query: None,
            search_host: None,
            filename: None,
        }
    }
}

impl SessionDescriptor {
    pub fn for_folders<I, P>(name: &str, folders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            name: Some(name.to_string()),
            folders: folders
                .into_iter()
                .map(|p| FolderEntry { path: p.into() })
                .collect(),
            ..Self::default()
        }
    }

    pub fn for_search(name: &str, query: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            search_query: Some(query.to_string()),
            ..Self::default()
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        let descriptor: Self = serde_json::from_str(s)?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut descriptor = Self::from_json_str(&text)?;
        descriptor.filename = Some(path.to_path_buf());
        debug!(path = %path.display(), name = ?descriptor.name, "session loaded");
        Ok(descriptor)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.is_none() {
            return Err(Error::BadDescriptor("missing name".into()));
        }
        if !self.slide_seconds.is_finite() || self.slide_seconds <= 0.0 {
            return Err(Error::BadDescriptor(format!(
                "slideSeconds must be positive, got {}",
                self.slide_seconds
            )));
        }
        if let Some(max) = self.slide_seconds_max {
            if !max.is_finite() || max < self.slide_seconds {
                return Err(Error::BadDescriptor(format!(
                    "slideSecondsMax ({max}) must not be below slideSeconds ({})",
                    self.slide_seconds
                )));
            }
        }
        if !self.folders.is_empty() && self.search_query.is_some() {
            return Err(Error::BadDescriptor(
                "a session uses either folders or a search query, not both".into(),
            ));
        }
        Ok(())
    }

    /// Write the descriptor to its `filename`, creating the parent folder
    /// when needed.
    pub fn save(&self) -> Result<(), Error> {
        let filename = self
            .filename
            .as_ref()
            .ok_or_else(|| Error::BadDescriptor("filename not set".into()))?;
        if self.name.is_none() {
            return Err(Error::BadDescriptor("name not set".into()));
        }
        if self.folders.is_empty() && self.search_query.is_none() {
            return Err(Error::NoSource);
        }
        self.validate()?;

        if let Some(parent) = filename.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!(folder = %parent.display(), "creating session folder");
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(filename, json)?;
        debug!(path = %filename.display(), "session saved");
        Ok(())
    }

    /// Path a session called `name` is saved under inside `folder`.
    pub fn filename_for(folder: &Path, name: &str) -> PathBuf {
        folder.join(name).with_extension(SESSION_EXTENSION)
    }

    pub fn folder_paths(&self) -> impl Iterator<Item = &Path> {
        self.folders.iter().map(|f| f.path.as_path())
    }

    pub fn durations(&self) -> SlideDurations {
        SlideDurations::new(self.slide_seconds, self.slide_seconds_max)
    }
}

/// Load every saved session in `folder`, skipping files that fail to parse.
///
/// A missing folder yields an empty list.
pub fn list_saved(folder: &Path) -> Vec<SessionDescriptor> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(folder = %folder.display(), "no saved sessions: {err}");
            return Vec::new();
        }
    };

    let mut found: Vec<SessionDescriptor> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == SESSION_EXTENSION)
        })
        .filter_map(|path| match SessionDescriptor::load(&path) {
            Ok(descriptor) => Some(descriptor),
            Err(err) => {
                error!(path = %path.display(), "failed loading session: {err}");
                None
            }
        })
        .collect();
    found.sort_by(|a, b| a.name.cmp(&b.name));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_folder_session() {
        let descriptor = SessionDescriptor::from_json_str(
            r#"{"name":"Trips","slideSeconds":6.5,"folders":[{"path":"/a"},{"path":"/b"}]}"#,
        )
        .expect("valid descriptor");
        assert_eq!(descriptor.name.as_deref(), Some("Trips"));
        assert_eq!(descriptor.slide_seconds, 6.5);
        let folders: Vec<_> = descriptor.folder_paths().collect();
        assert_eq!(folders, vec![Path::new("/a"), Path::new("/b")]);
        assert_eq!(descriptor.search_query, None);
    }

    #[test]
    fn slide_seconds_defaults_to_ten() {
        let descriptor =
            SessionDescriptor::from_json_str(r#"{"name":"x","searchQuery":"beach"}"#)
                .expect("valid descriptor");
        assert_eq!(descriptor.slide_seconds, 10.0);
        assert_eq!(descriptor.search_query.as_deref(), Some("beach"));
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = SessionDescriptor::from_json_str(r#"{"folders":[{"path":"/a"}]}"#)
            .expect_err("name is required");
        assert!(matches!(err, Error::BadDescriptor(_)), "{err}");
    }

    #[test]
    fn folders_and_query_are_exclusive() {
        let err = SessionDescriptor::from_json_str(
            r#"{"name":"x","folders":[{"path":"/a"}],"searchQuery":"cats"}"#,
        )
        .expect_err("both sources is invalid");
        assert!(matches!(err, Error::BadDescriptor(_)), "{err}");
    }

    #[test]
    fn max_below_base_is_rejected() {
        let err = SessionDescriptor::from_json_str(
            r#"{"name":"x","slideSeconds":10,"slideSecondsMax":5,"searchQuery":"q"}"#,
        )
        .expect_err("max below base");
        assert!(err.to_string().contains("slideSecondsMax"), "{err}");
    }

    #[test]
    fn save_requires_filename_and_source() {
        let mut descriptor = SessionDescriptor::for_folders("x", ["/a"]);
        assert!(matches!(descriptor.save(), Err(Error::BadDescriptor(_))));

        let tmp = tempdir().expect("tempdir");
        descriptor.folders.clear();
        descriptor.filename = Some(tmp.path().join("x.slideshow"));
        assert!(matches!(descriptor.save(), Err(Error::NoSource)));
    }

    #[test]
    fn save_then_list_round_trips() {
        let tmp = tempdir().expect("tempdir");
        let store = tmp.path().join("sessions");

        let mut a = SessionDescriptor::for_folders("Alpha", ["/photos/a"]);
        a.slide_seconds_max = Some(15.0);
        a.filename = Some(SessionDescriptor::filename_for(&store, "Alpha"));
        a.save().expect("save alpha");

        let mut b = SessionDescriptor::for_search("Beta", "dogs");
        b.filename = Some(SessionDescriptor::filename_for(&store, "Beta"));
        b.save().expect("save beta");

        fs::write(store.join("broken.slideshow"), "{not json").expect("write broken");
        fs::write(store.join("notes.txt"), "ignored").expect("write txt");

        let saved = list_saved(&store);
        let names: Vec<_> = saved.iter().filter_map(|s| s.name.as_deref()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);
        assert_eq!(saved[0].slide_seconds_max, Some(15.0));
        assert_eq!(saved[0].filename, a.filename);
        assert_eq!(saved[1].search_query.as_deref(), Some("dogs"));
    }

    #[test]
    fn missing_store_lists_nothing() {
        let tmp = tempdir().expect("tempdir");
        assert!(list_saved(&tmp.path().join("nope")).is_empty());
    }
}
