use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, instrument, warn};

use crate::media::{MediaExtensions, MediaItem, MediaKind};
use crate::meta::read_capture_meta;
use crate::scan::{ScanOptions, signature, walk_files};
use crate::source::PoolSink;

/// Counters from one folder enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FolderStats {
    pub added: usize,
    pub duplicates: usize,
    pub unreadable: usize,
}

/// Local folders walked recursively; identical files are shown once.
#[derive(Debug, Clone)]
pub struct FolderTree {
    roots: Vec<PathBuf>,
    scan: ScanOptions,
    extensions: MediaExtensions,
    capture_metadata: bool,
}

impl FolderTree {
    pub fn new(roots: Vec<PathBuf>, scan: ScanOptions, extensions: MediaExtensions) -> Self {
        Self {
            roots,
            scan,
            extensions,
            capture_metadata: true,
        }
    }

    pub fn with_capture_metadata(mut self, enabled: bool) -> Self {
        self.capture_metadata = enabled;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Walk every root in order, pushing each new media file into `sink`.
    ///
    /// Missing roots are skipped. Files are keyed by content signature; a
    /// later file with an already seen signature is ignored.
    #[instrument(skip_all, fields(cycle = sink.cycle(), roots = self.roots.len()))]
    pub fn enumerate(&self, sink: &mut PoolSink) -> FolderStats {
        let mut stats = FolderStats::default();
        let mut visited: HashMap<String, PathBuf> = HashMap::new();

        for root in &self.roots {
            if !root.is_dir() {
                debug!(root = %root.display(), "folder not found; skipping");
                continue;
            }
            for path in walk_files(root, self.scan.skip_hidden) {
                if !sink.is_current() {
                    info!("enumeration superseded; stopping walk");
                    return stats;
                }
                let Some(kind) = self.extensions.classify(&path) else {
                    continue;
                };
                let sig = match signature(&path, &self.scan) {
                    Ok(sig) => sig,
                    Err(err) => {
                        warn!(path = %path.display(), "unable to sign file: {err}");
                        stats.unreadable += 1;
                        continue;
                    }
                };
                if let Some(original) = visited.get(&sig) {
                    info!(
                        path = %path.display(),
                        original = %original.display(),
                        "ignoring duplicate"
                    );
                    stats.duplicates += 1;
                    continue;
                }
                visited.insert(sig.clone(), path.clone());

                let item = self.describe(sig, path, kind);
                if sink.push(item) {
                    stats.added += 1;
                }
            }
        }
        info!(
            added = stats.added,
            duplicates = stats.duplicates,
            unreadable = stats.unreadable,
            "folder walk complete"
        );
        stats
    }

    fn describe(&self, id: String, path: PathBuf, kind: MediaKind) -> MediaItem {
        let meta = (self.capture_metadata && kind == MediaKind::Image)
            .then(|| read_capture_meta(&path));
        let mut item = MediaItem::from_file(id, path, kind);
        if let Some(meta) = meta {
            item.captured_at = meta.captured_at;
            item.location = meta.location;
        }
        item
    }
}
