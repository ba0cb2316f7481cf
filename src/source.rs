//! Content sources feeding the item pool from a background worker.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Configuration;
use crate::error::Error;
use crate::events::SourceEvent;
use crate::media::MediaItem;
use crate::pool::ItemPool;
use crate::scan::ScanOptions;
use crate::search::HttpSearchClient;
use crate::session::SessionDescriptor;
use crate::tasks::files::FolderTree;
use crate::tasks::remote::RemoteSearch;

/// Write end of one enumeration cycle.
///
/// Pushes land in the pool tagged with the cycle; progress goes to the
/// engine as [`SourceEvent`]s. Must be used from a blocking context.
#[derive(Debug)]
pub struct PoolSink {
    pool: Arc<ItemPool>,
    cycle: u64,
    events: Sender<SourceEvent>,
    announced: bool,
    failed: bool,
}

impl PoolSink {
    pub fn new(pool: Arc<ItemPool>, cycle: u64, events: Sender<SourceEvent>) -> Self {
        Self {
            pool,
            cycle,
            events,
            announced: false,
            failed: false,
        }
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// False once the engine started another cycle or stopped.
    pub fn is_current(&self) -> bool {
        self.pool.cycle() == self.cycle
    }

    /// Add an item; the first accepted item announces availability.
    pub fn push(&mut self, item: MediaItem) -> bool {
        if !self.pool.push(self.cycle, item) {
            return false;
        }
        if !self.announced {
            self.announced = true;
            debug!(cycle = self.cycle, "first item available");
            self.send(SourceEvent::FirstAvailable { cycle: self.cycle });
        }
        true
    }

    /// Report a failure. Only the first failure of a cycle is forwarded.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.failed {
            return;
        }
        self.failed = true;
        self.send(SourceEvent::Failed {
            cycle: self.cycle,
            message: message.into(),
        });
    }

    /// Close the cycle and report how many items it produced.
    pub fn finish(self) -> usize {
        let total = if self.is_current() {
            self.pool.total()
        } else {
            0
        };
        self.send(SourceEvent::Complete {
            cycle: self.cycle,
            total,
        });
        total
    }

    fn send(&self, event: SourceEvent) {
        if self.events.blocking_send(event).is_err() {
            debug!(cycle = self.cycle, "engine gone; dropping source event");
        }
    }
}

/// Where a session's items come from.
pub enum ContentSource {
    FolderTree(FolderTree),
    RemoteSearch(RemoteSearch),
}

impl ContentSource {
    /// Build the source a session asks for.
    pub fn from_session(session: &SessionDescriptor, cfg: &Configuration) -> Result<Self, Error> {
        if !session.folders.is_empty() {
            let scan = ScanOptions {
                signature_mode: cfg.signature_mode,
                window_bytes: cfg.signature_window_bytes,
                skip_hidden: cfg.skip_hidden,
            };
            let roots: Vec<PathBuf> = session.folder_paths().map(Path::to_path_buf).collect();
            let tree = FolderTree::new(roots, scan, cfg.extensions())
                .with_capture_metadata(cfg.read_capture_metadata);
            return Ok(Self::FolderTree(tree));
        }
        if let Some(query) = session.search_query.as_deref() {
            let host = session
                .search_host
                .clone()
                .unwrap_or_else(|| cfg.search.host.clone());
            let client = Arc::new(HttpSearchClient::new(&cfg.search));
            return Ok(Self::RemoteSearch(RemoteSearch::new(
                host,
                query,
                cfg.search.page_size,
                client,
            )));
        }
        Err(Error::NoSource)
    }

    /// Enumerate everything into `sink`. Blocks until done, failed or
    /// superseded.
    pub fn enumerate(&self, sink: &mut PoolSink) {
        match self {
            Self::FolderTree(tree) => {
                tree.enumerate(sink);
            }
            Self::RemoteSearch(search) => {
                search.enumerate(sink);
            }
        }
    }
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FolderTree(tree) => write!(f, "{} folder(s)", tree.roots().len()),
            Self::RemoteSearch(search) => write!(f, "search '{}'", search.query()),
        }
    }
}

/// Run one enumeration cycle on the blocking pool.
pub fn spawn_enumeration(source: Arc<ContentSource>, sink: PoolSink) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut sink = sink;
        let cycle = sink.cycle();
        debug!(cycle, source = %source, "enumeration started");
        source.enumerate(&mut sink);
        let total = sink.finish();
        debug!(cycle, total, "enumeration finished");
    })
}
