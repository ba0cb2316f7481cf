//! Directory walking and content signatures for folder enumeration.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::SignatureMode;

/// Options controlling directory walking and signatures.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub signature_mode: SignatureMode,
    /// Bytes read from each end of the file in sampled mode.
    pub window_bytes: usize,
    /// Skip dot-files and dot-directories below the root.
    pub skip_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            signature_mode: SignatureMode::Sampled,
            window_bytes: 2 * 1024,
            skip_hidden: true,
        }
    }
}

/// Regular files below `root`.
///
/// Within each directory, files come before subdirectories, so a folder's
/// own files are all yielded before anything nested inside it. Unreadable
/// entries are dropped.
pub fn walk_files(root: &Path, skip_hidden: bool) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by(files_first)
        .into_iter()
        .filter_entry(move |e| !(skip_hidden && is_hidden(e)))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn is_hidden(entry: &DirEntry) -> bool {
    // Never skip the root; tempfile roots can be dot-dirs.
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|n| n.starts_with('.'))
}

/// Content signature identifying a file regardless of its name.
///
/// Sampled signatures are `LLLLLLLL-<md5>` where `L` is the hex file length
/// and the digest covers the first and last `window_bytes` of the file.
pub fn signature(path: &Path, opts: &ScanOptions) -> io::Result<String> {
    match opts.signature_mode {
        SignatureMode::Sampled => sampled_signature(path, opts.window_bytes),
        SignatureMode::Full => {
            let bytes = std::fs::read(path)?;
            Ok(format!("{:08X}-{:x}", bytes.len(), md5::compute(&bytes)))
        }
    }
}

fn sampled_signature(path: &Path, window: usize) -> io::Result<String> {
    let mut file = File::open(path)?;
    let length = file.metadata()?.len();
    let window_len = u64::try_from(window).unwrap_or(u64::MAX);

    let mut sample = Vec::with_capacity(window.saturating_mul(2));
    (&mut file).take(window_len).read_to_end(&mut sample)?;
    file.seek(SeekFrom::Start(length.saturating_sub(window_len)))?;
    file.take(window_len).read_to_end(&mut sample)?;

    Ok(format!("{length:08X}-{:x}", md5::compute(&sample)))
}
