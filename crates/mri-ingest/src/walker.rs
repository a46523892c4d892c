//! Depth-first discovery of candidate raw files under a visit directory.
//!
//! Directories are visited post-order (children before their parent).
//! Dot-directories and symlinked directories are skipped entirely; entries
//! are taken in sorted name order so a walk is reproducible across
//! filesystems. Within one directory, every qualifying P-file is yielded
//! but only the first DICOM/I-file candidate is — one slice's header
//! stands in for the whole series, and the rest of the series is counted,
//! not read.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, warn};

use mri_model::error::{MriError, Result};

use crate::local_copy::{local_basename, with_local_copy};
use crate::patterns::{DICOM_CANDIDATE, PFILE_NAME};

/// P-files smaller than this hold service data rather than image data
/// and are not candidates.
pub const MIN_PFILE_SIZE: u64 = 10_000_000;

/// How a candidate qualified, which decides how its siblings are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateClass {
    /// Qualifying P-file; every one in a directory is yielded.
    Pfile,
    /// Representative DICOM/I-file; at most one per directory.
    Dicom,
}

/// One discovered candidate, already materialized to a local readable
/// path for the duration of the consumer callback.
#[derive(Debug)]
pub struct Candidate<'a> {
    /// Directory the candidate was found in.
    pub directory: &'a Path,
    /// Original (possibly compressed) path in the archive.
    pub source: &'a Path,
    /// Local uncompressed path, valid only inside the callback.
    pub local_path: &'a Path,
    pub class: CandidateClass,
}

/// Walk configuration.
#[derive(Debug, Default)]
pub struct WalkOptions {
    /// Subdirectories whose full path matches any of these are skipped
    /// with their whole subtree.
    pub ignore_patterns: Vec<Regex>,
}

impl WalkOptions {
    fn ignored(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.ignore_patterns.iter().any(|p| p.is_match(&path))
    }
}

/// Walks `root` and feeds each candidate to `consumer` inside a scoped
/// local copy.
///
/// A candidate that fails to materialize (corrupt archive member,
/// missing decompressor) is logged and skipped; the walk continues. The
/// consumer's own error for one candidate is likewise contained: a file
/// whose header turns out unreadable must not abort the visit.
pub fn walk<F>(root: &Path, options: &WalkOptions, mut consumer: F) -> Result<()>
where
    F: FnMut(&Candidate<'_>) -> Result<()>,
{
    if !root.is_dir() {
        return Err(MriError::NotFound {
            path: root.to_path_buf(),
        });
    }
    walk_dir(root, options, &mut consumer)
}

fn walk_dir<F>(dir: &Path, options: &WalkOptions, consumer: &mut F) -> Result<()>
where
    F: FnMut(&Candidate<'_>) -> Result<()>,
{
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| MriError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    let mut subdirs = Vec::new();
    let mut files = Vec::new();
    for path in entries {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        if path.is_dir() {
            if name.starts_with('.') {
                continue;
            }
            if path.is_symlink() {
                debug!(path = %path.display(), "skipping symlinked directory");
                continue;
            }
            if options.ignored(&path) {
                debug!(path = %path.display(), "skipping ignored directory");
                continue;
            }
            subdirs.push(path);
        } else if path.is_file() {
            files.push((name, path));
        }
    }

    // Children first.
    for subdir in &subdirs {
        walk_dir(subdir, options, consumer)?;
    }

    let mut dicom_done = false;
    for (name, path) in &files {
        let class = if PFILE_NAME.is_match(name) {
            if path.is_symlink() {
                debug!(path = %path.display(), "skipping symlinked pfile");
                continue;
            }
            if pfile_too_small(path) {
                debug!(path = %path.display(), "skipping undersized pfile");
                continue;
            }
            CandidateClass::Pfile
        } else if !dicom_done && DICOM_CANDIDATE.is_match(name) {
            // One representative per directory, whether or not it turns
            // out readable; a second slice would only repeat the series.
            dicom_done = true;
            CandidateClass::Dicom
        } else {
            continue;
        };

        let outcome = with_local_copy(path, |local_path| {
            let candidate = Candidate {
                directory: dir,
                source: path,
                local_path,
                class,
            };
            consumer(&candidate)
        });
        if let Err(error) = outcome {
            warn!(path = %path.display(), %error, "skipping unreadable candidate");
        }
    }
    Ok(())
}

/// Size gate for P-files, applied to the on-disk size. Service P-files
/// are kilobytes, image P-files tens of megabytes.
fn pfile_too_small(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.len() < MIN_PFILE_SIZE)
        .unwrap_or(true)
}

/// Basenames, uncompressed, of every candidate a directory holds; used
/// for dataset file accounting without re-walking.
pub fn candidate_names(dir: &Path) -> Result<Vec<String>> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(|e| MriError::io(dir, e))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| local_basename(&entry.path()))
        .collect();
    names.sort();
    Ok(names)
}
