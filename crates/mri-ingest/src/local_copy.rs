//! Scoped materialization of candidate raw files.
//!
//! Raw archives keep many files bzip2-compressed in place; header readers
//! need a local, uncompressed copy. Two call shapes are offered:
//!
//! - [`materialize_into`] writes into a caller-owned directory and the
//!   caller is responsible for deletion;
//! - [`LocalCopy`] / [`with_local_copy`] use a fresh temporary directory
//!   per materialization, removed when the value drops — on success,
//!   error, and panic paths alike, without ever masking the caller's
//!   original error.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing::debug;

use mri_model::error::{MriError, Result};
use mri_model::escape_filename;

/// Suffix marking a compressed candidate file.
pub const COMPRESSED_SUFFIX: &str = ".bz2";
/// External decompressor, invoked as `bunzip2 -k -c <path>`.
const DECOMPRESSOR: &str = "bunzip2";

/// Logical local basename of a source file: compression suffix stripped
/// and filesystem-unsafe characters escaped.
pub fn local_basename(source: &Path) -> String {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(COMPRESSED_SUFFIX).unwrap_or(&name);
    escape_filename(name)
}

/// Materializes `source` into `dest_dir`, decompressing when needed.
///
/// A stale file already occupying the destination path is removed first,
/// so repeated materializations of the same source are idempotent. The
/// caller owns the returned path and its deletion.
pub fn materialize_into(source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let dest = dest_dir.join(local_basename(source));
    if dest.exists() {
        fs::remove_file(&dest).map_err(|e| MriError::io(&dest, e))?;
    }

    let compressed = source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bz2"));
    let outcome = if compressed {
        decompress(source, &dest)
    } else {
        fs::copy(source, &dest)
            .map(|_| ())
            .map_err(|e| MriError::io(source, e))
    };
    if let Err(error) = outcome {
        // Best-effort removal of whatever was partially created.
        let _ = fs::remove_file(&dest);
        return Err(error);
    }
    debug!(source = %source.display(), dest = %dest.display(), "materialized local copy");
    Ok(dest)
}

fn decompress(source: &Path, dest: &Path) -> Result<()> {
    let stdout = fs::File::create(dest).map_err(|e| MriError::io(dest, e))?;
    let status = Command::new(DECOMPRESSOR)
        .arg("-k")
        .arg("-c")
        .arg(source)
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::null())
        .status()
        .map_err(|e| MriError::io(source, e))?;
    if !status.success() {
        return Err(MriError::Decompress {
            path: source.to_path_buf(),
            status,
        });
    }
    Ok(())
}

/// A materialized local copy that removes itself when dropped.
///
/// Every copy gets its own freshly created temporary directory, so
/// concurrently open scopes never contend for a destination path.
#[derive(Debug)]
pub struct LocalCopy {
    path: PathBuf,
    _workspace: TempDir,
}

impl LocalCopy {
    /// Materializes `source` under a fresh temporary directory.
    pub fn new(source: &Path) -> Result<Self> {
        let workspace = tempfile::tempdir().map_err(|e| MriError::io(source, e))?;
        let path = materialize_into(source, workspace.path())?;
        Ok(Self {
            path,
            _workspace: workspace,
        })
    }

    /// The local, readable, uncompressed file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Runs `f` with a scoped local copy of `source`; the copy is deleted
/// when `f` returns or fails, and cleanup never swallows `f`'s error.
pub fn with_local_copy<T>(source: &Path, f: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    let copy = LocalCopy::new(source)?;
    f(copy.path())
}
