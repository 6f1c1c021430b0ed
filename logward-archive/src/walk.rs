//! Recursive file listing shared by the archiver and the pruner.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{io_err, ArchiveError};

/// Every regular file under `root`, sorted.
///
/// Descends into every subdirectory. Symlinks are neither followed nor
/// returned. Only a failure to list `root` itself is an error; unreadable
/// subdirectories and entries are logged and skipped.
pub(crate) fn walk_files(root: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if dir == root => return Err(io_err(root, err)),
            Err(err) => {
                tracing::warn!(path = %dir.display(), error = %err, "skipping unreadable directory");
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(path = %dir.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            match entry.file_type() {
                Ok(ty) if ty.is_dir() => pending.push(entry.path()),
                Ok(ty) if ty.is_file() => files.push(entry.path()),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping entry of unknown type");
                }
            }
        }
    }

    files.sort();
    Ok(files)
}
