use crate::BatchError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists files under `folder` whose extension matches `extension`
/// (ASCII case-insensitive), sorted by lower-cased file name.
pub fn discover_files(
    folder: &Path,
    extension: &str,
    recursive: bool,
) -> Result<Vec<PathBuf>, BatchError> {
    if !folder.is_dir() {
        return Err(BatchError::DirectoryNotFound(folder.to_path_buf()));
    }

    let walker = if recursive {
        WalkDir::new(folder)
    } else {
        WalkDir::new(folder).max_depth(1)
    };

    let mut files = Vec::new();
    for entry in walker.into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));

        if matches {
            files.push(entry.into_path());
        }
    }

    files.sort_by_cached_key(|path| (sort_key(path), path.clone()));
    Ok(files)
}

fn sort_key(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
