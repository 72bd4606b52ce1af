//! Run discovery under a log root

use std::path::{Path, PathBuf};

use pillbox_storage::{RunLogConfig, StorageError};
use tracing::debug;

/// Find every directory under `root` holding at least one segment
///
/// Returns `(run_name, path)` pairs sorted by name. The root itself is named
/// `"."`; subdirectories are named by their `/`-joined relative path. A
/// missing root yields no runs.
pub async fn discover_runs(
    root: &Path,
    config: &RunLogConfig,
) -> Result<Vec<(String, PathBuf)>, StorageError> {
    let mut runs = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Directory vanished during discovery");
                continue;
            }
            Err(e) => return Err(StorageError::io_at(&dir, e)),
        };

        let mut has_segment = false;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io_at(&dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StorageError::io_at(&entry.path(), e))?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file()
                && config.is_segment_name(&entry.file_name().to_string_lossy())
            {
                has_segment = true;
            }
        }

        if has_segment {
            runs.push((run_name(root, &dir), dir));
        }
    }

    runs.sort();
    Ok(runs)
}

fn run_name(root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => dir.display().to_string(),
    }
}
