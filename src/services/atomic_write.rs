//! Atomic file replacement (temp file + rename) under an exclusive lock

use crate::types::Result;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Write `content` to `path`, creating parent directories.
/// Readers see either the old or the new file, never a partial one.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    let target = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    target.lock_exclusive()?;

    let renamed = fs::rename(&temp_path, path);
    let _ = target.unlock();
    if renamed.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    renamed?;
    Ok(())
}
