use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp_ms;

/// Replaces `path` with `content` by staging a sibling file and renaming it over
/// the target, so a crash never leaves a half-written report behind.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        bail!("output path '{}' has no file name", path.display());
    };
    if path.is_dir() {
        bail!("output path '{}' is a directory", path.display());
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let staging = dir.join(format!(
        ".{file_name}.{}.partial",
        current_unix_timestamp_ms()
    ));
    let result = stage_and_swap(&staging, path, content);
    if result.is_err() {
        let _ = fs::remove_file(&staging);
    }
    result
}

fn stage_and_swap(staging: &Path, target: &Path, content: &str) -> Result<()> {
    let mut file = File::create(staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write {}", staging.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to flush {}", staging.display()))?;
    fs::rename(staging, target).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            staging.display(),
            target.display()
        )
    })
}
