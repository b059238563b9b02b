use anyhow::{bail, Context, Result};
use std::path::Path;

/// Default file name offered for exports.
pub const EXPORT_FILE_NAME: &str = "quotes.json";

/// Largest snapshot file accepted for import (5 MiB).
pub const MAX_SNAPSHOT_SIZE: u64 = 5 * 1024 * 1024;

/// Write an exported snapshot to `path` atomically.
///
/// Writes to a temporary file in the same directory, syncs it, then renames
/// it over `path`, so the destination is never left half-written.
pub fn write_snapshot(bytes: &[u8], path: &Path) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // Unpredictable temp name so nothing can be planted there beforehand
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    std::io::Write::write_all(&mut file, bytes).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to write quotes to temporary file '{}'",
            temp_path.display()
        )
    })?;

    file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to sync temporary file '{}' to disk",
            temp_path.display()
        )
    })?;

    drop(file);

    #[cfg(windows)]
    if path.exists() {
        std::fs::remove_file(path).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!("Failed to remove existing '{}' before replace", path.display())
        })?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "Exported quotes");
    Ok(())
}

/// Read a user-selected snapshot file for import.
///
/// Rejects anything that is not a regular file or is larger than
/// [`MAX_SNAPSHOT_SIZE`] before reading it.
pub fn read_snapshot(path: &Path) -> Result<Vec<u8>> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    if !metadata.is_file() {
        bail!("Import path must be a regular file");
    }
    if metadata.len() > MAX_SNAPSHOT_SIZE {
        bail!(
            "Import file is {} bytes (max {} bytes)",
            metadata.len(),
            MAX_SNAPSHOT_SIZE
        );
    }

    std::fs::read(path).with_context(|| format!("Failed to read import file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = std::env::temp_dir().join("quotebox_snapshot_test_write");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(EXPORT_FILE_NAME);

        write_snapshot(b"[]", &path).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), b"[]".to_vec());

        // Overwrite in place
        write_snapshot(b"[ ]", &path).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), b"[ ]".to_vec());

        // No temp files left behind
        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_read_missing_file() {
        let path = Path::new("/tmp/quotebox_snapshot_test_missing.json");
        assert!(read_snapshot(path).is_err());
    }

    #[test]
    fn test_read_directory_rejected() {
        let dir = std::env::temp_dir().join("quotebox_snapshot_test_dir");
        std::fs::create_dir_all(&dir).unwrap();

        let err = read_snapshot(&dir).unwrap_err();
        assert!(err.to_string().contains("regular file"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_read_oversize_rejected() {
        let dir = std::env::temp_dir().join("quotebox_snapshot_test_oversize");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("big.json");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_SNAPSHOT_SIZE + 1).unwrap();

        let err = read_snapshot(&path).unwrap_err();
        assert!(err.to_string().contains("max"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
