use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Read a source file as text. Invalid UTF-8 becomes U+FFFD instead of an
/// error.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Replace `path` with `bytes` so readers never see a partial file.
///
/// The bytes go to a hidden sibling first, which is then renamed over the
/// target. On Windows, where rename refuses an existing target, the sibling
/// is copied instead.
///
/// # Errors
/// Returns an error if the sibling cannot be written or moved into place.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staging = staging_path(path);

    let mut file = File::create(&staging)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    let moved = fs::rename(&staging, path).or_else(|e| {
        if cfg!(windows) {
            fs::copy(&staging, path).map(|_| ())
        } else {
            Err(e)
        }
    });
    // No-op once the rename succeeded.
    let _ = fs::remove_file(&staging);
    moved
}

/// `dir/.name.sbmock-<pid>` next to `path`.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "out".into(), |n| n.to_string_lossy());
    path.with_file_name(format!(".{name}.sbmock-{}", std::process::id()))
}

/// List every regular file below `dir`, sorted for deterministic output.
///
/// A missing directory yields an empty list.
#[must_use]
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_to_string_lossy_valid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x80, 0x81])
            .unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("Hello"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_to_string_lossy_missing() {
        assert!(read_to_string_lossy(Path::new("/nonexistent/preview.ts")).is_err());
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.js");

        atomic_write(&path, b"hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");

        atomic_write(&path, b"world").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "world");

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "staging file left behind");
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let staging = staging_path(Path::new("/out/mock.js"));
        assert_eq!(staging.parent(), Some(Path::new("/out")));
        let name = staging.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(".mock.js.sbmock-"));
    }

    #[test]
    fn test_list_files_sorted_and_recursive() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("b/nested/z.js"), "").unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();

        let files = list_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.js"));
        assert!(files[1].ends_with("b/nested/z.js"));
    }

    #[test]
    fn test_list_files_missing_dir() {
        assert!(list_files(Path::new("/nonexistent/__mocks__")).is_empty());
    }
}
