//! Writing screenshots to disk
use crate::error::*;
use crate::timeline::Entry;
use base64::engine::general_purpose;
use base64::Engine as _;
use std::fs;
use std::path::Path;

pub const DEFAULT_PREFIX: &str = "screenshot";

/// Names frame files so that lexicographic order is the frame order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameNaming {
    prefix: String,
    width: usize,
}

impl FrameNaming {
    /// `frames` is the total number of frames that will be named
    pub fn new(prefix: Option<&str>, frames: usize) -> Self {
        let digits = frames.saturating_sub(1).to_string().len();
        Self {
            prefix: prefix.unwrap_or(DEFAULT_PREFIX).to_owned(),
            width: digits.max(4),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn file_name(&self, index: usize) -> String {
        format!("{}-{:0width$}.png", self.prefix, index, width = self.width)
    }
}

pub fn decode_snapshot(entry: &Entry) -> CatResult<Vec<u8>> {
    let snapshot = entry.snapshot().ok_or(Error::MissingSnapshot(entry.ts))?;
    general_purpose::STANDARD.decode(snapshot.as_bytes())
        .map_err(|err| Error::Decode(entry.ts, err))
}

/// Decodes the entry's image and writes it to `path`
pub fn save_snapshot(entry: &Entry, path: &Path) -> CatResult<()> {
    let image = decode_snapshot(entry)?;
    fs::write(path, image).map_err(|err| Error::Write(path.to_owned(), err))
}

/// Creates the folder, or removes the files in it if it already exists
///
/// Sub-folders are left alone.
pub fn prepare_dir(path: &Path) -> CatResult<()> {
    let write_err = |err: std::io::Error| Error::Write(path.to_owned(), err);

    if !path.exists() {
        log::debug!("creating {}", path.display());
        return fs::create_dir_all(path).map_err(write_err);
    }

    let mut removed = 0;
    for item in fs::read_dir(path).map_err(write_err)? {
        let item = item.map_err(write_err)?;
        let item_path = item.path();
        if item.file_type().map_err(write_err)?.is_dir() {
            log::debug!("keeping folder {}", item_path.display());
            continue;
        }
        fs::remove_file(&item_path).map_err(|err| Error::Write(item_path, err))?;
        removed += 1;
    }
    if removed > 0 {
        log::debug!("removed {} stale files from {}", removed, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn names_are_padded() {
        let naming = FrameNaming::new(None, 3);
        assert_eq!(naming.file_name(0), "screenshot-0000.png");
        assert_eq!(naming.file_name(12), "screenshot-0012.png");

        let naming = FrameNaming::new(Some("run"), 0);
        assert_eq!(naming.file_name(7), "run-0007.png");
    }

    #[test]
    fn padding_grows_with_frame_count() {
        let naming = FrameNaming::new(None, 10_000);
        assert_eq!(naming.file_name(9_999), "screenshot-9999.png");
        let naming = FrameNaming::new(None, 10_001);
        assert_eq!(naming.file_name(3), "screenshot-00003.png");
        assert!(naming.file_name(9_999) < naming.file_name(10_000));
    }

    #[test]
    fn payload_round_trips() {
        let entry = Entry::screenshot("devtools.timeline", 1, PIXEL_PNG);
        let bytes = decode_snapshot(&entry).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
        assert_eq!(general_purpose::STANDARD.encode(&bytes), PIXEL_PNG);
    }

    #[test]
    fn bad_payloads() {
        let missing = Entry::new("Screenshot", "devtools.timeline", 7);
        assert!(matches!(decode_snapshot(&missing), Err(Error::MissingSnapshot(7))));

        let garbage = Entry::screenshot("devtools.timeline", 8, "not base64!");
        let err = decode_snapshot(&garbage).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn saves_decoded_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("screenshot-0000.png");
        let entry = Entry::screenshot("devtools.timeline", 1, PIXEL_PNG);
        save_snapshot(&entry, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), decode_snapshot(&entry).unwrap());
    }

    #[test]
    fn save_into_missing_folder_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("screenshot-0000.png");
        let entry = Entry::screenshot("devtools.timeline", 1, PIXEL_PNG);
        let err = save_snapshot(&entry, &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Write);
    }

    #[test]
    fn prepare_creates_nested() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b");
        prepare_dir(&path).unwrap();
        assert!(path.is_dir());
    }

    #[test]
    fn prepare_empties_existing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("screenshot-0099.png"), b"stale").unwrap();
        fs::write(dir.path().join("notes.txt"), b"stale").unwrap();
        fs::create_dir(dir.path().join("old")).unwrap();
        fs::write(dir.path().join("old").join("x.png"), b"stale").unwrap();

        prepare_dir(dir.path()).unwrap();
        let left: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(left, ["old"]);
        assert!(dir.path().join("old").join("x.png").exists());
    }

    #[test]
    fn prepare_rejects_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frames");
        fs::write(&path, b"").unwrap();
        assert_eq!(prepare_dir(&path).unwrap_err().kind(), ErrorKind::Write);
    }
}
