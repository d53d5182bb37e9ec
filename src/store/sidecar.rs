//! Content-digest sidecar for the checksum store.
//!
//! The sidecar sits next to the store file (same path, `.digest` appended)
//! and records a SHA-256 of the store's bytes as of the last mutation made
//! through [`super::ChecksumStore`]. Bytes altered by anything else show up
//! as drift on the next open, even when SQLite still considers the file
//! structurally sound.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the store path to locate its sidecar.
pub const SIDECAR_SUFFIX: &str = ".digest";

/// Persisted integrity record for a store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDigest {
    /// File name of the store this digest belongs to
    pub store: String,
    /// SHA-256 of the store file, lowercase hex
    pub digest: String,
}

/// What was found at the sidecar location.
#[derive(Debug)]
pub enum SidecarState {
    Missing,
    Malformed(String),
    Present(StoreDigest),
}

/// Sidecar path for a store file.
pub fn sidecar_path(store: &Path) -> PathBuf {
    let mut path = OsString::from(store.as_os_str());
    path.push(SIDECAR_SUFFIX);
    PathBuf::from(path)
}

/// Stream a file through SHA-256.
pub fn digest_file(path: &Path) -> io::Result<String> {
    digest_reader(BufReader::new(File::open(path)?))
}

fn digest_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Read the sidecar at `path`.
pub fn load(path: &Path) -> io::Result<SidecarState> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SidecarState::Missing),
        Err(e) => return Err(e),
    };

    Ok(match serde_json::from_str::<StoreDigest>(&contents) {
        Ok(record) => SidecarState::Present(record),
        Err(e) => SidecarState::Malformed(e.to_string()),
    })
}

/// Write the sidecar atomically: write a temp file, sync, rename over.
pub fn save(path: &Path, record: &StoreDigest) -> io::Result<()> {
    let contents = serde_json::to_string_pretty(record).map_err(io::Error::other)?;

    let mut temp = OsString::from(path.as_os_str());
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let mut file = File::create(&temp)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/data/music_audit.db")),
            PathBuf::from("/data/music_audit.db.digest")
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.db.digest");
        let record = StoreDigest {
            store: "store.db".into(),
            digest: "ab".repeat(32),
        };

        save(&path, &record).unwrap();
        match load(&path).unwrap() {
            SidecarState::Present(loaded) => assert_eq!(loaded, record),
            other => panic!("unexpected sidecar state: {other:?}"),
        }
        assert!(!dir.path().join("store.db.digest.tmp").exists());
    }

    #[test]
    fn test_missing_and_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.digest");
        assert!(matches!(load(&path).unwrap(), SidecarState::Missing));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load(&path).unwrap(), SidecarState::Malformed(_)));
    }

    #[test]
    fn test_digest_file_detects_single_byte() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, vec![7u8; 20_000]).unwrap();
        let before = digest_file(&path).unwrap();
        assert_eq!(before.len(), 64);

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[12_345] ^= 0x01;
        std::fs::write(&path, bytes).unwrap();
        assert_ne!(digest_file(&path).unwrap(), before);
    }

    #[test]
    fn test_digest_reader_retries_interrupted_reads() {
        struct InterruptOnce(io::Cursor<&'static [u8]>, bool);

        impl Read for InterruptOnce {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                if !self.1 {
                    self.1 = true;
                    return Err(io::Error::from(io::ErrorKind::Interrupted));
                }
                self.0.read(buf)
            }
        }

        let digest = digest_reader(InterruptOnce(io::Cursor::new(&b"abc"[..]), false)).unwrap();
        // sha256("abc")
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
