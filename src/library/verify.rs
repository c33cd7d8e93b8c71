//! Advisory content verification.
//!
//! Only a missing or empty file fails. Archives are fully read so that
//! corrupt members surface, but a damaged archive is still accepted with a
//! degraded note.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Extensions recognized as regular content
const KNOWN_EXTENSIONS: &[&str] = &[
    "stl", "step", "stp", "3mf", "obj", "f3d", "blend", "scad", "dxf", "dwg", "iges", "igs", "pdf",
    "txt", "md", "gcode", "rar", "7z",
];

/// Outcome of verifying one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub ok: bool,
    pub degraded: bool,
    pub message: String,
}

impl Verification {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            degraded: false,
            message: message.into(),
        }
    }

    fn degraded(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            degraded: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            degraded: false,
            message: message.into(),
        }
    }
}

/// Verify a downloaded file (blocking)
pub fn verify(path: &Path) -> Verification {
    let size = match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata.len(),
        _ => return Verification::failed("File does not exist"),
    };
    if size == 0 {
        return Verification::failed("File is empty");
    }
    let size_mb = size as f64 / BYTES_PER_MB;

    match has_archive_signature(path) {
        Ok(true) => {
            return match scan_archive(path) {
                Ok(members) => Verification::ok(format!(
                    "Valid archive, {members} files ({size_mb:.2}MB)"
                )),
                Err(reason) => {
                    Verification::degraded(format!("Downloaded, archive check failed: {reason}"))
                }
            };
        }
        Ok(false) => {}
        Err(e) => return Verification::degraded(format!("Downloaded, could not read header: {e}")),
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension {
        Some(ext) if KNOWN_EXTENSIONS.contains(&ext.as_str()) => {
            Verification::ok(format!("Valid .{ext} file ({size_mb:.2}MB)"))
        }
        _ => Verification::ok(format!("Downloaded ({size_mb:.2}MB)")),
    }
}

/// Whether the file starts with a zip signature
fn has_archive_signature(path: &Path) -> io::Result<bool> {
    let mut header = [0u8; 4];
    let mut file = File::open(path)?;
    let read = file.read(&mut header)?;

    Ok(matches!(
        &header[..read],
        [0x50, 0x4b, 0x03, 0x04] | [0x50, 0x4b, 0x05, 0x06] | [0x50, 0x4b, 0x07, 0x08]
    ))
}

/// Read every member to the end; returns the member count
fn scan_archive(path: &Path) -> Result<usize, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| e.to_string())?;

    for i in 0..archive.len() {
        let mut member = archive.by_index(i).map_err(|e| e.to_string())?;
        let name = member.name().to_string();
        io::copy(&mut member, &mut io::sink()).map_err(|e| format!("corrupt member {name}: {e}"))?;
    }

    Ok(archive.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    const PAYLOAD: &[u8] = b"solid cube facet normal 0 0 1 endsolid cube";

    fn write_zip(path: &Path) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("cube.stl", options).unwrap();
        writer.write_all(PAYLOAD).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_missing_and_empty_fail() {
        let temp = TempDir::new().unwrap();
        let empty = temp.path().join("empty.stl");
        std::fs::write(&empty, b"").unwrap();

        assert!(!verify(&temp.path().join("missing.stl")).ok);
        assert!(!verify(&empty).ok);
    }

    #[test]
    fn test_valid_archive_without_extension() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("download");
        write_zip(&path);

        let result = verify(&path);
        assert!(result.ok);
        assert!(!result.degraded);
        assert!(result.message.starts_with("Valid archive, 1 files"));
    }

    #[test]
    fn test_corrupt_member_is_degraded_not_failed() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.zip");
        write_zip(&path);

        let mut bytes = std::fs::read(&path).unwrap();
        let offset = bytes
            .windows(PAYLOAD.len())
            .position(|w| w == PAYLOAD)
            .unwrap();
        bytes[offset] ^= 0xff;
        std::fs::write(&path, bytes).unwrap();

        let result = verify(&path);
        assert!(result.ok);
        assert!(result.degraded);
    }

    #[test]
    fn test_known_and_unknown_types_accepted() {
        let temp = TempDir::new().unwrap();
        let stl = temp.path().join("part.STL");
        let other = temp.path().join("notes.xyz");
        std::fs::write(&stl, PAYLOAD).unwrap();
        std::fs::write(&other, b"data").unwrap();

        let known = verify(&stl);
        assert!(known.ok);
        assert!(known.message.starts_with("Valid .stl file"));

        let unknown = verify(&other);
        assert!(unknown.ok);
        assert!(unknown.message.starts_with("Downloaded"));
    }
}
