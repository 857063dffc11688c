//! Binary file detection
//!
//! Two-stage check: a fast extension denylist, then a content sniff of the
//! first 4 KiB for files the extension check lets through.

use std::io::Read;
use std::path::Path;

const SNIFF_BYTES: usize = 4096;
const NONPRINTABLE_THRESHOLD: f64 = 0.3;

const BINARY_EXTENSIONS: &[&str] = &[
    // Images
    "jpg", "jpeg", "png", "gif", "bmp", "ico", "webp", "tiff",
    // Audio / video
    "mp3", "wav", "flac", "ogg", "mp4", "avi", "mov", "mkv", "webm",
    // Archives
    "zip", "tar", "gz", "bz2", "xz", "zst", "7z", "rar", "jar",
    // Executables and libraries
    "exe", "dll", "so", "dylib", "bin", "dat", "o", "a", "obj", "lib", "wasm", "class", "pyc",
    // Fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // Databases
    "db", "sqlite", "sqlite3",
];

/// Check the file extension against the denylist
pub fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            BINARY_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Sniff the first bytes of a file for binary content.
///
/// A null byte is conclusive; otherwise the file is binary when more than 30%
/// of the sampled bytes are non-printable control characters.
pub fn is_binary_content(path: &Path) -> std::io::Result<bool> {
    let mut file = std::fs::File::open(path)?;
    let mut buffer = [0u8; SNIFF_BYTES];
    let read = file.read(&mut buffer)?;
    if read == 0 {
        return Ok(false);
    }
    Ok(is_binary_bytes(&buffer[..read]))
}

pub(crate) fn is_binary_bytes(bytes: &[u8]) -> bool {
    let mut nonprintable = 0usize;
    for &byte in bytes {
        if byte == 0 {
            return true;
        }
        if byte < 0x20 && byte != b'\t' && byte != b'\n' && byte != b'\r' {
            nonprintable += 1;
        }
    }
    (nonprintable as f64 / bytes.len() as f64) > NONPRINTABLE_THRESHOLD
}

/// Combined extension-then-content check. Unreadable files count as binary
/// so callers skip them.
pub fn is_binary_file(path: &Path) -> bool {
    has_binary_extension(path) || is_binary_content(path).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_extension_denylist() {
        assert!(has_binary_extension(Path::new("photo.PNG")));
        assert!(has_binary_extension(Path::new("lib/libfoo.so")));
        assert!(!has_binary_extension(Path::new("main.rs")));
        assert!(!has_binary_extension(Path::new("Makefile")));
    }

    #[test]
    fn test_null_byte_is_binary() {
        assert!(is_binary_bytes(b"ELF\x00\x01\x02"));
    }

    #[test]
    fn test_plain_text_is_not_binary() {
        assert!(!is_binary_bytes(b"fn main() {\n\tprintln!(\"hi\");\n}\n"));
    }

    #[test]
    fn test_utf8_text_is_not_binary() {
        assert!(!is_binary_bytes("héllo wörld — ünïcode".as_bytes()));
    }

    #[test]
    fn test_control_heavy_content_is_binary() {
        let bytes: Vec<u8> = (0..100).map(|i| if i % 2 == 0 { 0x01 } else { b'a' }).collect();
        assert!(is_binary_bytes(&bytes));
    }

    #[test]
    fn test_sniff_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "just text\n").unwrap();
        assert!(!is_binary_file(&text));

        let blob = dir.path().join("data");
        let mut f = std::fs::File::create(&blob).unwrap();
        f.write_all(&[0u8, 1, 2, 3, 255, 254]).unwrap();
        assert!(is_binary_file(&blob));
    }
}
