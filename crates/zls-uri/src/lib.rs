//! `file://` URI ↔ filesystem path conversion for the Zig language server.
//!
//! The codec matches the toolchain's URI rules: every byte outside
//! `[A-Za-z0-9/._~-]` is percent-encoded with upper-case hex, and decoding
//! rejects anything that is not a well-formed `file://` URI. Windows drive
//! letters keep their `/c:/...` form.
//!
//! # Examples
//!
//! ```
//! use zls_uri::{path_to_uri, uri_to_path};
//!
//! let uri = path_to_uri("/tmp/with space/foo.zig".as_ref());
//! assert_eq!(uri, "file:///tmp/with%20space/foo.zig");
//! assert_eq!(uri_to_path(&uri).unwrap(), std::path::PathBuf::from("/tmp/with space/foo.zig"));
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced by [`uri_to_path`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    /// The URI does not use the `file://` scheme or its percent-encoding is
    /// malformed.
    #[error("invalid file URI: {0}")]
    InvalidUri(String),
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'/' | b'.' | b'_' | b'~' | b'-')
}

/// Convert a filesystem path to a `file://` URI.
///
/// Backslashes become forward slashes and every byte outside
/// `[A-Za-z0-9/._~-]` is `%HH`-encoded with upper-case hex.
pub fn path_to_uri(path: &Path) -> String {
    let raw = path.to_string_lossy().replace('\\', "/");
    let mut uri = String::with_capacity(raw.len() + 8);
    uri.push_str("file://");
    if !raw.starts_with('/') {
        // Windows drive paths ("c:/...") get the leading slash of the
        // authority-less file URI form.
        uri.push('/');
    }
    for &b in raw.as_bytes() {
        if is_unreserved(b) {
            uri.push(b as char);
        } else {
            uri.push('%');
            uri.push(HEX[(b >> 4) as usize] as char);
            uri.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    uri
}

/// Convert a `file://` URI back to a filesystem path.
///
/// Fails with [`UriError::InvalidUri`] if the scheme is not `file://` or a
/// percent escape is malformed.
pub fn uri_to_path(uri: &str) -> Result<PathBuf, UriError> {
    let rest = uri
        .strip_prefix("file://")
        .ok_or_else(|| UriError::InvalidUri(uri.to_string()))?;
    if !rest.starts_with('/') {
        return Err(UriError::InvalidUri(uri.to_string()));
    }

    let bytes = rest.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16));
                let lo = bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi * 16 + lo) as u8);
                        i += 3;
                    }
                    _ => return Err(UriError::InvalidUri(uri.to_string())),
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    let decoded =
        String::from_utf8(out).map_err(|_| UriError::InvalidUri(uri.to_string()))?;
    // "/c:/..." is a Windows drive path; strip the synthetic leading slash.
    let is_drive = {
        let b = decoded.as_bytes();
        b.len() > 2 && b[0] == b'/' && b[1].is_ascii_alphabetic() && b[2] == b':'
    };
    if is_drive {
        Ok(PathBuf::from(&decoded[1..]))
    } else {
        Ok(PathBuf::from(decoded))
    }
}

/// The directory component of a file URI, without trailing slash.
///
/// Used to resolve relative imports against the importing file.
pub fn parent_uri(uri: &str) -> Option<&str> {
    let idx = uri.rfind('/')?;
    if uri[..idx].len() <= "file://".len() {
        return None;
    }
    Some(&uri[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn encodes_reserved_bytes_upper_hex() {
        let uri = path_to_uri(Path::new("/tmp/a b+c#d.zig"));
        assert_eq!(uri, "file:///tmp/a%20b%2Bc%23d.zig");
    }

    #[test]
    fn plain_path_is_untouched() {
        assert_eq!(path_to_uri(Path::new("/usr/lib/zig/std/std.zig")), "file:///usr/lib/zig/std/std.zig");
    }

    #[test]
    fn decode_rejects_non_file_scheme() {
        assert!(matches!(uri_to_path("https://example.com/x"), Err(UriError::InvalidUri(_))));
        assert!(matches!(uri_to_path("untitled:Untitled-1"), Err(UriError::InvalidUri(_))));
    }

    #[test]
    fn decode_rejects_malformed_escape() {
        assert!(matches!(uri_to_path("file:///tmp/%2"), Err(UriError::InvalidUri(_))));
        assert!(matches!(uri_to_path("file:///tmp/%zz"), Err(UriError::InvalidUri(_))));
    }

    #[test]
    fn windows_drive_round_trip() {
        let uri = path_to_uri(Path::new("c:\\zig\\std.zig"));
        assert_eq!(uri, "file:///c%3A/zig/std.zig");
        assert_eq!(uri_to_path(&uri).unwrap(), PathBuf::from("c:/zig/std.zig"));
    }

    #[test]
    fn non_ascii_round_trip() {
        let path = Path::new("/tmp/søurce/bäu.zig");
        let uri = path_to_uri(path);
        assert!(uri.starts_with("file:///tmp/s%C3%B8urce/"));
        assert_eq!(uri_to_path(&uri).unwrap(), path);
    }

    #[test]
    fn parent_of_uri() {
        assert_eq!(parent_uri("file:///tmp/src/main.zig"), Some("file:///tmp/src"));
        assert_eq!(parent_uri("file:///main.zig"), None);
    }

    proptest! {
        // path_to_uri(uri_to_path(u)) = u for every URI this codec produces.
        #[test]
        fn round_trip_law(segments in proptest::collection::vec("[a-zA-Z0-9 _.$è-]{1,8}", 1..5)) {
            let path = PathBuf::from(format!("/{}", segments.join("/")));
            let uri = path_to_uri(&path);
            let back = uri_to_path(&uri).unwrap();
            prop_assert_eq!(&back, &path);
            prop_assert_eq!(path_to_uri(&back), uri);
        }
    }
}
