//! Conversion between `file://` URIs and filesystem paths.

use std::path::{Path, PathBuf};

use lsp_types::Uri;

/// Convert an LSP URI to a filesystem path.
///
/// Handles `file:///path/to/file` URIs by stripping the scheme and authority
/// and percent-decoding (e.g. `%3A` → `:`). Other schemes are kept verbatim.
pub fn uri_to_path(uri: &Uri) -> PathBuf {
    uri_str_to_path(uri.as_str())
}

pub fn uri_str_to_path(uri: &str) -> PathBuf {
    if let Some(path) = uri.strip_prefix("file://") {
        let decoded = percent_decode(path);
        // On Windows: file:///C:/foo -> C:/foo
        #[cfg(windows)]
        {
            let decoded = decoded.strip_prefix('/').unwrap_or(&decoded);
            PathBuf::from(decoded)
        }
        #[cfg(not(windows))]
        {
            PathBuf::from(decoded)
        }
    } else {
        PathBuf::from(uri)
    }
}

/// Build a `file://` URI for an absolute path.
pub fn path_to_uri(path: &Path) -> Option<Uri> {
    let text = path.to_string_lossy().replace('\\', "/");
    let text = if text.starts_with('/') {
        text
    } else {
        format!("/{text}")
    };
    format!("file://{}", percent_encode(&text)).parse().ok()
}

fn percent_encode(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b':' => {
                result.push(b as char)
            }
            _ => result.push_str(&format!("%{b:02X}")),
        }
    }
    result
}

/// Decode percent-encoded bytes; malformed escapes pass through.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2])) {
                out.push(h << 4 | l);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn decodes_escapes() {
        assert_eq!(
            uri_str_to_path("file:///tmp/my%20dir/a.Point.thrd"),
            PathBuf::from("/tmp/my dir/a.Point.thrd")
        );
        assert_eq!(uri_str_to_path("file:///tmp/100%"), PathBuf::from("/tmp/100%"));
    }

    #[cfg(not(windows))]
    #[test]
    fn path_and_uri_agree() {
        let path = Path::new("/tmp/my dir/ü.thrd");
        let uri = path_to_uri(path).expect("valid uri");
        assert_eq!(uri.as_str(), "file:///tmp/my%20dir/%C3%BC.thrd");
        assert_eq!(uri_to_path(&uri), path);
    }
}
