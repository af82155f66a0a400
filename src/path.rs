use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Bytes left as is inside a single path segment: unreserved characters and
/// the sub-delimiters allowed in a segment. `/`, `?`, `#`, `%` and spaces are
/// encoded.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// Percent-encodes `segment` so it stays a single path segment, e.g. a
/// transit key named `a#b` cannot cut the request path short.
pub fn escape_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Joins path segments into a request path.
///
/// Leading and trailing slashes are stripped from every segment and empty
/// segments are skipped. Slashes inside a segment are left alone, so
/// `"foo/bla/bar"` stays one piece.
pub fn resolve_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref().trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path_single() {
        assert_eq!(resolve_path(&["/test", "/foo", "/bar"]), "test/foo/bar");
    }

    #[test]
    fn test_resolve_path_multiple_parts() {
        assert_eq!(
            resolve_path(&["/test", "/foo/bla/bar", "/bar"]),
            "test/foo/bla/bar/bar"
        );
    }

    #[test]
    fn test_resolve_path_multiple_slashes() {
        assert_eq!(
            resolve_path(&["/test", "/////foo/bla/", "/bar///"]),
            "test/foo/bla/bar"
        );
        assert_eq!(resolve_path(&["/a/", "//b/c/", "/d//"]), "a/b/c/d");
    }

    #[test]
    fn test_resolve_path_empty_segments() {
        assert_eq!(resolve_path(&["", "/", "//"]), "");
        assert_eq!(resolve_path::<&str>(&[]), "");
        assert_eq!(resolve_path(&["v1", "", "kv"]), "v1/kv");
    }

    #[test]
    fn test_resolve_path_keeps_inner_slashes() {
        assert_eq!(resolve_path(&["v1", "kv", "a//b"]), "v1/kv/a//b");
    }

    #[test]
    fn test_escape_segment() {
        assert_eq!(escape_segment("orders-v2_key.1"), "orders-v2_key.1");
        assert_eq!(escape_segment("prod#staging"), "prod%23staging");
        assert_eq!(escape_segment("a b?c"), "a%20b%3Fc");
        assert_eq!(escape_segment("team/key"), "team%2Fkey");
        assert_eq!(escape_segment("100%"), "100%25");
        assert_eq!(escape_segment("user@host:1"), "user@host:1");
    }

    #[test]
    fn test_escaped_segment_survives_resolve() {
        let key = escape_segment("/a#b/");
        assert_eq!(
            resolve_path(&["v1", "transit", "keys", key.as_str()]),
            "v1/transit/keys/%2Fa%23b%2F"
        );
    }

    #[test]
    fn test_resolve_path_owned_segments() {
        let segments = vec!["v1".to_string(), format!("/{}/", "transit")];
        assert_eq!(resolve_path(&segments), "v1/transit");
    }
}
