use http::header::ACCEPT_ENCODING;
use http::HeaderMap;

use crate::content_type::TypeResult;

/// Larger files are always sent as they are.
pub const MAX_COMPRESS_SIZE: u64 = 50_000_000;

/// Returns `true` if `Accept-Encoding` lists `gzip`.
///
/// Quality values are not weighed; a listed `gzip` is enough.
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| token.split(';').next())
        .any(|token| token.trim().eq_ignore_ascii_case("gzip"))
}

/// Decides whether a file response gets gzip compression.
pub fn use_gzip(enabled: bool, content_type: &TypeResult, size: u64, headers: &HeaderMap) -> bool {
    enabled && content_type.is_text() && size <= MAX_COMPRESS_SIZE && accepts_gzip(headers)
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;
    use crate::content_type::type_from_name;

    fn headers(accept: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in accept {
            headers.append(ACCEPT_ENCODING, HeaderValue::from_static(value));
        }
        headers
    }

    #[test]
    fn accept_encoding_tokens() {
        assert!(accepts_gzip(&headers(&["gzip"])));
        assert!(accepts_gzip(&headers(&["br, gzip;q=0.8, deflate"])));
        assert!(accepts_gzip(&headers(&["GZIP"])));
        assert!(accepts_gzip(&headers(&["br", "gzip"])));
        assert!(!accepts_gzip(&headers(&[])));
        assert!(!accepts_gzip(&headers(&["br, deflate"])));
        assert!(!accepts_gzip(&headers(&["x-gzip"])));
        assert!(!accepts_gzip(&headers(&["identity"])));
    }

    #[test]
    fn compression_gate() {
        let text = type_from_name("a.html".as_ref()).unwrap();
        let bin = type_from_name("a.png".as_ref()).unwrap();
        let gzip = headers(&["gzip"]);

        assert!(use_gzip(true, &text, 10, &gzip));
        assert!(use_gzip(true, &text, MAX_COMPRESS_SIZE, &gzip));
        assert!(!use_gzip(true, &text, MAX_COMPRESS_SIZE + 1, &gzip));
        assert!(!use_gzip(false, &text, 10, &gzip));
        assert!(!use_gzip(true, &bin, 10, &gzip));
        assert!(!use_gzip(true, &text, 10, &headers(&["br"])));
    }
}
