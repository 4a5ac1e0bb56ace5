use http::header::CONTENT_LENGTH;
use pingora::http::RequestHeader;

pub fn get_req_header_value<'a>(req_header: &'a RequestHeader, key: &str) -> Option<&'a str> {
    if let Some(value) = req_header.headers.get(key) {
        if let Ok(value) = value.to_str() {
            return Some(value);
        }
    }
    None
}

/// Declared `Content-Length`, if present and numeric.
pub fn declared_content_length(req_header: &RequestHeader) -> Option<usize> {
    get_req_header_value(req_header, CONTENT_LENGTH.as_str())
        .and_then(|len| len.trim().parse::<usize>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(pairs: &[(&'static str, &'static str)]) -> RequestHeader {
        let mut req = RequestHeader::build("POST", b"/bridge", None).unwrap();
        for (k, v) in pairs {
            req.insert_header(*k, *v).unwrap();
        }
        req
    }

    #[test]
    fn test_get_req_header_value_is_case_insensitive() {
        let req = header(&[("Accept", "text/event-stream")]);
        assert_eq!(get_req_header_value(&req, "accept"), Some("text/event-stream"));
        assert_eq!(get_req_header_value(&req, "x-missing"), None);
    }

    #[test]
    fn test_declared_content_length() {
        assert_eq!(declared_content_length(&header(&[("Content-Length", "42")])), Some(42));
        assert_eq!(declared_content_length(&header(&[("Content-Length", "abc")])), None);
        assert_eq!(declared_content_length(&header(&[])), None);
    }
}
