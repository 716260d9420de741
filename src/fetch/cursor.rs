use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("response has no next link")]
    MissingNextLink,

    #[error("error generating window from next link '{link}': {reason}")]
    InvalidNextLink { link: String, reason: String },
}

/// Position in the log stream: the time window being read and, after a
/// partial read, the last batch that made it to the output loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    window: Option<i64>,
    last_batch_id: Option<String>,
}

impl Cursor {
    pub fn new(from: Option<i64>) -> Self {
        Self {
            window: from,
            last_batch_id: None,
        }
    }

    pub fn window(&self) -> Option<i64> {
        self.window
    }

    pub fn last_batch_id(&self) -> Option<&str> {
        self.last_batch_id.as_deref()
    }

    /// Remember a delivered batch so a failed read resumes after it
    pub fn record_batch(&mut self, batch_id: &str) {
        self.last_batch_id = Some(batch_id.to_string());
    }

    /// Move to the next window after a clean page. A page boundary never
    /// needs batch-level resume, so the batch ID is dropped.
    pub fn advance(&mut self, window: i64) {
        self.window = Some(window);
        self.last_batch_id = None;
    }

    /// Whether the current window is already newer than the `to` bound
    pub fn is_past(&self, to: Option<i64>) -> bool {
        match (self.window, to) {
            (Some(cur), Some(to)) => cur > to,
            _ => false,
        }
    }

    /// Request URL for this position.
    ///
    /// Any query already on `base` is discarded; `from` and `batch_id` are
    /// only set when known.
    pub fn request_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            if let Some(window) = self.window.filter(|w| *w != 0) {
                query.append_pair("from", &window.to_string());
            }
            if let Some(batch_id) = self.last_batch_id.as_deref().filter(|b| !b.is_empty()) {
                query.append_pair("batch_id", batch_id);
            }
        }
        // query_pairs_mut leaves a dangling '?' when nothing was appended
        if url.query() == Some("") {
            url.set_query(None);
        }
        url
    }
}

/// Targets of the `Link` response header that matter for pagination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    pub prev: Option<String>,
    pub next: Option<String>,
}

/// Parse one or more `Link` header values (RFC 8288 style):
/// `<https://host/path?from=1>; rel="prev", <https://host/path?from=3>; rel="next"`
pub fn parse_link_header<'a, I>(values: I) -> Links
where
    I: IntoIterator<Item = &'a str>,
{
    let mut links = Links::default();

    for value in values {
        let mut rest = value;
        while let Some(start) = rest.find('<') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('>') else {
                break;
            };
            let target = &after[..end];
            let tail = &after[end + 1..];
            let params_end = tail.find('<').unwrap_or(tail.len());

            for param in tail[..params_end].split(';') {
                let param = param.trim().trim_end_matches(',').trim();
                let Some((key, val)) = param.split_once('=') else {
                    continue;
                };
                if !key.trim().eq_ignore_ascii_case("rel") {
                    continue;
                }
                for rel in val.trim().trim_matches('"').split_whitespace() {
                    match rel {
                        "next" => links.next = Some(target.to_string()),
                        "prev" => links.prev = Some(target.to_string()),
                        _ => {}
                    }
                }
            }

            rest = &tail[params_end..];
        }
    }

    links
}

/// Extract the next window (`from` query parameter) from a next link.
/// Relative links are resolved against the URL that was requested.
pub fn window_from_link(link: &str, requested: &Url) -> Result<i64, CursorError> {
    let invalid = |reason: String| CursorError::InvalidNextLink {
        link: link.to_string(),
        reason,
    };

    let url = requested.join(link).map_err(|e| invalid(e.to_string()))?;
    let from = url
        .query_pairs()
        .find(|(k, _)| k == "from")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| invalid("no 'from' parameter".to_string()))?;

    from.parse::<i64>().map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://api.example.com/service/abc/log_stream/managed/instance_output").unwrap()
    }

    #[test]
    fn test_request_url_without_window() {
        let cursor = Cursor::new(None);
        assert_eq!(
            cursor.request_url(&base()).as_str(),
            "https://api.example.com/service/abc/log_stream/managed/instance_output"
        );
    }

    #[test]
    fn test_request_url_with_window_and_batch() {
        let mut cursor = Cursor::new(Some(1000));
        cursor.record_batch("b7");
        let url = cursor.request_url(&base());
        assert_eq!(url.query(), Some("from=1000&batch_id=b7"));
    }

    #[test]
    fn test_request_url_discards_existing_query() {
        let mut with_query = base();
        with_query.set_query(Some("from=1&batch_id=old"));
        let cursor = Cursor::new(Some(5));
        assert_eq!(cursor.request_url(&with_query).query(), Some("from=5"));
    }

    #[test]
    fn test_advance_clears_batch_id() {
        let mut cursor = Cursor::new(Some(10));
        cursor.record_batch("b1");
        cursor.advance(1_700_000_100);

        assert_eq!(cursor.window(), Some(1_700_000_100));
        assert_eq!(cursor.last_batch_id(), None);
        assert_eq!(
            cursor.request_url(&base()).query(),
            Some("from=1700000100")
        );
    }

    #[test]
    fn test_is_past() {
        let cursor = Cursor::new(Some(100));
        assert!(!cursor.is_past(None));
        assert!(!cursor.is_past(Some(100)));
        assert!(cursor.is_past(Some(99)));
        assert!(!Cursor::new(None).is_past(Some(1)));
    }

    #[test]
    fn test_parse_link_header_prev_and_next() {
        let links = parse_link_header([
            r#"<https://api.example.com/x?from=1699999900>; rel="prev", <https://api.example.com/x?from=1700000100>; rel="next""#,
        ]);
        assert_eq!(links.prev.as_deref(), Some("https://api.example.com/x?from=1699999900"));
        assert_eq!(links.next.as_deref(), Some("https://api.example.com/x?from=1700000100"));
    }

    #[test]
    fn test_parse_link_header_multiple_values() {
        let links = parse_link_header([
            r#"</x?from=1>; rel="prev""#,
            r#"</x?from=2>; rel=next"#,
        ]);
        assert_eq!(links.prev.as_deref(), Some("/x?from=1"));
        assert_eq!(links.next.as_deref(), Some("/x?from=2"));
    }

    #[test]
    fn test_parse_link_header_without_next() {
        let links = parse_link_header([r#"</x?from=1>; rel="prev""#]);
        assert!(links.next.is_none());
        assert_eq!(parse_link_header(Vec::<&str>::new()), Links::default());
    }

    #[test]
    fn test_window_from_link() {
        let requested = base();
        assert_eq!(
            window_from_link("https://api.example.com/x?from=1700000100", &requested).unwrap(),
            1_700_000_100
        );
        assert_eq!(window_from_link("/x?batch_id=&from=42", &requested).unwrap(), 42);
    }

    #[test]
    fn test_window_from_link_rejects_garbage() {
        let requested = base();
        assert!(matches!(
            window_from_link("/x?from=soon", &requested),
            Err(CursorError::InvalidNextLink { .. })
        ));
        assert!(window_from_link("/x", &requested).is_err());
    }
}
