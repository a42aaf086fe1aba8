//! Decompressed header-block parsing.
//!
//! A header block is a 4-byte big-endian pair count followed by that many
//! `{u32 name_len, name, u32 value_len, value}` entries. Order matters for
//! display and duplicates are legal, so the parser yields the pairs exactly
//! as the peer inserted them. A handful of special names (`method`,
//! `status`, `url`, `version`, `content-type`, `content-encoding`) feed the
//! per-stream metadata and the human-readable frame summary.

pub mod dictionary;
pub mod inflate;

pub use inflate::{Direction, HeaderInflater};

use crate::cursor::Cursor;
use crate::error::Diagnostic;
use crate::frame::ControlType;

/// One name/value pair, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Parsed header block: the declared pair count plus however many pairs were
/// actually recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    pub declared_count: u32,
    pub headers: Vec<Header>,
}

/// Walks a decompressed block.
///
/// If the declared count exceeds the remaining bytes the block is rejected
/// outright and no pairs are emitted. A short read inside the list returns
/// the successfully parsed prefix together with a truncation diagnostic.
pub fn parse_header_block(block: &[u8]) -> (HeaderBlock, Option<Diagnostic>) {
    let mut cur = Cursor::new(block);

    let declared_count = match cur.u32_be() {
        Ok(n) => n,
        Err(t) => {
            return (
                HeaderBlock {
                    declared_count: 0,
                    headers: Vec::new(),
                },
                Some(t.into()),
            )
        }
    };

    if declared_count as usize > cur.remaining() {
        return (
            HeaderBlock {
                declared_count,
                headers: Vec::new(),
            },
            Some(Diagnostic::MalformedHeaderBlock {
                declared: declared_count,
                remaining: cur.remaining(),
            }),
        );
    }

    let mut headers = Vec::with_capacity(declared_count.min(64) as usize);
    for _ in 0..declared_count {
        if cur.remaining() == 0 {
            break;
        }
        match parse_pair(&mut cur) {
            Ok(header) => headers.push(header),
            Err(t) => {
                return (
                    HeaderBlock {
                        declared_count,
                        headers,
                    },
                    Some(t.into()),
                )
            }
        }
    }

    (
        HeaderBlock {
            declared_count,
            headers,
        },
        None,
    )
}

fn parse_pair(cur: &mut Cursor<'_>) -> Result<Header, crate::error::Truncated> {
    let name_len = cur.u32_be()? as usize;
    let name = cur.bytes(name_len)?;
    let value_len = cur.u32_be()? as usize;
    let value = cur.bytes(value_len)?;
    Ok(Header {
        name: String::from_utf8_lossy(name).into_owned(),
        value: String::from_utf8_lossy(value).into_owned(),
    })
}

/// Special header names pulled out of a block for stream metadata and the
/// info column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSummary {
    /// `method` for requests, `status` for replies.
    pub verb: Option<String>,
    pub url: Option<String>,
    pub version: Option<String>,
    /// Lower-cased media type with parameters stripped.
    pub content_type: Option<String>,
    /// Portion of the content type after `;`, if any.
    pub content_type_params: Option<String>,
    pub content_encoding: Option<String>,
}

impl HeaderSummary {
    /// Scans pairs in order; the last occurrence of a special name wins.
    pub fn from_headers(headers: &[Header]) -> Self {
        let mut summary = HeaderSummary::default();
        for header in headers {
            if header.name.eq_ignore_ascii_case("method")
                || header.name.eq_ignore_ascii_case("status")
            {
                summary.verb = Some(header.value.clone());
            } else if header.name.eq_ignore_ascii_case("url") {
                summary.url = Some(header.value.clone());
            } else if header.name.eq_ignore_ascii_case("version") {
                summary.version = Some(header.value.clone());
            } else if header.name.eq_ignore_ascii_case("content-type") {
                let (media_type, params) = split_content_type(&header.value);
                summary.content_type = Some(media_type);
                summary.content_type_params = params;
            } else if header.name.eq_ignore_ascii_case("content-encoding") {
                summary.content_encoding = Some(header.value.clone());
            }
        }
        summary
    }

    /// Info-column fragment: `method url version` for SYN_STREAM,
    /// `status version` for SYN_REPLY.
    pub fn request_line(&self, kind: ControlType) -> Option<String> {
        let verb = self.verb.as_deref()?;
        let version = self.version.as_deref()?;
        match (kind, self.url.as_deref()) {
            (ControlType::SynStream, Some(url)) => Some(format!("{verb} {url} {version}")),
            _ => Some(format!("{verb} {version}")),
        }
    }
}

/// Lower-cases the media type up to the first `;` or whitespace and returns
/// whatever follows (with leading `;`/whitespace stripped) as the parameter
/// string.
pub fn split_content_type(raw: &str) -> (String, Option<String>) {
    let end = raw
        .find(|c: char| c == ';' || c.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let media_type = raw[..end].to_ascii_lowercase();
    let params = raw[end..].trim_start_matches(|c: char| c == ';' || c.is_ascii_whitespace());
    let params = if params.is_empty() {
        None
    } else {
        Some(params.to_string())
    };
    (media_type, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_block(pairs: &[(&str, &str)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
        for (name, value) in pairs {
            out.extend_from_slice(&(name.len() as u32).to_be_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&(value.len() as u32).to_be_bytes());
            out.extend_from_slice(value.as_bytes());
        }
        out
    }

    #[test]
    fn test_order_and_duplicates_preserved() {
        let block = encode_block(&[
            ("method", "GET"),
            ("set-cookie", "a=1"),
            ("set-cookie", "b=2"),
            ("url", "/index.html"),
        ]);
        let (parsed, diag) = parse_header_block(&block);
        assert!(diag.is_none());
        assert_eq!(parsed.declared_count, 4);
        let names: Vec<&str> = parsed.headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["method", "set-cookie", "set-cookie", "url"]);
        assert_eq!(parsed.headers[2].value, "b=2");
    }

    #[test]
    fn test_count_exceeding_block_is_rejected() {
        let mut block = encode_block(&[("a", "b")]);
        // Claim far more pairs than the block can hold.
        block[..4].copy_from_slice(&10_000u32.to_be_bytes());
        let (parsed, diag) = parse_header_block(&block);
        assert!(parsed.headers.is_empty());
        match diag {
            Some(Diagnostic::MalformedHeaderBlock { declared, .. }) => {
                assert_eq!(declared, 10_000)
            }
            other => panic!("Expected MalformedHeaderBlock, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_list_keeps_prefix() {
        let mut block = encode_block(&[("method", "GET"), ("url", "/")]);
        block.truncate(block.len() - 3);
        let (parsed, diag) = parse_header_block(&block);
        assert_eq!(parsed.headers.len(), 1);
        assert_eq!(parsed.headers[0].name, "method");
        assert!(matches!(diag, Some(Diagnostic::Truncated { .. })));
    }

    #[test]
    fn test_summary_extraction() {
        let block = encode_block(&[
            ("Method", "POST"),
            ("URL", "/upload"),
            ("Version", "HTTP/1.1"),
            ("Content-Type", "Text/HTML; charset=utf-8"),
            ("Content-Encoding", "gzip"),
        ]);
        let (parsed, _) = parse_header_block(&block);
        let summary = HeaderSummary::from_headers(&parsed.headers);
        assert_eq!(summary.verb.as_deref(), Some("POST"));
        assert_eq!(summary.content_type.as_deref(), Some("text/html"));
        assert_eq!(summary.content_type_params.as_deref(), Some("charset=utf-8"));
        assert_eq!(summary.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(
            summary.request_line(ControlType::SynStream).as_deref(),
            Some("POST /upload HTTP/1.1")
        );
    }

    #[test]
    fn test_reply_summary_line() {
        let block = encode_block(&[("status", "200 OK"), ("version", "HTTP/1.1")]);
        let (parsed, _) = parse_header_block(&block);
        let summary = HeaderSummary::from_headers(&parsed.headers);
        assert_eq!(
            summary.request_line(ControlType::SynReply).as_deref(),
            Some("200 OK HTTP/1.1")
        );
    }

    #[test]
    fn test_split_content_type_plain() {
        assert_eq!(split_content_type("image/png"), ("image/png".into(), None));
        assert_eq!(
            split_content_type("TEXT/plain;charset=iso-8859-1"),
            ("text/plain".into(), Some("charset=iso-8859-1".into()))
        );
    }
}
