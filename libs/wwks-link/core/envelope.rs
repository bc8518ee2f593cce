//! WWKS envelope helpers
//!
//! Every message on the wire is wrapped as
//! `<WWKS Version="2.0" TimeStamp="2024-01-01T12:00:00Z">...</WWKS>`.
//! Only the structure this link needs is interpreted here: the name of the
//! element inside the envelope and individual attributes of a start tag.
//! Full payload decoding belongs to the consumer.

use chrono::Utc;
use std::fmt;

/// Envelope element name
pub const ENVELOPE: &str = "WWKS";

/// Literal closing tag used as the framing delimiter
pub const CLOSING_TAG: &str = "</WWKS>";

/// Protocol version written on outgoing envelopes
pub const VERSION: &str = "2.0";

/// Current UTC time in envelope format
pub fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Request id: current time modulo one million
pub fn message_id() -> String {
    Utc::now().timestamp_micros().rem_euclid(1_000_000).to_string()
}

/// Wrap a message body in a fresh envelope
pub fn wrap(body: &str) -> String {
    format!(
        "<{ENVELOPE} Version=\"{VERSION}\" TimeStamp=\"{}\">{body}{CLOSING_TAG}",
        timestamp()
    )
}

/// Name of the first element inside the envelope
///
/// Declarations (`<?xml ...?>`) and comments are skipped. Returns `None`
/// for an empty or self-closing envelope.
pub fn message_kind(raw: &str) -> Option<&str> {
    let mut rest = raw;
    let mut inside_envelope = false;

    loop {
        let open = rest.find('<')?;
        let after = &rest[open + 1..];

        if after.starts_with('?') || after.starts_with('!') {
            let end = after.find('>')?;
            rest = &after[end + 1..];
            continue;
        }
        if after.starts_with('/') {
            return None;
        }

        let name_len = after
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(after.len());
        let name = &after[..name_len];

        if inside_envelope {
            return (!name.is_empty()).then_some(name);
        }

        let end = after.find('>')?;
        if after[..end].ends_with('/') {
            return None;
        }
        inside_envelope = true;
        rest = &after[end + 1..];
    }
}

/// Start tag of the first `element` in `raw`, from `<` to `>` inclusive
pub fn start_tag<'a>(raw: &'a str, element: &str) -> Option<&'a str> {
    let mut offset = 0;

    while let Some(found) = raw[offset..].find('<') {
        let open = offset + found;
        let after = &raw[open + 1..];

        if let Some(tail) = after.strip_prefix(element) {
            let boundary = tail.chars().next();
            if matches!(boundary, Some(c) if c.is_whitespace() || c == '/' || c == '>') {
                let close = after.find('>')?;
                return Some(&raw[open..open + 1 + close + 1]);
            }
        }
        offset = open + 1;
    }

    None
}

/// Value of attribute `name` inside a single start tag
///
/// Matches whole attribute names only (`Id` never matches `TenantId`) and
/// accepts either quote style with optional whitespace around `=`.
pub fn attribute<'a>(tag: &'a str, name: &str) -> Option<&'a str> {
    let mut offset = 0;

    while let Some(found) = tag[offset..].find(name) {
        let at = offset + found;
        offset = at + name.len();

        let preceded_by_space = tag[..at].chars().next_back().is_some_and(char::is_whitespace);
        if !preceded_by_space {
            continue;
        }

        let rest = tag[offset..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let quote = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => continue,
        };
        let value = &rest[1..];
        let end = value.find(quote)?;
        return Some(&value[..end]);
    }

    None
}

/// Message types the link itself knows about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    HelloResponse,
    StatusResponse,
    StockInfoResponse,
    OutputResponse,
    OutputMessage,
    InputMessage,
    TaskInfoResponse,
    KeepAliveRequest,
    Other(String),
}

impl MessageKind {
    /// Classify an element name
    pub fn from_name(name: &str) -> Self {
        match name {
            "HelloResponse" => Self::HelloResponse,
            "StatusResponse" => Self::StatusResponse,
            "StockInfoResponse" => Self::StockInfoResponse,
            "OutputResponse" => Self::OutputResponse,
            "OutputMessage" => Self::OutputMessage,
            "InputMessage" => Self::InputMessage,
            "TaskInfoResponse" => Self::TaskInfoResponse,
            "KeepAliveRequest" => Self::KeepAliveRequest,
            other => Self::Other(other.to_string()),
        }
    }

    /// Classify a complete raw message
    pub fn of(raw: &str) -> Self {
        Self::from_name(message_kind(raw).unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::HelloResponse => "HelloResponse",
            Self::StatusResponse => "StatusResponse",
            Self::StockInfoResponse => "StockInfoResponse",
            Self::OutputResponse => "OutputResponse",
            Self::OutputMessage => "OutputMessage",
            Self::InputMessage => "InputMessage",
            Self::TaskInfoResponse => "TaskInfoResponse",
            Self::KeepAliveRequest => "KeepAliveRequest",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kind() {
        let raw = r#"<WWKS Version="2.0" TimeStamp="2024-01-01T00:00:00Z"><StockInfoResponse Id="1"><Article Id="A"/></StockInfoResponse></WWKS>"#;
        assert_eq!(message_kind(raw), Some("StockInfoResponse"));
        assert_eq!(MessageKind::of(raw), MessageKind::StockInfoResponse);
    }

    #[test]
    fn test_message_kind_skips_declaration_and_whitespace() {
        let raw = "<?xml version=\"1.0\"?>\r\n<WWKS Version=\"2.0\">\n  <HelloResponse Id=\"3\"/>\n</WWKS>";
        assert_eq!(message_kind(raw), Some("HelloResponse"));
    }

    #[test]
    fn test_message_kind_of_empty_envelope() {
        assert_eq!(message_kind("<WWKS Version=\"2.0\"></WWKS>"), None);
        assert_eq!(message_kind("<WWKS Version=\"2.0\"/>"), None);
        assert_eq!(message_kind("no markup at all"), None);
        assert_eq!(MessageKind::of(""), MessageKind::Other(String::new()));
    }

    #[test]
    fn test_unknown_kind_keeps_its_name() {
        let raw = "<WWKS><ArticleMasterSetRequest/></WWKS>";
        assert_eq!(
            MessageKind::of(raw),
            MessageKind::Other("ArticleMasterSetRequest".into())
        );
        assert_eq!(MessageKind::of(raw).as_str(), "ArticleMasterSetRequest");
    }

    #[test]
    fn test_start_tag_requires_whole_name() {
        let raw = "<WWKS><KeepAliveRequestX Id=\"1\"/><KeepAliveRequest Id=\"2\"/></WWKS>";
        assert_eq!(start_tag(raw, "KeepAliveRequest"), Some("<KeepAliveRequest Id=\"2\"/>"));
        assert_eq!(start_tag(raw, "StatusRequest"), None);
    }

    #[test]
    fn test_attribute_lookup() {
        let tag = r#"<StatusRequest Id="42" Source='100' TenantId = "t" />"#;
        assert_eq!(attribute(tag, "Id"), Some("42"));
        assert_eq!(attribute(tag, "Source"), Some("100"));
        assert_eq!(attribute(tag, "TenantId"), Some("t"));
        assert_eq!(attribute(tag, "Destination"), None);
    }

    #[test]
    fn test_wrap() {
        let wrapped = wrap("<StatusRequest Id=\"1\" />");
        assert!(wrapped.starts_with("<WWKS Version=\"2.0\" TimeStamp=\""));
        assert!(wrapped.ends_with("<StatusRequest Id=\"1\" /></WWKS>"));
        assert_eq!(message_kind(&wrapped), Some("StatusRequest"));

        let stamp = attribute(start_tag(&wrapped, ENVELOPE).unwrap(), "TimeStamp").unwrap();
        assert_eq!(stamp.len(), "2024-01-01T00:00:00Z".len());
        assert!(stamp.ends_with('Z'));
    }

    #[test]
    fn test_message_id_range() {
        let id: i64 = message_id().parse().unwrap();
        assert!((0..1_000_000).contains(&id));
    }
}
