//! Best-effort decoding of raw mailbox entries.
//!
//! Decoding never fails. Malformed input degrades to whatever can still be
//! recovered and a warning is logged for each lossy step.

use std::sync::OnceLock;

use mail_parser::decoders::html::add_html_token;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use regex::{Captures, Regex};
use tracing::warn;

use super::mailbox::RawMessage;

/// Normalized view of a message used for classification and record building.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    pub subject: String,
    pub sender: String,
    pub body: String,
    /// Message-ID without angle brackets, when the header is present.
    pub message_id: Option<String>,
}

/// Decodes a raw message into subject, sender and a plain-text body.
pub fn decode(raw: &RawMessage) -> ParsedMessage {
    decode_bytes(&raw.content, &raw.uid.to_string())
}

fn decode_bytes(bytes: &[u8], context: &str) -> ParsedMessage {
    let message = match MessageParser::default().parse(bytes) {
        Some(message) => message,
        None => {
            warn!(
                uid = context,
                "DecodeDegradation: message could not be parsed, using raw bytes as body"
            );
            return ParsedMessage {
                body: lossy_utf8(bytes, context),
                ..Default::default()
            };
        }
    };

    ParsedMessage {
        subject: message.subject().unwrap_or_default().trim().to_string(),
        sender: extract_sender(&message, bytes, context),
        body: extract_body(&message, context),
        message_id: message
            .message_id()
            .map(normalize_message_id)
            .filter(|id| !id.is_empty()),
    }
}

fn extract_sender(message: &Message, bytes: &[u8], context: &str) -> String {
    let formatted = message
        .from()
        .and_then(|addresses| addresses.first())
        .map(format_address)
        .filter(|sender| !sender.is_empty());

    match formatted {
        Some(sender) => sender,
        None => match raw_header(bytes, "from") {
            Some(raw) => {
                warn!(
                    uid = context,
                    "DecodeDegradation: From header not parseable, keeping raw text"
                );
                decode_header_text(&raw)
            }
            None => String::new(),
        },
    }
}

fn format_address(addr: &mail_parser::Addr) -> String {
    let address = addr.address().unwrap_or_default();
    match addr.name().map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) if !address.is_empty() => format!("{} <{}>", name, address),
        Some(name) => name.to_string(),
        None => address.to_string(),
    }
}

fn extract_body(message: &Message, context: &str) -> String {
    let Some(root) = message.parts.first() else {
        return String::new();
    };

    if !matches!(root.body, PartType::Multipart(_)) {
        return single_part_body(root, context);
    }

    // `parts` is flattened in depth-first order; nested message/rfc822
    // parts keep their own part list and are not searched.
    let candidates = || message.parts.iter().filter(|part| !is_attachment(part));

    if let Some(text) = candidates().find_map(|part| match &part.body {
        PartType::Text(text) if is_plain_text(part) => Some(text.as_ref()),
        _ => None,
    }) {
        return text.to_string();
    }

    if let Some(html) = candidates().find_map(|part| match &part.body {
        PartType::Html(html) => Some(html.as_ref()),
        _ => None,
    }) {
        return html_to_text(html);
    }

    String::new()
}

fn single_part_body(part: &MessagePart, context: &str) -> String {
    match &part.body {
        PartType::Text(text) => text.to_string(),
        PartType::Html(html) => html.to_string(),
        PartType::Binary(data) | PartType::InlineBinary(data) => lossy_utf8(data, context),
        PartType::Message(_) | PartType::Multipart(_) => String::new(),
    }
}

fn is_attachment(part: &MessagePart) -> bool {
    part.content_disposition()
        .is_some_and(|disposition| disposition.ctype().eq_ignore_ascii_case("attachment"))
}

fn is_plain_text(part: &MessagePart) -> bool {
    match part.content_type() {
        // Parts without a Content-Type default to text/plain.
        None => true,
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct
                    .subtype()
                    .map_or(true, |subtype| subtype.eq_ignore_ascii_case("plain"))
        }
    }
}

fn lossy_utf8(bytes: &[u8], context: &str) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            warn!(
                uid = context,
                "DecodeDegradation: invalid UTF-8 in body, replacing bad sequences"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Returns the unfolded value of the first header named `name` in the raw
/// header block.
fn raw_header(bytes: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut value: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        if let Some(current) = value.as_mut() {
            if line.starts_with(' ') || line.starts_with('\t') {
                current.push(' ');
                current.push_str(line.trim());
                continue;
            }
            break;
        }
        if let Some((header, rest)) = line.split_once(':') {
            if header.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }

    value.filter(|v| !v.is_empty())
}

/// Decodes RFC 2047 encoded words in a header value that failed structured
/// parsing. Returns the input unchanged when nothing decodes.
fn decode_header_text(raw: &str) -> String {
    let header = format!("Subject: {}\r\n\r\n", raw);
    MessageParser::default()
        .parse(header.as_bytes())
        .and_then(|message| message.subject().map(|s| s.trim().to_string()))
        .filter(|decoded| !decoded.is_empty())
        .unwrap_or_else(|| raw.to_string())
}

pub(crate) fn normalize_message_id(value: &str) -> String {
    value
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

/// Converts an HTML body to readable plain text.
pub fn html_to_text(html: &str) -> String {
    let without_scripts = hidden_block_regex().replace_all(html, "");
    let with_breaks = block_break_regex().replace_all(&without_scripts, "\n");
    let without_tags = html_tag_regex().replace_all(&with_breaks, "");
    let decoded = unescape_entities(&without_tags);

    let mut lines: Vec<String> = Vec::new();
    for line in decoded.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        lines.push(collapsed);
    }
    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Replaces named and numeric character references in one pass so that an
/// escaped ampersand never produces a second round of unescaping. Unknown
/// names are kept verbatim.
fn unescape_entities(text: &str) -> String {
    entity_regex()
        .replace_all(text, |caps: &Captures| {
            let mut resolved = String::new();
            add_html_token(&mut resolved, caps[0].as_bytes(), false);
            resolved
        })
        .into_owned()
}

fn html_tag_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?is)<[^>]+>").expect("valid HTML tag regex"))
}

fn hidden_block_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|head)\b[^>]*>.*?</(script|style|head)\s*>")
            .expect("valid hidden block regex")
    })
}

fn block_break_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(p|div|li|tr|h[1-6])\s*>").expect("valid block break regex")
    })
}

fn entity_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});")
            .expect("valid entity regex")
    })
}
