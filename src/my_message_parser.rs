use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::my_str;

//====================================================================
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum MessageFault {
    #[error("message has no header field at all")]
    NoHeaders,
}

/// How the body is recovered when no blank line separates it from the headers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BodyStrategy {
    LastHeaderValue,
    LastHeaderRemainder,
}

#[derive(Debug, Clone)]
pub struct ParsedMessage {
    unix_from: Option<String>,
    headers: Vec<(String, String)>,
    body: String,
}

//====================================================================
lazy_static! {
    // printable ASCII except SP and ":" (RFC5322 "ftext"), then ":"
    static ref REGEX_HEADER_FIELD_NAME: Regex = Regex::new(r"^([\x21-\x39\x3b-\x7e]+):").unwrap();
    static ref REGEX_LINE_BREAK: Regex = Regex::new(r"\r\n|\r|\n").unwrap();
}

// each line keeps its terminator; CRLF, a bare CR and LF all end a line
fn split_lines_inclusive(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    for m in REGEX_LINE_BREAK.find_iter(text) {
        lines.push(&text[start..m.end()]);
        start = m.end();
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

enum LineKind {
    Continuation,
    Envelope,
    InvalidField,
    Field,
    Other,
}

fn classify_line(line: &str) -> LineKind {
    if line.starts_with(' ') || line.starts_with('\t') {
        LineKind::Continuation
    } else if line.starts_with("From ") {
        LineKind::Envelope
    } else if line.starts_with(':') {
        LineKind::InvalidField
    } else if REGEX_HEADER_FIELD_NAME.is_match(line) {
        LineKind::Field
    } else {
        LineKind::Other
    }
}

pub fn parse_message(text: &str) -> ParsedMessage {
    let mut unix_from = None;
    let mut headers: Vec<(String, Vec<String>)> = Vec::new();
    let mut body_offset = text.len();
    let mut offset = 0;
    let mut lines = split_lines_inclusive(text).into_iter().peekable();
    let mut lineno = 0;
    while let Some(raw_line) = lines.next() {
        let line = raw_line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            body_offset = offset + raw_line.len(); // separator is consumed
            break;
        }
        match classify_line(line) {
            LineKind::Continuation => {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(line.to_string());
                }
                // a continuation before any field is dropped
            },
            LineKind::Envelope => {
                let is_last_header_line = match lines.peek() {
                    Some(next) => {
                        let next = next.trim_end_matches(['\r', '\n']);
                        next.is_empty() || matches!(classify_line(next), LineKind::Other)
                    },
                    None => true,
                };
                if lineno == 0 {
                    unix_from = Some(line.to_string());
                } else if is_last_header_line {
                    body_offset = offset; // misplaced envelope line starts the body
                    break;
                }
            },
            LineKind::InvalidField => (), // skip
            LineKind::Field => {
                let (name, value) = line.split_once(':').unwrap_or((line, ""));
                headers.push((name.to_string(), vec![value.trim_start_matches([' ', '\t']).to_string()]));
            },
            LineKind::Other => {
                body_offset = offset; // this line belongs to the body
                break;
            },
        }
        offset += raw_line.len();
        lineno += 1;
    }
    let headers = headers.into_iter().map(|(name, lines)| (name, lines.join("\n"))).collect();
    ParsedMessage {
        unix_from,
        headers,
        body: text[body_offset.min(text.len())..].to_string(),
    }
}

//====================================================================
impl ParsedMessage {
    #[allow(unused)]
    pub fn unix_from(&self) -> Option<&str> {
        self.unix_from.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of the named header (case-insensitive), possibly empty.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Like `header`, but an empty first value counts as absent.
    pub fn header_nonempty(&self, name: &str) -> Option<&str> {
        self.header(name).filter(|v| !v.is_empty())
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers.iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn last_header(&self) -> Option<(&str, &str)> {
        self.headers.last().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn raw_body(&self) -> &str {
        &self.body
    }

    /// The text the content features are computed from.
    pub fn body_content(&self, normalized: &str, strategy: BodyStrategy) -> Result<String, MessageFault> {
        let (last_name, last_value) = self.last_header().ok_or(MessageFault::NoHeaders)?;
        if !self.body.trim().is_empty() {
            return Ok(self.body.clone());
        }
        let content = match strategy {
            BodyStrategy::LastHeaderValue => last_value.to_string(),
            BodyStrategy::LastHeaderRemainder => {
                let index = normalized.find(last_name).unwrap_or(0);
                let mut content = normalized.get(index + last_name.len()..).unwrap_or_default().trim().to_string();
                for (name, value) in self.headers() {
                    if name == last_name || !content.contains(name.as_str()) {
                        continue;
                    }
                    content = content.replace(name.as_str(), " ");
                    if !value.is_empty() {
                        content = content.replace(value.as_str(), " ");
                    }
                }
                content
            },
        };
        Ok(content)
    }

    /// Address part of "Return-Path", lower-cased. `None` when the header is absent or empty.
    pub fn get_envelop_from(&self) -> Option<String> {
        self.header_nonempty("Return-Path")
            .map(my_str::parse_mail_address)
            .map(|s| s.to_lowercase())
    }

    pub fn get_header_from(&self) -> Option<String> {
        self.header_nonempty("From")
            .map(my_str::parse_mail_address)
            .map(|s| s.to_lowercase())
    }
}
