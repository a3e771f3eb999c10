use lazy_static::lazy_static;
use regex::Regex;
use scraper;

use crate::my_logger::prelude::*;
use crate::my_message_parser::ParsedMessage;
use crate::my_str;

//====================================================================
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ContentKind {
    Html,
    Plain,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContentAnalysis {
    pub kind: ContentKind,
    pub text: String, // visible text (HTML) or the content itself (plain)
    pub links: Vec<String>,
    pub images: Vec<String>,
    pub num_html_links: usize,
}

/// Header-derived and content-derived signals of one message.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContentFeatures {
    pub has_subject: u8,
    pub content_type: Option<String>,
    pub content_disp: Option<String>,
    pub num_html: usize,
    pub has_attachment: u8,
    pub num_exc_mark: usize,
    pub has_list_id: u8,
    pub process_content: String,
}

//====================================================================
pub fn is_html_message(raw: &str) -> bool {
    lazy_static! {
        static ref REGEX_HTML_TAG: Regex = Regex::new(r"(?i)<html|<body|<div|<span|<p>").unwrap();
    }
    REGEX_HTML_TAG.is_match(raw)
}

fn extract_visible_text(dom: &scraper::Html) -> String {
    let mut lines = Vec::new();
    for node in dom.root_element().descendants() {
        let text = match node.value().as_text() {
            Some(t) => t,
            None => continue,
        };
        let in_script = node.parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_ascii_lowercase()))
            .map(|name| name == "script" || name == "style")
            .unwrap_or(false);
        if in_script {
            continue;
        }
        let text = text.trim();
        if text.len() > 0 {
            lines.push(text.to_string());
        }
    }
    lines.join("\n")
}

fn analyze_html(content: &str) -> ContentAnalysis {
    let dom = scraper::Html::parse_document(content);
    let text = extract_visible_text(&dom);
    let selector_img = scraper::Selector::parse(r"img[src]").unwrap();
    let images: Vec<String> = dom.select(&selector_img)
        .filter_map(|elem| elem.value().attr("src"))
        .map(str::to_string)
        .collect();
    let selector_a = scraper::Selector::parse(r"a[href]").unwrap();
    let links: Vec<String> = dom.select(&selector_a)
        .filter_map(|elem| elem.value().attr("href"))
        .map(my_str::percent_decode)
        .filter(|url| url.starts_with("http")) // covers "https" too
        .collect();
    let num_html_links = links.len();
    ContentAnalysis {
        kind: ContentKind::Html,
        text,
        links,
        images,
        num_html_links,
    }
}

fn analyze_plain(content: &str, content_type: Option<&str>) -> ContentAnalysis {
    lazy_static! {
        static ref REGEX_LIKE_URL: Regex = Regex::new(r#"(?i)(https?://[^\s]+|www\.[^\s]+|<a\s+href=['"].*?['"])"#).unwrap();
    }
    let links: Vec<String> = REGEX_LIKE_URL.find_iter(content).map(|m| m.as_str().to_string()).collect();
    let num_html_links = if links.len() > 0 {
        links.len()
    } else if content_type == Some("text/html") {
        1 // declared HTML without any recognizable link
    } else {
        0
    };
    ContentAnalysis {
        kind: ContentKind::Plain,
        text: content.to_string(),
        links,
        images: Vec::new(),
        num_html_links,
    }
}

/// `raw` is the message before header normalization; it decides HTML vs plain.
pub fn classify_content(raw: &str, content: &str, content_type: Option<&str>) -> ContentAnalysis {
    if is_html_message(raw) {
        analyze_html(content)
    } else {
        analyze_plain(content, content_type)
    }
}

pub fn has_attachment(images: &[String], content_type: Option<&str>, transfer_encoding: Option<&str>, content_disp: Option<&str>) -> bool {
    if images.len() > 0 {
        return true;
    }
    if let Some(ctype) = content_type {
        if ["image/", "application/", "audio/", "video/"].iter().any(|prefix| ctype.starts_with(prefix)) {
            return true;
        }
    }
    if let Some(encoding) = transfer_encoding {
        if encoding.to_lowercase().contains("base64") {
            return true;
        }
    }
    if let Some(disp) = content_disp {
        if disp.to_lowercase().contains("attachment") {
            return true;
        }
    }
    false
}

//====================================================================
pub fn extract_content_features(raw: &str, message: &ParsedMessage, content: &str) -> ContentFeatures {
    let content_type = message.header_nonempty("Content-Type")
        .map(|s| s.split(';').next().unwrap_or_default().to_string());
    let content_disp = message.header_nonempty("Content-Disposition").map(str::to_string);
    let subject = message.header_nonempty("Subject");

    let analysis = classify_content(raw, content, content_type.as_deref());
    trace!("{:?} content: {} link(s), {} image(s)", analysis.kind, analysis.links.len(), analysis.images.len());
    let process_content = format!("{}{}", subject.unwrap_or_default(), analysis.text);
    let num_exc_mark = process_content.matches('!').count();
    let has_attachment = has_attachment(
        &analysis.images,
        content_type.as_deref(),
        message.header_nonempty("Content-Transfer-Encoding"),
        content_disp.as_deref(),
    );

    ContentFeatures {
        has_subject: subject.is_some() as u8,
        content_type,
        content_disp,
        num_html: analysis.num_html_links,
        has_attachment: has_attachment as u8,
        num_exc_mark,
        has_list_id: message.header_nonempty("List-Id").is_some() as u8,
        process_content,
    }
}
