// Flattened corpora lose the line breaks between header fields, so a whole
// header block may arrive as "Return-Path: <a@x> Received: from ... Date: ...".
// Every known token that follows a space is moved back to the start of a line.
// The scan covers the body too: a body sentence containing e.g. " To:" is split
// the same way.

pub fn normalize_headers(raw: &str, tokens: &[&str]) -> String {
    let mut text = raw.to_string();
    for token in tokens {
        if !text.contains(token) {
            continue;
        }
        text = text.replace(&format!(" {}", token), &format!("\n{}", token));
    }
    text
}
