use lazy_static::lazy_static;
use mail_parser::MessageParser;
use regex::Regex;

// Address part of an address header value ("Name <local@domain>" => "local@domain").
// Returns an empty string when nothing address-like is found.
pub fn parse_mail_address(header_value: &str) -> String {
    let unfolded = header_value.replace(['\r', '\n'], " ");
    let block = format!("From: {}\r\n\r\n", unfolded);
    if let Some(message) = MessageParser::default().parse(block.as_bytes()) {
        let address = message.from()
            .and_then(|x| x.first())
            .and_then(|addr| addr.address.as_deref())
            .map(str::trim)
            .unwrap_or_default();
        if address.len() > 0 {
            return address.to_string();
        }
    }
    lazy_static! {
        static ref REGEX_ANGLE_ADDR: Regex = Regex::new(r"<([^<>]*)>").unwrap();
    }
    if let Some(caps) = REGEX_ANGLE_ADDR.captures(&unfolded) {
        return caps[1].trim().to_string(); // may be empty (null sender "<>")
    }
    unfolded.trim().to_string()
}

pub fn domain_of_address(address: &str) -> String {
    address.rsplit('@').next().unwrap_or_default().to_lowercase()
}

pub fn top_level_label(domain: &str) -> String {
    domain.rsplit('.').next().unwrap_or_default().to_string()
}

// "%XX" sequences are decoded as UTF-8, invalid sequences become U+FFFD; "+" is kept.
pub fn percent_decode(s: &str) -> String {
    let decoded = urlencoding::decode_binary(s.as_bytes());
    String::from_utf8_lossy(&decoded).into_owned()
}

//====================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_address_from_display_name_form() {
        assert_eq!(parse_mail_address("\"Bob Smith\" <bob@example.com>"), "bob@example.com");
        assert_eq!(parse_mail_address("<a@x.com>"), "a@x.com");
        assert_eq!(parse_mail_address("a@x.com"), "a@x.com");
    }

    #[test]
    fn null_sender_yields_empty_address() {
        assert_eq!(parse_mail_address("<>"), "");
    }

    #[test]
    fn domain_is_text_after_last_at_sign() {
        assert_eq!(domain_of_address("weird@local@Example.ORG"), "example.org");
        assert_eq!(domain_of_address("no-at-sign"), "no-at-sign");
        assert_eq!(domain_of_address(""), "");
    }

    #[test]
    fn top_level_label_is_last_dot_separated_part() {
        assert_eq!(top_level_label("mail.example.co.uk"), "uk");
        assert_eq!(top_level_label("localhost"), "localhost");
    }

    #[test]
    fn percent_decoding_keeps_plus_and_replaces_invalid_utf8() {
        assert_eq!(percent_decode("http://x.com/a%20b+c"), "http://x.com/a b+c");
        assert_eq!(percent_decode("%E3%81%82"), "\u{3042}");
        assert_eq!(percent_decode("%FF"), "\u{FFFD}");
    }
}
