use std::str::FromStr;

use anyhow::{anyhow, Error};

use crate::my_message_parser::BodyStrategy;

//====================================================================
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DatasetProfile {
    SpamAssassin,
    HardSpam,
}

impl std::fmt::Display for DatasetProfile {
    fn fmt(&self, dest: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::SpamAssassin => "spam_assassin",
            Self::HardSpam     => "hard_spam",
        };
        write!(dest, "{}", s)
    }
}

impl FromStr for DatasetProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spam_assassin" => Ok(Self::SpamAssassin),
            "hard_spam"     => Ok(Self::HardSpam),
            _ => Err(anyhow!("unknown dataset profile: \"{}\"", s)),
        }
    }
}

// repair dictionary for the header normalizer (order matters)
const SPAM_ASSASSIN_HEADER_TOKENS: [&str; 34] = [
    "Return-Path:",
    "Delivered-To:",
    "Received:",
    "Date:",
    "From", // no colon: also splits "From " envelope lines
    "To:",
    "Subject:",
    "Message-Id:",
    "Mail-Followup-To:",
    "References:",
    "MIME-Version:",
    "Content-Type:",
    "Content-Disposition:",
    "User-Agent:",
    "Sender:",
    "Errors-To:",
    "X-Mailman-Version:",
    "Precedence:",
    "List-Id:",
    "X-Beenthere:",
    "In-Reply-To:",
    "load average:",
    "List maintainer:",
    "Content-Transfer-Encoding:",
    "Delivery-Date:",
    "List-Archive:",
    "X-Priority:",
    "X-Msmail-Priority:",
    "X-Mailer:",
    "X-Mimeole:",
    "List-Help:",
    "List-Post:",
    "List-Subscribe:",
    "List-Unsubscribe:",
];

const HARD_SPAM_HEADER_TOKENS: [&str; 49] = [
    "Return-Path:",
    "Delivered-To:",
    "Received:",
    "Date:",
    "From",
    "To:",
    "Subject:",
    "Message-Id:",
    "Message-ID:",
    "Mail-Followup-To:",
    "References:",
    "MIME-Version:",
    "Content-Type:",
    "Content-type:",
    "Content-Disposition:",
    "User-Agent:",
    "Sender:",
    "Errors-To:",
    "X-Mailman-Version:",
    "Precedence:",
    "List-Id:",
    "X-Beenthere:",
    "In-Reply-To:",
    "load average:",
    "List maintainer:",
    "Content-Transfer-Encoding:",
    "Delivery-Date:",
    "List-Archive:",
    "X-Priority:",
    "X-Msmail-Priority:",
    "X-Mailer:",
    "X-Mimeole:",
    "List-Help:",
    "List-Post:",
    "List-Subscribe:",
    "List-Unsubscribe:",
    "Mime-Version:",
    "X-Mailer-Version:",
    "filename",
    "Importance:",
    "X-MimeOLE:",
    "X-Archived:",
    "Reply-To:",
    "X-Content_id:",
    "X-MailScanner:",
    "X-MailScanner-SpamCheck:",
    "X-Originalarrivaltime:",
    "X-MSMail-Priority:",
    "Cc:",
];

impl DatasetProfile {
    pub fn header_tokens(&self) -> &'static [&'static str] {
        match self {
            Self::SpamAssassin => &SPAM_ASSASSIN_HEADER_TOKENS,
            Self::HardSpam     => &HARD_SPAM_HEADER_TOKENS,
        }
    }

    pub fn body_strategy(&self) -> BodyStrategy {
        match self {
            Self::SpamAssassin => BodyStrategy::LastHeaderValue,
            Self::HardSpam     => BodyStrategy::LastHeaderRemainder,
        }
    }

    /// Number of leading entries of the date pattern table this profile tries.
    pub fn date_pattern_count(&self) -> usize {
        match self {
            Self::SpamAssassin => 6,
            Self::HardSpam     => 7,
        }
    }

    pub fn reply_headers(&self) -> &'static [&'static str] {
        match self {
            Self::SpamAssassin => &["In-Reply-To", "References"],
            Self::HardSpam     => &["In-Reply-To", "References", "Reply-To"],
        }
    }

    pub fn default_input_path(&self) -> &'static str {
        match self {
            Self::SpamAssassin => "./spam_assassin.csv",
            Self::HardSpam     => "./hard_spam",
        }
    }

    pub fn default_output_path(&self) -> &'static str {
        match self {
            Self::SpamAssassin => "./features.csv",
            Self::HardSpam     => "./features_hard_spam.csv",
        }
    }
}
