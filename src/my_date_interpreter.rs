use std::str::FromStr;

use anyhow::anyhow;
use chrono::format::{self, Parsed, StrftimeItems};
use chrono::{Datelike, NaiveDateTime, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::my_logger::prelude::*;

//====================================================================
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DateFallthroughPolicy {
    Indeterminate,
    Fault,
}

impl FromStr for DateFallthroughPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "indeterminate" => Ok(Self::Indeterminate),
            "fault"         => Ok(Self::Fault),
            _ => Err(anyhow!("unknown date fallthrough policy: \"{}\"", s)),
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum DateFault {
    #[error("date \"{0}\" matches a known layout but no format parses it")]
    NoFormatMatched(String),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DateFeatures {
    Known { time_period: u8, is_weekday: u8 },
    Indeterminate,
}

impl DateFeatures {
    pub fn time_period(&self) -> Option<u8> {
        match self {
            Self::Known { time_period, .. } => Some(*time_period),
            Self::Indeterminate => None,
        }
    }

    pub fn is_weekday(&self) -> Option<u8> {
        match self {
            Self::Known { is_weekday, .. } => Some(*is_weekday),
            Self::Indeterminate => None,
        }
    }
}

//====================================================================
struct DatePattern {
    regex: Regex,
    formats: [&'static str; 2],
}

lazy_static! {
    static ref DATE_PATTERNS: Vec<DatePattern> = [
        (r"^([A-Za-z]{3}, \d{1,2} [A-Za-z]{3} (?:\b\d{2}\b|\b\d{4}\b) \d{1,2}:\d{1,2}:\d{1,2})",
            ["%a, %d %b %Y %H:%M:%S", "%a, %d %b %y %H:%M:%S"]),
        (r"^(\d{1,2} [A-Za-z]{3} (?:\b\d{2}\b|\b\d{4}\b) \d{1,2}:\d{1,2}:\d{1,2})",
            ["%d %b %Y %H:%M:%S", "%d %b %y %H:%M:%S"]),
        (r"^([A-Za-z]{3},\d{1,2} [A-Za-z]{3} (?:\b\d{2}\b|\b\d{4}\b) \d{1,2}:\d{1,2}:\d{1,2})",
            ["%a,%d %b %Y %H:%M:%S", "%a,%d %b %y %H:%M:%S"]),
        (r"^((?:\b\d{2}\b|\b\d{4}\b)/\d{1,2}/\d{1,2} [A-Za-z]{3} \d{1,2}:\d{1,2}:\d{1,2})",
            ["%Y/%m/%d %a %H:%M:%S", "%y/%m/%d %a %H:%M:%S"]),
        (r"^([A-Za-z]{3}, \d{1,2} [A-Za-z]{3} (?:\b\d{2}\b|\b\d{4}\b) \d{1,2}:\d{1,2})",
            ["%a, %d %b %Y %H:%M", "%a, %d %b %y %H:%M"]),
        (r"^([A-Za-z]{3} [A-Za-z]{3} \d{1,2} \d{1,2}:\d{1,2}:\d{1,2} (?:\b\d{2}\b|\b\d{4}\b))",
            ["%a %b %d %H:%M:%S %Y", "%a %b %d %H:%M:%S %y"]),
        (r"^([A-Za-z]{3},\s+\d{1,2}\s+[A-Za-z]{3}\s+(?:\d{2}|\d{4})\s+\d{1,2}:\d{2}:\d{2})",
            ["%a, %d %b %Y %H:%M:%S", "%a, %d %b %y %H:%M:%S"]),
    ].into_iter().map(|(pattern, formats)| DatePattern {
        regex: Regex::new(pattern).unwrap(),
        formats,
    }).collect();
}

pub const MAX_DATE_PATTERNS: usize = 7;

// strptime-like: the weekday name must be a weekday name but may disagree with the date,
// "%Y" takes exactly four digits, "%y" pivots at 69, and there is no leap second
fn parse_with_format(s: &str, fmt: &str) -> Option<NaiveDateTime> {
    lazy_static! {
        static ref REGEX_FOUR_DIGIT_YEAR: Regex = Regex::new(r"\b\d{4}\b").unwrap();
    }
    if fmt.contains("%Y") && !REGEX_FOUR_DIGIT_YEAR.is_match(s) {
        return None;
    }
    let mut parsed = Parsed::new();
    format::parse(&mut parsed, s, StrftimeItems::new(fmt)).ok()?;
    parsed.weekday = None;
    if parsed.second == Some(60) {
        return None;
    }
    if let (Some(yy), None, None) = (parsed.year_mod_100, parsed.year_div_100, parsed.year) {
        parsed.year_div_100 = Some(if yy >= 69 { 19 } else { 20 });
    }
    parsed.to_naive_datetime_with_offset(0).ok()
}

pub fn hour_to_time_period(hour: u32) -> u8 {
    match hour {
        0..=7  => 1, // night
        8..=17 => 2, // day
        _      => 3, // evening
    }
}

pub fn interpret_date(date_header: Option<&str>, pattern_count: usize, policy: DateFallthroughPolicy) -> Result<DateFeatures, DateFault> {
    let date = match date_header {
        Some(s) => s.trim(),
        None => return Ok(DateFeatures::Indeterminate),
    };
    let (pattern, caps) = match DATE_PATTERNS.iter()
        .take(pattern_count.min(MAX_DATE_PATTERNS))
        .find_map(|p| p.regex.captures(date).map(|caps| (p, caps)))
    {
        Some(v) => v,
        None => {
            debug!("unknown date layout: \"{}\"", date);
            return Ok(DateFeatures::Indeterminate);
        },
    };
    let date_new = &caps[1];
    let mut send_time = None;
    for fmt in pattern.formats {
        if let Some(v) = parse_with_format(date_new, fmt) {
            send_time = Some(v); // a later success overrides an earlier one
        }
    }
    let send_time = match (send_time, policy) {
        (Some(v), _) => v,
        (None, DateFallthroughPolicy::Indeterminate) => {
            warn!("date layout is known but no format parses it: \"{}\"", date);
            return Ok(DateFeatures::Indeterminate);
        },
        (None, DateFallthroughPolicy::Fault) => return Err(DateFault::NoFormatMatched(date.to_string())),
    };
    let is_weekday = send_time.weekday().num_days_from_monday() < 5;
    Ok(DateFeatures::Known {
        time_period: hour_to_time_period(send_time.hour()),
        is_weekday: is_weekday as u8,
    })
}
