use std::str::FromStr;

use anyhow::anyhow;

use crate::my_dns_resolver::{DnsFault, MyTxtResolver};
use crate::my_logger::prelude::*;
use crate::my_spf_verifier::{AuthResult, IndeterminateReason};

//====================================================================
pub const DKIM_SELECTORS: [&str; 24] = [
    "default",
    "google",
    "selector1",
    "selector2",
    "sig1",
    "fm1",
    "zm1",
    "zm2",
    "protonmail1",
    "protonmail2",
    "amazonses",
    "k1",
    "mandrill",
    "s1",
    "s2",
    "sendgrid",
    "pm",
    "yahoo",
    "mailru",
    "qq",
    "yandex",
    "dkim",
    "notes",
    "sib",
];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DkimProbe {
    FirstMatch,
    Exhaustive, // later timeouts/faults still override an earlier find
}

impl FromStr for DkimProbe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first_match" => Ok(Self::FirstMatch),
            "exhaustive"  => Ok(Self::Exhaustive),
            _ => Err(anyhow!("unknown DKIM probe mode: \"{}\"", s)),
        }
    }
}

//====================================================================
pub async fn dkim_verify(domain: &str, resolver: &dyn MyTxtResolver, probe: DkimProbe) -> AuthResult {
    let mut is_found = false;
    for selector in DKIM_SELECTORS {
        let query_key = format!("{}._domainkey.{}", selector, domain); // see "section 3.6.2.1" in RFC6376
        match resolver.lookup_txt(&query_key).await {
            Ok(records) => {
                if records.len() > 0 {
                    debug!("DKIM record is found: {}", query_key);
                    is_found = true;
                    if probe == DkimProbe::FirstMatch {
                        break;
                    }
                }
            },
            Err(DnsFault::NoAnswer) | Err(DnsFault::NxDomain) => continue,
            Err(DnsFault::Timeout) => {
                debug!("DKIM probe of {} is aborted by timeout at {}", domain, selector);
                return AuthResult::Indeterminate(IndeterminateReason::Timeout);
            },
            Err(DnsFault::NoNameservers(e)) => {
                debug!("DKIM probe of {} is aborted ({}) at {}", domain, e, selector);
                return AuthResult::NotFound;
            },
            Err(DnsFault::Other(e)) => {
                warn!("DKIM lookup of {} failed: {}", query_key, e);
                return AuthResult::Indeterminate(IndeterminateReason::Fault);
            },
        }
    }
    if is_found {
        AuthResult::Found
    } else {
        AuthResult::NotFound
    }
}
