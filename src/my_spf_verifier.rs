use crate::my_dns_resolver::{DnsFault, MyTxtResolver};
use crate::my_logger::prelude::*;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IndeterminateReason {
    Timeout,
    Fault,
    NoSender,
}

/// Outcome of a DNS-based sender authentication probe.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AuthResult {
    Found,
    NotFound,
    Indeterminate(IndeterminateReason),
}

impl std::fmt::Display for AuthResult {
    fn fmt(&self, dest: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::Found            => "1",
            Self::NotFound         => "0",
            Self::Indeterminate(_) => "None",
        };
        write!(dest, "{}", s)
    }
}

pub fn spf_verify_records(records: &[String]) -> AuthResult {
    if records.iter().any(|record| record.contains("v=spf1")) {
        AuthResult::Found
    } else {
        AuthResult::NotFound
    }
}

pub async fn spf_verify(domain: &str, resolver: &dyn MyTxtResolver) -> AuthResult {
    let result = match resolver.lookup_txt(domain).await {
        Ok(records) => spf_verify_records(&records),
        Err(DnsFault::NoAnswer) => AuthResult::NotFound,
        Err(DnsFault::NxDomain) => AuthResult::NotFound,
        Err(DnsFault::NoNameservers(_)) => AuthResult::NotFound,
        Err(DnsFault::Timeout) => AuthResult::Indeterminate(IndeterminateReason::Timeout),
        Err(DnsFault::Other(e)) => {
            warn!("SPF lookup of {} failed: {}", domain, e);
            AuthResult::Indeterminate(IndeterminateReason::Fault)
        },
    };
    debug!("SPF {}: {:?}", domain, result);
    result
}
