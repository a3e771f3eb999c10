use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hickory_resolver::config::ResolverOpts;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::error::ProtoErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use lazy_static::lazy_static;
use rand;
use regex::Regex;
use reqwest;
use serde::Deserialize;
use thiserror::Error;

use crate::my_logger::prelude::*;

//====================================================================
/// Why a TXT lookup produced no records.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum DnsFault {
    #[error("no answer")]
    NoAnswer,
    #[error("no such domain")]
    NxDomain,
    #[error("timeout")]
    Timeout,
    #[error("no nameserver could answer ({0})")]
    NoNameservers(String),
    #[error("resolver fault: {0}")]
    Other(String),
}

#[async_trait]
pub trait MyTxtResolver: Send + Sync {
    async fn lookup_txt(&self, fqdn: &str) -> Result<Vec<String>, DnsFault>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DnsBackend {
    System,
    Doh,
}

impl FromStr for DnsBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "doh"    => Ok(Self::Doh),
            _ => Err(anyhow!("unknown DNS backend: \"{}\"", s)),
        }
    }
}

fn to_absolute_name(fqdn: &str) -> String {
    if fqdn.ends_with('.') {
        fqdn.to_string()
    } else {
        format!("{}.", fqdn) // never expand with the search list
    }
}

//====================================================================
// resolver configured from /etc/resolv.conf (or the platform equivalent)
pub struct MySystemResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl MySystemResolver {
    pub fn new(timeout: Duration) -> Result<Self> {
        let (config, opts) = hickory_resolver::system_conf::read_system_conf()
            .map_err(|e| anyhow!("can not read system DNS configuration: {}", e))?;
        let resolver = TokioAsyncResolver::tokio(config, lookup_options(opts, timeout));
        Ok(Self {
            resolver,
            timeout,
        })
    }
}

fn lookup_options(mut opts: ResolverOpts, timeout: Duration) -> ResolverOpts {
    opts.timeout = timeout;
    opts.attempts = 1; // a timeout is reported, not retried
    opts.cache_size = 0; // every check asks the network, negative answers included
    opts
}

fn classify_resolve_error(e: &ResolveError) -> DnsFault {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => match *response_code {
            ResponseCode::NXDomain => DnsFault::NxDomain,
            ResponseCode::NoError  => DnsFault::NoAnswer,
            code => DnsFault::NoNameservers(format!("{:?}", code)), // SERVFAIL, REFUSED, ...
        },
        ResolveErrorKind::NoConnections => DnsFault::NoNameservers("no connections available".to_string()),
        ResolveErrorKind::Timeout => DnsFault::Timeout,
        ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => DnsFault::Timeout,
        _ => DnsFault::Other(e.to_string()),
    }
}

#[async_trait]
impl MyTxtResolver for MySystemResolver {
    async fn lookup_txt(&self, fqdn: &str) -> Result<Vec<String>, DnsFault> {
        let name = to_absolute_name(fqdn);
        let lookup_future = self.resolver.txt_lookup(name);
        match tokio::time::timeout(self.timeout, lookup_future).await {
            Ok(Ok(response)) => {
                let records: Vec<String> = response.iter().map(|txt| txt.to_string()).collect();
                debug!("TXT {}: {} record(s)", fqdn, records.len());
                if records.len() == 0 {
                    return Err(DnsFault::NoAnswer);
                }
                Ok(records)
            },
            Ok(Err(e)) => {
                let fault = classify_resolve_error(&e);
                debug!("TXT {}: {} ({})", fqdn, fault, e);
                Err(fault)
            },
            Err(_elapsed) => {
                debug!("TXT {}: timed out after {:?}", fqdn, self.timeout);
                Err(DnsFault::Timeout)
            },
        }
    }
}

//====================================================================
// DNS-over-HTTPS with the JSON API
// https://developers.cloudflare.com/1.1.1.1/encryption/dns-over-https/make-api-requests/dns-json/
// https://developers.google.com/speed/public-dns/docs/doh/json?hl=ja

const DNS_QUERY_TYPE_TXT: u16 = 16;

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u16,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug)]
pub struct MyDohResolver {
    client: reqwest::Client,
    base_url: String,
}

impl MyDohResolver {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .https_only(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    async fn issue_request_and_get_response(&self, fqdn: &str) -> Result<DohResponse, reqwest::Error> {
        let random_value: usize = rand::random();
        let options = [
            ("name", fqdn.to_string()),
            ("type", DNS_QUERY_TYPE_TXT.to_string()),
            ("cd", "false".to_string()),
            ("do", "false".to_string()),
            ("random_padding", "x".repeat(random_value % 64 + 1)),
        ];
        let response = self.client.get(&self.base_url)
            .header("Accept", "application/dns-json")
            .query(&options)
            .send()
            .await?;
        response.json::<DohResponse>().await
    }
}

fn classify_doh_status(status: u16) -> Option<DnsFault> {
    // https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-6
    match status {
        0     => None,
        3     => Some(DnsFault::NxDomain),
        2 | 5 => Some(DnsFault::NoNameservers(format!("rcode {}", status))),
        _     => Some(DnsFault::Other(format!("rcode {}", status))),
    }
}

#[async_trait]
impl MyTxtResolver for MyDohResolver {
    async fn lookup_txt(&self, fqdn: &str) -> Result<Vec<String>, DnsFault> {
        let response = match self.issue_request_and_get_response(fqdn).await {
            Ok(v) => v,
            Err(e) if e.is_timeout() => return Err(DnsFault::Timeout),
            Err(e) if e.is_connect() => return Err(DnsFault::NoNameservers(e.to_string())),
            Err(e) => return Err(DnsFault::Other(e.to_string())),
        };
        if let Some(fault) = classify_doh_status(response.status) {
            debug!("DoH TXT {}: {}", fqdn, fault);
            return Err(fault);
        }
        let records: Vec<String> = response.answer.into_iter()
            .filter(|answer| answer.record_type == DNS_QUERY_TYPE_TXT)
            .map(|answer| strip_string_quotation(&answer.data))
            .collect();
        debug!("DoH TXT {}: {} record(s)", fqdn, records.len());
        if records.len() == 0 {
            return Err(DnsFault::NoAnswer);
        }
        Ok(records)
    }
}

lazy_static! {
    static ref REGEX_QUOTED_BY_DOUBLE_QUOTE: Regex = Regex::new(r#"^["](.*)["]$"#).unwrap();
    static ref REGEX_QUOTED_BY_ESCAPED_DOUBLE_QUOTE: Regex = Regex::new(r#"^(.*?)[\\]["]([^"]+?)[\\]["](.*)$"#).unwrap();
}

fn strip_string_quotation(original: &str) -> String {
    let mut result = original.to_string();
    loop {
        let prev_len = result.len();
        if let Some(caps) = REGEX_QUOTED_BY_DOUBLE_QUOTE.captures(&result) {
            result = caps[1].to_string();
        }
        if let Some(caps) = REGEX_QUOTED_BY_ESCAPED_DOUBLE_QUOTE.captures(&result) {
            result = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
        }
        if result.len() == prev_len {
            break;
        }
    }
    result
}

//====================================================================
#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Answers from a fixed table and remembers every queried name.
    pub struct MyScriptedResolver {
        answers: HashMap<String, Result<Vec<String>, DnsFault>>,
        otherwise: Result<Vec<String>, DnsFault>,
        queries: Mutex<Vec<String>>,
    }

    impl MyScriptedResolver {
        pub fn new(otherwise: Result<Vec<String>, DnsFault>) -> Self {
            Self {
                answers: HashMap::new(),
                otherwise,
                queries: Mutex::new(Vec::new()),
            }
        }

        pub fn with(mut self, fqdn: &str, answer: Result<Vec<String>, DnsFault>) -> Self {
            self.answers.insert(fqdn.to_string(), answer);
            self
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MyTxtResolver for MyScriptedResolver {
        async fn lookup_txt(&self, fqdn: &str) -> Result<Vec<String>, DnsFault> {
            self.queries.lock().unwrap().push(fqdn.to_string());
            self.answers.get(fqdn).cloned().unwrap_or_else(|| self.otherwise.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotation_is_stripped_from_doh_txt_data() {
        assert_eq!(strip_string_quotation(r#""v=spf1 -all""#), "v=spf1 -all");
        assert_eq!(strip_string_quotation(r#""k=rsa; " "p=MIIB""#), r#"k=rsa; " "p=MIIB"#);
        assert_eq!(strip_string_quotation("plain"), "plain");
    }

    #[test]
    fn doh_status_codes_map_to_faults() {
        assert_eq!(classify_doh_status(0), None);
        assert_eq!(classify_doh_status(3), Some(DnsFault::NxDomain));
        assert!(matches!(classify_doh_status(2), Some(DnsFault::NoNameservers(_))));
        assert!(matches!(classify_doh_status(5), Some(DnsFault::NoNameservers(_))));
        assert!(matches!(classify_doh_status(4), Some(DnsFault::Other(_))));
    }

    #[test]
    fn doh_response_parses_without_answer_section() {
        let response: DohResponse = serde_json::from_str(r#"{"Status":3,"TC":false,"Question":[{"name":"x.invalid.","type":16}]}"#).unwrap();
        assert_eq!(response.status, 3);
        assert!(response.answer.is_empty());
    }

    fn no_records(response_code: ResponseCode) -> ResolveError {
        ResolveError::from(ResolveErrorKind::NoRecordsFound {
            query: Box::new(hickory_resolver::proto::op::Query::new()),
            soa: None,
            negative_ttl: None,
            response_code,
            trusted: true,
        })
    }

    #[test]
    fn resolver_errors_map_to_faults() {
        assert_eq!(classify_resolve_error(&no_records(ResponseCode::NXDomain)), DnsFault::NxDomain);
        assert_eq!(classify_resolve_error(&no_records(ResponseCode::NoError)), DnsFault::NoAnswer);
        assert!(matches!(classify_resolve_error(&no_records(ResponseCode::ServFail)), DnsFault::NoNameservers(_)));
        assert!(matches!(classify_resolve_error(&no_records(ResponseCode::Refused)), DnsFault::NoNameservers(_)));
        assert!(matches!(classify_resolve_error(&ResolveError::from(ResolveErrorKind::NoConnections)), DnsFault::NoNameservers(_)));
        assert_eq!(classify_resolve_error(&ResolveError::from(ResolveErrorKind::Timeout)), DnsFault::Timeout);
        assert!(matches!(classify_resolve_error(&ResolveError::from(ResolveErrorKind::Message("bad"))), DnsFault::Other(_)));
    }

    #[test]
    fn system_lookups_use_one_attempt_and_no_cache() {
        let opts = lookup_options(ResolverOpts::default(), Duration::from_millis(250));
        assert_eq!(opts.timeout, Duration::from_millis(250));
        assert_eq!(opts.attempts, 1);
        assert_eq!(opts.cache_size, 0);
    }

    #[test]
    fn names_are_made_absolute() {
        assert_eq!(to_absolute_name("example.com"), "example.com.");
        assert_eq!(to_absolute_name("example.com."), "example.com.");
    }

    #[test]
    fn backend_names_parse() {
        assert_eq!("doh".parse::<DnsBackend>().unwrap(), DnsBackend::Doh);
        assert_eq!("system".parse::<DnsBackend>().unwrap(), DnsBackend::System);
        assert!("udp".parse::<DnsBackend>().is_err());
    }
}
