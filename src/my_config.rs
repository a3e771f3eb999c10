use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::my_date_interpreter::DateFallthroughPolicy;
use crate::my_dkim_verifier::DkimProbe;
use crate::my_dns_resolver::DnsBackend;
use crate::my_profile::DatasetProfile;

//====================================================================
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RunMode {
    Extract(DatasetProfile),
    ProbeDns,
}

impl FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "probe_dns" => Ok(Self::ProbeDns),
            _ => s.parse::<DatasetProfile>()
                .map(Self::Extract)
                .map_err(|_| anyhow!("unknown string in the environment variable \"MAILFEAT_MODE\": {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MyConfig {
    pub mode: RunMode,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub log_file: PathBuf,
    pub dns_backend: DnsBackend,
    pub doh_url: String,
    pub dns_timeout: Duration,
    pub concurrency: usize,
    pub dkim_probe: DkimProbe,
    pub date_fallthrough: DateFallthroughPolicy,
    pub isolate_faults: bool,
    pub probe_domain: String,
}

const DEFAULT_LOG_FILE: &str = "./mailfeat.log";
const DEFAULT_DOH_URL: &str = "https://1.1.1.1/dns-query";
const DEFAULT_DNS_TIMEOUT_MS: u64 = 5000;
const DEFAULT_PROBE_DOMAIN: &str = "example.com";

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value {
        "0" | "false" => Ok(false),
        "1" | "true"  => Ok(true),
        _ => Err(anyhow!("invalid value of {}: \"{}\" (expected 0 or 1)", name, value)),
    }
}

fn parse_positive(name: &str, value: &str) -> Result<u64> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow!("invalid value of {}: \"{}\" (expected a positive integer)", name, value)),
    }
}

impl MyConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Unset and empty variables fall back to their defaults.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let mode = match var("MAILFEAT_MODE") {
            Some(s) => s.parse::<RunMode>()?,
            None => RunMode::Extract(DatasetProfile::SpamAssassin),
        };
        let dns_backend = match var("MAILFEAT_DNS_BACKEND") {
            Some(s) => s.parse::<DnsBackend>()?,
            None => DnsBackend::System,
        };
        let dns_timeout_ms = match var("MAILFEAT_DNS_TIMEOUT_MS") {
            Some(s) => parse_positive("MAILFEAT_DNS_TIMEOUT_MS", &s)?,
            None => DEFAULT_DNS_TIMEOUT_MS,
        };
        let concurrency = match var("MAILFEAT_CONCURRENCY") {
            Some(s) => parse_positive("MAILFEAT_CONCURRENCY", &s)? as usize,
            None => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        };
        let dkim_probe = match var("MAILFEAT_DKIM_PROBE") {
            Some(s) => s.parse::<DkimProbe>()?,
            None => DkimProbe::FirstMatch,
        };
        let date_fallthrough = match var("MAILFEAT_DATE_FALLTHROUGH") {
            Some(s) => s.parse::<DateFallthroughPolicy>()?,
            None => DateFallthroughPolicy::Indeterminate,
        };
        let isolate_faults = match var("MAILFEAT_ISOLATE_FAULTS") {
            Some(s) => parse_flag("MAILFEAT_ISOLATE_FAULTS", &s)?,
            None => false,
        };

        Ok(Self {
            mode,
            input: var("MAILFEAT_INPUT").map(PathBuf::from),
            output: var("MAILFEAT_OUTPUT").map(PathBuf::from),
            log_file: PathBuf::from(var("MAILFEAT_LOG_FILE").unwrap_or(DEFAULT_LOG_FILE.to_string())),
            dns_backend,
            doh_url: var("MAILFEAT_DOH_URL").unwrap_or(DEFAULT_DOH_URL.to_string()),
            dns_timeout: Duration::from_millis(dns_timeout_ms),
            concurrency,
            dkim_probe,
            date_fallthrough,
            isolate_faults,
            probe_domain: var("MAILFEAT_PROBE_DOMAIN").unwrap_or(DEFAULT_PROBE_DOMAIN.to_string()),
        })
    }

    pub fn input_path(&self, profile: DatasetProfile) -> PathBuf {
        self.input.clone().unwrap_or_else(|| PathBuf::from(profile.default_input_path()))
    }

    pub fn output_path(&self, profile: DatasetProfile) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from(profile.default_output_path()))
    }
}

//====================================================================
#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_of(pairs: &[(&str, &str)]) -> Result<MyConfig> {
        let table: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        MyConfig::from_lookup(|name| table.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_of(&[]).unwrap();
        assert_eq!(config.mode, RunMode::Extract(DatasetProfile::SpamAssassin));
        assert_eq!(config.dns_backend, DnsBackend::System);
        assert_eq!(config.dns_timeout, Duration::from_secs(5));
        assert_eq!(config.dkim_probe, DkimProbe::FirstMatch);
        assert_eq!(config.date_fallthrough, DateFallthroughPolicy::Indeterminate);
        assert!(!config.isolate_faults);
        assert!(config.concurrency >= 1);
        assert_eq!(config.log_file, PathBuf::from("./mailfeat.log"));
        assert_eq!(config.doh_url, "https://1.1.1.1/dns-query");
        assert_eq!(config.probe_domain, "example.com");
        assert_eq!(config.input_path(DatasetProfile::HardSpam), PathBuf::from("./hard_spam"));
        assert_eq!(config.output_path(DatasetProfile::SpamAssassin), PathBuf::from("./features.csv"));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = config_of(&[
            ("MAILFEAT_MODE", "hard_spam"),
            ("MAILFEAT_INPUT", "/data/hs"),
            ("MAILFEAT_DNS_BACKEND", "doh"),
            ("MAILFEAT_DNS_TIMEOUT_MS", "250"),
            ("MAILFEAT_CONCURRENCY", "3"),
            ("MAILFEAT_DKIM_PROBE", "exhaustive"),
            ("MAILFEAT_DATE_FALLTHROUGH", "fault"),
            ("MAILFEAT_ISOLATE_FAULTS", "1"),
        ]).unwrap();
        assert_eq!(config.mode, RunMode::Extract(DatasetProfile::HardSpam));
        assert_eq!(config.input_path(DatasetProfile::HardSpam), PathBuf::from("/data/hs"));
        assert_eq!(config.dns_backend, DnsBackend::Doh);
        assert_eq!(config.dns_timeout, Duration::from_millis(250));
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.dkim_probe, DkimProbe::Exhaustive);
        assert_eq!(config.date_fallthrough, DateFallthroughPolicy::Fault);
        assert!(config.isolate_faults);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config_of(&[("MAILFEAT_MODE", "enron")]).is_err());
        assert!(config_of(&[("MAILFEAT_DNS_TIMEOUT_MS", "0")]).is_err());
        assert!(config_of(&[("MAILFEAT_CONCURRENCY", "many")]).is_err());
        assert!(config_of(&[("MAILFEAT_ISOLATE_FAULTS", "yes")]).is_err());
        assert!(config_of(&[("MAILFEAT_DNS_BACKEND", "tcp")]).is_err());
    }

    #[test]
    fn probe_mode_is_recognized() {
        assert_eq!(config_of(&[("MAILFEAT_MODE", "probe_dns")]).unwrap().mode, RunMode::ProbeDns);
    }
}
