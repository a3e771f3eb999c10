use std::sync::Arc;

use anyhow::Result;
use tokio;

mod my_batch_driver;
mod my_config;
mod my_content_classifier;
mod my_dataset;
mod my_date_interpreter;
mod my_dkim_verifier;
mod my_dns_resolver;
mod my_feature_extractor;
mod my_feature_table;
mod my_header_normalizer;
mod my_logger;
mod my_message_parser;
mod my_profile;
mod my_spf_verifier;
mod my_str;

use my_batch_driver::BatchOptions;
use my_config::{MyConfig, RunMode};
use my_dns_resolver::{DnsBackend, MyDohResolver, MySystemResolver, MyTxtResolver};
use my_feature_extractor::ExtractSettings;
use my_logger::prelude::*;
use my_profile::DatasetProfile;

//====================================================================
fn main() {
    let config = match MyConfig::from_env() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            std::process::exit(1);
        },
    };
    if let Err(e) = my_logger::init(&config.log_file) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
    debug!("{:?}", config);

    let status = match config.mode {
        RunMode::Extract(profile) => extract_features_of_dataset(&config, profile),
        RunMode::ProbeDns => probe_dns(&config),
    };

    match status {
        Ok(()) => (),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        },
    }

    std::process::exit(0);
}

fn build_resolver(config: &MyConfig) -> Result<Arc<dyn MyTxtResolver>> {
    let resolver: Arc<dyn MyTxtResolver> = match config.dns_backend {
        DnsBackend::System => Arc::new(MySystemResolver::new(config.dns_timeout)?),
        DnsBackend::Doh => Arc::new(MyDohResolver::new(&config.doh_url, config.dns_timeout)?),
    };
    Ok(resolver)
}

fn build_runtime() -> Result<tokio::runtime::Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime)
}

fn extract_features_of_dataset(config: &MyConfig, profile: DatasetProfile) -> Result<()> {
    let settings = ExtractSettings {
        profile,
        date_policy: config.date_fallthrough,
        dkim_probe: config.dkim_probe,
    };
    let options = BatchOptions {
        concurrency: config.concurrency,
        isolate_faults: config.isolate_faults,
    };
    let input = config.input_path(profile);
    let output = config.output_path(profile);
    build_runtime()?.block_on(async move {
        let resolver = build_resolver(config)?;
        my_batch_driver::run_batch(&input, &output, resolver, settings, options).await
    })
}

fn probe_dns(config: &MyConfig) -> Result<()> {
    build_runtime()?.block_on(async move {
        let resolver = build_resolver(config)?;
        let domain = config.probe_domain.as_str();
        info!("probe {} with {:?} backend", domain, config.dns_backend);
        match resolver.lookup_txt(domain).await {
            Ok(records) => {
                for record in records {
                    info!("TXT {} \"{}\"", domain, record);
                }
            },
            Err(e) => info!("TXT {}: {}", domain, e),
        }
        let (check_spf, check_dkim) = tokio::join!(
            my_spf_verifier::spf_verify(domain, resolver.as_ref()),
            my_dkim_verifier::dkim_verify(domain, resolver.as_ref(), config.dkim_probe),
        );
        info!("check_spf={} ({:?}) check_dkim={} ({:?})", check_spf, check_spf, check_dkim, check_dkim);
        Ok::<(), anyhow::Error>(())
    })
}
