use anyhow::Result;

use crate::my_content_classifier::{self, ContentFeatures};
use crate::my_date_interpreter::{self, DateFallthroughPolicy, DateFeatures};
use crate::my_dkim_verifier::{self, DkimProbe};
use crate::my_dns_resolver::MyTxtResolver;
use crate::my_header_normalizer;
use crate::my_logger::prelude::*;
use crate::my_message_parser;
use crate::my_profile::DatasetProfile;
use crate::my_spf_verifier::{self, AuthResult, IndeterminateReason};
use crate::my_str;

//====================================================================
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ExtractSettings {
    pub profile: DatasetProfile,
    pub date_policy: DateFallthroughPolicy,
    pub dkim_probe: DkimProbe,
}

impl ExtractSettings {
    pub fn new(profile: DatasetProfile) -> Self {
        Self {
            profile,
            date_policy: DateFallthroughPolicy::Indeterminate,
            dkim_probe: DkimProbe::FirstMatch,
        }
    }
}

/// Per-message signals. `None` means the value could not be determined.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeatureRecord {
    pub has_subject: u8,
    pub content_type: Option<String>,
    pub content_disp: Option<String>,
    pub num_html: usize,
    pub has_attachement: u8,
    pub num_exc_mark: usize,
    pub has_list_id: u8,
    pub domain: Option<String>,
    pub check_spf: AuthResult,
    pub check_dkim: AuthResult,
    pub from_returnpath_same: Option<u8>,
    pub num_received: Option<usize>,
    pub is_replied: u8,
    pub time_period: Option<u8>,
    pub is_weekday: Option<u8>,
    pub process_content: String,
}

// everything that does not need the network
struct LocalSignals {
    content: ContentFeatures,
    date: DateFeatures,
    envelop_from: Option<String>,
    header_from: Option<String>,
    num_received: Option<usize>,
    is_replied: u8,
}

fn collect_local_signals(raw: &str, settings: &ExtractSettings) -> Result<LocalSignals> {
    let profile = settings.profile;
    let normalized = my_header_normalizer::normalize_headers(raw, profile.header_tokens());
    let message = my_message_parser::parse_message(&normalized);
    let body = message.body_content(&normalized, profile.body_strategy())?;
    let content = my_content_classifier::extract_content_features(raw, &message, &body);

    let date = my_date_interpreter::interpret_date(
        message.header_nonempty("Date"),
        profile.date_pattern_count(),
        settings.date_policy,
    )?;

    let num_received = message.header_nonempty("Received")
        .map(|_| message.header_values("Received").len());
    let is_replied = profile.reply_headers().iter()
        .any(|name| message.header_nonempty(name).is_some());

    Ok(LocalSignals {
        content,
        date,
        envelop_from: message.get_envelop_from(),
        header_from: message.get_header_from(),
        num_received,
        is_replied: is_replied as u8,
    })
}

async fn check_sender_domain(sender_domain: &str, resolver: &dyn MyTxtResolver, probe: DkimProbe) -> (AuthResult, AuthResult) {
    if sender_domain.is_empty() {
        debug!("null sender: DNS checks are skipped");
        return (AuthResult::NotFound, AuthResult::NotFound);
    }
    tokio::join!(
        my_spf_verifier::spf_verify(sender_domain, resolver),
        my_dkim_verifier::dkim_verify(sender_domain, resolver, probe),
    )
}

pub async fn extract_features(raw: &str, resolver: &dyn MyTxtResolver, settings: &ExtractSettings) -> Result<FeatureRecord> {
    // the HTML DOM is not Send: finish all parsing before the first await
    let local = collect_local_signals(raw, settings)?;

    let (domain, check_spf, check_dkim, from_returnpath_same) = match &local.envelop_from {
        Some(envelop_from) => {
            let sender_domain = my_str::domain_of_address(envelop_from);
            let (check_spf, check_dkim) = check_sender_domain(&sender_domain, resolver, settings.dkim_probe).await;
            let is_same = local.header_from.as_ref().map(|header_from| (header_from == envelop_from) as u8);
            (Some(my_str::top_level_label(&sender_domain)), check_spf, check_dkim, is_same)
        },
        None => {
            let no_sender = AuthResult::Indeterminate(IndeterminateReason::NoSender);
            (None, no_sender, no_sender, None)
        },
    };

    let content = local.content;
    Ok(FeatureRecord {
        has_subject: content.has_subject,
        content_type: content.content_type,
        content_disp: content.content_disp,
        num_html: content.num_html,
        has_attachement: content.has_attachment,
        num_exc_mark: content.num_exc_mark,
        has_list_id: content.has_list_id,
        domain,
        check_spf,
        check_dkim,
        from_returnpath_same,
        num_received: local.num_received,
        is_replied: local.is_replied,
        time_period: local.date.time_period(),
        is_weekday: local.date.is_weekday(),
        process_content: content.process_content,
    })
}
