use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;

use crate::my_dataset::{self, LabeledMessage};
use crate::my_dns_resolver::MyTxtResolver;
use crate::my_feature_extractor::{self, ExtractSettings, FeatureRecord};
use crate::my_feature_table;
use crate::my_logger::prelude::*;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BatchOptions {
    pub concurrency: usize,
    pub isolate_faults: bool, // drop a failing row (and its label) instead of aborting
}

const PROGRESS_INTERVAL: usize = 100;

/// Rows come back in input order whatever order the tasks finish in.
pub async fn extract_batch(messages: Vec<LabeledMessage>, resolver: Arc<dyn MyTxtResolver>, settings: ExtractSettings, options: BatchOptions) -> Result<Vec<(FeatureRecord, String)>> {
    let total = messages.len();
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut handles = Vec::with_capacity(total);
    for message in messages {
        let semaphore = semaphore.clone();
        let resolver = resolver.clone();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let record = my_feature_extractor::extract_features(&message.text, resolver.as_ref(), &settings).await?;
            Ok::<_, anyhow::Error>((record, message.label))
        });
        handles.push(handle);
    }

    let mut rows = Vec::with_capacity(total);
    let mut handles = handles.into_iter().enumerate();
    while let Some((i, handle)) = handles.next() {
        match handle.await? {
            Ok(row) => rows.push(row),
            Err(e) if options.isolate_faults => {
                warn!("message #{} is dropped: {:#}", i, e);
            },
            Err(e) => {
                error!("message #{} can not be processed: {:#}", i, e);
                for (_, rest) in handles {
                    rest.abort();
                }
                return Err(e.context(format!("message #{}", i)));
            },
        }
        if (i + 1) % PROGRESS_INTERVAL == 0 {
            info!("{} / {} messages processed", i + 1, total);
        }
    }
    info!("{} rows are extracted from {} messages", rows.len(), total);
    Ok(rows)
}

/// The output file is only created when every message has been processed.
pub async fn run_batch(input: &Path, output: &Path, resolver: Arc<dyn MyTxtResolver>, settings: ExtractSettings, options: BatchOptions) -> Result<()> {
    info!("profile: {}, input: {}, output: {}", settings.profile, input.display(), output.display());
    let messages = my_dataset::load_dataset(input)?;
    let rows = extract_batch(messages, resolver, settings, options).await?;
    my_feature_table::write_feature_table_file(output, &rows)?;
    info!("{} rows are written to {}", rows.len(), output.display());
    Ok(())
}

//====================================================================
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::my_dns_resolver::DnsFault;
    use crate::my_dns_resolver::testing::MyScriptedResolver;
    use crate::my_message_parser::MessageFault;
    use crate::my_profile::DatasetProfile;

    // answers late for "slow" domains so that tasks finish out of order
    struct MySlowResolver;

    #[async_trait]
    impl MyTxtResolver for MySlowResolver {
        async fn lookup_txt(&self, fqdn: &str) -> Result<Vec<String>, DnsFault> {
            if fqdn.ends_with("slow.example") {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(DnsFault::NxDomain)
        }
    }

    fn message(subject: &str, sender: &str, label: &str) -> LabeledMessage {
        LabeledMessage {
            text: format!("Return-Path: <{}>\nSubject: {}\n\nbody", sender, subject),
            label: label.to_string(),
        }
    }

    fn options(isolate_faults: bool) -> BatchOptions {
        BatchOptions {
            concurrency: 4,
            isolate_faults,
        }
    }

    #[tokio::test]
    async fn rows_keep_input_order() {
        let messages = vec![
            message("one", "a@slow.example", "1"),
            message("two", "b@fast.example", "0"),
            message("three", "c@slow.example", "1"),
            message("four", "d@fast.example", "0"),
        ];
        let settings = ExtractSettings::new(DatasetProfile::SpamAssassin);
        let rows = extract_batch(messages, Arc::new(MySlowResolver), settings, options(false)).await.unwrap();
        let subjects: Vec<&str> = rows.iter().map(|(record, _)| record.process_content.as_str()).collect();
        assert_eq!(subjects, vec!["onebody", "twobody", "threebody", "fourbody"]);
        let labels: Vec<&str> = rows.iter().map(|(_, label)| label.as_str()).collect();
        assert_eq!(labels, vec!["1", "0", "1", "0"]);
    }

    #[tokio::test]
    async fn failing_message_aborts_the_batch_by_default() {
        let messages = vec![
            message("one", "a@x.com", "1"),
            LabeledMessage { text: "no headers here".to_string(), label: "0".to_string() },
        ];
        let settings = ExtractSettings::new(DatasetProfile::SpamAssassin);
        let resolver = Arc::new(MyScriptedResolver::new(Err(DnsFault::NxDomain)));
        let e = extract_batch(messages, resolver, settings, options(false)).await.unwrap_err();
        assert_eq!(e.downcast_ref::<MessageFault>(), Some(&MessageFault::NoHeaders));
    }

    #[tokio::test]
    async fn isolated_fault_drops_row_and_label_together() {
        let messages = vec![
            message("one", "a@x.com", "1"),
            LabeledMessage { text: "no headers here".to_string(), label: "0".to_string() },
            message("three", "c@x.com", "1"),
        ];
        let settings = ExtractSettings::new(DatasetProfile::SpamAssassin);
        let resolver = Arc::new(MyScriptedResolver::new(Err(DnsFault::NxDomain)));
        let rows = extract_batch(messages, resolver, settings, options(true)).await.unwrap();
        let pairs: Vec<(&str, &str)> = rows.iter().map(|(record, label)| (record.process_content.as_str(), label.as_str())).collect();
        assert_eq!(pairs, vec![("onebody", "1"), ("threebody", "1")]);
    }

    #[tokio::test]
    async fn output_file_is_written_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        let settings = ExtractSettings::new(DatasetProfile::SpamAssassin);
        let resolver: Arc<dyn MyTxtResolver> = Arc::new(MyScriptedResolver::new(Err(DnsFault::Timeout)));

        std::fs::write(&input, "text,target\n\"Subject: ok\n\nbody\",1\nno headers,0\n").unwrap();
        assert!(run_batch(&input, &output, resolver.clone(), settings, options(false)).await.is_err());
        assert!(!output.exists());

        std::fs::write(&input, "text,target\n\"Subject: ok\nReturn-Path: <a@x.com>\n\nbody\",1\n").unwrap();
        run_batch(&input, &output, resolver, settings, options(false)).await.unwrap();
        let text = std::fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("has_subject,content_type,"));
        assert_eq!(lines.next(), Some("1,None,None,0,0,0,0,com,None,None,None,None,0,None,None,1,okbody"));
        assert_eq!(lines.next(), None);
    }
}
