use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, Result};

use crate::my_feature_extractor::FeatureRecord;

pub const FEATURE_TABLE_COLUMNS: [&str; 17] = [
    "has_subject",
    "content_type",
    "content_disp",
    "num_html",
    "has_attachement",
    "num_exc_mark",
    "has_list_id",
    "domain",
    "check_spf",
    "check_dkim",
    "from_returnpath_same",
    "num_received",
    "is_replied",
    "time_period",
    "is_weekday",
    "labels",
    "process_content",
];

const INDETERMINATE: &str = "None";

fn optional_field<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map_or(INDETERMINATE.to_string(), T::to_string)
}

pub fn to_row(record: &FeatureRecord, label: &str) -> [String; 17] {
    [
        record.has_subject.to_string(),
        optional_field(&record.content_type),
        optional_field(&record.content_disp),
        record.num_html.to_string(),
        record.has_attachement.to_string(),
        record.num_exc_mark.to_string(),
        record.has_list_id.to_string(),
        optional_field(&record.domain),
        record.check_spf.to_string(),
        record.check_dkim.to_string(),
        optional_field(&record.from_returnpath_same),
        optional_field(&record.num_received),
        record.is_replied.to_string(),
        optional_field(&record.time_period),
        optional_field(&record.is_weekday),
        label.to_string(),
        record.process_content.clone(),
    ]
}

pub fn write_feature_table<W: Write>(writer: W, rows: &[(FeatureRecord, String)]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(FEATURE_TABLE_COLUMNS)?;
    for (record, label) in rows {
        writer.write_record(to_row(record, label))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_feature_table_file(path: &Path, rows: &[(FeatureRecord, String)]) -> Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| anyhow!("can not create {}: {}", path.display(), e))?;
    write_feature_table(std::io::BufWriter::new(file), rows)
}

//====================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::my_spf_verifier::{AuthResult, IndeterminateReason};

    fn sample_record() -> FeatureRecord {
        FeatureRecord {
            has_subject: 1,
            content_type: Some("text/plain".to_string()),
            content_disp: None,
            num_html: 2,
            has_attachement: 0,
            num_exc_mark: 3,
            has_list_id: 0,
            domain: Some("com".to_string()),
            check_spf: AuthResult::Found,
            check_dkim: AuthResult::Indeterminate(IndeterminateReason::Fault),
            from_returnpath_same: Some(1),
            num_received: None,
            is_replied: 0,
            time_period: Some(2),
            is_weekday: None,
            process_content: "Hi, \"you\"\nline two".to_string(),
        }
    }

    #[test]
    fn indeterminate_values_are_written_as_none() {
        let row = to_row(&sample_record(), "1");
        assert_eq!(row[2], "None");
        assert_eq!(row[8], "1");
        assert_eq!(row[9], "None");
        assert_eq!(row[11], "None");
        assert_eq!(row[14], "None");
        assert_eq!(row[15], "1");
    }

    #[test]
    fn table_has_header_row_and_quotes_multiline_content() {
        let mut buf = Vec::new();
        write_feature_table(&mut buf, &[(sample_record(), "0".to_string())]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(FEATURE_TABLE_COLUMNS.join(",").as_str()));
        assert_eq!(lines.next(), Some("1,text/plain,None,2,0,3,0,com,1,None,1,None,0,2,None,0,\"Hi, \"\"you\"\""));
        assert_eq!(lines.next(), Some("line two\""));
    }

    #[test]
    fn table_file_is_readable_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        write_feature_table_file(&path, &[(sample_record(), "1".to_string()), (sample_record(), "0".to_string())]).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let labels: Vec<String> = reader.records().map(|r| r.unwrap()[15].to_string()).collect();
        assert_eq!(labels, vec!["1", "0"]);
    }
}
