use anyhow::Context;
use serde_json::Value;
use std::path::Path;

/// Reads records from a JSON array or JSON Lines file.
///
/// Only JSON syntax is checked here. Each record is shaped into an evaluation request by
/// the batch, so a record with the wrong fields fails on its own.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read input {} failed", path.display()))?;
    parse_records(&raw).with_context(|| format!("parse input {} failed", path.display()))
}

pub fn parse_records(raw: &str) -> anyhow::Result<Vec<Value>> {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let mut out = Vec::new();
    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).with_context(|| format!("line {}", i + 1))?;
        out.push(record);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use churnwatch_core::batch::{evaluate_batch, BatchOptions};
    use churnwatch_core::engine::RecommendationEngine;
    use std::io::Write;

    const ROW: &str = r#"{"customer_id":"C-1","churn_probability":0.8,"features":{"age":30,"gender":"Male","subscription_type":"Basic","monthly_charges":9.99,"tenure_in_months":3,"login_frequency":2,"last_login_days":40,"watch_time":1.5,"payment_failures":1,"customer_support_calls":5}}"#;

    #[test]
    fn parses_json_array() {
        let raw = format!("[{ROW},{ROW}]");
        let out = parse_records(&raw).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["customer_id"], "C-1");
    }

    #[test]
    fn record_missing_probability_is_a_failed_entry() {
        let broken = ROW.replace(r#""churn_probability":0.8,"#, "");
        let raw = format!("[{ROW},{broken},{ROW}]");
        let records = parse_records(&raw).unwrap();
        assert_eq!(records.len(), 3);

        let result =
            evaluate_batch(&RecommendationEngine::default(), records, &BatchOptions::default())
                .unwrap();
        assert_eq!(result.entries.len(), 3);
        assert_eq!(result.summary.failed, 1);
        assert_eq!(result.summary.evaluated, 2);
        assert_eq!(
            result.entries[1].error.as_ref().unwrap().kind,
            "invalid_request"
        );
    }

    #[test]
    fn null_feature_in_json_lines_is_a_failed_entry() {
        let broken = ROW.replace(r#""watch_time":1.5"#, r#""watch_time":null"#);
        let raw = format!("{ROW}\n{broken}\n");
        let records = parse_records(&raw).unwrap();
        let result =
            evaluate_batch(&RecommendationEngine::default(), records, &BatchOptions::default())
                .unwrap();
        let err = result.entries[1].error.as_ref().unwrap();
        assert_eq!(err.kind, "missing_feature");
        assert_eq!(err.field.as_deref(), Some("watch_time"));
    }

    #[test]
    fn parses_json_lines_and_skips_blanks() {
        let raw = format!("{ROW}\n\n{ROW}\n");
        assert_eq!(parse_records(&raw).unwrap().len(), 2);
    }

    #[test]
    fn reports_bad_line_number() {
        let raw = format!("{ROW}\nnot json\n");
        let err = parse_records(&raw).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn empty_input_is_empty_batch() {
        assert!(parse_records("  \n").unwrap().is_empty());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[{ROW}]").unwrap();
        assert_eq!(load_records(file.path()).unwrap().len(), 1);

        let missing = load_records(Path::new("/nonexistent/customers.json")).unwrap_err();
        assert!(format!("{missing:#}").contains("read input"));
    }
}
