//! Verification engine tests against a mock statistics source.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use garload::error::ImportError;
use garload::import::ImportClient;
use garload::verify;

struct StatClient {
    counts: HashMap<&'static str, i64>,
}

#[async_trait]
impl ImportClient for StatClient {
    async fn import(&self, _dump: &Path) -> Result<(), ImportError> {
        panic!("verification must not import anything");
    }

    async fn query_scalar(&self, sql: &str) -> Result<i64, ImportError> {
        if sql.contains("pg_total_relation_size") {
            return Ok(8192);
        }
        let key = if sql.contains("IS NULL") {
            "normative_docs_unnamed"
        } else {
            sql.rsplit("FROM ").next().unwrap_or("").trim()
        };
        Ok(*self.counts.get(key).unwrap_or(&0))
    }
}

fn client() -> StatClient {
    StatClient {
        counts: HashMap::from([
            ("addr_obj", 20_000),
            ("houses", 15_000),
            ("steads", 575),
            ("apartments", 1_200),
            ("rooms", 300),
            ("normative_docs", 400),
            ("normative_docs_unnamed", 100),
        ]),
    }
}

#[tokio::test]
async fn main_objects_sum_addr_obj_houses_and_steads() {
    let report = verify::run(&client(), None, 0.02).await.unwrap();

    assert_eq!(report.main_objects, 35_575);
    assert!(report.tables.iter().all(|t| t.size_bytes == 8192));
    assert_eq!(report.normative_docs_total, 400);
    assert_eq!(report.normative_docs_unnamed, 100);
    assert!((report.unnamed_fraction - 0.25).abs() < f64::EPSILON);
    // No expected count: informational run always passes.
    assert!(report.check.is_none());
    assert!(report.passed());
}

#[tokio::test]
async fn expected_count_check_is_inclusive_of_the_tolerance() {
    // 35575 against 35000 expected is ~1.64% off.
    let report = verify::run(&client(), Some(35_000), 0.02).await.unwrap();
    let check = report.check.as_ref().unwrap();
    assert!(check.passed);
    assert_eq!(check.actual, 35_575);
    assert_eq!(check.expected, 35_000);
    assert!(report.passed());

    let report = verify::run(&client(), Some(35_000), 0.01).await.unwrap();
    assert!(!report.check.as_ref().unwrap().passed);
    assert!(!report.passed());
}

#[tokio::test]
async fn invalid_tolerance_fails_before_any_query() {
    let err = verify::run(&client(), Some(35_000), 1.5).await.unwrap_err();
    assert!(matches!(
        err,
        garload::error::VerifyError::VerifyConfig { .. }
    ));
}

#[tokio::test]
async fn report_serializes_to_json() {
    let report = verify::run(&client(), Some(35_000), 0.02).await.unwrap();
    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["main_objects"], 35_575);
    assert_eq!(value["check"]["passed"], true);
    assert_eq!(value["tables"][0]["size_bytes"], 8192);

    let text = report.render_text();
    assert!(text.contains("main objects"));
    assert!(text.contains("8.0 KiB"));
    assert!(text.contains("ok"));
}
