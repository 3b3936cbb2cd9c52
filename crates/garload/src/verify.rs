//! Post-import verification.
//!
//! Read-only statistics over an imported database: per-table row
//! counts, category totals, and an optional expected-count check on the
//! main address objects. Nothing here mutates the database.

use serde::Serialize;
use snafu::prelude::*;
use tracing::info;

use garload_core::error::ConfigError;
use garload_core::schema::known;

use crate::error::{ReportSerializeSnafu, StatQuerySnafu, VerifyConfigSnafu, VerifyError};
use crate::import::ImportClient;

/// Tables whose rows together form the "main objects" total.
pub const MAIN_OBJECT_TABLES: &[&str] = &["addr_obj", "houses", "steads"];

/// Tables reported as category totals.
const CATEGORY_TABLES: &[&str] = &["addr_obj", "houses", "apartments", "steads", "rooms"];

#[derive(Debug, Clone, Serialize)]
pub struct TableStat {
    pub table: String,
    pub rows: i64,
    /// Total on-disk relation size, indexes included.
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryStat {
    pub category: String,
    pub rows: i64,
}

/// Result of the optional expected-count check.
#[derive(Debug, Clone, Serialize)]
pub struct ExpectedCheck {
    pub expected: i64,
    pub actual: i64,
    pub tolerance: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub tables: Vec<TableStat>,
    pub categories: Vec<CategoryStat>,
    /// addr_obj + houses + steads.
    pub main_objects: i64,
    pub normative_docs_total: i64,
    pub normative_docs_unnamed: i64,
    /// Fraction of normative documents without a name. Reported for
    /// operator awareness, never a failure.
    pub unnamed_fraction: f64,
    pub check: Option<ExpectedCheck>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.check.as_ref().map_or(true, |c| c.passed)
    }

    pub fn to_json(&self) -> Result<String, VerifyError> {
        serde_json::to_string_pretty(self).context(ReportSerializeSnafu)
    }

    /// Human-readable table for terminal output.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("table                     rows       size\n");
        for stat in &self.tables {
            out.push_str(&format!(
                "{:<24} {:>8} {:>10}\n",
                stat.table,
                stat.rows,
                human_size(stat.size_bytes)
            ));
        }
        out.push('\n');
        for stat in &self.categories {
            out.push_str(&format!("{:<24} {:>8}\n", stat.category, stat.rows));
        }
        out.push_str(&format!("{:<24} {:>8}\n", "main objects", self.main_objects));
        out.push_str(&format!(
            "normative docs unnamed   {:>7.2}% ({}/{})\n",
            self.unnamed_fraction * 100.0,
            self.normative_docs_unnamed,
            self.normative_docs_total
        ));
        if let Some(check) = &self.check {
            out.push_str(&format!(
                "expected {} ± {:.1}%: {}\n",
                check.expected,
                check.tolerance * 100.0,
                if check.passed { "ok" } else { "MISMATCH" }
            ));
        }
        out
    }
}

/// Byte count with a binary unit suffix, for the text report.
fn human_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value.abs() >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Inclusive relative-difference check against an expected total.
pub fn within_tolerance(actual: i64, expected: i64, tolerance: f64) -> bool {
    if expected == 0 {
        return actual == 0;
    }
    let diff = (actual - expected).abs() as f64;
    diff / expected.abs() as f64 <= tolerance
}

/// Validate a tolerance fraction before any query runs.
pub fn validate_tolerance(value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidTolerance { value })
    }
}

/// Collect statistics and run the optional expected-count check.
pub async fn run(
    client: &dyn ImportClient,
    expected: Option<i64>,
    tolerance: f64,
) -> Result<VerificationReport, VerifyError> {
    validate_tolerance(tolerance).context(VerifyConfigSnafu)?;

    let mut tables = Vec::new();
    for meta in known::KNOWN_TABLES {
        let table = meta.entity.to_ascii_lowercase();
        let rows = client
            .query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .await
            .context(StatQuerySnafu)?;
        let size_bytes = client
            .query_scalar(&format!("SELECT pg_total_relation_size('{table}')"))
            .await
            .context(StatQuerySnafu)?;
        tables.push(TableStat {
            table,
            rows,
            size_bytes,
        });
    }

    let count = |name: &str| {
        tables
            .iter()
            .find(|s| s.table == name)
            .map_or(0, |s| s.rows)
    };

    let categories = CATEGORY_TABLES
        .iter()
        .map(|name| CategoryStat {
            category: (*name).to_string(),
            rows: count(name),
        })
        .collect();
    let main_objects: i64 = MAIN_OBJECT_TABLES.iter().map(|name| count(name)).sum();

    let normative_docs_total = count("normative_docs");
    let normative_docs_unnamed = client
        .query_scalar("SELECT COUNT(*) FROM normative_docs WHERE name IS NULL")
        .await
        .context(StatQuerySnafu)?;
    let unnamed_fraction = if normative_docs_total > 0 {
        normative_docs_unnamed as f64 / normative_docs_total as f64
    } else {
        0.0
    };

    let check = expected.map(|expected| ExpectedCheck {
        expected,
        actual: main_objects,
        tolerance,
        passed: within_tolerance(main_objects, expected, tolerance),
    });

    info!(
        main_objects,
        unnamed_fraction,
        passed = check.as_ref().map_or(true, |c| c.passed),
        "Verification complete"
    );

    Ok(VerificationReport {
        tables,
        categories,
        main_objects,
        normative_docs_total,
        normative_docs_unnamed,
        unnamed_fraction,
        check,
    })
}
