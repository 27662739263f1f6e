//! Console and JSON rendering for both operator commands.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{Category, NameRegistry};
use crate::error::OpsError;
use crate::forecast::ForecastReport;
use crate::namehash::{namehash, NameHash};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameHashLine {
    pub name: String,
    pub hash: NameHash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameHashSection {
    pub title: &'static str,
    pub category: Category,
    pub entries: Vec<NameHashLine>,
}

pub fn hash_names<'a, I>(names: I) -> Result<Vec<NameHashLine>, OpsError>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|name| {
            namehash(name).map(|hash| NameHashLine {
                name: name.to_string(),
                hash,
            })
        })
        .collect()
}

/// Allowed names first, then the mineable ones (which are allowed too).
pub fn namehash_sections(registry: &NameRegistry) -> Result<Vec<NameHashSection>, OpsError> {
    Ok(vec![
        NameHashSection {
            title: "Allowed instances",
            category: Category::Allowed,
            entries: hash_names(registry.allowed.iter().map(String::as_str))?,
        },
        NameHashSection {
            title: "Allowed and mineable instances",
            category: Category::Mineable,
            entries: hash_names(registry.mineable.iter().map(String::as_str))?,
        },
    ])
}

pub fn render_hash_lines(lines: &[NameHashLine]) -> String {
    let mut out = String::new();
    for line in lines {
        let _ = writeln!(out, "{} - {}", line.name, line.hash);
    }
    out
}

pub fn render_namehashes(sections: &[NameHashSection]) -> String {
    let mut out = String::new();
    for section in sections {
        let _ = writeln!(out, "{}:", section.title);
        out.push_str(&render_hash_lines(&section.entries));
    }
    out
}

pub fn namehashes_json(sections: &[NameHashSection]) -> Value {
    json!({ "sections": sections })
}

/// ISO-8601 with milliseconds, or the raw seconds if out of chrono's range.
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| secs.to_string())
}

pub fn render_forecast(report: &ForecastReport) -> String {
    let from_date = format_timestamp(report.window.from_timestamp);
    let days = report.window.span_days;
    let r = &report.result;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Found {} deposits from {} in {} days",
        report.deposits.total, from_date, days
    );
    let _ = writeln!(
        out,
        "Found {} withdrawals from {} in {} days",
        report.withdrawals.total, from_date, days
    );
    let _ = writeln!(
        out,
        "Window: blocks {}..{} ({} per day deposits, {} per day withdrawals)",
        report.window.from_block,
        report.window.to_block,
        report.rates.deposits_per_day,
        report.rates.withdrawals_per_day
    );
    let c = &report.counters;
    let _ = writeln!(
        out,
        "Counters at head: deposits {} processed + {} queued, withdrawals {} processed + {} queued",
        c.processed_deposits, c.unprocessed_deposits, c.processed_withdrawals, c.unprocessed_withdrawals
    );
    let _ = writeln!(out, "{{");
    let _ = writeln!(out, "  depositsFrom: {},", r.deposits_from);
    let _ = writeln!(out, "  depositsStep: {},", r.deposits_step);
    let _ = writeln!(out, "  withdrawalsFrom: {},", r.withdrawals_from);
    let _ = writeln!(out, "  withdrawalsStep: {}", r.withdrawals_step);
    let _ = writeln!(out, "}}");
    out
}

pub fn forecast_json(report: &ForecastReport) -> Result<Value, OpsError> {
    serde_json::to_value(report)
        .map_err(|e| OpsError::Configuration(format!("failed to serialize forecast: {}", e)))
}
