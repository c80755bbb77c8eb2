//! The quality gate: five independent checks that decide whether a candidate
//! dataset may be committed.
//!
//! Each check yields pass/fail plus a diagnostic metric. The aggregate score
//! is `passed / 5` with a 0.8 pass threshold; the duplicates check is
//! additionally an independent hard gate: a single duplicate violation
//! blocks the commit no matter what the score says.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use url::Url;

use crate::dates;
use crate::models::RawRecord;

/// Maximum tolerated missing fraction per critical field.
pub const MISSING_THRESHOLD: f64 = 0.10;
/// Maximum tolerated fraction of records with format violations.
pub const FORMAT_THRESHOLD: f64 = 0.10;
/// Maximum tolerated fraction of low-quality (short) content.
pub const SHORT_CONTENT_THRESHOLD: f64 = 0.15;
/// Content shorter than this is counted as low-quality.
pub const MIN_CONTENT_CHARS: usize = 200;
/// Newest record older than this fails the recency check outright.
pub const MAX_AGE_DAYS: i64 = 30;
/// Newest record older than this is flagged as possibly stale.
pub const STALE_WARNING_DAYS: i64 = 14;
/// Aggregate score required for the gate to pass.
pub const GATE_THRESHOLD: f64 = 0.8;

/// Content value the fetch layer emits when an article page request fails.
pub const FETCH_ERROR_MARKER: &str = "Error fetching content";
/// Content value the fetch layer emits when a page has no usable paragraphs.
pub const NO_CONTENT_MARKER: &str = "No content found";
/// Content values that mark a record as a scraping failure.
pub const ERROR_MARKERS: [&str; 2] = [FETCH_ERROR_MARKER, NO_CONTENT_MARKER];

/// Host every record link must point at.
pub const SOURCE_HOST: &str = "www.whitehouse.gov";

/// A link is canonical when it is a well-formed http(s) URL on the source host.
fn canonical_link(link: &str) -> bool {
    match Url::parse(link.trim()) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https") && url.host_str() == Some(SOURCE_HOST)
        }
        Err(_) => false,
    }
}

fn markup_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    MissingValues,
    Format,
    Duplicates,
    ContentQuality,
    Recency,
}

impl CheckName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::MissingValues => "missing_values",
            CheckName::Format => "format",
            CheckName::Duplicates => "duplicates",
            CheckName::ContentQuality => "content_quality",
            CheckName::Recency => "recency",
        }
    }
}

/// Outcome of a single check: the decision plus its diagnostic metric.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckResult {
    pub name: CheckName,
    pub passed: bool,
    pub metric: f64,
    pub threshold: f64,
    pub notes: Vec<String>,
}

/// The full per-check report, always produced whether or not the gate passes.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QualityReport {
    pub record_count: usize,
    pub checks: Vec<CheckResult>,
}

impl QualityReport {
    /// Run all five checks against a candidate dataset.
    ///
    /// `today` is the run date the recency check measures against.
    pub fn evaluate(records: &[RawRecord], today: NaiveDate) -> Self {
        if records.is_empty() {
            let checks = [
                CheckName::MissingValues,
                CheckName::Format,
                CheckName::Duplicates,
                CheckName::ContentQuality,
                CheckName::Recency,
            ]
            .into_iter()
            .map(|name| CheckResult {
                name,
                passed: false,
                metric: 0.0,
                threshold: 0.0,
                notes: vec!["dataset is empty".into()],
            })
            .collect();
            return Self {
                record_count: 0,
                checks,
            };
        }

        let report = Self {
            record_count: records.len(),
            checks: vec![
                check_missing_values(records),
                check_format(records),
                check_duplicates(records),
                check_content_quality(records),
                check_recency(records, today),
            ],
        };

        tracing::info!(
            records = report.record_count,
            score = report.score(),
            passed = report.passed_count(),
            "Quality checks complete"
        );
        report
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// `passed / total` over the five checks.
    pub fn score(&self) -> f64 {
        self.passed_count() as f64 / self.checks.len() as f64
    }

    fn check(&self, name: CheckName) -> Option<&CheckResult> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// True when no duplicate violation of any kind was found.
    pub fn duplicates_clean(&self) -> bool {
        self.check(CheckName::Duplicates).is_none_or(|c| c.passed)
    }

    /// The gate decision: score at or above 0.8 *and* a clean duplicates
    /// check. Duplicates are a hard gate independent of the score.
    pub fn gate_passes(&self) -> bool {
        self.score() >= GATE_THRESHOLD && self.duplicates_clean()
    }

    /// Render the human-readable report artifact.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Data quality report: {} records", self.record_count);
        for check in &self.checks {
            let _ = writeln!(
                out,
                "  [{}] {:<15} metric={:.3} threshold={:.3}",
                if check.passed { "PASS" } else { "FAIL" },
                check.name.as_str(),
                check.metric,
                check.threshold,
            );
            for note in &check.notes {
                let _ = writeln!(out, "         - {note}");
            }
        }
        let _ = writeln!(
            out,
            "Score: {:.2} ({}/{} checks passed)",
            self.score(),
            self.passed_count(),
            self.checks.len(),
        );
        if self.gate_passes() {
            let _ = writeln!(out, "Gate: PASS");
        } else if !self.duplicates_clean() && self.score() >= GATE_THRESHOLD {
            let _ = writeln!(out, "Gate: FAIL (duplicate violations block the commit)");
        } else {
            let _ = writeln!(out, "Gate: FAIL");
        }
        out
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

/// Per critical field, the fraction of records with no value.
/// Fails when any field's missing fraction exceeds 10%.
pub fn check_missing_values(records: &[RawRecord]) -> CheckResult {
    let total = records.len() as f64;
    let fields: [(&str, fn(&RawRecord) -> bool); 4] = [
        ("title", |r| blank(&r.title)),
        ("link", |r| blank(&r.link)),
        ("date", |r| blank(&r.date)),
        ("content", |r| blank(&r.content)),
    ];

    let mut worst = 0.0_f64;
    let mut notes = Vec::new();
    for (field, is_missing) in fields {
        let missing = records.iter().filter(|r| is_missing(r)).count();
        let fraction = missing as f64 / total;
        worst = worst.max(fraction);
        if missing > 0 {
            notes.push(format!(
                "{field}: {missing} missing ({:.1}%)",
                fraction * 100.0
            ));
        }
    }

    CheckResult {
        name: CheckName::MissingValues,
        passed: worst <= MISSING_THRESHOLD,
        metric: worst,
        threshold: MISSING_THRESHOLD,
        notes,
    }
}

/// Format validation over present values: links must match the canonical
/// source pattern, dates must parse as calendar dates, content must not
/// contain scraping-error markers or leftover markup. Fails when the
/// fraction of records violating any of these exceeds 10%.
pub fn check_format(records: &[RawRecord]) -> CheckResult {
    let mut bad_links = 0usize;
    let mut bad_dates = 0usize;
    let mut bad_content = 0usize;
    let mut violating = 0usize;

    for record in records {
        let bad_link = record
            .link
            .as_deref()
            .is_some_and(|l| !canonical_link(l));
        let bad_date = record
            .date
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty() && dates::parse_date(d).is_none());
        let bad_body = record.content.as_deref().is_some_and(|c| {
            ERROR_MARKERS.iter().any(|m| c.contains(m)) || markup_pattern().is_match(c)
        });

        bad_links += bad_link as usize;
        bad_dates += bad_date as usize;
        bad_content += bad_body as usize;
        violating += (bad_link || bad_date || bad_body) as usize;
    }

    let fraction = violating as f64 / records.len() as f64;
    let mut notes = Vec::new();
    if bad_links > 0 {
        notes.push(format!("{bad_links} record(s) with non-canonical link"));
    }
    if bad_dates > 0 {
        notes.push(format!("{bad_dates} record(s) with unparseable date"));
    }
    if bad_content > 0 {
        notes.push(format!(
            "{bad_content} record(s) with error markers or markup in content"
        ));
    }

    CheckResult {
        name: CheckName::Format,
        passed: fraction <= FORMAT_THRESHOLD,
        metric: fraction,
        threshold: FORMAT_THRESHOLD,
        notes,
    }
}

/// Zero tolerance: any exact full-row duplicate, any shared link, or any
/// title appearing under two different links fails the check.
pub fn check_duplicates(records: &[RawRecord]) -> CheckResult {
    let mut exact_dupes = 0usize;
    let mut seen_rows: HashSet<&RawRecord> = HashSet::new();
    for record in records {
        if !seen_rows.insert(record) {
            exact_dupes += 1;
        }
    }

    let mut link_counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        if let Some(key) = record.key() {
            *link_counts.entry(key).or_default() += 1;
        }
    }
    let link_dupes: usize = link_counts
        .values()
        .filter(|&&n| n > 1)
        .map(|&n| n - 1)
        .sum();

    let mut title_links: HashMap<&str, HashSet<&str>> = HashMap::new();
    for record in records {
        if let (Some(title), Some(key)) = (record.title.as_deref(), record.key()) {
            let title = title.trim();
            if !title.is_empty() {
                title_links.entry(title).or_default().insert(key);
            }
        }
    }
    let multi_link_titles = title_links.values().filter(|links| links.len() > 1).count();

    let violations = exact_dupes + link_dupes + multi_link_titles;
    let mut notes = Vec::new();
    if exact_dupes > 0 {
        notes.push(format!("{exact_dupes} exact duplicate row(s)"));
    }
    if link_dupes > 0 {
        notes.push(format!("{link_dupes} duplicate link(s)"));
    }
    if multi_link_titles > 0 {
        notes.push(format!(
            "{multi_link_titles} title(s) shared across different links"
        ));
    }

    CheckResult {
        name: CheckName::Duplicates,
        passed: violations == 0,
        metric: violations as f64,
        threshold: 0.0,
        notes,
    }
}

/// Records with content shorter than 200 characters count as low-quality;
/// fails when their fraction exceeds 15%.
pub fn check_content_quality(records: &[RawRecord]) -> CheckResult {
    let lengths: Vec<usize> = records
        .iter()
        .map(|r| r.content.as_deref().unwrap_or("").chars().count())
        .collect();

    let short = lengths.iter().filter(|&&n| n < MIN_CONTENT_CHARS).count();
    let fraction = short as f64 / records.len() as f64;

    let mut notes = Vec::new();
    if let (Some(min), Some(max)) = (lengths.iter().min(), lengths.iter().max()) {
        let avg = lengths.iter().sum::<usize>() / lengths.len();
        notes.push(format!("content length: avg={avg} min={min} max={max}"));
    }
    if short > 0 {
        notes.push(format!(
            "{short} record(s) with content under {MIN_CONTENT_CHARS} chars"
        ));
    }

    CheckResult {
        name: CheckName::ContentQuality,
        passed: fraction <= SHORT_CONTENT_THRESHOLD,
        metric: fraction,
        threshold: SHORT_CONTENT_THRESHOLD,
        notes,
    }
}

/// The newest parseable date must be within 30 days of the run date.
/// 14–30 days is a soft staleness warning that does not fail the check.
pub fn check_recency(records: &[RawRecord], today: NaiveDate) -> CheckResult {
    let most_recent = records
        .iter()
        .filter_map(|r| r.date.as_deref().and_then(dates::parse_date))
        .max();

    let Some(most_recent) = most_recent else {
        return CheckResult {
            name: CheckName::Recency,
            passed: false,
            metric: -1.0,
            threshold: MAX_AGE_DAYS as f64,
            notes: vec!["no parseable dates in the dataset".into()],
        };
    };

    let days_old = (today - most_recent).num_days();
    let mut notes = vec![format!("most recent record: {most_recent} ({days_old} days old)")];
    if days_old > STALE_WARNING_DAYS && days_old <= MAX_AGE_DAYS {
        tracing::warn!(days_old, "Data may be stale");
        notes.push(format!(
            "data may be stale: newest record is {days_old} days old"
        ));
    }

    CheckResult {
        name: CheckName::Recency,
        passed: days_old <= MAX_AGE_DAYS,
        metric: days_old as f64,
        threshold: MAX_AGE_DAYS as f64,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{make_record, make_record_with, test_today};

    fn healthy_dataset(n: usize) -> Vec<RawRecord> {
        (1..=n).map(make_record).collect()
    }

    #[test]
    fn healthy_dataset_passes_all_checks() {
        let records = healthy_dataset(20);
        let report = QualityReport::evaluate(&records, test_today());
        assert_eq!(report.passed_count(), 5);
        assert!((report.score() - 1.0).abs() < f64::EPSILON);
        assert!(report.gate_passes());
    }

    #[test]
    fn empty_dataset_fails_every_check() {
        let report = QualityReport::evaluate(&[], test_today());
        assert_eq!(report.passed_count(), 0);
        assert!(!report.gate_passes());
    }

    #[test]
    fn missing_values_fails_above_ten_percent() {
        let mut records = healthy_dataset(10);
        records[0].title = None;
        records[1].title = Some("   ".into());
        let result = check_missing_values(&records);
        assert!(!result.passed);
        assert!((result.metric - 0.2).abs() < 1e-9);
    }

    #[test]
    fn missing_values_tolerates_ten_percent() {
        let mut records = healthy_dataset(10);
        records[0].date = None;
        let result = check_missing_values(&records);
        assert!(result.passed);
        assert!((result.metric - 0.1).abs() < 1e-9);
    }

    #[test]
    fn format_flags_foreign_links_and_bad_dates() {
        let mut records = healthy_dataset(10);
        records[0].link = Some("https://example.com/not-the-source/".into());
        records[1].date = Some("sometime in spring".into());
        let result = check_format(&records);
        assert!(!result.passed);
        assert!((result.metric - 0.2).abs() < 1e-9);
    }

    #[test]
    fn canonical_link_requires_source_host_and_http_scheme() {
        assert!(canonical_link(
            "https://www.whitehouse.gov/presidential-actions/some-order/"
        ));
        assert!(canonical_link("http://www.whitehouse.gov/"));
        assert!(!canonical_link("https://whitehouse.gov/presidential-actions/"));
        assert!(!canonical_link("ftp://www.whitehouse.gov/"));
        assert!(!canonical_link("not a url"));
    }

    #[test]
    fn format_flags_error_markers_and_markup() {
        let mut records = healthy_dataset(20);
        records[0].content = Some("Error fetching content".into());
        records[1].content = Some(format!("<div class=\"x\">{}</div>", "word ".repeat(60)));
        let result = check_format(&records);
        assert!(result.passed); // 2/20 = 10%, at the threshold
        assert!((result.metric - 0.1).abs() < 1e-9);
        assert!(
            result
                .notes
                .iter()
                .any(|n| n.contains("error markers or markup"))
        );
    }

    #[test]
    fn format_ignores_absent_values() {
        // Absence is the missing-values check's concern, not format's.
        let mut records = healthy_dataset(4);
        records[0].date = None;
        records[1].content = None;
        let result = check_format(&records);
        assert!(result.passed);
        assert_eq!(result.metric, 0.0);
    }

    #[test]
    fn duplicate_link_fails_regardless_of_dataset_size() {
        let mut records = healthy_dataset(500);
        records[499].link = records[0].link.clone();
        let result = check_duplicates(&records);
        assert!(!result.passed);
        assert_eq!(result.metric, 1.0);
    }

    #[test]
    fn exact_row_duplicate_fails() {
        let mut records = healthy_dataset(5);
        records.push(records[2].clone());
        let result = check_duplicates(&records);
        assert!(!result.passed);
        // The cloned row is both an exact duplicate and a link duplicate.
        assert_eq!(result.metric, 2.0);
    }

    #[test]
    fn shared_title_with_different_links_fails() {
        let records = vec![
            make_record_with(
                "https://www.whitehouse.gov/presidential-actions/a/",
                "Securing the Border",
                "2025-04-10",
                &"x".repeat(300),
            ),
            make_record_with(
                "https://www.whitehouse.gov/presidential-actions/b/",
                "Securing the Border",
                "2025-04-11",
                &"y".repeat(300),
            ),
        ];
        let result = check_duplicates(&records);
        assert!(!result.passed);
        assert_eq!(result.metric, 1.0);
    }

    #[test]
    fn short_content_fails_above_fifteen_percent() {
        let mut records = healthy_dataset(10);
        records[0].content = Some("too short".into());
        records[1].content = Some("also short".into());
        let result = check_content_quality(&records);
        assert!(!result.passed);
        assert!((result.metric - 0.2).abs() < 1e-9);
    }

    #[test]
    fn recency_hard_fails_past_thirty_days() {
        // Scenario D: newest record 35 days before run time.
        let mut records = healthy_dataset(3);
        for r in &mut records {
            r.date = Some("2025-03-11".into()); // 35 days before test_today()
        }
        let result = check_recency(&records, test_today());
        assert!(!result.passed);
        assert_eq!(result.metric, 35.0);
    }

    #[test]
    fn recency_warns_but_passes_between_14_and_30_days() {
        let mut records = healthy_dataset(3);
        for r in &mut records {
            r.date = Some("2025-03-26".into()); // 20 days before test_today()
        }
        let result = check_recency(&records, test_today());
        assert!(result.passed);
        assert!(result.notes.iter().any(|n| n.contains("stale")));
    }

    #[test]
    fn recency_fails_without_parseable_dates() {
        let mut records = healthy_dataset(2);
        for r in &mut records {
            r.date = Some("No date".into());
        }
        let result = check_recency(&records, test_today());
        assert!(!result.passed);
    }

    #[test]
    fn score_formula_holds_for_every_outcome_combination() {
        let names = [
            CheckName::MissingValues,
            CheckName::Format,
            CheckName::Duplicates,
            CheckName::ContentQuality,
            CheckName::Recency,
        ];
        for mask in 0u32..32 {
            let checks: Vec<CheckResult> = names
                .iter()
                .enumerate()
                .map(|(i, &name)| CheckResult {
                    name,
                    passed: mask & (1 << i) != 0,
                    metric: 0.0,
                    threshold: 0.0,
                    notes: vec![],
                })
                .collect();
            let passed = mask.count_ones() as usize;
            let report = QualityReport {
                record_count: 1,
                checks,
            };
            assert!((report.score() - passed as f64 / 5.0).abs() < f64::EPSILON);

            let duplicates_pass = mask & (1 << 2) != 0;
            let expected_gate = report.score() >= GATE_THRESHOLD && duplicates_pass;
            assert_eq!(report.gate_passes(), expected_gate, "mask {mask:b}");
        }
    }

    #[test]
    fn one_failing_check_still_passes_the_gate() {
        // Scenario B: 12% of content missing, every other check clean.
        let mut records = healthy_dataset(50);
        for r in records.iter_mut().take(6) {
            r.content = None;
        }
        let report = QualityReport::evaluate(&records, test_today());
        assert!(!report.check(CheckName::MissingValues).unwrap().passed);
        // Missing content is also short content: 12% < 15% keeps quality green.
        assert!(report.check(CheckName::ContentQuality).unwrap().passed);
        assert_eq!(report.passed_count(), 4);
        assert!((report.score() - 0.8).abs() < f64::EPSILON);
        assert!(report.gate_passes());
    }

    #[test]
    fn duplicate_violation_blocks_gate_despite_passing_score() {
        // Scenario C: one duplicated link, all other checks pass.
        let mut records = healthy_dataset(50);
        records[49].link = records[0].link.clone();
        records[49].title = Some("A different title".into());
        let report = QualityReport::evaluate(&records, test_today());
        assert!(report.score() >= GATE_THRESHOLD);
        assert!(!report.gate_passes());
    }

    #[test]
    fn render_includes_every_check_and_the_gate_line() {
        let mut records = healthy_dataset(10);
        records[9].link = records[0].link.clone();
        let report = QualityReport::evaluate(&records, test_today());
        let rendered = report.render();
        for name in [
            "missing_values",
            "format",
            "duplicates",
            "content_quality",
            "recency",
        ] {
            assert!(rendered.contains(name), "missing {name} in report");
        }
        assert!(rendered.contains("Gate: FAIL (duplicate violations block the commit)"));
    }
}
