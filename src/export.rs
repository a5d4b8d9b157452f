use chrono::{DateTime, TimeZone};
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::aggregate::{Extreme, RankedBusiness, Summary};
use crate::domain::LensError;

pub const HEADER: [&str; 3] = ["Bagian", "Keterangan", "Nilai"];

/// One line of the flat report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub section: String,
    pub label: String,
    pub value: String,
}

impl ReportRow {
    fn new(section: &str, label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            section: section.to_string(),
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Flattens a summary into report rows: totals, the three extremes, then both
/// top ten rankings.
pub fn flatten(summary: &Summary) -> Vec<ReportRow> {
    let stats = &summary.statistics;
    let mut rows = vec![
        ReportRow::new("Summary", "Total Businesses", stats.total_businesses.to_string()),
        ReportRow::new("Summary", "Average Rating", fmt_decimal(stats.avg_rating)),
        ReportRow::new("Summary", "Average Reviews", fmt_decimal(stats.avg_reviews)),
        ReportRow::new("Summary", "Total Reviews", stats.total_reviews.to_string()),
        extreme_row("Highest Rated", &summary.highest_rated),
        extreme_row("Most Reviewed", &summary.most_reviewed),
        extreme_row("Lowest Rated", &summary.lowest_rated),
    ];
    rows.extend(ranked_rows("Top 10 Rating", &summary.top_10_rating));
    rows.extend(ranked_rows("Top 10 Reviews", &summary.top_10_reviews));
    rows
}

fn extreme_row(section: &str, extreme: &Extreme) -> ReportRow {
    ReportRow::new(
        section,
        extreme.name.clone(),
        business_value(extreme.rating, extreme.review_count, &extreme.category),
    )
}

fn ranked_rows<'a>(
    section: &'a str,
    ranked: &'a [RankedBusiness],
) -> impl Iterator<Item = ReportRow> + 'a {
    ranked.iter().enumerate().map(move |(idx, business)| {
        ReportRow::new(
            section,
            format!("{}. {}", idx + 1, business.name),
            business_value(
                business.rating,
                business.review_count,
                business.category.as_deref().unwrap_or("-"),
            ),
        )
    })
}

pub fn business_value(rating: f64, reviews: i64, category: &str) -> String {
    format!(
        "Rating: {} | Reviews: {} | Category: {}",
        fmt_decimal(rating),
        reviews,
        category
    )
}

// Keeps one decimal on whole numbers so ratings read as 4.0, not 4.
fn fmt_decimal(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}

/// Writes the rows as CSV with a UTF-8 byte order mark so spreadsheet tools
/// detect the encoding.
pub fn write_csv<W: Write>(rows: &[ReportRow], writer: &mut W) -> Result<(), LensError> {
    let sections: Vec<String> = rows.iter().map(|r| r.section.clone()).collect();
    let labels: Vec<String> = rows.iter().map(|r| r.label.clone()).collect();
    let values: Vec<String> = rows.iter().map(|r| r.value.clone()).collect();
    let mut df = df!(
        HEADER[0] => sections,
        HEADER[1] => labels,
        HEADER[2] => values
    )?;
    CsvWriter::new(writer)
        .include_bom(true)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

pub fn report_file_name<Tz: TimeZone>(timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("results_{}.csv", timestamp.format("%Y%m%d_%H%M%S"))
}

/// Writes the report into `dir` and returns the path of the new file.
pub fn save_report<Tz: TimeZone>(
    rows: &[ReportRow],
    dir: &Path,
    timestamp: &DateTime<Tz>,
) -> Result<PathBuf, LensError>
where
    Tz::Offset: std::fmt::Display,
{
    fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(timestamp));
    let mut file = File::create(&path)?;
    write_csv(rows, &mut file)?;
    info!("Exported {} report rows to {}", rows.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::compute;
    use crate::config::ColumnContract;
    use crate::table::{Table, Value};
    use chrono::Utc;

    fn summary_of(n: usize) -> Summary {
        let mut table = Table::new(vec![
            "nama".into(),
            "rating".into(),
            "jumlah_ulasan".into(),
            "kategori_usaha".into(),
        ]);
        for i in 0..n {
            table.push_row(vec![
                Value::Text(format!("Usaha {i}")),
                Value::Number(3.0 + (i % 5) as f64 * 0.5),
                Value::Number((i * 7) as f64),
                if i % 2 == 0 {
                    Value::Text("Food".into())
                } else {
                    Value::Null
                },
            ]);
        }
        compute(&table, &ColumnContract::default()).unwrap()
    }

    #[test]
    fn row_count_follows_dataset_size() {
        for n in [1, 3, 10, 25] {
            let rows = flatten(&summary_of(n));
            assert_eq!(rows.len(), 4 + 3 + 2 * n.min(10), "n = {n}");
        }
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let rows = flatten(&summary_of(12));
        let mut sections: Vec<&str> = rows.iter().map(|r| r.section.as_str()).collect();
        sections.dedup();
        assert_eq!(
            sections,
            [
                "Summary",
                "Highest Rated",
                "Most Reviewed",
                "Lowest Rated",
                "Top 10 Rating",
                "Top 10 Reviews"
            ]
        );
        assert_eq!(rows[0].label, "Total Businesses");
        assert_eq!(rows[0].value, "12");
        assert!(rows[7].label.starts_with("1. "));
        assert!(rows[16].label.starts_with("10. "));
    }

    #[test]
    fn business_values_are_composite() {
        assert_eq!(
            business_value(4.0, 20, "Food"),
            "Rating: 4.0 | Reviews: 20 | Category: Food"
        );
        assert_eq!(
            business_value(4.25, 3, "-"),
            "Rating: 4.25 | Reviews: 3 | Category: -"
        );
    }

    #[test]
    fn ranked_rows_without_category_use_dash() {
        let summary = summary_of(2);
        let rows = flatten(&summary);
        // Usaha 1 has no category and the higher rating.
        assert_eq!(rows[7].label, "1. Usaha 1");
        assert!(rows[7].value.ends_with("Category: -"), "{}", rows[7].value);
    }

    #[test]
    fn flatten_is_deterministic() {
        let summary = summary_of(15);
        assert_eq!(flatten(&summary), flatten(&summary));
    }

    #[test]
    fn csv_has_bom_and_header() {
        let rows = flatten(&summary_of(3));
        let mut buf = Vec::new();
        write_csv(&rows, &mut buf).unwrap();
        assert!(buf.starts_with(&[0xEF, 0xBB, 0xBF]));
        let text = String::from_utf8(buf[3..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Bagian,Keterangan,Nilai"));
        assert_eq!(lines.count(), rows.len());
    }

    #[test]
    fn file_name_uses_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap();
        assert_eq!(report_file_name(&ts), "results_20240501_130405.csv");
    }

    #[test]
    fn save_report_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 13, 4, 5).unwrap();
        let path = save_report(&flatten(&summary_of(4)), dir.path(), &ts).unwrap();
        assert_eq!(path, dir.path().join("results_20240501_130405.csv"));
        assert!(path.is_file());
    }
}
