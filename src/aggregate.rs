//! Descriptive statistics over a business review table.
//!
//! `compute` validates the column contract, drops rows whose rating or review
//! count is not numeric, and derives a [`Summary`]: three extreme records,
//! aggregate statistics, category frequencies, two top ten rankings and a
//! rating histogram. All selections are stable: ties resolve to the row that
//! comes first in the table.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, instrument};
use tracing_error::SpanTrace;

use crate::config::ColumnContract;
use crate::domain::LensError;
use crate::table::{Table, Value};

/// Shown in place of a category that is absent or empty.
pub const UNAVAILABLE: &str = "Unavailable";
/// Shown in place of a missing business name.
pub const NO_DATA: &str = "No data";
/// Minimum number of reviews for a business to count as lowest rated.
pub const LOWEST_RATED_MIN_REVIEWS: f64 = 10.0;
pub const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extreme {
    pub name: String,
    pub rating: f64,
    pub review_count: i64,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_businesses: usize,
    pub avg_rating: f64,
    pub avg_reviews: f64,
    pub max_rating: f64,
    pub min_rating: f64,
    pub max_reviews: i64,
    pub min_reviews: i64,
    pub total_reviews: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBusiness {
    pub name: String,
    pub rating: f64,
    pub review_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingBucket {
    pub rating: f64,
    pub count: usize,
}

/// Everything derived from one uploaded table. Never mutated after `compute`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub highest_rated: Extreme,
    pub most_reviewed: Extreme,
    pub lowest_rated: Extreme,
    pub statistics: Statistics,
    pub categories: Vec<CategoryCount>,
    pub top_10_rating: Vec<RankedBusiness>,
    pub top_10_reviews: Vec<RankedBusiness>,
    pub rating_distribution: Vec<RatingBucket>,
    pub raw_data: Table,
}

// One cleaned row, referencing its position in the cleaned table.
#[derive(Debug, Clone, Copy)]
struct Entry {
    row: usize,
    rating: f64,
    reviews: f64,
}

/// Computes the summary for `table`.
///
/// Missing required columns and tables without a single valid row are
/// reported as such. Any other failure is logged here and surfaced as
/// `LensError::Aggregation`.
#[instrument(skip_all, fields(rows = table.len()))]
pub fn compute(table: &Table, contract: &ColumnContract) -> Result<Summary, LensError> {
    let start_time = Instant::now();
    validate(table, contract)?;

    let cleaned = clean(table, contract);
    if cleaned.is_empty() {
        return Err(LensError::EmptyDataset);
    }
    debug!("Cleaning kept {} of {} rows", cleaned.len(), table.len());

    match summarize(cleaned, contract) {
        Ok(summary) => {
            info!(
                "Analyzed {} businesses in {}ms",
                summary.statistics.total_businesses,
                start_time.elapsed().as_millis()
            );
            Ok(summary)
        }
        Err(e) => {
            let msg = match e {
                LensError::Aggregation(msg) => msg,
                other => other.to_string(),
            };
            error!("Aggregation failed: {msg}\n{}", SpanTrace::capture());
            Err(LensError::Aggregation(msg))
        }
    }
}

/// Fails on the first required column the table does not have.
pub fn validate(table: &Table, contract: &ColumnContract) -> Result<(), LensError> {
    match contract.required().into_iter().find(|c| !table.has_column(c)) {
        Some(missing) => Err(LensError::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

/// Coerces rating and review count to numbers and drops rows where either
/// does not parse. Whole numbers stay integers, other columns are untouched.
/// Row order is kept.
pub fn clean(table: &Table, contract: &ColumnContract) -> Table {
    let mut cleaned = Table::new(table.columns().to_vec());
    let (Some(rating_idx), Some(reviews_idx)) = (
        table.column_index(&contract.rating),
        table.column_index(&contract.review_count),
    ) else {
        return cleaned;
    };

    for row in table.rows() {
        if let (Some(rating), Some(reviews)) =
            (row[rating_idx].to_numeric(), row[reviews_idx].to_numeric())
        {
            let mut values = row.clone();
            values[rating_idx] = rating;
            values[reviews_idx] = reviews;
            cleaned.push_row(values);
        }
    }
    cleaned
}

fn summarize(cleaned: Table, contract: &ColumnContract) -> Result<Summary, LensError> {
    let entries = entries(&cleaned, contract)?;
    let has_category = cleaned.has_column(&contract.category);

    let highest = first_by(&entries, |a, b| a.rating > b.rating)?;
    let most_reviewed = first_by(&entries, |a, b| a.reviews > b.reviews)?;
    let lowest = lowest_rated(&entries)?;

    let summary = Summary {
        highest_rated: extreme(&cleaned, contract, highest)?,
        most_reviewed: extreme(&cleaned, contract, most_reviewed)?,
        lowest_rated: extreme(&cleaned, contract, lowest)?,
        statistics: statistics(&entries)?,
        categories: if has_category {
            category_counts(&cleaned, &contract.category)
        } else {
            Vec::new()
        },
        top_10_rating: top_n(&cleaned, contract, &entries, |e| e.rating)?,
        top_10_reviews: top_n(&cleaned, contract, &entries, |e| e.reviews)?,
        rating_distribution: rating_distribution(&entries),
        raw_data: cleaned,
    };
    Ok(summary)
}

fn entries(cleaned: &Table, contract: &ColumnContract) -> Result<Vec<Entry>, LensError> {
    let rating_idx = column(cleaned, &contract.rating)?;
    let reviews_idx = column(cleaned, &contract.review_count)?;
    cleaned
        .rows()
        .iter()
        .enumerate()
        .map(|(row, values)| {
            match (values[rating_idx].as_number(), values[reviews_idx].as_number()) {
                (Some(rating), Some(reviews)) => Ok(Entry {
                    row,
                    rating,
                    reviews,
                }),
                _ => Err(LensError::Aggregation(format!(
                    "row {row} lost its numeric values after cleaning"
                ))),
            }
        })
        .collect()
}

fn column(table: &Table, name: &str) -> Result<usize, LensError> {
    table
        .column_index(name)
        .ok_or_else(|| LensError::Aggregation(format!("column '{name}' vanished")))
}

// Keeps the earliest entry unless a later one is strictly better.
fn first_by<'a>(
    entries: &'a [Entry],
    better: impl Fn(&Entry, &Entry) -> bool,
) -> Result<&'a Entry, LensError> {
    let mut iter = entries.iter();
    let first = iter
        .next()
        .ok_or_else(|| LensError::Aggregation("no rows to select from".into()))?;
    Ok(iter.fold(first, |best, e| if better(e, best) { e } else { best }))
}

// Only businesses with enough reviews qualify; without any, the whole table does.
fn lowest_rated(entries: &[Entry]) -> Result<&Entry, LensError> {
    let qualified: Vec<Entry> = entries
        .iter()
        .filter(|e| e.reviews >= LOWEST_RATED_MIN_REVIEWS)
        .copied()
        .collect();
    let pool = if qualified.is_empty() {
        debug!("No business has {LOWEST_RATED_MIN_REVIEWS} reviews, using all rows");
        entries
    } else {
        &qualified[..]
    };
    let row = first_by(pool, |a, b| a.rating < b.rating)?.row;
    entries
        .iter()
        .find(|e| e.row == row)
        .ok_or_else(|| LensError::Aggregation(format!("row {row} not found")))
}

fn extreme(
    cleaned: &Table,
    contract: &ColumnContract,
    entry: &Entry,
) -> Result<Extreme, LensError> {
    let record = cleaned
        .record(entry.row)
        .ok_or_else(|| LensError::Aggregation(format!("row {} not found", entry.row)))?;
    Ok(Extreme {
        name: record
            .get(&contract.name)
            .and_then(Value::as_text)
            .unwrap_or_else(|| NO_DATA.to_string()),
        rating: round2(entry.rating),
        review_count: to_count(entry.reviews)?,
        category: text_of(record.get(&contract.category))
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
    })
}

fn statistics(entries: &[Entry]) -> Result<Statistics, LensError> {
    let total = entries.len();
    let rating_sum: f64 = entries.iter().map(|e| e.rating).sum();
    let reviews_sum: f64 = entries.iter().map(|e| e.reviews).sum();
    let mean = |sum: f64| if total == 0 { 0.0 } else { round2(sum / total as f64) };

    let max_rating = entries.iter().map(|e| e.rating).fold(f64::MIN, f64::max);
    let min_rating = entries.iter().map(|e| e.rating).fold(f64::MAX, f64::min);
    let max_reviews = entries.iter().map(|e| e.reviews).fold(f64::MIN, f64::max);
    let min_reviews = entries.iter().map(|e| e.reviews).fold(f64::MAX, f64::min);

    if total == 0 {
        return Ok(Statistics {
            total_businesses: 0,
            avg_rating: 0.0,
            avg_reviews: 0.0,
            max_rating: 0.0,
            min_rating: 0.0,
            max_reviews: 0,
            min_reviews: 0,
            total_reviews: 0,
        });
    }

    Ok(Statistics {
        total_businesses: total,
        avg_rating: mean(rating_sum),
        avg_reviews: mean(reviews_sum),
        max_rating: round2(max_rating),
        min_rating: round2(min_rating),
        max_reviews: to_count(max_reviews)?,
        min_reviews: to_count(min_reviews)?,
        total_reviews: to_count(reviews_sum)?,
    })
}

/// Ten most frequent non empty categories, ties in order of first appearance.
fn category_counts(cleaned: &Table, category_column: &str) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for record in cleaned.records() {
        let Some(category) = text_of(record.get(category_column)) else {
            continue;
        };
        match positions.get(&category) {
            Some(&idx) => counts[idx].count += 1,
            None => {
                positions.insert(category.clone(), counts.len());
                counts.push(CategoryCount { category, count: 1 });
            }
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_N);
    counts
}

fn top_n(
    cleaned: &Table,
    contract: &ColumnContract,
    entries: &[Entry],
    key: impl Fn(&Entry) -> f64,
) -> Result<Vec<RankedBusiness>, LensError> {
    let mut ranked: Vec<&Entry> = entries.iter().collect();
    // sort_by is stable, equal keys keep table order
    ranked.sort_by(|a, b| key(*b).partial_cmp(&key(*a)).unwrap_or(Ordering::Equal));
    let has_category = cleaned.has_column(&contract.category);

    ranked
        .into_iter()
        .take(TOP_N)
        .map(|entry| {
            let record = cleaned
                .record(entry.row)
                .ok_or_else(|| LensError::Aggregation(format!("row {} not found", entry.row)))?;
            Ok(RankedBusiness {
                name: record
                    .get(&contract.name)
                    .and_then(Value::as_text)
                    .unwrap_or_else(|| NO_DATA.to_string()),
                rating: entry.rating,
                review_count: to_count(entry.reviews)?,
                category: if has_category {
                    text_of(record.get(&contract.category))
                } else {
                    None
                },
            })
        })
        .collect()
}

fn rating_distribution(entries: &[Entry]) -> Vec<RatingBucket> {
    let mut ratings: Vec<f64> = entries.iter().map(|e| e.rating).collect();
    ratings.sort_by(f64::total_cmp);

    let mut buckets: Vec<RatingBucket> = Vec::new();
    for rating in ratings {
        match buckets.last_mut() {
            Some(last) if last.rating == rating => last.count += 1,
            _ => buckets.push(RatingBucket { rating, count: 1 }),
        }
    }
    buckets
}

// Blank text counts as missing.
fn text_of(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_text)
        .filter(|s| !s.trim().is_empty())
}

pub fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

// Review counts are whole numbers; fractional input is truncated.
fn to_count(n: f64) -> Result<i64, LensError> {
    if n.is_finite() && n >= i64::MIN as f64 && n < i64::MAX as f64 {
        Ok(n.trunc() as i64)
    } else {
        Err(LensError::Aggregation(format!(
            "review count {n} is outside the supported range"
        )))
    }
}
