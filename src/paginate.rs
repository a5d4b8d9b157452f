use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use tracing::trace;

use crate::config::ColumnContract;
use crate::domain::LensError;
use crate::table::{Table, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

/// One page of rows, every column kept in table order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub rows: Vec<PageRow>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageRow {
    pub cells: Vec<(String, Value)>,
}

impl Serialize for PageRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in self.cells.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl PageRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }
}

pub fn total_pages(total_rows: usize, page_size: usize) -> usize {
    total_rows.div_ceil(page_size)
}

/// Returns rows `[(page - 1) * page_size, page * page_size)` of `table`.
///
/// Pages past the end are empty rather than an error. Values of the rating
/// and review count columns that are not numeric are reported as null.
pub fn page(
    table: &Table,
    contract: &ColumnContract,
    page: usize,
    page_size: usize,
) -> Result<Page, LensError> {
    if page == 0 {
        return Err(LensError::InvalidPage("page starts at 1".into()));
    }
    if page_size == 0 {
        return Err(LensError::InvalidPage("page_size must be at least 1".into()));
    }

    let total_rows = table.len();
    let rbegin = std::cmp::min((page - 1).saturating_mul(page_size), total_rows);
    let rend = std::cmp::min(page.saturating_mul(page_size), total_rows);
    trace!("Page {page}: rows {rbegin}..{rend} of {total_rows}");

    let rows = (rbegin..rend)
        .filter_map(|idx| table.record(idx))
        .map(|record| PageRow {
            cells: record
                .iter()
                .map(|(name, value)| (name.to_string(), normalize(contract, name, value)))
                .collect(),
        })
        .collect();

    Ok(Page {
        rows,
        pagination: Pagination {
            page,
            page_size,
            total_pages: total_pages(total_rows, page_size),
            total_rows,
        },
    })
}

fn normalize(contract: &ColumnContract, column: &str, value: &Value) -> Value {
    if contract.is_numeric(column) {
        value.to_numeric().unwrap_or(Value::Null)
    } else {
        value.clone()
    }
}
