use std::path::Path;
use tracing::{info, warn};

use crate::aggregate::{self, Summary};
use crate::config::ColumnContract;
use crate::domain::LensError;
use crate::export::{self, ReportRow};
use crate::paginate::{self, Page};
use crate::table::Table;

/// The uploaded table and the summary computed from it.
#[derive(Debug)]
pub struct Dataset {
    pub table: Table,
    pub summary: Summary,
}

/// Owner of the single active dataset.
///
/// A successful load replaces whatever was active, a failed load leaves it
/// untouched, `close` drops it. Not synchronized: one caller at a time.
#[derive(Debug, Default)]
pub struct Session {
    contract: ColumnContract,
    current: Option<Dataset>,
}

impl Session {
    pub fn new(contract: ColumnContract) -> Self {
        Self {
            contract,
            current: None,
        }
    }

    /// Analyzes `table` and makes it the active dataset.
    pub fn load(&mut self, table: Table) -> Result<&Summary, LensError> {
        let summary = aggregate::compute(&table, &self.contract).inspect_err(|e| {
            warn!("Rejected table with {} rows: {e}", table.len());
        })?;
        if self.current.is_some() {
            info!("Replacing active dataset");
        }
        let dataset = self.current.insert(Dataset { table, summary });
        Ok(&dataset.summary)
    }

    pub fn load_path(&mut self, path: &Path) -> Result<&Summary, LensError> {
        let table = Table::load(path)?;
        self.load(table)
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.current.as_ref()
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.current.as_ref().map(|d| &d.summary)
    }

    fn active(&self) -> Result<&Dataset, LensError> {
        self.current.as_ref().ok_or(LensError::NoActiveDataset)
    }

    /// One page of the uploaded rows.
    pub fn page(&self, page: usize, page_size: usize) -> Result<Page, LensError> {
        let dataset = self.active()?;
        paginate::page(&dataset.table, &self.contract, page, page_size)
    }

    pub fn export(&self) -> Result<Vec<ReportRow>, LensError> {
        Ok(export::flatten(&self.active()?.summary))
    }

    pub fn close(&mut self) {
        if self.current.take().is_some() {
            info!("Closed active dataset");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;

    fn table(names: &[&str]) -> Table {
        let mut table = Table::new(vec![
            "nama".into(),
            "rating".into(),
            "jumlah_ulasan".into(),
        ]);
        for (i, name) in names.iter().enumerate() {
            table.push_row(vec![
                Value::Text(name.to_string()),
                Value::Number(3.0 + i as f64 * 0.5),
                Value::Number(10.0 * (i + 1) as f64),
            ]);
        }
        table
    }

    #[test]
    fn empty_session_has_no_dataset() {
        let session = Session::default();
        assert!(!session.is_active());
        assert!(matches!(session.page(1, 50), Err(LensError::NoActiveDataset)));
        assert!(matches!(session.export(), Err(LensError::NoActiveDataset)));
    }

    #[test]
    fn load_page_export_close() {
        let mut session = Session::new(ColumnContract::default());
        let summary = session.load(table(&["A", "B", "C"])).unwrap();
        assert_eq!(summary.highest_rated.name, "C");

        let page = session.page(1, 2).unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(session.export().unwrap().len(), 7 + 2 * 3);

        session.close();
        assert!(!session.is_active());
        assert!(matches!(session.page(1, 2), Err(LensError::NoActiveDataset)));
    }

    #[test]
    fn next_load_replaces_dataset() {
        let mut session = Session::default();
        session.load(table(&["A", "B"])).unwrap();
        session.load(table(&["X"])).unwrap();
        assert_eq!(session.summary().unwrap().highest_rated.name, "X");
        assert_eq!(session.page(1, 10).unwrap().pagination.total_rows, 1);
    }

    #[test]
    fn failed_load_keeps_previous_dataset() {
        let mut session = Session::default();
        session.load(table(&["A"])).unwrap();
        let err = session
            .load(Table::new(vec!["nama".into()]))
            .unwrap_err();
        assert!(matches!(err, LensError::MissingColumn(ref c) if c == "rating"));
        assert!(err.is_recoverable());
        assert_eq!(session.summary().unwrap().highest_rated.name, "A");
    }

    #[test]
    fn paging_uses_uploaded_rows_not_cleaned_ones() {
        let mut session = Session::default();
        let mut uploaded = table(&["A", "B"]);
        uploaded.push_row(vec![Value::Text("C".into()), Value::Null, Value::Null]);
        session.load(uploaded).unwrap();
        assert_eq!(session.summary().unwrap().statistics.total_businesses, 2);
        assert_eq!(session.page(1, 50).unwrap().pagination.total_rows, 3);
    }
}
