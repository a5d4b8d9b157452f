//! Load, page, export and close through the public library API.

use bizlens::export::{self, HEADER};
use bizlens::narrative::{NarrativeError, NarrativeGenerator, narrate_or_fallback};
use bizlens::{ColumnContract, LensError, Session, Table, Value};
use chrono::{TimeZone, Utc};
use std::fs;
use tempfile::TempDir;

fn write_csv(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

struct Echo;

impl NarrativeGenerator for Echo {
    fn generate(&self, digest: &str) -> Result<String, NarrativeError> {
        Ok(format!("{} chars", digest.len()))
    }
}

#[test]
fn end_to_end_session() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "usaha.csv",
        "nama,rating,jumlah_ulasan,kategori_usaha\n\
         Warung A,4.5,20,Food\n\
         Toko B,3.0,5,Retail\n\
         Kafe C,4.9,200,Food\n\
         Rusak,n/a,7,Food\n",
    );

    let mut session = Session::new(ColumnContract::default());
    let summary = session.load_path(&path).unwrap();
    assert_eq!(summary.statistics.total_businesses, 3);
    assert_eq!(summary.highest_rated.name, "Kafe C");
    assert_eq!(summary.lowest_rated.name, "Warung A");

    // Paging covers the uploaded rows, including the one dropped from the summary.
    let page = session.page(1, 50).unwrap();
    assert_eq!(page.pagination.total_rows, 4);
    assert_eq!(page.rows[3].get("rating"), Some(&Value::Null));
    assert_eq!(page.rows[3].get("nama"), Some(&Value::Text("Rusak".into())));

    let rows = session.export().unwrap();
    assert_eq!(rows.len(), 7 + 2 * 3);
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 5).unwrap();
    let saved = export::save_report(&rows, dir.path(), &ts).unwrap();
    assert_eq!(saved.file_name().unwrap(), "results_20240301_083005.csv");
    let text = fs::read_to_string(&saved).unwrap();
    assert!(text.trim_start_matches('\u{feff}').starts_with(&HEADER.join(",")));

    let narrative = narrate_or_fallback(&Echo, session.summary().unwrap());
    assert!(narrative.ends_with("chars"));

    session.close();
    assert!(!session.is_active());
    assert!(matches!(session.page(1, 50), Err(LensError::NoActiveDataset)));
    assert!(matches!(session.export(), Err(LensError::NoActiveDataset)));
}

#[test]
fn failed_reload_keeps_previous_dataset() {
    let dir = TempDir::new().unwrap();
    let good = write_csv(
        &dir,
        "good.csv",
        "nama,rating,jumlah_ulasan\nA,4.0,10\n",
    );
    let bad = write_csv(&dir, "bad.csv", "nama,rating\nA,4.0\n");

    let mut session = Session::new(ColumnContract::default());
    session.load_path(&good).unwrap();

    let err = session.load_path(&bad).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(session.summary().unwrap().highest_rated.name, "A");
}

#[test]
fn loaded_table_keeps_column_order() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "order.csv",
        "kategori_usaha,nama,alamat,rating,jumlah_ulasan\nFood,A,Jl. Merdeka,4.0,10\n",
    );

    let table = Table::load(&path).unwrap();
    assert_eq!(
        table.columns(),
        ["kategori_usaha", "nama", "alamat", "rating", "jumlah_ulasan"]
    );
    let record = table.record(0).unwrap();
    assert_eq!(record.get("alamat"), Some(&Value::Text("Jl. Merdeka".into())));
    assert_eq!(record.get("rating"), Some(&Value::Number(4.0)));
}

#[test]
fn extra_integer_columns_pass_through_pages_unchanged() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(
        &dir,
        "ids.csv",
        "nama,rating,jumlah_ulasan,tahun,place_id\nA,4.5,20,2020,9007199254740993\n",
    );

    let mut session = Session::new(ColumnContract::default());
    session.load_path(&path).unwrap();

    let json = serde_json::to_string(&session.page(1, 50).unwrap().rows).unwrap();
    assert_eq!(
        json,
        r#"[{"nama":"A","rating":4.5,"jumlah_ulasan":20,"tahun":2020,"place_id":9007199254740993}]"#
    );
    let raw = serde_json::to_string(&session.summary().unwrap().raw_data).unwrap();
    assert!(raw.contains(r#""tahun":2020,"#), "{raw}");
    assert!(raw.contains("9007199254740993"), "{raw}");
}
