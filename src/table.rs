use polars::prelude::*;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};

use crate::config::expand_path;
use crate::domain::LensError;

#[derive(Debug)]
enum FileType {
    CSV,
}

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
    file_type: FileType,
}

/// A single cell. Missing values stay explicit instead of being folded into a
/// sentinel string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric view of the cell, used for coercing the rating and review columns.
    /// Text is trimmed and parsed, anything non finite counts as missing.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Value::Null => return None,
            Value::Integer(i) => *i as f64,
            Value::Number(n) => *n,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }

    /// Typed numeric cell: integers stay exact, text that parses as a whole
    /// number becomes `Integer`, other finite numbers become `Number`.
    pub fn to_numeric(&self) -> Option<Value> {
        match self {
            Value::Integer(i) => Some(Value::Integer(*i)),
            Value::Text(s) => match s.trim().parse::<i64>() {
                Ok(i) => Some(Value::Integer(i)),
                Err(_) => self.as_number().map(Value::Number),
            },
            _ => self.as_number().map(Value::Number),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Number(n) => Some(format_number(*n)),
            Value::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "∅"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s.replace("\r\n", " ↵ ").replace('\n', " ↵ ")),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Whole numbers print without a fraction, everything else as is.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Row oriented table of tagged values. The column set is fixed at load time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of one row, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + use<'a> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// A table serializes as a list of records so JSON keeps the column order.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for record in self.records() {
            seq.serialize_element(&record)?;
        }
        seq.end()
    }
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row. Short rows are padded with nulls, long rows truncated.
    pub fn push_row(&mut self, mut values: Vec<Value>) {
        values.resize(self.columns.len(), Value::Null);
        self.rows.push(values);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn record(&self, idx: usize) -> Option<Record<'_>> {
        self.rows.get(idx).map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(|values| Record {
            columns: &self.columns,
            values,
        })
    }

    pub(crate) fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Loads a table from disk. Only comma separated files with a header row
    /// are supported.
    pub fn load(path: &Path) -> Result<Self, LensError> {
        let file_info = Self::get_file_info(expand_path(&path.to_string_lossy()))?;
        let frame = match file_info.file_type {
            FileType::CSV => Self::load_csv(&file_info.path)?,
        };

        let start_time = Instant::now();
        let df = frame.collect()?;
        let table = Self::from_dataframe(&df)?;
        info!(
            "Loaded {} rows x {} columns from {} ({} bytes) in {}ms",
            table.len(),
            table.columns.len(),
            file_info.path.display(),
            file_info.file_size,
            start_time.elapsed().as_millis()
        );
        Ok(table)
    }

    /// Converts a polars frame column by column. Integer columns become
    /// `Value::Integer`, float columns `Value::Number`, everything else is
    /// rendered as text.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self, LensError> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut rows = vec![Vec::with_capacity(columns.len()); df.height()];

        for name in columns.iter() {
            let values = Self::load_column(df, name)?;
            debug!("Column \"{}\": {} values", name, values.len());
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
        }

        Ok(Self { columns, rows })
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<Value>, PolarsError> {
        let column = df.column(col_name)?;
        let dtype = column.dtype().clone();
        trace!("Loading column {col_name} with dtype {dtype:?}");

        if dtype == DataType::UInt64 {
            // Values above i64::MAX keep their digits as text.
            let series = column.u64()?;
            Ok(series
                .into_iter()
                .map(|v| match v {
                    Some(n) => i64::try_from(n)
                        .map_or_else(|_| Value::Text(n.to_string()), Value::Integer),
                    None => Value::Null,
                })
                .collect())
        } else if Self::is_integer_type(&dtype) {
            let col = column.cast(&DataType::Int64)?;
            let series = col.i64()?;
            Ok(series
                .into_iter()
                .map(|v| v.map_or(Value::Null, Value::Integer))
                .collect())
        } else if Self::is_numeric_type(&dtype) {
            let col = column.cast(&DataType::Float64)?;
            let series = col.f64()?;
            Ok(series
                .into_iter()
                .map(|v| match v {
                    Some(n) if !n.is_nan() => Value::Number(n),
                    _ => Value::Null,
                })
                .collect())
        } else {
            let col = column.cast(&DataType::String)?;
            let series = col.str()?;
            Ok(series
                .into_iter()
                .map(|v| match v {
                    Some(s) => Value::Text(s.to_string()),
                    None => Value::Null,
                })
                .collect())
        }
    }

    fn is_integer_type(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    fn is_numeric_type(dtype: &DataType) -> bool {
        Self::is_integer_type(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
    }

    fn detect_file_type(path: &Path) -> Result<FileType, LensError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            _ => Err(LensError::UnknownFileType),
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, LensError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LensError::FileNotFound,
            ErrorKind::PermissionDenied => LensError::PermissionDenied,
            _ => LensError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(LensError::LoadingFailed("Not a file!".into()));
        }

        let file_size = metadata.len();
        let file_type = Self::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size,
            file_type,
        })
    }

    // The schema is inferred over the whole file so a stray word deep inside
    // a numeric column turns it into text instead of failing the read.
    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .with_infer_schema_length(None)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn text_numbers_coerce_when_finite() {
        assert_eq!(Value::Text(" 4.5 ".into()).as_number(), Some(4.5));
        assert_eq!(Value::Number(3.0).as_number(), Some(3.0));
        assert_eq!(Value::Text("n/a".into()).as_number(), None);
        assert_eq!(Value::Text("NaN".into()).as_number(), None);
        assert_eq!(Value::Text("inf".into()).as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
    }

    #[test]
    fn numeric_coercion_keeps_integers_exact() {
        assert_eq!(Value::Text(" 12 ".into()).to_numeric(), Some(Value::Integer(12)));
        assert_eq!(Value::Text("4.5".into()).to_numeric(), Some(Value::Number(4.5)));
        assert_eq!(
            Value::Integer(9_007_199_254_740_993).to_numeric(),
            Some(Value::Integer(9_007_199_254_740_993))
        );
        assert_eq!(Value::Number(f64::NAN).to_numeric(), None);
        assert_eq!(Value::Text("bagus".into()).to_numeric(), None);
        assert_eq!(Value::Integer(20).as_number(), Some(20.0));
    }

    #[test]
    fn extra_integer_columns_load_exactly() {
        let file = write_csv(
            "nama,rating,jumlah_ulasan,tahun,place_id\n\
             A,4.5,20,2020,9007199254740993\n",
        );
        let table = Table::load(file.path()).unwrap();
        let record = table.record(0).unwrap();
        assert_eq!(record.get("tahun"), Some(&Value::Integer(2020)));
        assert_eq!(
            record.get("place_id"),
            Some(&Value::Integer(9_007_199_254_740_993))
        );
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(
            json,
            r#"[{"nama":"A","rating":4.5,"jumlah_ulasan":20,"tahun":2020,"place_id":9007199254740993}]"#
        );
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(format_number(20.0), "20");
        assert_eq!(format_number(4.25), "4.25");
        assert_eq!(Value::Number(7.0).as_text().as_deref(), Some("7"));
    }

    #[test]
    fn push_row_pads_to_column_count() {
        let mut table = Table::new(vec!["a".into(), "b".into()]);
        table.push_row(vec![Value::Number(1.0)]);
        let record = table.record(0).unwrap();
        assert_eq!(record.get("a"), Some(&Value::Number(1.0)));
        assert_eq!(record.get("b"), Some(&Value::Null));
        assert_eq!(record.get("c"), None);
    }

    #[test]
    fn records_serialize_in_column_order() {
        let mut table = Table::new(vec!["nama".into(), "rating".into(), "kota".into()]);
        table.push_row(vec![
            Value::Text("Warung A".into()),
            Value::Number(4.5),
            Value::Null,
        ]);
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"nama":"Warung A","rating":4.5,"kota":null}]"#);
    }

    #[test]
    fn loads_csv_with_mixed_columns() {
        let file = write_csv(
            "nama,rating,jumlah_ulasan,kategori_usaha,kota\n\
             Warung A,4.5,20,Food,Bandung\n\
             Toko B,abc,5,,Jakarta\n",
        );
        let table = Table::load(file.path()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.columns(),
            ["nama", "rating", "jumlah_ulasan", "kategori_usaha", "kota"]
        );
        let second = table.record(1).unwrap();
        assert_eq!(second.get("rating"), Some(&Value::Text("abc".into())));
        assert_eq!(second.get("jumlah_ulasan"), Some(&Value::Integer(5)));
        assert_eq!(second.get("kategori_usaha"), Some(&Value::Null));
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            Table::load(file.path()),
            Err(LensError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            Table::load(Path::new("/no/such/file.csv")),
            Err(LensError::FileNotFound)
        ));
    }
}
