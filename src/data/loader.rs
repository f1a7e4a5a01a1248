//! CSV Source Loader Module
//! Reads the RKI exports into raw string tables, exactly as encoded.

use crate::data::schema::UNNAMED_PREFIX;
use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} is not valid UTF-8 (byte {offset})", .path.display())]
    Encoding { path: PathBuf, offset: usize },
    #[error("{} has no header line", .path.display())]
    Empty { path: PathBuf },
    #[error(
        "{}: header has a single column, expected at least {expected} (delimiter {delimiter:?})",
        .path.display()
    )]
    Delimiter {
        path: PathBuf,
        delimiter: char,
        expected: usize,
    },
    #[error("{} line {line}: {found} fields, header has {expected}", .path.display())]
    Structure {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("{}: malformed CSV: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Failed to build raw table: {0}")]
    Polars(#[from] PolarsError),
}

/// The fixed set of sources one run reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceId {
    CaseOverview,
    Nowcasting,
    Outbreaks,
    AgeTotals,
    AgeIncidence,
    DeathsWeekly,
    DeathsByAge,
    DeathsBySexAge,
    TestCapacity,
    TestBacklog,
    Clinical,
}

/// How a source file is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpec {
    pub file_name: &'static str,
    pub delimiter: u8,
    /// Preamble lines before the header.
    pub skip_rows: usize,
    /// Minimum column count of a correctly split header.
    pub min_columns: usize,
}

impl SourceId {
    pub const ALL: [SourceId; 11] = [
        SourceId::CaseOverview,
        SourceId::Nowcasting,
        SourceId::Outbreaks,
        SourceId::AgeTotals,
        SourceId::AgeIncidence,
        SourceId::DeathsWeekly,
        SourceId::DeathsByAge,
        SourceId::DeathsBySexAge,
        SourceId::TestCapacity,
        SourceId::TestBacklog,
        SourceId::Clinical,
    ];

    /// Stable key used in configuration files.
    pub fn key(self) -> &'static str {
        match self {
            SourceId::CaseOverview => "case_overview",
            SourceId::Nowcasting => "nowcasting",
            SourceId::Outbreaks => "outbreaks",
            SourceId::AgeTotals => "age_totals",
            SourceId::AgeIncidence => "age_incidence",
            SourceId::DeathsWeekly => "deaths_weekly",
            SourceId::DeathsByAge => "deaths_by_age",
            SourceId::DeathsBySexAge => "deaths_by_sex_age",
            SourceId::TestCapacity => "test_capacity",
            SourceId::TestBacklog => "test_backlog",
            SourceId::Clinical => "clinical",
        }
    }

    pub fn spec(self) -> SourceSpec {
        let (file_name, delimiter, skip_rows, min_columns) = match self {
            SourceId::CaseOverview => ("RKI_COVID19.csv", b',', 0, 2),
            SourceId::Nowcasting => ("Nowcasting_Zahlen_csv.csv", b';', 0, 2),
            SourceId::Outbreaks => ("Ausbruchsdaten.csv", b';', 0, 3),
            SourceId::AgeTotals => ("Altersverteilung_total.csv", b';', 0, 2),
            SourceId::AgeIncidence => ("Altersverteilung_incidence.csv", b';', 0, 2),
            SourceId::DeathsWeekly => ("COVID-19_Todesfaelle_all.csv", b';', 0, 2),
            SourceId::DeathsByAge => ("COVID-19_Todesfaelle_age.csv", b';', 0, 2),
            SourceId::DeathsBySexAge => ("COVID-19_Todesfaelle_gender.csv", b';', 0, 2),
            SourceId::TestCapacity => ("Testzahlen-gesamt.csv", b';', 0, 2),
            SourceId::TestBacklog => ("Testzahlen-rueck.csv", b';', 0, 2),
            SourceId::Clinical => ("Klinische_Aspekte.csv", b';', 2, 3),
        };
        SourceSpec {
            file_name,
            delimiter,
            skip_rows,
            min_columns,
        }
    }
}

/// A source table before any interpretation: header and cells as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Column names for the in-memory table. Blank headers become
    /// `unnamed_<index>` and repeated headers get a `.n` suffix.
    pub fn column_names(&self) -> Vec<String> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let base = if header.trim().is_empty() {
                    format!("{UNNAMED_PREFIX}{idx}")
                } else {
                    header.clone()
                };
                let count = seen.entry(base.clone()).or_insert(0);
                *count += 1;
                if *count == 1 {
                    base
                } else {
                    format!("{}.{}", base, *count - 1)
                }
            })
            .collect()
    }

    /// Convert to a DataFrame of `String` columns.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns = self
            .column_names()
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let values: Vec<&str> = self
                    .rows
                    .iter()
                    .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                    .collect();
                Column::new(name.into(), values)
            })
            .collect();
        DataFrame::new(columns)
    }

    /// Render any DataFrame back to text cells. Nulls become empty cells.
    pub fn from_dataframe(df: &DataFrame) -> PolarsResult<Self> {
        let headers: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rows = vec![Vec::with_capacity(headers.len()); df.height()];

        for column in df.get_columns() {
            let text = column.cast(&DataType::String)?;
            let ca = text.str()?;
            for (row, value) in rows.iter_mut().zip(ca.into_iter()) {
                row.push(value.unwrap_or("").to_string());
            }
        }

        Ok(Self { headers, rows })
    }
}

/// Read one source file without transforming its content.
pub fn load_source(path: &Path, spec: &SourceSpec) -> Result<RawTable, IngestionError> {
    let bytes = std::fs::read(path).map_err(|source| IngestionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = std::str::from_utf8(&bytes).map_err(|e| IngestionError::Encoding {
        path: path.to_path_buf(),
        offset: e.valid_up_to(),
    })?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let body = skip_lines(text, spec.skip_rows);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(spec.delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, e, spec.skip_rows))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.is_empty() || (headers.len() == 1 && headers[0].is_empty()) {
        return Err(IngestionError::Empty {
            path: path.to_path_buf(),
        });
    }
    if headers.len() == 1 && spec.min_columns > 1 {
        return Err(IngestionError::Delimiter {
            path: path.to_path_buf(),
            delimiter: char::from(spec.delimiter),
            expected: spec.min_columns,
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e, spec.skip_rows))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!(
        path = %path.display(),
        columns = headers.len(),
        rows = rows.len(),
        "loaded raw source"
    );
    Ok(RawTable { headers, rows })
}

/// Read every source under `paths`, in parallel, returned in `SourceId` order.
pub fn load_all(
    paths: &[(SourceId, PathBuf)],
) -> Result<Vec<(SourceId, RawTable)>, IngestionError> {
    let tables = paths
        .par_iter()
        .map(|(id, path)| load_source(path, &id.spec()).map(|table| (*id, table)))
        .collect::<Result<Vec<_>, _>>()?;

    info!(sources = tables.len(), "ingested all sources");
    Ok(tables)
}

/// Default location of every source under `data_dir`.
pub fn default_paths(data_dir: &Path) -> Vec<(SourceId, PathBuf)> {
    SourceId::ALL
        .iter()
        .map(|id| (*id, data_dir.join(id.spec().file_name)))
        .collect()
}

fn skip_lines(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return "",
        }
    }
    rest
}

/// `skipped` preamble lines are added back so reported lines match the file.
fn csv_error(path: &Path, error: csv::Error, skipped: usize) -> IngestionError {
    if let csv::ErrorKind::UnequalLengths {
        pos,
        expected_len,
        len,
    } = error.kind()
    {
        return IngestionError::Structure {
            path: path.to_path_buf(),
            line: pos.as_ref().map(|p| p.line()).unwrap_or(0) + skipped as u64,
            expected: *expected_len as usize,
            found: *len as usize,
        };
    }
    IngestionError::Csv {
        path: path.to_path_buf(),
        source: error,
    }
}
