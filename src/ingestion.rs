use crate::error::{FiscalProfileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const BEGINNING_BALANCE: &str = "Beginning Balance";
pub const OTHER_INCREASES: &str = "Other Increases";
pub const OTHER_DECREASES: &str = "Other Decreases";

const IDENTITY_COLUMNS: [&str; 6] = ["government_id", "name", "type", "county", "year", "basis"];

/// Who filed the row and for which fiscal year and accounting basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIdentity {
    pub government_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub county: String,
    pub year: i32,
    pub basis: String,
}

impl RowIdentity {
    pub fn new(government_id: impl Into<String>, year: i32, basis: impl Into<String>) -> Self {
        Self {
            government_id: government_id.into(),
            name: String::new(),
            entity_type: String::new(),
            county: String::new(),
            year,
            basis: basis.into(),
        }
    }

    /// Short label used in log lines and error messages.
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.government_id, self.year, self.basis)
    }
}

/// One government's disclosure for one fiscal year.
///
/// Line items are sparse: a column may be absent entirely or present with a null cell.
/// Column names are matched verbatim, so `"Licenses & Permits"` must be spelled exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernmentYearRow {
    pub identity: RowIdentity,
    pub values: BTreeMap<String, Option<f64>>,
}

impl GovernmentYearRow {
    pub fn new(identity: RowIdentity) -> Self {
        Self {
            identity,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), Some(value));
        self
    }

    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.values.insert(column.into(), None);
        self
    }

    /// The numeric value of a column, or `None` if the column is absent, null or NaN.
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values
            .get(column)
            .copied()
            .flatten()
            .filter(|v| !v.is_nan())
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Builds a row from a delimited record. Identity columns are read as text (`year` as
    /// an integer); every other column is numeric, with empty cells stored as null.
    pub fn from_record<H, F>(headers: &[H], fields: &[F]) -> Result<Self>
    where
        H: AsRef<str>,
        F: AsRef<str>,
    {
        let mut text: BTreeMap<&str, &str> = BTreeMap::new();
        let mut values = BTreeMap::new();

        for (header, field) in headers.iter().zip(fields.iter()) {
            let header = header.as_ref().trim();
            let field = field.as_ref().trim();

            if IDENTITY_COLUMNS.contains(&header) {
                text.insert(header, field);
            } else {
                values.insert(header.to_string(), parse_amount(header, field)?);
            }
        }

        let government_id = text
            .get("government_id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FiscalProfileError::MissingIdentity("government_id".to_string()))?
            .to_string();

        let year_text = text
            .get("year")
            .filter(|y| !y.is_empty())
            .ok_or_else(|| FiscalProfileError::MissingIdentity("year".to_string()))?;
        let year = parse_year(year_text)?;

        let field = |name: &str| text.get(name).map(|v| v.to_string()).unwrap_or_default();

        Ok(Self {
            identity: RowIdentity {
                government_id,
                name: field("name"),
                entity_type: field("type"),
                county: field("county"),
                year,
                basis: field("basis"),
            },
            values,
        })
    }
}

/// Converts a header plus a batch of records into rows, failing on the first bad record.
pub fn rows_from_records<H, F, R>(headers: &[H], records: R) -> Result<Vec<GovernmentYearRow>>
where
    H: AsRef<str>,
    F: AsRef<str>,
    R: IntoIterator<Item = Vec<F>>,
{
    records
        .into_iter()
        .map(|record| GovernmentYearRow::from_record(headers, &record))
        .collect()
}

fn parse_amount(column: &str, field: &str) -> Result<Option<f64>> {
    if field.is_empty() {
        return Ok(None);
    }

    let value: f64 = field.parse().map_err(|_| FiscalProfileError::InvalidValue {
        column: column.to_string(),
        value: field.to_string(),
    })?;

    if value.is_nan() {
        Ok(None)
    } else if value.is_infinite() {
        Err(FiscalProfileError::InvalidValue {
            column: column.to_string(),
            value: field.to_string(),
        })
    } else {
        Ok(Some(value))
    }
}

fn parse_year(field: &str) -> Result<i32> {
    if let Ok(year) = field.parse::<i32>() {
        return Ok(year);
    }

    // Spreadsheet exports sometimes write integral years as "2024.0".
    match field.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < i32::MAX as f64 => Ok(v as i32),
        _ => Err(FiscalProfileError::InvalidValue {
            column: "year".to_string(),
            value: field.to_string(),
        }),
    }
}
