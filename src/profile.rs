use crate::ingestion::RowIdentity;
use crate::mapping::{BucketLine, BucketResult};
use crate::peers::CellValue;
use crate::summary::FinancialSummary;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TOTAL_REVENUES: &str = "total_revenues";
pub const TOTAL_EXPENDITURES: &str = "total_expenditures";

/// Output of the bucket mapper for one government-year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRow {
    pub identity: RowIdentity,
    pub revenues: BucketResult,
    pub expenditures: BucketResult,
    pub summary: FinancialSummary,
}

impl ProcessedRow {
    pub fn to_profile(&self) -> GovernmentProfile {
        GovernmentProfile {
            id: self.identity.government_id.clone(),
            name: self.identity.name.clone(),
            entity_type: self.identity.entity_type.clone(),
            county: self.identity.county.clone(),
            year: self.identity.year,
            basis: self.identity.basis.clone(),
            summary: self.summary,
            revenues: self.revenues.lines.clone(),
            expenditures: self.expenditures.lines.clone(),
        }
    }

    /// Flattens the row into named cells for the peer table: identity columns, summary
    /// fields, and one `rev:`/`exp:` column per bucket plus its `_pct` share.
    pub fn metric_cells(&self) -> BTreeMap<String, CellValue> {
        let mut cells = BTreeMap::new();
        let id = &self.identity;

        cells.insert("government_id".to_string(), id.government_id.as_str().into());
        cells.insert("name".to_string(), id.name.as_str().into());
        cells.insert("type".to_string(), id.entity_type.as_str().into());
        cells.insert("county".to_string(), id.county.as_str().into());
        cells.insert("year".to_string(), id.year.into());
        cells.insert("basis".to_string(), id.basis.as_str().into());

        let s = &self.summary;
        cells.insert("beginning_balance".to_string(), s.beginning_balance.into());
        cells.insert(TOTAL_REVENUES.to_string(), s.revenues.into());
        cells.insert("other_increases".to_string(), s.other_increases.into());
        cells.insert(TOTAL_EXPENDITURES.to_string(), s.expenditures.into());
        cells.insert("other_decreases".to_string(), s.other_decreases.into());
        cells.insert("ending_balance".to_string(), s.ending_balance.into());

        for result in [&self.revenues, &self.expenditures] {
            let prefix = result.kind.metric_prefix();
            for line in &result.lines {
                cells.insert(format!("{}:{}", prefix, line.bucket), line.amount.into());
                cells.insert(
                    format!("{}:{}_pct", prefix, line.bucket),
                    line.pct_of_total.into(),
                );
            }
        }

        cells
    }
}

/// Per-government profile record handed to reporting and the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GovernmentProfile {
    #[schemars(description = "Government identifier from the filing (e.g., 'CIN')")]
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    #[schemars(description = "Entity type used for peer grouping (City, Village, ...)")]
    pub entity_type: String,

    pub county: String,

    #[schemars(description = "Fiscal year of the filing")]
    pub year: i32,

    #[schemars(description = "Accounting basis of the filing (e.g., GAAP, Cash)")]
    pub basis: String,

    pub summary: FinancialSummary,

    #[schemars(description = "Revenue buckets in dictionary order")]
    pub revenues: Vec<BucketLine>,

    #[schemars(description = "Expenditure buckets in dictionary order")]
    pub expenditures: Vec<BucketLine>,
}

impl GovernmentProfile {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(GovernmentProfile)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// File name the export layer uses for this profile.
    pub fn file_name(&self) -> String {
        format!("profile_{}.json", self.id)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {} ({}) - {}\n\n", self.name, self.entity_type, self.year));
        output.push_str(&format!(
            "**County:** {}  **Basis:** {}\n\n",
            self.county, self.basis
        ));

        output.push_str("## Fund Balance\n\n");
        output.push_str("| Item | Amount |\n|---|---:|\n");
        let s = &self.summary;
        for (label, amount) in [
            ("Beginning Balance", s.beginning_balance),
            ("Revenues", s.revenues),
            ("Other Increases", s.other_increases),
            ("Expenditures", s.expenditures),
            ("Other Decreases", s.other_decreases),
            ("Ending Balance", s.ending_balance),
        ] {
            output.push_str(&format!("| {} | {:.2} |\n", label, amount));
        }
        output.push('\n');

        output.push_str("## Revenues\n\n");
        push_bucket_table(&mut output, &self.revenues);

        output.push_str("## Expenditures\n\n");
        push_bucket_table(&mut output, &self.expenditures);

        output
    }
}

fn push_bucket_table(output: &mut String, lines: &[BucketLine]) {
    output.push_str("| Bucket | Amount | Share |\n|---|---:|---:|\n");
    for line in lines {
        output.push_str(&format!(
            "| {} | {:.2} | {:.1}% |\n",
            line.bucket,
            line.amount,
            line.pct_of_total * 100.0
        ));
    }
    output.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::BucketGroupKind;

    fn processed() -> ProcessedRow {
        let mut identity = RowIdentity::new("CIN", 2024, "GAAP");
        identity.name = "Cincinnati".to_string();
        identity.entity_type = "City".to_string();
        identity.county = "Hamilton".to_string();

        ProcessedRow {
            identity,
            revenues: BucketResult {
                kind: BucketGroupKind::Revenues,
                lines: vec![
                    BucketLine {
                        bucket: "Taxes".to_string(),
                        amount: 75.0,
                        pct_of_total: 0.75,
                    },
                    BucketLine {
                        bucket: "Charges".to_string(),
                        amount: 25.0,
                        pct_of_total: 0.25,
                    },
                ],
                total_sum: 100.0,
            },
            expenditures: BucketResult {
                kind: BucketGroupKind::Expenditures,
                lines: vec![BucketLine {
                    bucket: "Public Safety".to_string(),
                    amount: 60.0,
                    pct_of_total: 1.0,
                }],
                total_sum: 60.0,
            },
            summary: FinancialSummary {
                beginning_balance: 10.0,
                revenues: 100.0,
                other_increases: 0.0,
                expenditures: 60.0,
                other_decreases: 0.0,
                ending_balance: 50.0,
            },
        }
    }

    #[test]
    fn test_profile_json_shape() {
        let profile = processed().to_profile();
        let value: serde_json::Value = serde_json::from_str(&profile.to_json().unwrap()).unwrap();

        assert_eq!(value["id"], "CIN");
        assert_eq!(value["type"], "City");
        assert_eq!(value["year"], 2024);
        assert_eq!(value["summary"]["ending_balance"], 50.0);
        assert_eq!(value["revenues"][0]["bucket"], "Taxes");
        assert_eq!(value["revenues"][0]["pct_of_total"], 0.75);
        assert_eq!(value["expenditures"][0]["amount"], 60.0);
        assert_eq!(profile.file_name(), "profile_CIN.json");
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = GovernmentProfile::schema_as_json().unwrap();
        assert!(schema_json.contains("pct_of_total"));
        assert!(schema_json.contains("ending_balance"));
        assert!(schema_json.contains("\"type\""));
    }

    #[test]
    fn test_metric_cells() {
        let cells = processed().metric_cells();
        assert_eq!(cells["type"], CellValue::from("City"));
        assert_eq!(cells["year"], CellValue::from(2024));
        assert_eq!(cells[TOTAL_REVENUES], CellValue::from(100.0));
        assert_eq!(cells["rev:Taxes"], CellValue::from(75.0));
        assert_eq!(cells["rev:Charges_pct"], CellValue::from(0.25));
        assert_eq!(cells["exp:Public Safety"], CellValue::from(60.0));
    }

    #[test]
    fn test_markdown() {
        let markdown = processed().to_profile().to_markdown();
        assert!(markdown.starts_with("# Cincinnati (City) - 2024"));
        assert!(markdown.contains("| Ending Balance | 50.00 |"));
        assert!(markdown.contains("| Taxes | 75.00 | 75.0% |"));
    }
}
