use crate::error::{FiscalProfileError, Result};
use crate::ingestion::{GovernmentYearRow, BEGINNING_BALANCE, OTHER_DECREASES, OTHER_INCREASES};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Fund-balance roll-forward for one government-year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialSummary {
    pub beginning_balance: f64,
    pub revenues: f64,
    pub other_increases: f64,
    pub expenditures: f64,
    pub other_decreases: f64,
    pub ending_balance: f64,
}

impl FinancialSummary {
    /// The ending balance implied by the other five fields.
    pub fn expected_ending_balance(&self) -> f64 {
        roll_forward(
            self.beginning_balance,
            self.revenues,
            self.other_increases,
            self.expenditures,
            self.other_decreases,
        )
    }

    /// Net change over the year: revenues and increases less expenditures and decreases.
    pub fn net_change(&self) -> f64 {
        self.ending_balance - self.beginning_balance
    }
}

fn roll_forward(begin: f64, revenues: f64, increases: f64, expenditures: f64, decreases: f64) -> f64 {
    begin + revenues + increases - expenditures - decreases
}

/// Builds the roll-forward from the row's balance fields and the bucket group totals.
///
/// Missing or null balance fields count as zero. Any `Ending Balance` column on the row is
/// ignored; the ending balance is always recomputed.
pub fn add_summary(row: &GovernmentYearRow, revenue_total: f64, expenditure_total: f64) -> FinancialSummary {
    let beginning_balance = row.value(BEGINNING_BALANCE).unwrap_or(0.0);
    let other_increases = row.value(OTHER_INCREASES).unwrap_or(0.0);
    let other_decreases = row.value(OTHER_DECREASES).unwrap_or(0.0);

    FinancialSummary {
        beginning_balance,
        revenues: revenue_total,
        other_increases,
        expenditures: expenditure_total,
        other_decreases,
        ending_balance: roll_forward(
            beginning_balance,
            revenue_total,
            other_increases,
            expenditure_total,
            other_decreases,
        ),
    }
}

pub fn verify_roll_forward(label: &str, summary: &FinancialSummary, tolerance: f64) -> Result<()> {
    let expected = summary.expected_ending_balance();
    let difference = (summary.ending_balance - expected).abs();

    if difference > tolerance || difference.is_nan() {
        return Err(FiscalProfileError::RollForwardViolation {
            row: label.to_string(),
            expected,
            actual: summary.ending_balance,
            difference,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::RowIdentity;

    fn base() -> GovernmentYearRow {
        GovernmentYearRow::new(RowIdentity::new("T", 2024, "GAAP"))
    }

    #[test]
    fn test_roll_forward() {
        let row = base()
            .with_value(BEGINNING_BALANCE, 10.0)
            .with_value(OTHER_INCREASES, 5.0)
            .with_value(OTHER_DECREASES, 2.0)
            .with_value("Ending Balance", 9999.0);

        let summary = add_summary(&row, 200.0, 200.0);
        assert_eq!(summary.ending_balance, 13.0);
        assert_eq!(summary.net_change(), 3.0);
        assert!(verify_roll_forward("T", &summary, 0.0).is_ok());
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let summary = add_summary(&base().with_null(OTHER_INCREASES), 50.0, 80.0);
        assert_eq!(summary.beginning_balance, 0.0);
        assert_eq!(summary.other_increases, 0.0);
        assert_eq!(summary.other_decreases, 0.0);
        assert_eq!(summary.ending_balance, -30.0);

        let only_begin = add_summary(&base().with_value(BEGINNING_BALANCE, 7.0), 0.0, 0.0);
        assert_eq!(only_begin.ending_balance, 7.0);
    }

    #[test]
    fn test_nan_balance_counts_as_zero() {
        let row = base()
            .with_value(BEGINNING_BALANCE, f64::NAN)
            .with_value(OTHER_DECREASES, 4.0);
        let summary = add_summary(&row, 100.0, 30.0);

        assert_eq!(summary.beginning_balance, 0.0);
        assert_eq!(summary.ending_balance, 66.0);
        assert!(verify_roll_forward("T", &summary, 0.0).is_ok());
    }

    #[test]
    fn test_verify_detects_tampering() {
        let mut summary = add_summary(&base(), 100.0, 40.0);
        summary.ending_balance += 5.0;

        match verify_roll_forward("T/2024/GAAP", &summary, 1.0) {
            Err(FiscalProfileError::RollForwardViolation {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 60.0);
                assert_eq!(actual, 65.0);
            }
            other => panic!("expected violation, got {:?}", other),
        }
    }
}
