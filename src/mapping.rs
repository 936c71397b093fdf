//! Reduction of a row's raw line items into the semantic buckets of a [`MappingConfig`].

use crate::error::{FiscalProfileError, Result};
use crate::ingestion::GovernmentYearRow;
use crate::schema::{BucketGroup, MappingConfig, MappingOptions};
use crate::utils::{safe_share, sum_present};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BucketGroupKind {
    Revenues,
    Expenditures,
}

impl BucketGroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenues => "revenues",
            Self::Expenditures => "expenditures",
        }
    }

    /// Prefix used for per-bucket columns in the flat metric table.
    pub fn metric_prefix(&self) -> &'static str {
        match self {
            Self::Revenues => "rev",
            Self::Expenditures => "exp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BucketLine {
    pub bucket: String,
    pub amount: f64,
    /// Share of the group total, 0.0 when the group total is zero.
    pub pct_of_total: f64,
}

/// Totals and shares for every bucket of one group, in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketResult {
    pub kind: BucketGroupKind,
    pub lines: Vec<BucketLine>,
    pub total_sum: f64,
}

impl BucketResult {
    pub fn total(&self, bucket: &str) -> Option<f64> {
        self.lines.iter().find(|l| l.bucket == bucket).map(|l| l.amount)
    }

    pub fn percent(&self, bucket: &str) -> Option<f64> {
        self.lines
            .iter()
            .find(|l| l.bucket == bucket)
            .map(|l| l.pct_of_total)
    }

    pub fn totals(&self) -> impl Iterator<Item = (&str, f64)> {
        self.lines.iter().map(|l| (l.bucket.as_str(), l.amount))
    }

    pub fn percents(&self) -> impl Iterator<Item = (&str, f64)> {
        self.lines.iter().map(|l| (l.bucket.as_str(), l.pct_of_total))
    }
}

/// Computes revenue and expenditure buckets for one row.
///
/// With the default options this never fails: absent or null columns contribute zero and
/// every declared bucket appears in the output. With `treat_missing_as_zero = false`, a
/// mapped column without a value is reported as [`FiscalProfileError::MissingColumn`].
pub fn compute_buckets(
    row: &GovernmentYearRow,
    mapping: &MappingConfig,
) -> Result<(BucketResult, BucketResult)> {
    let revenues = compute_group(
        row,
        mapping.revenues(),
        BucketGroupKind::Revenues,
        &mapping.options,
    )?;
    let expenditures = compute_group(
        row,
        mapping.expenditures(),
        BucketGroupKind::Expenditures,
        &mapping.options,
    )?;

    debug!(
        "{}: revenues {} across {} buckets, expenditures {} across {} buckets",
        row.identity.label(),
        revenues.total_sum,
        revenues.lines.len(),
        expenditures.total_sum,
        expenditures.lines.len()
    );

    Ok((revenues, expenditures))
}

pub fn compute_group(
    row: &GovernmentYearRow,
    group: &BucketGroup,
    kind: BucketGroupKind,
    options: &MappingOptions,
) -> Result<BucketResult> {
    let mut totals: Vec<(String, f64)> = Vec::with_capacity(group.len());

    for bucket in group.buckets() {
        if !options.treat_missing_as_zero {
            if let Some(column) = bucket.columns.iter().find(|c| row.value(c).is_none()) {
                return Err(FiscalProfileError::MissingColumn {
                    row: row.identity.label(),
                    column: column.clone(),
                });
            }
        }

        let amount = sum_present(bucket.columns.iter().map(|c| row.value(c)));
        totals.push((bucket.name.clone(), amount));
    }

    let total_sum: f64 = totals.iter().map(|(_, amount)| amount).sum();

    let lines = totals
        .into_iter()
        .map(|(bucket, amount)| BucketLine {
            bucket,
            amount,
            pct_of_total: safe_share(amount, total_sum),
        })
        .collect();

    Ok(BucketResult {
        kind,
        lines,
        total_sum,
    })
}
