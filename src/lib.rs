//! # Fiscal Profile Builder
//!
//! A library for turning government financial disclosure rows (one row per government per
//! fiscal year) into comparable fiscal profiles and peer-group statistics.
//!
//! ## Core Concepts
//!
//! - **Bucket Mapping**: A data dictionary maps inconsistently named raw line items onto a
//!   fixed set of revenue and expenditure buckets
//! - **Sparse Rows**: Missing or null line items count as zero (configurable)
//! - **Fund-Balance Roll-Forward**: Beginning + Revenues + Increases - Expenditures - Decreases = Ending
//! - **Peer Groups**: Rows sharing a key (e.g., type + year) are compared by mean, median and rank
//!
//! ## Example
//!
//! ```rust,ignore
//! use fiscal_profile_builder::*;
//!
//! let mapping = MappingConfig::ohio_default();
//! let row = GovernmentYearRow::new(RowIdentity::new("CIN", 2024, "GAAP"))
//!     .with_value("Taxes", 850_000_000.0)
//!     .with_value("Public Safety", 600_000_000.0)
//!     .with_value("Beginning Balance", 300_000_000.0);
//!
//! let processed = process_rows(&[row], &mapping).unwrap();
//! let profile = processed[0].to_profile();
//!
//! let table = FiscalProfileProcessor::peer_table(&processed);
//! let ranked = add_ranks_within_peers(&table, &["type", "year"], "total_revenues", RankOrder::Descending)
//!     .unwrap();
//! ```

pub mod error;
pub mod ingestion;
pub mod mapping;
pub mod peers;
pub mod profile;
pub mod schema;
pub mod summary;
pub mod utils;

pub use error::{FiscalProfileError, Result};
pub use ingestion::*;
pub use mapping::{compute_buckets, compute_group, BucketGroupKind, BucketLine, BucketResult};
pub use peers::*;
pub use profile::*;
pub use schema::*;
pub use summary::{add_summary, verify_roll_forward, FinancialSummary};

use log::{debug, info};

pub struct FiscalProfileProcessor;

impl FiscalProfileProcessor {
    /// Runs the bucket mapper and roll-forward over every row, in input order.
    pub fn process(rows: &[GovernmentYearRow], mapping: &MappingConfig) -> Result<Vec<ProcessedRow>> {
        info!("Processing {} government-year rows", rows.len());
        debug!(
            "Mapping has {} revenue buckets and {} expenditure buckets",
            mapping.revenues().len(),
            mapping.expenditures().len()
        );

        rows.iter().map(|row| process_row(row, mapping)).collect()
    }

    pub fn process_with_verification(
        rows: &[GovernmentYearRow],
        mapping: &MappingConfig,
        tolerance: f64,
    ) -> Result<Vec<ProcessedRow>> {
        let processed = Self::process(rows, mapping)?;

        for row in &processed {
            verify_roll_forward(&row.identity.label(), &row.summary, tolerance)?;
        }

        Ok(processed)
    }

    /// One peer-table row per processed government-year.
    pub fn peer_table(processed: &[ProcessedRow]) -> PeerTable {
        PeerTable::from_rows(processed.iter().map(ProcessedRow::metric_cells))
    }
}

pub fn process_row(row: &GovernmentYearRow, mapping: &MappingConfig) -> Result<ProcessedRow> {
    let (revenues, expenditures) = compute_buckets(row, mapping)?;
    let summary = add_summary(row, revenues.total_sum, expenditures.total_sum);

    Ok(ProcessedRow {
        identity: row.identity.clone(),
        revenues,
        expenditures,
        summary,
    })
}

pub fn process_rows(rows: &[GovernmentYearRow], mapping: &MappingConfig) -> Result<Vec<ProcessedRow>> {
    FiscalProfileProcessor::process(rows, mapping)
}
