//! Peer-group statistics and within-group ranking over a flat table of government-years.
//!
//! Grouping and ranking are separate steps: [`group_rows`] partitions row indices by key,
//! [`rank_values`] ranks one group's values. [`compute_peer_stats`] and
//! [`add_ranks_within_peers`] compose them over a [`PeerTable`].

use crate::error::{FiscalProfileError, Result};
use crate::utils::{compare_f64, mean, median};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const RANK_COLUMN: &str = "rank";
pub const OF_N_COLUMN: &str = "of_n";

static NULL: CellValue = CellValue::Null;

/// One cell of a [`PeerTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Number(v) => v.is_nan(),
            Self::Text(_) => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn group_token(&self) -> GroupToken {
        match self {
            Self::Null => GroupToken::Null,
            Self::Number(v) if v.is_nan() => GroupToken::Null,
            // -0.0 and 0.0 compare equal, so they must share a group
            Self::Number(v) if *v == 0.0 => GroupToken::Number(0.0f64.to_bits()),
            Self::Number(v) => GroupToken::Number(v.to_bits()),
            Self::Text(s) => GroupToken::Text(s.clone()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
            Self::Null => Ok(()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map(Self::Number).unwrap_or(Self::Null)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupToken {
    Null,
    Number(u64),
    Text(String),
}

/// Direction in which a metric is ranked. Rank 1 goes to the first value in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    /// Smallest value ranks first (cost-like metrics).
    Ascending,
    /// Largest value ranks first.
    Descending,
}

/// Ordered rows of named cells. Absent cells read as null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerTable {
    columns: Vec<String>,
    rows: Vec<BTreeMap<String, CellValue>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = BTreeMap<String, CellValue>>,
    {
        let mut table = Self::new();
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Appends a row, registering any columns not seen before in first-seen order.
    pub fn push_row(&mut self, row: BTreeMap<String, CellValue>) {
        for column in row.keys() {
            if !self.has_column(column) {
                self.columns.push(column.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[BTreeMap<String, CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn get(&self, row: usize, column: &str) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    pub fn number(&self, row: usize, column: &str) -> Option<f64> {
        self.get(row, column).as_f64()
    }

    /// Indices of the rows whose key cells equal `key`, compared the way grouping does.
    pub fn find_rows(&self, key_columns: &[&str], key: &[CellValue]) -> Vec<usize> {
        let wanted: Vec<GroupToken> = key.iter().map(CellValue::group_token).collect();
        (0..self.rows.len())
            .filter(|&idx| {
                key_columns
                    .iter()
                    .map(|c| self.get(idx, c).group_token())
                    .eq(wanted.iter().cloned())
            })
            .collect()
    }

    fn set(&mut self, row: usize, column: &str, value: CellValue) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
        if let Some(r) = self.rows.get_mut(row) {
            r.insert(column.to_string(), value);
        }
    }

    fn require_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(FiscalProfileError::UnknownColumn(column.to_string()))
        }
    }

    fn metric_values(&self, indices: &[usize], metric: &str) -> Result<Vec<Option<f64>>> {
        indices
            .iter()
            .map(|&idx| match self.get(idx, metric) {
                CellValue::Text(text) => Err(FiscalProfileError::InvalidValue {
                    column: metric.to_string(),
                    value: text.clone(),
                }),
                cell => Ok(cell.as_f64()),
            })
            .collect()
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.rows)
    }

    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(
            &self
                .columns
                .iter()
                .map(|c| csv_field(c))
                .collect::<Vec<_>>()
                .join(","),
        );
        output.push('\n');

        for idx in 0..self.rows.len() {
            let line: Vec<String> = self
                .columns
                .iter()
                .map(|c| csv_field(&self.get(idx, c).to_string()))
                .collect();
            output.push_str(&line.join(","));
            output.push('\n');
        }

        output
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// A peer group: its key values and the indices of its member rows in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerGroup {
    pub key: Vec<CellValue>,
    pub rows: Vec<usize>,
}

/// Partitions the table by `key_columns`. Groups come out in order of first appearance;
/// null and NaN keys form their own group.
pub fn group_rows(table: &PeerTable, key_columns: &[&str]) -> Result<Vec<PeerGroup>> {
    for column in key_columns {
        table.require_column(column)?;
    }

    let mut groups: Vec<PeerGroup> = Vec::new();
    let mut index: HashMap<Vec<GroupToken>, usize> = HashMap::new();

    for row in 0..table.len() {
        let key: Vec<CellValue> = key_columns.iter().map(|c| table.get(row, c).clone()).collect();
        let tokens: Vec<GroupToken> = key.iter().map(CellValue::group_token).collect();

        match index.get(&tokens) {
            Some(&slot) => groups[slot].rows.push(row),
            None => {
                index.insert(tokens, groups.len());
                groups.push(PeerGroup {
                    key,
                    rows: vec![row],
                });
            }
        }
    }

    debug!(
        "Grouped {} rows into {} peer groups by {:?}",
        table.len(),
        groups.len(),
        key_columns
    );

    Ok(groups)
}

/// Mean and median of each metric per peer group.
///
/// One output row per group, holding the key columns plus `{metric}_mean` and
/// `{metric}_median`. A group with no values for a metric gets nulls, never zero.
pub fn compute_peer_stats(
    table: &PeerTable,
    key_columns: &[&str],
    metrics: &[&str],
) -> Result<PeerTable> {
    for metric in metrics {
        table.require_column(metric)?;
    }

    let groups = group_rows(table, key_columns)?;
    let mut stats = PeerTable::new();

    for group in &groups {
        let mut row: BTreeMap<String, CellValue> = key_columns
            .iter()
            .zip(group.key.iter())
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect();

        for metric in metrics {
            let values = table.metric_values(&group.rows, metric)?;
            row.insert(format!("{}_mean", metric), mean(&values).into());
            row.insert(format!("{}_median", metric), median(&values).into());
        }

        stats.push_row(row);
    }

    Ok(stats)
}

/// Ranks one group's values with ties sharing the lowest position (SQL `RANK()`).
///
/// Null entries get no rank and do not occupy a position.
pub fn rank_values(values: &[Option<f64>], order: RankOrder) -> Vec<Option<u32>> {
    let mut ranked: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.filter(|x| !x.is_nan()).map(|x| (idx, x)))
        .collect();

    ranked.sort_by(|a, b| match order {
        RankOrder::Ascending => compare_f64(a.1, b.1),
        RankOrder::Descending => compare_f64(b.1, a.1),
    });

    let mut ranks = vec![None; values.len()];
    let mut current_rank = 0u32;
    let mut previous: Option<f64> = None;

    for (position, (idx, value)) in ranked.into_iter().enumerate() {
        if previous != Some(value) {
            current_rank = position as u32 + 1;
            previous = Some(value);
        }
        ranks[idx] = Some(current_rank);
    }

    ranks
}

/// Returns a copy of the table with `rank` and `of_n` set on every row.
///
/// `of_n` is the size of the row's peer group. Rows whose metric is null get a null rank.
/// Existing `rank`/`of_n` cells are overwritten; all other cells and the row order are
/// untouched.
pub fn add_ranks_within_peers(
    table: &PeerTable,
    key_columns: &[&str],
    metric: &str,
    order: RankOrder,
) -> Result<PeerTable> {
    table.require_column(metric)?;

    let groups = group_rows(table, key_columns)?;
    let mut ranked = table.clone();
    let mut unranked = 0usize;

    for group in &groups {
        let values = table.metric_values(&group.rows, metric)?;
        let ranks = rank_values(&values, order);
        let of_n = group.rows.len() as f64;

        for (&row, rank) in group.rows.iter().zip(ranks) {
            if rank.is_none() {
                unranked += 1;
            }
            ranked.set(row, RANK_COLUMN, rank.map(f64::from).into());
            ranked.set(row, OF_N_COLUMN, CellValue::Number(of_n));
        }
    }

    if unranked > 0 {
        warn!(
            "{} of {} rows have no '{}' value and were left unranked",
            unranked,
            table.len(),
            metric
        );
    }

    Ok(ranked)
}
