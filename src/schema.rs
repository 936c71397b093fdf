use crate::error::{FiscalProfileError, Result};
use log::{debug, warn};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// One semantic bucket and the raw source columns that roll up into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDefinition {
    pub name: String,
    pub columns: Vec<String>,
}

impl BucketDefinition {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Ordered set of buckets for one side of the ledger.
///
/// Serialized as a map of `bucket name -> [column, ...]`; deserialization keeps the
/// declared order of the document and rejects repeated bucket names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketGroup {
    buckets: Vec<BucketDefinition>,
}

impl BucketGroup {
    pub fn new(buckets: Vec<BucketDefinition>) -> Self {
        Self { buckets }
    }

    pub fn buckets(&self) -> &[BucketDefinition] {
        &self.buckets
    }

    pub fn bucket_names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&BucketDefinition> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl Serialize for BucketGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for bucket in &self.buckets {
            map.serialize_entry(&bucket.name, &bucket.columns)?;
        }
        map.end()
    }
}

struct BucketGroupVisitor;

impl<'de> Visitor<'de> for BucketGroupVisitor {
    type Value = BucketGroup;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of bucket name to a list of source column names")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<BucketGroup, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut buckets: Vec<BucketDefinition> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        let mut seen = HashSet::new();

        while let Some((name, columns)) = access.next_entry::<String, Vec<String>>()? {
            if !seen.insert(name.clone()) {
                return Err(de::Error::custom(format!("duplicate bucket '{}'", name)));
            }
            buckets.push(BucketDefinition { name, columns });
        }

        Ok(BucketGroup { buckets })
    }
}

impl<'de> Deserialize<'de> for BucketGroup {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(BucketGroupVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketSets {
    pub revenues: BucketGroup,
    pub expenditures: BucketGroup,
}

/// What to do when a raw column feeds more than one bucket of the same group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Count the column in every bucket that lists it.
    Allow,
    /// Count it in every bucket, but log a warning at load time.
    #[default]
    Warn,
    /// Fail validation.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingOptions {
    /// Absent or null source columns count as zero. When false, every mapped column
    /// must carry a value.
    pub treat_missing_as_zero: bool,
    pub duplicate_columns: DuplicatePolicy,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            treat_missing_as_zero: true,
            duplicate_columns: DuplicatePolicy::Warn,
        }
    }
}

/// The data dictionary: which raw columns roll up into which revenue/expenditure bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    pub buckets: BucketSets,
    #[serde(default)]
    pub options: MappingOptions,
}

impl MappingConfig {
    pub fn new(revenues: BucketGroup, expenditures: BucketGroup) -> Self {
        Self {
            buckets: BucketSets {
                revenues,
                expenditures,
            },
            options: MappingOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MappingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn revenues(&self) -> &BucketGroup {
        &self.buckets.revenues
    }

    pub fn expenditures(&self) -> &BucketGroup {
        &self.buckets.expenditures
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let config: MappingConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: MappingConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a dictionary from an already-resolved path. `.json` files are parsed as
    /// JSON, everything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FiscalProfileError::MissingMapping(path.display().to_string())
            } else {
                FiscalProfileError::IoError(e)
            }
        })?;

        debug!("Loading bucket mapping from {}", path.display());

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&source)
        } else {
            Self::from_yaml_str(&source)
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_group("revenues", &self.buckets.revenues, self.options.duplicate_columns)?;
        validate_group(
            "expenditures",
            &self.buckets.expenditures,
            self.options.duplicate_columns,
        )?;
        Ok(())
    }

    /// The seed dictionary for Ohio summarized city/village filings.
    pub fn ohio_default() -> Self {
        let revenues = BucketGroup::new(vec![
            BucketDefinition::new("Taxes", &["Taxes"]),
            BucketDefinition::new(
                "Intergovernmental & Other",
                &["Intergovernmental", "Miscellaneous"],
            ),
            BucketDefinition::new("Charges", &["Charges for Services"]),
            BucketDefinition::new(
                "Licenses, Permits & Fines",
                &["Licenses & Permits", "Fines & Penalties"],
            ),
            BucketDefinition::new("Other Financing", &["Other Financing"]),
        ]);

        let expenditures = BucketGroup::new(vec![
            BucketDefinition::new("Public Safety", &["Public Safety"]),
            BucketDefinition::new("Utilities", &["Utilities"]),
            BucketDefinition::new("General Government", &["General Government"]),
            BucketDefinition::new("Transportation", &["Transportation"]),
            BucketDefinition::new("Culture & Recreation", &["Culture & Recreation"]),
            BucketDefinition::new(
                "Community & Social",
                &["Natural & Economic Environment", "Social Services"],
            ),
            BucketDefinition::new("Capital Outlay", &["Capital Outlay"]),
            BucketDefinition::new("Debt Service", &["Debt Service"]),
            BucketDefinition::new("Transfers", &["Transfers"]),
        ]);

        Self::new(revenues, expenditures)
    }
}

fn validate_group(group_name: &str, group: &BucketGroup, policy: DuplicatePolicy) -> Result<()> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    let mut names: HashSet<&str> = HashSet::new();

    for bucket in group.buckets() {
        if bucket.name.trim().is_empty() {
            return Err(FiscalProfileError::InvalidMapping {
                group: group_name.to_string(),
                details: "bucket name must not be empty".to_string(),
            });
        }

        if !names.insert(bucket.name.as_str()) {
            return Err(FiscalProfileError::InvalidMapping {
                group: group_name.to_string(),
                details: format!("duplicate bucket '{}'", bucket.name),
            });
        }

        let mut own_columns: HashSet<&str> = HashSet::new();

        if bucket.columns.is_empty() {
            warn!(
                "Bucket '{}' in '{}' lists no source columns and will always total zero",
                bucket.name, group_name
            );
        }

        for column in &bucket.columns {
            if column.is_empty() {
                return Err(FiscalProfileError::InvalidMapping {
                    group: group_name.to_string(),
                    details: format!("bucket '{}' lists an empty column name", bucket.name),
                });
            }

            // a repeat inside one bucket would be summed twice
            if !own_columns.insert(column.as_str()) {
                return Err(FiscalProfileError::InvalidMapping {
                    group: group_name.to_string(),
                    details: format!(
                        "bucket '{}' lists column '{}' more than once",
                        bucket.name, column
                    ),
                });
            }

            match owners.get(column.as_str()) {
                Some(first) => match policy {
                    DuplicatePolicy::Reject => {
                        return Err(FiscalProfileError::DuplicateColumn {
                            group: group_name.to_string(),
                            column: column.clone(),
                            first_bucket: first.to_string(),
                            second_bucket: bucket.name.clone(),
                        });
                    }
                    DuplicatePolicy::Warn => warn!(
                        "Column '{}' in '{}' feeds both '{}' and '{}'",
                        column, group_name, first, bucket.name
                    ),
                    DuplicatePolicy::Allow => {}
                },
                None => {
                    owners.insert(column.as_str(), bucket.name.as_str());
                }
            }
        }
    }

    Ok(())
}
