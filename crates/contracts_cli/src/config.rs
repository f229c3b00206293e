//! Data source configuration and contract variables.
//!
//! ```yaml
//! name: warehouse
//! type: datafusion
//! dialect: datafusion
//! tables:
//!   orders: data/orders.csv
//!   customers: data/customers.parquet
//! ```
//!
//! Relative table paths resolve against the configuration file's directory.

use anyhow::{Context, Result, anyhow, bail};
use contracts_sql::dialect_for;
use contracts_validator::{DataFusionConnection, DataSource};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming the data source configuration file.
pub const DATA_SOURCE_ENV: &str = "DQC_DATA_SOURCE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSourceConfig {
    pub name: String,

    #[serde(rename = "type", default = "default_type")]
    pub kind: String,

    /// SQL dialect, defaults to the one of `type`
    #[serde(default)]
    pub dialect: Option<String>,

    /// Table name to CSV or Parquet path
    #[serde(default)]
    pub tables: BTreeMap<String, PathBuf>,

    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_type() -> String {
    "datafusion".to_string()
}

impl DataSourceConfig {
    /// Reads the configuration from `path`, or from `$DQC_DATA_SOURCE` when
    /// no path is given. `Ok(None)` when neither is set.
    pub fn resolve(path: Option<&Path>) -> Result<Option<Self>> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(DATA_SOURCE_ENV) {
                Some(path) if !path.is_empty() => PathBuf::from(path),
                _ => return Ok(None),
            },
        };
        Self::load(&path).map(Some)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data source config: {}", path.display()))?;
        let mut config: Self = serde_yaml_ng::from_str(&text)
            .with_context(|| format!("Invalid data source config: {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        debug!(name = %config.name, tables = config.tables.len(), "Loaded data source config");
        Ok(config)
    }

    /// Opens the connection and registers every table.
    pub async fn connect(&self) -> Result<DataSource> {
        if !self.kind.eq_ignore_ascii_case("datafusion") {
            bail!(
                "Unsupported data source type '{}', only 'datafusion' is available",
                self.kind
            );
        }
        let dialect_name = self.dialect.as_deref().unwrap_or(&self.kind);
        let dialect =
            dialect_for(dialect_name).ok_or_else(|| anyhow!("Unknown dialect '{}'", dialect_name))?;

        let connection = DataFusionConnection::new();
        for (table, path) in &self.tables {
            let path = self.base_dir.join(path);
            let location = path
                .to_str()
                .ok_or_else(|| anyhow!("Table path is not valid UTF-8: {}", path.display()))?;
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(str::to_ascii_lowercase);
            match extension.as_deref() {
                Some("csv") => connection.register_csv(table, location).await?,
                Some("parquet") => connection.register_parquet(table, location).await?,
                _ => bail!(
                    "Cannot register table '{}': {} is neither .csv nor .parquet",
                    table,
                    path.display()
                ),
            }
        }
        info!(data_source = %self.name, tables = self.tables.len(), "Data source ready");

        Ok(DataSource::new(self.name.clone(), dialect, Arc::new(connection)))
    }
}

/// Contract variables: the process environment, overridden by `NAME=value`
/// arguments.
pub fn variables(args: &[String]) -> Result<HashMap<String, String>> {
    let mut variables: HashMap<String, String> = std::env::vars().collect();
    for arg in args {
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid variable '{}', expected NAME=value", arg))?;
        if name.trim().is_empty() {
            bail!("Invalid variable '{}', the name is empty", arg);
        }
        variables.insert(name.trim().to_string(), value.to_string());
    }
    Ok(variables)
}
