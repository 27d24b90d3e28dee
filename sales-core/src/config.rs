//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "columns": { "date": "fecha", "product": "producto", ... },
//!   "analysis": { "topN": 3, "chartTopN": 5 },
//!   "output": { "dir": "output", "generateCharts": true, "exportReport": true }
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

/// Default number of products in top-N rankings
pub const DEFAULT_TOP_N: usize = 3;

/// Default number of products in the top products chart
pub const DEFAULT_CHART_TOP_N: usize = 5;

const DEFAULT_DB_FILENAME: &str = "sales.duckdb";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    columns: Option<ColumnMappings>,
    #[serde(default)]
    analysis: AnalysisSettings,
    #[serde(default)]
    output: OutputSettings,
    #[serde(default)]
    db_filename: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisSettings {
    #[serde(default)]
    top_n: Option<usize>,
    #[serde(default)]
    chart_top_n: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputSettings {
    #[serde(default)]
    dir: Option<PathBuf>,
    #[serde(default)]
    generate_charts: Option<bool>,
    #[serde(default)]
    export_report: Option<bool>,
}

/// Pipeline configuration (resolved view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit column names; `None` means auto-detect from the header
    pub columns: Option<ColumnMappings>,
    pub top_n: usize,
    pub chart_top_n: usize,
    /// Directory for cleaned CSV, report and chart data
    pub output_dir: PathBuf,
    pub generate_charts: bool,
    pub export_report: bool,
    pub db_filename: String,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            columns: None,
            top_n: DEFAULT_TOP_N,
            chart_top_n: DEFAULT_CHART_TOP_N,
            output_dir: PathBuf::from("output"),
            generate_charts: true,
            export_report: true,
            db_filename: DEFAULT_DB_FILENAME.to_string(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// A relative `output.dir` is resolved against the data directory.
    /// `SALES_TOP_N` overrides `analysis.topN` (for CI/testing).
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)?
        } else {
            SettingsFile::default()
        };

        let top_n = match std::env::var("SALES_TOP_N").ok() {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| Error::invalid_argument(format!("SALES_TOP_N is not a number: {}", value)))?,
            None => raw.analysis.top_n.unwrap_or(DEFAULT_TOP_N),
        };
        if top_n == 0 {
            return Err(Error::invalid_argument("topN must be greater than zero"));
        }

        let chart_top_n = raw.analysis.chart_top_n.unwrap_or(DEFAULT_CHART_TOP_N);
        if chart_top_n == 0 {
            return Err(Error::invalid_argument("chartTopN must be greater than zero"));
        }

        let output_dir = match &raw.output.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => data_dir.join(dir),
            None => data_dir.join("output"),
        };

        Ok(Self {
            columns: raw.columns.clone(),
            top_n,
            chart_top_n,
            output_dir,
            generate_charts: raw.output.generate_charts.unwrap_or(true),
            export_report: raw.output.export_report.unwrap_or(true),
            db_filename: raw
                .db_filename
                .clone()
                .unwrap_or_else(|| DEFAULT_DB_FILENAME.to_string()),
            _raw_settings: raw,
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that the pipeline doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.columns = self.columns.clone();
        settings.analysis.top_n = Some(self.top_n);
        settings.analysis.chart_top_n = Some(self.chart_top_n);
        settings.output.generate_charts = Some(self.generate_charts);
        settings.output.export_report = Some(self.export_report);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Path of the store file inside the data directory
    pub fn db_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.db_filename)
    }
}

/// Column names of the four logical fields in the source header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMappings {
    pub date: String,
    pub product: String,
    pub quantity: String,
    pub unit_price: String,
}

impl Default for ColumnMappings {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            product: "product".to_string(),
            quantity: "quantity".to_string(),
            unit_price: "unit_price".to_string(),
        }
    }
}
