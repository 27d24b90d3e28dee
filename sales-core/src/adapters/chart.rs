//! JSON chart data writer
//!
//! Writes each series as a standalone JSON document that any plotting
//! front end can draw. Points keep the order they were given in.

use std::path::{Path, PathBuf};

use crate::domain::result::{Error, Result};
use crate::ports::{ChartRenderer, ChartSeries};

pub const MONTHLY_REVENUE_FILE: &str = "monthly_revenue.json";
pub const TOP_PRODUCTS_FILE: &str = "top_products.json";

/// Renders chart series as pretty-printed JSON files in one directory
pub struct JsonChartRenderer {
    output_dir: PathBuf,
}

impl JsonChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn write(&self, file_name: &str, series: &ChartSeries) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        let content = serde_json::to_string_pretty(series)?;
        std::fs::write(&path, content)
            .map_err(|e| Error::export(format!("failed to write {}: {}", path.display(), e)))?;
        Ok(path)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ChartRenderer for JsonChartRenderer {
    fn render_monthly_revenue(&self, series: &ChartSeries) -> Result<PathBuf> {
        self.write(MONTHLY_REVENUE_FILE, series)
    }

    fn render_top_products(&self, series: &ChartSeries) -> Result<PathBuf> {
        self.write(TOP_PRODUCTS_FILE, series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ChartPoint;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    #[test]
    fn test_writes_series_in_order() {
        let dir = tempdir().unwrap();
        let renderer = JsonChartRenderer::new(dir.path().join("charts"));

        let series = ChartSeries {
            title: "Monthly revenue".to_string(),
            x_label: "Month".to_string(),
            y_label: "Revenue".to_string(),
            points: vec![
                ChartPoint {
                    label: "2024-01".to_string(),
                    value: Decimal::from(3000),
                },
                ChartPoint {
                    label: "2024-02".to_string(),
                    value: Decimal::from(3600),
                },
            ],
        };

        let path = renderer.render_monthly_revenue(&series).unwrap();
        assert_eq!(path.file_name().unwrap(), MONTHLY_REVENUE_FILE);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["title"], "Monthly revenue");
        assert_eq!(json["points"][0]["label"], "2024-01");
        assert_eq!(json["points"][1]["label"], "2024-02");
    }
}
