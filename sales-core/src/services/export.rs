//! Export service - cleaned CSV, report workbook and chart data
//!
//! Every file lands under the configured output directory:
//! `<stem>_clean.csv`, `sales_report.xlsx` and `charts/*.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::{csv, xlsx};
use crate::domain::result::Result;
use crate::domain::{AggregateResult, CleanedRecordSet, ProductQuantity, YearMonth};
use crate::ports::{ChartPoint, ChartRenderer, ChartSeries};

pub const REPORT_FILE: &str = "sales_report.xlsx";
pub const CHARTS_DIR: &str = "charts";

/// Files written by one export
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportedFiles {
    pub cleaned_csv: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub charts: Vec<PathBuf>,
}

impl ExportedFiles {
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.cleaned_csv
            .iter()
            .chain(self.report.iter())
            .chain(self.charts.iter())
    }

    /// Delete every listed file; a file that cannot be removed is logged
    pub fn remove_all(&self) {
        for path in self.paths() {
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove output");
            }
        }
    }
}

pub struct ExportService {
    output_dir: PathBuf,
}

impl ExportService {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn charts_dir(&self) -> PathBuf {
        self.output_dir.join(CHARTS_DIR)
    }

    /// `<output>/<source stem>_clean.csv`
    pub fn cleaned_csv_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("sales");
        self.output_dir.join(format!("{}_clean.csv", stem))
    }

    pub fn write_cleaned_csv(&self, source: &Path, cleaned: &CleanedRecordSet) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.cleaned_csv_path(source);
        csv::write_cleaned_csv(cleaned, &path)?;
        tracing::info!(path = %path.display(), rows = cleaned.len(), "saved cleaned data");
        Ok(path)
    }

    pub fn write_report(
        &self,
        cleaned: &CleanedRecordSet,
        aggregate: &AggregateResult,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(REPORT_FILE);
        xlsx::write_report(&path, cleaned, aggregate)?;
        tracing::info!(path = %path.display(), "saved report");
        Ok(path)
    }

    /// Hand both chart series to a renderer, returning the files it wrote
    ///
    /// Either both charts are written or neither is left behind.
    pub fn render_charts(
        &self,
        renderer: &dyn ChartRenderer,
        monthly: &BTreeMap<YearMonth, Decimal>,
        top_products: &[ProductQuantity],
    ) -> Result<Vec<PathBuf>> {
        let monthly_chart = renderer.render_monthly_revenue(&monthly_revenue_series(monthly))?;
        match renderer.render_top_products(&top_products_series(top_products)) {
            Ok(top_chart) => Ok(vec![monthly_chart, top_chart]),
            Err(e) => {
                ExportedFiles {
                    charts: vec![monthly_chart],
                    ..ExportedFiles::default()
                }
                .remove_all();
                Err(e)
            }
        }
    }
}

/// Monthly revenue, ascending by month
pub fn monthly_revenue_series(monthly: &BTreeMap<YearMonth, Decimal>) -> ChartSeries {
    ChartSeries {
        title: "Total revenue by month".to_string(),
        x_label: "Month".to_string(),
        y_label: "Revenue".to_string(),
        points: monthly
            .iter()
            .map(|(month, revenue)| ChartPoint {
                label: month.to_string(),
                value: *revenue,
            })
            .collect(),
    }
}

/// Products by quantity sold, in ranking order
pub fn top_products_series(top_products: &[ProductQuantity]) -> ChartSeries {
    ChartSeries {
        title: format!("Top {} products by quantity sold", top_products.len()),
        x_label: "Quantity".to_string(),
        y_label: "Product".to_string(),
        points: top_products
            .iter()
            .map(|p| ChartPoint {
                label: p.product.clone(),
                value: Decimal::from(p.quantity),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaned_csv_path_uses_source_stem() {
        let service = ExportService::new("/out");
        assert_eq!(
            service.cleaned_csv_path(Path::new("/data/ventas.xlsx")),
            PathBuf::from("/out/ventas_clean.csv")
        );
    }

    #[test]
    fn test_remove_all_deletes_listed_files() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("ventas_clean.csv");
        let chart = dir.path().join("monthly_revenue.json");
        std::fs::write(&csv, "date\n").unwrap();
        std::fs::write(&chart, "{}").unwrap();

        let files = ExportedFiles {
            cleaned_csv: Some(csv.clone()),
            report: Some(dir.path().join("never_written.xlsx")),
            charts: vec![chart.clone()],
        };
        assert_eq!(files.paths().count(), 3);
        files.remove_all();
        assert!(!csv.exists());
        assert!(!chart.exists());
    }

    #[test]
    fn test_series_keep_order() {
        let mut monthly = BTreeMap::new();
        monthly.insert(YearMonth::new(2024, 2).unwrap(), Decimal::from(3600));
        monthly.insert(YearMonth::new(2024, 1).unwrap(), Decimal::from(3000));

        let series = monthly_revenue_series(&monthly);
        let labels: Vec<&str> = series.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["2024-01", "2024-02"]);

        let top = top_products_series(&[
            ProductQuantity {
                product: "B".to_string(),
                quantity: 9,
            },
            ProductQuantity {
                product: "A".to_string(),
                quantity: 4,
            },
        ]);
        assert_eq!(top.title, "Top 2 products by quantity sold");
        assert_eq!(top.points[0].label, "B");
        assert_eq!(top.points[1].value, Decimal::from(4));
    }
}
