//! Aggregate results computed from a cleaned record set

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::record::YearMonth;

/// A product with its summed quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductQuantity {
    pub product: String,
    pub quantity: i64,
}

/// A product with its summed revenue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductRevenue {
    pub product: String,
    pub revenue: Decimal,
}

/// Overall figures shown on the results dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesStats {
    pub total_revenue: Decimal,
    pub transaction_count: usize,
    pub average_ticket: Decimal,
}

/// Every metric of one analysis run
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub most_sold_product: ProductQuantity,
    pub top_revenue_product: ProductRevenue,
    pub monthly_revenue: BTreeMap<YearMonth, Decimal>,
    pub top_by_quantity: Vec<ProductQuantity>,
    pub top_by_revenue: Vec<ProductRevenue>,
    pub stats: SalesStats,
    pub computed_at: DateTime<Utc>,
}

/// Kind tag written to `analysis_results.metric_kind`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricKind {
    MostSoldProduct,
    TopRevenueProduct,
    /// 1-based rank in the top-N by quantity
    TopQuantityRank(usize),
    /// 1-based rank in the top-N by revenue
    TopRevenueRank(usize),
    MonthlyRevenue,
}

impl MetricKind {
    pub fn as_tag(&self) -> String {
        match self {
            MetricKind::MostSoldProduct => "most_sold_product".to_string(),
            MetricKind::TopRevenueProduct => "top_revenue_product".to_string(),
            MetricKind::TopQuantityRank(rank) => format!("top_quantity_rank_{}", rank),
            MetricKind::TopRevenueRank(rank) => format!("top_revenue_rank_{}", rank),
            MetricKind::MonthlyRevenue => "monthly_revenue".to_string(),
        }
    }
}

/// One `analysis_results` row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub metric_kind: String,
    pub label: String,
    pub value: Decimal,
}

/// A stored `analysis_results` row, as read back
#[derive(Debug, Clone, Serialize)]
pub struct StoredMetric {
    pub id: i64,
    pub metric_kind: String,
    pub label: String,
    pub value: Decimal,
    pub computed_at: NaiveDateTime,
}

impl AggregateResult {
    /// Flatten into the rows persisted in `analysis_results`
    pub fn metric_rows(&self) -> Vec<MetricRow> {
        let mut rows = vec![
            MetricRow {
                metric_kind: MetricKind::MostSoldProduct.as_tag(),
                label: self.most_sold_product.product.clone(),
                value: Decimal::from(self.most_sold_product.quantity),
            },
            MetricRow {
                metric_kind: MetricKind::TopRevenueProduct.as_tag(),
                label: self.top_revenue_product.product.clone(),
                value: self.top_revenue_product.revenue,
            },
        ];

        rows.extend(self.top_by_quantity.iter().enumerate().map(|(i, p)| MetricRow {
            metric_kind: MetricKind::TopQuantityRank(i + 1).as_tag(),
            label: p.product.clone(),
            value: Decimal::from(p.quantity),
        }));

        rows.extend(self.top_by_revenue.iter().enumerate().map(|(i, p)| MetricRow {
            metric_kind: MetricKind::TopRevenueRank(i + 1).as_tag(),
            label: p.product.clone(),
            value: p.revenue,
        }));

        rows.extend(self.monthly_revenue.iter().map(|(month, revenue)| MetricRow {
            metric_kind: MetricKind::MonthlyRevenue.as_tag(),
            label: month.to_string(),
            value: *revenue,
        }));

        rows
    }
}
