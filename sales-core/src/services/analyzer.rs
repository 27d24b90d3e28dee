//! Analyzer - descriptive aggregates over a cleaned record set
//!
//! Sums are exact decimals. Rankings sort by value descending and break ties
//! by product name ascending, so equal inputs always give equal rankings.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::config::DEFAULT_TOP_N;
use crate::domain::result::{Error, Result};
use crate::domain::{
    AggregateResult, CleanedRecordSet, ProductQuantity, ProductRevenue, SalesStats, YearMonth,
};

/// Read-only view over a non-empty cleaned record set
pub struct SalesAnalyzer<'a> {
    cleaned: &'a CleanedRecordSet,
    quantity_by_product: BTreeMap<&'a str, i64>,
    revenue_by_product: BTreeMap<&'a str, Decimal>,
    revenue_by_month: BTreeMap<YearMonth, Decimal>,
    total_revenue: Decimal,
}

impl<'a> SalesAnalyzer<'a> {
    /// Fails with a state error on an empty set: no aggregate exists over zero rows
    ///
    /// Every sum is taken here, so a set whose sums leave the numeric range
    /// fails with an overflow error instead of producing wrong aggregates.
    pub fn new(cleaned: &'a CleanedRecordSet) -> Result<Self> {
        if cleaned.is_empty() {
            return Err(Error::state(
                "no cleaned records to analyze; every input row was removed",
            ));
        }

        let mut quantity_by_product: BTreeMap<&str, i64> = BTreeMap::new();
        let mut revenue_by_product: BTreeMap<&str, Decimal> = BTreeMap::new();
        let mut revenue_by_month: BTreeMap<YearMonth, Decimal> = BTreeMap::new();
        let mut total_revenue = Decimal::ZERO;
        for record in cleaned.records() {
            let product = record.product();

            let quantity = quantity_by_product.entry(product).or_default();
            *quantity = quantity.checked_add(record.quantity()).ok_or_else(|| {
                Error::overflow(format!("quantity sold of {} overflows", product))
            })?;

            let revenue = revenue_by_product.entry(product).or_default();
            *revenue = checked_sum(*revenue, record.total(), product)?;

            let month = revenue_by_month.entry(record.year_month()).or_default();
            *month = month.checked_add(record.total()).ok_or_else(|| {
                Error::overflow(format!("revenue of {} overflows", record.year_month()))
            })?;

            total_revenue = checked_sum(total_revenue, record.total(), "all sales")?;
        }

        Ok(Self {
            cleaned,
            quantity_by_product,
            revenue_by_product,
            revenue_by_month,
            total_revenue,
        })
    }

    fn ranked_by_quantity(&self) -> Vec<ProductQuantity> {
        let mut ranked: Vec<ProductQuantity> = self
            .quantity_by_product
            .iter()
            .map(|(product, quantity)| ProductQuantity {
                product: product.to_string(),
                quantity: *quantity,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| a.product.cmp(&b.product))
        });
        ranked
    }

    fn ranked_by_revenue(&self) -> Vec<ProductRevenue> {
        let mut ranked: Vec<ProductRevenue> = self
            .revenue_by_product
            .iter()
            .map(|(product, revenue)| ProductRevenue {
                product: product.to_string(),
                revenue: *revenue,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.revenue
                .cmp(&a.revenue)
                .then_with(|| a.product.cmp(&b.product))
        });
        ranked
    }

    /// Product with the largest summed quantity
    pub fn most_sold_product(&self) -> ProductQuantity {
        // BTreeMap iterates by name, so the first maximum is the smallest name
        let (product, quantity) = self
            .quantity_by_product
            .iter()
            .fold(None::<(&str, i64)>, |best, (p, q)| match best {
                Some((_, best_q)) if best_q >= *q => best,
                _ => Some((*p, *q)),
            })
            .unwrap_or_default();
        ProductQuantity {
            product: product.to_string(),
            quantity,
        }
    }

    /// Product with the largest summed total
    pub fn top_revenue_product(&self) -> ProductRevenue {
        let (product, revenue) = self
            .revenue_by_product
            .iter()
            .fold(None::<(&str, Decimal)>, |best, (p, r)| match best {
                Some((_, best_r)) if best_r >= *r => best,
                _ => Some((*p, *r)),
            })
            .unwrap_or_default();
        ProductRevenue {
            product: product.to_string(),
            revenue,
        }
    }

    /// Summed total per calendar month, ascending
    pub fn monthly_revenue(&self) -> BTreeMap<YearMonth, Decimal> {
        self.revenue_by_month.clone()
    }

    /// Up to `n` products by summed quantity
    pub fn top_n_by_quantity(&self, n: i64) -> Result<Vec<ProductQuantity>> {
        let n = check_n(n)?;
        let mut ranked = self.ranked_by_quantity();
        ranked.truncate(n);
        Ok(ranked)
    }

    /// Up to `n` products by summed revenue
    pub fn top_n_by_revenue(&self, n: i64) -> Result<Vec<ProductRevenue>> {
        let n = check_n(n)?;
        let mut ranked = self.ranked_by_revenue();
        ranked.truncate(n);
        Ok(ranked)
    }

    pub fn sales_stats(&self) -> SalesStats {
        let total_revenue = self.total_revenue;
        let transaction_count = self.cleaned.len();
        let average_ticket = total_revenue / Decimal::from(transaction_count);

        SalesStats {
            total_revenue,
            transaction_count,
            average_ticket,
        }
    }

    /// Every aggregate with the default ranking size
    pub fn full_summary(&self) -> AggregateResult {
        let n = DEFAULT_TOP_N;
        AggregateResult {
            most_sold_product: self.most_sold_product(),
            top_revenue_product: self.top_revenue_product(),
            monthly_revenue: self.monthly_revenue(),
            top_by_quantity: self.ranked_by_quantity().into_iter().take(n).collect(),
            top_by_revenue: self.ranked_by_revenue().into_iter().take(n).collect(),
            stats: self.sales_stats(),
            computed_at: Utc::now(),
        }
    }

    /// Every aggregate with rankings of size `n`
    pub fn full_summary_with(&self, n: i64) -> Result<AggregateResult> {
        Ok(AggregateResult {
            top_by_quantity: self.top_n_by_quantity(n)?,
            top_by_revenue: self.top_n_by_revenue(n)?,
            ..self.full_summary()
        })
    }
}

fn checked_sum(sum: Decimal, total: Decimal, what: &str) -> Result<Decimal> {
    sum.checked_add(total)
        .ok_or_else(|| Error::overflow(format!("revenue of {} overflows", what)))
}

fn check_n(n: i64) -> Result<usize> {
    if n <= 0 {
        return Err(Error::invalid_argument(format!(
            "n must be positive, got {}",
            n
        )));
    }
    Ok(usize::try_from(n).unwrap_or(usize::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SalesRecord;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn record(date: &str, product: &str, quantity: i64, price: &str) -> SalesRecord {
        SalesRecord::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            product,
            quantity,
            Decimal::from_str(price).unwrap(),
        )
        .unwrap()
    }

    fn scenario_a() -> CleanedRecordSet {
        let records = vec![
            record("2024-01-01", "ProductoA", 10, "100.0"),
            record("2024-01-02", "ProductoB", 5, "200.0"),
            record("2024-01-03", "ProductoA", 15, "100.0"),
            record("2024-02-01", "ProductoC", 8, "150.0"),
            record("2024-02-02", "ProductoB", 12, "200.0"),
        ];
        CleanedRecordSet::new(records, 5)
    }

    #[test]
    fn test_empty_set_is_state_error() {
        let empty = CleanedRecordSet::new(vec![], 4);
        assert!(matches!(SalesAnalyzer::new(&empty), Err(Error::State(_))));
    }

    #[test]
    fn test_scenario_a() {
        let cleaned = scenario_a();
        let analyzer = SalesAnalyzer::new(&cleaned).unwrap();

        let most_sold = analyzer.most_sold_product();
        assert_eq!(most_sold.product, "ProductoA");
        assert_eq!(most_sold.quantity, 25);

        let top_revenue = analyzer.top_revenue_product();
        assert_eq!(top_revenue.product, "ProductoB");
        assert_eq!(top_revenue.revenue, Decimal::from(3400));

        let monthly = analyzer.monthly_revenue();
        let months: Vec<String> = monthly.keys().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2024-01", "2024-02"]);
        assert_eq!(monthly[&YearMonth::new(2024, 1).unwrap()], Decimal::from(3500));
        assert_eq!(monthly[&YearMonth::new(2024, 2).unwrap()], Decimal::from(3600));
    }

    #[test]
    fn test_top_n_orders_and_truncates() {
        let cleaned = scenario_a();
        let analyzer = SalesAnalyzer::new(&cleaned).unwrap();

        let top = analyzer.top_n_by_quantity(2).unwrap();
        let names: Vec<&str> = top.iter().map(|p| p.product.as_str()).collect();
        assert_eq!(names, vec!["ProductoA", "ProductoB"]);

        let all = analyzer.top_n_by_revenue(10).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].product, "ProductoB");
        assert_eq!(all[2].product, "ProductoC");
    }

    #[test]
    fn test_non_positive_n_is_invalid_argument() {
        let cleaned = scenario_a();
        let analyzer = SalesAnalyzer::new(&cleaned).unwrap();
        assert!(matches!(
            analyzer.top_n_by_quantity(0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            analyzer.top_n_by_revenue(-3),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            analyzer.full_summary_with(0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_ties_break_by_product_name() {
        let records = vec![
            record("2024-01-01", "Zeta", 10, "1"),
            record("2024-01-01", "Alfa", 10, "1"),
            record("2024-01-01", "Media", 4, "1"),
        ];
        let cleaned = CleanedRecordSet::new(records, 3);
        let analyzer = SalesAnalyzer::new(&cleaned).unwrap();

        for _ in 0..5 {
            let top = analyzer.top_n_by_quantity(2).unwrap();
            assert_eq!(top[0].product, "Alfa");
            assert_eq!(top[1].product, "Zeta");
        }
        assert_eq!(analyzer.most_sold_product().product, "Alfa");
        assert_eq!(analyzer.top_revenue_product().product, "Alfa");
    }

    #[test]
    fn test_reorder_invariance() {
        let cleaned = scenario_a();
        let mut reversed: Vec<SalesRecord> = cleaned.records().to_vec();
        reversed.reverse();
        let reordered = CleanedRecordSet::new(reversed, 5);

        let a = SalesAnalyzer::new(&cleaned).unwrap();
        let b = SalesAnalyzer::new(&reordered).unwrap();
        assert_eq!(a.most_sold_product(), b.most_sold_product());
        assert_eq!(a.top_revenue_product(), b.top_revenue_product());
        assert_eq!(a.monthly_revenue(), b.monthly_revenue());
        assert_eq!(a.top_n_by_quantity(3).unwrap(), b.top_n_by_quantity(3).unwrap());
        assert_eq!(a.top_n_by_revenue(3).unwrap(), b.top_n_by_revenue(3).unwrap());
    }

    #[test]
    fn test_sales_stats() {
        let cleaned = scenario_a();
        let stats = SalesAnalyzer::new(&cleaned).unwrap().sales_stats();
        assert_eq!(stats.total_revenue, Decimal::from(7100));
        assert_eq!(stats.transaction_count, 5);
        assert_eq!(stats.average_ticket, Decimal::from(1420));
    }

    #[test]
    fn test_full_summary_with() {
        let cleaned = scenario_a();
        let summary = SalesAnalyzer::new(&cleaned)
            .unwrap()
            .full_summary_with(1)
            .unwrap();
        assert_eq!(summary.top_by_quantity.len(), 1);
        assert_eq!(summary.top_by_revenue.len(), 1);
        assert_eq!(summary.monthly_revenue.len(), 2);
    }

    #[test]
    fn test_quantity_overflow_is_an_error() {
        let records = vec![
            record("2024-01-01", "A", 5_000_000_000_000_000_000, "1"),
            record("2024-01-02", "A", 5_000_000_000_000_000_000, "1"),
        ];
        let cleaned = CleanedRecordSet::new(records, 2);
        assert!(matches!(
            SalesAnalyzer::new(&cleaned),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn test_revenue_overflow_is_an_error() {
        // Each total fits a Decimal, their sum does not
        let price = "10000000000000000000000000000";
        let records = vec![
            record("2024-01-01", "A", 5, price),
            record("2024-02-01", "B", 5, price),
        ];
        let cleaned = CleanedRecordSet::new(records, 2);
        let err = SalesAnalyzer::new(&cleaned).err().unwrap();
        assert_eq!(err.kind(), "overflow");
    }

    #[test]
    fn test_large_sums_within_range_are_exact() {
        let records = vec![
            record("2024-01-01", "A", 4_000_000_000_000_000_000, "1"),
            record("2024-01-02", "A", 4_000_000_000_000_000_000, "0.5"),
        ];
        let cleaned = CleanedRecordSet::new(records, 2);
        let analyzer = SalesAnalyzer::new(&cleaned).unwrap();
        assert_eq!(analyzer.most_sold_product().quantity, 8_000_000_000_000_000_000);
        assert_eq!(
            analyzer.sales_stats().total_revenue,
            Decimal::from(6_000_000_000_000_000_000_i64)
        );
    }
}
