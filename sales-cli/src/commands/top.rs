//! Top command - products ranked by quantity, straight from the store

use anyhow::Result;
use sales_core::OperationResult;

use super::get_context;
use crate::output;

pub fn run(limit: i64, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = ctx.query_service.top_products(limit);

    if json {
        return match result {
            Ok(products) => {
                println!("{}", serde_json::to_string_pretty(&OperationResult::ok(products))?);
                Ok(())
            }
            Err(e) => {
                let op = OperationResult::<()>::fail(e.to_string());
                println!("{}", serde_json::to_string_pretty(&op)?);
                Err(e.into())
            }
        };
    }

    let products = result?;
    if products.is_empty() {
        output::warning("No sales stored yet.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["#", "Product", "Quantity"]);
    for (i, product) in products.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            product.product.clone(),
            product.quantity.to_string(),
        ]);
    }
    println!("{}", table);

    Ok(())
}
