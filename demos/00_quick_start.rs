/// quick start - quote a fixed deposit before opening it
use fd_settlement_core::{InMemoryProductCatalog, Money, SystemClock};
use fd_settlement_core::calculator::FdCalculator;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let catalog = InMemoryProductCatalog::from_json_str(include_str!("products.json"))?;
    let calculator = FdCalculator::new(Arc::new(catalog), Arc::new(SystemClock::new()), 2);

    // 100,000 for two years at the product's base rate
    let quote = calculator.calculate_fd("FD-STD", Money::from_major(100_000), 24)?;

    println!("{}", serde_json::to_string_pretty(&quote)?);

    Ok(())
}
