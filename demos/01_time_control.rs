/// time control - premature redemption quotes on a controlled clock
use fd_settlement_core::{
    Caller, CustomerId, InMemoryProductCatalog, ManualSupply, Money, SettlementConfig,
    SettlementService, SystemClock, TimeSource,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== time control example ===\n");

    // base time comes from a controllable test source
    let clock = Arc::new(SystemClock::with_source(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    )));
    let controller = clock.provider().test_control().unwrap();

    let catalog = InMemoryProductCatalog::from_json_str(include_str!("products.json"))?;
    let service = SettlementService::new(
        SettlementConfig::for_currency("INR"),
        Arc::new(catalog),
        Arc::new(ManualSupply::new(Money::ZERO)),
        clock.clone(),
    )?;

    let admin = Caller::Admin;
    let customer = CustomerId::new("cust-42");
    let caller = Caller::Customer(customer.clone());

    service.issue(&admin, &customer, Money::from_major(150_000), Some("funding-1"))?;
    let account = service.open_account(&caller, &customer, "FD-STD", Money::from_major(100_000), 12)?;
    println!("opened {} maturing {}", account.id, account.maturity_date.format("%Y-%m-%d"));

    // inside the grace period
    controller.advance(Duration::days(10));
    let quote = service.enquire_redemption(&caller, account.id)?;
    println!("\nday 10: accrued {}, penalty {}, net {}", quote.accrued_interest, quote.penalty, quote.net_payable);
    for warning in &quote.warnings {
        println!("  warning: {}", warning);
    }

    // well past the grace period; admin offsets stack on the base source
    service.advance_time(&admin, 190 * 86_400)?;
    let quote = service.enquire_redemption(&caller, account.id)?;
    println!("\nday 200: accrued {}, penalty {}, net {}", quote.accrued_interest, quote.penalty, quote.net_payable);

    let receipt = service.process_redemption(&caller, account.id)?;
    println!("\naccount status: {}", receipt.account.status);
    println!("remaining token balance: {}", service.balance(&caller, &customer)?);

    Ok(())
}
