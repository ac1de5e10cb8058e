/// ledger - loose JSON payloads, transfers and reconciliation
use fd_settlement_core::{
    Caller, InMemoryProductCatalog, IssueRequest, ManualSupply, Money, SettlementConfig,
    SettlementService, SystemClock, TransferRequest,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let supply = Arc::new(ManualSupply::new(Money::from_major(1_000)));
    let service = SettlementService::new(
        SettlementConfig::default(),
        Arc::new(InMemoryProductCatalog::new()),
        supply.clone(),
        Arc::new(SystemClock::new()),
    )?;
    let admin = Caller::Admin;

    // the same issue sent twice under different field spellings
    for payload in [
        r#"{"customerId": "alice", "amount": "1000", "idempotencyKey": "mint-1"}"#,
        r#"{"customer_id": "alice", "value": 1000, "reference": "mint-1"}"#,
    ] {
        let request = IssueRequest::from_json(payload)?;
        let entry = service.issue(&admin, &request.customer_id, request.amount, request.reference.as_deref())?;
        println!("entry {} balance after {}", entry.id, entry.balance_after);
    }

    let request = TransferRequest::from_json(r#"{"sender": "alice", "recipient": "bob", "amount": "250.75"}"#)?;
    let transfer = service.transfer(&admin, &request.from, &request.to, request.amount, request.reference.as_deref())?;
    println!("\ntransfer out #{} / in #{}", transfer.debit.id, transfer.credit.id);

    println!("\n{}", serde_json::to_string_pretty(&service.all_history(&admin, 0, None)?)?);

    let summary = service.summary(&admin)?;
    println!("\nledger {} vs chain {}: variance {}", summary.ledger_total, summary.on_chain_supply, summary.variance);

    Ok(())
}
