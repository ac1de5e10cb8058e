//! Mapping of loosely shaped external payloads onto request types.
//!
//! Upstream callers send the same request under several field spellings and
//! send amounts either as decimal strings or as bare integers. Everything is
//! normalized here; the engines only ever see the canonical types below.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{Result, SettlementError};
use crate::types::CustomerId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueRequest {
    pub customer_id: CustomerId,
    pub amount: Money,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedeemRequest {
    pub customer_id: CustomerId,
    pub amount: Money,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRequest {
    pub from: CustomerId,
    pub to: CustomerId,
    pub amount: Money,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculateFdRequest {
    pub product_code: String,
    pub principal: Money,
    pub tenure_months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetTimeRequest {
    pub instant: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvanceTimeRequest {
    pub seconds: i64,
}

/// amount sent as `"12.50"` or `12`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Whole(i64),
    Text(String),
}

impl RawAmount {
    fn into_money(self, field: &str) -> Result<Money> {
        match self {
            RawAmount::Whole(n) => Ok(Money::from_major(n)),
            RawAmount::Text(s) => Money::from_str_exact(&s).map_err(|e| malformed(format!("{}: {:?} ({})", field, s, e))),
        }
    }
}

/// count sent as `"12"` or `12`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCount {
    Whole(u32),
    Text(String),
}

impl RawCount {
    fn into_u32(self, field: &str) -> Result<u32> {
        match self {
            RawCount::Whole(n) => Ok(n),
            RawCount::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| malformed(format!("{}: {:?} is not a whole number", field, s))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LooseMovement {
    #[serde(alias = "customerId", alias = "customer", alias = "userId", alias = "user_id")]
    customer_id: String,
    #[serde(alias = "value", alias = "quantity")]
    amount: RawAmount,
    #[serde(default, alias = "ref", alias = "idempotencyKey", alias = "idempotency_key")]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LooseTransfer {
    #[serde(alias = "fromCustomerId", alias = "from_customer_id", alias = "sender")]
    from: String,
    #[serde(alias = "toCustomerId", alias = "to_customer_id", alias = "recipient")]
    to: String,
    #[serde(alias = "value", alias = "quantity")]
    amount: RawAmount,
    #[serde(default, alias = "ref", alias = "idempotencyKey", alias = "idempotency_key")]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LooseCalculation {
    #[serde(alias = "productCode", alias = "product")]
    product_code: String,
    #[serde(alias = "principalAmount", alias = "principal_amount", alias = "amount")]
    principal: RawAmount,
    #[serde(alias = "tenureMonths", alias = "tenure", alias = "termMonths", alias = "term_months")]
    tenure_months: RawCount,
}

#[derive(Debug, Deserialize)]
struct LooseSetTime {
    #[serde(alias = "time", alias = "timestamp", alias = "at")]
    instant: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct LooseAdvance {
    #[serde(alias = "offset", alias = "offsetSeconds", alias = "offset_seconds")]
    seconds: i64,
}

impl IssueRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let (customer_id, amount, reference) = movement(parse(json)?)?;
        Ok(Self {
            customer_id,
            amount,
            reference,
        })
    }
}

impl RedeemRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let (customer_id, amount, reference) = movement(parse(json)?)?;
        Ok(Self {
            customer_id,
            amount,
            reference,
        })
    }
}

impl TransferRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: LooseTransfer = parse(json)?;
        Ok(Self {
            from: customer(raw.from, "from")?,
            to: customer(raw.to, "to")?,
            amount: raw.amount.into_money("amount")?,
            reference: reference(raw.reference),
        })
    }
}

impl CalculateFdRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: LooseCalculation = parse(json)?;
        let product_code = raw.product_code.trim().to_string();
        if product_code.is_empty() {
            return Err(malformed("product_code is empty".to_string()));
        }
        Ok(Self {
            product_code,
            principal: raw.principal.into_money("principal")?,
            tenure_months: raw.tenure_months.into_u32("tenure_months")?,
        })
    }
}

impl SetTimeRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: LooseSetTime = parse(json)?;
        Ok(Self { instant: raw.instant })
    }
}

impl AdvanceTimeRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: LooseAdvance = parse(json)?;
        Ok(Self { seconds: raw.seconds })
    }
}

fn parse<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(|e| malformed(e.to_string()))
}

fn movement(raw: LooseMovement) -> Result<(CustomerId, Money, Option<String>)> {
    Ok((
        customer(raw.customer_id, "customer_id")?,
        raw.amount.into_money("amount")?,
        reference(raw.reference),
    ))
}

fn customer(id: String, field: &str) -> Result<CustomerId> {
    let id = id.trim();
    if id.is_empty() {
        return Err(malformed(format!("{} is empty", field)));
    }
    Ok(CustomerId::new(id))
}

/// blank references count as absent
fn reference(reference: Option<String>) -> Option<String> {
    reference
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

fn malformed(message: String) -> SettlementError {
    SettlementError::MalformedPayload { message }
}
