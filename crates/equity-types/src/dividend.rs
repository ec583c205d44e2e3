//! Dividend records: terms, escrow, snapshot and payments
//!
//! A dividend is never deleted. Its status, running totals and the records
//! hanging off it (escrow, snapshot, payments) form the audit trail of the
//! distribution.

use crate::{
    Address, AuditId, CompanyId, Denom, DividendId, PaymentId, ProposalId, Recipient,
    ShareClassId, StockRatio,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a dividend is settled
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendType {
    /// Cash paid per share in `denom`
    Cash,
    /// New shares issued per held share
    Stock,
    /// Assets distributed outside the ledger; recorded only
    Property,
    /// One-off cash distribution
    Special,
}

impl DividendType {
    /// Whether the dividend is funded from the treasury and paid in cash.
    pub fn is_cash_settled(&self) -> bool {
        matches!(self, Self::Cash | Self::Special)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Stock => "stock",
            Self::Property => "property",
            Self::Special => "special",
        }
    }
}

impl std::fmt::Display for DividendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a dividend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendStatus {
    /// Declared, funds escrowed, awaiting governance
    PendingApproval,
    /// Approved by governance, waiting for the record date
    Declared,
    /// Rejected by governance; escrow returned
    Rejected,
    /// Snapshot taken, ready for payment
    Recorded,
    /// Some recipients processed
    Processing,
    /// Every snapshot entry processed
    Paid,
    /// Cancelled before completion
    Cancelled,
}

impl DividendStatus {
    pub fn name(self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Declared => "declared",
            Self::Rejected => "rejected",
            Self::Recorded => "recorded",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Paid | Self::Cancelled)
    }

    /// Payments may run only from these states.
    pub fn is_payable(self) -> bool {
        matches!(self, Self::Recorded | Self::Processing)
    }
}

impl std::fmt::Display for DividendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Audit document attached to a declaration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDocument {
    pub auditor: String,
    /// Hex-encoded 32-byte content hash of the report
    pub content_hash: String,
    pub report_date: DateTime<Utc>,
    pub document_uri: String,
}

/// Verification status held by the audit registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Verified,
    Rejected,
    Disputed,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
            Self::Disputed => "disputed",
        };
        f.write_str(name)
    }
}

/// Audit record as stored by the audit registry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditId,
    pub company_id: CompanyId,
    pub document: AuditDocument,
    pub status: AuditStatus,
    pub submitted_at: DateTime<Utc>,
}

/// Terms supplied by the proposer when declaring a dividend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendTerms {
    pub company_id: CompanyId,
    /// `None` distributes across every share class
    pub class_id: Option<ShareClassId>,
    pub dividend_type: DividendType,
    pub denom: Denom,
    /// Minor units per share (cash and property valuations)
    pub amount_per_share: u128,
    /// Required for stock dividends
    pub stock_ratio: Option<StockRatio>,
    pub ex_dividend_date: DateTime<Utc>,
    pub record_date: DateTime<Utc>,
    pub payment_date: DateTime<Utc>,
    pub description: String,
    pub audit: AuditDocument,
}

/// A declared distribution and its running totals
///
/// Once `Paid`, `tax_withheld` and `remaining_amount` (the gross of failed
/// or skipped payments) remain in module custody. Cancellation is refused
/// from `Paid`, so no operation here releases them; the `dividend_paid`
/// event reports their sum for the host to settle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dividend {
    pub id: DividendId,
    pub company_id: CompanyId,
    pub class_id: Option<ShareClassId>,
    pub dividend_type: DividendType,
    pub denom: Denom,
    pub amount_per_share: u128,
    pub stock_ratio: Option<StockRatio>,
    pub declaration_date: DateTime<Utc>,
    pub ex_dividend_date: DateTime<Utc>,
    pub record_date: DateTime<Utc>,
    pub payment_date: DateTime<Utc>,
    /// Cash in minor units, or shares to issue for stock dividends
    pub total_amount: u128,
    pub paid_amount: u128,
    pub remaining_amount: u128,
    pub tax_withheld: u128,
    pub eligible_shares: u64,
    pub shares_processed: u64,
    pub shareholders_eligible: u64,
    pub shareholders_paid: u64,
    /// Next snapshot position the batch processor examines
    pub batch_cursor: u64,
    pub status: DividendStatus,
    pub audit_id: AuditId,
    /// Set while an escrow record exists for this dividend
    pub escrow_id: Option<DividendId>,
    pub proposal_id: Option<ProposalId>,
    pub rejection_reason: Option<String>,
    pub declared_by: Address,
    pub description: String,
    pub updated_at: DateTime<Utc>,
}

impl Dividend {
    /// Gross entitlement for a share count: cash minor units, or new shares
    /// for stock dividends.
    pub fn entitlement(&self, shares: u64) -> u128 {
        match (self.dividend_type, self.stock_ratio) {
            (DividendType::Stock, Some(ratio)) => u128::from(ratio.apply(shares)),
            (DividendType::Stock, None) => 0,
            _ => self.amount_per_share.saturating_mul(u128::from(shares)),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.shareholders_paid >= self.shareholders_eligible
    }
}

/// Escrow status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Treasury funds set aside
    Locked,
    /// Released into module custody for payout
    Distributed,
    /// Returned to the treasury
    Returned,
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Locked => "locked",
            Self::Distributed => "distributed",
            Self::Returned => "returned",
        };
        f.write_str(name)
    }
}

/// Treasury funds held for a cash dividend pending approval
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendEscrow {
    pub dividend_id: DividendId,
    pub company_id: CompanyId,
    pub amount: u128,
    pub denom: Denom,
    pub status: EscrowStatus,
    pub locked_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl DividendEscrow {
    pub fn is_locked(&self) -> bool {
        matches!(self.status, EscrowStatus::Locked)
    }
}

/// Header of the frozen recipient list
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendSnapshot {
    pub dividend_id: DividendId,
    pub taken_at: DateTime<Utc>,
    pub total_shares: u64,
    pub recipient_count: u64,
    /// BLAKE3 digest over the ordered entries
    pub digest: String,
}

/// One frozen recipient entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareholderSnapshot {
    pub dividend_id: DividendId,
    pub position: u64,
    pub recipient: Recipient,
    pub shares: u64,
}

/// Outcome of a single payment attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    PaidToTreasury,
    Redirected,
    Skipped,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::PaidToTreasury => "paid_to_treasury",
            Self::Redirected => "redirected",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Whether value left the module for this payment.
    pub fn is_disbursed(&self) -> bool {
        matches!(self, Self::Paid | Self::PaidToTreasury | Self::Redirected)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment record; its existence marks the recipient as processed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendPayment {
    pub id: PaymentId,
    pub dividend_id: DividendId,
    pub recipient: Recipient,
    pub shares: u64,
    pub gross: u128,
    pub tax_withheld: u128,
    pub net: u128,
    pub status: PaymentStatus,
    /// Final destination when different from the recipient
    pub paid_to: Option<Address>,
    pub reason: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(dividend_type: DividendType, stock_ratio: Option<StockRatio>) -> Dividend {
        let now = Utc::now();
        Dividend {
            id: DividendId(1),
            company_id: CompanyId(1),
            class_id: None,
            dividend_type,
            denom: Denom::parse("uusd").unwrap(),
            amount_per_share: 2,
            stock_ratio,
            declaration_date: now,
            ex_dividend_date: now,
            record_date: now,
            payment_date: now,
            total_amount: 0,
            paid_amount: 0,
            remaining_amount: 0,
            tax_withheld: 0,
            eligible_shares: 0,
            shares_processed: 0,
            shareholders_eligible: 2,
            shareholders_paid: 0,
            batch_cursor: 0,
            status: DividendStatus::Recorded,
            audit_id: AuditId(1),
            escrow_id: None,
            proposal_id: None,
            rejection_reason: None,
            declared_by: Address::parse("owner").unwrap(),
            description: String::new(),
            updated_at: now,
        }
    }

    #[test]
    fn cash_entitlement_is_per_share() {
        assert_eq!(sample(DividendType::Cash, None).entitlement(600), 1_200);
    }

    #[test]
    fn stock_entitlement_uses_ratio() {
        let ratio = StockRatio::new(1, 4).unwrap();
        assert_eq!(sample(DividendType::Stock, Some(ratio)).entitlement(10), 2);
    }

    #[test]
    fn completion_tracks_counts() {
        let mut dividend = sample(DividendType::Cash, None);
        assert!(!dividend.is_complete());
        dividend.shareholders_paid = 2;
        assert!(dividend.is_complete());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&DividendStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"pending_approval\"");
        assert!(DividendStatus::Paid.is_terminal());
        assert!(DividendStatus::Processing.is_payable());
    }
}
