//! Events emitted by the dividend subsystem

use crate::{
    Address, CompanyId, DividendId, DividendType, EscrowStatus, PaymentStatus, ProposalId,
    Recipient, ReferenceType, ShareClassId,
};
use serde::{Deserialize, Serialize};

/// Reason attached to payments redirected away from a blacklisted holder.
pub const REDIRECT_REASON_BLACKLISTED: &str = "shareholder_blacklisted";

/// Structured event recorded by each committed invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DividendEvent {
    DividendDeclared {
        dividend_id: DividendId,
        company_id: CompanyId,
        dividend_type: DividendType,
        total_amount: u128,
        eligible_shares: u64,
    },
    DividendApproved {
        dividend_id: DividendId,
        proposal_id: ProposalId,
        amount: u128,
    },
    DividendRejected {
        dividend_id: DividendId,
        proposal_id: ProposalId,
        amount: u128,
        reason: String,
    },
    DividendEscrowLocked {
        dividend_id: DividendId,
        company_id: CompanyId,
        amount: u128,
    },
    DividendEscrowReleased {
        dividend_id: DividendId,
        company_id: CompanyId,
        amount: u128,
        action: EscrowStatus,
    },
    DividendRecorded {
        dividend_id: DividendId,
        recipients: u64,
        eligible_shares: u64,
        total_amount: u128,
    },
    DividendPayment {
        dividend_id: DividendId,
        recipient: Recipient,
        amount: u128,
        status: PaymentStatus,
    },
    DividendRedirected {
        dividend_id: DividendId,
        shareholder: Address,
        redirect_to: Address,
        amount: u128,
        reason: String,
    },
    DividendBatchProcessed {
        dividend_id: DividendId,
        processed: u64,
        shareholders_paid: u64,
        shareholders_eligible: u64,
    },
    DividendPaid {
        dividend_id: DividendId,
        paid_amount: u128,
        /// Withheld tax plus the gross of failed or skipped payments; stays
        /// in module custody for cash-settled types
        retained_amount: u128,
    },
    DividendCancelled {
        dividend_id: DividendId,
        refunded: u128,
    },
    BeneficialOwnershipRegistered {
        custodial_account: Address,
        company_id: CompanyId,
        class_id: ShareClassId,
        beneficial_owner: Address,
        reference_id: String,
        reference_type: ReferenceType,
        shares: u64,
    },
    BeneficialOwnershipRemoved {
        custodial_account: Address,
        company_id: CompanyId,
        class_id: ShareClassId,
        beneficial_owner: Address,
        reference_id: String,
    },
}

impl DividendEvent {
    /// Stable event name used by indexers.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DividendDeclared { .. } => "dividend_declared",
            Self::DividendApproved { .. } => "dividend_approved",
            Self::DividendRejected { .. } => "dividend_rejected",
            Self::DividendEscrowLocked { .. } => "dividend_escrow_locked",
            Self::DividendEscrowReleased { .. } => "dividend_escrow_released",
            Self::DividendRecorded { .. } => "dividend_recorded",
            Self::DividendPayment { .. } => "dividend_payment",
            Self::DividendRedirected { .. } => "dividend_redirected",
            Self::DividendBatchProcessed { .. } => "dividend_batch_processed",
            Self::DividendPaid { .. } => "dividend_paid",
            Self::DividendCancelled { .. } => "dividend_cancelled",
            Self::BeneficialOwnershipRegistered { .. } => "beneficial_ownership_registered",
            Self::BeneficialOwnershipRemoved { .. } => "beneficial_ownership_removed",
        }
    }

    pub fn dividend_id(&self) -> Option<DividendId> {
        match self {
            Self::DividendDeclared { dividend_id, .. }
            | Self::DividendApproved { dividend_id, .. }
            | Self::DividendRejected { dividend_id, .. }
            | Self::DividendEscrowLocked { dividend_id, .. }
            | Self::DividendEscrowReleased { dividend_id, .. }
            | Self::DividendRecorded { dividend_id, .. }
            | Self::DividendPayment { dividend_id, .. }
            | Self::DividendRedirected { dividend_id, .. }
            | Self::DividendBatchProcessed { dividend_id, .. }
            | Self::DividendPaid { dividend_id, .. }
            | Self::DividendCancelled { dividend_id, .. } => Some(*dividend_id),
            Self::BeneficialOwnershipRegistered { .. }
            | Self::BeneficialOwnershipRemoved { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tag_matches_name() {
        let event = DividendEvent::DividendEscrowReleased {
            dividend_id: DividendId(3),
            company_id: CompanyId(1),
            amount: 10_000,
            action: EscrowStatus::Returned,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name());
        assert_eq!(json["action"], "returned");
        assert_eq!(event.dividend_id(), Some(DividendId(3)));
    }
}
