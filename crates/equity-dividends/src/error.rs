use equity_types::{
    AuditId, AuditStatus, CompanyId, Denom, DividendId, DividendStatus, Recipient, TypeError,
};
use thiserror::Error;

use crate::store::StoreError;

/// Result type for dividend operations.
pub type DividendResult<T> = Result<T, DividendError>;

/// How an error should be handled by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input; nothing was written
    Validation,
    /// Wrong lifecycle state or missing prerequisite; nothing was written
    Precondition,
    /// Funds or custody unavailable; rejected before any mutation
    Resource,
    /// Ledger left inconsistent; requires an operator
    Fatal,
}

/// Errors from the dividend subsystem.
#[derive(Error, Debug)]
pub enum DividendError {
    // --- Validation errors ---
    #[error("invalid input: {0}")]
    InvalidInput(#[from] TypeError),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid dates: {0}")]
    InvalidDates(String),

    #[error("invalid dividend terms: {0}")]
    InvalidTerms(String),

    #[error("invalid custodial reference: {0}")]
    InvalidReference(String),

    #[error("audit document invalid: {0}")]
    InvalidAuditDocument(String),

    #[error("audit report date {report_date} is in the future")]
    AuditReportInFuture { report_date: String },

    #[error("audit report date {report_date} is older than {max_age_months} months")]
    AuditReportTooOld {
        report_date: String,
        max_age_months: u32,
    },

    #[error("audit content hash {0} already used by another audit")]
    DuplicateAuditHash(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // --- Precondition errors ---
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("company not found: {0}")]
    CompanyNotFound(CompanyId),

    #[error("dividend not found: {0}")]
    DividendNotFound(DividendId),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("dividend {dividend_id} cannot {action} from status '{status}'")]
    InvalidTransition {
        dividend_id: DividendId,
        status: DividendStatus,
        action: &'static str,
    },

    #[error("dividend {existing} for company {company_id} is already pending approval")]
    DuplicatePendingDividend {
        company_id: CompanyId,
        existing: DividendId,
    },

    #[error("audit not found: {0}")]
    AuditNotFound(AuditId),

    #[error("audit {audit_id} is not verified (status: {status})")]
    AuditNotVerified {
        audit_id: AuditId,
        status: AuditStatus,
    },

    #[error("record date for dividend {0} has not passed")]
    RecordDateNotReached(DividendId),

    #[error("payment date for dividend {0} has not been reached")]
    PaymentDateNotReached(DividendId),

    #[error("snapshot already exists for dividend {0}")]
    SnapshotExists(DividendId),

    #[error("snapshot not ready for dividend {0}")]
    SnapshotNotReady(DividendId),

    #[error("{recipient} is not in the snapshot of dividend {dividend_id}")]
    NotInSnapshot {
        dividend_id: DividendId,
        recipient: Recipient,
    },

    #[error("dividend {dividend_id} already claimed by {recipient}")]
    AlreadyClaimed {
        dividend_id: DividendId,
        recipient: Recipient,
    },

    #[error("escrow for dividend {dividend_id} already settled as {status}")]
    EscrowAlreadySettled {
        dividend_id: DividendId,
        status: equity_types::EscrowStatus,
    },

    #[error("custodial account {account} is not registered for {reference_type} references")]
    UnregisteredCustodian {
        account: String,
        reference_type: String,
    },

    #[error(
        "beneficial shares {requested} would exceed custodial holding {held} of {account}"
    )]
    ExceedsCustodialHolding {
        account: String,
        requested: u64,
        held: u64,
    },

    #[error("no eligible shareholders for company {0}")]
    NoEligibleShareholders(CompanyId),

    // --- Resource errors ---
    #[error("insufficient treasury balance for company {company_id}: required {required} {denom}, available {available}")]
    InsufficientTreasuryBalance {
        company_id: CompanyId,
        denom: Denom,
        required: u128,
        available: u128,
    },

    #[error("treasury of company {0} is frozen")]
    TreasuryFrozen(CompanyId),

    #[error("insufficient escrow for dividend {dividend_id}: required {required}, locked {locked}")]
    InsufficientEscrow {
        dividend_id: DividendId,
        required: u128,
        locked: u128,
    },

    #[error("escrow record for dividend {dividend_id} could not be created: {message}")]
    EscrowCreationFailed {
        dividend_id: DividendId,
        message: String,
    },

    // --- Collaborator / storage errors ---
    #[error("collaborator failure: {0}")]
    Collaborator(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    // --- Fatal ---
    #[error("FATAL ledger inconsistency: {0}")]
    FatalInconsistency(String),
}

impl DividendError {
    pub fn invalid_transition(
        dividend_id: DividendId,
        status: DividendStatus,
        action: &'static str,
    ) -> Self {
        Self::InvalidTransition {
            dividend_id,
            status,
            action,
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidInput(_)
            | Self::InvalidAmount(_)
            | Self::InvalidDates(_)
            | Self::InvalidTerms(_)
            | Self::InvalidReference(_)
            | Self::InvalidAuditDocument(_)
            | Self::AuditReportInFuture { .. }
            | Self::AuditReportTooOld { .. }
            | Self::DuplicateAuditHash(_)
            | Self::InvalidConfig(_) => ErrorClass::Validation,
            Self::InsufficientTreasuryBalance { .. }
            | Self::TreasuryFrozen(_)
            | Self::InsufficientEscrow { .. }
            | Self::EscrowCreationFailed { .. }
            | Self::Collaborator(_)
            | Self::Store(_) => ErrorClass::Resource,
            Self::FatalInconsistency(_) => ErrorClass::Fatal,
            _ => ErrorClass::Precondition,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_taxonomy() {
        assert_eq!(
            DividendError::InvalidAmount("zero".into()).class(),
            ErrorClass::Validation
        );
        assert_eq!(
            DividendError::SnapshotExists(DividendId(1)).class(),
            ErrorClass::Precondition
        );
        assert_eq!(
            DividendError::TreasuryFrozen(CompanyId(1)).class(),
            ErrorClass::Resource
        );
        assert!(DividendError::FatalInconsistency("x".into()).is_fatal());
    }

    #[test]
    fn transition_display_names_status() {
        let err = DividendError::invalid_transition(
            DividendId(9),
            DividendStatus::Rejected,
            "reject",
        );
        assert_eq!(
            err.to_string(),
            "dividend 9 cannot reject from status 'rejected'"
        );
    }

    #[test]
    fn fatal_display_is_marked() {
        let err = DividendError::FatalInconsistency("treasury debit not reversed".into());
        assert!(err.to_string().starts_with("FATAL"));
    }
}
