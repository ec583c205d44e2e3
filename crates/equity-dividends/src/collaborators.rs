//! Interfaces of the subsystems the dividend module calls into.
//!
//! The module never reaches into another subsystem's storage. Everything it
//! needs from banking, audits, blacklists, treasuries and the share registry
//! goes through these traits, and the keeper is generic over a bundle that
//! implements all of them.

use chrono::{DateTime, Utc};
use equity_types::{
    Address, AuditDocument, AuditId, AuditRecord, CompanyId, CompanyInfo, Denom, ShareClassId,
    Shareholding, TreasuryHolding,
};
use serde::{Deserialize, Serialize};

use crate::error::DividendResult;

/// Moves fungible value between accounts and the module's custodial balance.
pub trait BankTransfer {
    /// Move `amount` from `account` into module custody.
    fn debit_to_module(&mut self, account: &Address, denom: &Denom, amount: u128)
        -> DividendResult<()>;

    /// Move `amount` out of module custody to `account`.
    fn credit_from_module(
        &mut self,
        account: &Address,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()>;

    /// Mint into module custody. Last-resort fallback only.
    fn mint(&mut self, denom: &Denom, amount: u128) -> DividendResult<()>;

    fn balance_of(&self, account: &Address, denom: &Denom) -> u128;

    /// Balance held in module custody.
    fn module_balance(&self, denom: &Denom) -> u128;
}

/// Registry of attached audit documents.
pub trait AuditRegistry {
    fn submit_audit(
        &mut self,
        company_id: CompanyId,
        document: AuditDocument,
        submitted_at: DateTime<Utc>,
    ) -> DividendResult<AuditId>;

    fn audit(&self, audit_id: AuditId) -> Option<AuditRecord>;

    fn content_hash_in_use(&self, content_hash: &str) -> bool;

    fn mark_verified(&mut self, audit_id: AuditId) -> DividendResult<()>;
}

/// What to do with a blacklisted holder's payment when the company has no
/// charity wallet of its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackAction {
    /// Use the protocol default charity wallet, then the community pool
    #[default]
    DefaultCharity,
    /// Go straight to the community pool
    CommunityPool,
}

/// Company-specific redirection settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirection {
    pub charity_wallet: Option<Address>,
    pub fallback_action: FallbackAction,
}

/// Blacklist and redirection settings.
pub trait BlacklistRegistry {
    fn is_blacklisted(&self, company_id: CompanyId, address: &Address) -> bool;

    fn redirection(&self, company_id: CompanyId) -> Option<Redirection>;

    fn default_charity_wallet(&self) -> Option<Address>;

    fn community_pool_address(&self) -> Address;
}

/// Treasury account of a company
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryAccount {
    pub company_id: CompanyId,
    /// Bank account holding the treasury's funds
    pub address: Address,
}

/// Company treasuries: balances, freezes and cross-company positions.
pub trait TreasuryKeeper {
    fn treasury(&self, company_id: CompanyId) -> Option<TreasuryAccount>;

    /// Whether `address` is the treasury account of any company.
    fn is_treasury_address(&self, address: &Address) -> bool;

    fn treasury_balance(&self, company_id: CompanyId, denom: &Denom) -> u128;

    fn debit_treasury_balance(
        &mut self,
        company_id: CompanyId,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()>;

    fn credit_treasury_balance(
        &mut self,
        company_id: CompanyId,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()>;

    /// Book a dividend received from `source_company` into `owner_company`'s
    /// treasury.
    fn credit_treasury_dividend(
        &mut self,
        owner_company: CompanyId,
        source_company: CompanyId,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()>;

    fn is_frozen(&self, company_id: CompanyId) -> bool;

    /// Investment positions of any treasury in `target_company`, keyed flat by
    /// (target company, class). `None` returns every class.
    fn investment_holders(
        &self,
        target_company: CompanyId,
        class_id: Option<&ShareClassId>,
    ) -> Vec<TreasuryHolding>;
}

/// Company and shareholding registry.
pub trait EquityRegistry {
    fn company(&self, company_id: CompanyId) -> Option<CompanyInfo>;

    /// Owner or registered delegate.
    fn is_authorized_proposer(&self, company_id: CompanyId, address: &Address) -> bool;

    /// Direct holdings. `None` returns every class.
    fn shareholdings(
        &self,
        company_id: CompanyId,
        class_id: Option<&ShareClassId>,
    ) -> Vec<Shareholding>;

    fn shareholding(
        &self,
        company_id: CompanyId,
        class_id: &ShareClassId,
        owner: &Address,
    ) -> Option<Shareholding>;

    fn issue_shares(
        &mut self,
        company_id: CompanyId,
        class_id: &ShareClassId,
        owner: &Address,
        shares: u64,
    ) -> DividendResult<()>;
}

/// Everything the dividend keeper needs from the outside world.
///
/// `Clone` must yield an independent snapshot: the keeper clones the bundle
/// once per invocation and restores that clone if the invocation fails. A
/// handle-backed implementation has to clone into a cache-wrapped or
/// copy-on-write view, otherwise failed invocations keep their effects.
pub trait Collaborators:
    BankTransfer + AuditRegistry + BlacklistRegistry + TreasuryKeeper + EquityRegistry + Clone
{
}

impl<T> Collaborators for T where
    T: BankTransfer + AuditRegistry + BlacklistRegistry + TreasuryKeeper + EquityRegistry + Clone
{
}
