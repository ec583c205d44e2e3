//! In-memory reference implementation of the collaborator traits.
//!
//! Deterministic and test-friendly. Treasury funds are kept twice, as
//! bookkeeping in the treasury ledger and as bank balance of the treasury
//! address, and the adapter keeps the two in step the way a host chain's
//! treasury and bank modules would.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use equity_types::{
    Address, AuditDocument, AuditId, AuditRecord, AuditStatus, CompanyId, CompanyInfo, Denom,
    ShareClassId, Shareholding, TreasuryHolding,
};

use crate::collaborators::{
    AuditRegistry, BankTransfer, BlacklistRegistry, EquityRegistry, Redirection, TreasuryAccount,
    TreasuryKeeper,
};
use crate::error::{DividendError, DividendResult};

/// In-memory collaborator bundle.
#[derive(Debug, Clone)]
pub struct InMemoryCollaborators {
    module_account: Address,
    community_pool: Address,
    default_charity: Option<Address>,

    balances: BTreeMap<(Address, Denom), u128>,
    minted: BTreeMap<Denom, u128>,

    audits: BTreeMap<AuditId, AuditRecord>,
    next_audit_id: u64,

    blacklist: BTreeSet<(CompanyId, Address)>,
    redirections: BTreeMap<CompanyId, Redirection>,

    treasuries: BTreeMap<CompanyId, TreasuryAccount>,
    treasury_balances: BTreeMap<(CompanyId, Denom), u128>,
    treasury_dividends: BTreeMap<(CompanyId, CompanyId, Denom), u128>,
    frozen: BTreeSet<CompanyId>,
    /// (target company, class, owner company) -> shares
    investments: BTreeMap<(CompanyId, ShareClassId, CompanyId), u64>,

    companies: BTreeMap<CompanyId, CompanyInfo>,
    delegates: BTreeSet<(CompanyId, Address)>,
    holdings: BTreeMap<(CompanyId, ShareClassId, Address), Shareholding>,

    failing_accounts: BTreeSet<Address>,
    fail_treasury_credits: bool,
}

impl InMemoryCollaborators {
    pub fn new(module_account: Address, community_pool: Address) -> Self {
        Self {
            module_account,
            community_pool,
            default_charity: None,
            balances: BTreeMap::new(),
            minted: BTreeMap::new(),
            audits: BTreeMap::new(),
            next_audit_id: 0,
            blacklist: BTreeSet::new(),
            redirections: BTreeMap::new(),
            treasuries: BTreeMap::new(),
            treasury_balances: BTreeMap::new(),
            treasury_dividends: BTreeMap::new(),
            frozen: BTreeSet::new(),
            investments: BTreeMap::new(),
            companies: BTreeMap::new(),
            delegates: BTreeSet::new(),
            holdings: BTreeMap::new(),
            failing_accounts: BTreeSet::new(),
            fail_treasury_credits: false,
        }
    }

    // --- Setup helpers ---

    /// Register a company and its treasury account.
    pub fn add_company(&mut self, company: CompanyInfo) {
        self.treasuries.insert(
            company.id,
            TreasuryAccount {
                company_id: company.id,
                address: company.treasury_address.clone(),
            },
        );
        self.companies.insert(company.id, company);
    }

    pub fn add_delegate(&mut self, company_id: CompanyId, delegate: Address) {
        self.delegates.insert((company_id, delegate));
    }

    /// Set a direct holding; zero removes it.
    pub fn set_holding(
        &mut self,
        company_id: CompanyId,
        class_id: ShareClassId,
        owner: Address,
        shares: u64,
    ) {
        let key = (company_id, class_id.clone(), owner.clone());
        if shares == 0 {
            self.holdings.remove(&key);
        } else {
            self.holdings
                .insert(key, Shareholding::new(company_id, class_id, owner, shares));
        }
    }

    /// Record that `owner_company`'s treasury holds shares of `target_company`.
    pub fn set_investment(
        &mut self,
        owner_company: CompanyId,
        target_company: CompanyId,
        class_id: ShareClassId,
        shares: u64,
    ) {
        let key = (target_company, class_id, owner_company);
        if shares == 0 {
            self.investments.remove(&key);
        } else {
            self.investments.insert(key, shares);
        }
    }

    /// Add funds to a treasury: bookkeeping and bank balance together.
    pub fn fund_treasury(&mut self, company_id: CompanyId, denom: &Denom, amount: u128) {
        *self
            .treasury_balances
            .entry((company_id, denom.clone()))
            .or_default() += amount;
        if let Some(treasury) = self.treasuries.get(&company_id) {
            *self
                .balances
                .entry((treasury.address.clone(), denom.clone()))
                .or_default() += amount;
        }
    }

    pub fn set_balance(&mut self, account: &Address, denom: &Denom, amount: u128) {
        self.balances
            .insert((account.clone(), denom.clone()), amount);
    }

    pub fn freeze(&mut self, company_id: CompanyId) {
        self.frozen.insert(company_id);
    }

    pub fn blacklist(&mut self, company_id: CompanyId, address: Address) {
        self.blacklist.insert((company_id, address));
    }

    pub fn set_redirection(&mut self, company_id: CompanyId, redirection: Redirection) {
        self.redirections.insert(company_id, redirection);
    }

    pub fn set_default_charity(&mut self, wallet: Option<Address>) {
        self.default_charity = wallet;
    }

    pub fn set_audit_status(&mut self, audit_id: AuditId, status: AuditStatus) {
        if let Some(record) = self.audits.get_mut(&audit_id) {
            record.status = status;
        }
    }

    /// Make every transfer out of module custody to `account` fail.
    pub fn fail_transfers_to(&mut self, account: Address) {
        self.failing_accounts.insert(account);
    }

    /// Make treasury balance and dividend credits fail.
    pub fn fail_treasury_credits(&mut self, fail: bool) {
        self.fail_treasury_credits = fail;
    }

    // --- Inspection ---

    pub fn module_account(&self) -> &Address {
        &self.module_account
    }

    pub fn minted(&self, denom: &Denom) -> u128 {
        self.minted.get(denom).copied().unwrap_or(0)
    }

    pub fn treasury_dividends_received(
        &self,
        owner_company: CompanyId,
        source_company: CompanyId,
        denom: &Denom,
    ) -> u128 {
        self.treasury_dividends
            .get(&(owner_company, source_company, denom.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn move_funds(
        &mut self,
        from: &Address,
        to: &Address,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        let available = self.balance_of(from, denom);
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            DividendError::Collaborator(format!(
                "insufficient funds in {from}: required {amount} {denom}, available {available}"
            ))
        })?;
        self.balances
            .insert((from.clone(), denom.clone()), remaining);
        *self
            .balances
            .entry((to.clone(), denom.clone()))
            .or_default() += amount;
        Ok(())
    }
}

impl BankTransfer for InMemoryCollaborators {
    fn debit_to_module(
        &mut self,
        account: &Address,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        let module = self.module_account.clone();
        self.move_funds(account, &module, denom, amount)
    }

    fn credit_from_module(
        &mut self,
        account: &Address,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        if self.failing_accounts.contains(account) {
            return Err(DividendError::Collaborator(format!(
                "transfer to {account} rejected"
            )));
        }
        let module = self.module_account.clone();
        self.move_funds(&module, account, denom, amount)
    }

    fn mint(&mut self, denom: &Denom, amount: u128) -> DividendResult<()> {
        *self.minted.entry(denom.clone()).or_default() += amount;
        *self
            .balances
            .entry((self.module_account.clone(), denom.clone()))
            .or_default() += amount;
        Ok(())
    }

    fn balance_of(&self, account: &Address, denom: &Denom) -> u128 {
        self.balances
            .get(&(account.clone(), denom.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn module_balance(&self, denom: &Denom) -> u128 {
        self.balance_of(&self.module_account, denom)
    }
}

impl AuditRegistry for InMemoryCollaborators {
    fn submit_audit(
        &mut self,
        company_id: CompanyId,
        document: AuditDocument,
        submitted_at: DateTime<Utc>,
    ) -> DividendResult<AuditId> {
        if self.content_hash_in_use(&document.content_hash) {
            return Err(DividendError::DuplicateAuditHash(document.content_hash));
        }
        self.next_audit_id += 1;
        let id = AuditId(self.next_audit_id);
        self.audits.insert(
            id,
            AuditRecord {
                id,
                company_id,
                document,
                status: AuditStatus::Pending,
                submitted_at,
            },
        );
        Ok(id)
    }

    fn audit(&self, audit_id: AuditId) -> Option<AuditRecord> {
        self.audits.get(&audit_id).cloned()
    }

    fn content_hash_in_use(&self, content_hash: &str) -> bool {
        self.audits
            .values()
            .any(|record| record.document.content_hash.eq_ignore_ascii_case(content_hash))
    }

    fn mark_verified(&mut self, audit_id: AuditId) -> DividendResult<()> {
        let record = self
            .audits
            .get_mut(&audit_id)
            .ok_or(DividendError::AuditNotFound(audit_id))?;
        record.status = AuditStatus::Verified;
        Ok(())
    }
}

impl BlacklistRegistry for InMemoryCollaborators {
    fn is_blacklisted(&self, company_id: CompanyId, address: &Address) -> bool {
        self.blacklist.contains(&(company_id, address.clone()))
    }

    fn redirection(&self, company_id: CompanyId) -> Option<Redirection> {
        self.redirections.get(&company_id).cloned()
    }

    fn default_charity_wallet(&self) -> Option<Address> {
        self.default_charity.clone()
    }

    fn community_pool_address(&self) -> Address {
        self.community_pool.clone()
    }
}

impl TreasuryKeeper for InMemoryCollaborators {
    fn treasury(&self, company_id: CompanyId) -> Option<TreasuryAccount> {
        self.treasuries.get(&company_id).cloned()
    }

    fn is_treasury_address(&self, address: &Address) -> bool {
        self.treasuries
            .values()
            .any(|treasury| &treasury.address == address)
    }

    fn treasury_balance(&self, company_id: CompanyId, denom: &Denom) -> u128 {
        self.treasury_balances
            .get(&(company_id, denom.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn debit_treasury_balance(
        &mut self,
        company_id: CompanyId,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        let available = self.treasury_balance(company_id, denom);
        let remaining =
            available
                .checked_sub(amount)
                .ok_or(DividendError::InsufficientTreasuryBalance {
                    company_id,
                    denom: denom.clone(),
                    required: amount,
                    available,
                })?;
        self.treasury_balances
            .insert((company_id, denom.clone()), remaining);
        Ok(())
    }

    fn credit_treasury_balance(
        &mut self,
        company_id: CompanyId,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        if self.fail_treasury_credits {
            return Err(DividendError::Collaborator(format!(
                "treasury of company {company_id} rejected credit"
            )));
        }
        *self
            .treasury_balances
            .entry((company_id, denom.clone()))
            .or_default() += amount;
        Ok(())
    }

    fn credit_treasury_dividend(
        &mut self,
        owner_company: CompanyId,
        source_company: CompanyId,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        self.credit_treasury_balance(owner_company, denom, amount)?;
        *self
            .treasury_dividends
            .entry((owner_company, source_company, denom.clone()))
            .or_default() += amount;
        Ok(())
    }

    fn is_frozen(&self, company_id: CompanyId) -> bool {
        self.frozen.contains(&company_id)
    }

    fn investment_holders(
        &self,
        target_company: CompanyId,
        class_id: Option<&ShareClassId>,
    ) -> Vec<TreasuryHolding> {
        self.investments
            .iter()
            .filter(|((target, class, _), _)| {
                *target == target_company && class_id.map_or(true, |c| c == class)
            })
            .map(|((target, class, owner), shares)| TreasuryHolding {
                owner_company: *owner,
                target_company: *target,
                class_id: class.clone(),
                shares: *shares,
            })
            .collect()
    }
}

impl EquityRegistry for InMemoryCollaborators {
    fn company(&self, company_id: CompanyId) -> Option<CompanyInfo> {
        self.companies.get(&company_id).cloned()
    }

    fn is_authorized_proposer(&self, company_id: CompanyId, address: &Address) -> bool {
        self.companies
            .get(&company_id)
            .is_some_and(|company| &company.owner == address)
            || self.delegates.contains(&(company_id, address.clone()))
    }

    fn shareholdings(
        &self,
        company_id: CompanyId,
        class_id: Option<&ShareClassId>,
    ) -> Vec<Shareholding> {
        self.holdings
            .iter()
            .filter(|((company, class, _), _)| {
                *company == company_id && class_id.map_or(true, |c| c == class)
            })
            .map(|(_, holding)| holding.clone())
            .collect()
    }

    fn shareholding(
        &self,
        company_id: CompanyId,
        class_id: &ShareClassId,
        owner: &Address,
    ) -> Option<Shareholding> {
        self.holdings
            .get(&(company_id, class_id.clone(), owner.clone()))
            .cloned()
    }

    fn issue_shares(
        &mut self,
        company_id: CompanyId,
        class_id: &ShareClassId,
        owner: &Address,
        shares: u64,
    ) -> DividendResult<()> {
        if !self.companies.contains_key(&company_id) {
            return Err(DividendError::CompanyNotFound(company_id));
        }
        if self.failing_accounts.contains(owner) {
            return Err(DividendError::Collaborator(format!(
                "share issuance to {owner} rejected"
            )));
        }
        let holding = self
            .holdings
            .entry((company_id, class_id.clone(), owner.clone()))
            .or_insert_with(|| Shareholding::new(company_id, class_id.clone(), owner.clone(), 0));
        holding.shares = holding.shares.saturating_add(shares);
        holding.vested_shares = holding.vested_shares.saturating_add(shares);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn uusd() -> Denom {
        Denom::parse("uusd").unwrap()
    }

    fn collaborators() -> InMemoryCollaborators {
        let mut c = InMemoryCollaborators::new(addr("dividend_module"), addr("community_pool"));
        c.add_company(CompanyInfo {
            id: CompanyId(1),
            name: "Acme".into(),
            owner: addr("acme_owner"),
            treasury_address: addr("acme_treasury"),
        });
        c
    }

    #[test]
    fn funding_keeps_bookkeeping_and_bank_in_step() {
        let mut c = collaborators();
        c.fund_treasury(CompanyId(1), &uusd(), 5_000);
        assert_eq!(c.treasury_balance(CompanyId(1), &uusd()), 5_000);
        assert_eq!(c.balance_of(&addr("acme_treasury"), &uusd()), 5_000);
    }

    #[test]
    fn module_transfers_move_custody() {
        let mut c = collaborators();
        c.set_balance(&addr("alice"), &uusd(), 100);
        c.debit_to_module(&addr("alice"), &uusd(), 60).unwrap();
        assert_eq!(c.module_balance(&uusd()), 60);

        c.credit_from_module(&addr("bob"), &uusd(), 25).unwrap();
        assert_eq!(c.balance_of(&addr("bob"), &uusd()), 25);
        assert!(c.credit_from_module(&addr("bob"), &uusd(), 1_000).is_err());
    }

    #[test]
    fn duplicate_audit_hash_is_refused() {
        let mut c = collaborators();
        let document = AuditDocument {
            auditor: "KPMG".into(),
            content_hash: "ab".repeat(32),
            report_date: Utc::now(),
            document_uri: "ipfs://report".into(),
        };
        c.submit_audit(CompanyId(1), document.clone(), Utc::now())
            .unwrap();
        assert!(matches!(
            c.submit_audit(CompanyId(1), document, Utc::now()),
            Err(DividendError::DuplicateAuditHash(_))
        ));
    }

    #[test]
    fn investment_holders_filter_by_class() {
        let mut c = collaborators();
        c.set_investment(CompanyId(2), CompanyId(1), ShareClassId::new("COMMON"), 50);
        c.set_investment(CompanyId(3), CompanyId(1), ShareClassId::new("PREF"), 10);

        let common = ShareClassId::new("COMMON");
        assert_eq!(c.investment_holders(CompanyId(1), Some(&common)).len(), 1);
        assert_eq!(c.investment_holders(CompanyId(1), None).len(), 2);
    }

    #[test]
    fn treasury_addresses_are_recognised() {
        let c = collaborators();
        assert!(c.is_treasury_address(&addr("acme_treasury")));
        assert!(!c.is_treasury_address(&addr("acme_owner")));
    }

    #[test]
    fn delegates_may_propose() {
        let mut c = collaborators();
        c.add_delegate(CompanyId(1), addr("cfo"));
        assert!(c.is_authorized_proposer(CompanyId(1), &addr("acme_owner")));
        assert!(c.is_authorized_proposer(CompanyId(1), &addr("cfo")));
        assert!(!c.is_authorized_proposer(CompanyId(1), &addr("mallory")));
    }
}
