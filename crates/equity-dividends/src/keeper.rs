//! Dividend Keeper: the invocation boundary of the dividend module
//!
//! Every public state-changing call either commits all of its writes (store,
//! collaborators, events) or leaves the keeper exactly as it found it. The
//! host drives the keeper one invocation at a time and supplies the caller
//! and block time through [`BlockContext`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use equity_types::{
    Address, BeneficialOwnership, CompanyId, Dividend, DividendEscrow, DividendEvent, DividendId,
    DividendPayment, DividendSnapshot, DividendTerms, ProposalId, Recipient, ReferenceType,
    ShareClassId, ShareholderSnapshot,
};
use tracing::error;

use crate::collaborators::Collaborators;
use crate::config::DividendConfig;
use crate::error::{DividendError, DividendResult};
use crate::payment::BatchOutcome;
use crate::resolver;
use crate::store::{DividendStore, KvStore, OwnershipKey};

/// Caller and block time of one invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub caller: Address,
    pub time: DateTime<Utc>,
}

impl BlockContext {
    pub fn new(caller: Address, time: DateTime<Utc>) -> Self {
        Self { caller, time }
    }
}

/// Keeper of dividend state
pub struct DividendKeeper<S, C> {
    pub(crate) config: DividendConfig,
    pub(crate) store: DividendStore<S>,
    pub(crate) collaborators: C,
    pub(crate) events: Vec<DividendEvent>,
}

impl<S, C> DividendKeeper<S, C>
where
    S: KvStore,
    C: Collaborators,
{
    pub fn new(config: DividendConfig, kv: S, collaborators: C) -> DividendResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: DividendStore::new(kv),
            collaborators,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &DividendConfig {
        &self.config
    }

    pub fn store(&self) -> &DividendStore<S> {
        &self.store
    }

    pub fn collaborators(&self) -> &C {
        &self.collaborators
    }

    /// Mutable access for the host; changes made here are outside any
    /// invocation and are never rolled back.
    pub fn collaborators_mut(&mut self) -> &mut C {
        &mut self.collaborators
    }

    /// Events of every committed invocation, oldest first.
    pub fn events(&self) -> &[DividendEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<DividendEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run `op` as one invocation.
    ///
    /// Store writes are journaled and undone on error; collaborators are
    /// restored from the snapshot their [`Clone`] provides.
    fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> DividendResult<T>,
    ) -> DividendResult<T> {
        let collaborators = self.collaborators.clone();
        let event_count = self.events.len();
        self.store.begin();

        let result = op(self);
        match &result {
            Ok(_) => self.store.commit(),
            Err(err) => {
                if let Err(undo) = self.store.rollback() {
                    error!(error = %undo, "Store rollback failed");
                }
                self.collaborators = collaborators;
                self.events.truncate(event_count);
                if err.is_fatal() {
                    error!(error = %err, "Invocation aborted with fatal inconsistency");
                }
            }
        }
        result
    }

    pub(crate) fn emit(&mut self, event: DividendEvent) {
        self.events.push(event);
    }

    // --- Custodian capability table ---

    /// Register a custodial account and the reference types it may record.
    pub fn register_custodian(
        &mut self,
        ctx: &BlockContext,
        account: Address,
        reference_types: BTreeSet<ReferenceType>,
    ) -> DividendResult<()> {
        self.transact(|k| k.do_register_custodian(ctx, account, reference_types))
    }

    pub fn custodian_capabilities(
        &self,
        account: &Address,
    ) -> DividendResult<Option<BTreeSet<ReferenceType>>> {
        Ok(self.store.custodian(account)?)
    }

    // --- Beneficial ownership ---

    #[allow(clippy::too_many_arguments)]
    pub fn register_beneficial_owner(
        &mut self,
        ctx: &BlockContext,
        custodial_account: Address,
        company_id: CompanyId,
        class_id: ShareClassId,
        beneficial_owner: Address,
        shares: u64,
        reference_id: String,
        reference_type: ReferenceType,
    ) -> DividendResult<()> {
        self.transact(|k| {
            k.do_register_beneficial_owner(
                ctx,
                BeneficialOwnership {
                    custodial_account,
                    company_id,
                    class_id,
                    beneficial_owner,
                    reference_id,
                    reference_type,
                    shares,
                    locked_at: ctx.time,
                },
            )
        })
    }

    pub fn unregister_beneficial_owner(
        &mut self,
        ctx: &BlockContext,
        key: OwnershipKey,
    ) -> DividendResult<()> {
        self.transact(|k| k.do_unregister_beneficial_owner(ctx, &key))
    }

    /// Partial fill or repayment. Zero shares removes the record.
    pub fn update_beneficial_shares(
        &mut self,
        ctx: &BlockContext,
        key: OwnershipKey,
        new_shares: u64,
    ) -> DividendResult<()> {
        self.transact(|k| k.do_update_beneficial_shares(ctx, &key, new_shares))
    }

    pub fn resolve_for_module(
        &self,
        custodial_account: &Address,
        company_id: CompanyId,
        class_id: &ShareClassId,
    ) -> DividendResult<Vec<BeneficialOwnership>> {
        Ok(self
            .store
            .ownership_for_module(custodial_account, company_id, class_id)?)
    }

    pub fn resolve_for_owner(&self, owner: &Address) -> DividendResult<Vec<BeneficialOwnership>> {
        Ok(self.store.ownership_for_owner(owner)?)
    }

    /// Shares `owner` holds economically through custodial accounts.
    pub fn beneficial_shares(
        &self,
        owner: &Address,
        company_id: CompanyId,
        class_id: &ShareClassId,
    ) -> DividendResult<u64> {
        Ok(self
            .store
            .ownership_for_owner(owner)?
            .iter()
            .filter(|r| r.company_id == company_id && &r.class_id == class_id)
            .fold(0u64, |total, r| total.saturating_add(r.shares)))
    }

    // --- Recipients ---

    pub fn resolve_recipients(
        &self,
        company_id: CompanyId,
        class_id: Option<&ShareClassId>,
    ) -> DividendResult<BTreeMap<Recipient, u64>> {
        resolver::resolve_recipients(
            &self.store,
            &self.collaborators,
            &self.config,
            company_id,
            class_id,
        )
    }

    // --- Lifecycle ---

    pub fn declare_dividend(
        &mut self,
        ctx: &BlockContext,
        terms: DividendTerms,
    ) -> DividendResult<DividendId> {
        self.transact(|k| k.do_declare(ctx, terms))
    }

    /// Governance approval of a pending dividend.
    pub fn approve_dividend_distribution(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        proposal_id: ProposalId,
    ) -> DividendResult<()> {
        self.transact(|k| k.do_approve(ctx, dividend_id, proposal_id))
    }

    /// Governance rejection of a pending dividend.
    pub fn reject_dividend_distribution(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        proposal_id: ProposalId,
        reason: String,
    ) -> DividendResult<()> {
        self.transact(|k| k.do_reject(ctx, dividend_id, proposal_id, reason))
    }

    pub fn create_record_snapshot(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
    ) -> DividendResult<DividendSnapshot> {
        self.transact(|k| k.do_create_record_snapshot(ctx, dividend_id))
    }

    /// Process the next batch. Zero uses the configured default size.
    pub fn process_payments(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        batch_size: u32,
    ) -> DividendResult<BatchOutcome> {
        self.transact(|k| k.do_process_payments(ctx, dividend_id, batch_size))
    }

    /// Pull payment for one snapshot recipient.
    pub fn claim_dividend(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        recipient: Recipient,
    ) -> DividendResult<DividendPayment> {
        self.transact(|k| k.do_claim(ctx, dividend_id, recipient))
    }

    /// Returns the amount refunded to the treasury.
    pub fn cancel_dividend(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
    ) -> DividendResult<u128> {
        self.transact(|k| k.do_cancel(ctx, dividend_id))
    }

    // --- Queries ---

    pub fn dividend(&self, dividend_id: DividendId) -> DividendResult<Dividend> {
        self.store
            .dividend(dividend_id)?
            .ok_or(DividendError::DividendNotFound(dividend_id))
    }

    pub fn dividends_for_company(&self, company_id: CompanyId) -> DividendResult<Vec<Dividend>> {
        Ok(self.store.dividends_for_company(company_id)?)
    }

    pub fn pending_dividend(
        &self,
        company_id: CompanyId,
        class_id: Option<&ShareClassId>,
    ) -> DividendResult<Option<DividendId>> {
        Ok(self.store.pending_dividend(company_id, class_id)?)
    }

    pub fn escrow(&self, dividend_id: DividendId) -> DividendResult<Option<DividendEscrow>> {
        Ok(self.store.escrow(dividend_id)?)
    }

    pub fn snapshot(&self, dividend_id: DividendId) -> DividendResult<Option<DividendSnapshot>> {
        Ok(self.store.snapshot(dividend_id)?)
    }

    pub fn snapshot_entries(
        &self,
        dividend_id: DividendId,
    ) -> DividendResult<Vec<ShareholderSnapshot>> {
        Ok(self.store.snapshot_entries(dividend_id, 0, usize::MAX)?)
    }

    pub fn payment(
        &self,
        dividend_id: DividendId,
        recipient: &Recipient,
    ) -> DividendResult<Option<DividendPayment>> {
        Ok(self.store.payment(dividend_id, recipient)?)
    }

    pub fn payments(&self, dividend_id: DividendId) -> DividendResult<Vec<DividendPayment>> {
        Ok(self.store.payments(dividend_id)?)
    }

    pub(crate) fn load_dividend(&self, dividend_id: DividendId) -> DividendResult<Dividend> {
        self.dividend(dividend_id)
    }

    pub(crate) fn require_governance(&self, ctx: &BlockContext) -> DividendResult<()> {
        if ctx.caller != self.config.governance_authority {
            return Err(DividendError::Unauthorized(format!(
                "{} is not the governance authority",
                ctx.caller
            )));
        }
        Ok(())
    }
}
