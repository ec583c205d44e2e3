//! Payment processor
//!
//! Walks the frozen snapshot in bounded batches, or pays a single recipient
//! on claim. Each recipient gets exactly one payment record whatever the
//! outcome, so neither path ever pays the same recipient twice and a failed
//! transfer never blocks the batch.

use chrono::{DateTime, Utc};
use equity_types::{
    Address, AuditStatus, CompanyId, Denom, Dividend, DividendEvent, DividendId, DividendPayment,
    DividendStatus, DividendType, PaymentBreakdown, PaymentId, PaymentStatus, Recipient,
    ShareholderSnapshot, REDIRECT_REASON_BLACKLISTED,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collaborators::{Collaborators, FallbackAction};
use crate::error::{DividendError, DividendResult};
use crate::keeper::{BlockContext, DividendKeeper};
use crate::sequence::{Sequence, SequenceGenerator};
use crate::store::KvStore;

/// Result of one batch invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub dividend_id: DividendId,
    /// Snapshot entries paid in this batch (already-paid entries excluded)
    pub processed: u64,
    pub shareholders_paid: u64,
    pub shareholders_eligible: u64,
    pub status: DividendStatus,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == DividendStatus::Paid
    }
}

/// Where one entitlement ended up.
struct Settlement {
    breakdown: PaymentBreakdown,
    status: PaymentStatus,
    paid_to: Option<Address>,
    reason: Option<String>,
}

impl Settlement {
    fn skipped(breakdown: PaymentBreakdown, reason: &str) -> Self {
        Self {
            breakdown,
            status: PaymentStatus::Skipped,
            paid_to: None,
            reason: Some(reason.to_string()),
        }
    }

    fn failed(breakdown: PaymentBreakdown, err: &DividendError) -> Self {
        Self {
            breakdown,
            status: PaymentStatus::Failed,
            paid_to: None,
            reason: Some(err.to_string()),
        }
    }
}

impl<S, C> DividendKeeper<S, C>
where
    S: KvStore,
    C: Collaborators,
{
    pub(crate) fn do_process_payments(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        batch_size: u32,
    ) -> DividendResult<BatchOutcome> {
        let mut dividend = self.load_payable(ctx, dividend_id, "process")?;
        let size = self.config.batch_size(batch_size) as usize;

        let entries = self
            .store
            .snapshot_entries(dividend_id, dividend.batch_cursor, size)?;
        let mut processed = 0u64;
        for entry in entries {
            dividend.batch_cursor = entry.position + 1;
            if self.store.payment(dividend_id, &entry.recipient)?.is_some() {
                debug!(
                    dividend_id = %dividend_id,
                    recipient = %entry.recipient,
                    "Recipient already paid, skipping"
                );
                continue;
            }
            self.pay_entry(&mut dividend, &entry, ctx.time)?;
            processed += 1;
        }

        self.finish_invocation(&mut dividend, ctx.time)?;
        info!(
            dividend_id = %dividend_id,
            processed = processed,
            shareholders_paid = dividend.shareholders_paid,
            shareholders_eligible = dividend.shareholders_eligible,
            "Dividend batch processed"
        );
        self.emit(DividendEvent::DividendBatchProcessed {
            dividend_id,
            processed,
            shareholders_paid: dividend.shareholders_paid,
            shareholders_eligible: dividend.shareholders_eligible,
        });

        Ok(BatchOutcome {
            dividend_id,
            processed,
            shareholders_paid: dividend.shareholders_paid,
            shareholders_eligible: dividend.shareholders_eligible,
            status: dividend.status,
        })
    }

    pub(crate) fn do_claim(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        recipient: Recipient,
    ) -> DividendResult<DividendPayment> {
        let mut dividend = self.load_payable(ctx, dividend_id, "claim")?;
        self.require_claimant(ctx, &recipient)?;

        if self.store.payment(dividend_id, &recipient)?.is_some() {
            return Err(DividendError::AlreadyClaimed {
                dividend_id,
                recipient,
            });
        }
        let entry = self
            .store
            .snapshot_entry_for(dividend_id, &recipient)?
            .ok_or(DividendError::NotInSnapshot {
                dividend_id,
                recipient,
            })?;

        let payment = self.pay_entry(&mut dividend, &entry, ctx.time)?;
        self.finish_invocation(&mut dividend, ctx.time)?;
        info!(
            dividend_id = %dividend_id,
            recipient = %entry.recipient,
            net = payment.net,
            status = %payment.status,
            "Dividend claimed"
        );
        Ok(payment)
    }

    /// Gates shared by both payment paths. The audit is checked first so an
    /// unverified audit is reported whatever the lifecycle state.
    fn load_payable(
        &self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        action: &'static str,
    ) -> DividendResult<Dividend> {
        let dividend = self.load_dividend(dividend_id)?;

        let audit = self
            .collaborators
            .audit(dividend.audit_id)
            .ok_or(DividendError::AuditNotFound(dividend.audit_id))?;
        if audit.status != AuditStatus::Verified {
            return Err(DividendError::AuditNotVerified {
                audit_id: dividend.audit_id,
                status: audit.status,
            });
        }

        if dividend.status == DividendStatus::Declared {
            return Err(DividendError::SnapshotNotReady(dividend_id));
        }
        if !dividend.status.is_payable() {
            return Err(DividendError::invalid_transition(
                dividend_id,
                dividend.status,
                action,
            ));
        }
        if ctx.time < dividend.payment_date {
            return Err(DividendError::PaymentDateNotReached(dividend_id));
        }
        Ok(dividend)
    }

    fn require_claimant(&self, ctx: &BlockContext, recipient: &Recipient) -> DividendResult<()> {
        let allowed = match recipient {
            Recipient::DirectHolder(holder) => *holder == ctx.caller,
            Recipient::TreasuryHolder(company) => self
                .collaborators
                .is_authorized_proposer(*company, &ctx.caller),
        };
        if !allowed {
            return Err(DividendError::Unauthorized(format!(
                "{} may not claim for {recipient}",
                ctx.caller
            )));
        }
        Ok(())
    }

    /// Write totals and status once per invocation.
    fn finish_invocation(
        &mut self,
        dividend: &mut Dividend,
        now: DateTime<Utc>,
    ) -> DividendResult<()> {
        dividend.remaining_amount = dividend
            .total_amount
            .saturating_sub(dividend.paid_amount)
            .saturating_sub(dividend.tax_withheld);
        dividend.updated_at = now;

        if dividend.is_complete() {
            dividend.status = DividendStatus::Paid;
            info!(
                dividend_id = %dividend.id,
                paid_amount = dividend.paid_amount,
                tax_withheld = dividend.tax_withheld,
                "Dividend fully paid"
            );
            let retained_amount = dividend.total_amount.saturating_sub(dividend.paid_amount);
            if retained_amount > 0 {
                warn!(
                    dividend_id = %dividend.id,
                    retained_amount = retained_amount,
                    "Paid dividend leaves funds in module custody"
                );
            }
            self.emit(DividendEvent::DividendPaid {
                dividend_id: dividend.id,
                paid_amount: dividend.paid_amount,
                retained_amount,
            });
        } else {
            dividend.status = DividendStatus::Processing;
        }
        self.store.put_dividend(dividend)?;
        Ok(())
    }

    /// Settle one snapshot entry, persist its payment record and fold it into
    /// the in-memory totals.
    fn pay_entry(
        &mut self,
        dividend: &mut Dividend,
        entry: &ShareholderSnapshot,
        now: DateTime<Utc>,
    ) -> DividendResult<DividendPayment> {
        let gross = dividend.entitlement(entry.shares);
        let settlement = match &entry.recipient {
            Recipient::TreasuryHolder(owner) => self.settle_treasury(dividend, *owner, gross)?,
            Recipient::DirectHolder(holder) => self.settle_holder(dividend, holder, gross),
        };

        let payment = DividendPayment {
            id: PaymentId(SequenceGenerator::next(
                &mut self.store,
                Sequence::Payment,
            )?),
            dividend_id: dividend.id,
            recipient: entry.recipient.clone(),
            shares: entry.shares,
            gross: settlement.breakdown.gross,
            tax_withheld: settlement.breakdown.withheld,
            net: settlement.breakdown.net,
            status: settlement.status,
            paid_to: settlement.paid_to,
            reason: settlement.reason,
            paid_at: now,
        };
        self.store.insert_payment(&payment)?;

        dividend.shareholders_paid += 1;
        dividend.shares_processed = dividend.shares_processed.saturating_add(entry.shares);
        if payment.status.is_disbursed() {
            dividend.paid_amount = dividend.paid_amount.saturating_add(payment.net);
            dividend.tax_withheld = dividend.tax_withheld.saturating_add(payment.tax_withheld);
        }

        match payment.status {
            PaymentStatus::Failed => warn!(
                dividend_id = %dividend.id,
                recipient = %payment.recipient,
                reason = payment.reason.as_deref().unwrap_or_default(),
                "Dividend payment failed"
            ),
            _ => debug!(
                dividend_id = %dividend.id,
                recipient = %payment.recipient,
                net = payment.net,
                status = %payment.status,
                "Dividend payment recorded"
            ),
        }
        self.emit(DividendEvent::DividendPayment {
            dividend_id: dividend.id,
            recipient: payment.recipient.clone(),
            amount: payment.net,
            status: payment.status,
        });
        Ok(payment)
    }

    /// Pay a cross-company treasury: bank transfer to its account, then the
    /// treasury's own bookkeeping. A refused booking takes the transfer back
    /// into custody; only a failed take-back aborts the invocation.
    fn settle_treasury(
        &mut self,
        dividend: &Dividend,
        owner_company: CompanyId,
        gross: u128,
    ) -> DividendResult<Settlement> {
        if !dividend.dividend_type.is_cash_settled() {
            return Ok(Settlement::skipped(
                PaymentBreakdown::untaxed(gross),
                "treasury_recipient_unsupported_for_type",
            ));
        }
        let breakdown = if self.config.withhold_on_treasury_recipients {
            PaymentBreakdown::compute(gross, self.config.withholding_tax())
        } else {
            PaymentBreakdown::untaxed(gross)
        };

        let Some(treasury) = self.collaborators.treasury(owner_company) else {
            let err = DividendError::NotFound(format!("treasury of company {owner_company}"));
            return Ok(Settlement::failed(breakdown, &err));
        };
        if let Err(err) =
            self.transfer_from_module(dividend.id, &treasury.address, &dividend.denom, breakdown.net)
        {
            return Ok(Settlement::failed(breakdown, &err));
        }
        if let Err(err) = self.collaborators.credit_treasury_dividend(
            owner_company,
            dividend.company_id,
            &dividend.denom,
            breakdown.net,
        ) {
            self.reclaim(dividend.id, &treasury.address, &dividend.denom, breakdown.net)?;
            return Ok(Settlement::failed(breakdown, &err));
        }

        Ok(Settlement {
            breakdown,
            status: PaymentStatus::PaidToTreasury,
            paid_to: Some(treasury.address),
            reason: None,
        })
    }

    fn settle_holder(&mut self, dividend: &Dividend, holder: &Address, gross: u128) -> Settlement {
        let blacklisted = self
            .collaborators
            .is_blacklisted(dividend.company_id, holder);

        match dividend.dividend_type {
            DividendType::Property => Settlement::skipped(
                PaymentBreakdown::untaxed(gross),
                "property_settled_off_ledger",
            ),
            DividendType::Stock => {
                let breakdown = PaymentBreakdown::untaxed(gross);
                if blacklisted {
                    return Settlement::skipped(breakdown, REDIRECT_REASON_BLACKLISTED);
                }
                match self.issue_stock(dividend, holder, gross) {
                    Ok(()) => Settlement {
                        breakdown,
                        status: PaymentStatus::Paid,
                        paid_to: None,
                        reason: None,
                    },
                    Err(err) => Settlement::failed(breakdown, &err),
                }
            }
            DividendType::Cash | DividendType::Special => {
                let breakdown = PaymentBreakdown::compute(gross, self.config.withholding_tax());
                let (destination, status, reason) = if blacklisted {
                    (
                        self.redirect_target(dividend.company_id),
                        PaymentStatus::Redirected,
                        Some(REDIRECT_REASON_BLACKLISTED.to_string()),
                    )
                } else {
                    (holder.clone(), PaymentStatus::Paid, None)
                };

                if let Err(err) =
                    self.transfer_from_module(dividend.id, &destination, &dividend.denom, breakdown.net)
                {
                    return Settlement::failed(breakdown, &err);
                }

                if status == PaymentStatus::Redirected {
                    warn!(
                        dividend_id = %dividend.id,
                        shareholder = %holder,
                        redirect_to = %destination,
                        amount = breakdown.net,
                        "Dividend redirected from blacklisted shareholder"
                    );
                    self.emit(DividendEvent::DividendRedirected {
                        dividend_id: dividend.id,
                        shareholder: holder.clone(),
                        redirect_to: destination.clone(),
                        amount: breakdown.net,
                        reason: REDIRECT_REASON_BLACKLISTED.to_string(),
                    });
                }
                Settlement {
                    breakdown,
                    status,
                    paid_to: (status == PaymentStatus::Redirected).then_some(destination),
                    reason,
                }
            }
        }
    }

    fn issue_stock(
        &mut self,
        dividend: &Dividend,
        holder: &Address,
        gross: u128,
    ) -> DividendResult<()> {
        let class_id = dividend.class_id.as_ref().ok_or_else(|| {
            DividendError::InvalidTerms("stock dividend without share class".to_string())
        })?;
        let shares = u64::try_from(gross).map_err(|_| {
            DividendError::InvalidAmount("stock entitlement overflows".to_string())
        })?;
        self.collaborators
            .issue_shares(dividend.company_id, class_id, holder, shares)
    }

    /// Company charity wallet, then the protocol default charity (unless
    /// the company chose the community pool), then the community pool.
    fn redirect_target(&self, company_id: CompanyId) -> Address {
        let redirection = self
            .collaborators
            .redirection(company_id)
            .unwrap_or_default();
        if let Some(wallet) = redirection.charity_wallet {
            return wallet;
        }
        if redirection.fallback_action == FallbackAction::DefaultCharity {
            if let Some(wallet) = self.collaborators.default_charity_wallet() {
                return wallet;
            }
        }
        self.collaborators.community_pool_address()
    }

    /// Pay `amount` out of module custody, minting a shortfall when allowed.
    ///
    /// A shortfall minted before a refused credit stays in custody, where it
    /// backs the failed payment's gross.
    fn transfer_from_module(
        &mut self,
        dividend_id: DividendId,
        to: &Address,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let available = self.collaborators.module_balance(denom);
        if available < amount {
            if !self.config.allow_mint_fallback {
                return Err(DividendError::InsufficientEscrow {
                    dividend_id,
                    required: amount,
                    locked: available,
                });
            }
            let shortfall = amount - available;
            warn!(
                dividend_id = %dividend_id,
                shortfall = shortfall,
                denom = %denom,
                "Module custody short, minting fallback"
            );
            self.collaborators.mint(denom, shortfall)?;
        }
        self.collaborators.credit_from_module(to, denom, amount)
    }

    /// Take a completed transfer back into module custody.
    fn reclaim(
        &mut self,
        dividend_id: DividendId,
        from: &Address,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.collaborators
            .debit_to_module(from, denom, amount)
            .map_err(|err| {
                DividendError::FatalInconsistency(format!(
                    "dividend {dividend_id}: transfer of {amount} {denom} to {from} not reversed: {err}"
                ))
            })
    }
}
