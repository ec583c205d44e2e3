//! Dividend escrow
//!
//! Treasury funds for a cash-settled dividend move into module custody when
//! the dividend is declared. The escrow record tracks them until governance
//! decides: `distributed` keeps them in custody for payout, `returned` sends
//! them back. Either settlement happens once.

use chrono::{DateTime, Utc};
use equity_types::{
    CompanyId, Denom, DividendEscrow, DividendEvent, DividendId, EscrowStatus,
};
use tracing::{error, info, warn};

use crate::collaborators::Collaborators;
use crate::error::{DividendError, DividendResult};
use crate::keeper::DividendKeeper;
use crate::store::KvStore;

impl<S, C> DividendKeeper<S, C>
where
    S: KvStore,
    C: Collaborators,
{
    /// Debit the treasury into module custody and record the escrow.
    ///
    /// If the escrow record cannot be written the debit is reversed before
    /// returning; a failed reversal is a fatal inconsistency.
    pub(crate) fn lock_escrow(
        &mut self,
        dividend_id: DividendId,
        company_id: CompanyId,
        denom: &Denom,
        amount: u128,
        now: DateTime<Utc>,
    ) -> DividendResult<DividendEscrow> {
        self.fund_from_treasury(company_id, denom, amount)?;

        let escrow = DividendEscrow {
            dividend_id,
            company_id,
            amount,
            denom: denom.clone(),
            status: EscrowStatus::Locked,
            locked_at: now,
            settled_at: None,
        };

        if let Err(store_err) = self.store.put_escrow(&escrow) {
            warn!(
                dividend_id = %dividend_id,
                error = %store_err,
                "Escrow record write failed, reversing treasury debit"
            );
            if let Err(reversal_err) = self.refund_to_treasury(company_id, denom, amount) {
                error!(
                    dividend_id = %dividend_id,
                    company_id = %company_id,
                    amount = amount,
                    error = %reversal_err,
                    "Treasury debit could not be reversed"
                );
                return Err(DividendError::FatalInconsistency(format!(
                    "treasury of company {company_id} debited {amount} {denom} for dividend \
                     {dividend_id} without escrow record; reversal failed: {reversal_err}"
                )));
            }
            return Err(DividendError::EscrowCreationFailed {
                dividend_id,
                message: store_err.to_string(),
            });
        }

        info!(
            dividend_id = %dividend_id,
            company_id = %company_id,
            amount = amount,
            denom = %denom,
            "Dividend escrow locked"
        );
        self.emit(DividendEvent::DividendEscrowLocked {
            dividend_id,
            company_id,
            amount,
        });
        Ok(escrow)
    }

    /// Settle a locked escrow as distributed. Funds stay in module custody.
    pub(crate) fn release_escrow(
        &mut self,
        dividend_id: DividendId,
        now: DateTime<Utc>,
    ) -> DividendResult<DividendEscrow> {
        let escrow = self.settle_escrow(dividend_id, EscrowStatus::Distributed, now)?;
        info!(
            dividend_id = %dividend_id,
            amount = escrow.amount,
            "Dividend escrow released for distribution"
        );
        Ok(escrow)
    }

    /// Settle a locked escrow as returned and send the funds back.
    pub(crate) fn return_escrow(
        &mut self,
        dividend_id: DividendId,
        now: DateTime<Utc>,
    ) -> DividendResult<DividendEscrow> {
        let escrow = self.settle_escrow(dividend_id, EscrowStatus::Returned, now)?;
        self.refund_to_treasury(escrow.company_id, &escrow.denom, escrow.amount)?;
        info!(
            dividend_id = %dividend_id,
            company_id = %escrow.company_id,
            amount = escrow.amount,
            "Dividend escrow returned to treasury"
        );
        Ok(escrow)
    }

    fn settle_escrow(
        &mut self,
        dividend_id: DividendId,
        action: EscrowStatus,
        now: DateTime<Utc>,
    ) -> DividendResult<DividendEscrow> {
        let mut escrow = self.store.escrow(dividend_id)?.ok_or_else(|| {
            DividendError::NotFound(format!("escrow for dividend {dividend_id}"))
        })?;
        if !escrow.is_locked() {
            return Err(DividendError::EscrowAlreadySettled {
                dividend_id,
                status: escrow.status,
            });
        }

        escrow.status = action;
        escrow.settled_at = Some(now);
        self.store.put_escrow(&escrow)?;
        self.emit(DividendEvent::DividendEscrowReleased {
            dividend_id,
            company_id: escrow.company_id,
            amount: escrow.amount,
            action,
        });
        Ok(escrow)
    }

    /// Move `amount` from a company treasury into module custody.
    pub(crate) fn fund_from_treasury(
        &mut self,
        company_id: CompanyId,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        if self.collaborators.is_frozen(company_id) {
            return Err(DividendError::TreasuryFrozen(company_id));
        }
        let treasury = self.collaborators.treasury(company_id).ok_or_else(|| {
            DividendError::NotFound(format!("treasury of company {company_id}"))
        })?;
        let available = self.collaborators.treasury_balance(company_id, denom);
        if available < amount {
            return Err(DividendError::InsufficientTreasuryBalance {
                company_id,
                denom: denom.clone(),
                required: amount,
                available,
            });
        }

        self.collaborators
            .debit_treasury_balance(company_id, denom, amount)?;
        if let Err(err) = self
            .collaborators
            .debit_to_module(&treasury.address, denom, amount)
        {
            self.collaborators
                .credit_treasury_balance(company_id, denom, amount)
                .map_err(|reversal| {
                    DividendError::FatalInconsistency(format!(
                        "treasury of company {company_id} debited {amount} {denom} but funds \
                         never reached custody; reversal failed: {reversal}"
                    ))
                })?;
            return Err(err);
        }
        Ok(())
    }

    /// Move `amount` from module custody back to a company treasury.
    pub(crate) fn refund_to_treasury(
        &mut self,
        company_id: CompanyId,
        denom: &Denom,
        amount: u128,
    ) -> DividendResult<()> {
        if amount == 0 {
            return Ok(());
        }
        let treasury = self.collaborators.treasury(company_id).ok_or_else(|| {
            DividendError::NotFound(format!("treasury of company {company_id}"))
        })?;
        self.collaborators
            .credit_from_module(&treasury.address, denom, amount)?;
        self.collaborators
            .credit_treasury_balance(company_id, denom, amount)
    }
}
