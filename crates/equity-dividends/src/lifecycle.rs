//! Dividend lifecycle: declaration, governance decision and cancellation
//!
//! ```text
//! PendingApproval --approve--> Declared --snapshot--> Recorded --pay--> Processing --> Paid
//!        |                        |                      |                  |
//!        +--reject--> Rejected    +-------------------- cancel -------------+--> Cancelled
//! ```

use chrono::{DateTime, Months, Utc};
use equity_types::{
    AuditDocument, AuditStatus, Dividend, DividendEvent, DividendId, DividendStatus, DividendTerms,
    DividendType, ProposalId,
};
use tracing::{info, warn};

use crate::collaborators::Collaborators;
use crate::error::{DividendError, DividendResult};
use crate::keeper::{BlockContext, DividendKeeper};
use crate::resolver::total_shares;
use crate::sequence::{Sequence, SequenceGenerator};
use crate::store::KvStore;

/// Bytes in an audit content hash, hex-encoded on the document.
pub const AUDIT_HASH_LEN: usize = 32;

impl<S, C> DividendKeeper<S, C>
where
    S: KvStore,
    C: Collaborators,
{
    pub(crate) fn do_declare(
        &mut self,
        ctx: &BlockContext,
        terms: DividendTerms,
    ) -> DividendResult<DividendId> {
        let company_id = terms.company_id;
        self.collaborators
            .company(company_id)
            .ok_or(DividendError::CompanyNotFound(company_id))?;
        if !self
            .collaborators
            .is_authorized_proposer(company_id, &ctx.caller)
        {
            return Err(DividendError::Unauthorized(format!(
                "{} may not declare dividends for company {company_id}",
                ctx.caller
            )));
        }

        validate_dates(&terms, ctx.time)?;
        validate_terms(&terms)?;

        if let Some(existing) = self
            .store
            .pending_dividend(company_id, terms.class_id.as_ref())?
        {
            return Err(DividendError::DuplicatePendingDividend {
                company_id,
                existing,
            });
        }

        self.validate_audit(&terms.audit, ctx.time)?;

        let recipients = self.resolve_recipients(company_id, terms.class_id.as_ref())?;
        let eligible_shares = total_shares(&recipients);
        if eligible_shares == 0 {
            return Err(DividendError::NoEligibleShareholders(company_id));
        }

        let id = DividendId(SequenceGenerator::next(
            &mut self.store,
            Sequence::Dividend,
        )?);
        let audit_id = self.collaborators.submit_audit(
            company_id,
            terms.audit.clone(),
            ctx.time,
        )?;

        let mut dividend = Dividend {
            id,
            company_id,
            class_id: terms.class_id,
            dividend_type: terms.dividend_type,
            denom: terms.denom,
            amount_per_share: terms.amount_per_share,
            stock_ratio: terms.stock_ratio,
            declaration_date: ctx.time,
            ex_dividend_date: terms.ex_dividend_date,
            record_date: terms.record_date,
            payment_date: terms.payment_date,
            total_amount: 0,
            paid_amount: 0,
            remaining_amount: 0,
            tax_withheld: 0,
            eligible_shares,
            shares_processed: 0,
            shareholders_eligible: recipients.len() as u64,
            shareholders_paid: 0,
            batch_cursor: 0,
            status: DividendStatus::PendingApproval,
            audit_id,
            escrow_id: None,
            proposal_id: None,
            rejection_reason: None,
            declared_by: ctx.caller.clone(),
            description: terms.description,
            updated_at: ctx.time,
        };
        dividend.total_amount = total_entitlement(&dividend, recipients.values().copied())?;
        dividend.remaining_amount = dividend.total_amount;

        if dividend.dividend_type.is_cash_settled() {
            self.lock_escrow(
                id,
                company_id,
                &dividend.denom,
                dividend.total_amount,
                ctx.time,
            )?;
            dividend.escrow_id = Some(id);
        }

        self.store.put_dividend(&dividend)?;
        self.store
            .set_pending_dividend(company_id, dividend.class_id.as_ref(), id)?;

        info!(
            dividend_id = %id,
            company_id = %company_id,
            dividend_type = %dividend.dividend_type,
            total_amount = dividend.total_amount,
            eligible_shares = eligible_shares,
            declared_by = %ctx.caller,
            "Dividend declared"
        );
        self.emit(DividendEvent::DividendDeclared {
            dividend_id: id,
            company_id,
            dividend_type: dividend.dividend_type,
            total_amount: dividend.total_amount,
            eligible_shares,
        });
        Ok(id)
    }

    pub(crate) fn do_approve(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        proposal_id: ProposalId,
    ) -> DividendResult<()> {
        self.require_governance(ctx)?;
        let mut dividend = self.load_dividend(dividend_id)?;
        if dividend.status != DividendStatus::PendingApproval {
            return Err(DividendError::invalid_transition(
                dividend_id,
                dividend.status,
                "approve",
            ));
        }

        let audit = self
            .collaborators
            .audit(dividend.audit_id)
            .ok_or(DividendError::AuditNotFound(dividend.audit_id))?;
        if audit.status != AuditStatus::Verified {
            self.collaborators.mark_verified(dividend.audit_id)?;
        }

        if dividend.escrow_id.is_some() {
            self.release_escrow(dividend_id, ctx.time)?;
        }

        dividend.status = DividendStatus::Declared;
        dividend.proposal_id = Some(proposal_id);
        dividend.updated_at = ctx.time;
        self.store.put_dividend(&dividend)?;
        self.store
            .clear_pending_dividend(dividend.company_id, dividend.class_id.as_ref())?;

        info!(
            dividend_id = %dividend_id,
            proposal_id = %proposal_id,
            amount = dividend.total_amount,
            "Dividend approved"
        );
        self.emit(DividendEvent::DividendApproved {
            dividend_id,
            proposal_id,
            amount: dividend.total_amount,
        });
        Ok(())
    }

    pub(crate) fn do_reject(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
        proposal_id: ProposalId,
        reason: String,
    ) -> DividendResult<()> {
        self.require_governance(ctx)?;
        if reason.trim().is_empty() {
            return Err(DividendError::InvalidTerms(
                "rejection reason is required".to_string(),
            ));
        }
        let mut dividend = self.load_dividend(dividend_id)?;
        if dividend.status != DividendStatus::PendingApproval {
            return Err(DividendError::invalid_transition(
                dividend_id,
                dividend.status,
                "reject",
            ));
        }

        if dividend.escrow_id.is_some() {
            self.return_escrow(dividend_id, ctx.time)?;
        }

        dividend.status = DividendStatus::Rejected;
        dividend.proposal_id = Some(proposal_id);
        dividend.rejection_reason = Some(reason.clone());
        dividend.remaining_amount = 0;
        dividend.updated_at = ctx.time;
        self.store.put_dividend(&dividend)?;
        self.store
            .clear_pending_dividend(dividend.company_id, dividend.class_id.as_ref())?;

        warn!(
            dividend_id = %dividend_id,
            proposal_id = %proposal_id,
            reason = %reason,
            "Dividend rejected by governance"
        );
        self.emit(DividendEvent::DividendRejected {
            dividend_id,
            proposal_id,
            amount: dividend.total_amount,
            reason,
        });
        Ok(())
    }

    pub(crate) fn do_cancel(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
    ) -> DividendResult<u128> {
        let mut dividend = self.load_dividend(dividend_id)?;
        let authorized = ctx.caller == self.config.governance_authority
            || self
                .collaborators
                .is_authorized_proposer(dividend.company_id, &ctx.caller);
        if !authorized {
            return Err(DividendError::Unauthorized(format!(
                "{} may not cancel dividend {dividend_id}",
                ctx.caller
            )));
        }

        let refunded = match dividend.status {
            DividendStatus::Rejected | DividendStatus::Paid | DividendStatus::Cancelled => {
                return Err(DividendError::invalid_transition(
                    dividend_id,
                    dividend.status,
                    "cancel",
                ));
            }
            DividendStatus::PendingApproval => {
                self.store
                    .clear_pending_dividend(dividend.company_id, dividend.class_id.as_ref())?;
                match dividend.escrow_id {
                    Some(_) => self.return_escrow(dividend_id, ctx.time)?.amount,
                    None => 0,
                }
            }
            DividendStatus::Declared | DividendStatus::Recorded | DividendStatus::Processing => {
                if dividend.dividend_type.is_cash_settled() {
                    let remainder = dividend.remaining_amount;
                    self.refund_to_treasury(dividend.company_id, &dividend.denom, remainder)?;
                    remainder
                } else {
                    0
                }
            }
        };

        dividend.status = DividendStatus::Cancelled;
        dividend.remaining_amount = 0;
        dividend.updated_at = ctx.time;
        self.store.put_dividend(&dividend)?;

        info!(
            dividend_id = %dividend_id,
            refunded = refunded,
            cancelled_by = %ctx.caller,
            "Dividend cancelled"
        );
        self.emit(DividendEvent::DividendCancelled {
            dividend_id,
            refunded,
        });
        Ok(refunded)
    }

    fn validate_audit(&self, audit: &AuditDocument, now: DateTime<Utc>) -> DividendResult<()> {
        if audit.auditor.trim().is_empty() {
            return Err(DividendError::InvalidAuditDocument(
                "auditor is required".to_string(),
            ));
        }
        if audit.document_uri.trim().is_empty() {
            return Err(DividendError::InvalidAuditDocument(
                "document uri is required".to_string(),
            ));
        }
        let digest = hex::decode(&audit.content_hash).map_err(|e| {
            DividendError::InvalidAuditDocument(format!("content hash is not hex: {e}"))
        })?;
        if <[u8; AUDIT_HASH_LEN]>::try_from(digest.as_slice()).is_err() {
            return Err(DividendError::InvalidAuditDocument(format!(
                "content hash must be {AUDIT_HASH_LEN} bytes, found {}",
                digest.len()
            )));
        }

        if audit.report_date > now {
            return Err(DividendError::AuditReportInFuture {
                report_date: audit.report_date.to_rfc3339(),
            });
        }
        let max_age_months = self.config.audit_max_age_months;
        let oldest = now
            .checked_sub_months(Months::new(max_age_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if audit.report_date < oldest {
            return Err(DividendError::AuditReportTooOld {
                report_date: audit.report_date.to_rfc3339(),
                max_age_months,
            });
        }

        if self.collaborators.content_hash_in_use(&audit.content_hash) {
            return Err(DividendError::DuplicateAuditHash(audit.content_hash.clone()));
        }
        Ok(())
    }
}

/// Gross amount owed across a set of holdings: cash minor units, or new
/// shares for stock dividends. Summed per holding so it matches what the
/// payment processor computes entry by entry.
pub(crate) fn total_entitlement(
    dividend: &Dividend,
    holdings: impl IntoIterator<Item = u64>,
) -> DividendResult<u128> {
    holdings.into_iter().try_fold(0u128, |total, shares| {
        let gross = match (dividend.dividend_type, dividend.stock_ratio) {
            (DividendType::Stock, Some(ratio)) => Some(u128::from(ratio.apply(shares))),
            _ => dividend.amount_per_share.checked_mul(u128::from(shares)),
        };
        gross
            .and_then(|gross| total.checked_add(gross))
            .ok_or_else(|| DividendError::InvalidAmount("dividend total overflows".to_string()))
    })
}

fn validate_dates(terms: &DividendTerms, now: DateTime<Utc>) -> DividendResult<()> {
    if terms.ex_dividend_date > terms.record_date {
        return Err(DividendError::InvalidDates(
            "ex-dividend date is after the record date".to_string(),
        ));
    }
    if terms.record_date > terms.payment_date {
        return Err(DividendError::InvalidDates(
            "record date is after the payment date".to_string(),
        ));
    }
    if terms.record_date < now {
        return Err(DividendError::InvalidDates(
            "record date is in the past".to_string(),
        ));
    }
    Ok(())
}

fn validate_terms(terms: &DividendTerms) -> DividendResult<()> {
    match terms.dividend_type {
        DividendType::Cash | DividendType::Special | DividendType::Property => {
            if terms.amount_per_share == 0 {
                return Err(DividendError::InvalidAmount(
                    "amount per share must be positive".to_string(),
                ));
            }
            if terms.stock_ratio.is_some() {
                return Err(DividendError::InvalidTerms(format!(
                    "{} dividends take no stock ratio",
                    terms.dividend_type
                )));
            }
        }
        DividendType::Stock => {
            if terms.stock_ratio.is_none() {
                return Err(DividendError::InvalidTerms(
                    "stock dividends require a stock ratio".to_string(),
                ));
            }
            if terms.class_id.is_none() {
                return Err(DividendError::InvalidTerms(
                    "stock dividends require an explicit share class".to_string(),
                ));
            }
        }
    }
    if terms.description.trim().is_empty() {
        return Err(DividendError::InvalidTerms(
            "description is required".to_string(),
        ));
    }
    Ok(())
}
