//! Record-date snapshot
//!
//! The recipient set is frozen once, after the record date, and the
//! dividend's funding is reconciled against it: holdings may have moved
//! between declaration and the record date.

use std::cmp::Ordering;

use equity_types::{
    Dividend, DividendEvent, DividendId, DividendSnapshot, DividendStatus, ShareholderSnapshot,
};
use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::error::{DividendError, DividendResult};
use crate::keeper::{BlockContext, DividendKeeper};
use crate::lifecycle::total_entitlement;
use crate::store::{KvStore, StoreError};

impl<S, C> DividendKeeper<S, C>
where
    S: KvStore,
    C: Collaborators,
{
    pub(crate) fn do_create_record_snapshot(
        &mut self,
        ctx: &BlockContext,
        dividend_id: DividendId,
    ) -> DividendResult<DividendSnapshot> {
        let mut dividend = self.load_dividend(dividend_id)?;
        if self.store.snapshot(dividend_id)?.is_some() {
            return Err(DividendError::SnapshotExists(dividend_id));
        }
        if dividend.status != DividendStatus::Declared {
            return Err(DividendError::invalid_transition(
                dividend_id,
                dividend.status,
                "record",
            ));
        }
        if ctx.time < dividend.record_date {
            return Err(DividendError::RecordDateNotReached(dividend_id));
        }

        let recipients =
            self.resolve_recipients(dividend.company_id, dividend.class_id.as_ref())?;
        let entries: Vec<ShareholderSnapshot> = recipients
            .into_iter()
            .enumerate()
            .map(|(position, (recipient, shares))| ShareholderSnapshot {
                dividend_id,
                position: position as u64,
                recipient,
                shares,
            })
            .collect();
        let eligible_shares = entries
            .iter()
            .fold(0u64, |total, entry| total.saturating_add(entry.shares));

        let total_amount = total_entitlement(&dividend, entries.iter().map(|e| e.shares))?;
        if dividend.dividend_type.is_cash_settled() {
            self.reconcile_funding(dividend.total_amount, total_amount, &dividend)?;
        }

        let header = DividendSnapshot {
            dividend_id,
            taken_at: ctx.time,
            total_shares: eligible_shares,
            recipient_count: entries.len() as u64,
            digest: snapshot_digest(&entries)?,
        };
        self.store.insert_snapshot(&header, &entries)?;

        dividend.eligible_shares = eligible_shares;
        dividend.shareholders_eligible = header.recipient_count;
        dividend.total_amount = total_amount;
        dividend.remaining_amount = total_amount;
        dividend.batch_cursor = 0;
        dividend.status = DividendStatus::Recorded;
        dividend.updated_at = ctx.time;
        self.store.put_dividend(&dividend)?;

        info!(
            dividend_id = %dividend_id,
            recipients = header.recipient_count,
            eligible_shares = eligible_shares,
            total_amount = total_amount,
            digest = %header.digest,
            "Record snapshot taken"
        );
        self.emit(DividendEvent::DividendRecorded {
            dividend_id,
            recipients: header.recipient_count,
            eligible_shares,
            total_amount,
        });
        Ok(header)
    }

    /// Top up or refund module custody when the snapshot total differs from
    /// the amount funded at declaration.
    fn reconcile_funding(
        &mut self,
        funded: u128,
        required: u128,
        dividend: &Dividend,
    ) -> DividendResult<()> {
        match required.cmp(&funded) {
            Ordering::Equal => Ok(()),
            Ordering::Greater => {
                let shortfall = required - funded;
                debug!(
                    dividend_id = %dividend.id,
                    shortfall = shortfall,
                    "Funding shortfall at record date"
                );
                self.fund_from_treasury(dividend.company_id, &dividend.denom, shortfall)
            }
            Ordering::Less => {
                let surplus = funded - required;
                debug!(
                    dividend_id = %dividend.id,
                    surplus = surplus,
                    "Funding surplus at record date"
                );
                self.refund_to_treasury(dividend.company_id, &dividend.denom, surplus)
            }
        }
    }
}

/// BLAKE3 digest over the ordered entries, hex encoded.
pub fn snapshot_digest(entries: &[ShareholderSnapshot]) -> DividendResult<String> {
    let mut hasher = blake3::Hasher::new();
    for entry in entries {
        let bytes =
            serde_json::to_vec(entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        hasher.update(&(bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
