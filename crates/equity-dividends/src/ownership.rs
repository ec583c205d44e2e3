//! Beneficial-ownership registry
//!
//! Custodial modules record who economically owns the shares they hold, so
//! that dividends reach the owner rather than the custodian. Per
//! (custodial account, company, class) the recorded shares never exceed the
//! account's actual holding.

use equity_types::{BeneficialOwnership, DividendEvent};
use tracing::{debug, info};

use crate::collaborators::Collaborators;
use crate::error::{DividendError, DividendResult};
use crate::keeper::{BlockContext, DividendKeeper};
use crate::store::{KvStore, OwnershipKey};

/// Longest accepted custodial reference id.
pub const MAX_REFERENCE_ID_LEN: usize = 128;

impl<S, C> DividendKeeper<S, C>
where
    S: KvStore,
    C: Collaborators,
{
    pub(crate) fn do_register_beneficial_owner(
        &mut self,
        ctx: &BlockContext,
        record: BeneficialOwnership,
    ) -> DividendResult<()> {
        if record.shares == 0 {
            return Err(DividendError::InvalidAmount(
                "beneficial shares must be positive".to_string(),
            ));
        }
        validate_reference_id(&record.reference_id)?;
        if record.beneficial_owner == record.custodial_account {
            return Err(DividendError::InvalidReference(format!(
                "{} cannot be its own beneficial owner",
                record.custodial_account
            )));
        }
        self.require_custodial_writer(ctx, &record)?;

        let key = OwnershipKey::of(&record);
        self.check_custodial_capacity(&key, record.shares)?;

        self.store.put_ownership(&record)?;
        info!(
            custodial_account = %record.custodial_account,
            company_id = %record.company_id,
            class_id = %record.class_id,
            beneficial_owner = %record.beneficial_owner,
            reference_id = %record.reference_id,
            shares = record.shares,
            "Beneficial ownership registered"
        );
        self.emit(DividendEvent::BeneficialOwnershipRegistered {
            custodial_account: record.custodial_account,
            company_id: record.company_id,
            class_id: record.class_id,
            beneficial_owner: record.beneficial_owner,
            reference_id: record.reference_id,
            reference_type: record.reference_type,
            shares: record.shares,
        });
        Ok(())
    }

    pub(crate) fn do_unregister_beneficial_owner(
        &mut self,
        ctx: &BlockContext,
        key: &OwnershipKey,
    ) -> DividendResult<()> {
        let record = self.existing_ownership(key)?;
        self.require_custodial_writer(ctx, &record)?;

        self.store.remove_ownership(key)?;
        info!(
            custodial_account = %key.custodial_account,
            beneficial_owner = %key.beneficial_owner,
            reference_id = %key.reference_id,
            "Beneficial ownership removed"
        );
        self.emit(DividendEvent::BeneficialOwnershipRemoved {
            custodial_account: key.custodial_account.clone(),
            company_id: key.company_id,
            class_id: key.class_id.clone(),
            beneficial_owner: key.beneficial_owner.clone(),
            reference_id: key.reference_id.clone(),
        });
        Ok(())
    }

    pub(crate) fn do_update_beneficial_shares(
        &mut self,
        ctx: &BlockContext,
        key: &OwnershipKey,
        new_shares: u64,
    ) -> DividendResult<()> {
        if new_shares == 0 {
            return self.do_unregister_beneficial_owner(ctx, key);
        }

        let mut record = self.existing_ownership(key)?;
        self.require_custodial_writer(ctx, &record)?;
        self.check_custodial_capacity(key, new_shares)?;

        debug!(
            reference_id = %key.reference_id,
            from = record.shares,
            to = new_shares,
            "Beneficial shares updated"
        );
        record.shares = new_shares;
        self.store.put_ownership(&record)?;
        self.emit(DividendEvent::BeneficialOwnershipRegistered {
            custodial_account: record.custodial_account,
            company_id: record.company_id,
            class_id: record.class_id,
            beneficial_owner: record.beneficial_owner,
            reference_id: record.reference_id,
            reference_type: record.reference_type,
            shares: record.shares,
        });
        Ok(())
    }

    fn existing_ownership(&self, key: &OwnershipKey) -> DividendResult<BeneficialOwnership> {
        self.store.ownership(key)?.ok_or_else(|| {
            DividendError::NotFound(format!(
                "beneficial ownership {} of {} in {} ({})",
                key.reference_id, key.beneficial_owner, key.custodial_account, key.class_id
            ))
        })
    }

    /// The custodial account writes its own records, and only for reference
    /// types it registered.
    fn require_custodial_writer(
        &self,
        ctx: &BlockContext,
        record: &BeneficialOwnership,
    ) -> DividendResult<()> {
        if ctx.caller != record.custodial_account {
            return Err(DividendError::Unauthorized(format!(
                "{} cannot write records of custodial account {}",
                ctx.caller, record.custodial_account
            )));
        }
        self.require_custodian(&record.custodial_account, record.reference_type)
    }

    /// Recorded shares for the instrument, with `key` set to `shares`, must
    /// fit in the custodial account's holding.
    fn check_custodial_capacity(&self, key: &OwnershipKey, shares: u64) -> DividendResult<()> {
        let held = self
            .collaborators
            .shareholding(key.company_id, &key.class_id, &key.custodial_account)
            .map_or(0, |holding| holding.shares);

        let others = self
            .store
            .ownership_for_module(&key.custodial_account, key.company_id, &key.class_id)?
            .into_iter()
            .filter(|existing| OwnershipKey::of(existing) != *key)
            .fold(0u64, |total, existing| total.saturating_add(existing.shares));

        let requested = others.saturating_add(shares);
        if requested > held {
            return Err(DividendError::ExceedsCustodialHolding {
                account: key.custodial_account.to_string(),
                requested,
                held,
            });
        }
        Ok(())
    }
}

fn validate_reference_id(reference_id: &str) -> DividendResult<()> {
    if reference_id.trim().is_empty() {
        return Err(DividendError::InvalidReference(
            "reference id is empty".to_string(),
        ));
    }
    if reference_id.len() > MAX_REFERENCE_ID_LEN {
        return Err(DividendError::InvalidReference(format!(
            "reference id longer than {MAX_REFERENCE_ID_LEN} bytes"
        )));
    }
    Ok(())
}
