//! Recipient resolver
//!
//! Merges direct holdings, custodial beneficial owners and cross-company
//! treasury positions into one ordered recipient set.

use std::collections::BTreeMap;

use equity_types::{Address, CompanyId, Recipient, ShareClassId};
use tracing::debug;

use crate::collaborators::Collaborators;
use crate::config::DividendConfig;
use crate::error::{DividendError, DividendResult};
use crate::store::{DividendStore, KvStore};

/// Economic entitlement of every recipient of `company_id` shares.
///
/// - Holdings of registered custodial accounts are replaced by their
///   beneficial owners, capped at the custodial holding. Unattributed
///   custodial shares earn nothing.
/// - Other companies' treasury positions become [`Recipient::TreasuryHolder`].
///   The paying company never appears as its own recipient.
/// - Excluded addresses and company treasury accounts never receive as
///   direct holders. A treasury earns only through its investment position.
/// - Entries for the same recipient are summed; zero entries are dropped.
pub fn resolve_recipients<S, C>(
    store: &DividendStore<S>,
    collaborators: &C,
    config: &DividendConfig,
    company_id: CompanyId,
    class_id: Option<&ShareClassId>,
) -> DividendResult<BTreeMap<Recipient, u64>>
where
    S: KvStore,
    C: Collaborators,
{
    let company = collaborators
        .company(company_id)
        .ok_or(DividendError::CompanyNotFound(company_id))?;
    let own_treasury = collaborators
        .treasury(company_id)
        .map(|treasury| treasury.address);

    let excluded = |address: &Address| {
        config.is_excluded(address)
            || *address == company.treasury_address
            || own_treasury.as_ref() == Some(address)
            || collaborators.is_treasury_address(address)
    };

    let mut recipients: BTreeMap<Recipient, u64> = BTreeMap::new();
    let mut add = |recipient: Recipient, shares: u64| {
        if shares > 0 {
            let entry = recipients.entry(recipient).or_default();
            *entry = entry.saturating_add(shares);
        }
    };

    for holding in collaborators.shareholdings(company_id, class_id) {
        if store.custodian(&holding.owner)?.is_some() {
            let mut unattributed = holding.shares;
            for record in
                store.ownership_for_module(&holding.owner, company_id, &holding.class_id)?
            {
                let shares = record.shares.min(unattributed);
                unattributed -= shares;
                if excluded(&record.beneficial_owner) {
                    continue;
                }
                add(Recipient::DirectHolder(record.beneficial_owner), shares);
            }
            if unattributed > 0 {
                debug!(
                    custodial_account = %holding.owner,
                    shares = unattributed,
                    "Custodial shares without beneficial owner"
                );
            }
            continue;
        }

        if excluded(&holding.owner) {
            continue;
        }
        add(Recipient::DirectHolder(holding.owner), holding.shares);
    }

    for position in collaborators.investment_holders(company_id, class_id) {
        if position.owner_company == company_id {
            debug!(company_id = %company_id, "Skipping self-held treasury position");
            continue;
        }
        add(Recipient::TreasuryHolder(position.owner_company), position.shares);
    }

    Ok(recipients)
}

/// Sum of shares across a recipient set.
pub fn total_shares(recipients: &BTreeMap<Recipient, u64>) -> u64 {
    recipients
        .values()
        .fold(0u64, |total, shares| total.saturating_add(*shares))
}
