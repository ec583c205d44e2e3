//! Custodian capability table
//!
//! Escrow, lending and exchange modules register the accounts they hold
//! shares in, together with the reference types they are allowed to record.
//! The recipient resolver sees through exactly these accounts, and only
//! these accounts may write beneficial-ownership records.

use std::collections::BTreeSet;

use equity_types::{Address, ReferenceType};
use tracing::info;

use crate::collaborators::Collaborators;
use crate::error::{DividendError, DividendResult};
use crate::keeper::{BlockContext, DividendKeeper};
use crate::store::KvStore;

impl<S, C> DividendKeeper<S, C>
where
    S: KvStore,
    C: Collaborators,
{
    pub(crate) fn do_register_custodian(
        &mut self,
        ctx: &BlockContext,
        account: Address,
        reference_types: BTreeSet<ReferenceType>,
    ) -> DividendResult<()> {
        self.require_governance(ctx)?;
        if reference_types.is_empty() {
            return Err(DividendError::InvalidReference(format!(
                "custodian {account} registered without reference types"
            )));
        }
        if self.config.is_excluded(&account) {
            return Err(DividendError::InvalidReference(format!(
                "excluded address {account} cannot act as custodian"
            )));
        }

        self.store.put_custodian(&account, &reference_types)?;

        info!(
            account = %account,
            reference_types = ?reference_types,
            "Custodial account registered"
        );
        Ok(())
    }

    /// Fail unless `account` is registered for `reference_type`.
    pub(crate) fn require_custodian(
        &self,
        account: &Address,
        reference_type: ReferenceType,
    ) -> DividendResult<()> {
        let allowed = self
            .store
            .custodian(account)?
            .is_some_and(|types| types.contains(&reference_type));
        if !allowed {
            return Err(DividendError::UnregisteredCustodian {
                account: account.to_string(),
                reference_type: reference_type.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DividendConfig;
    use crate::memory::InMemoryCollaborators;
    use crate::store::MemoryKvStore;
    use chrono::Utc;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn keeper() -> DividendKeeper<MemoryKvStore, InMemoryCollaborators> {
        let config = DividendConfig::default();
        let collaborators =
            InMemoryCollaborators::new(config.module_account.clone(), addr("community_pool"));
        DividendKeeper::new(config, MemoryKvStore::new(), collaborators).unwrap()
    }

    #[test]
    fn only_governance_registers_custodians() {
        let mut keeper = keeper();
        let ctx = BlockContext::new(addr("mallory"), Utc::now());
        let result =
            keeper.register_custodian(&ctx, addr("escrow"), BTreeSet::from([ReferenceType::Escrow]));
        assert!(matches!(result, Err(DividendError::Unauthorized(_))));
    }

    #[test]
    fn capabilities_gate_reference_types() {
        let mut keeper = keeper();
        let ctx = BlockContext::new(addr("gov_authority"), Utc::now());
        keeper
            .register_custodian(&ctx, addr("lending_pool"), BTreeSet::from([ReferenceType::Lending]))
            .unwrap();

        assert!(keeper
            .require_custodian(&addr("lending_pool"), ReferenceType::Lending)
            .is_ok());
        assert!(matches!(
            keeper.require_custodian(&addr("lending_pool"), ReferenceType::Dex),
            Err(DividendError::UnregisteredCustodian { .. })
        ));
        assert!(keeper
            .require_custodian(&addr("unknown"), ReferenceType::Escrow)
            .is_err());
    }

    #[test]
    fn module_account_cannot_be_custodian() {
        let mut keeper = keeper();
        let ctx = BlockContext::new(addr("gov_authority"), Utc::now());
        let module = keeper.config().module_account.clone();
        assert!(keeper
            .register_custodian(&ctx, module, BTreeSet::from([ReferenceType::Escrow]))
            .is_err());
    }
}
