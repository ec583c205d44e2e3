//! Shared fixture: one paying company (Acme, id 1) with a funded treasury,
//! governance, an escrow custodian and a second company (Globex, id 2).

#![allow(dead_code)]

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use equity_dividends::{
    BlockContext, DividendConfig, DividendKeeper, EquityRegistry, InMemoryCollaborators,
    MemoryKvStore,
};
use equity_types::{
    Address, AuditDocument, CompanyId, CompanyInfo, Denom, DividendId, DividendTerms,
    DividendType, ProposalId, ReferenceType, ShareClassId,
};

pub type Keeper = DividendKeeper<MemoryKvStore, InMemoryCollaborators>;

pub const ACME: CompanyId = CompanyId(1);
pub const GLOBEX: CompanyId = CompanyId(2);

pub fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

pub fn uusd() -> Denom {
    Denom::parse("uusd").unwrap()
}

pub fn common() -> ShareClassId {
    ShareClassId::new("COMMON")
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

/// Context `days` after t0.
pub fn at(caller: &str, days: i64) -> BlockContext {
    BlockContext::new(addr(caller), t0() + Duration::days(days))
}

pub fn gov(days: i64) -> BlockContext {
    at("gov_authority", days)
}

pub fn owner(days: i64) -> BlockContext {
    at("acme_owner", days)
}

pub fn keeper_with(config: DividendConfig, treasury: u128) -> Keeper {
    let mut c = InMemoryCollaborators::new(config.module_account.clone(), addr("community_pool"));
    c.add_company(CompanyInfo {
        id: ACME,
        name: "Acme Corp".into(),
        owner: addr("acme_owner"),
        treasury_address: addr("acme_treasury"),
    });
    c.add_company(CompanyInfo {
        id: GLOBEX,
        name: "Globex".into(),
        owner: addr("globex_owner"),
        treasury_address: addr("globex_treasury"),
    });
    c.fund_treasury(ACME, &uusd(), treasury);

    let mut keeper = DividendKeeper::new(config, MemoryKvStore::new(), c).unwrap();
    keeper
        .register_custodian(
            &gov(0),
            addr("escrow_module"),
            BTreeSet::from([ReferenceType::Escrow]),
        )
        .unwrap();
    keeper
}

pub fn keeper(treasury: u128) -> Keeper {
    keeper_with(DividendConfig::default(), treasury)
}

pub fn hold(keeper: &mut Keeper, owner: &str, shares: u64) {
    keeper
        .collaborators_mut()
        .set_holding(ACME, common(), addr(owner), shares);
}

/// Park `shares` of `owner` in the escrow custodian.
pub fn escrow_for(keeper: &mut Keeper, owner: &str, shares: u64) {
    let custodial = addr("escrow_module");
    let current = keeper
        .collaborators()
        .shareholdings(ACME, Some(&common()))
        .into_iter()
        .find(|h| h.owner == custodial)
        .map_or(0, |h| h.shares);
    keeper
        .collaborators_mut()
        .set_holding(ACME, common(), custodial.clone(), current + shares);
    keeper
        .register_beneficial_owner(
            &at("escrow_module", 0),
            custodial,
            ACME,
            common(),
            addr(owner),
            shares,
            format!("agreement-{owner}"),
            ReferenceType::Escrow,
        )
        .unwrap();
}

/// Cash terms: record date t0+7, payment date t0+10.
pub fn cash_terms(amount_per_share: u128, hash_seed: &str) -> DividendTerms {
    DividendTerms {
        company_id: ACME,
        class_id: Some(common()),
        dividend_type: DividendType::Cash,
        denom: uusd(),
        amount_per_share,
        stock_ratio: None,
        ex_dividend_date: t0() + Duration::days(6),
        record_date: t0() + Duration::days(7),
        payment_date: t0() + Duration::days(10),
        description: "Quarterly dividend".into(),
        audit: AuditDocument {
            auditor: "Grant Thornton".into(),
            content_hash: hash_seed.repeat(64 / hash_seed.len()),
            report_date: t0() - Duration::days(45),
            document_uri: "ipfs://audit-report".into(),
        },
    }
}

/// Declare, approve and snapshot; returns the dividend ready for payment
/// at day 10.
pub fn recorded(keeper: &mut Keeper, terms: DividendTerms) -> DividendId {
    let id = keeper.declare_dividend(&owner(1), terms).unwrap();
    keeper
        .approve_dividend_distribution(&gov(2), id, ProposalId(id.value()))
        .unwrap();
    keeper.create_record_snapshot(&at("keeper_bot", 7), id).unwrap();
    id
}
