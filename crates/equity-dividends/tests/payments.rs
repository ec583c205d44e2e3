//! Payment processing: batches, claims, settlement variants.

mod support;

use equity_dividends::{BankTransfer, DividendConfig, DividendError, EquityRegistry, TreasuryKeeper};
use equity_types::{
    DividendEvent, DividendStatus, DividendType, PaymentStatus, ProposalId, Recipient, StockRatio,
};
use support::*;

fn five_holders(keeper: &mut Keeper) {
    for (name, shares) in [("h1", 10), ("h2", 20), ("h3", 30), ("h4", 40), ("h5", 50)] {
        hold(keeper, name, shares);
    }
}

#[test]
fn batches_resume_from_cursor() {
    let mut keeper = keeper(100_000);
    five_holders(&mut keeper);
    let id = recorded(&mut keeper, cash_terms(3, "11"));

    let first = keeper.process_payments(&at("keeper_bot", 10), id, 2).unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(first.status, DividendStatus::Processing);
    assert_eq!(keeper.dividend(id).unwrap().batch_cursor, 2);

    let second = keeper.process_payments(&at("keeper_bot", 10), id, 2).unwrap();
    assert_eq!(second.shareholders_paid, 4);

    let last = keeper.process_payments(&at("keeper_bot", 11), id, 2).unwrap();
    assert_eq!(last.processed, 1);
    assert!(last.is_complete());

    let dividend = keeper.dividend(id).unwrap();
    assert_eq!(dividend.paid_amount, 450);
    assert_eq!(dividend.remaining_amount, 0);
    assert_eq!(keeper.payments(id).unwrap().len(), 5);
    assert_eq!(keeper.collaborators().module_balance(&uusd()), 0);
}

#[test]
fn paid_dividend_rejects_further_batches() {
    let mut keeper = keeper(100_000);
    hold(&mut keeper, "alice", 10);
    let id = recorded(&mut keeper, cash_terms(3, "12"));
    keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();

    assert!(matches!(
        keeper.process_payments(&at("keeper_bot", 11), id, 0),
        Err(DividendError::InvalidTransition { .. })
    ));
    assert_eq!(keeper.collaborators().balance_of(&addr("alice"), &uusd()), 30);
}

#[test]
fn claim_then_batch_skips_claimed_recipient() {
    let mut keeper = keeper(100_000);
    five_holders(&mut keeper);
    let id = recorded(&mut keeper, cash_terms(1, "13"));

    let payment = keeper
        .claim_dividend(&at("h3", 10), id, Recipient::DirectHolder(addr("h3")))
        .unwrap();
    assert_eq!(payment.net, 30);
    assert_eq!(keeper.dividend(id).unwrap().status, DividendStatus::Processing);

    let outcome = keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();
    assert_eq!(outcome.processed, 4);
    assert!(outcome.is_complete());
    assert_eq!(keeper.collaborators().balance_of(&addr("h3"), &uusd()), 30);
    assert_eq!(keeper.dividend(id).unwrap().paid_amount, 150);
}

#[test]
fn claim_guards() {
    let mut keeper = keeper(100_000);
    hold(&mut keeper, "alice", 10);
    hold(&mut keeper, "bob", 10);
    let id = recorded(&mut keeper, cash_terms(1, "14"));

    assert!(matches!(
        keeper.claim_dividend(&at("bob", 10), id, Recipient::DirectHolder(addr("alice"))),
        Err(DividendError::Unauthorized(_))
    ));
    assert!(matches!(
        keeper.claim_dividend(&at("mallory", 10), id, Recipient::DirectHolder(addr("mallory"))),
        Err(DividendError::NotInSnapshot { .. })
    ));

    keeper.process_payments(&at("keeper_bot", 10), id, 1).unwrap();
    assert!(matches!(
        keeper.claim_dividend(&at("alice", 10), id, Recipient::DirectHolder(addr("alice"))),
        Err(DividendError::AlreadyClaimed { .. })
    ));
    assert_eq!(keeper.collaborators().balance_of(&addr("alice"), &uusd()), 10);
}

#[test]
fn treasury_claim_by_company_owner() {
    let mut keeper = keeper(100_000);
    hold(&mut keeper, "alice", 50);
    keeper
        .collaborators_mut()
        .set_investment(GLOBEX, ACME, common(), 50);
    let id = recorded(&mut keeper, cash_terms(4, "15"));

    assert!(keeper
        .claim_dividend(&at("alice", 10), id, Recipient::TreasuryHolder(GLOBEX))
        .is_err());
    let payment = keeper
        .claim_dividend(&at("globex_owner", 10), id, Recipient::TreasuryHolder(GLOBEX))
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::PaidToTreasury);
    assert_eq!(payment.paid_to, Some(addr("globex_treasury")));
    assert_eq!(keeper.collaborators().treasury_balance(GLOBEX, &uusd()), 200);
}

#[test]
fn failed_transfer_does_not_block_batch() {
    let mut keeper = keeper(100_000);
    hold(&mut keeper, "alice", 10);
    hold(&mut keeper, "bob", 20);
    hold(&mut keeper, "carol", 30);
    keeper.collaborators_mut().fail_transfers_to(addr("bob"));
    let id = recorded(&mut keeper, cash_terms(2, "16"));

    let outcome = keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();
    assert!(outcome.is_complete());

    let bob = keeper
        .payment(id, &Recipient::DirectHolder(addr("bob")))
        .unwrap()
        .unwrap();
    assert_eq!(bob.status, PaymentStatus::Failed);
    assert!(bob.reason.is_some());
    assert_eq!(keeper.collaborators().balance_of(&addr("carol"), &uusd()), 60);

    let dividend = keeper.dividend(id).unwrap();
    assert_eq!(dividend.paid_amount, 80);
    assert_eq!(dividend.remaining_amount, 40);
    assert_eq!(keeper.collaborators().module_balance(&uusd()), 40);
}

#[test]
fn paid_event_reports_funds_left_in_custody() {
    let config = DividendConfig {
        withholding_tax_bps: 1_000,
        ..Default::default()
    };
    let mut keeper = keeper_with(config, 100_000);
    hold(&mut keeper, "alice", 100);
    hold(&mut keeper, "bob", 50);
    keeper.collaborators_mut().fail_transfers_to(addr("bob"));
    let id = recorded(&mut keeper, cash_terms(2, "1a"));

    keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();
    let dividend = keeper.dividend(id).unwrap();
    assert_eq!(dividend.status, DividendStatus::Paid);
    assert_eq!((dividend.paid_amount, dividend.tax_withheld), (180, 20));
    assert_eq!(dividend.remaining_amount, 100);

    let retained = keeper.events().iter().find_map(|event| match event {
        DividendEvent::DividendPaid {
            retained_amount, ..
        } => Some(*retained_amount),
        _ => None,
    });
    assert_eq!(retained, Some(120));
    assert_eq!(keeper.collaborators().module_balance(&uusd()), 120);
    assert!(keeper.cancel_dividend(&owner(11), id).is_err());
}

#[test]
fn failed_treasury_credit_rolls_back_transfer() {
    let mut keeper = keeper(100_000);
    hold(&mut keeper, "alice", 10);
    keeper
        .collaborators_mut()
        .set_investment(GLOBEX, ACME, common(), 10);
    keeper.collaborators_mut().fail_treasury_credits(true);
    let id = recorded(&mut keeper, cash_terms(1, "17"));

    keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();
    let payment = keeper
        .payment(id, &Recipient::TreasuryHolder(GLOBEX))
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(
        keeper.collaborators().balance_of(&addr("globex_treasury"), &uusd()),
        0
    );
    assert_eq!(keeper.collaborators().module_balance(&uusd()), 10);
    assert_eq!(
        keeper
            .collaborators()
            .treasury_dividends_received(GLOBEX, ACME, &uusd()),
        0
    );
    // The rest of the batch still settles.
    assert_eq!(keeper.collaborators().balance_of(&addr("alice"), &uusd()), 10);
    assert_eq!(keeper.dividend(id).unwrap().remaining_amount, 10);
}

#[test]
fn mint_fallback_covers_custody_shortfall() {
    let config = DividendConfig {
        allow_mint_fallback: true,
        ..Default::default()
    };
    let mut keeper = keeper_with(config, 100_000);
    hold(&mut keeper, "alice", 100);
    let id = recorded(&mut keeper, cash_terms(1, "18"));

    // Custody drained outside the module's control.
    let module = keeper.collaborators().module_account().clone();
    keeper.collaborators_mut().set_balance(&module, &uusd(), 40);

    keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();
    assert_eq!(keeper.collaborators().minted(&uusd()), 60);
    assert_eq!(keeper.collaborators().balance_of(&addr("alice"), &uusd()), 100);
}

#[test]
fn custody_shortfall_fails_payment_without_mint() {
    let mut keeper = keeper(100_000);
    hold(&mut keeper, "alice", 100);
    let id = recorded(&mut keeper, cash_terms(1, "19"));
    let module = keeper.collaborators().module_account().clone();
    keeper.collaborators_mut().set_balance(&module, &uusd(), 40);

    keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();
    let payment = keeper
        .payment(id, &Recipient::DirectHolder(addr("alice")))
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(keeper.collaborators().minted(&uusd()), 0);
}

#[test]
fn stock_dividend_issues_shares() {
    let mut keeper = keeper(0);
    hold(&mut keeper, "alice", 600);
    hold(&mut keeper, "bob", 45);
    keeper.collaborators_mut().blacklist(ACME, addr("bob"));

    let mut terms = cash_terms(0, "1a");
    terms.dividend_type = DividendType::Stock;
    terms.stock_ratio = Some(StockRatio::new(1, 10).unwrap());
    let id = recorded(&mut keeper, terms);
    assert!(keeper.escrow(id).unwrap().is_none());
    assert_eq!(keeper.dividend(id).unwrap().total_amount, 64);

    keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();
    let alice = keeper
        .collaborators()
        .shareholding(ACME, &common(), &addr("alice"))
        .unwrap();
    assert_eq!(alice.shares, 660);

    let bob = keeper
        .payment(id, &Recipient::DirectHolder(addr("bob")))
        .unwrap()
        .unwrap();
    assert_eq!(bob.status, PaymentStatus::Skipped);
    assert_eq!(
        keeper
            .collaborators()
            .shareholding(ACME, &common(), &addr("bob"))
            .unwrap()
            .shares,
        45
    );
}

#[test]
fn property_dividend_is_recorded_but_not_transferred() {
    let mut keeper = keeper(100_000);
    hold(&mut keeper, "alice", 10);
    let mut terms = cash_terms(5, "1b");
    terms.dividend_type = DividendType::Property;
    let id = recorded(&mut keeper, terms);
    assert!(keeper.escrow(id).unwrap().is_none());

    let outcome = keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();
    assert!(outcome.is_complete());
    let payment = keeper
        .payment(id, &Recipient::DirectHolder(addr("alice")))
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Skipped);
    assert_eq!(payment.reason.as_deref(), Some("property_settled_off_ledger"));
    assert_eq!(keeper.collaborators().balance_of(&addr("alice"), &uusd()), 0);
}

#[test]
fn treasury_recipients_untaxed_unless_configured() {
    let config = DividendConfig {
        withholding_tax_bps: 1_000,
        ..Default::default()
    };
    let mut keeper = keeper_with(config, 100_000);
    hold(&mut keeper, "alice", 100);
    keeper
        .collaborators_mut()
        .set_investment(GLOBEX, ACME, common(), 100);
    let id = recorded(&mut keeper, cash_terms(10, "1c"));
    keeper.process_payments(&at("keeper_bot", 10), id, 0).unwrap();

    let alice = keeper
        .payment(id, &Recipient::DirectHolder(addr("alice")))
        .unwrap()
        .unwrap();
    let globex = keeper
        .payment(id, &Recipient::TreasuryHolder(GLOBEX))
        .unwrap()
        .unwrap();
    assert_eq!((alice.net, alice.tax_withheld), (900, 100));
    assert_eq!((globex.net, globex.tax_withheld), (1_000, 0));
    assert_eq!(keeper.collaborators().module_balance(&uusd()), 100);
}

#[test]
fn cancel_after_partial_payment_refunds_remainder() {
    let mut keeper = keeper(10_000);
    five_holders(&mut keeper);
    let id = recorded(&mut keeper, cash_terms(10, "1d"));
    assert_eq!(keeper.collaborators().treasury_balance(ACME, &uusd()), 8_500);

    keeper.process_payments(&at("keeper_bot", 10), id, 2).unwrap();
    let refunded = keeper.cancel_dividend(&gov(11), id).unwrap();
    assert_eq!(refunded, 1_200);

    let dividend = keeper.dividend(id).unwrap();
    assert_eq!(dividend.status, DividendStatus::Cancelled);
    assert_eq!(dividend.paid_amount, 300);
    assert_eq!(keeper.collaborators().treasury_balance(ACME, &uusd()), 9_700);
    assert_eq!(keeper.collaborators().module_balance(&uusd()), 0);

    assert!(matches!(
        keeper.process_payments(&at("keeper_bot", 12), id, 0),
        Err(DividendError::InvalidTransition { .. })
    ));
    assert!(keeper.cancel_dividend(&gov(12), id).is_err());
}

#[test]
fn cancel_pending_returns_escrow_and_frees_slot() {
    let mut keeper = keeper(10_000);
    hold(&mut keeper, "alice", 100);
    let id = keeper
        .declare_dividend(&owner(1), cash_terms(10, "1e"))
        .unwrap();

    assert!(matches!(
        keeper.cancel_dividend(&at("alice", 1), id),
        Err(DividendError::Unauthorized(_))
    ));
    assert_eq!(keeper.cancel_dividend(&owner(1), id).unwrap(), 1_000);
    assert_eq!(keeper.collaborators().treasury_balance(ACME, &uusd()), 10_000);
    assert!(keeper.pending_dividend(ACME, Some(&common())).unwrap().is_none());

    let next = keeper
        .declare_dividend(&owner(2), cash_terms(10, "1f"))
        .unwrap();
    assert_ne!(next, id);
    keeper
        .approve_dividend_distribution(&gov(2), next, ProposalId(2))
        .unwrap();
}
