//! # equity-dividends
//!
//! Dividend distribution for a tokenized-equity ledger:
//!
//! - **Beneficial ownership**: custodial modules (escrow, lending, exchange)
//!   record who economically owns the shares they hold, so dividends reach
//!   the owner and not the custodian
//! - **Lifecycle**: declaration with escrowed treasury funds, governance
//!   approval or rejection, record-date snapshot, payment, cancellation
//! - **Payment processing**: resumable bounded batches plus a pull-based
//!   claim, with blacklist redirection and cross-company treasury settlement
//!
//! ## Guarantees
//!
//! - At most one payment record per (dividend, recipient).
//! - Paid amount never exceeds the dividend total.
//! - The snapshot is taken once and its shares sum to the eligible shares.
//! - An escrow settles once, as either distributed or returned.
//! - A company never receives a dividend from itself.
//! - Nothing is paid while the attached audit is unverified.
//!
//! ## Invocation model
//!
//! [`DividendKeeper`] is driven one call at a time by the host. Each public
//! state-changing call commits all of its writes or none of them; external
//! subsystems are reached through the traits in [`collaborators`].

pub mod collaborators;
pub mod config;
pub mod custody;
pub mod error;
pub mod escrow;
pub mod keeper;
pub mod lifecycle;
pub mod memory;
pub mod ownership;
pub mod payment;
pub mod resolver;
pub mod sequence;
pub mod snapshot;
pub mod store;
pub mod telemetry;

pub use collaborators::{
    AuditRegistry, BankTransfer, BlacklistRegistry, Collaborators, EquityRegistry, FallbackAction,
    Redirection, TreasuryAccount, TreasuryKeeper,
};
pub use config::{DividendConfig, LoggingConfig};
pub use error::{DividendError, DividendResult, ErrorClass};
pub use keeper::{BlockContext, DividendKeeper};
pub use memory::InMemoryCollaborators;
pub use payment::BatchOutcome;
pub use resolver::{resolve_recipients, total_shares};
pub use sequence::{Sequence, SequenceGenerator};
pub use snapshot::snapshot_digest;
pub use store::{DividendStore, KvStore, MemoryKvStore, OwnershipKey, StoreError, StoreResult};
pub use telemetry::init_tracing;
