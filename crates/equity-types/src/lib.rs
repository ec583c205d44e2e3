//! Tokenized-Equity Domain Types
//!
//! This crate defines the records shared by the dividend distribution
//! subsystem and the collaborators around it: company and share-class
//! identifiers, holdings, beneficial ownership, dividends, escrows,
//! snapshots, payments and the events emitted while a dividend moves
//! through its lifecycle.
//!
//! # Key Concepts
//!
//! - **Recipient**: a dividend is paid either to a direct holder address or
//!   to another company's treasury. The two are distinct variants, never an
//!   address with a magic prefix.
//! - **Beneficial ownership**: shares sitting in a custodial account
//!   (escrow, lending pool, exchange book) still belong economically to the
//!   account that parked them there.
//! - **Minor units**: cash amounts are `u128` minor units of a denom, share
//!   counts are `u64`.
//!
//! # Architecture
//!
//! This is a pure types crate with no runtime dependencies. All records
//! implement `Clone`, `Debug`, `Serialize`, `Deserialize`. IDs use the
//! newtype pattern and implement `Display`.

#![deny(unsafe_code)]

mod dividend;
mod errors;
mod events;
mod ids;
mod money;
mod ownership;

pub use dividend::*;
pub use errors::*;
pub use events::*;
pub use ids::*;
pub use money::*;
pub use ownership::*;
