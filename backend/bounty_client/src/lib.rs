//! # Bounty Client
//!
//! Client-side core of a Polkadot bounties dashboard:
//!
//! | Concern               | Module                       |
//! |-----------------------|------------------------------|
//! | Token amounts         | [`amount`]                   |
//! | Submitted operations  | [`ledger`]                   |
//! | Chain submission      | [`chain`], [`submission`]    |
//! | Live bounty changes   | [`events`], [`watcher`]      |
//! | Node access           | [`rpc`]                      |
//!
//! Bounty lifecycle rules, balances and consensus live in the chain's
//! runtime. This crate only converts input, submits extrinsics, and keeps
//! an in-memory view of what happened during the session.

pub mod amount;
pub mod chain;
pub mod config;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod notify;
pub mod rpc;
pub mod submission;
pub mod watcher;

#[cfg(test)]
mod test_submission_flow;

pub use amount::{format_planck, to_planck, InvalidAmount, Planck};
pub use errors::{ClientError, Result};
pub use ledger::{TransactionId, TransactionKind, TransactionLedger, TransactionStatus};
