// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Keyward Ledger - transaction tracking and account keys
//!
//! - [`TransactionStateManager`] and [`Watcher`] follow submitted
//!   transactions to a final status
//! - [`KeyRegistrar`] adds and revokes account keys with local weight checks
//! - [`WalletSession`] wires these to the current signing provider

#![forbid(unsafe_code)]

pub mod account;
pub mod client;
pub mod error;
pub mod login;
pub mod manager;
pub mod memory;
pub mod registration;
pub mod session;
pub mod state;
pub mod watcher;

pub use account::{Account, AccountKey, KeyPolicy};
pub use client::{AccountRegistry, LedgerClient};
pub use error::{LedgerError, Result};
pub use manager::{ListenerHandle, TransactionManagerConfig, TransactionStateManager};
pub use registration::{KeyRegistrar, Submission};
pub use session::{SessionConfig, WalletSession};
pub use state::{TransactionResult, TransactionState, TransactionStatus, TransactionType};
pub use watcher::{WatchHandle, WatchOutcome, Watcher, WatcherConfig};
