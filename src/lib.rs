// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

#![crate_name = "psbt_funder"]

//! # PSBT Funder
//! A library that funds and signs on-chain spends against an external wallet service.
//!
//! Given destinations and amounts it resolves a fee rate, lets the wallet service fund a PSBT
//! from either explicit coins, coins the user picks interactively, or the service's own
//! selection, and has the service sign the result. Dry runs release the coins locked during
//! funding again, so nothing stays reserved.
//!
//! The primary abstraction of the library is the [`PsbtFunder`], which can be retrieved by
//! setting up and configuring a [`Builder`] to your liking and calling [`build`].
//!
//! ## Getting Started
//!
//! ```no_run
//! use psbt_funder::{BitcoindRpcConfig, Builder, FundRequest, TerminalCoinPrompt};
//!
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = Builder::new();
//! builder.set_wallet_service_bitcoind_rpc(BitcoindRpcConfig {
//! 	cookie_file: Some("/home/user/.bitcoin/.cookie".into()),
//! 	..Default::default()
//! });
//! builder.set_coin_prompt(Arc::new(TerminalCoinPrompt::new()));
//! let funder = builder.build()?;
//!
//! let request = FundRequest {
//! 	addresses: vec!["bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".to_string()],
//! 	amounts: vec!["0.001".to_string()],
//! 	is_dry_run: true,
//! 	..Default::default()
//! };
//! let signed = funder.fund_and_sign(&request).await?;
//! println!("{}", signed.signed_transaction);
//! # Ok(())
//! # }
//! ```
//!
//! [`build`]: Builder::build

#![deny(rustdoc::broken_intra_doc_links)]

pub mod amount;
mod builder;
pub mod config;
mod error;
mod funder;
pub mod logger;
pub mod selection;
pub mod service;
pub mod types;
mod validate;

pub use bitcoin;

pub use amount::{AmountParser, BitcoinAmountParser};
pub use builder::{BuildError, Builder};
pub use config::{BitcoindRpcConfig, Config};
pub use error::{
	Error, ErrorKind, Precondition, ServiceError, BAD_REQUEST_CODE, SERVICE_UNAVAILABLE_CODE,
};
pub use funder::PsbtFunder;
pub use logger::{LogLevel, LogRecord, LogWriter};
pub use selection::terminal::TerminalCoinPrompt;
pub use selection::{validate_selection, CoinChoice, CoinPrompt, SelectionCheck, SelectionRejection};
pub use service::bitcoind::BitcoindRpcService;
pub use service::WalletService;
pub use types::{FundRequest, SignedTransaction};
