// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! The wallet service a [`PsbtFunder`] funds, signs and unlocks coins with.
//!
//! [`PsbtFunder`]: crate::PsbtFunder

pub mod bitcoind;

use bitcoin::psbt::Psbt;
use bitcoin::{FeeRate, OutPoint, Transaction};

use std::future::Future;
use std::pin::Pin;

use crate::error::ServiceError;
use crate::types::{FundedTransaction, FundingInput, LockId, Output, Utxo};

/// The future returned by every [`WalletService`] method.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

/// The node-side capabilities the funding workflow depends on.
///
/// Implementations own the coin locks: [`WalletService::fund_psbt`] takes them and they stay
/// held until [`WalletService::unlock_utxo`] releases them or the transaction is spent.
pub trait WalletService: Send + Sync {
	/// Returns the fee rate suggested for an on-chain payment.
	fn estimate_fee_rate<'a>(&'a self) -> ServiceFuture<'a, FeeRate>;

	/// Lists unspent coins with at least `min_confirmations` confirmations.
	fn list_confirmed_utxos<'a>(&'a self, min_confirmations: u32) -> ServiceFuture<'a, Vec<Utxo>>;

	/// Builds a transaction paying `outputs` at `fee_rate` and locks the coins it spends.
	///
	/// `inputs` is `None` to let the service select coins itself, otherwise exactly those
	/// coins are spent.
	fn fund_psbt<'a>(
		&'a self, outputs: &'a [Output], inputs: Option<&'a [FundingInput]>, fee_rate: FeeRate,
	) -> ServiceFuture<'a, FundedTransaction>;

	/// Signs and finalizes a funded transaction.
	fn sign_psbt<'a>(&'a self, psbt: Psbt) -> ServiceFuture<'a, Transaction>;

	/// Releases the lock held on `outpoint`.
	fn unlock_utxo<'a>(
		&'a self, lock_id: Option<LockId>, outpoint: OutPoint,
	) -> ServiceFuture<'a, ()>;
}
