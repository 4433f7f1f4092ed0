// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

use bitcoin::hex::FromHex;
use bitcoin::psbt::Psbt;
use bitcoin::{Amount, OutPoint, Transaction, Txid};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// The largest output index accepted in a textual outpoint.
pub const MAX_OUTPOINT_INDEX: u32 = 999_999;

/// A request to fund and sign a transaction.
///
/// `addresses` and `amounts` are paired by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundRequest {
	/// The destinations to pay.
	pub addresses: Vec<String>,
	/// The amount paid to the address at the same position.
	pub amounts: Vec<String>,
	/// Coins to spend, as `<txid>:<vout>`. Leave empty to let the service pick.
	pub coins: Vec<String>,
	/// The fee rate in sat/vB. Estimated by the service when not set.
	pub fee_rate: Option<u64>,
	/// Fund and sign, but release the coins again instead of reserving them.
	pub is_dry_run: bool,
	/// Ask the user which coins to spend.
	pub is_selecting_coins: bool,
}

/// A destination of the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
	pub address: String,
	pub amount: Amount,
}

/// An unspent coin of the wallet, as enumerated by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utxo {
	pub outpoint: OutPoint,
	pub value: Amount,
}

/// A coin the service must spend when funding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingInput {
	pub transaction_id: Txid,
	pub transaction_vout: u32,
}

impl From<OutPoint> for FundingInput {
	fn from(outpoint: OutPoint) -> Self {
		Self { transaction_id: outpoint.txid, transaction_vout: outpoint.vout }
	}
}

/// Identifies a coin lock held by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockId(pub [u8; 32]);

impl fmt::Display for LockId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for byte in self.0.iter() {
			write!(f, "{:02x}", byte)?;
		}
		Ok(())
	}
}

impl FromStr for LockId {
	type Err = bitcoin::hex::HexToArrayError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(<[u8; 32]>::from_hex(s)?))
	}
}

/// An input of a funded transaction together with the lock the service took on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundedInput {
	pub outpoint: OutPoint,
	/// `None` when the service locks coins by outpoint alone.
	pub lock_id: Option<LockId>,
}

/// An output of a funded transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundedOutput {
	pub address: String,
	pub amount: Amount,
	pub is_change: bool,
}

/// A funded but unsigned transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct FundedTransaction {
	pub psbt: Psbt,
	pub inputs: Vec<FundedInput>,
	pub outputs: Vec<FundedOutput>,
}

impl FundedTransaction {
	/// The change output, if the service added one.
	pub fn change(&self) -> Option<&FundedOutput> {
		self.outputs.iter().find(|output| output.is_change)
	}

	/// The sum of all outputs, change included.
	pub fn total_output_amount(&self) -> Amount {
		self.outputs.iter().map(|output| output.amount).sum()
	}
}

/// The result of a successful run: the fully signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
	/// The consensus-encoded transaction, hex.
	pub signed_transaction: String,
}

impl SignedTransaction {
	pub fn from_transaction(transaction: &Transaction) -> Self {
		Self { signed_transaction: bitcoin::consensus::encode::serialize_hex(transaction) }
	}
}

/// Parses an outpoint in its canonical `<txid>:<vout>` form.
///
/// The txid is 64 hex characters in either case, the index a decimal number no larger than
/// [`MAX_OUTPOINT_INDEX`].
pub fn parse_outpoint(s: &str) -> Option<OutPoint> {
	let (hash, index) = s.split_once(':')?;

	if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
		return None;
	}
	if index.is_empty() || index.len() > 6 || !index.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}

	let vout: u32 = index.parse().ok()?;
	if vout > MAX_OUTPOINT_INDEX {
		return None;
	}
	let txid = Txid::from_str(&hash.to_ascii_lowercase()).ok()?;
	Some(OutPoint { txid, vout })
}

/// Formats an outpoint in its canonical `<txid>:<vout>` form.
pub fn format_outpoint(outpoint: &OutPoint) -> String {
	format!("{}:{}", outpoint.txid, outpoint.vout)
}
