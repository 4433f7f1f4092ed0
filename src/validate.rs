// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! Request preconditions, checked before anything is asked of the wallet service.

use bitcoin::{FeeRate, OutPoint};
use regex::Regex;
use serde_json::Value;

use std::sync::OnceLock;

use crate::error::{Error, Precondition};
use crate::types::{parse_outpoint, FundRequest};

// A hex encoded compressed public key, which is never a valid address.
const PUBLIC_KEY_PATTERN: &str = "^0[2-3][0-9A-Fa-f]{64}$";

fn public_key_regex() -> &'static Regex {
	static PUBLIC_KEY_REGEX: OnceLock<Regex> = OnceLock::new();
	PUBLIC_KEY_REGEX.get_or_init(|| Regex::new(PUBLIC_KEY_PATTERN).expect("valid pattern"))
}

/// A request that passed every precondition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedRequest {
	pub addresses: Vec<String>,
	pub amounts: Vec<String>,
	pub coins: Vec<OutPoint>,
	pub fee_rate: Option<FeeRate>,
	pub is_dry_run: bool,
	pub is_selecting_coins: bool,
}

/// Checks `request` and the availability of the capabilities it needs, handing the
/// capabilities back once everything holds.
///
/// Has no side effects, so calling it again on the same input fails the same way.
pub(crate) fn validate_request<'a, S: ?Sized, P: ?Sized>(
	request: &FundRequest, wallet_service: Option<&'a S>, coin_prompt: Option<&'a P>,
) -> Result<(ValidatedRequest, &'a S, &'a P), Error> {
	let wallet_service =
		wallet_service.ok_or(Error::PreconditionFailed(Precondition::ExpectedWalletService))?;

	if request.addresses.is_empty() {
		return Err(Error::PreconditionFailed(Precondition::ExpectedAddressesToSendFundsTo));
	}

	if request.addresses.len() != request.amounts.len() {
		return Err(Error::PreconditionFailed(Precondition::ExpectedAmountsForEveryAddress));
	}

	if request.addresses.iter().any(|address| public_key_regex().is_match(address)) {
		return Err(Error::PreconditionFailed(Precondition::ExpectedAddressNotPublicKey));
	}

	let coin_prompt =
		coin_prompt.ok_or(Error::PreconditionFailed(Precondition::ExpectedCoinPrompt))?;

	let coins = request
		.coins
		.iter()
		.map(|coin| parse_outpoint(coin))
		.collect::<Option<Vec<_>>>()
		.ok_or(Error::PreconditionFailed(Precondition::ExpectedValidOutpoints))?;

	if !coins.is_empty() && request.is_selecting_coins {
		return Err(Error::PreconditionFailed(Precondition::ExpectedEitherCoinsOrCoinSelection));
	}

	let fee_rate = match request.fee_rate {
		Some(sat_per_vb) => Some(
			FeeRate::from_sat_per_vb(sat_per_vb)
				.filter(|fee_rate| *fee_rate > FeeRate::ZERO)
				.ok_or(Error::PreconditionFailed(Precondition::ExpectedValidFeeRate))?,
		),
		None => None,
	};

	let validated = ValidatedRequest {
		addresses: request.addresses.clone(),
		amounts: request.amounts.clone(),
		coins,
		fee_rate,
		is_dry_run: request.is_dry_run,
		is_selecting_coins: request.is_selecting_coins,
	};
	Ok((validated, wallet_service, coin_prompt))
}

impl FundRequest {
	/// Reads a request from loosely typed JSON, rejecting fields of the wrong shape with the
	/// matching [`Precondition`].
	///
	/// `addresses` and `amounts` must be arrays of strings. `coins` may be absent or an array of
	/// strings, `fee_rate` absent or a non-negative integer, and the flags absent or booleans.
	pub fn from_json_value(value: &Value) -> Result<Self, Error> {
		let amounts = string_array(value.get("amounts"))
			.ok_or(Error::PreconditionFailed(Precondition::ExpectedArrayOfAmounts))?;
		let addresses = string_array(value.get("addresses"))
			.ok_or(Error::PreconditionFailed(Precondition::ExpectedArrayOfAddresses))?;

		let coins = match value.get("coins") {
			None | Some(Value::Null) => Vec::new(),
			coins => string_array(coins)
				.ok_or(Error::PreconditionFailed(Precondition::ExpectedValidOutpoints))?,
		};

		let fee_rate = match value.get("fee_rate") {
			None | Some(Value::Null) => None,
			Some(fee_rate) => Some(
				fee_rate
					.as_u64()
					.ok_or(Error::PreconditionFailed(Precondition::ExpectedValidFeeRate))?,
			),
		};

		Ok(Self {
			addresses,
			amounts,
			coins,
			fee_rate,
			is_dry_run: flag(value, "is_dry_run"),
			is_selecting_coins: flag(value, "is_selecting_coins"),
		})
	}
}

fn string_array(value: Option<&Value>) -> Option<Vec<String>> {
	value?.as_array()?.iter().map(|entry| entry.as_str().map(str::to_string)).collect()
}

fn flag(value: &Value, name: &str) -> bool {
	value.get(name).and_then(Value::as_bool).unwrap_or(false)
}
