// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

use bitcoin::Amount;

use std::fmt;

use crate::amount::format_btc;

/// The HTTP-style code attached to errors caused by the caller's request.
pub const BAD_REQUEST_CODE: u16 = 400;
/// The HTTP-style code attached to errors raised by the wallet service or the prompt.
pub const SERVICE_UNAVAILABLE_CODE: u16 = 503;

/// A request precondition that failed before any side effect took place.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
	/// No wallet service was configured.
	ExpectedWalletService,
	/// The request's amounts were not given as a sequence.
	ExpectedArrayOfAmounts,
	/// The request's addresses were not given as a sequence.
	ExpectedArrayOfAddresses,
	/// The request names no destination address.
	ExpectedAddressesToSendFundsTo,
	/// The addresses and amounts differ in length.
	ExpectedAmountsForEveryAddress,
	/// An address looks like a public key.
	ExpectedAddressNotPublicKey,
	/// No coin selection prompt was configured.
	ExpectedCoinPrompt,
	/// The explicit coin list is not a sequence of `<txid>:<vout>` strings.
	ExpectedValidOutpoints,
	/// Both explicit coins and interactive coin selection were requested.
	ExpectedEitherCoinsOrCoinSelection,
	/// The explicit fee rate is zero or not a representable sat/vB value.
	ExpectedValidFeeRate,
}

impl Precondition {
	/// The stable, machine-checkable code of this precondition.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::ExpectedWalletService => "ExpectedWalletServiceToFundTransaction",
			Self::ExpectedArrayOfAmounts => "ExpectedArrayOfAmountsToFundTransaction",
			Self::ExpectedArrayOfAddresses => "ExpectedArrayOfAddressesToFundTransaction",
			Self::ExpectedAddressesToSendFundsTo => "ExpectedAddressesToSendFundsTo",
			Self::ExpectedAmountsForEveryAddress => "ExpectedAmountsForEveryAddress",
			Self::ExpectedAddressNotPublicKey => "ExpectedAddressNotPublicKey",
			Self::ExpectedCoinPrompt => "ExpectedCoinPromptToFundTransaction",
			Self::ExpectedValidOutpoints => "ExpectedArrayOfValidOutpointsToFundTransaction",
			Self::ExpectedEitherCoinsOrCoinSelection => "CannotUseBothCoinsAndCoinSelection",
			Self::ExpectedValidFeeRate => "ExpectedValidFeeRateToFundTransaction",
		}
	}
}

impl fmt::Display for Precondition {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// An error reported by the external wallet service, passed through unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceError {
	/// The service's own error code, if it reported one.
	pub code: Option<i64>,
	/// The service's error message.
	pub message: String,
}

impl ServiceError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { code: None, message: message.into() }
	}

	pub fn with_code(code: i64, message: impl Into<String>) -> Self {
		Self { code: Some(code), message: message.into() }
	}
}

impl fmt::Display for ServiceError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.code {
			Some(code) => write!(f, "{} (code {})", self.message, code),
			None => f.write_str(&self.message),
		}
	}
}

impl std::error::Error for ServiceError {}

/// The broad class an [`Error`] belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	/// The request was rejected before any side effect.
	Precondition,
	/// An amount string could not be parsed.
	AmountParse,
	/// The selected coins do not cover the requested outputs.
	InsufficientFunds,
	/// An output is below the dust limit.
	DustOutput,
	/// The wallet service or the selection prompt failed.
	ExternalService,
	/// The wallet has no confirmed coins to choose from.
	EmptyWallet,
}

/// An error that possibly needs to be handled by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
	/// The request failed validation.
	PreconditionFailed(Precondition),
	/// An amount string could not be parsed.
	InvalidAmount {
		/// The amount string as given.
		amount: String,
		/// The parser's message.
		message: String,
	},
	/// The selected coins do not cover the requested outputs.
	InsufficientFunds {
		/// The total of all requested outputs.
		requested: Amount,
		/// The total of the selected coins.
		selected: Amount,
	},
	/// An output is below the dust limit.
	DustOutput {
		/// The destination of the offending output.
		address: String,
		/// The offending amount.
		amount: Amount,
		/// The configured dust limit.
		dust_limit: Amount,
	},
	/// Interactive selection was requested but the wallet has no confirmed coins.
	NoConfirmedCoins,
	/// The service failed to provide a fee rate.
	FeeRateEstimationFailed(ServiceError),
	/// The service failed to list unspent coins.
	UtxoListingFailed(ServiceError),
	/// The service failed to fund the transaction.
	FundingFailed(ServiceError),
	/// The service failed to sign the funded transaction.
	SigningFailed(ServiceError),
	/// The service failed to release a coin lock.
	UnlockFailed(ServiceError),
	/// The coin selection prompt failed or was aborted.
	CoinSelectionFailed(String),
}

impl Error {
	/// Returns the class of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::PreconditionFailed(_) => ErrorKind::Precondition,
			Self::InvalidAmount { .. } => ErrorKind::AmountParse,
			Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
			Self::DustOutput { .. } => ErrorKind::DustOutput,
			Self::NoConfirmedCoins => ErrorKind::EmptyWallet,
			Self::FeeRateEstimationFailed(_)
			| Self::UtxoListingFailed(_)
			| Self::FundingFailed(_)
			| Self::SigningFailed(_)
			| Self::UnlockFailed(_)
			| Self::CoinSelectionFailed(_) => ErrorKind::ExternalService,
		}
	}

	/// Returns the HTTP-style code of this error.
	pub fn code(&self) -> u16 {
		match self.kind() {
			ErrorKind::Precondition
			| ErrorKind::AmountParse
			| ErrorKind::InsufficientFunds
			| ErrorKind::DustOutput => BAD_REQUEST_CODE,
			ErrorKind::ExternalService | ErrorKind::EmptyWallet => SERVICE_UNAVAILABLE_CODE,
		}
	}
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Self::PreconditionFailed(ref precondition) => write!(f, "{}", precondition),
			Self::InvalidAmount { ref amount, ref message } => {
				write!(f, "Failed to parse amount '{}': {}", amount, message)
			},
			Self::InsufficientFunds { requested, selected } => write!(
				f,
				"Selected coins total {} BTC but {} BTC is required.",
				format_btc(selected),
				format_btc(requested)
			),
			Self::DustOutput { ref address, amount, dust_limit } => write!(
				f,
				"A non-dust amount is required: {}sats to {} is below the {}sats limit.",
				amount.to_sat(),
				address,
				dust_limit.to_sat()
			),
			Self::NoConfirmedCoins => write!(f, "The wallet has zero confirmed coins."),
			Self::FeeRateEstimationFailed(ref e) => write!(f, "Failed to get a fee rate: {}", e),
			Self::UtxoListingFailed(ref e) => write!(f, "Failed to list unspent coins: {}", e),
			Self::FundingFailed(ref e) => write!(f, "Failed to fund transaction: {}", e),
			Self::SigningFailed(ref e) => write!(f, "Failed to sign transaction: {}", e),
			Self::UnlockFailed(ref e) => write!(f, "Failed to unlock coin: {}", e),
			Self::CoinSelectionFailed(ref message) => {
				write!(f, "Coin selection failed: {}", message)
			},
		}
	}
}

impl std::error::Error for Error {}
