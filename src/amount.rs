// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! Amount parsing and display.

use bitcoin::{Amount, Denomination};

use std::str::FromStr;

const SATS_PER_BTC: u64 = 100_000_000;

/// Converts a human amount string into an [`Amount`].
///
/// Errors are reported as the parser's own message, which the funder wraps into
/// [`Error::InvalidAmount`].
///
/// [`Error::InvalidAmount`]: crate::Error::InvalidAmount
pub trait AmountParser: Send + Sync {
	/// Parses `amount` into an integer number of satoshis.
	fn parse_amount(&self, amount: &str) -> Result<Amount, String>;
}

/// Parses bare numbers as bitcoin (`"0.001"`) and numbers with a denomination as that
/// denomination (`"1000 sat"`, `"0.5 BTC"`).
#[derive(Debug, Default, Clone, Copy)]
pub struct BitcoinAmountParser;

impl AmountParser for BitcoinAmountParser {
	fn parse_amount(&self, amount: &str) -> Result<Amount, String> {
		let amount = amount.trim();
		if amount.is_empty() {
			return Err("Expected an amount".to_string());
		}

		let parsed = if amount.contains(char::is_whitespace) {
			Amount::from_str(amount).map_err(|e| e.to_string())
		} else {
			Amount::from_str_in(amount, Denomination::Bitcoin).map_err(|e| e.to_string())
		};
		match parsed? {
			parsed if parsed > Amount::MAX_MONEY => {
				Err(format!("Amount exceeds the {} BTC supply", format_btc(Amount::MAX_MONEY)))
			},
			parsed => Ok(parsed),
		}
	}
}

/// Formats an amount in bitcoin with all eight decimal places, e.g. `0.00100000`.
pub fn format_btc(amount: Amount) -> String {
	let sats = amount.to_sat();
	format!("{}.{:08}", sats / SATS_PER_BTC, sats % SATS_PER_BTC)
}
