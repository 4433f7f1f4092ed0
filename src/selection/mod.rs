// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! Interactive coin selection.
//!
//! The user is shown every confirmed coin of the wallet and picks the ones to spend. Each
//! candidate selection is checked against the requested outputs by [`SelectionCheck`], which
//! is independent of how the choices are presented.

pub mod terminal;

use bitcoin::{Amount, OutPoint};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::amount::format_btc;
use crate::types::{format_outpoint, Utxo};
use crate::Error;

/// Why a candidate selection was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRejection {
	/// No coin was selected.
	NothingSelected,
	/// The selected coins fall short of the requested total by this amount.
	Shortfall(Amount),
}

impl fmt::Display for SelectionRejection {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::NothingSelected => write!(f, "Select at least one coin to spend"),
			Self::Shortfall(missing) => {
				write!(f, "Selected coins are short by {} BTC", format_btc(*missing))
			},
		}
	}
}

/// Checks whether coins worth `selected` cover `total_requested`.
pub fn validate_selection(
	total_requested: Amount, selected: &[Amount],
) -> Result<(), SelectionRejection> {
	if selected.is_empty() {
		return Err(SelectionRejection::NothingSelected);
	}

	// A total past `Amount::MAX` covers any request.
	match selected.iter().try_fold(Amount::ZERO, |total, value| total.checked_add(*value)) {
		Some(selected_total) if selected_total < total_requested => {
			Err(SelectionRejection::Shortfall(total_requested - selected_total))
		},
		_ => Ok(()),
	}
}

/// The sufficiency predicate handed to a [`CoinPrompt`].
///
/// Knows the requested total and the value of every offered coin, so a prompt can re-check
/// the selection each time it changes.
#[derive(Debug, Clone)]
pub struct SelectionCheck {
	requested: Amount,
	values: HashMap<OutPoint, Amount>,
}

impl SelectionCheck {
	pub fn new(requested: Amount, utxos: &[Utxo]) -> Self {
		let values = utxos.iter().map(|utxo| (utxo.outpoint, utxo.value)).collect();
		Self { requested, values }
	}

	/// The total of all requested outputs.
	pub fn requested(&self) -> Amount {
		self.requested
	}

	/// The total value of `selected`. Coins that were not offered count as zero and a coin
	/// listed more than once counts once.
	pub fn selected_total(&self, selected: &[OutPoint]) -> Amount {
		distinct(selected)
			.iter()
			.filter_map(|outpoint| self.values.get(outpoint))
			.try_fold(Amount::ZERO, |total, value| total.checked_add(*value))
			.unwrap_or(Amount::MAX)
	}

	pub fn check(&self, selected: &[OutPoint]) -> Result<(), SelectionRejection> {
		let values: Vec<Amount> = distinct(selected)
			.iter()
			.map(|outpoint| self.values.get(outpoint).copied().unwrap_or(Amount::ZERO))
			.collect();
		validate_selection(self.requested, &values)
	}
}

// Drops repeated outpoints, keeping the first occurrence of each.
fn distinct(selected: &[OutPoint]) -> Vec<OutPoint> {
	let mut seen = HashSet::with_capacity(selected.len());
	selected.iter().copied().filter(|outpoint| seen.insert(*outpoint)).collect()
}

/// A coin offered for selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinChoice {
	/// What the user sees: the amount followed by the outpoint.
	pub name: String,
	pub outpoint: OutPoint,
	pub value: Amount,
}

impl From<&Utxo> for CoinChoice {
	fn from(utxo: &Utxo) -> Self {
		Self {
			name: format!("{} {}", format_btc(utxo.value), format_outpoint(&utxo.outpoint)),
			outpoint: utxo.outpoint,
			value: utxo.value,
		}
	}
}

/// The future returned by [`CoinPrompt::select_coins`].
pub type PromptFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<OutPoint>, String>> + Send + 'a>>;

/// Asks the user to pick coins.
///
/// Implementations present `choices` as a multi-select that does not wrap around, and accept
/// a selection only once `check` passes for it.
pub trait CoinPrompt: Send + Sync {
	/// Returns the chosen outpoints, or a message if the prompt failed or was aborted.
	fn select_coins<'a>(&'a self, choices: Vec<CoinChoice>, check: SelectionCheck)
		-> PromptFuture<'a>;
}

/// Lets the user choose among `utxos` enough coins to pay outputs totalling `requested`.
///
/// Each chosen coin is returned once, in the order the prompt first named it.
pub(crate) async fn prompt_for_coins(
	prompt: &dyn CoinPrompt, requested: Amount, utxos: &[Utxo],
) -> Result<Vec<OutPoint>, Error> {
	let check = SelectionCheck::new(requested, utxos);
	let choices = utxos.iter().map(CoinChoice::from).collect();

	let selected =
		prompt.select_coins(choices, check.clone()).await.map_err(Error::CoinSelectionFailed)?;
	let selected = distinct(&selected);

	// The prompt's acceptance is not trusted.
	check.check(&selected).map_err(|_| Error::InsufficientFunds {
		requested,
		selected: check.selected_total(&selected),
	})?;

	Ok(selected)
}
