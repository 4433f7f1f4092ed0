// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

#![cfg(test)]
#![allow(dead_code)]

pub(crate) mod logging;

use logging::TestLogWriter;

use psbt_funder::bitcoin::absolute::LockTime;
use psbt_funder::bitcoin::hashes::Hash;
use psbt_funder::bitcoin::psbt::Psbt;
use psbt_funder::bitcoin::transaction::Version;
use psbt_funder::bitcoin::{
	Amount, FeeRate, OutPoint, ScriptBuf, Transaction, TxIn, TxOut, Txid,
};
use psbt_funder::selection::PromptFuture;
use psbt_funder::service::ServiceFuture;
use psbt_funder::types::{
	FundedInput, FundedOutput, FundedTransaction, FundingInput, LockId, Output, Utxo,
};
use psbt_funder::{
	Builder, CoinChoice, CoinPrompt, Config, LogLevel, PsbtFunder, SelectionCheck, ServiceError,
	WalletService,
};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

pub(crate) const DEFAULT_FEE_RATE_SAT_PER_VB: u64 = 5;
pub(crate) const CHANGE_ADDRESS: &str = "bc1qchange";

// What the fake keeps for itself out of every funding.
const FAKE_FEE_SATS: u64 = 1_000;

/// A call the fake wallet service received.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
	EstimateFeeRate,
	ListConfirmedUtxos { min_confirmations: u32 },
	FundPsbt { outputs: Vec<Output>, inputs: Option<Vec<FundingInput>>, fee_rate: FeeRate },
	SignPsbt,
	UnlockUtxo { lock_id: Option<LockId>, outpoint: OutPoint },
}

/// An in-memory [`WalletService`] that records every call.
///
/// Funding spends either the given inputs or, when none are given, the wallet's coins in
/// order until the outputs are covered. Spent coins are locked until unlocked again.
pub(crate) struct FakeWalletService {
	utxos: Vec<Utxo>,
	fee_rate: FeeRate,
	calls: Mutex<Vec<Call>>,
	locked: Mutex<HashSet<OutPoint>>,
	last_funded: Mutex<Option<FundedTransaction>>,
	fee_rate_error: Option<ServiceError>,
	fund_error: Option<ServiceError>,
	sign_error: Option<ServiceError>,
	unlock_error: Option<ServiceError>,
	unlock_delay: Option<Duration>,
	fee_rate_gate: Option<Arc<Notify>>,
}

impl FakeWalletService {
	pub fn new(utxos: Vec<Utxo>) -> Self {
		Self {
			utxos,
			fee_rate: FeeRate::from_sat_per_vb_unchecked(DEFAULT_FEE_RATE_SAT_PER_VB),
			calls: Mutex::new(Vec::new()),
			locked: Mutex::new(HashSet::new()),
			last_funded: Mutex::new(None),
			fee_rate_error: None,
			fund_error: None,
			sign_error: None,
			unlock_error: None,
			unlock_delay: None,
			fee_rate_gate: None,
		}
	}

	pub fn failing_fee_rate(mut self, error: ServiceError) -> Self {
		self.fee_rate_error = Some(error);
		self
	}

	pub fn failing_funding(mut self, error: ServiceError) -> Self {
		self.fund_error = Some(error);
		self
	}

	pub fn failing_signing(mut self, error: ServiceError) -> Self {
		self.sign_error = Some(error);
		self
	}

	pub fn failing_unlock(mut self, error: ServiceError) -> Self {
		self.unlock_error = Some(error);
		self
	}

	/// Takes `delay` to release each lock.
	pub fn slow_unlock(mut self, delay: Duration) -> Self {
		self.unlock_delay = Some(delay);
		self
	}

	/// Holds fee estimation back until `gate` is notified.
	pub fn gated_fee_rate(mut self, gate: Arc<Notify>) -> Self {
		self.fee_rate_gate = Some(gate);
		self
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	pub fn call_count(&self) -> usize {
		self.calls.lock().unwrap().len()
	}

	pub fn fund_calls(&self) -> Vec<Call> {
		self.calls().into_iter().filter(|call| matches!(call, Call::FundPsbt { .. })).collect()
	}

	pub fn unlocked_outpoints(&self) -> Vec<OutPoint> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				Call::UnlockUtxo { outpoint, .. } => Some(outpoint),
				_ => None,
			})
			.collect()
	}

	pub fn was_called(&self, expected: &Call) -> bool {
		self.calls().iter().any(|call| call == expected)
	}

	pub fn locked(&self) -> HashSet<OutPoint> {
		self.locked.lock().unwrap().clone()
	}

	pub fn last_funded(&self) -> Option<FundedTransaction> {
		self.last_funded.lock().unwrap().clone()
	}

	fn record(&self, call: Call) {
		self.calls.lock().unwrap().push(call);
	}

	fn auto_select(&self, requested: Amount) -> Result<Vec<Utxo>, ServiceError> {
		let mut selected = Vec::new();
		let mut total = Amount::ZERO;
		for utxo in self.utxos.iter() {
			if total >= requested + Amount::from_sat(FAKE_FEE_SATS) {
				break;
			}
			total += utxo.value;
			selected.push(*utxo);
		}
		if total < requested + Amount::from_sat(FAKE_FEE_SATS) {
			return Err(ServiceError::with_code(-4, "Insufficient funds"));
		}
		Ok(selected)
	}

	fn build_funded(
		&self, outputs: &[Output], inputs: Option<&[FundingInput]>,
	) -> Result<FundedTransaction, ServiceError> {
		let requested: Amount = outputs.iter().map(|output| output.amount).sum();
		let spent: Vec<Utxo> = match inputs {
			Some(inputs) => inputs
				.iter()
				.map(|input| {
					let outpoint =
						OutPoint { txid: input.transaction_id, vout: input.transaction_vout };
					let value = self
						.utxos
						.iter()
						.find(|utxo| utxo.outpoint == outpoint)
						.map(|utxo| utxo.value)
						.unwrap_or(Amount::ZERO);
					Utxo { outpoint, value }
				})
				.collect(),
			None => self.auto_select(requested)?,
		};

		let mut funded_outputs: Vec<FundedOutput> = outputs
			.iter()
			.map(|output| FundedOutput {
				address: output.address.clone(),
				amount: output.amount,
				is_change: false,
			})
			.collect();
		let spent_total: Amount = spent.iter().map(|utxo| utxo.value).sum();
		if let Some(change) = spent_total.checked_sub(requested + Amount::from_sat(FAKE_FEE_SATS)) {
			if change > Amount::ZERO {
				funded_outputs.push(FundedOutput {
					address: CHANGE_ADDRESS.to_string(),
					amount: change,
					is_change: true,
				});
			}
		}

		let unsigned_tx = Transaction {
			version: Version::TWO,
			lock_time: LockTime::ZERO,
			input: spent
				.iter()
				.map(|utxo| TxIn { previous_output: utxo.outpoint, ..Default::default() })
				.collect(),
			output: funded_outputs
				.iter()
				.map(|output| TxOut { value: output.amount, script_pubkey: ScriptBuf::new() })
				.collect(),
		};
		let psbt = Psbt::from_unsigned_tx(unsigned_tx)
			.map_err(|e| ServiceError::new(format!("Invalid transaction: {}", e)))?;

		Ok(FundedTransaction {
			psbt,
			inputs: spent
				.iter()
				.map(|utxo| FundedInput {
					outpoint: utxo.outpoint,
					lock_id: Some(lock_id_for(&utxo.outpoint)),
				})
				.collect(),
			outputs: funded_outputs,
		})
	}
}

impl WalletService for FakeWalletService {
	fn estimate_fee_rate<'a>(&'a self) -> ServiceFuture<'a, FeeRate> {
		Box::pin(async move {
			self.record(Call::EstimateFeeRate);
			if let Some(gate) = &self.fee_rate_gate {
				gate.notified().await;
			}
			match &self.fee_rate_error {
				Some(error) => Err(error.clone()),
				None => Ok(self.fee_rate),
			}
		})
	}

	fn list_confirmed_utxos<'a>(&'a self, min_confirmations: u32) -> ServiceFuture<'a, Vec<Utxo>> {
		Box::pin(async move {
			self.record(Call::ListConfirmedUtxos { min_confirmations });
			Ok(self.utxos.clone())
		})
	}

	fn fund_psbt<'a>(
		&'a self, outputs: &'a [Output], inputs: Option<&'a [FundingInput]>, fee_rate: FeeRate,
	) -> ServiceFuture<'a, FundedTransaction> {
		Box::pin(async move {
			self.record(Call::FundPsbt {
				outputs: outputs.to_vec(),
				inputs: inputs.map(|inputs| inputs.to_vec()),
				fee_rate,
			});
			if let Some(error) = &self.fund_error {
				return Err(error.clone());
			}

			let funded = self.build_funded(outputs, inputs)?;
			self.locked.lock().unwrap().extend(funded.inputs.iter().map(|input| input.outpoint));
			*self.last_funded.lock().unwrap() = Some(funded.clone());
			Ok(funded)
		})
	}

	fn sign_psbt<'a>(&'a self, psbt: Psbt) -> ServiceFuture<'a, Transaction> {
		Box::pin(async move {
			self.record(Call::SignPsbt);
			match &self.sign_error {
				Some(error) => Err(error.clone()),
				None => Ok(psbt.unsigned_tx),
			}
		})
	}

	fn unlock_utxo<'a>(
		&'a self, lock_id: Option<LockId>, outpoint: OutPoint,
	) -> ServiceFuture<'a, ()> {
		Box::pin(async move {
			self.record(Call::UnlockUtxo { lock_id, outpoint });
			if let Some(delay) = self.unlock_delay {
				tokio::time::sleep(delay).await;
			}
			if let Some(error) = &self.unlock_error {
				return Err(error.clone());
			}
			self.locked.lock().unwrap().remove(&outpoint);
			Ok(())
		})
	}
}

/// What a [`ScriptedCoinPrompt`] answers with.
#[derive(Clone, Debug)]
pub(crate) enum Script {
	/// Returns these coins, whether or not they suffice.
	Select(Vec<OutPoint>),
	/// Returns the fewest leading coins that pass the check.
	SelectEnough,
	/// Fails with this message.
	Fail(String),
	/// Never answers.
	Pending,
}

// Sets the flag when dropped.
struct MarkOnDrop(Arc<AtomicBool>);

impl Drop for MarkOnDrop {
	fn drop(&mut self) {
		self.0.store(true, Ordering::SeqCst);
	}
}

/// A [`CoinPrompt`] that answers from a script and keeps what it was shown.
pub(crate) struct ScriptedCoinPrompt {
	script: Script,
	shown: Mutex<Vec<(Vec<CoinChoice>, SelectionCheck)>>,
	on_prompt: Option<Arc<Notify>>,
	abandoned: Arc<AtomicBool>,
}

impl ScriptedCoinPrompt {
	pub fn new(script: Script) -> Self {
		Self {
			script,
			shown: Mutex::new(Vec::new()),
			on_prompt: None,
			abandoned: Arc::new(AtomicBool::new(false)),
		}
	}

	/// Notifies `notify` whenever the prompt is shown.
	pub fn notifying(mut self, notify: Arc<Notify>) -> Self {
		self.on_prompt = Some(notify);
		self
	}

	pub fn times_shown(&self) -> usize {
		self.shown.lock().unwrap().len()
	}

	pub fn last_shown(&self) -> Option<(Vec<CoinChoice>, SelectionCheck)> {
		self.shown.lock().unwrap().last().cloned()
	}

	/// Whether a [`Script::Pending`] prompt was dropped while still open.
	pub fn was_abandoned(&self) -> bool {
		self.abandoned.load(Ordering::SeqCst)
	}
}

impl CoinPrompt for ScriptedCoinPrompt {
	fn select_coins<'a>(
		&'a self, choices: Vec<CoinChoice>, check: SelectionCheck,
	) -> PromptFuture<'a> {
		Box::pin(async move {
			self.shown.lock().unwrap().push((choices.clone(), check.clone()));
			if let Some(notify) = &self.on_prompt {
				notify.notify_one();
			}

			match &self.script {
				Script::Select(outpoints) => Ok(outpoints.clone()),
				Script::SelectEnough => {
					let mut selected = Vec::new();
					for choice in choices.iter() {
						selected.push(choice.outpoint);
						if check.check(&selected).is_ok() {
							return Ok(selected);
						}
					}
					Err("Not enough coins to choose from".to_string())
				},
				Script::Fail(message) => Err(message.clone()),
				Script::Pending => {
					let _abandoned = MarkOnDrop(Arc::clone(&self.abandoned));
					std::future::pending::<Result<Vec<OutPoint>, String>>().await
				},
			}
		})
	}
}

pub(crate) fn lock_id_for(outpoint: &OutPoint) -> LockId {
	let mut bytes = outpoint.txid.to_byte_array();
	bytes[0] ^= outpoint.vout as u8;
	LockId(bytes)
}

pub(crate) fn utxo(byte: u8, vout: u32, sats: u64) -> Utxo {
	Utxo {
		outpoint: OutPoint { txid: Txid::from_byte_array([byte; 32]), vout },
		value: Amount::from_sat(sats),
	}
}

pub(crate) fn test_config() -> Config {
	let mut config = Config::default();
	config.log_level = LogLevel::Trace;
	config
}

pub(crate) fn setup_funder(
	wallet_service: Arc<FakeWalletService>, coin_prompt: Arc<ScriptedCoinPrompt>,
	log_writer: Arc<TestLogWriter>,
) -> PsbtFunder {
	let mut builder = Builder::from_config(test_config());
	builder.set_wallet_service(wallet_service);
	builder.set_coin_prompt(coin_prompt);
	builder.set_custom_logger(log_writer, None);
	builder.build().unwrap()
}
