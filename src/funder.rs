// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

use bitcoin::{Amount, FeeRate, OutPoint, Transaction};
use futures::future::join_all;

use std::sync::Arc;

use crate::amount::{format_btc, AmountParser};
use crate::config::Config;
use crate::error::Error;
use crate::logger::{log_debug, log_error, log_info, log_trace, log_warn, Logger};
use crate::selection::{prompt_for_coins, CoinPrompt};
use crate::service::WalletService;
use crate::types::{
	format_outpoint, FundRequest, FundedTransaction, FundingInput, Output, SignedTransaction, Utxo,
};
use crate::validate::{validate_request, ValidatedRequest};

/// Funds and signs transactions through a [`WalletService`].
///
/// Needs to be initialized and instantiated through [`Builder::build`].
///
/// [`Builder::build`]: crate::Builder::build
pub struct PsbtFunder {
	pub(crate) wallet_service: Option<Arc<dyn WalletService>>,
	pub(crate) coin_prompt: Option<Arc<dyn CoinPrompt>>,
	pub(crate) amount_parser: Arc<dyn AmountParser>,
	pub(crate) config: Arc<Config>,
	pub(crate) logger: Arc<Logger>,
}

impl PsbtFunder {
	/// Returns our configuration.
	pub fn config(&self) -> Config {
		self.config.as_ref().clone()
	}

	/// Funds a transaction paying `request.amounts` to `request.addresses`, signs it and
	/// returns it hex encoded.
	///
	/// The fee rate is taken from the request or estimated by the wallet service. Inputs are
	/// the request's explicit coins, the coins chosen through the [`CoinPrompt`] when
	/// `is_selecting_coins` is set, or otherwise left to the wallet service.
	///
	/// Funding locks the spent coins with the wallet service. They stay locked once this
	/// returns, unless the request is a dry run, in which case they are released again while
	/// the transaction is signed. The returned transaction is never broadcast.
	///
	/// Requests failing a precondition are rejected before the wallet service is called.
	pub async fn fund_and_sign(&self, request: &FundRequest) -> Result<SignedTransaction, Error> {
		let result = self.run(request).await;
		if let Err(e) = &result {
			log_error!(self.logger, "Failed to fund and sign transaction: {}", e);
		}
		result
	}

	async fn run(&self, request: &FundRequest) -> Result<SignedTransaction, Error> {
		let (request, wallet_service, coin_prompt) =
			validate_request(request, self.wallet_service.as_deref(), self.coin_prompt.as_deref())?;
		log_debug!(
			self.logger,
			"Funding {} output(s), dry run: {}, selecting coins: {}",
			request.addresses.len(),
			request.is_dry_run,
			request.is_selecting_coins
		);

		let fee_rate_step = self.resolve_fee_rate(wallet_service, &request);
		let coins_step = async {
			let ((outputs, requested), utxos) = tokio::try_join!(
				async { self.build_outputs(&request) },
				self.list_selectable_utxos(wallet_service, &request),
			)?;
			let coins = match utxos {
				Some(utxos) => prompt_for_coins(coin_prompt, requested, &utxos).await?,
				None => request.coins.clone(),
			};
			Ok::<_, Error>((outputs, coins))
		};
		let (fee_rate, (outputs, coins)) = tokio::try_join!(fee_rate_step, coins_step)?;

		let funded = self.fund(wallet_service, &outputs, &coins, fee_rate).await?;

		// Dry run locks are released even when signing fails.
		let (released, signature) = tokio::join!(
			self.release_if_dry_run(wallet_service, &request, &funded),
			self.sign(wallet_service, &request, &funded),
		);
		released?;
		let transaction = signature?;

		let signed = SignedTransaction::from_transaction(&transaction);
		log_info!(self.logger, "Signed transaction {}", transaction.compute_txid());
		Ok(signed)
	}

	async fn resolve_fee_rate(
		&self, wallet_service: &dyn WalletService, request: &ValidatedRequest,
	) -> Result<FeeRate, Error> {
		if let Some(fee_rate) = request.fee_rate {
			return Ok(fee_rate);
		}

		let fee_rate =
			wallet_service.estimate_fee_rate().await.map_err(Error::FeeRateEstimationFailed)?;
		log_debug!(self.logger, "Estimated fee rate of {} sat/vB", fee_rate.to_sat_per_vb_ceil());
		Ok(fee_rate)
	}

	// Returns the outputs along with their total, which never exceeds `Amount::MAX_MONEY`.
	fn build_outputs(&self, request: &ValidatedRequest) -> Result<(Vec<Output>, Amount), Error> {
		let mut outputs = Vec::with_capacity(request.addresses.len());
		let mut requested = Amount::ZERO;
		for (address, amount) in request.addresses.iter().zip(request.amounts.iter()) {
			let value = self
				.amount_parser
				.parse_amount(amount)
				.map_err(|message| Error::InvalidAmount { amount: amount.clone(), message })?;
			requested = requested
				.checked_add(value)
				.filter(|total| *total <= Amount::MAX_MONEY)
				.ok_or_else(|| Error::InvalidAmount {
					amount: amount.clone(),
					message: format!(
						"Requested outputs exceed {} BTC in total",
						format_btc(Amount::MAX_MONEY)
					),
				})?;
			outputs.push(Output { address: address.clone(), amount: value });
		}

		ensure_non_dust(&outputs, self.config.dust_limit())?;
		Ok((outputs, requested))
	}

	// Enumerates the coins the prompt chooses from. `None` when no prompt will be shown.
	async fn list_selectable_utxos(
		&self, wallet_service: &dyn WalletService, request: &ValidatedRequest,
	) -> Result<Option<Vec<Utxo>>, Error> {
		if !request.is_selecting_coins || !request.coins.is_empty() {
			return Ok(None);
		}

		let utxos = wallet_service
			.list_confirmed_utxos(self.config.min_confirmations)
			.await
			.map_err(Error::UtxoListingFailed)?;
		if utxos.is_empty() {
			return Err(Error::NoConfirmedCoins);
		}

		log_trace!(self.logger, "Offering {} coin(s) for selection", utxos.len());
		Ok(Some(utxos))
	}

	async fn fund(
		&self, wallet_service: &dyn WalletService, outputs: &[Output], coins: &[OutPoint],
		fee_rate: FeeRate,
	) -> Result<FundedTransaction, Error> {
		ensure_non_dust(outputs, self.config.dust_limit())?;

		log_info!(self.logger, "Funding transaction at {} sat/vB", fee_rate.to_sat_per_vb_ceil());
		for output in outputs {
			let amount = format_btc(output.amount);
			log_info!(self.logger, "Paying {} BTC to {}", amount, output.address);
		}

		let inputs: Vec<FundingInput> = coins.iter().copied().map(FundingInput::from).collect();
		let inputs = if inputs.is_empty() { None } else { Some(inputs.as_slice()) };

		wallet_service.fund_psbt(outputs, inputs, fee_rate).await.map_err(Error::FundingFailed)
	}

	async fn release_if_dry_run(
		&self, wallet_service: &dyn WalletService, request: &ValidatedRequest,
		funded: &FundedTransaction,
	) -> Result<(), Error> {
		if !request.is_dry_run {
			return Ok(());
		}

		log_debug!(self.logger, "Dry run, releasing {} coin lock(s)", funded.inputs.len());
		let unlocks =
			funded.inputs.iter().map(|input| wallet_service.unlock_utxo(input.lock_id, input.outpoint));
		// Every unlock is attempted even once one has failed.
		let results = join_all(unlocks).await;
		results.into_iter().collect::<Result<Vec<()>, _>>().map_err(Error::UnlockFailed)?;
		Ok(())
	}

	async fn sign(
		&self, wallet_service: &dyn WalletService, request: &ValidatedRequest,
		funded: &FundedTransaction,
	) -> Result<Transaction, Error> {
		if let Some(change) = funded.change() {
			let amount = format_btc(change.amount);
			log_info!(self.logger, "Change of {} BTC to {}", amount, change.address);
		}
		log_info!(self.logger, "Outputs total {} BTC", format_btc(funded.total_output_amount()));
		let spending: Vec<String> =
			funded.inputs.iter().map(|input| format_outpoint(&input.outpoint)).collect();
		log_info!(self.logger, "Spending {}", spending.join(", "));

		wallet_service.sign_psbt(funded.psbt.clone()).await.map_err(|e| {
			if !request.is_dry_run {
				log_warn!(
					self.logger,
					"Signing failed, {} coin(s) remain locked by the wallet service",
					funded.inputs.len()
				);
			}
			Error::SigningFailed(e)
		})
	}
}

fn ensure_non_dust(outputs: &[Output], dust_limit: Amount) -> Result<(), Error> {
	match outputs.iter().find(|output| output.amount < dust_limit) {
		Some(output) => Err(Error::DustOutput {
			address: output.address.clone(),
			amount: output.amount,
			dust_limit,
		}),
		None => Ok(()),
	}
}
