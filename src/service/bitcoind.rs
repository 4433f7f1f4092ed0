// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! A [`WalletService`] backed by a Bitcoin Core wallet over JSON-RPC.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bitcoin::hex::FromHex;
use bitcoin::psbt::Psbt;
use bitcoin::{Address, Amount, FeeRate, Network, OutPoint, Transaction, Txid};
use serde::Deserialize;
use serde_json::{json, Value};

use std::fs;
use std::path::Path;

use super::{ServiceFuture, WalletService};
use crate::amount::format_btc;
use crate::config::BitcoindRpcConfig;
use crate::error::ServiceError;
use crate::types::{FundedInput, FundedOutput, FundedTransaction, FundingInput, LockId, Output, Utxo};

const RPC_REQUEST_ID: &str = "psbt-funder";

#[derive(Debug, Deserialize)]
struct RpcResponse {
	result: Option<Value>,
	error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
	code: i64,
	message: String,
}

#[derive(Debug, Deserialize)]
struct EstimateSmartFeeResponse {
	feerate: Option<f64>,
	#[serde(default)]
	errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ListUnspentEntry {
	txid: Txid,
	vout: u32,
	amount: f64,
	#[serde(default = "default_spendable")]
	spendable: bool,
}

fn default_spendable() -> bool {
	true
}

#[derive(Debug, Deserialize)]
struct FundedPsbtResponse {
	psbt: String,
	changepos: i64,
}

#[derive(Debug, Deserialize)]
struct ProcessedPsbtResponse {
	psbt: String,
	complete: bool,
}

#[derive(Debug, Deserialize)]
struct FinalizedPsbtResponse {
	hex: Option<String>,
	complete: bool,
}

/// Talks to the wallet RPC of a Bitcoin Core node.
///
/// Coins are locked through `walletcreatefundedpsbt`'s `lockUnspents` option and released with
/// `lockunspent`. Core tracks locks per outpoint, so funded inputs carry no [`LockId`].
pub struct BitcoindRpcService {
	client: reqwest::Client,
	url: String,
	auth: Option<(String, String)>,
	network: Network,
	fee_estimation_target: u16,
}

impl BitcoindRpcService {
	/// Creates a service for the given connection settings.
	///
	/// Fails if a cookie file is configured for authentication but cannot be read.
	pub fn new(
		config: &BitcoindRpcConfig, fee_estimation_target: u16,
	) -> Result<Self, ServiceError> {
		let auth = match (&config.rpc_user, &config.rpc_password, &config.cookie_file) {
			(Some(user), Some(password), _) => Some((user.clone(), password.clone())),
			(_, _, Some(cookie_file)) => Some(read_cookie_auth(cookie_file)?),
			_ => None,
		};

		let base_url = config.rpc_url.trim_end_matches('/');
		let url = match &config.wallet_name {
			Some(wallet_name) => format!("{}/wallet/{}", base_url, wallet_name),
			None => base_url.to_string(),
		};

		Ok(Self {
			client: reqwest::Client::new(),
			url,
			auth,
			network: config.network,
			fee_estimation_target,
		})
	}

	async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ServiceError> {
		let request_body = json!({
			"jsonrpc": "1.0",
			"id": RPC_REQUEST_ID,
			"method": method,
			"params": params,
		});

		let mut request = self.client.post(&self.url).json(&request_body);
		if let Some((username, password)) = &self.auth {
			request = request.basic_auth(username, Some(password));
		}

		let response = request
			.send()
			.await
			.map_err(|e| ServiceError::new(format!("{} request failed: {}", method, e)))?;

		// Core answers RPC errors with a non-success status and a JSON body, so the body is
		// inspected before the status.
		let status = response.status();
		let body = response
			.text()
			.await
			.map_err(|e| ServiceError::new(format!("{} response unreadable: {}", method, e)))?;

		let response: RpcResponse = serde_json::from_str(&body).map_err(|_| {
			ServiceError::new(format!("{} failed with HTTP status {}", method, status))
		})?;

		if let Some(error) = response.error {
			return Err(ServiceError::with_code(error.code, error.message));
		}

		response
			.result
			.ok_or_else(|| ServiceError::new(format!("{} returned no result", method)))
	}

	async fn rpc_call_as<T: for<'de> Deserialize<'de>>(
		&self, method: &str, params: Value,
	) -> Result<T, ServiceError> {
		let result = self.rpc_call(method, params).await?;
		serde_json::from_value(result)
			.map_err(|e| ServiceError::new(format!("Unexpected {} response: {}", method, e)))
	}

	async fn estimate_fee_rate_inner(&self) -> Result<FeeRate, ServiceError> {
		let response: EstimateSmartFeeResponse =
			self.rpc_call_as("estimatesmartfee", json!([self.fee_estimation_target])).await?;

		let btc_per_kvb = response.feerate.ok_or_else(|| {
			if response.errors.is_empty() {
				ServiceError::new("No fee rate estimate available")
			} else {
				ServiceError::new(response.errors.join("; "))
			}
		})?;

		let sats_per_kvb = Amount::from_btc(btc_per_kvb)
			.map_err(|e| ServiceError::new(format!("Invalid fee rate estimate: {}", e)))?
			.to_sat();
		FeeRate::from_sat_per_vb(sats_per_kvb.div_ceil(1000))
			.ok_or_else(|| ServiceError::new("Fee rate estimate out of range"))
	}

	async fn list_confirmed_utxos_inner(
		&self, min_confirmations: u32,
	) -> Result<Vec<Utxo>, ServiceError> {
		let entries: Vec<ListUnspentEntry> =
			self.rpc_call_as("listunspent", json!([min_confirmations])).await?;

		entries
			.into_iter()
			.filter(|entry| entry.spendable)
			.map(|entry| {
				let value = Amount::from_btc(entry.amount).map_err(|e| {
					ServiceError::new(format!("Invalid amount for {}:{}: {}", entry.txid, entry.vout, e))
				})?;
				Ok(Utxo { outpoint: OutPoint { txid: entry.txid, vout: entry.vout }, value })
			})
			.collect()
	}

	async fn fund_psbt_inner(
		&self, outputs: &[Output], inputs: Option<&[FundingInput]>, fee_rate: FeeRate,
	) -> Result<FundedTransaction, ServiceError> {
		let input_objects: Vec<Value> = inputs
			.unwrap_or_default()
			.iter()
			.map(|input| json!({ "txid": input.transaction_id, "vout": input.transaction_vout }))
			.collect();

		// One object per output keeps their order and allows paying an address twice.
		let output_objects: Vec<Value> = outputs
			.iter()
			.map(|output| {
				let mut object = serde_json::Map::new();
				object.insert(output.address.clone(), json!(format_btc(output.amount)));
				Value::Object(object)
			})
			.collect();

		let mut options = serde_json::Map::new();
		options.insert("lockUnspents".to_string(), json!(true));
		options.insert("fee_rate".to_string(), json!(fee_rate.to_sat_per_vb_ceil()));
		if inputs.is_some() {
			options.insert("add_inputs".to_string(), json!(false));
		}

		let params = json!([input_objects, output_objects, 0, options]);
		let response: FundedPsbtResponse =
			self.rpc_call_as("walletcreatefundedpsbt", params).await?;

		let psbt = decode_psbt(&response.psbt)?;
		Ok(self.describe_funded_psbt(psbt, response.changepos))
	}

	fn describe_funded_psbt(&self, psbt: Psbt, change_position: i64) -> FundedTransaction {
		let inputs = psbt
			.unsigned_tx
			.input
			.iter()
			.map(|txin| FundedInput { outpoint: txin.previous_output, lock_id: None })
			.collect();

		let outputs = psbt
			.unsigned_tx
			.output
			.iter()
			.enumerate()
			.map(|(index, txout)| FundedOutput {
				address: Address::from_script(&txout.script_pubkey, self.network)
					.map(|address| address.to_string())
					.unwrap_or_else(|_| txout.script_pubkey.to_hex_string()),
				amount: txout.value,
				is_change: index as i64 == change_position,
			})
			.collect();

		FundedTransaction { psbt, inputs, outputs }
	}

	async fn sign_psbt_inner(&self, psbt: Psbt) -> Result<Transaction, ServiceError> {
		let encoded = BASE64_STANDARD.encode(psbt.serialize());

		let processed: ProcessedPsbtResponse =
			self.rpc_call_as("walletprocesspsbt", json!([encoded, true])).await?;
		if !processed.complete {
			return Err(ServiceError::new("Wallet could not sign every input"));
		}

		let finalized: FinalizedPsbtResponse =
			self.rpc_call_as("finalizepsbt", json!([processed.psbt, true])).await?;
		let hex = match (finalized.complete, finalized.hex) {
			(true, Some(hex)) => hex,
			_ => return Err(ServiceError::new("Signed transaction could not be finalized")),
		};

		let bytes = Vec::<u8>::from_hex(&hex)
			.map_err(|e| ServiceError::new(format!("Invalid signed transaction hex: {}", e)))?;
		bitcoin::consensus::deserialize(&bytes)
			.map_err(|e| ServiceError::new(format!("Invalid signed transaction: {}", e)))
	}

	async fn unlock_utxo_inner(&self, outpoint: OutPoint) -> Result<(), ServiceError> {
		let params = json!([true, [{ "txid": outpoint.txid, "vout": outpoint.vout }]]);
		let unlocked: bool = self.rpc_call_as("lockunspent", params).await?;
		if unlocked {
			Ok(())
		} else {
			Err(ServiceError::new(format!("Coin {} was not unlocked", outpoint)))
		}
	}
}

impl WalletService for BitcoindRpcService {
	fn estimate_fee_rate<'a>(&'a self) -> ServiceFuture<'a, FeeRate> {
		Box::pin(self.estimate_fee_rate_inner())
	}

	fn list_confirmed_utxos<'a>(&'a self, min_confirmations: u32) -> ServiceFuture<'a, Vec<Utxo>> {
		Box::pin(self.list_confirmed_utxos_inner(min_confirmations))
	}

	fn fund_psbt<'a>(
		&'a self, outputs: &'a [Output], inputs: Option<&'a [FundingInput]>, fee_rate: FeeRate,
	) -> ServiceFuture<'a, FundedTransaction> {
		Box::pin(self.fund_psbt_inner(outputs, inputs, fee_rate))
	}

	fn sign_psbt<'a>(&'a self, psbt: Psbt) -> ServiceFuture<'a, Transaction> {
		Box::pin(self.sign_psbt_inner(psbt))
	}

	fn unlock_utxo<'a>(
		&'a self, _lock_id: Option<LockId>, outpoint: OutPoint,
	) -> ServiceFuture<'a, ()> {
		Box::pin(self.unlock_utxo_inner(outpoint))
	}
}

fn decode_psbt(encoded: &str) -> Result<Psbt, ServiceError> {
	let bytes = BASE64_STANDARD
		.decode(encoded)
		.map_err(|e| ServiceError::new(format!("Funded PSBT is not base64: {}", e)))?;
	Psbt::deserialize(&bytes).map_err(|e| ServiceError::new(format!("Invalid funded PSBT: {}", e)))
}

fn read_cookie_auth(cookie_path: &Path) -> Result<(String, String), ServiceError> {
	let cookie = fs::read_to_string(cookie_path).map_err(|e| {
		ServiceError::new(format!("Failed to read cookie file {}: {}", cookie_path.display(), e))
	})?;

	match cookie.trim().split_once(':') {
		Some((user, password)) => Ok((user.to_string(), password.to_string())),
		None => Err(ServiceError::new(format!(
			"Invalid cookie file {}: expected 'user:password'",
			cookie_path.display()
		))),
	}
}
