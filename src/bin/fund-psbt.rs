// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! Funds and signs a transaction with a Bitcoin Core wallet and prints it hex encoded.

use clap::Parser;
use psbt_funder::bitcoin::Network;
use psbt_funder::{
	BitcoindRpcConfig, Builder, Config, FundRequest, LogLevel, LogRecord, LogWriter,
	TerminalCoinPrompt,
};
use serde::Deserialize;
use serde_json::json;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "fund-psbt", about = "Fund and sign a transaction with a bitcoind wallet")]
struct Args {
	/// Destination address. Repeat for several outputs
	#[arg(long = "address", conflicts_with = "request")]
	addresses: Vec<String>,

	/// Amount in BTC, or with a denomination such as "5000 sat". Paired with --address by
	/// position
	#[arg(long = "amount", conflicts_with = "request")]
	amounts: Vec<String>,

	/// Coin to spend as <txid>:<vout>. Repeat for several coins
	#[arg(long = "coin", conflicts_with = "request")]
	coins: Vec<String>,

	/// Fee rate in sat/vB, estimated by the node when omitted
	#[arg(long = "fee-rate", conflicts_with = "request")]
	fee_rate: Option<u64>,

	/// Sign, but release the funded coins again
	#[arg(long = "dry-run", default_value_t = false, conflicts_with = "request")]
	dry_run: bool,

	/// Pick the coins to spend interactively
	#[arg(long = "select-coins", default_value_t = false, conflicts_with = "request")]
	select_coins: bool,

	/// Read the request from a JSON file instead of the flags above
	#[arg(long = "request")]
	request: Option<PathBuf>,

	/// JSON file with "funder" and "bitcoind" settings
	#[arg(long = "config")]
	config: Option<PathBuf>,

	/// bitcoind RPC endpoint
	#[arg(long = "rpc-url")]
	rpc_url: Option<String>,

	#[arg(long = "rpc-user")]
	rpc_user: Option<String>,

	#[arg(long = "rpc-password")]
	rpc_password: Option<String>,

	/// Path to the node's .cookie file
	#[arg(long = "rpc-cookie")]
	rpc_cookie: Option<PathBuf>,

	/// Loaded wallet to use
	#[arg(long = "wallet")]
	wallet: Option<String>,

	/// bitcoin, testnet, signet or regtest
	#[arg(long = "network")]
	network: Option<Network>,

	/// Append logs to this file instead of stderr
	#[arg(long = "log-file")]
	log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
	funder: Config,
	bitcoind: BitcoindRpcConfig,
}

struct StderrLogWriter;

impl LogWriter for StderrLogWriter {
	fn log<'a>(&self, record: LogRecord<'a>) {
		eprintln!("{:<5} [{}:{}] {}", record.level, record.module_path, record.line, record.args);
	}
}

fn load_config(path: Option<&Path>) -> Result<FileConfig, String> {
	match path {
		Some(path) => {
			let contents = fs::read_to_string(path)
				.map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
			serde_json::from_str(&contents)
				.map_err(|e| format!("Failed to parse config {}: {}", path.display(), e))
		},
		None => Ok(FileConfig::default()),
	}
}

fn load_request(args: &Args) -> Result<FundRequest, String> {
	match &args.request {
		Some(path) => {
			let contents = fs::read_to_string(path)
				.map_err(|e| format!("Failed to read request {}: {}", path.display(), e))?;
			let value: serde_json::Value = serde_json::from_str(&contents)
				.map_err(|e| format!("Failed to parse request {}: {}", path.display(), e))?;
			FundRequest::from_json_value(&value).map_err(|e| format!("{} (code {})", e, e.code()))
		},
		None => Ok(FundRequest {
			addresses: args.addresses.clone(),
			amounts: args.amounts.clone(),
			coins: args.coins.clone(),
			fee_rate: args.fee_rate,
			is_dry_run: args.dry_run,
			is_selecting_coins: args.select_coins,
		}),
	}
}

fn apply_overrides(rpc_config: &mut BitcoindRpcConfig, args: &Args) {
	if let Some(rpc_url) = &args.rpc_url {
		rpc_config.rpc_url = rpc_url.clone();
	}
	if args.rpc_user.is_some() {
		rpc_config.rpc_user = args.rpc_user.clone();
	}
	if args.rpc_password.is_some() {
		rpc_config.rpc_password = args.rpc_password.clone();
	}
	if args.rpc_cookie.is_some() {
		rpc_config.cookie_file = args.rpc_cookie.clone();
	}
	if args.wallet.is_some() {
		rpc_config.wallet_name = args.wallet.clone();
	}
	if let Some(network) = args.network {
		rpc_config.network = network;
	}
}

fn main() -> ExitCode {
	let args = Args::parse();

	let file_config = match load_config(args.config.as_deref()) {
		Ok(file_config) => file_config,
		Err(e) => {
			eprintln!("{}", e);
			return ExitCode::from(2);
		},
	};
	let request = match load_request(&args) {
		Ok(request) => request,
		Err(e) => {
			eprintln!("{}", e);
			return ExitCode::from(2);
		},
	};

	let mut rpc_config = file_config.bitcoind;
	apply_overrides(&mut rpc_config, &args);

	let mut builder = Builder::from_config(file_config.funder);
	builder.set_wallet_service_bitcoind_rpc(rpc_config);
	builder.set_coin_prompt(Arc::new(TerminalCoinPrompt::new()));
	match args.log_file {
		Some(log_file) => builder.set_filesystem_logger(log_file, None),
		None => builder.set_custom_logger(Arc::new(StderrLogWriter), Some(LogLevel::Info)),
	};

	let funder = match builder.build() {
		Ok(funder) => funder,
		Err(e) => {
			eprintln!("{}", e);
			return ExitCode::from(2);
		},
	};

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			eprintln!("Failed to start runtime: {}", e);
			return ExitCode::from(2);
		},
	};
	let result = runtime.block_on(funder.fund_and_sign(&request));
	// Waits for an abandoned coin prompt to hand the terminal back before reporting.
	drop(runtime);

	match result {
		Ok(signed) => {
			println!("{}", json!({ "signed_transaction": signed.signed_transaction }));
			ExitCode::SUCCESS
		},
		Err(e) => {
			eprintln!("Error {}: {}", e.code(), e);
			ExitCode::FAILURE
		},
	}
}
