// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! Objects for configuring the funder.

use bitcoin::{Amount, Network};
use serde::Deserialize;

use std::path::PathBuf;

use crate::logger::LogLevel;

// Outputs below this value are considered uneconomical to spend.
pub(crate) const DEFAULT_DUST_LIMIT_SATS: u64 = 293;

// The number of confirmations a coin needs before it is offered for interactive selection.
pub(crate) const DEFAULT_MIN_CONFIRMATIONS: u32 = 1;

// The confirmation target in blocks used when the service estimates a fee rate.
pub(crate) const DEFAULT_FEE_ESTIMATION_TARGET: u16 = 6;

pub(crate) const DEFAULT_LOG_LEVEL: LogLevel = LogLevel::Debug;

pub(crate) const DEFAULT_BITCOIND_RPC_URL: &str = "http://127.0.0.1:8332";

/// Represents the configuration of a [`PsbtFunder`] instance.
///
/// ### Defaults
///
/// | Parameter                   | Value              |
/// |-----------------------------|--------------------|
/// | `dust_limit_sats`           | 293                |
/// | `min_confirmations`         | 1                  |
/// | `fee_estimation_target`     | 6                  |
/// | `log_level`                 | Debug              |
///
/// [`PsbtFunder`]: crate::PsbtFunder
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
	/// The minimum value of every output. Requests paying less to any destination are
	/// rejected before the wallet service is asked to fund them.
	pub dust_limit_sats: u64,
	/// The minimum number of confirmations of coins offered for interactive selection.
	pub min_confirmations: u32,
	/// The confirmation target, in blocks, services use when estimating a fee rate.
	pub fee_estimation_target: u16,
	/// The maximum level at which records are forwarded to the log writer.
	pub log_level: LogLevel,
}

impl Config {
	pub(crate) fn dust_limit(&self) -> Amount {
		Amount::from_sat(self.dust_limit_sats)
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			dust_limit_sats: DEFAULT_DUST_LIMIT_SATS,
			min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
			fee_estimation_target: DEFAULT_FEE_ESTIMATION_TARGET,
			log_level: DEFAULT_LOG_LEVEL,
		}
	}
}

/// Connection settings of a Bitcoin Core wallet used via [`BitcoindRpcService`].
///
/// Authentication uses `rpc_user`/`rpc_password` when both are set and otherwise falls back
/// to reading `cookie_file`.
///
/// [`BitcoindRpcService`]: crate::service::bitcoind::BitcoindRpcService
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BitcoindRpcConfig {
	/// The RPC endpoint, e.g. `http://127.0.0.1:8332`.
	pub rpc_url: String,
	pub rpc_user: Option<String>,
	pub rpc_password: Option<String>,
	/// Path to the node's `.cookie` file.
	pub cookie_file: Option<PathBuf>,
	/// The wallet to use when the node has more than one loaded.
	pub wallet_name: Option<String>,
	/// The network addresses are decoded for.
	pub network: Network,
}

impl Default for BitcoindRpcConfig {
	fn default() -> Self {
		Self {
			rpc_url: DEFAULT_BITCOIND_RPC_URL.to_string(),
			rpc_user: None,
			rpc_password: None,
			cookie_file: None,
			wallet_name: None,
			network: Network::Bitcoin,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = Config::default();
		assert_eq!(config.dust_limit(), Amount::from_sat(293));
		assert_eq!(config.min_confirmations, 1);
		assert_eq!(config.fee_estimation_target, 6);
	}

	#[test]
	fn partial_json_keeps_defaults() {
		let config: Config = serde_json::from_str(r#"{ "dust_limit_sats": 546 }"#).unwrap();
		assert_eq!(config.dust_limit_sats, 546);
		assert_eq!(config.min_confirmations, DEFAULT_MIN_CONFIRMATIONS);

		let rpc: BitcoindRpcConfig =
			serde_json::from_str(r#"{ "rpc_user": "alice", "network": "regtest" }"#).unwrap();
		assert_eq!(rpc.rpc_url, DEFAULT_BITCOIND_RPC_URL);
		assert_eq!(rpc.rpc_user.as_deref(), Some("alice"));
		assert_eq!(rpc.network, Network::Regtest);
	}
}
