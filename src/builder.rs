// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

use crate::amount::{AmountParser, BitcoinAmountParser};
use crate::config::{BitcoindRpcConfig, Config};
use crate::funder::PsbtFunder;
use crate::logger::{log_info, LogLevel, LogWriter, Logger};
use crate::selection::CoinPrompt;
use crate::service::bitcoind::BitcoindRpcService;
use crate::service::WalletService;

use std::fmt;
use std::sync::Arc;

enum WalletServiceConfig {
	BitcoindRpc(BitcoindRpcConfig),
	Custom(Arc<dyn WalletService>),
}

enum LogWriterConfig {
	File { log_file_path: String, max_log_level: Option<LogLevel> },
	Log(Option<LogLevel>),
	Custom(Arc<dyn LogWriter>, Option<LogLevel>),
}

/// An error encountered during building a [`PsbtFunder`].
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
	/// The wallet service could not be set up.
	WalletServiceSetupFailed(String),
	/// The logger could not be set up.
	LoggerSetupFailed,
}

impl fmt::Display for BuildError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Self::WalletServiceSetupFailed(ref e) => {
				write!(f, "Failed to setup wallet service: {}", e)
			},
			Self::LoggerSetupFailed => write!(f, "Failed to setup the logger."),
		}
	}
}

impl std::error::Error for BuildError {}

/// A builder for a [`PsbtFunder`] instance, allowing to set some configuration and module
/// choices from the getgo.
///
/// ### Defaults
/// - Amounts are parsed by [`BitcoinAmountParser`]
/// - Logs go to the [`log`] facade at [`Config::log_level`]
///
/// A wallet service and a coin prompt are optional here. A funder built without them fails
/// every request with the matching precondition, which lets a front end report the missing
/// capability the same way it reports any other rejected request.
pub struct Builder {
	config: Config,
	wallet_service_config: Option<WalletServiceConfig>,
	coin_prompt: Option<Arc<dyn CoinPrompt>>,
	amount_parser: Option<Arc<dyn AmountParser>>,
	log_writer_config: Option<LogWriterConfig>,
}

impl Builder {
	/// Creates a new builder instance with the default configuration.
	pub fn new() -> Self {
		Self::from_config(Config::default())
	}

	/// Creates a new builder instance from a [`Config`].
	pub fn from_config(config: Config) -> Self {
		Self {
			config,
			wallet_service_config: None,
			coin_prompt: None,
			amount_parser: None,
			log_writer_config: None,
		}
	}

	/// Uses the given wallet service to fund, sign and release coins.
	pub fn set_wallet_service(&mut self, wallet_service: Arc<dyn WalletService>) -> &mut Self {
		self.wallet_service_config = Some(WalletServiceConfig::Custom(wallet_service));
		self
	}

	/// Uses the wallet of a Bitcoin Core node reached over JSON-RPC.
	pub fn set_wallet_service_bitcoind_rpc(&mut self, rpc_config: BitcoindRpcConfig) -> &mut Self {
		self.wallet_service_config = Some(WalletServiceConfig::BitcoindRpc(rpc_config));
		self
	}

	/// Uses the given prompt when a request asks for interactive coin selection.
	pub fn set_coin_prompt(&mut self, coin_prompt: Arc<dyn CoinPrompt>) -> &mut Self {
		self.coin_prompt = Some(coin_prompt);
		self
	}

	/// Overrides how amount strings are turned into [`bitcoin::Amount`]s.
	pub fn set_amount_parser(&mut self, amount_parser: Arc<dyn AmountParser>) -> &mut Self {
		self.amount_parser = Some(amount_parser);
		self
	}

	/// Configures the funder to log to the specified file path.
	///
	/// If `max_log_level` is `None`, [`Config::log_level`] is used.
	pub fn set_filesystem_logger(
		&mut self, log_file_path: String, max_log_level: Option<LogLevel>,
	) -> &mut Self {
		self.log_writer_config = Some(LogWriterConfig::File { log_file_path, max_log_level });
		self
	}

	/// Configures the funder to forward records to the [`log`] facade.
	pub fn set_log_facade_logger(&mut self, max_log_level: Option<LogLevel>) -> &mut Self {
		self.log_writer_config = Some(LogWriterConfig::Log(max_log_level));
		self
	}

	/// Configures the funder to hand records to a custom [`LogWriter`].
	pub fn set_custom_logger(
		&mut self, log_writer: Arc<dyn LogWriter>, max_log_level: Option<LogLevel>,
	) -> &mut Self {
		self.log_writer_config = Some(LogWriterConfig::Custom(log_writer, max_log_level));
		self
	}

	/// Builds a [`PsbtFunder`] instance according to the options previously configured.
	pub fn build(&self) -> Result<PsbtFunder, BuildError> {
		let logger = Arc::new(setup_logger(&self.log_writer_config, &self.config)?);

		let wallet_service: Option<Arc<dyn WalletService>> = match &self.wallet_service_config {
			Some(WalletServiceConfig::BitcoindRpc(rpc_config)) => {
				let fee_estimation_target = self.config.fee_estimation_target;
				let service: Arc<dyn WalletService> = Arc::new(
					BitcoindRpcService::new(rpc_config, fee_estimation_target)
						.map_err(|e| BuildError::WalletServiceSetupFailed(e.to_string()))?,
				);
				log_info!(logger, "Using bitcoind wallet service at {}", rpc_config.rpc_url);
				Some(service)
			},
			Some(WalletServiceConfig::Custom(service)) => Some(Arc::clone(service)),
			None => None,
		};

		let amount_parser: Arc<dyn AmountParser> = match &self.amount_parser {
			Some(amount_parser) => Arc::clone(amount_parser),
			None => Arc::new(BitcoinAmountParser),
		};

		Ok(PsbtFunder {
			wallet_service,
			coin_prompt: self.coin_prompt.clone(),
			amount_parser,
			config: Arc::new(self.config.clone()),
			logger,
		})
	}
}

impl Default for Builder {
	fn default() -> Self {
		Self::new()
	}
}

fn setup_logger(
	log_writer_config: &Option<LogWriterConfig>, config: &Config,
) -> Result<Logger, BuildError> {
	let logger = match log_writer_config {
		Some(LogWriterConfig::File { log_file_path, max_log_level }) => {
			let max_log_level = max_log_level.unwrap_or(config.log_level);
			Logger::new_fs_writer(log_file_path.clone(), max_log_level)
				.map_err(|_| BuildError::LoggerSetupFailed)?
		},
		Some(LogWriterConfig::Log(max_log_level)) => {
			Logger::new_log_facade(max_log_level.unwrap_or(config.log_level))
		},
		Some(LogWriterConfig::Custom(log_writer, max_log_level)) => {
			let max_log_level = max_log_level.unwrap_or(config.log_level);
			Logger::new_custom_writer(Arc::clone(log_writer), max_log_level)
		},
		None => Logger::new_log_facade(config.log_level),
	};

	Ok(logger)
}
