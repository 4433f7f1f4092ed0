// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! Logging-related objects.

use chrono::Utc;
use log::Level as FacadeLevel;
use log::Record as FacadeRecord;
use serde::Deserialize;

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// The severity of a [`LogRecord`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub enum LogLevel {
	/// Chatty per-step details.
	Gossip,
	Trace,
	Debug,
	Info,
	Warn,
	Error,
}

impl fmt::Display for LogLevel {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let s = match self {
			Self::Gossip => "GOSSIP",
			Self::Trace => "TRACE",
			Self::Debug => "DEBUG",
			Self::Info => "INFO",
			Self::Warn => "WARN",
			Self::Error => "ERROR",
		};
		f.pad(s)
	}
}

/// A unit of logging output with `module_path` and `line` metadata to inform on the log's
/// source.
pub struct LogRecord<'a> {
	/// The verbosity level of the message.
	pub level: LogLevel,
	/// The message body.
	pub args: fmt::Arguments<'a>,
	/// The module path of the message.
	pub module_path: &'a str,
	/// The line containing the message.
	pub line: u32,
}

/// Defines the behavior required for writing log records.
///
/// Implementors of this trait are responsible for handling log messages,
/// which may involve formatting, filtering, and forwarding them to specific
/// outputs.
pub trait LogWriter: Send + Sync {
	/// Log the record.
	fn log<'a>(&self, record: LogRecord<'a>);
}

/// Defines a writer for [`Logger`].
pub(crate) enum Writer {
	/// Writes logs to the file system.
	FileWriter { file_path: String },
	/// Forwards logs to the `log` facade.
	LogFacadeWriter,
	/// Forwards logs to a custom writer.
	CustomWriter(Arc<dyn LogWriter>),
}

impl LogWriter for Writer {
	fn log<'a>(&self, record: LogRecord<'a>) {
		match self {
			Writer::FileWriter { file_path } => {
				let log = format!(
					"{} {:<6} [{}:{}] {}\n",
					Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
					record.level,
					record.module_path,
					record.line,
					record.args
				);

				// Log writing is best effort: a failing disk must not fail a spend.
				if let Ok(mut file) =
					fs::OpenOptions::new().create(true).append(true).open(file_path)
				{
					let _ = file.write_all(log.as_bytes());
				}
			},
			Writer::LogFacadeWriter => {
				let mut builder = FacadeRecord::builder();

				match record.level {
					LogLevel::Gossip | LogLevel::Trace => builder.level(FacadeLevel::Trace),
					LogLevel::Debug => builder.level(FacadeLevel::Debug),
					LogLevel::Info => builder.level(FacadeLevel::Info),
					LogLevel::Warn => builder.level(FacadeLevel::Warn),
					LogLevel::Error => builder.level(FacadeLevel::Error),
				};

				log::logger().log(
					&builder
						.module_path(Some(record.module_path))
						.line(Some(record.line))
						.args(format_args!("{}", record.args))
						.build(),
				);
			},
			Writer::CustomWriter(custom_logger) => custom_logger.log(record),
		}
	}
}

pub(crate) struct Logger {
	/// Specifies the logger's writer.
	writer: Writer,
	max_log_level: LogLevel,
}

impl Logger {
	/// Creates a new logger with a filesystem writer. The parameters to this function
	/// are the path to the log file, and the log level.
	pub fn new_fs_writer(file_path: String, max_log_level: LogLevel) -> Result<Self, ()> {
		if let Some(parent_dir) = Path::new(&file_path).parent() {
			if !parent_dir.as_os_str().is_empty() {
				fs::create_dir_all(parent_dir)
					.map_err(|e| eprintln!("ERROR: Failed to create log parent directory: {}", e))?;
			}

			// make sure the file exists.
			fs::OpenOptions::new()
				.create(true)
				.append(true)
				.open(&file_path)
				.map_err(|e| eprintln!("ERROR: Failed to open log file: {}", e))?;
		}

		Ok(Self { writer: Writer::FileWriter { file_path }, max_log_level })
	}

	pub fn new_log_facade(max_log_level: LogLevel) -> Self {
		Self { writer: Writer::LogFacadeWriter, max_log_level }
	}

	pub fn new_custom_writer(log_writer: Arc<dyn LogWriter>, max_log_level: LogLevel) -> Self {
		Self { writer: Writer::CustomWriter(log_writer), max_log_level }
	}

	pub fn log<'a>(&self, record: LogRecord<'a>) {
		if record.level < self.max_log_level {
			return;
		}
		self.writer.log(record);
	}
}

macro_rules! log_given_level {
	($logger: expr, $lvl: expr, $($arg: tt)+) => {
		$logger.log($crate::logger::LogRecord {
			level: $lvl,
			args: format_args!($($arg)+),
			module_path: module_path!(),
			line: line!(),
		})
	};
}

macro_rules! log_error {
	($logger: expr, $($arg: tt)+) => {
		$crate::logger::log_given_level!($logger, $crate::logger::LogLevel::Error, $($arg)+)
	};
}

macro_rules! log_warn {
	($logger: expr, $($arg: tt)+) => {
		$crate::logger::log_given_level!($logger, $crate::logger::LogLevel::Warn, $($arg)+)
	};
}

macro_rules! log_info {
	($logger: expr, $($arg: tt)+) => {
		$crate::logger::log_given_level!($logger, $crate::logger::LogLevel::Info, $($arg)+)
	};
}

macro_rules! log_debug {
	($logger: expr, $($arg: tt)+) => {
		$crate::logger::log_given_level!($logger, $crate::logger::LogLevel::Debug, $($arg)+)
	};
}

macro_rules! log_trace {
	($logger: expr, $($arg: tt)+) => {
		$crate::logger::log_given_level!($logger, $crate::logger::LogLevel::Trace, $($arg)+)
	};
}

pub(crate) use {log_debug, log_error, log_given_level, log_info, log_trace, log_warn};

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::Mutex;

	#[derive(Default)]
	struct CapturingWriter {
		lines: Mutex<Vec<(LogLevel, String)>>,
	}

	impl LogWriter for CapturingWriter {
		fn log<'a>(&self, record: LogRecord<'a>) {
			self.lines.lock().unwrap().push((record.level, record.args.to_string()));
		}
	}

	#[test]
	fn filters_below_max_level() {
		let writer = Arc::new(CapturingWriter::default());
		let logger = Logger::new_custom_writer(writer.clone(), LogLevel::Info);

		log_debug!(logger, "hidden {}", 1);
		log_info!(logger, "shown {}", 2);
		log_error!(logger, "also shown");

		let lines = writer.lines.lock().unwrap();
		assert_eq!(
			*lines,
			vec![
				(LogLevel::Info, "shown 2".to_string()),
				(LogLevel::Error, "also shown".to_string())
			]
		);
	}

	#[test]
	fn file_writer_appends() {
		let path = std::env::temp_dir()
			.join(format!("psbt-funder-log-{}", std::process::id()))
			.join("funder.log");
		let logger =
			Logger::new_fs_writer(path.to_string_lossy().into_owned(), LogLevel::Trace).unwrap();

		log_warn!(logger, "first");
		log_trace!(logger, "second");

		let contents = fs::read_to_string(&path).unwrap();
		assert!(contents.contains("WARN"));
		assert!(contents.contains("first"));
		assert!(contents.contains("second"));
		let _ = fs::remove_file(&path);
	}
}
