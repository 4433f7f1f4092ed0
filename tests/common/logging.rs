// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

use psbt_funder::{LogLevel, LogRecord, LogWriter};

use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CapturedRecord {
	pub level: LogLevel,
	pub module_path: String,
	pub message: String,
}

/// Keeps every record it is handed.
#[derive(Default)]
pub(crate) struct TestLogWriter {
	records: Mutex<Vec<CapturedRecord>>,
}

impl TestLogWriter {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn records(&self) -> Vec<CapturedRecord> {
		self.records.lock().unwrap().clone()
	}

	pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
		self.records()
			.into_iter()
			.filter(|record| record.level == level)
			.map(|record| record.message)
			.collect()
	}

	pub fn contains(&self, needle: &str) -> bool {
		self.records().iter().any(|record| record.message.contains(needle))
	}
}

impl LogWriter for TestLogWriter {
	fn log<'a>(&self, record: LogRecord<'a>) {
		self.records.lock().unwrap().push(CapturedRecord {
			level: record.level,
			module_path: record.module_path.to_string(),
			message: record.args.to_string(),
		});
	}
}

pub(crate) fn validate_log_entry(record: &CapturedRecord) {
	assert!(record.module_path.starts_with("psbt_funder"));
	assert!(!record.message.is_empty());
}
