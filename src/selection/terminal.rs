// This file is Copyright its original authors, visible in version control history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. You may not use this file except in
// accordance with one or both of these licenses.

//! A [`CoinPrompt`] drawn on the terminal.

use bitcoin::OutPoint;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{
	disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{CoinChoice, CoinPrompt, PromptFuture, SelectionCheck, SelectionRejection};

const DEFAULT_MESSAGE: &str = "Select coins to spend";
const HELP_LINE: &str = "↑/↓ move · space select · enter confirm · esc abort";
// How long the prompt waits for input before checking whether it was abandoned.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Presents the coins as a checkbox list on stderr.
///
/// Up and down move the cursor, which stops at either end of the list. Space toggles the coin
/// under the cursor. Enter confirms once the selection covers the requested amount; until
/// then the current shortfall is shown under the list. Escape or ctrl-c abort.
///
/// Dropping the future returned by [`CoinPrompt::select_coins`] closes the prompt and restores
/// the terminal shortly after.
pub struct TerminalCoinPrompt {
	message: String,
}

impl TerminalCoinPrompt {
	pub fn new() -> Self {
		Self { message: DEFAULT_MESSAGE.to_string() }
	}

	/// Uses `message` as the title of the list.
	pub fn with_message(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

impl Default for TerminalCoinPrompt {
	fn default() -> Self {
		Self::new()
	}
}

impl CoinPrompt for TerminalCoinPrompt {
	fn select_coins<'a>(
		&'a self, choices: Vec<CoinChoice>, check: SelectionCheck,
	) -> PromptFuture<'a> {
		let message = self.message.clone();
		Box::pin(async move {
			let cancelled = Arc::new(AtomicBool::new(false));
			let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancelled));
			tokio::task::spawn_blocking(move || {
				run_prompt(&message, PromptState::new(choices, check), &cancelled)
			})
			.await
			.map_err(|e| format!("Coin prompt did not complete: {}", e))?
		})
	}
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PromptOutcome {
	Confirmed(Vec<OutPoint>),
	Aborted,
}

/// The state of the list, kept apart from drawing so key handling can be exercised
/// without a terminal.
pub(crate) struct PromptState {
	choices: Vec<CoinChoice>,
	selected: Vec<bool>,
	cursor: usize,
	check: SelectionCheck,
	verdict: Result<(), SelectionRejection>,
}

impl PromptState {
	pub(crate) fn new(choices: Vec<CoinChoice>, check: SelectionCheck) -> Self {
		let selected = vec![false; choices.len()];
		let verdict = check.check(&[]);
		Self { choices, selected, cursor: 0, check, verdict }
	}

	fn selected_outpoints(&self) -> Vec<OutPoint> {
		self.choices
			.iter()
			.zip(self.selected.iter())
			.filter(|(_, selected)| **selected)
			.map(|(choice, _)| choice.outpoint)
			.collect()
	}

	pub(crate) fn handle_key(
		&mut self, code: KeyCode, modifiers: KeyModifiers,
	) -> Option<PromptOutcome> {
		match code {
			KeyCode::Up | KeyCode::Char('k') => {
				self.cursor = self.cursor.saturating_sub(1);
			},
			KeyCode::Down | KeyCode::Char('j') => {
				if self.cursor + 1 < self.choices.len() {
					self.cursor += 1;
				}
			},
			KeyCode::Char(' ') => {
				if let Some(selected) = self.selected.get_mut(self.cursor) {
					*selected = !*selected;
				}
				self.verdict = self.check.check(&self.selected_outpoints());
			},
			KeyCode::Enter => {
				if self.verdict.is_ok() {
					return Some(PromptOutcome::Confirmed(self.selected_outpoints()));
				}
			},
			KeyCode::Esc => return Some(PromptOutcome::Aborted),
			KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
				return Some(PromptOutcome::Aborted);
			},
			_ => {},
		}
		None
	}

	fn lines(&self, message: &str) -> Vec<String> {
		let mut lines = Vec::with_capacity(self.choices.len() + 4);
		lines.push(format!("? {}", message));
		for (index, choice) in self.choices.iter().enumerate() {
			let pointer = if index == self.cursor { '>' } else { ' ' };
			let mark = if self.selected[index] { "[x]" } else { "[ ]" };
			lines.push(format!("{} {} {}", pointer, mark, choice.name));
		}
		lines.push(String::new());
		match &self.verdict {
			Ok(()) => lines.push("Selection covers the requested amount".to_string()),
			Err(rejection) => lines.push(format!(">> {}", rejection)),
		}
		lines.push(HELP_LINE.to_string());
		lines
	}
}

// Signals the prompt thread to stop once whoever awaits it goes away.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
	fn drop(&mut self) {
		self.0.store(true, Ordering::Release);
	}
}

// Restores the terminal however the prompt loop exits.
struct RawModeGuard;

impl RawModeGuard {
	fn enter() -> io::Result<Self> {
		enable_raw_mode()?;
		if let Err(e) = execute!(io::stderr(), EnterAlternateScreen, Hide) {
			let _ = disable_raw_mode();
			return Err(e);
		}
		Ok(Self)
	}
}

impl Drop for RawModeGuard {
	fn drop(&mut self) {
		let _ = execute!(io::stderr(), Show, LeaveAlternateScreen);
		let _ = disable_raw_mode();
	}
}

fn draw(out: &mut impl Write, lines: &[String]) -> io::Result<()> {
	queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
	for line in lines {
		queue!(out, Print(line), Print("\r\n"))?;
	}
	out.flush()
}

// Waits for the next terminal event. `None` once `cancelled` is set.
fn next_event(cancelled: &AtomicBool) -> io::Result<Option<Event>> {
	loop {
		if cancelled.load(Ordering::Acquire) {
			return Ok(None);
		}
		if event::poll(CANCEL_POLL_INTERVAL)? {
			return event::read().map(Some);
		}
	}
}

fn run_prompt(
	message: &str, mut state: PromptState, cancelled: &AtomicBool,
) -> Result<Vec<OutPoint>, String> {
	let _guard = RawModeGuard::enter().map_err(|e| format!("Terminal unavailable: {}", e))?;
	let mut stderr = io::stderr();

	loop {
		draw(&mut stderr, &state.lines(message)).map_err(|e| e.to_string())?;

		let key = match next_event(cancelled).map_err(|e| e.to_string())? {
			Some(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
			Some(_) => continue,
			None => return Err("Coin selection cancelled".to_string()),
		};

		match state.handle_key(key.code, key.modifiers) {
			Some(PromptOutcome::Confirmed(selected)) => return Ok(selected),
			Some(PromptOutcome::Aborted) => return Err("Coin selection aborted".to_string()),
			None => {},
		}
	}
}
