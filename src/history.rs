//! Linear, bounded undo history.

use std::{collections::VecDeque, rc::Rc};

#[derive(Debug, Clone)]
pub struct HistoryEntry<S> {
	pub state: Rc<S>,
	pub action: String,
	pub timestamp: f64,
}

/// Committed snapshots with a cursor.
///
/// Pushing after an undo discards everything past the cursor. Once more than `max_len` entries exist, the oldest are dropped.
#[derive(Debug)]
pub struct History<S> {
	entries: VecDeque<HistoryEntry<S>>,
	cursor: usize,
	max_len: usize,
}
impl<S> History<S> {
	#[must_use]
	pub fn new(initial: HistoryEntry<S>, max_len: usize) -> Self {
		Self {
			entries: VecDeque::from(vec![initial]),
			cursor: 0,
			max_len: max_len.max(1),
		}
	}

	pub fn push(&mut self, entry: HistoryEntry<S>) {
		self.entries.truncate(self.cursor + 1);
		self.entries.push_back(entry);
		while self.entries.len() > self.max_len {
			self.entries.pop_front();
		}
		self.cursor = self.entries.len() - 1;
	}

	/// Moves the cursor back and returns the entry it lands on, or [`None`] at the beginning.
	pub fn undo(&mut self) -> Option<&HistoryEntry<S>> {
		self.cursor = self.cursor.checked_sub(1)?;
		self.entries.get(self.cursor)
	}

	pub fn redo(&mut self) -> Option<&HistoryEntry<S>> {
		if self.cursor + 1 >= self.entries.len() {
			return None;
		}
		self.cursor += 1;
		self.entries.get(self.cursor)
	}

	/// Drops everything but the first entry and returns it.
	pub fn reset(&mut self) -> &HistoryEntry<S> {
		self.entries.truncate(1);
		self.cursor = 0;
		&self.entries[0]
	}

	#[must_use]
	pub fn can_undo(&self) -> bool {
		self.cursor > 0
	}

	#[must_use]
	pub fn can_redo(&self) -> bool {
		self.cursor + 1 < self.entries.len()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[must_use]
	pub fn cursor(&self) -> usize {
		self.cursor
	}

	pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry<S>> {
		self.entries.iter()
	}
}
