//! Forward-only cursor over a result set delivered in batches.
//!
//! A result set of `row_count` rows may arrive as several frames sharing one request
//! id. Every frame carries a batch together with its inclusive `from_row..=to_row`
//! range. [`Cursor::advance`] walks the rows of the current batch and tells the
//! caller when the batch is exhausted, either because the whole result set has been
//! seen ([`Step::Done`]) or because the next batch has to be read ([`Step::FetchNext`]).
//!
//! The first batch of a result set fixes the ordinal origin, so servers numbering
//! rows from either 0 or 1 are handled alike.
use super::Response;

/// Outcome of advancing the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The cursor points at a row of the current batch.
    Row,
    /// No rows are left in the result set.
    Done,
    /// The current batch is exhausted and another batch follows.
    FetchNext,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cursor {
    position: Option<usize>,
    origin: Option<u64>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the result set entirely.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Move before the first row of a freshly fetched batch of the same result set.
    pub fn rewind(&mut self) {
        self.position = None;
    }

    /// Offset of the current row inside the batch, if positioned on one.
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    pub fn advance(&mut self, batch: &Response) -> Step {
        let last = match batch.last_offset() {
            Some(last) if batch.has_batch() => last,
            _ => return Step::Done,
        };

        let origin = *self.origin.get_or_insert(batch.from_row);
        let next = self.position.map_or(0, |p| p + 1);
        if next <= last {
            self.position = Some(next);
            return Step::Row;
        }

        if is_last_batch(batch, origin) {
            self.position = Some(last);
            Step::Done
        } else {
            Step::FetchNext
        }
    }
}

/// Whether `batch` ends the result set whose first row ordinal is `origin`.
pub fn is_last_batch(batch: &Response, origin: u64) -> bool {
    batch.to_row.saturating_sub(origin).saturating_add(1) >= batch.row_count
}
