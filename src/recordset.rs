//! Forward-only record sets.
//!
//! Drivers hand back a [`Cursor`]; callers receive it wrapped in a [`Recordset`], which
//! closes the cursor on every exit path (explicit `close`, exhaustion, early return,
//! panic unwinding) so server-side cursors are never leaked.

use std::collections::VecDeque;

use crate::error::DmlError;
use crate::results::Record;

/// Driver-side cursor over a result. Single pass, forward only.
pub trait Cursor {
    /// True while `current` returns a row.
    fn valid(&self) -> bool;

    fn current(&self) -> Option<&Record>;

    /// Move to the next row, fetching it from the server if needed.
    ///
    /// # Errors
    /// Returns `DmlError` if the driver fails while fetching.
    fn advance(&mut self) -> Result<(), DmlError>;

    /// Release server resources. Must be idempotent.
    fn close(&mut self);
}

/// Cursor over rows already fetched into memory.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: VecDeque<Record>,
}

impl BufferedCursor {
    #[must_use]
    pub fn new(rows: Vec<Record>) -> Self {
        Self { rows: rows.into() }
    }
}

impl Cursor for BufferedCursor {
    fn valid(&self) -> bool {
        !self.rows.is_empty()
    }

    fn current(&self) -> Option<&Record> {
        self.rows.front()
    }

    fn advance(&mut self) -> Result<(), DmlError> {
        self.rows.pop_front();
        Ok(())
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}

/// Caller-facing record set.
///
/// Iterate it, or drive it by hand with `valid`/`current`/`advance`. Dropping it closes
/// the underlying cursor; closing an exhausted or closed set is a no-op.
pub struct Recordset {
    cursor: Box<dyn Cursor>,
    closed: bool,
}

impl Recordset {
    #[must_use]
    pub fn new(cursor: Box<dyn Cursor>) -> Self {
        Self {
            cursor,
            closed: false,
        }
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        !self.closed && self.cursor.valid()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Record> {
        if self.closed {
            None
        } else {
            self.cursor.current()
        }
    }

    /// # Errors
    /// Returns `DmlError` if the driver fails while fetching the next row.
    pub fn advance(&mut self) -> Result<(), DmlError> {
        if self.closed {
            return Ok(());
        }
        self.cursor.advance()
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.cursor.close();
            self.closed = true;
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for Recordset {
    type Item = Result<Record, DmlError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.current()?.clone();
        if let Err(e) = self.advance() {
            self.close();
            return Some(Err(e));
        }
        Some(Ok(record))
    }
}

impl Drop for Recordset {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Recordset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recordset")
            .field("valid", &self.valid())
            .field("closed", &self.closed)
            .finish()
    }
}
