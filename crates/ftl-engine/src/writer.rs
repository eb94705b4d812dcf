/*
 * writer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! In-memory output sink for template processing.

use std::fmt;

/// Accumulates template output. One writer per `process` call.
#[derive(Debug, Default)]
pub struct StringWriter {
    buffer: String,
}

impl StringWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The text written so far.
    pub fn to_string(&self) -> String {
        self.buffer.clone()
    }

    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl fmt::Write for StringWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}
