//! An in-memory [`QueryExecutor`] that replays canned tables and records calls.

use crate::error::DbError;
use crate::executor::QueryExecutor;
use crate::template::QueryTemplate;
use core_types::{Params, ResultTable};
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Template text with `:name` placeholders, as handed to `execute`.
    pub sql: String,
    pub params: Params,
}

/// Replays queued responses in order; returns an empty table once they run out.
///
/// Every call is bound exactly as the real executor would bind it, so a
/// template/parameter mismatch fails here too.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    responses: RefCell<VecDeque<ResultTable>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, table: ResultTable) -> Self {
        self.push_response(table);
        self
    }

    pub fn push_response(&self, table: ResultTable) {
        self.responses.borrow_mut().push_back(table);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl QueryExecutor for RecordingExecutor {
    fn execute(&self, query: &QueryTemplate, params: &Params) -> Result<ResultTable, DbError> {
        query.bind(params)?;
        self.calls.borrow_mut().push(RecordedCall {
            sql: query.sql().to_string(),
            params: params.clone(),
        });
        Ok(self.responses.borrow_mut().pop_front().unwrap_or_default())
    }
}
