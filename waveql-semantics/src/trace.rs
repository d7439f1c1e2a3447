//! Traces and the trace set
//!
//! A [`Trace`] is a single clocked timeline with a mutable read cursor; a
//! [`TraceSet`] aggregates named traces and is the only owner of their
//! cursors. Temporal operators never hold a raw cursor alias: they observe
//! positions through [`TraceSet::indices`] and mutate them only through the
//! stepping and restore operations here.

use std::collections::BTreeMap;

use waveql_core::prelude::*;

/// A single clocked timeline with a read cursor.
#[derive(Debug, Clone)]
pub struct Trace {
    tid: String,
    values: Vec<Value>,
    index: usize,
}

impl Trace {
    /// Create a trace from pre-loaded samples, cursor at position 0.
    pub fn new(tid: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            tid: tid.into(),
            values,
            index: 0,
        }
    }

    /// Create a trace from integer samples.
    pub fn from_ints<I>(tid: impl Into<String>, samples: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        Self::new(tid, samples.into_iter().map(Value::from).collect())
    }

    /// The trace's stable identifier.
    pub fn tid(&self) -> &str {
        &self.tid
    }

    /// Number of samples in the trace.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the trace has no samples.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The current cursor position.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Set the cursor position. Used exclusively for save/restore bracketing
    /// around an operator's scan.
    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// The sample under the cursor.
    pub fn value(&self) -> WaveqlResult<&Value> {
        self.values.get(self.index).ok_or_else(|| Error::CursorOutOfBounds {
            tid: self.tid.clone(),
            index: self.index,
            len: self.values.len(),
        })
    }

    /// Advance the cursor by one position.
    ///
    /// Returns `false` ("not ended") after a successful advance. When no
    /// further position exists the cursor is left at its terminal position
    /// and `true` ("ended") is returned.
    pub fn step(&mut self) -> bool {
        if self.index + 1 < self.values.len() {
            self.index += 1;
            false
        } else {
            true
        }
    }
}

/// An aggregate of named traces.
///
/// Backed by a [`BTreeMap`] so iteration order is stable and deterministic
/// across calls within a query; `find-global`'s result shape depends on this.
#[derive(Debug, Clone, Default)]
pub struct TraceSet {
    traces: BTreeMap<String, Trace>,
}

impl TraceSet {
    /// Create an empty trace set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a trace, keyed by its identifier. Replaces any trace with the
    /// same identifier.
    pub fn insert(&mut self, trace: Trace) {
        self.traces.insert(trace.tid().to_string(), trace);
    }

    /// Whether a trace with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.traces.contains_key(name)
    }

    /// Borrow a trace by name.
    pub fn get(&self, name: &str) -> Option<&Trace> {
        self.traces.get(name)
    }

    /// The trace identifiers, in stable iteration order.
    pub fn ids(&self) -> Vec<String> {
        self.traces.keys().cloned().collect()
    }

    /// Number of traces in the set.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether the set contains no traces.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// A read-only snapshot of every trace's cursor position.
    pub fn indices(&self) -> BTreeMap<String, usize> {
        self.traces
            .iter()
            .map(|(tid, trace)| (tid.clone(), trace.index()))
            .collect()
    }

    /// Reset every trace's cursor to its snapshotted position.
    pub fn restore(&mut self, snapshot: &BTreeMap<String, usize>) {
        for (tid, index) in snapshot {
            if let Some(trace) = self.traces.get_mut(tid) {
                trace.set_index(*index);
            }
        }
    }

    /// Advance every trace by one position within a single sequential pass.
    ///
    /// Returns the identifiers of the traces that ended on this step. Joint
    /// iteration halts as soon as the result is non-empty.
    pub fn step_all(&mut self) -> Vec<String> {
        self.traces
            .iter_mut()
            .filter_map(|(tid, trace)| trace.step().then(|| tid.clone()))
            .collect()
    }

    /// The current sample of a named trace.
    pub fn value_of(&self, name: &str) -> WaveqlResult<Value> {
        let trace = self.traces.get(name).ok_or_else(|| Error::SignalNotPresent {
            name: name.to_string(),
        })?;
        Ok(trace.value()?.clone())
    }

    /// The cursor position of a named trace.
    pub fn index_of(&self, name: &str) -> WaveqlResult<usize> {
        Ok(self.trace(name)?.index())
    }

    /// Set the cursor position of a named trace.
    pub fn set_index_of(&mut self, name: &str, index: usize) -> WaveqlResult<()> {
        self.trace_mut(name)?.set_index(index);
        Ok(())
    }

    /// Advance a single named trace; returns whether it ended.
    pub fn step_one(&mut self, name: &str) -> WaveqlResult<bool> {
        Ok(self.trace_mut(name)?.step())
    }

    fn trace(&self, name: &str) -> WaveqlResult<&Trace> {
        self.traces.get(name).ok_or_else(|| Error::SignalNotPresent {
            name: name.to_string(),
        })
    }

    fn trace_mut(&mut self, name: &str) -> WaveqlResult<&mut Trace> {
        self.traces.get_mut(name).ok_or_else(|| Error::SignalNotPresent {
            name: name.to_string(),
        })
    }
}
