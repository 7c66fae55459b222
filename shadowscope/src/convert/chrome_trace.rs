//! Chrome Trace Event JSON → drawables
//!
//! Accepts both the object form (`{"traceEvents": [...]}`) and the bare
//! array form. Every distinct `(pid, tid)` becomes a timeline row, every
//! distinct event name (per topology) becomes a category.
//!
//! | Phase | Drawable |
//! |-------|----------|
//! | `X` | state `[ts, ts + dur]` |
//! | `B` / `E` | state, paired per row like a call stack |
//! | `i` / `I` | event |
//! | `s` / `t` / `f` | arrow from the previous flow point with the same `id` |
//!
//! Timestamps are microseconds and become seconds. Unbalanced `E` events,
//! unterminated `B` events and dangling flows are dropped with a warning.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::domain::{default_color, Category, CategoryTable, ConvertError, Coord, Topology, INCRE_STARTTIME_ORDER};
use crate::drawable::{Drawable, Primitive};

/// Chrome trace timestamps are microseconds
const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// One Chrome trace event; only the fields the convertor reads
#[derive(Debug, Clone, Deserialize)]
struct ChromeTraceEvent {
    name: Option<String>,
    /// Category for filtering; flows are matched per `(cat, id)`
    cat: Option<String>,
    ph: Option<String>,
    /// Timestamp in microseconds
    ts: Option<f64>,
    /// Duration of an `X` event in microseconds
    dur: Option<f64>,
    pid: Option<JsonValue>,
    tid: Option<JsonValue>,
    id: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChromeTraceFile {
    Object {
        #[serde(rename = "traceEvents")]
        trace_events: Vec<ChromeTraceEvent>,
    },
    Array(Vec<ChromeTraceEvent>),
}

/// `(pid, tid)` as written in the trace
pub type ThreadKey = (String, String);

fn id_string(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => "0".to_string(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Result of a conversion
#[derive(Debug)]
pub struct ConvertedTrace {
    pub table: CategoryTable,
    /// Real drawables in increasing start time order
    pub drawables: Vec<Drawable>,
    /// `(pid, tid)` of each row, indexed by line id
    pub lines: Vec<ThreadKey>,
    /// Events that could not be paired
    pub dropped: usize,
}

#[derive(Debug, Default)]
struct ChromeTraceConverter {
    table: CategoryTable,
    categories: HashMap<(String, Topology), Arc<Category>>,
    line_ids: HashMap<ThreadKey, i32>,
    lines: Vec<ThreadKey>,
    /// Open `B` events per row: (name, start)
    open: HashMap<i32, Vec<(String, f64)>>,
    /// Last point of each flow, keyed by (cat, id)
    flows: HashMap<(String, String), (String, Coord)>,
    drawables: Vec<Drawable>,
    dropped: usize,
}

impl ChromeTraceConverter {
    fn line_id(&mut self, event: &ChromeTraceEvent) -> i32 {
        let key = (id_string(event.pid.as_ref()), id_string(event.tid.as_ref()));
        if let Some(&line) = self.line_ids.get(&key) {
            return line;
        }
        let line = i32::try_from(self.lines.len()).unwrap_or(i32::MAX);
        self.lines.push(key.clone());
        self.line_ids.insert(key, line);
        line
    }

    fn category(&mut self, name: &str, topology: Topology) -> Arc<Category> {
        let key = (name.to_string(), topology);
        if let Some(category) = self.categories.get(&key) {
            return Arc::clone(category);
        }
        let index = i32::try_from(self.categories.len()).unwrap_or(i32::MAX);
        let category = self.table.insert(Category::new(index, name, topology, default_color(name)));
        self.categories.insert(key, Arc::clone(&category));
        category
    }

    /// Convert one event; `index` is its position in the trace, for errors
    fn push_event(&mut self, index: usize, event: &ChromeTraceEvent) -> Result<(), ConvertError> {
        let ph = event.ph.as_deref().ok_or(ConvertError::MissingField { index, field: "ph" })?;
        if ph == "M" {
            return Ok(());
        }
        let ts = event.ts.ok_or(ConvertError::MissingField { index, field: "ts" })? / MICROS_PER_SECOND;
        let name = event.name.as_deref();
        let require_name = || name.ok_or(ConvertError::MissingField { index, field: "name" });

        match ph {
            "X" => {
                let name = require_name()?;
                let end = ts + event.dur.unwrap_or(0.0) / MICROS_PER_SECOND;
                let line = self.line_id(event);
                let category = self.category(name, Topology::State);
                self.drawables.push(Primitive::state(&category, ts, end, line).into());
            }
            "B" => {
                let name = require_name()?.to_string();
                let line = self.line_id(event);
                self.open.entry(line).or_default().push((name, ts));
            }
            "E" => {
                let line = self.line_id(event);
                match self.open.get_mut(&line).and_then(Vec::pop) {
                    Some((name, start)) => {
                        let category = self.category(&name, Topology::State);
                        self.drawables.push(Primitive::state(&category, start, ts, line).into());
                    }
                    None => {
                        warn!("Event {index}: end without a matching begin on row {line}, dropped");
                        self.dropped += 1;
                    }
                }
            }
            "i" | "I" => {
                let name = require_name()?;
                let line = self.line_id(event);
                let category = self.category(name, Topology::Event);
                self.drawables.push(Primitive::event(&category, ts, line).into());
            }
            "s" | "t" | "f" => {
                let id = event.id.as_ref().ok_or(ConvertError::MissingField { index, field: "id" })?;
                let key = (event.cat.clone().unwrap_or_default(), id_string(Some(id)));
                let here = Coord::new(ts, self.line_id(event));
                if ph != "s" {
                    match self.flows.remove(&key) {
                        Some((flow_name, from)) => {
                            let category = self.category(&flow_name, Topology::Arrow);
                            self.drawables.push(Primitive::arrow(&category, from, here).into());
                        }
                        None => {
                            warn!("Event {index}: flow {} has no start, dropped", key.1);
                            self.dropped += 1;
                        }
                    }
                }
                if ph != "f" {
                    let flow_name = name.unwrap_or("flow").to_string();
                    self.flows.insert(key, (flow_name, here));
                }
            }
            other => debug!("Event {index}: phase {other:?} ignored"),
        }
        Ok(())
    }

    fn finish(mut self) -> ConvertedTrace {
        let unterminated: usize = self.open.values().map(Vec::len).sum();
        if unterminated > 0 {
            warn!("{unterminated} begin events never ended, dropped");
        }
        if !self.flows.is_empty() {
            warn!("{} flows never finished, dropped", self.flows.len());
        }
        let dropped = self.dropped + unterminated + self.flows.len();

        INCRE_STARTTIME_ORDER.sort(&mut self.drawables, |drawable| *drawable.tbox());
        debug!(
            "Converted {} drawables over {} rows with {} categories",
            self.drawables.len(),
            self.lines.len(),
            self.categories.len()
        );
        ConvertedTrace { table: self.table, drawables: self.drawables, lines: self.lines, dropped }
    }
}

/// Convert a Chrome trace held in memory
pub fn convert_str(json: &str) -> Result<ConvertedTrace, ConvertError> {
    let events = match serde_json::from_str::<ChromeTraceFile>(json)? {
        ChromeTraceFile::Object { trace_events } => trace_events,
        ChromeTraceFile::Array(events) => events,
    };
    let mut converter = ChromeTraceConverter::default();
    for (index, event) in events.iter().enumerate() {
        converter.push_event(index, event)?;
    }
    Ok(converter.finish())
}

pub fn convert_file(path: impl AsRef<Path>) -> Result<ConvertedTrace, ConvertError> {
    let content = std::fs::read_to_string(path)?;
    convert_str(&content)
}
