use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LogError, NameKind};
use crate::level::Level;

/// One accepted log call: `[offset, level, ...items]` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub offset: f64,
    pub level: Level,
    pub items: Vec<Value>,
}

impl Serialize for LogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2 + self.items.len()))?;
        seq.serialize_element(&self.offset)?;
        seq.serialize_element(&self.level)?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for LogEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut values = Vec::<Value>::deserialize(deserializer)?.into_iter();
        let offset = values
            .next()
            .and_then(|v| v.as_f64())
            .ok_or_else(|| de::Error::custom("log entry is missing its offset"))?;
        let level = values
            .next()
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| de::Error::custom("log entry is missing its level"))?;
        Ok(Self {
            offset,
            level: Level(level),
            items: values.collect(),
        })
    }
}

/// Offsets of a named timer: `[start]` while open, `[start, end]` once closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSpan {
    pub start: f64,
    pub end: Option<f64>,
}

impl TimerSpan {
    pub fn open(start: f64) -> Self {
        Self { start, end: None }
    }

    pub fn closed(start: f64, end: f64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    pub fn duration(&self) -> Option<f64> {
        self.end.map(|end| end - self.start)
    }
}

impl Serialize for TimerSpan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.end {
            Some(end) => [self.start, end].serialize(serializer),
            None => [self.start].serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TimerSpan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let offsets = Vec::<f64>::deserialize(deserializer)?;
        match offsets.as_slice() {
            [start] => Ok(Self::open(*start)),
            [start, end] => Ok(Self::closed(*start, *end)),
            other => Err(de::Error::invalid_length(
                other.len(),
                &"one or two timer offsets",
            )),
        }
    }
}

/// Everything one transaction logged, delivered once at finalization.
///
/// Offsets are seconds relative to `start`. The `timers`, `events` and
/// `data` sections are left out of the serialized form when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timers: BTreeMap<String, TimerSpan>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub events: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl MessageRecord {
    pub fn new(start: f64) -> Self {
        Self {
            start,
            end: None,
            logs: Vec::new(),
            timers: BTreeMap::new(),
            events: BTreeMap::new(),
            data: Map::new(),
        }
    }

    /// Elapsed seconds of the whole transaction, once sealed.
    pub fn duration(&self) -> Option<f64> {
        self.end
    }

    pub fn is_sealed(&self) -> bool {
        self.end.is_some()
    }

    pub fn timer(&self, name: &str) -> Option<&TimerSpan> {
        self.timers.get(name)
    }

    pub fn event(&self, name: &str) -> Option<f64> {
        self.events.get(name).copied()
    }

    /// Largest offset written so far in any section.
    pub(crate) fn latest_offset(&self) -> f64 {
        let logs = self.logs.iter().map(|entry| entry.offset);
        let timers = self
            .timers
            .values()
            .flat_map(|span| std::iter::once(span.start).chain(span.end));
        let events = self.events.values().copied();
        logs.chain(timers).chain(events).fold(0.0, f64::max)
    }

    pub(crate) fn push_log(&mut self, offset: f64, level: Level, items: Vec<Value>) {
        self.logs.push(LogEntry {
            offset,
            level,
            items,
        });
    }

    pub(crate) fn open_timer(&mut self, name: &str, offset: f64) -> Result<(), LogError> {
        if self.timers.contains_key(name) {
            return Err(LogError::duplicate(NameKind::Timer, name));
        }
        self.timers.insert(name.to_string(), TimerSpan::open(offset));
        Ok(())
    }

    /// Close an open timer. Returns the end offset written, or `None` when
    /// the timer was unknown or already closed.
    pub(crate) fn close_timer(&mut self, name: &str, offset: f64) -> Option<f64> {
        let span = self.timers.get_mut(name)?;
        if span.end.is_some() {
            return None;
        }
        let end = offset.max(span.start);
        span.end = Some(end);
        Some(end)
    }

    pub(crate) fn record_event(&mut self, name: &str, offset: f64) -> Result<(), LogError> {
        if self.events.contains_key(name) {
            return Err(LogError::duplicate(NameKind::Event, name));
        }
        self.events.insert(name.to_string(), offset);
        Ok(())
    }

    /// Stamp `end` and close every timer still open. Returns how many timers
    /// were force-closed; a record that is already sealed is left alone.
    ///
    /// `end` is the clamped finalization offset raised to the latest offset
    /// already recorded. The two only differ after the clock stepped
    /// backwards, and the raise keeps every timer inside `[0, end]`.
    pub(crate) fn seal(&mut self, end: f64) -> usize {
        if self.end.is_some() {
            return 0;
        }
        let end = end.max(self.latest_offset());
        self.end = Some(end);
        let mut closed = 0;
        for span in self.timers.values_mut().filter(|span| span.is_open()) {
            span.end = Some(end);
            closed += 1;
        }
        closed
    }
}
