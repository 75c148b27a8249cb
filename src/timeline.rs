//! Trace entries, as recorded by the browser's performance panel
use crate::error::*;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::io::Read;

/// Entries with this name carry a screenshot in `args.snapshot`
pub const SCREENSHOT: &str = "Screenshot";

/// Category of the entries that define the trace's time range
pub const BOUNDARY_CATEGORY: &str = "devtools.timeline";

/// One recorded event
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub name: String,
    /// Comma-separated category list
    #[serde(default)]
    pub cat: String,
    /// Capture time in microseconds
    #[serde(default, deserialize_with = "timestamp")]
    pub ts: u64,
    #[serde(default)]
    pub args: Option<EntryArgs>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EntryArgs {
    /// Base64-encoded image
    #[serde(default)]
    pub snapshot: Option<String>,
}

impl Entry {
    pub fn new(name: impl Into<String>, cat: impl Into<String>, ts: u64) -> Self {
        Self {
            name: name.into(),
            cat: cat.into(),
            ts,
            args: None,
        }
    }

    /// A screenshot entry carrying `snapshot` (base64)
    pub fn screenshot(cat: impl Into<String>, ts: u64, snapshot: impl Into<String>) -> Self {
        Self {
            args: Some(EntryArgs { snapshot: Some(snapshot.into()) }),
            ..Self::new(SCREENSHOT, cat, ts)
        }
    }

    #[inline]
    pub fn is_screenshot(&self) -> bool {
        self.name == SCREENSHOT
    }

    /// True if one of the categories in `cat` is exactly `category`
    pub fn in_category(&self, category: &str) -> bool {
        self.cat.split(',').any(|c| c.trim() == category)
    }

    pub fn snapshot(&self) -> Option<&str> {
        self.args.as_ref()?.snapshot.as_deref()
    }
}

// Some tracers write fractional microseconds
fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(ts) => Ok(ts),
        Raw::Float(ts) if ts.is_finite() && ts >= 0. => Ok(ts as u64),
        Raw::Float(ts) => Err(D::Error::custom(format!("invalid timestamp {}", ts))),
    }
}

/// First and last timestamp of the boundary entries
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TimeBoundaries {
    pub start: u64,
    pub end: u64,
}

impl TimeBoundaries {
    /// `None` if `end` is before `start`
    #[inline]
    pub fn duration(&self) -> Option<u64> {
        self.end.checked_sub(self.start)
    }
}

/// Recorded events, in capture order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<Entry>,
}

impl From<Vec<Entry>> for Timeline {
    fn from(entries: Vec<Entry>) -> Self {
        Self::new(entries)
    }
}

impl Timeline {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Accepts a bare array of entries, or a trace object with a `traceEvents` array
    pub fn from_value(value: Value) -> CatResult<Self> {
        let entries = match value {
            Value::Array(entries) => entries,
            Value::Object(mut trace) => match trace.remove("traceEvents") {
                Some(Value::Array(entries)) => entries,
                Some(_) => return Err(Error::InvalidInput("traceEvents is not a list of entries".into())),
                None => return Err(Error::InvalidInput("entries are missing".into())),
            },
            Value::Null => return Err(Error::InvalidInput("entries are missing".into())),
            _ => return Err(Error::InvalidInput("entries are not a list".into())),
        };

        let entries = entries.into_iter().enumerate()
            .map(|(n, entry)| {
                serde_json::from_value(entry).map_err(|e| Error::InvalidInput(format!("entry {}: {}", n, e)))
            })
            .collect::<CatResult<Vec<Entry>>>()?;
        Ok(Self::new(entries))
    }

    pub fn from_slice(json: &[u8]) -> CatResult<Self> {
        Self::from_value(serde_json::from_slice(json)?)
    }

    pub fn from_reader(reader: impl Read) -> CatResult<Self> {
        Self::from_value(serde_json::from_reader(reader)?)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Screenshot entries in their original order
    pub fn screenshots(&self) -> Vec<&Entry> {
        self.entries.iter().filter(|e| e.is_screenshot()).collect()
    }

    /// Time range covered by the entries in `category`
    pub fn boundaries(&self, category: &str) -> CatResult<TimeBoundaries> {
        let mut timestamps = self.entries.iter()
            .filter(|e| e.in_category(category))
            .map(|e| e.ts);

        let first = timestamps.next().ok_or_else(|| Error::EmptyTimeline(category.to_owned()))?;
        let (start, end) = timestamps.fold((first, first), |(min, max), ts| (min.min(ts), max.max(ts)));
        Ok(TimeBoundaries { start, end })
    }
}
