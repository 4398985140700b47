//! # txlog-viz
//!
//! Renders the timers of a record as a fixed-width ASCII bar chart.
//!
//! ```text
//!  download file|===============================================|
//!   cache lookup|==============|
//!   update cache               |=========================================|
//!      DB lookup               |======================|
//!     sent reply                                                X
//! ________________________________________________________________________________
//!    times in ms0.2            32.4                             100.7
//!                                                      80.7              119.2
//! ```
//!
//! Rows are ordered by start offset. The two legend lines print start and
//! end offsets in milliseconds at their scaled columns, skipping labels that
//! would crowd the previous one or repeat a value already shown.
//!
//! Output depends only on the input and the width.

use std::collections::HashSet;

use thiserror::Error;
use txlog_core::TimerSpan;

pub const DEFAULT_WIDTH: usize = 80;

/// The name column is never narrower than the legend label.
pub const MIN_NAME_WIDTH: usize = 11;

const LEGEND_LABEL: &str = "times in ms";

/// Columns kept free at the right edge for the trailing bar and labels.
const RIGHT_MARGIN: usize = 8;

/// Labels closer than this fraction of the longest offset to the previous
/// label on the same line are skipped.
const LABEL_SPACING: f64 = 0.05;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VizError {
    #[error("No timers to visualize")]
    MissingInput,
}

#[derive(Debug, Clone)]
struct Bar {
    name: String,
    start: f64,
    end: f64,
}

/// A chart over a set of named timer spans.
#[derive(Debug, Clone)]
pub struct Timeline {
    bars: Vec<Bar>,
    width: usize,
}

impl Timeline {
    /// Collect spans from any name-to-span mapping. Still-open spans are
    /// drawn as instants at their start.
    pub fn new<'a, I, K>(timers: I) -> Self
    where
        I: IntoIterator<Item = (K, &'a TimerSpan)>,
        K: AsRef<str>,
    {
        let bars = timers
            .into_iter()
            .map(|(name, span)| Bar {
                name: name.as_ref().to_string(),
                start: span.start,
                end: span.end.unwrap_or(span.start),
            })
            .collect();
        Self {
            bars,
            width: DEFAULT_WIDTH,
        }
    }

    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn render(&self) -> Result<String, VizError> {
        if self.bars.is_empty() {
            return Err(VizError::MissingInput);
        }

        let max_time = self.bars.iter().map(|bar| bar.end).fold(0.0, f64::max);
        let name_width = self
            .bars
            .iter()
            .map(|bar| bar.name.chars().count() + 1)
            .max()
            .unwrap_or(0)
            .max(MIN_NAME_WIDTH);
        let chart_width = self.width.saturating_sub(name_width + RIGHT_MARGIN);
        let scaling = if max_time > 0.0 && chart_width > 0 {
            chart_width as f64 / max_time
        } else {
            0.0
        };

        let mut bars: Vec<&Bar> = self.bars.iter().collect();
        bars.sort_by(|a, b| a.start.total_cmp(&b.start).then_with(|| a.name.cmp(&b.name)));

        let mut out = String::new();
        for bar in &bars {
            out.push_str(&format!("{:>width$}", bar.name, width = name_width));
            out.push_str(&" ".repeat(columns(bar.start * scaling)));
            let fill = (((bar.end - bar.start) * scaling).floor() as i64) - 1;
            if fill > 0 {
                out.push('|');
                out.push_str(&"=".repeat(fill as usize));
                out.push('|');
            } else {
                out.push('X');
            }
            out.push('\n');
        }
        out.push_str(&"_".repeat(self.width));
        out.push('\n');

        let mut starts: Vec<f64> = self.bars.iter().map(|bar| bar.start).collect();
        starts.sort_by(f64::total_cmp);
        let mut ends: Vec<f64> = self.bars.iter().map(|bar| bar.end).collect();
        ends.sort_by(f64::total_cmp);

        let mut legend = Legend {
            scaling,
            min_gap: max_time * LABEL_SPACING,
            printed: HashSet::new(),
        };
        out.push_str(&format!("{:>width$}", LEGEND_LABEL, width = name_width));
        out.push_str(&legend.line(&starts));
        out.push('\n');
        out.push_str(&" ".repeat(name_width));
        out.push_str(&legend.line(&ends));
        out.push('\n');

        Ok(out)
    }
}

/// Lays out millisecond labels along one legend line.
struct Legend {
    scaling: f64,
    min_gap: f64,
    /// Shared by both lines so a value is printed at most once.
    printed: HashSet<String>,
}

impl Legend {
    fn line(&mut self, values: &[f64]) -> String {
        let mut line = String::new();
        let mut previous: Option<(f64, usize)> = None;

        for &value in values {
            let label = format!("{:.1}", value * 1000.0);
            if self.printed.contains(&label) {
                continue;
            }
            let spaces = match previous {
                Some((last, _)) if value - last < self.min_gap => continue,
                Some((last, last_len)) => {
                    let gap = (self.scaling * (value - last)).floor() as i64 - last_len as i64;
                    gap.max(1) as usize
                }
                None => columns(self.scaling * value),
            };
            line.push_str(&" ".repeat(spaces));
            line.push_str(&label);
            previous = Some((value, label.len()));
            self.printed.insert(label);
        }
        line
    }
}

fn columns(scaled: f64) -> usize {
    scaled.floor().max(0.0) as usize
}

/// Render `timers` at `width` columns.
pub fn viz<'a, I, K>(timers: I, width: usize) -> Result<String, VizError>
where
    I: IntoIterator<Item = (K, &'a TimerSpan)>,
    K: AsRef<str>,
{
    Timeline::new(timers).width(width).render()
}
