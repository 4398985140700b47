use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use txlog_core::MessageRecord;
use txlog_logging::read_records;

/// Load records from a JSON lines file, or from a file holding one JSON
/// record (possibly pretty-printed).
pub fn load_records(path: &Path) -> Result<Vec<MessageRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if let Ok(record) = serde_json::from_str::<MessageRecord>(&content) {
        return Ok(vec![record]);
    }

    read_records(path).with_context(|| format!("Failed to parse records in {}", path.display()))
}

/// Header line shown above each chart.
pub fn describe(index: usize, record: &MessageRecord) -> String {
    let duration = match record.end {
        Some(end) => format!("{:.1} ms", end * 1000.0),
        None => "unsealed".to_string(),
    };
    format!(
        "record {} | start {:.6} | {} | {} logs, {} timers, {} events",
        index,
        record.start,
        duration,
        record.logs.len(),
        record.timers.len(),
        record.events.len()
    )
}

/// Print the timeline of every record in `path` (or only record `index`).
pub fn handle_viz_command(path: &Path, width: usize, index: Option<usize>) -> Result<()> {
    let records = load_records(path)?;
    tracing::debug!(count = records.len(), path = %path.display(), "loaded records");

    if records.is_empty() {
        println!("{}", "No records found.".dimmed());
        return Ok(());
    }

    let selected: Vec<(usize, &MessageRecord)> = match index {
        Some(i) => {
            let record = records.get(i).with_context(|| {
                format!("Record {} out of range ({} records)", i, records.len())
            })?;
            vec![(i, record)]
        }
        None => records.iter().enumerate().collect(),
    };

    for (i, record) in selected {
        println!("{}", describe(i, record).dimmed());
        print_chart(record, width)?;
        println!();
    }

    Ok(())
}

pub fn print_chart(record: &MessageRecord, width: usize) -> Result<()> {
    if record.timers.is_empty() {
        println!("{}", "No timers recorded.".dimmed());
        return Ok(());
    }
    let chart = txlog_viz::viz(&record.timers, width)?;
    print!("{}", chart);
    Ok(())
}
