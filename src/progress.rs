//! Cross-worker progress reporting.
//!
//! Workers push [`WorkerMessage`]s onto one multi-producer channel; a single
//! supervisor drains it with a short receive timeout and mirrors the deltas
//! into an `indicatif` display with one bar per `(partition, field)` pair.
//! Progress is advisory only; correctness never depends on it.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

/// Message sent from a partition worker to the supervisor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// `rows` additional rows of `field` were written in `partition`.
    Progress {
        partition: usize,
        field: String,
        rows: u64,
    },
    /// The worker for `partition` finished, successfully or not.
    Done {
        partition: usize,
        result: anyhow::Result<PathBuf>,
    },
}

/// Where encoders report row completions.
#[derive(Clone)]
pub enum ProgressSink {
    /// Forward to the supervisor channel.
    Channel(Sender<WorkerMessage>),
    /// Discard (validation-only runs, tests).
    Null,
}

impl ProgressSink {
    /// Report `rows` completed rows. Send failures are ignored: a dropped
    /// supervisor must not fail the encode.
    pub fn advance(&self, partition: usize, field: &str, rows: u64) {
        if let ProgressSink::Channel(tx) = self {
            let _ = tx.send(WorkerMessage::Progress {
                partition,
                field: field.to_string(),
                rows,
            });
        }
    }
}

/// Live display aggregating progress from all partition workers.
pub struct ProgressDisplay {
    multi: MultiProgress,
    bars: HashMap<(usize, String), ProgressBar>,
}

impl ProgressDisplay {
    /// Display on stderr when it is a terminal; hidden otherwise.
    pub fn new(visible: bool) -> Self {
        let multi = if visible {
            MultiProgress::with_draw_target(ProgressDrawTarget::stderr())
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        ProgressDisplay {
            multi,
            bars: HashMap::new(),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{msg:30} [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }

    /// Register a bar for one `(partition, field)` task of `total` rows.
    pub fn add_task(&mut self, partition: usize, field: &str, total: u64) {
        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(Self::style());
        bar.set_message(format!("partition #{partition} ({field})"));
        self.bars.insert((partition, field.to_string()), bar);
    }

    /// Apply one progress delta.
    pub fn advance(&self, partition: usize, field: &str, rows: u64) {
        if let Some(bar) = self.bars.get(&(partition, field.to_string())) {
            bar.inc(rows);
        }
    }

    /// Drop every bar belonging to a finished partition.
    pub fn finish_partition(&mut self, partition: usize) {
        self.bars.retain(|(p, _), bar| {
            if *p == partition {
                bar.finish_and_clear();
                false
            } else {
                true
            }
        });
    }

    /// Print a line above the live bars.
    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }

    /// Clear all remaining bars.
    pub fn clear(&mut self) {
        for bar in self.bars.values() {
            bar.finish_and_clear();
        }
        self.bars.clear();
        let _ = self.multi.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn null_sink_is_silent() {
        ProgressSink::Null.advance(0, "field", 10);
    }

    #[test]
    fn channel_sink_forwards_deltas() {
        let (tx, rx) = mpsc::channel();
        let sink = ProgressSink::Channel(tx);
        sink.advance(2, "audio", 3);
        match rx.recv().unwrap() {
            WorkerMessage::Progress {
                partition,
                field,
                rows,
            } => {
                assert_eq!(partition, 2);
                assert_eq!(field, "audio");
                assert_eq!(rows, 3);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn hidden_display_tracks_tasks() {
        let mut disp = ProgressDisplay::new(false);
        disp.add_task(0, "f", 10);
        disp.advance(0, "f", 4);
        disp.finish_partition(0);
        disp.clear();
    }
}
