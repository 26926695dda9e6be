//! Sync run protocol: events, outcomes and the caller-side handle.
//!
//! One worker thread produces [`SyncEvent`]s on an `mpsc` channel; one
//! caller consumes them. A run that has not been spawned yet has no handle
//! (the idle state); once running it ends in exactly one of the terminal
//! states carried by the last event.

pub mod engine;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

pub use self::engine::{spawn, Orchestrator, SyncPlan};

/// Where a run currently stands. `Running` transitions into exactly one of
/// the other states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Completed,
    Cancelled,
    Failed(String),
}

/// Result of searching one (holiday, year) window.
#[derive(Debug, Clone, Default)]
pub struct WindowOutcome {
    pub year: i32,
    pub matched_count: usize,
    pub error: Option<String>,
}

/// Aggregated result for one holiday across every year window.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub holiday: String,
    pub album_id: Option<String>,
    /// Distinct assets matched across all windows.
    pub matched_count: usize,
    pub added_count: usize,
    pub already_present_count: usize,
    pub windows: Vec<WindowOutcome>,
    pub error: Option<String>,
}

impl SyncOutcome {
    fn new(holiday: &str) -> Self {
        Self {
            holiday: holiday.to_string(),
            album_id: None,
            matched_count: 0,
            added_count: 0,
            already_present_count: 0,
            windows: Vec::new(),
            error: None,
        }
    }
}

/// Final report: terminal state plus each holiday's outcome.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: RunState,
    pub outcomes: BTreeMap<String, SyncOutcome>,
}

impl RunSummary {
    pub fn total_added(&self) -> usize {
        self.outcomes.values().map(|o| o.added_count).sum()
    }

    pub fn total_matched(&self) -> usize {
        self.outcomes.values().map(|o| o.matched_count).sum()
    }
}

/// Progress events, in order: all of one holiday's events precede the next
/// holiday's, windows arrive in year order, and exactly one terminal event
/// (`Completed`, `Cancelled` or `Failed`) comes last.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started { holidays: usize, windows: usize },
    HolidayStarted { holiday: String },
    WindowCompleted { holiday: String, year: i32, matched: usize, error: Option<String> },
    HolidayCompleted { outcome: SyncOutcome },
    Completed { summary: RunSummary },
    Cancelled { summary: RunSummary },
    Failed { error: String, summary: RunSummary },
}

/// Caller-side handle to a running sync: poll `events`, request cooperative
/// cancellation, join for the final summary.
pub struct SyncHandle {
    pub events: mpsc::Receiver<SyncEvent>,
    cancel_flag: Arc<AtomicBool>,
    thread: std::thread::JoinHandle<RunSummary>,
}

impl SyncHandle {
    /// Requests cancellation. Takes effect at the next window boundary;
    /// in-flight requests finish first and completed work stays.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the worker and returns the final summary.
    pub fn join(self) -> RunSummary {
        self.thread.join().unwrap_or_else(|_| RunSummary {
            state: RunState::Failed("sync worker panicked".to_string()),
            outcomes: BTreeMap::new(),
        })
    }
}
