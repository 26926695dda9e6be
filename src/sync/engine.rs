//! The sync run loop: resolves windows, searches, reconciles, reports.

use std::collections::{BTreeMap, HashSet};
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use crate::api::ImmichClient;
use crate::calendar::window::{windows_for, PaddingDefaults, SearchWindow};
use crate::calendar::HolidayDefinition;
use crate::config::Config;
use crate::error::{RequestError, SyncError};
use crate::reconcile::{reconcile, MatchSet};

use super::{RunState, RunSummary, SyncEvent, SyncHandle, SyncOutcome, WindowOutcome};

/// Everything a run needs besides the client: which holidays, which years,
/// default padding.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub holidays: Vec<HolidayDefinition>,
    pub start_year: i32,
    pub end_year: i32,
    pub padding: PaddingDefaults,
}

impl SyncPlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            holidays: config.holidays.clone(),
            start_year: config.sync.start_year,
            end_year: config.sync.end_year,
            padding: PaddingDefaults {
                before_days: config.sync.padding_before_days,
                after_days: config.sync.padding_after_days,
            },
        }
    }

    fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    fn window_count(&self) -> usize {
        let per_holiday = (self.end_year - self.start_year + 1).max(0) as usize;
        self.holidays.len() * per_holiday
    }
}

enum HolidayRun {
    Finished(SyncOutcome),
    Cancelled(SyncOutcome),
}

/// Drives one run on the calling thread. The event channel and the cancel
/// flag are injected at construction; nothing else crosses the worker
/// boundary.
pub struct Orchestrator {
    client: ImmichClient,
    plan: SyncPlan,
    events: mpsc::Sender<SyncEvent>,
    cancel_flag: Arc<AtomicBool>,
    /// Server album name -> id, fetched once per run on first use.
    albums: Option<BTreeMap<String, String>>,
}

impl Orchestrator {
    pub fn new(
        client: ImmichClient,
        plan: SyncPlan,
        events: mpsc::Sender<SyncEvent>,
        cancel_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            client,
            plan,
            events,
            cancel_flag,
            albums: None,
        }
    }

    pub fn run(mut self) -> RunSummary {
        let mut summary = RunSummary {
            state: RunState::Running,
            outcomes: BTreeMap::new(),
        };
        self.send(SyncEvent::Started {
            holidays: self.plan.holidays.len(),
            windows: self.plan.window_count(),
        });

        let holidays = self.plan.holidays.clone();
        for def in &holidays {
            if self.cancelled() {
                tracing::info!("cancellation requested, stopping run");
                summary.state = RunState::Cancelled;
                self.send(SyncEvent::Cancelled { summary: summary.clone() });
                return summary;
            }

            self.send(SyncEvent::HolidayStarted { holiday: def.name.clone() });
            match self.run_holiday(def) {
                Ok(HolidayRun::Finished(outcome)) => {
                    self.send(SyncEvent::HolidayCompleted { outcome: outcome.clone() });
                    summary.outcomes.insert(def.name.clone(), outcome);
                }
                Ok(HolidayRun::Cancelled(outcome)) => {
                    // Partial outcome is kept in the summary; no completion
                    // event for a holiday that was cut short.
                    summary.outcomes.insert(def.name.clone(), outcome);
                    summary.state = RunState::Cancelled;
                    self.send(SyncEvent::Cancelled { summary: summary.clone() });
                    return summary;
                }
                Err(fatal) => {
                    tracing::error!(error = %fatal, "fatal error, aborting run");
                    summary.state = RunState::Failed(fatal.to_string());
                    self.send(SyncEvent::Failed {
                        error: fatal.to_string(),
                        summary: summary.clone(),
                    });
                    return summary;
                }
            }
        }

        summary.state = RunState::Completed;
        self.send(SyncEvent::Completed { summary: summary.clone() });
        summary
    }

    /// `Err` only for fatal errors; everything else is folded into the
    /// holiday's outcome.
    fn run_holiday(&mut self, def: &HolidayDefinition) -> Result<HolidayRun, SyncError> {
        let mut outcome = SyncOutcome::new(&def.name);

        let windows = match windows_for(def, self.plan.years(), self.plan.padding) {
            Ok(windows) => windows,
            Err(e) => {
                tracing::error!(holiday = %def.name, error = %e, "skipping holiday");
                outcome.error = Some(e.to_string());
                return Ok(HolidayRun::Finished(outcome));
            }
        };

        let mut matched = MatchSet::default();
        for window in &windows {
            if self.cancelled() {
                return Ok(HolidayRun::Cancelled(outcome));
            }

            let mut window_outcome = WindowOutcome {
                year: window.year,
                ..WindowOutcome::default()
            };
            match self.search_window(window, &mut matched) {
                Ok(count) => window_outcome.matched_count = count,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(holiday = %def.name, year = window.year, error = %e, "window search failed");
                    window_outcome.error = Some(e.to_string());
                }
            }

            self.send(SyncEvent::WindowCompleted {
                holiday: def.name.clone(),
                year: window.year,
                matched: window_outcome.matched_count,
                error: window_outcome.error.clone(),
            });
            outcome.windows.push(window_outcome);
        }

        outcome.matched_count = matched.len();

        match self.reconcile_holiday(def, &matched, &mut outcome) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(holiday = %def.name, error = %e, "album reconciliation failed");
                outcome.error = Some(e.to_string());
            }
        }

        Ok(HolidayRun::Finished(outcome))
    }

    fn search_window(
        &self,
        window: &SearchWindow,
        matched: &mut MatchSet,
    ) -> Result<usize, SyncError> {
        let mut found = 0;
        for item in self.client.search(window) {
            let asset = item.map_err(|e| self.search_error(window, e))?;
            found += 1;
            matched.insert(asset);
        }
        tracing::debug!(holiday = %window.holiday, year = window.year, found, "window searched");
        Ok(found)
    }

    /// Membership is fetched once per holiday; the album itself is created
    /// lazily, only when there is something to add.
    fn reconcile_holiday(
        &mut self,
        def: &HolidayDefinition,
        matched: &MatchSet,
        outcome: &mut SyncOutcome,
    ) -> Result<(), SyncError> {
        if matched.is_empty() {
            tracing::info!(holiday = %def.name, "no assets matched");
            return Ok(());
        }

        let album_id = self.cached_album_id(def)?;
        let membership = match &album_id {
            Some(id) => self
                .client
                .album_asset_ids(id)
                .map_err(|e| self.album_error(def, "fetch", e))?,
            None => HashSet::new(),
        };

        let plan = reconcile(matched, &membership);
        outcome.already_present_count = plan.already_present.len();
        outcome.album_id = album_id.clone();

        if plan.to_add.is_empty() {
            tracing::info!(holiday = %def.name, "album already up to date");
            return Ok(());
        }

        let album_id = match album_id {
            Some(id) => id,
            None => {
                let created = self
                    .client
                    .create_album(def.album_name())
                    .map_err(|e| self.album_error(def, "create", e))?;
                if let Some(albums) = self.albums.as_mut() {
                    albums.insert(created.album_name.clone(), created.id.clone());
                }
                created.id
            }
        };

        let ids: Vec<String> = plan.to_add.iter().map(|a| a.id.clone()).collect();
        let report = self
            .client
            .add_assets(&album_id, &ids)
            .map_err(|e| self.album_error(def, "add", e))?;

        outcome.added_count = report.added;
        outcome.already_present_count += report.duplicates;
        if !report.failures.is_empty() {
            tracing::warn!(holiday = %def.name, failures = report.failures.len(), "some assets failed to add");
            outcome.error = Some(format!("{} asset(s) failed to add", report.failures.len()));
        }
        outcome.album_id = Some(album_id);

        tracing::info!(
            holiday = %def.name,
            added = outcome.added_count,
            already_present = outcome.already_present_count,
            "holiday reconciled"
        );
        Ok(())
    }

    /// Album id for this holiday's target album, from the run-level cache of
    /// the server's album list. `None` means the album does not exist yet.
    fn cached_album_id(&mut self, def: &HolidayDefinition) -> Result<Option<String>, SyncError> {
        if self.albums.is_none() {
            let listed = self
                .client
                .list_albums()
                .map_err(|e| self.album_error(def, "list", e))?;
            self.albums = Some(listed.into_iter().map(|a| (a.album_name, a.id)).collect());
        }

        Ok(self
            .albums
            .as_ref()
            .and_then(|albums| albums.get(def.album_name()).cloned()))
    }

    fn search_error(&self, window: &SearchWindow, err: RequestError) -> SyncError {
        if err.is_unauthorized() {
            SyncError::Authentication
        } else {
            SyncError::SearchFailed {
                holiday: window.holiday.clone(),
                year: window.year,
                source: err,
            }
        }
    }

    fn album_error(
        &self,
        def: &HolidayDefinition,
        operation: &'static str,
        err: RequestError,
    ) -> SyncError {
        if err.is_unauthorized() {
            SyncError::Authentication
        } else {
            SyncError::AlbumOperation {
                holiday: def.name.clone(),
                operation,
                source: err,
            }
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    fn send(&self, event: SyncEvent) {
        // The caller may have dropped the receiver; the run still finishes.
        let _ = self.events.send(event);
    }
}

/// Launches a run on a dedicated worker thread. The channel and the cancel
/// flag are created here and shared with nothing but the returned handle.
pub fn spawn(client: ImmichClient, plan: SyncPlan) -> SyncHandle {
    let (tx, rx) = mpsc::channel();
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let worker_flag = cancel_flag.clone();

    let thread =
        std::thread::spawn(move || Orchestrator::new(client, plan, tx, worker_flag).run());

    SyncHandle {
        events: rx,
        cancel_flag,
        thread,
    }
}
