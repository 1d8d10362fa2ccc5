// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session controller: the single owner of the running workout.
//!
//! Orchestrates start, resume and finish against the remote gateway, applies
//! ledger edits, and keeps the local cache current after every mutation.
//!
//! Operations that wait on the remote store come in three steps so a shared
//! controller is never locked across a network call: `prepare_*` checks
//! state and hands back a fetch, the fetch's `run` talks to the gateway on
//! its own, and `complete_*` applies the result. Every fetch carries the
//! session epoch it was issued under; a result that lands after a newer
//! start, resume or finish is dropped.
//!
//! Set writes are optimistic. The ledger changes first, the remote write is
//! spawned, and its outcome comes back over a channel to update the set's
//! sync state. A failed write is logged and left for later reconciliation;
//! it never rolls back what the user sees.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::db::SessionGateway;
use crate::error::{AppError, Result};
use crate::models::{
    Baseline, Exercise, ExerciseId, Owner, RoutineId, SessionDetail, SessionId, SessionRecord,
    SetKey, SetPatch,
};
use crate::services::cache::{CachedSession, SessionCache};
use crate::services::ledger::{ActiveExercise, SetField, SetLedger, SetPosition};
use crate::services::rest_timer::{RestStatus, RestTimer};
use crate::services::timer::{Clock, ElapsedClock, SystemClock};
use crate::time_utils::format_elapsed;

/// Lifecycle of the controller. A finished session goes straight back to
/// `NoSession`; the finished record is returned from `finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoSession,
    Loading,
    Active,
}

/// Outcome of a spawned set write.
#[derive(Debug)]
struct WriteOutcome {
    session_id: SessionId,
    exercise_id: ExerciseId,
    set_number: u32,
    write_seq: u64,
    succeeded: bool,
}

/// Read-only view handed to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session_id: Option<SessionId>,
    pub elapsed_secs: u64,
    pub elapsed_display: String,
    pub exercises: Vec<ActiveExercise>,
    pub rest: RestStatus,
    /// Weight × reps over completed repetition sets
    pub total_volume: f64,
    pub pending_writes: usize,
    /// Sets whose last remote write failed
    pub failed_writes: Vec<SetPosition>,
}

/// Either an answer the controller already holds or the remote call that
/// produces it.
pub enum Prepared<T, R> {
    Ready(T),
    Remote(R),
}

/// Result of a fetch, tagged with the epoch it was issued under.
pub struct Fetched<T, C = ()> {
    epoch: u64,
    context: C,
    result: Result<T>,
}

/// What a resume found remotely.
pub enum ResumeFound {
    Missing,
    Finished,
    Live(SessionDetail, SetLedger),
}

pub struct CatalogFetch<G> {
    gateway: Arc<G>,
}

impl<G: SessionGateway> CatalogFetch<G> {
    pub async fn run(self) -> Result<Vec<Exercise>> {
        self.gateway.fetch_exercises().await
    }
}

pub struct StartFetch<G> {
    gateway: Arc<G>,
    owner: Owner,
    routine: Option<RoutineId>,
    epoch: u64,
}

impl<G: SessionGateway> StartFetch<G> {
    /// Create the session and, for a routine, load its seeded sets.
    pub async fn run(self) -> Fetched<(SessionRecord, SetLedger), Option<RoutineId>> {
        let result = async {
            let record = self.gateway.create_session(&self.owner, self.routine).await?;
            let ledger = match self.routine {
                Some(_) => match self
                    .gateway
                    .fetch_session_detail(&self.owner, &record.id)
                    .await?
                {
                    Some(detail) => hydrate(self.gateway.as_ref(), &self.owner, &detail).await,
                    None => SetLedger::new(),
                },
                None => SetLedger::new(),
            };
            Ok::<_, AppError>((record, ledger))
        }
        .await;

        Fetched {
            epoch: self.epoch,
            context: self.routine,
            result,
        }
    }
}

pub struct ResumeFetch<G> {
    gateway: Arc<G>,
    owner: Owner,
    session_id: SessionId,
    epoch: u64,
}

impl<G: SessionGateway> ResumeFetch<G> {
    pub async fn run(self) -> Fetched<ResumeFound, SessionId> {
        let result = match self
            .gateway
            .fetch_session_detail(&self.owner, &self.session_id)
            .await
        {
            Ok(Some(detail)) if detail.session.is_finished() => Ok(ResumeFound::Finished),
            Ok(Some(detail)) => {
                let ledger = hydrate(self.gateway.as_ref(), &self.owner, &detail).await;
                Ok(ResumeFound::Live(detail, ledger))
            }
            Ok(None) => Ok(ResumeFound::Missing),
            Err(e) => Err(e),
        };

        Fetched {
            epoch: self.epoch,
            context: self.session_id,
            result,
        }
    }
}

pub struct FinishCall<G> {
    gateway: Arc<G>,
    owner: Owner,
    session_id: SessionId,
    duration_secs: u64,
    ended_at: DateTime<Utc>,
    epoch: u64,
}

impl<G: SessionGateway> FinishCall<G> {
    pub async fn run(self) -> Fetched<SessionRecord, SessionId> {
        let result = self
            .gateway
            .finish_session(&self.owner, &self.session_id, self.duration_secs, self.ended_at)
            .await;

        Fetched {
            epoch: self.epoch,
            context: self.session_id,
            result,
        }
    }
}

pub struct BaselineFetch<G> {
    gateway: Arc<G>,
    owner: Owner,
    exercise_index: usize,
    exercise_id: ExerciseId,
    epoch: u64,
}

impl<G: SessionGateway> BaselineFetch<G> {
    pub async fn run(self) -> Fetched<Option<Baseline>, (usize, ExerciseId)> {
        let result = self
            .gateway
            .fetch_previous_stats(&self.owner, self.exercise_id)
            .await;

        Fetched {
            epoch: self.epoch,
            context: (self.exercise_index, self.exercise_id),
            result,
        }
    }
}

pub struct SessionController<G: SessionGateway> {
    gateway: Arc<G>,
    owner: Option<Owner>,
    cache: SessionCache,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SessionState>,
    session_id: Option<SessionId>,
    /// Bumped whenever the session is reset
    epoch: u64,
    ledger: SetLedger,
    elapsed: ElapsedClock,
    anchor: watch::Sender<Option<DateTime<Utc>>>,
    rest: RestTimer,
    catalog: Vec<Exercise>,
    outcome_tx: mpsc::UnboundedSender<WriteOutcome>,
    outcome_rx: mpsc::UnboundedReceiver<WriteOutcome>,
    in_flight: usize,
    /// Latest spawned write per set document, so same-key writes chain
    write_tails: HashMap<String, JoinHandle<()>>,
}

impl<G: SessionGateway> SessionController<G> {
    pub fn new(
        gateway: Arc<G>,
        owner: Option<Owner>,
        cache: SessionCache,
        clock: Arc<dyn Clock>,
        rest: RestTimer,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionState::NoSession);
        let (anchor, _) = watch::channel(None);

        Self {
            gateway,
            owner,
            cache,
            clock,
            state,
            session_id: None,
            epoch: 0,
            ledger: SetLedger::new(),
            elapsed: ElapsedClock::default(),
            anchor,
            rest,
            catalog: Vec::new(),
            outcome_tx,
            outcome_rx,
            in_flight: 0,
            write_tails: HashMap::new(),
        }
    }

    /// Controller wired from configuration, using the wall clock.
    pub fn from_config(gateway: Arc<G>, config: &Config) -> Self {
        let owner = Owner::resolve(config.owner_id.as_deref(), config.guest_id.as_deref());
        if owner.is_none() {
            tracing::warn!("No owner or guest identity configured; remote calls will be refused");
        }

        Self::new(
            gateway,
            owner,
            SessionCache::open(&config.data_dir),
            Arc::new(SystemClock),
            RestTimer::new(config.rest_timer_secs, config.rest_timer_step_secs),
        )
    }

    // ─── Read Side ───────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn exercises(&self) -> &[ActiveExercise] {
        self.ledger.exercises()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.elapsed_at(self.clock.now())
    }

    /// Lifecycle feed, readable without the controller.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Anchor feed for the elapsed ticker.
    pub fn subscribe_anchor(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.anchor.subscribe()
    }

    pub fn snapshot(&mut self) -> SessionSnapshot {
        self.drain_outcomes();
        let now = self.clock.now();
        let elapsed_secs = self.elapsed.elapsed_at(now);

        SessionSnapshot {
            state: self.state(),
            session_id: self.session_id.clone(),
            elapsed_secs,
            elapsed_display: format_elapsed(elapsed_secs),
            exercises: self.ledger.exercises().to_vec(),
            rest: self.rest.status(now),
            total_volume: self.ledger.total_volume(),
            pending_writes: self.in_flight,
            failed_writes: self.ledger.failed_sets(),
        }
    }

    /// The exercise catalog is fetched once and kept for the controller's
    /// lifetime.
    pub fn prepare_catalog(&self) -> Prepared<Vec<Exercise>, CatalogFetch<G>> {
        if self.catalog.is_empty() {
            Prepared::Remote(CatalogFetch {
                gateway: self.gateway.clone(),
            })
        } else {
            Prepared::Ready(self.catalog.clone())
        }
    }

    pub fn complete_catalog(&mut self, fetched: Result<Vec<Exercise>>) -> Result<Vec<Exercise>> {
        let exercises = fetched?;
        if self.catalog.is_empty() {
            tracing::debug!(count = exercises.len(), "Loaded exercise catalog");
            self.catalog = exercises;
        }
        Ok(self.catalog.clone())
    }

    pub async fn catalog(&mut self) -> Result<Vec<Exercise>> {
        match self.prepare_catalog() {
            Prepared::Ready(exercises) => Ok(exercises),
            Prepared::Remote(fetch) => {
                let fetched = fetch.run().await;
                self.complete_catalog(fetched)
            }
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    /// Hydrate from the local cache slot without touching the network.
    ///
    /// The restored session is not checked against the remote store; a
    /// slot for a session deleted elsewhere shows up when `finish` fails.
    /// Returns whether a session was restored.
    pub fn restore_from_cache(&mut self) -> bool {
        let Some(cached) = self.cache.load() else {
            return false;
        };

        let mut ledger = SetLedger::from_exercises(cached.active_exercises);
        // Writes in flight when the cache was written can no longer report back.
        ledger.fail_pending();

        tracing::info!(
            session_id = %cached.session_id,
            exercises = ledger.exercises().len(),
            "Restored session from local cache"
        );

        self.ledger = ledger;
        self.activate(cached.session_id, cached.anchor);
        true
    }

    /// Begin a new session, optionally seeded from a routine. The previous
    /// session is dropped and the controller reads as `Loading`.
    pub fn prepare_start(&mut self, routine: Option<RoutineId>) -> Result<StartFetch<G>> {
        let owner = self.require_owner()?;
        self.reset();
        self.set_state(SessionState::Loading);

        Ok(StartFetch {
            gateway: self.gateway.clone(),
            owner,
            routine,
            epoch: self.epoch,
        })
    }

    pub fn complete_start(
        &mut self,
        fetched: Fetched<(SessionRecord, SetLedger), Option<RoutineId>>,
    ) -> Result<SessionId> {
        let routine = fetched.context;
        if fetched.epoch != self.epoch {
            if let Ok((record, _)) = &fetched.result {
                tracing::warn!(session_id = %record.id, "Start superseded, created session left unused");
            }
            return Err(AppError::Superseded);
        }

        match fetched.result {
            Ok((record, ledger)) => {
                tracing::info!(session_id = %record.id, routine_id = ?routine, "Workout started");
                self.ledger = ledger;
                self.activate(record.id.clone(), self.clock.now());
                Ok(record.id)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to start workout");
                self.abandon();
                Err(e)
            }
        }
    }

    pub async fn start(&mut self, routine: Option<RoutineId>) -> Result<SessionId> {
        let fetch = self.prepare_start(routine)?;
        let fetched = fetch.run().await;
        self.complete_start(fetched)
    }

    /// Resume a session by id, reconciling against the remote store.
    ///
    /// Ready when that session is already active.
    pub fn prepare_resume(
        &mut self,
        session_id: &SessionId,
    ) -> Result<Prepared<(), ResumeFetch<G>>> {
        if self.state() == SessionState::Active && self.session_id.as_ref() == Some(session_id) {
            tracing::debug!(session_id = %session_id, "Session already active, skipping resume");
            return Ok(Prepared::Ready(()));
        }

        let owner = self.require_owner()?;
        self.reset();
        self.set_state(SessionState::Loading);

        Ok(Prepared::Remote(ResumeFetch {
            gateway: self.gateway.clone(),
            owner,
            session_id: session_id.clone(),
            epoch: self.epoch,
        }))
    }

    pub fn complete_resume(&mut self, fetched: Fetched<ResumeFound, SessionId>) -> Result<()> {
        let session_id = fetched.context;
        if fetched.epoch != self.epoch {
            tracing::debug!(session_id = %session_id, "Resume superseded");
            return Err(AppError::Superseded);
        }

        match fetched.result {
            Ok(ResumeFound::Live(detail, ledger)) => {
                self.ledger = ledger;
                tracing::info!(
                    session_id = %session_id,
                    sets = detail.sets.len(),
                    exercises = self.ledger.exercises().len(),
                    "Workout resumed"
                );
                // Remote start instant is authoritative for the anchor.
                self.activate(session_id, detail.session.started_at);
                Ok(())
            }
            Ok(ResumeFound::Finished) => {
                tracing::warn!(session_id = %session_id, "Session already finished, not resuming");
                self.abandon();
                Err(AppError::NotFound(format!("active session {}", session_id)))
            }
            Ok(ResumeFound::Missing) => {
                tracing::warn!(session_id = %session_id, "Session not found, dropping stale state");
                self.abandon();
                Err(AppError::NotFound(format!("session {}", session_id)))
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Failed to resume workout");
                self.abandon();
                Err(e)
            }
        }
    }

    pub async fn resume(&mut self, session_id: &SessionId) -> Result<()> {
        match self.prepare_resume(session_id)? {
            Prepared::Ready(()) => Ok(()),
            Prepared::Remote(fetch) => {
                let fetched = fetch.run().await;
                self.complete_resume(fetched)
            }
        }
    }

    /// Finish the active session with the locally measured duration. The
    /// session stays active until the remote call succeeds.
    pub fn prepare_finish(&mut self) -> Result<FinishCall<G>> {
        self.drain_outcomes();
        let session_id = self.require_active()?.clone();
        let owner = self.require_owner()?;
        let now = self.clock.now();

        Ok(FinishCall {
            gateway: self.gateway.clone(),
            owner,
            session_id,
            duration_secs: self.elapsed.elapsed_at(now),
            ended_at: now,
            epoch: self.epoch,
        })
    }

    pub fn complete_finish(
        &mut self,
        fetched: Fetched<SessionRecord, SessionId>,
    ) -> Result<SessionRecord> {
        let session_id = fetched.context;
        let record = match fetched.result {
            Ok(record) => record,
            Err(AppError::NotFound(what)) => {
                tracing::warn!(
                    session_id = %session_id,
                    "Session missing remotely, local slot is likely stale"
                );
                return Err(AppError::NotFound(what));
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Failed to finish workout");
                return Err(e);
            }
        };

        if fetched.epoch != self.epoch {
            tracing::debug!(session_id = %session_id, "Finished a session that is no longer current");
            return Ok(record);
        }

        tracing::info!(
            session_id = %session_id,
            duration_secs = record.duration_secs,
            volume = self.ledger.total_volume(),
            "Workout finished"
        );

        self.reset();
        self.set_state(SessionState::NoSession);
        self.clear_cache();
        Ok(record)
    }

    pub async fn finish(&mut self) -> Result<SessionRecord> {
        let call = self.prepare_finish()?;
        let fetched = call.run().await;
        self.complete_finish(fetched)
    }

    /// Wait for every spawned write to report back.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.outcome_rx.recv().await {
                Some(outcome) => self.apply_outcome(outcome),
                None => break,
            }
        }
        self.persist();
    }

    // ─── Ledger Operations ───────────────────────────────────────

    /// Add an exercise from the loaded catalog; returns its index.
    pub fn insert_exercise(&mut self, exercise_id: ExerciseId) -> Result<usize> {
        self.require_active()?;

        let exercise = self
            .catalog
            .iter()
            .find(|e| e.id == exercise_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("exercise {}", exercise_id)))?;

        let index = self.ledger.add_exercise(exercise);
        self.persist();
        Ok(index)
    }

    pub async fn add_exercise(&mut self, exercise_id: ExerciseId) -> Result<usize> {
        self.require_active()?;
        self.catalog().await?;
        self.insert_exercise(exercise_id)
    }

    /// Previous-performance baseline, fetched once per session exercise.
    pub fn prepare_baseline(
        &self,
        exercise_index: usize,
    ) -> Result<Prepared<Option<Baseline>, BaselineFetch<G>>> {
        self.require_active()?;
        let active = self.ledger.exercise(exercise_index)?;
        if active.baseline_loaded {
            return Ok(Prepared::Ready(active.baseline));
        }

        Ok(Prepared::Remote(BaselineFetch {
            gateway: self.gateway.clone(),
            owner: self.require_owner()?,
            exercise_index,
            exercise_id: active.exercise.id,
            epoch: self.epoch,
        }))
    }

    /// A failed fetch is logged and reads as no baseline; it is retried on
    /// the next call.
    pub fn complete_baseline(
        &mut self,
        fetched: Fetched<Option<Baseline>, (usize, ExerciseId)>,
    ) -> Result<Option<Baseline>> {
        let (exercise_index, exercise_id) = fetched.context;
        let baseline = match fetched.result {
            Ok(baseline) => baseline,
            Err(e) => {
                tracing::warn!(exercise_id, error = %e, "Failed to load previous stats");
                return Ok(None);
            }
        };

        let current = self.ledger.exercise(exercise_index).ok().map(|a| a.exercise.id);
        if fetched.epoch != self.epoch || current != Some(exercise_id) {
            tracing::debug!(exercise_id, "Exercise left the session before its baseline arrived");
            return Ok(baseline);
        }

        self.ledger.set_baseline(exercise_index, baseline)?;
        self.persist();
        Ok(baseline)
    }

    pub async fn load_baseline(&mut self, exercise_index: usize) -> Result<Option<Baseline>> {
        match self.prepare_baseline(exercise_index)? {
            Prepared::Ready(baseline) => Ok(baseline),
            Prepared::Remote(fetch) => {
                let fetched = fetch.run().await;
                self.complete_baseline(fetched)
            }
        }
    }

    pub fn add_set(&mut self, exercise_index: usize) -> Result<usize> {
        self.require_active()?;
        let index = self.ledger.add_set(exercise_index)?;
        self.persist();
        Ok(index)
    }

    pub fn update_weight(&mut self, exercise_index: usize, set_index: usize, value: &str) -> Result<()> {
        self.edit_value(exercise_index, set_index, SetField::Weight, value)
    }

    pub fn update_reps(&mut self, exercise_index: usize, set_index: usize, value: &str) -> Result<()> {
        self.edit_value(exercise_index, set_index, SetField::Reps, value)
    }

    /// Local-only edit of a value field.
    pub fn edit_value(
        &mut self,
        exercise_index: usize,
        set_index: usize,
        field: SetField,
        value: &str,
    ) -> Result<()> {
        self.require_active()?;
        self.ledger.edit_value(exercise_index, set_index, field, value)?;
        self.persist();
        Ok(())
    }

    /// Update a note; completed sets also get a partial remote update.
    pub fn set_note(&mut self, exercise_index: usize, set_index: usize, note: &str) -> Result<()> {
        self.require_active()?;
        self.drain_outcomes();

        let completed = self.ledger.set(exercise_index, set_index)?.completed;
        let owner = if completed {
            Some(self.require_owner()?)
        } else {
            None
        };

        self.ledger.set_note(exercise_index, set_index, note)?;

        if let Some(owner) = owner {
            // An empty note in the patch clears the stored one.
            let stored = self.ledger.set(exercise_index, set_index)?.note.clone();
            let patch = SetPatch {
                completed: Some(true),
                note: Some(stored.unwrap_or_default()),
                ..Default::default()
            };
            let gateway = self.gateway.clone();
            self.dispatch(exercise_index, set_index, move |key| async move {
                if gateway.patch_set(&owner, &key, &patch).await? {
                    Ok(())
                } else {
                    Err(AppError::NotFound(format!("set {}", key.document_id())))
                }
            })?;
        }

        self.persist();
        Ok(())
    }

    /// Flip completion. Completing upserts the set remotely and starts the
    /// rest countdown; un-completing stays local.
    pub fn toggle_completion(&mut self, exercise_index: usize, set_index: usize) -> Result<bool> {
        self.require_active()?;
        self.drain_outcomes();
        let owner = self.require_owner()?;

        let completed = self.ledger.toggle_completion(exercise_index, set_index)?;

        if completed {
            self.rest.start(self.clock.now());

            let active = self.ledger.exercise(exercise_index)?;
            let exercise = active.exercise.clone();
            let values = self
                .ledger
                .set(exercise_index, set_index)?
                .values(exercise.tracking);
            let gateway = self.gateway.clone();

            self.dispatch(exercise_index, set_index, move |key| async move {
                gateway.upsert_set(&owner, &key, &exercise, &values).await
            })?;
        }

        self.persist();
        Ok(completed)
    }

    // ─── Rest Timer ──────────────────────────────────────────────

    pub fn rest_status(&self) -> RestStatus {
        self.rest.status(self.clock.now())
    }

    pub fn rest_increment(&mut self) -> RestStatus {
        let now = self.clock.now();
        self.rest.increment(now);
        self.rest.status(now)
    }

    pub fn rest_decrement(&mut self) -> RestStatus {
        let now = self.clock.now();
        self.rest.decrement(now);
        self.rest.status(now)
    }

    pub fn rest_skip(&mut self) -> RestStatus {
        self.rest.skip();
        self.rest_status()
    }

    /// New default countdown for subsequent sets.
    pub fn set_rest_target(&mut self, target_secs: u64) -> RestStatus {
        let now = self.clock.now();
        self.rest.set_target(now, target_secs);
        self.rest.status(now)
    }

    // ─── Internals ───────────────────────────────────────────────

    fn require_owner(&self) -> Result<Owner> {
        self.owner.clone().ok_or(AppError::Unauthorized)
    }

    fn require_active(&self) -> Result<&SessionId> {
        match (&self.session_id, self.state()) {
            (Some(id), SessionState::Active) => Ok(id),
            _ => Err(AppError::NoActiveSession),
        }
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn activate(&mut self, session_id: SessionId, anchor: DateTime<Utc>) {
        self.session_id = Some(session_id);
        self.elapsed.set_anchor(anchor);
        self.anchor.send_replace(Some(anchor));
        self.set_state(SessionState::Active);
        self.persist();
    }

    fn reset(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.session_id = None;
        self.ledger.clear();
        self.elapsed.clear();
        self.anchor.send_replace(None);
        self.rest.skip();
    }

    /// Drop to `NoSession` after a failed start or resume.
    fn abandon(&mut self) {
        self.reset();
        self.set_state(SessionState::NoSession);
        self.clear_cache();
    }

    /// Spawn a remote write for one set and track its outcome.
    fn dispatch<F, Fut>(&mut self, exercise_index: usize, set_index: usize, write: F) -> Result<()>
    where
        F: FnOnce(SetKey) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let session_id = self.require_active()?.clone();
        let exercise_id = self.ledger.exercise(exercise_index)?.exercise.id;
        let set_number = self.ledger.set(exercise_index, set_index)?.set_number;
        let write_seq = self.ledger.mark_pending(exercise_index, set_index)?;

        let key = SetKey::new(session_id.clone(), exercise_id, set_number);
        let doc_id = key.document_id();
        let previous = self.write_tails.remove(&doc_id);
        let fut = write(key);
        let tx = self.outcome_tx.clone();
        self.in_flight += 1;

        let handle = tokio::spawn(async move {
            // Writes to one key land in the order they were issued.
            if let Some(previous) = previous {
                let _ = previous.await;
            }

            let result = fut.await;
            if let Err(e) = &result {
                tracing::warn!(
                    session_id = %session_id,
                    exercise_id,
                    set_number,
                    error = %e,
                    "Set write failed, keeping local state"
                );
            }

            let outcome = WriteOutcome {
                session_id,
                exercise_id,
                set_number,
                write_seq,
                succeeded: result.is_ok(),
            };
            if tx.send(outcome).is_err() {
                tracing::debug!("Controller gone before write outcome was delivered");
            }
        });

        self.write_tails.retain(|_, h| !h.is_finished());
        self.write_tails.insert(doc_id, handle);
        Ok(())
    }

    fn drain_outcomes(&mut self) {
        let mut applied = false;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.apply_outcome(outcome);
            applied = true;
        }
        if applied {
            self.persist();
        }
    }

    fn apply_outcome(&mut self, outcome: WriteOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);

        if self.session_id.as_ref() != Some(&outcome.session_id) {
            tracing::debug!(session_id = %outcome.session_id, "Ignoring write outcome for another session");
            return;
        }

        let applied = self.ledger.apply_sync_outcome(
            outcome.exercise_id,
            outcome.set_number,
            outcome.write_seq,
            outcome.succeeded,
        );
        if !applied {
            tracing::debug!(
                exercise_id = outcome.exercise_id,
                set_number = outcome.set_number,
                write_seq = outcome.write_seq,
                "Ignoring stale write outcome"
            );
        }
    }

    /// Rewrite the cache slot from current state. Failures are logged only.
    fn persist(&self) {
        let (Some(session_id), Some(anchor)) = (&self.session_id, self.elapsed.anchor()) else {
            return;
        };
        if self.state() != SessionState::Active {
            return;
        }

        let cached = CachedSession {
            session_id: session_id.clone(),
            active_exercises: self.ledger.exercises().to_vec(),
            anchor,
        };
        if let Err(e) = self.cache.store(&cached) {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to write session cache");
        }
    }

    fn clear_cache(&self) {
        if let Err(e) = self.cache.clear() {
            tracing::warn!(error = %e, "Failed to clear session cache");
        }
    }
}

/// Build the ledger for a fetched session, with one baseline fetch per
/// distinct exercise.
async fn hydrate<G: SessionGateway>(
    gateway: &G,
    owner: &Owner,
    detail: &SessionDetail,
) -> SetLedger {
    let mut exercise_ids: Vec<ExerciseId> = Vec::new();
    for row in &detail.sets {
        if !exercise_ids.contains(&row.exercise_id) {
            exercise_ids.push(row.exercise_id);
        }
    }

    let fetched = join_all(exercise_ids.into_iter().map(|id| async move {
        (id, gateway.fetch_previous_stats(owner, id).await)
    }))
    .await;

    let mut baselines: HashMap<ExerciseId, Baseline> = HashMap::new();
    for (exercise_id, result) in fetched {
        match result {
            Ok(Some(baseline)) => {
                baselines.insert(exercise_id, baseline);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(exercise_id, error = %e, "Failed to load previous stats");
            }
        }
    }

    SetLedger::from_remote(&detail.sets, &baselines)
}
