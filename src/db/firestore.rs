// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper implementing the session gateway.
//!
//! Provides typed operations for:
//! - Workout sessions (creation, finish)
//! - Sets (upsert on the natural key, partial updates)
//! - Exercises and routines (read-only reference data)

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};

use crate::db::{collections, sort_set_records, SessionGateway};
use crate::error::AppError;
use crate::models::{
    resolve_duration, Baseline, Exercise, ExerciseId, Owner, Routine, RoutineId, SessionDetail,
    SessionId, SessionRecord, SetKey, SetPatch, SetRecord, SetValues,
};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Session Operations ──────────────────────────────────────

    /// Get a session by ID, hiding sessions that belong to someone else.
    async fn get_owned_session(
        &self,
        owner: &Owner,
        session_id: &SessionId,
    ) -> Result<Option<SessionRecord>, AppError> {
        let session: Option<SessionRecord> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WORKOUT_SESSIONS)
            .obj()
            .one(session_id.as_str())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(session.filter(|s| &s.owner == owner))
    }

    async fn set_session(&self, session: &SessionRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::WORKOUT_SESSIONS)
            .document_id(session.id.as_str())
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Set Operations ──────────────────────────────────────────

    async fn get_set(&self, key: &SetKey) -> Result<Option<SetRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SETS)
            .obj()
            .one(&key.document_id())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_set(&self, record: &SetRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SETS)
            .document_id(record.key().document_id())
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Store multiple set rows.
    ///
    /// Uses concurrent writes with a limit to avoid overloading Firestore.
    async fn batch_set_sets(&self, records: &[SetRecord]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(records.to_vec())
            .map(|record| async move {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::SETS)
                    .document_id(record.key().document_id())
                    .object(&record)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    // ─── Reference Data ─────────────────────────────────────────

    async fn get_routine(&self, routine_id: RoutineId) -> Result<Option<Routine>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ROUTINES)
            .obj()
            .one(&routine_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

impl SessionGateway for FirestoreDb {
    async fn create_session(
        &self,
        owner: &Owner,
        routine: Option<RoutineId>,
    ) -> Result<SessionRecord, AppError> {
        let now = Utc::now();
        let session = SessionRecord {
            id: SessionId::generate(),
            owner: owner.clone(),
            started_at: now,
            ended_at: None,
            duration_secs: None,
            notes: routine.map(|_| "Started from Routine".to_string()),
        };
        self.set_session(&session).await?;

        if let Some(routine_id) = routine {
            match self
                .get_routine(routine_id)
                .await?
                .filter(|r| &r.owner == owner)
            {
                Some(routine) => {
                    let seeded = routine.seed_sets(&session.id, now);
                    self.batch_set_sets(&seeded).await?;
                    tracing::debug!(
                        session_id = %session.id,
                        routine_id,
                        count = seeded.len(),
                        "Seeded sets from routine"
                    );
                }
                None => {
                    tracing::warn!(routine_id, "Routine not found, starting empty session");
                }
            }
        }

        tracing::info!(session_id = %session.id, owner = %owner, "Session created");
        Ok(session)
    }

    async fn fetch_session_detail(
        &self,
        owner: &Owner,
        session_id: &SessionId,
    ) -> Result<Option<SessionDetail>, AppError> {
        let Some(session) = self.get_owned_session(owner, session_id).await? else {
            return Ok(None);
        };

        let mut sets: Vec<SetRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SETS)
            .filter(|q| {
                q.for_all([
                    q.field("session_id").eq(session_id.as_str()),
                    q.field("owner").eq(owner.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        sort_set_records(&mut sets);

        Ok(Some(SessionDetail { session, sets }))
    }

    async fn fetch_previous_stats(
        &self,
        owner: &Owner,
        exercise_id: ExerciseId,
    ) -> Result<Option<Baseline>, AppError> {
        let latest: Vec<SetRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SETS)
            .filter(|q| {
                q.for_all([
                    q.field("owner").eq(owner.as_str()),
                    q.field("exercise_id").eq(exercise_id),
                    q.field("completed").eq(true),
                ])
            })
            .order_by([("updated_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(latest.into_iter().next().map(|r| Baseline {
            weight: r.weight,
            reps: r.reps,
        }))
    }

    async fn upsert_set(
        &self,
        owner: &Owner,
        key: &SetKey,
        exercise: &Exercise,
        values: &SetValues,
    ) -> Result<(), AppError> {
        let now = Utc::now();

        // Read first so the original creation stamp (used for ordering) survives.
        let created_at = match self.get_set(key).await? {
            Some(existing) if &existing.owner != owner => {
                return Err(AppError::NotFound(format!("set {}", key.document_id())));
            }
            Some(existing) => existing.created_at,
            None => now,
        };

        let record = SetRecord {
            owner: owner.clone(),
            session_id: key.session_id.clone(),
            exercise_id: key.exercise_id,
            exercise_name: exercise.name.clone(),
            tracking: exercise.tracking,
            set_number: key.set_number,
            weight: Some(values.weight),
            reps: Some(values.reps),
            completed: values.completed,
            note: values.note.clone(),
            created_at,
            updated_at: now,
        };

        self.set_set(&record).await?;
        tracing::debug!(
            session_id = %key.session_id,
            exercise_id = key.exercise_id,
            set_number = key.set_number,
            "Set upserted"
        );
        Ok(())
    }

    async fn patch_set(
        &self,
        owner: &Owner,
        key: &SetKey,
        patch: &SetPatch,
    ) -> Result<bool, AppError> {
        let Some(mut record) = self.get_set(key).await?.filter(|r| &r.owner == owner) else {
            tracing::debug!(set = %key.document_id(), "Patch skipped, no stored row");
            return Ok(false);
        };

        record.apply_patch(patch, Utc::now());
        self.set_set(&record).await?;
        Ok(true)
    }

    async fn finish_session(
        &self,
        owner: &Owner,
        session_id: &SessionId,
        duration_secs: u64,
        ended_at: DateTime<Utc>,
    ) -> Result<SessionRecord, AppError> {
        let mut session = self
            .get_owned_session(owner, session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {}", session_id)))?;

        session.duration_secs = Some(resolve_duration(
            duration_secs,
            session.started_at,
            ended_at,
        ));
        session.ended_at = Some(ended_at);
        self.set_session(&session).await?;

        tracing::info!(
            session_id = %session_id,
            duration_secs = session.duration_secs,
            "Session finished"
        );
        Ok(session)
    }

    async fn fetch_exercises(&self) -> Result<Vec<Exercise>, AppError> {
        let mut exercises: Vec<Exercise> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::EXERCISES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        exercises.sort_by_key(|e| e.id);
        Ok(exercises)
    }
}
