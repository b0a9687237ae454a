//! Recording store: soft-delete-aware SQLite persistence for voice evidence.
//!
//! One `recordings` table holds descriptive fields as plain columns and the
//! typed analysis results as JSON columns. All reads imply `is_deleted = 0`
//! unless explicitly overridden (`get_any`).

use crate::error::{EvidenceError, EvidenceResult};
use crate::recording::{AnalysisFailure, AnalysisState, FailureKind, GeoPoint, Recording};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use voxcase_analysis::{EmotionResult, TranscriptionResult};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Fields required to create a recording. The store assigns id, state and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub owner_id: String,
    pub issue_id: Option<String>,
    pub locator: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub duration_secs: f64,
    pub captured_at_ms: i64,
    pub location: Option<GeoPoint>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

/// Query filter for listing recordings. Results are newest-first by capture
/// time and exclude soft-deleted rows.
#[derive(Debug, Clone)]
pub struct RecordingFilter {
    pub owner_id: Option<String>,
    pub issue_id: Option<String>,
    pub emergency_only: bool,
    pub limit: u32,
}

impl Default for RecordingFilter {
    fn default() -> Self {
        Self {
            owner_id: None,
            issue_id: None,
            emergency_only: false,
            limit: 50,
        }
    }
}

/// Storage for recordings and their analysis state.
pub struct RecordingStore {
    db_path: PathBuf,
}

const RECORDING_COLUMNS: &str = "id, owner_id, issue_id, locator, filename, mime_type, size_bytes, \
     duration_secs, captured_at_ms, latitude, longitude, accuracy_m, notes, tags, state, \
     transcription, emotion, is_emergency, emergency_keywords, error_message, error_kind, \
     failed_at_ms, is_deleted, revision, created_at_ms, updated_at_ms";

impl RecordingStore {
    /// Open or create the evidence DB and ensure the recordings table exists.
    pub fn new(db_path: PathBuf) -> EvidenceResult<Self> {
        let this = Self { db_path };
        this.init()?;
        Ok(this)
    }

    /// Default path: VOXCASE_STORAGE_PATH or ./data, then voxcase/evidence.sqlite.
    pub fn default_path() -> PathBuf {
        let base = std::env::var("VOXCASE_STORAGE_PATH").unwrap_or_else(|_| "./data".to_string());
        PathBuf::from(base).join("voxcase").join("evidence.sqlite")
    }

    /// Open storage at the default path.
    pub fn open_default() -> EvidenceResult<Self> {
        Self::new(Self::default_path())
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> EvidenceResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        let _ = conn.pragma_update(None, "foreign_keys", "ON");
        Ok(conn)
    }

    fn init(&self) -> EvidenceResult<()> {
        if let Some(parent) = self.db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                issue_id TEXT NULL,
                locator TEXT NOT NULL,
                filename TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                duration_secs REAL NOT NULL,
                captured_at_ms INTEGER NOT NULL,
                latitude REAL NULL,
                longitude REAL NULL,
                accuracy_m REAL NULL,
                notes TEXT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                state TEXT NOT NULL,
                transcription TEXT NULL,
                emotion TEXT NULL,
                is_emergency INTEGER NOT NULL DEFAULT 0,
                emergency_keywords TEXT NOT NULL DEFAULT '[]',
                error_message TEXT NULL,
                error_kind TEXT NULL,
                failed_at_ms INTEGER NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                revision INTEGER NOT NULL DEFAULT 0,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_recordings_owner ON recordings(owner_id);
            CREATE INDEX IF NOT EXISTS idx_recordings_issue ON recordings(issue_id);
            CREATE INDEX IF NOT EXISTS idx_recordings_captured_at ON recordings(captured_at_ms);
            CREATE INDEX IF NOT EXISTS idx_recordings_emergency ON recordings(is_emergency);
            "#,
        )?;
        Ok(())
    }

    /// Create a new recording in PENDING state and return it.
    pub fn create(&self, new: NewRecording) -> EvidenceResult<Recording> {
        let id = uuid::Uuid::new_v4().to_string();
        let ts = now_ms();
        let tags_json = serde_json::to_string(&new.tags).unwrap_or_else(|_| "[]".to_string());
        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO recordings (
                id, owner_id, issue_id, locator, filename, mime_type, size_bytes,
                duration_secs, captured_at_ms, latitude, longitude, accuracy_m,
                notes, tags, state, is_emergency, emergency_keywords,
                is_deleted, revision, created_at_ms, updated_at_ms
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 0, '[]', 0, 0, ?16, ?16)
            "#,
            params![
                id,
                new.owner_id,
                new.issue_id,
                new.locator,
                new.filename,
                new.mime_type,
                new.size_bytes,
                new.duration_secs,
                new.captured_at_ms,
                new.location.map(|g| g.latitude),
                new.location.map(|g| g.longitude),
                new.location.and_then(|g| g.accuracy_m),
                new.notes,
                tags_json,
                AnalysisState::Pending.as_str(),
                ts,
            ],
        )?;
        Ok(Recording {
            id,
            owner_id: new.owner_id,
            issue_id: new.issue_id,
            locator: new.locator,
            filename: new.filename,
            mime_type: new.mime_type,
            size_bytes: new.size_bytes,
            duration_secs: new.duration_secs,
            captured_at_ms: new.captured_at_ms,
            location: new.location,
            notes: new.notes,
            tags: new.tags,
            state: AnalysisState::Pending,
            transcription: None,
            emotion: None,
            is_emergency: false,
            emergency_keywords: Vec::new(),
            failure: None,
            is_deleted: false,
            revision: 0,
            created_at_ms: ts,
            updated_at_ms: ts,
        })
    }

    /// Get a recording by id. Soft-deleted rows are not visible here.
    pub fn get(&self, id: &str) -> EvidenceResult<Option<Recording>> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {RECORDING_COLUMNS} FROM recordings WHERE id = ?1 AND is_deleted = 0"
        );
        let row = conn
            .query_row(&sql, params![id], row_to_recording)
            .optional()?;
        Ok(row)
    }

    /// Get a recording by id including soft-deleted rows. Used to distinguish
    /// NotFound from Gone.
    pub fn get_any(&self, id: &str) -> EvidenceResult<Option<Recording>> {
        let conn = self.open()?;
        let sql = format!("SELECT {RECORDING_COLUMNS} FROM recordings WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id], row_to_recording)
            .optional()?;
        Ok(row)
    }

    /// List recordings matching the filter, newest capture first.
    pub fn list(&self, filter: &RecordingFilter) -> EvidenceResult<Vec<Recording>> {
        let mut clauses = vec!["is_deleted = 0".to_string()];
        let mut binds: Vec<String> = Vec::new();
        if let Some(ref owner) = filter.owner_id {
            binds.push(owner.clone());
            clauses.push(format!("owner_id = ?{}", binds.len()));
        }
        if let Some(ref issue) = filter.issue_id {
            binds.push(issue.clone());
            clauses.push(format!("issue_id = ?{}", binds.len()));
        }
        if filter.emergency_only {
            clauses.push("is_emergency = 1".to_string());
        }
        let sql = format!(
            "SELECT {RECORDING_COLUMNS} FROM recordings WHERE {} ORDER BY captured_at_ms DESC LIMIT {}",
            clauses.join(" AND "),
            filter.limit.max(1)
        );
        let conn = self.open()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(binds.iter()), row_to_recording)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count non-deleted recordings for an owner.
    pub fn count_for_owner(&self, owner_id: &str) -> EvidenceResult<i64> {
        let conn = self.open()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM recordings WHERE owner_id = ?1 AND is_deleted = 0",
            params![owner_id],
            |r| r.get(0),
        )?;
        Ok(n)
    }

    /// Durably enter PROCESSING, guarded by an optimistic revision check.
    /// Returns false when another request already transitioned the recording
    /// (zero rows matched); the caller maps that to a Conflict.
    /// Clears any previous failure record on re-entry.
    pub fn begin_processing(&self, id: &str, expected_revision: i64) -> EvidenceResult<bool> {
        let conn = self.open()?;
        let changed = conn.execute(
            r#"
            UPDATE recordings
            SET state = ?1, revision = revision + 1,
                error_message = NULL, error_kind = NULL, failed_at_ms = NULL,
                updated_at_ms = ?2
            WHERE id = ?3 AND revision = ?4 AND is_deleted = 0
            "#,
            params![AnalysisState::Processing.as_str(), now_ms(), id, expected_revision],
        )?;
        Ok(changed == 1)
    }

    /// Write the transcription result and the recomputed emergency fields.
    /// Field-scoped: a stored emotion result is never touched here.
    pub fn store_transcription(
        &self,
        id: &str,
        result: &TranscriptionResult,
        is_emergency: bool,
        emergency_keywords: &[String],
    ) -> EvidenceResult<()> {
        let json = serde_json::to_string(result)
            .map_err(|e| EvidenceError::Storage(format!("encode transcription: {}", e)))?;
        let kw_json = serde_json::to_string(emergency_keywords)
            .map_err(|e| EvidenceError::Storage(format!("encode keywords: {}", e)))?;
        let conn = self.open()?;
        conn.execute(
            r#"
            UPDATE recordings
            SET transcription = ?1, is_emergency = ?2, emergency_keywords = ?3, updated_at_ms = ?4
            WHERE id = ?5 AND is_deleted = 0
            "#,
            params![json, is_emergency as i64, kw_json, now_ms(), id],
        )?;
        Ok(())
    }

    /// Write the emotion result and the recomputed emergency fields.
    /// Field-scoped: a stored transcription is never touched here.
    pub fn store_emotion(
        &self,
        id: &str,
        result: &EmotionResult,
        is_emergency: bool,
        emergency_keywords: &[String],
    ) -> EvidenceResult<()> {
        let json = serde_json::to_string(result)
            .map_err(|e| EvidenceError::Storage(format!("encode emotion: {}", e)))?;
        let kw_json = serde_json::to_string(emergency_keywords)
            .map_err(|e| EvidenceError::Storage(format!("encode keywords: {}", e)))?;
        let conn = self.open()?;
        conn.execute(
            r#"
            UPDATE recordings
            SET emotion = ?1, is_emergency = ?2, emergency_keywords = ?3, updated_at_ms = ?4
            WHERE id = ?5 AND is_deleted = 0
            "#,
            params![json, is_emergency as i64, kw_json, now_ms(), id],
        )?;
        Ok(())
    }

    /// Terminal success: PROCESSING → COMPLETED. Results must already be
    /// persisted; this only flips the state.
    pub fn complete(&self, id: &str) -> EvidenceResult<bool> {
        let conn = self.open()?;
        let changed = conn.execute(
            r#"
            UPDATE recordings SET state = ?1, updated_at_ms = ?2
            WHERE id = ?3 AND state = ?4 AND is_deleted = 0
            "#,
            params![
                AnalysisState::Completed.as_str(),
                now_ms(),
                id,
                AnalysisState::Processing.as_str(),
            ],
        )?;
        Ok(changed == 1)
    }

    /// Terminal failure: persist the error record and enter FAILED.
    pub fn fail(&self, id: &str, kind: FailureKind, message: &str) -> EvidenceResult<()> {
        let ts = now_ms();
        let conn = self.open()?;
        conn.execute(
            r#"
            UPDATE recordings
            SET state = ?1, error_message = ?2, error_kind = ?3, failed_at_ms = ?4, updated_at_ms = ?4
            WHERE id = ?5 AND is_deleted = 0
            "#,
            params![AnalysisState::Failed.as_str(), message, kind.as_str(), ts, id],
        )?;
        Ok(())
    }

    /// Soft delete. The row stays for audit; all normal reads exclude it and
    /// it accepts no further analysis transitions. Returns false if the id
    /// was unknown or already deleted.
    pub fn soft_delete(&self, id: &str) -> EvidenceResult<bool> {
        let conn = self.open()?;
        let changed = conn.execute(
            "UPDATE recordings SET is_deleted = 1, updated_at_ms = ?1 WHERE id = ?2 AND is_deleted = 0",
            params![now_ms(), id],
        )?;
        Ok(changed == 1)
    }

    /// Update free-text notes, independent of analysis state.
    pub fn update_notes(&self, id: &str, notes: Option<&str>) -> EvidenceResult<bool> {
        let conn = self.open()?;
        let changed = conn.execute(
            "UPDATE recordings SET notes = ?1, updated_at_ms = ?2 WHERE id = ?3 AND is_deleted = 0",
            params![notes, now_ms(), id],
        )?;
        Ok(changed == 1)
    }

    /// Replace the tag set, independent of analysis state.
    pub fn update_tags(&self, id: &str, tags: &[String]) -> EvidenceResult<bool> {
        let json = serde_json::to_string(tags)
            .map_err(|e| EvidenceError::Storage(format!("encode tags: {}", e)))?;
        let conn = self.open()?;
        let changed = conn.execute(
            "UPDATE recordings SET tags = ?1, updated_at_ms = ?2 WHERE id = ?3 AND is_deleted = 0",
            params![json, now_ms(), id],
        )?;
        Ok(changed == 1)
    }
}

fn json_col<T: serde::de::DeserializeOwned>(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(s) => serde_json::from_str(&s)
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            }),
    }
}

fn row_to_recording(r: &Row<'_>) -> rusqlite::Result<Recording> {
    let latitude: Option<f64> = r.get(9)?;
    let longitude: Option<f64> = r.get(10)?;
    let accuracy_m: Option<f64> = r.get(11)?;
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
            accuracy_m,
        }),
        _ => None,
    };

    let tags: Vec<String> = json_col(13, r.get::<_, Option<String>>(13)?)?.unwrap_or_default();
    let state_str: String = r.get(14)?;
    let state = AnalysisState::parse(&state_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            14,
            rusqlite::types::Type::Text,
            format!("unknown analysis state: {}", state_str).into(),
        )
    })?;
    let transcription = json_col(15, r.get::<_, Option<String>>(15)?)?;
    let emotion = json_col(16, r.get::<_, Option<String>>(16)?)?;
    let emergency_keywords: Vec<String> =
        json_col(18, r.get::<_, Option<String>>(18)?)?.unwrap_or_default();

    let error_message: Option<String> = r.get(19)?;
    let error_kind: Option<String> = r.get(20)?;
    let failed_at_ms: Option<i64> = r.get(21)?;
    let failure = match (error_message, error_kind, failed_at_ms) {
        (Some(message), Some(kind_str), Some(failed_at_ms)) => {
            let kind = FailureKind::parse(&kind_str).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    20,
                    rusqlite::types::Type::Text,
                    format!("unknown failure kind: {}", kind_str).into(),
                )
            })?;
            Some(AnalysisFailure {
                message,
                kind,
                failed_at_ms,
            })
        }
        _ => None,
    };

    Ok(Recording {
        id: r.get(0)?,
        owner_id: r.get(1)?,
        issue_id: r.get(2)?,
        locator: r.get(3)?,
        filename: r.get(4)?,
        mime_type: r.get(5)?,
        size_bytes: r.get(6)?,
        duration_secs: r.get(7)?,
        captured_at_ms: r.get(8)?,
        location,
        notes: r.get(12)?,
        tags,
        state,
        transcription,
        emotion,
        is_emergency: r.get::<_, i64>(17)? != 0,
        emergency_keywords,
        failure,
        is_deleted: r.get::<_, i64>(22)? != 0,
        revision: r.get(23)?,
        created_at_ms: r.get(24)?,
        updated_at_ms: r.get(25)?,
    })
}
