//! SQLite-backed discovery store.

use super::models::*;
use super::schema::DISCOVERY_VERSIONED_SCHEMAS;
use super::store::*;
use crate::sqlite_persistence::open_versioned_database;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};

const JOB_COLUMNS: &str = "id, engagement_id, status, input_call_ids, raw_response, \
     extracted_data, error_message, model_used, input_tokens, output_tokens, \
     created_at, started_at, completed_at";

const CALL_COLUMNS: &str = "id, engagement_id, external_id, title, started_at, \
     duration_seconds, participant_emails, url, transcript, transcript_fetched_at, \
     selected_for_analysis, created_at, updated_at";

const VALUE_FRAMEWORK_COLUMNS: &str = "engagement_id, current_challenges, impact, \
     ideal_future_state, everyday_metrics, core_requirements, ai_generated, \
     ai_confidence_score, source_call_ids, version, created_at, updated_at";

/// Stores engagements, calls, analysis jobs and value frameworks in a single
/// database.
#[derive(Clone)]
pub struct SqliteDiscoveryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDiscoveryStore {
    /// Opens an existing database or creates a new one with the current schema.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_database(db_path, DISCOVERY_VERSIONED_SCHEMAS, "discovery")?;
        Ok(SqliteDiscoveryStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store for testing.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = crate::sqlite_persistence::open_in_memory_database(DISCOVERY_VERSIONED_SCHEMAS)?;
        Ok(SqliteDiscoveryStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_engagement(row: &Row) -> rusqlite::Result<Engagement> {
        Ok(Engagement {
            id: row.get("id")?,
            account_name: row.get("account_name")?,
            account_domain: row.get("account_domain")?,
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_call(row: &Row) -> rusqlite::Result<Call> {
        Ok(Call {
            id: row.get("id")?,
            engagement_id: row.get("engagement_id")?,
            external_id: row.get("external_id")?,
            title: row.get("title")?,
            started_at: row.get("started_at")?,
            duration_seconds: row.get("duration_seconds")?,
            participant_emails: json_column(row, "participant_emails")?.unwrap_or_default(),
            url: row.get("url")?,
            transcript: row.get("transcript")?,
            transcript_fetched_at: row.get("transcript_fetched_at")?,
            selected_for_analysis: row.get("selected_for_analysis")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_job(row: &Row) -> rusqlite::Result<AnalysisJob> {
        let status_str: String = row.get("status")?;
        let status = JobStatus::from_db_str(&status_str).ok_or_else(|| {
            conversion_error(format!("unknown job status '{}'", status_str).into())
        })?;
        let input_tokens: Option<i64> = row.get("input_tokens")?;
        let output_tokens: Option<i64> = row.get("output_tokens")?;
        let token_usage = match (input_tokens, output_tokens) {
            (Some(input_tokens), Some(output_tokens)) => Some(TokenUsage {
                input_tokens,
                output_tokens,
            }),
            _ => None,
        };
        Ok(AnalysisJob {
            id: row.get("id")?,
            engagement_id: row.get("engagement_id")?,
            status,
            input_call_ids: json_column(row, "input_call_ids")?.unwrap_or_default(),
            raw_response: row.get("raw_response")?,
            extracted_data: json_column(row, "extracted_data")?,
            error_message: row.get("error_message")?,
            model_used: row.get("model_used")?,
            token_usage,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    fn row_to_value_framework(row: &Row) -> rusqlite::Result<ValueFramework> {
        Ok(ValueFramework {
            engagement_id: row.get("engagement_id")?,
            current_challenges: row.get("current_challenges")?,
            impact: row.get("impact")?,
            ideal_future_state: row.get("ideal_future_state")?,
            everyday_metrics: row.get("everyday_metrics")?,
            core_requirements: row.get("core_requirements")?,
            ai_generated: row.get("ai_generated")?,
            ai_confidence_score: row.get("ai_confidence_score")?,
            source_call_ids: json_column(row, "source_call_ids")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn query_call(conn: &Connection, id: &str) -> Result<Option<Call>> {
        let call = conn
            .query_row(
                &format!("SELECT {} FROM calls WHERE id = ?1", CALL_COLUMNS),
                params![id],
                Self::row_to_call,
            )
            .optional()?;
        Ok(call)
    }

    fn query_value_framework(conn: &Connection, engagement_id: &str) -> Result<Option<ValueFramework>> {
        let value_framework = conn
            .query_row(
                &format!(
                    "SELECT {} FROM value_frameworks WHERE engagement_id = ?1",
                    VALUE_FRAMEWORK_COLUMNS
                ),
                params![engagement_id],
                Self::row_to_value_framework,
            )
            .optional()?;
        Ok(value_framework)
    }

    /// Reads back a value framework after a guarded UPDATE touched `changed` rows.
    fn versioned_write_outcome(
        conn: &Connection,
        engagement_id: &str,
        changed: usize,
    ) -> Result<VersionedWrite> {
        match Self::query_value_framework(conn, engagement_id)? {
            None => Ok(VersionedWrite::NotFound),
            Some(vf) if changed == 0 => Ok(VersionedWrite::VersionMismatch {
                current: vf.version,
            }),
            Some(vf) => Ok(VersionedWrite::Written(vf)),
        }
    }
}

fn conversion_error(err: Box<dyn std::error::Error + Send + Sync>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, err)
}

/// Reads a nullable TEXT column holding JSON.
fn json_column<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(column)? {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| conversion_error(Box::new(e))),
    }
}

impl EngagementStore for SqliteDiscoveryStore {
    fn create_engagement(
        &self,
        account_name: &str,
        account_domain: Option<&str>,
    ) -> Result<Engagement> {
        let engagement = Engagement {
            id: uuid::Uuid::new_v4().to_string(),
            account_name: account_name.to_string(),
            account_domain: account_domain.map(str::to_string),
            created_at: now_millis(),
        };

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO engagements (id, account_name, account_domain, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                engagement.id,
                engagement.account_name,
                engagement.account_domain,
                engagement.created_at,
            ],
        )?;
        tx.execute(
            "INSERT INTO value_frameworks (engagement_id, created_at, updated_at)
             VALUES (?1, ?2, ?2)",
            params![engagement.id, engagement.created_at],
        )?;
        tx.commit()?;

        Ok(engagement)
    }

    fn get_engagement(&self, id: &str) -> Result<Option<Engagement>> {
        let conn = self.conn.lock().unwrap();
        let engagement = conn
            .query_row(
                "SELECT id, account_name, account_domain, created_at FROM engagements WHERE id = ?1",
                params![id],
                Self::row_to_engagement,
            )
            .optional()?;
        Ok(engagement)
    }
}

impl CallStore for SqliteDiscoveryStore {
    fn upsert_call(&self, engagement_id: &str, metadata: &CallMetadata) -> Result<Call> {
        let now = now_millis();
        let participants = serde_json::to_string(&metadata.participant_emails)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO calls (
                id, engagement_id, external_id, title, started_at, duration_seconds,
                participant_emails, url, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT (engagement_id, external_id) DO UPDATE SET
                title = excluded.title,
                started_at = excluded.started_at,
                duration_seconds = excluded.duration_seconds,
                participant_emails = excluded.participant_emails,
                url = excluded.url,
                updated_at = excluded.updated_at",
            params![
                uuid::Uuid::new_v4().to_string(),
                engagement_id,
                metadata.external_id,
                metadata.title,
                metadata.started_at,
                metadata.duration_seconds,
                participants,
                metadata.url,
                now,
            ],
        )?;

        conn.query_row(
            &format!(
                "SELECT {} FROM calls WHERE engagement_id = ?1 AND external_id = ?2",
                CALL_COLUMNS
            ),
            params![engagement_id, metadata.external_id],
            Self::row_to_call,
        )
        .context("Upserted call not found")
    }

    fn get_call(&self, id: &str) -> Result<Option<Call>> {
        let conn = self.conn.lock().unwrap();
        Self::query_call(&conn, id)
    }

    fn list_calls(&self, engagement_id: &str) -> Result<Vec<Call>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM calls WHERE engagement_id = ?1
             ORDER BY started_at IS NULL, started_at DESC, rowid DESC",
            CALL_COLUMNS
        ))?;
        let calls = stmt
            .query_map(params![engagement_id], Self::row_to_call)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(calls)
    }

    fn list_analyzable_calls(&self, engagement_id: &str) -> Result<Vec<Call>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM calls
             WHERE engagement_id = ?1 AND selected_for_analysis = 1 AND transcript IS NOT NULL
             ORDER BY started_at IS NULL, started_at ASC, rowid ASC",
            CALL_COLUMNS
        ))?;
        let calls = stmt
            .query_map(params![engagement_id], Self::row_to_call)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(calls)
    }

    fn set_transcript(&self, call_id: &str, transcript: &str) -> Result<Option<Call>> {
        let now = now_millis();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE calls SET transcript = ?2, transcript_fetched_at = ?3, updated_at = ?3
             WHERE id = ?1",
            params![call_id, transcript, now],
        )?;
        Self::query_call(&conn, call_id)
    }

    fn set_selected(&self, call_id: &str, selected: bool) -> Result<Option<Call>> {
        let now = now_millis();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE calls SET selected_for_analysis = ?2, updated_at = ?3 WHERE id = ?1",
            params![call_id, selected, now],
        )?;
        Self::query_call(&conn, call_id)
    }
}

impl AnalysisStore for SqliteDiscoveryStore {
    fn insert_job(&self, job: &AnalysisJob) -> Result<()> {
        let input_call_ids = serde_json::to_string(&job.input_call_ids)?;
        let extracted_data = job
            .extracted_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO analysis_jobs ({}) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13
                )",
                JOB_COLUMNS
            ),
            params![
                job.id,
                job.engagement_id,
                job.status.as_db_str(),
                input_call_ids,
                job.raw_response,
                extracted_data,
                job.error_message,
                job.model_used,
                job.token_usage.map(|u| u.input_tokens),
                job.token_usage.map(|u| u.output_tokens),
                job.created_at,
                job.started_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    }

    fn get_job(&self, id: &str) -> Result<Option<AnalysisJob>> {
        let conn = self.conn.lock().unwrap();
        let job = conn
            .query_row(
                &format!("SELECT {} FROM analysis_jobs WHERE id = ?1", JOB_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    fn list_jobs(&self, engagement_id: &str) -> Result<Vec<AnalysisJob>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM analysis_jobs WHERE engagement_id = ?1
             ORDER BY created_at DESC, rowid DESC",
            JOB_COLUMNS
        ))?;
        let jobs = stmt
            .query_map(params![engagement_id], Self::row_to_job)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    fn claim_for_processing(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE analysis_jobs SET status = 'processing', started_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, now_millis()],
        )?;
        Ok(changed > 0)
    }

    fn mark_completed(&self, id: &str, completion: &JobCompletion) -> Result<bool> {
        let extracted_data = serde_json::to_string(&completion.extracted_data)?;
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE analysis_jobs SET
                status = 'completed',
                raw_response = ?2,
                extracted_data = ?3,
                model_used = ?4,
                input_tokens = ?5,
                output_tokens = ?6,
                completed_at = ?7
             WHERE id = ?1 AND status = 'processing'",
            params![
                id,
                completion.raw_response,
                extracted_data,
                completion.model_used,
                completion.token_usage.input_tokens,
                completion.token_usage.output_tokens,
                now_millis(),
            ],
        )?;
        Ok(changed > 0)
    }

    fn mark_failed(
        &self,
        id: &str,
        error_message: &str,
        raw_response: Option<&str>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE analysis_jobs SET
                status = 'failed',
                error_message = ?2,
                raw_response = COALESCE(?3, raw_response),
                completed_at = ?4
             WHERE id = ?1 AND status IN ('pending', 'processing')",
            params![id, error_message, raw_response, now_millis()],
        )?;
        Ok(changed > 0)
    }

    fn fail_unfinished_jobs(&self, error_message: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let ids = {
            let mut stmt = tx.prepare(
                "SELECT id FROM analysis_jobs WHERE status IN ('pending', 'processing')
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        tx.execute(
            "UPDATE analysis_jobs SET status = 'failed', error_message = ?1, completed_at = ?2
             WHERE status IN ('pending', 'processing')",
            params![error_message, now_millis()],
        )?;
        tx.commit()?;
        Ok(ids)
    }

    fn count_jobs_by_status(&self) -> Result<Vec<(JobStatus, usize)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM analysis_jobs GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(status, count)| {
                JobStatus::from_db_str(&status).map(|s| (s, count as usize))
            })
            .collect())
    }
}

impl ValueFrameworkStore for SqliteDiscoveryStore {
    fn get_value_framework(&self, engagement_id: &str) -> Result<Option<ValueFramework>> {
        let conn = self.conn.lock().unwrap();
        Self::query_value_framework(&conn, engagement_id)
    }

    fn update_value_framework_fields(
        &self,
        engagement_id: &str,
        patch: &InsightFieldsPatch,
        expected_version: Option<i64>,
    ) -> Result<VersionedWrite> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE value_frameworks SET
                current_challenges = COALESCE(?2, current_challenges),
                impact = COALESCE(?3, impact),
                ideal_future_state = COALESCE(?4, ideal_future_state),
                everyday_metrics = COALESCE(?5, everyday_metrics),
                core_requirements = COALESCE(?6, core_requirements),
                version = version + 1,
                updated_at = MAX(?7, updated_at + 1)
             WHERE engagement_id = ?1 AND (?8 IS NULL OR version = ?8)",
            params![
                engagement_id,
                patch.current_challenges,
                patch.impact,
                patch.ideal_future_state,
                patch.everyday_metrics,
                patch.core_requirements,
                now_millis(),
                expected_version,
            ],
        )?;
        Self::versioned_write_outcome(&conn, engagement_id, changed)
    }

    fn apply_insights(
        &self,
        engagement_id: &str,
        insights: &AppliedInsights,
        expected_version: Option<i64>,
    ) -> Result<VersionedWrite> {
        let source_call_ids = serde_json::to_string(&insights.source_call_ids)?;
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE value_frameworks SET
                current_challenges = ?2,
                impact = ?3,
                ideal_future_state = ?4,
                everyday_metrics = ?5,
                core_requirements = ?6,
                ai_generated = 1,
                ai_confidence_score = ?7,
                source_call_ids = ?8,
                version = version + 1,
                updated_at = MAX(?9, updated_at + 1)
             WHERE engagement_id = ?1 AND (?10 IS NULL OR version = ?10)",
            params![
                engagement_id,
                insights.current_challenges,
                insights.impact,
                insights.ideal_future_state,
                insights.everyday_metrics,
                insights.core_requirements,
                insights.confidence_score,
                source_call_ids,
                now_millis(),
                expected_version,
            ],
        )?;
        Self::versioned_write_outcome(&conn, engagement_id, changed)
    }
}
