//! Database schema for discovery.db.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

const ENGAGEMENT_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "engagements",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Version 0
// =============================================================================

const ENGAGEMENTS_TABLE_V0: Table = Table {
    name: "engagements",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("account_name", &SqlType::Text, non_null = true),
        sqlite_column!("account_domain", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

/// Calls discovered through the provider. Transcript and selection flag are
/// owned here, metadata is refreshed by every search.
const CALLS_TABLE_V0: Table = Table {
    name: "calls",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "engagement_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ENGAGEMENT_FOREIGN_KEY)
        ),
        sqlite_column!("external_id", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text),
        sqlite_column!("started_at", &SqlType::Integer),
        sqlite_column!("duration_seconds", &SqlType::Integer),
        sqlite_column!(
            "participant_emails",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'[]'")
        ),
        sqlite_column!("url", &SqlType::Text),
        sqlite_column!("transcript", &SqlType::Text),
        sqlite_column!("transcript_fetched_at", &SqlType::Integer),
        sqlite_column!(
            "selected_for_analysis",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_calls_engagement_started", "engagement_id, started_at")],
    unique_constraints: &[&["engagement_id", "external_id"]],
};

/// Append-only job history. `input_call_ids` and `extracted_data` hold JSON.
const ANALYSIS_JOBS_TABLE_V0: Table = Table {
    name: "analysis_jobs",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "engagement_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ENGAGEMENT_FOREIGN_KEY)
        ),
        sqlite_column!("status", &SqlType::Text, non_null = true),
        sqlite_column!("input_call_ids", &SqlType::Text, non_null = true),
        sqlite_column!("raw_response", &SqlType::Text),
        sqlite_column!("extracted_data", &SqlType::Text),
        sqlite_column!("error_message", &SqlType::Text),
        sqlite_column!("model_used", &SqlType::Text),
        sqlite_column!("input_tokens", &SqlType::Integer),
        sqlite_column!("output_tokens", &SqlType::Integer),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("started_at", &SqlType::Integer),
        sqlite_column!("completed_at", &SqlType::Integer),
    ],
    indices: &[
        ("idx_jobs_engagement_created", "engagement_id, created_at"),
        ("idx_jobs_status", "status"),
    ],
    unique_constraints: &[],
};

const VALUE_FRAMEWORKS_TABLE_V0: Table = Table {
    name: "value_frameworks",
    columns: &[
        sqlite_column!(
            "engagement_id",
            &SqlType::Text,
            is_primary_key = true,
            foreign_key = Some(&ENGAGEMENT_FOREIGN_KEY)
        ),
        sqlite_column!("current_challenges", &SqlType::Text),
        sqlite_column!("impact", &SqlType::Text),
        sqlite_column!("ideal_future_state", &SqlType::Text),
        sqlite_column!("everyday_metrics", &SqlType::Text),
        sqlite_column!("core_requirements", &SqlType::Text),
        sqlite_column!(
            "ai_generated",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("ai_confidence_score", &SqlType::Real),
        sqlite_column!("source_call_ids", &SqlType::Text),
        sqlite_column!(
            "version",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const DISCOVERY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ENGAGEMENTS_TABLE_V0,
        CALLS_TABLE_V0,
        ANALYSIS_JOBS_TABLE_V0,
        VALUE_FRAMEWORKS_TABLE_V0,
    ],
    migration: None,
}];
