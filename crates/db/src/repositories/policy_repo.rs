//! Repository for the `global_policies` table.

use sqlx::PgConnection;
use windowgate_core::types::DbId;

use crate::models::global_policy::{CreateGlobalPolicy, GlobalPolicy, UpdateGlobalPolicy};

const COLUMNS: &str = "id, name, description, policy_of, version, enabled, deleted, \
     json_data, created_by, updated_by, created_at, updated_at";

/// Generic policy store. Soft-deleted rows are invisible to every read.
pub struct PolicyRepo;

impl PolicyRepo {
    /// Insert a new policy, returning the created row.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateGlobalPolicy,
    ) -> Result<GlobalPolicy, sqlx::Error> {
        let query = format!(
            "INSERT INTO global_policies \
                (name, description, policy_of, enabled, json_data, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GlobalPolicy>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.policy_of)
            .bind(input.enabled)
            .bind(&input.json_data)
            .bind(input.created_by)
            .fetch_one(conn)
            .await
    }

    /// Replace the mutable fields of a live policy. Returns `None` if the
    /// policy does not exist or was deleted.
    pub async fn update(
        conn: &mut PgConnection,
        id: DbId,
        policy_of: &str,
        input: &UpdateGlobalPolicy,
    ) -> Result<Option<GlobalPolicy>, sqlx::Error> {
        let query = format!(
            "UPDATE global_policies SET \
                name = $3, \
                description = $4, \
                enabled = $5, \
                json_data = $6, \
                updated_by = $7 \
             WHERE id = $1 AND policy_of = $2 AND NOT deleted \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GlobalPolicy>(&query)
            .bind(id)
            .bind(policy_of)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.enabled)
            .bind(&input.json_data)
            .bind(input.updated_by)
            .fetch_optional(conn)
            .await
    }

    /// Soft-delete a policy. Returns `false` if it was already gone.
    pub async fn soft_delete(
        conn: &mut PgConnection,
        id: DbId,
        policy_of: &str,
        deleted_by: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE global_policies SET deleted = true, updated_by = $3 \
             WHERE id = $1 AND policy_of = $2 AND NOT deleted",
        )
        .bind(id)
        .bind(policy_of)
        .bind(deleted_by)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
        policy_of: &str,
    ) -> Result<Option<GlobalPolicy>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM global_policies \
             WHERE id = $1 AND policy_of = $2 AND NOT deleted"
        );
        sqlx::query_as::<_, GlobalPolicy>(&query)
            .bind(id)
            .bind(policy_of)
            .fetch_optional(conn)
            .await
    }

    pub async fn find_by_name(
        conn: &mut PgConnection,
        name: &str,
        policy_of: &str,
    ) -> Result<Option<GlobalPolicy>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM global_policies \
             WHERE name = $1 AND policy_of = $2 AND NOT deleted"
        );
        sqlx::query_as::<_, GlobalPolicy>(&query)
            .bind(name)
            .bind(policy_of)
            .fetch_optional(conn)
            .await
    }

    /// Fetch live policies by id, ordered by id. Unknown ids are skipped.
    pub async fn find_by_ids(
        conn: &mut PgConnection,
        ids: &[DbId],
        policy_of: &str,
    ) -> Result<Vec<GlobalPolicy>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM global_policies \
             WHERE id = ANY($1) AND policy_of = $2 AND NOT deleted \
             ORDER BY id"
        );
        sqlx::query_as::<_, GlobalPolicy>(&query)
            .bind(ids)
            .bind(policy_of)
            .fetch_all(conn)
            .await
    }

    /// List every live policy of one type, ordered by id.
    pub async fn list_active_of_type(
        conn: &mut PgConnection,
        policy_of: &str,
    ) -> Result<Vec<GlobalPolicy>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM global_policies \
             WHERE policy_of = $1 AND NOT deleted \
             ORDER BY id"
        );
        sqlx::query_as::<_, GlobalPolicy>(&query)
            .bind(policy_of)
            .fetch_all(conn)
            .await
    }
}
