//! Repository for the `timeout_window_mappings` table.

use sqlx::PgConnection;
use windowgate_core::deployment_window::{TimeWindow, EXPRESSION_FORMAT_RECURRING_TIME_RANGE};
use windowgate_core::types::DbId;

use crate::models::time_window::TimeoutWindowMapping;

const COLUMNS: &str = "id, resource_id, resource_type, expression_format, window_expression, \
     sort_order, created_by, created_at, updated_at";

/// Windows attached to a resource, stored one row per window in input order.
pub struct TimeWindowRepo;

impl TimeWindowRepo {
    /// Replace every window of a resource. Run inside a transaction so the
    /// delete and the inserts land together.
    pub async fn replace_for_resource(
        conn: &mut PgConnection,
        resource_type: &str,
        resource_id: DbId,
        windows: &[TimeWindow],
        created_by: DbId,
    ) -> Result<(), sqlx::Error> {
        Self::delete_for_resource(&mut *conn, resource_type, resource_id).await?;

        for (sort_order, window) in windows.iter().enumerate() {
            sqlx::query(
                "INSERT INTO timeout_window_mappings \
                    (resource_id, resource_type, expression_format, window_expression, sort_order, created_by) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(resource_id)
            .bind(resource_type)
            .bind(EXPRESSION_FORMAT_RECURRING_TIME_RANGE)
            .bind(window.to_json())
            .bind(sort_order as i32)
            .bind(created_by)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Remove every window of a resource, returning how many were removed.
    pub async fn delete_for_resource(
        conn: &mut PgConnection,
        resource_type: &str,
        resource_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM timeout_window_mappings WHERE resource_type = $1 AND resource_id = $2",
        )
        .bind(resource_type)
        .bind(resource_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Window rows of the given resources in the recurring-range format,
    /// ordered by resource then input order.
    pub async fn list_for_resources(
        conn: &mut PgConnection,
        resource_type: &str,
        resource_ids: &[DbId],
    ) -> Result<Vec<TimeoutWindowMapping>, sqlx::Error> {
        if resource_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM timeout_window_mappings \
             WHERE resource_type = $1 AND resource_id = ANY($2) AND expression_format = $3 \
             ORDER BY resource_id, sort_order, id"
        );
        sqlx::query_as::<_, TimeoutWindowMapping>(&query)
            .bind(resource_type)
            .bind(resource_ids)
            .bind(EXPRESSION_FORMAT_RECURRING_TIME_RANGE)
            .fetch_all(conn)
            .await
    }
}
