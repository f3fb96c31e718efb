//! Repository for the `resource_qualifier_mappings` table.

use sqlx::PgConnection;
use windowgate_core::deployment_window::AppEnvSelector;
use windowgate_core::types::DbId;

use crate::models::resource_mapping::ResourceQualifierMapping;

const COLUMNS: &str = "id, resource_id, resource_type, app_id, env_id, active, \
     created_by, created_at, updated_at";

/// (app, env) scopes of resources. Removal deactivates rows instead of
/// deleting them.
pub struct ResourceMappingRepo;

impl ResourceMappingRepo {
    /// Active mappings matching any of the given (app, env) pairs.
    pub async fn list_for_selections(
        conn: &mut PgConnection,
        resource_type: &str,
        selections: &[AppEnvSelector],
    ) -> Result<Vec<ResourceQualifierMapping>, sqlx::Error> {
        if selections.is_empty() {
            return Ok(Vec::new());
        }
        let app_ids: Vec<DbId> = selections.iter().map(|s| s.app_id).collect();
        let env_ids: Vec<DbId> = selections.iter().map(|s| s.env_id).collect();

        let query = format!(
            "SELECT {COLUMNS} FROM resource_qualifier_mappings \
             WHERE resource_type = $1 AND active \
               AND (app_id, env_id) IN (SELECT * FROM UNNEST($2::bigint[], $3::bigint[])) \
             ORDER BY app_id, env_id, resource_id"
        );
        sqlx::query_as::<_, ResourceQualifierMapping>(&query)
            .bind(resource_type)
            .bind(&app_ids)
            .bind(&env_ids)
            .fetch_all(conn)
            .await
    }

    /// Active mappings for every environment of the given apps.
    pub async fn list_for_apps(
        conn: &mut PgConnection,
        resource_type: &str,
        app_ids: &[DbId],
    ) -> Result<Vec<ResourceQualifierMapping>, sqlx::Error> {
        if app_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM resource_qualifier_mappings \
             WHERE resource_type = $1 AND active AND app_id = ANY($2) \
             ORDER BY app_id, env_id, resource_id"
        );
        sqlx::query_as::<_, ResourceQualifierMapping>(&query)
            .bind(resource_type)
            .bind(app_ids)
            .fetch_all(conn)
            .await
    }

    /// Active mappings of one resource.
    pub async fn list_for_resource(
        conn: &mut PgConnection,
        resource_type: &str,
        resource_id: DbId,
    ) -> Result<Vec<ResourceQualifierMapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM resource_qualifier_mappings \
             WHERE resource_type = $1 AND resource_id = $2 AND active \
             ORDER BY app_id, env_id"
        );
        sqlx::query_as::<_, ResourceQualifierMapping>(&query)
            .bind(resource_type)
            .bind(resource_id)
            .fetch_all(conn)
            .await
    }

    /// Make `selections` the exact set of active scopes of a resource.
    /// Previously mapped scopes are reactivated rather than duplicated.
    pub async fn replace_for_resource(
        conn: &mut PgConnection,
        resource_type: &str,
        resource_id: DbId,
        selections: &[AppEnvSelector],
        created_by: DbId,
    ) -> Result<(), sqlx::Error> {
        Self::delete_for_resource(&mut *conn, resource_type, resource_id).await?;

        for selection in selections {
            sqlx::query(
                "INSERT INTO resource_qualifier_mappings \
                    (resource_id, resource_type, app_id, env_id, active, created_by) \
                 VALUES ($1, $2, $3, $4, true, $5) \
                 ON CONFLICT ON CONSTRAINT uq_resource_qualifier_mappings_scope \
                 DO UPDATE SET active = true, created_by = EXCLUDED.created_by",
            )
            .bind(resource_id)
            .bind(resource_type)
            .bind(selection.app_id)
            .bind(selection.env_id)
            .bind(created_by)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Deactivate every scope of a resource, returning how many changed.
    pub async fn delete_for_resource(
        conn: &mut PgConnection,
        resource_type: &str,
        resource_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE resource_qualifier_mappings SET active = false \
             WHERE resource_type = $1 AND resource_id = $2 AND active",
        )
        .bind(resource_type)
        .bind(resource_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
