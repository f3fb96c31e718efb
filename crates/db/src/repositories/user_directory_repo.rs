//! Read access to the `users` table.

use sqlx::PgConnection;
use windowgate_core::types::DbId;

use crate::models::user::UserInfo;

pub struct UserDirectoryRepo;

impl UserDirectoryRepo {
    /// Ids of active super-admins, ascending.
    pub async fn super_admin_ids(conn: &mut PgConnection) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM users WHERE is_super_admin AND active ORDER BY id",
        )
        .fetch_all(conn)
        .await
    }

    /// Users with the given ids. Unknown ids are skipped.
    pub async fn find_by_ids(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<Vec<UserInfo>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        sqlx::query_as::<_, UserInfo>(
            "SELECT id, email_id FROM users WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(conn)
        .await
    }
}
