//! 目录查询的Postgres实现

use async_trait::async_trait;
use collex_core::store::DirectoryStore;
use collex_core::{Doctor, Medicine, Pharmacy, Result, UserSummary};
use uuid::Uuid;

use crate::connection::db_err;
use crate::models::{DbDoctor, DbMedicine, DbPharmacy, DbUser};
use crate::PgStore;

const DOCTOR_COLUMNS: &str = r#"
    SELECT d.id, d.user_id, u.first_name, u.last_name, d.specialization,
           d.consultation_fee, d.is_active
    FROM doctors d
    JOIN users u ON u.id = d.user_id
"#;

#[async_trait]
impl DirectoryStore for PgStore {
    async fn doctor(&self, id: Uuid) -> Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DbDoctor>(&format!("{} WHERE d.id = $1", DOCTOR_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        Ok(row.map(Doctor::from))
    }

    async fn doctor_by_user(&self, user_id: Uuid) -> Result<Option<Doctor>> {
        let row = sqlx::query_as::<_, DbDoctor>(&format!("{} WHERE d.user_id = $1", DOCTOR_COLUMNS))
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        Ok(row.map(Doctor::from))
    }

    async fn pharmacy_by_user(&self, user_id: Uuid) -> Result<Option<Pharmacy>> {
        let row = sqlx::query_as::<_, DbPharmacy>(
            "SELECT id, user_id, name, is_active FROM pharmacies WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(db_err)?;

        Ok(row.map(Pharmacy::from))
    }

    async fn user(&self, id: Uuid) -> Result<Option<UserSummary>> {
        let row = sqlx::query_as::<_, DbUser>(
            "SELECT id, first_name, last_name, email, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(db_err)?;

        row.map(UserSummary::try_from).transpose()
    }

    async fn users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let rows = sqlx::query_as::<_, DbUser>(
            "SELECT id, first_name, last_name, email, role FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        rows.into_iter().map(UserSummary::try_from).collect()
    }

    async fn medicine(&self, id: Uuid) -> Result<Option<Medicine>> {
        let row = sqlx::query_as::<_, DbMedicine>(
            "SELECT id, pharmacy_id, name, price, stock, is_active FROM medicines WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(db_err)?;

        Ok(row.map(Medicine::from))
    }

    async fn medicines(&self, ids: &[Uuid]) -> Result<Vec<Medicine>> {
        let rows = sqlx::query_as::<_, DbMedicine>(
            "SELECT id, pharmacy_id, name, price, stock, is_active FROM medicines WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Medicine::from).collect())
    }
}
