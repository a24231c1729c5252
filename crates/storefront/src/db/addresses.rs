//! Address book storage.
//!
//! A user has at most one default address, enforced by a partial unique
//! index. Setting a default clears the old one in the same transaction.

use sqlx::PgPool;

use threadly_core::pricing::GeoPoint;
use threadly_core::{AddressId, UserId};

use super::RepositoryError;
use crate::models::Address;

const ADDRESS_COLUMNS: &str = r"
    id, full_name, phone, line1, line2, landmark, city, state, pincode,
    latitude, longitude, is_default
";

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    full_name: String,
    phone: String,
    line1: String,
    line2: Option<String>,
    landmark: Option<String>,
    city: String,
    state: String,
    pincode: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_default: bool,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            full_name: row.full_name,
            phone: row.phone,
            line1: row.line1,
            line2: row.line2,
            landmark: row.landmark,
            city: row.city,
            state: row.state,
            pincode: row.pincode,
            location: GeoPoint::from_parts(row.latitude, row.longitude),
            is_default: row.is_default,
        }
    }
}

/// Address fields as submitted by the customer.
#[derive(Debug, Clone)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub location: Option<GeoPoint>,
    pub is_default: bool,
}

/// Repository for addresses.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            SELECT {ADDRESS_COLUMNS}
            FROM storefront.address
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// One of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// The user's default address, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_default(&self, user_id: UserId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE user_id = $1 AND is_default"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Add an address. The first address always becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM storefront.address WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        let is_default = input.is_default || existing == 0;

        if is_default {
            clear_default(&mut *tx, user_id).await?;
        }

        let row = sqlx::query_as::<_, AddressRow>(&format!(
            r"
            INSERT INTO storefront.address
                (user_id, full_name, phone, line1, line2, landmark, city, state, pincode,
                 latitude, longitude, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(&input.full_name)
        .bind(&input.phone)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(input.landmark.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.pincode)
        .bind(input.location.map(|p| p.lat))
        .bind(input.location.map(|p| p.lng))
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Replace an address's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            clear_default(&mut *tx, user_id).await?;
        }

        let result = sqlx::query(
            r"
            UPDATE storefront.address
            SET full_name = $3, phone = $4, line1 = $5, line2 = $6, landmark = $7,
                city = $8, state = $9, pincode = $10, latitude = $11, longitude = $12,
                is_default = is_default OR $13
            WHERE id = $1 AND user_id = $2
            ",
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.full_name)
        .bind(&input.phone)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(input.landmark.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.pincode)
        .bind(input.location.map(|p| p.lat))
        .bind(input.location.map(|p| p.lng))
        .bind(input.is_default)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete an address. If it was the default, the newest remaining
    /// address becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default: Option<bool> = sqlx::query_scalar(
            "DELETE FROM storefront.address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        match was_default {
            None => return Err(RepositoryError::NotFound),
            Some(true) => {
                sqlx::query(
                    r"
                    UPDATE storefront.address SET is_default = TRUE
                    WHERE id = (
                        SELECT id FROM storefront.address
                        WHERE user_id = $1
                        ORDER BY created_at DESC
                        LIMIT 1
                    )
                    ",
                )
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            }
            Some(false) => {}
        }

        tx.commit().await?;
        Ok(())
    }

    /// Make an address the user's default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        clear_default(&mut *tx, user_id).await?;

        let result = sqlx::query(
            "UPDATE storefront.address SET is_default = TRUE WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn clear_default(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE storefront.address SET is_default = FALSE WHERE user_id = $1 AND is_default")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
