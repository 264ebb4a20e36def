//! PostgreSQL store
//!
//! Implements the store accessor traits using SQLx and PostgreSQL.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use crate::config::DatabaseConfig;
use crate::store::{AccountStore, BlacklistStore, CatalogStore, ProductFilter};
use crate::{Account, ArenaError, Cart, Category, NewAccount, Product, ProfileUpdate, Result, Role};

/// Embedded schema migrations
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
                               phone, address, image_url, is_active, created_at";

const PRODUCT_COLUMNS: &str =
    "id, title, description, price, quantity, seller_id, category_id, created_at";

/// Open a connection pool
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let options = config
        .connect_options()
        .map_err(|e| ArenaError::StoreFailure(e.to_string()))?;

    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .connect_with(options)
        .await
        .map_err(|e| ArenaError::StoreFailure(format!("PostgreSQL connection failed: {e}")))
}

/// Map a SQLx error, surfacing unique violations as conflicts
fn store_error(context: &str, e: sqlx::Error) -> ArenaError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let constraint = db.constraint().unwrap_or("unique field");
            return ArenaError::Conflict(format!("{context}: {constraint} already in use"));
        }
    }
    ArenaError::StoreFailure(format!("{context}: {e}"))
}

/// Escape `LIKE` wildcards so the pattern is a literal substring match
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// One account relation (`buyers` or `sellers`)
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
    role: Role,
}

impl PgAccountStore {
    pub fn new(pool: PgPool, role: Role) -> Self {
        Self { pool, role }
    }

    /// Flip the active flag. Used by operator tooling, not by request handling.
    pub async fn set_active(&self, email: &str, active: bool) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET is_active = $1 WHERE email = $2",
            self.role.table()
        );

        let result = sqlx::query(&sql)
            .bind(active)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to update account status", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_account<'e, E>(&self, executor: E, account: &NewAccount) -> Result<Account>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO {} (
                username, email, password_hash, first_name, last_name,
                phone, address, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, NOW())
            RETURNING {ACCOUNT_COLUMNS}
            "#,
            self.role.table()
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(&account.phone)
            .bind(&account.address)
            .fetch_one(executor)
            .await
            .map_err(|e| store_error(&format!("Failed to create {}", self.role), e))
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE {column} = $1",
            self.role.table()
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error(&format!("Failed to find {} by {column}", self.role), e))
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn create(&self, account: &NewAccount) -> Result<Account> {
        self.insert_account(&self.pool, account).await
    }

    async fn create_with_cart(&self, account: &NewAccount) -> Result<(Account, Cart)> {
        if self.role != Role::Buyer {
            return Err(ArenaError::validation(
                "role",
                format!("{}s do not own a cart", self.role),
            ));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| store_error("Failed to start transaction", e))?;

        let account = self.insert_account(&mut *tx, account).await?;
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (buyer_id, created_at) VALUES ($1, NOW())
            RETURNING id, buyer_id, created_at
            "#,
        )
        .bind(account.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| store_error("Failed to create cart", e))?;

        // Dropping the transaction on an early return rolls both inserts back
        tx.commit()
            .await
            .map_err(|e| store_error("Failed to commit signup", e))?;

        Ok((account, cart))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE id = $1",
            self.role.table()
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error(&format!("Failed to find {} by id", self.role), e))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.find_one("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        self.find_one("username", username).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>> {
        self.find_one("phone", phone).await
    }

    async fn list(&self) -> Result<Vec<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} ORDER BY id",
            self.role.table()
        );

        sqlx::query_as::<_, Account>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error(&format!("Failed to list {}s", self.role), e))
    }

    async fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(self.find_by_id(id).await?.is_some());
        }

        // Build dynamic update query
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET ", self.role.table()));
        let mut fields = builder.separated(", ");

        let columns = [
            ("first_name", &update.first_name),
            ("last_name", &update.last_name),
            ("phone", &update.phone),
            ("address", &update.address),
            ("email", &update.email),
        ];
        for (column, value) in columns {
            if let Some(v) = value {
                fields.push(format!("{column} = "));
                fields.push_bind_unseparated(v.clone());
            }
        }

        builder.push(" WHERE id = ").push_bind(id);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| store_error(&format!("Failed to update {} profile", self.role), e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_password_by_hash(
        &self,
        current_hash: &str,
        new_hash: &str,
    ) -> Result<Option<Account>> {
        let sql = format!(
            r#"
            UPDATE {} SET password_hash = $1
            WHERE password_hash = $2 AND is_active
            RETURNING {ACCOUNT_COLUMNS}
            "#,
            self.role.table()
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(new_hash)
            .bind(current_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error(&format!("Failed to update {} password", self.role), e))
    }

    async fn update_password_by_email(
        &self,
        email: &str,
        new_hash: &str,
    ) -> Result<Option<Account>> {
        let sql = format!(
            r#"
            UPDATE {} SET password_hash = $1
            WHERE email = $2 AND is_active
            RETURNING {ACCOUNT_COLUMNS}
            "#,
            self.role.table()
        );

        sqlx::query_as::<_, Account>(&sql)
            .bind(new_hash)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error(&format!("Failed to reset {} password", self.role), e))
    }

    async fn set_image_url(&self, username: &str, url: &str) -> Result<bool> {
        let sql = format!(
            "UPDATE {} SET image_url = $1 WHERE username = $2",
            self.role.table()
        );

        let result = sqlx::query(&sql)
            .bind(url)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error("Failed to update image url", e))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Catalog and blacklist relations
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| ArenaError::StoreFailure(format!("Migration failed: {e}")))
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to find category", e))
    }

    async fn create_category(&self, name: &str) -> Result<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| store_error("Failed to create category", e))
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to list categories", e))
    }

    async fn query_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE TRUE"));

        if let Some(category_id) = filter.category_id {
            builder.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(seller_id) = filter.seller_id {
            builder.push(" AND seller_id = ").push_bind(seller_id);
        }
        if let Some(min) = filter.min_price {
            builder.push(" AND price >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            builder.push(" AND price <= ").push_bind(max);
        }
        if let Some(name) = &filter.title_contains {
            builder.push(" AND title LIKE ").push_bind(like_pattern(name));
        }
        builder.push(" ORDER BY id");

        builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to query products", e))
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");

        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| store_error("Failed to get product", e))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| store_error("Database ping failed", e))
    }
}

#[async_trait]
impl BlacklistStore for PgStore {
    async fn insert(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO token_blacklist (token, blacklisted_at) VALUES ($1, NOW())
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(|e| store_error("Failed to blacklist token", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        let found: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM token_blacklist WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| store_error("Failed to check blacklist", e))?;

        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("phone"), "%phone%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_non_database_errors_are_store_failures() {
        let err = store_error("Failed to query products", sqlx::Error::RowNotFound);
        assert!(matches!(err, ArenaError::StoreFailure(_)));
        assert!(err.to_string().contains("Failed to query products"));
    }
}
