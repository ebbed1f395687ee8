//! Document store operations for the MySQL backend

use crate::schema::{create_table_sql, InstantRow, INSTANT_COLUMNS};
use crate::{DocumentStore, MySqlStore, StoreResult, UpsertResult, UpsertStatus};
use fcast_core::{DocumentUpdate, InstantDocument, InstantKey, Upsert};
use sqlx::{MySqlConnection, Row};
use tracing::{debug, instrument};

/// Status of a keyed write given whether the row existed before it.
///
/// `rows_affected` cannot tell: sqlx connects with `CLIENT_FOUND_ROWS`, so an
/// unchanged duplicate reports 1, the same as a fresh insert.
fn status_for(existed: bool) -> UpsertStatus {
    if existed {
        UpsertStatus::Updated
    } else {
        UpsertStatus::Created
    }
}

fn lock_sql(table: &str) -> String {
    format!("SELECT 1 FROM {table} WHERE zipcode = ? AND instant = ? FOR UPDATE")
}

fn set_observed_sql(table: &str) -> String {
    format!(
        r#"
        INSERT INTO {table} (zipcode, instant, location, observed, forecasts)
        VALUES (?, ?, CAST(? AS JSON), CAST(? AS JSON), JSON_ARRAY())
        ON DUPLICATE KEY UPDATE observed = VALUES(observed)
        "#
    )
}

fn push_forecast_sql(table: &str) -> String {
    format!(
        r#"
        INSERT INTO {table} (zipcode, instant, location, observed, forecasts)
        VALUES (?, ?, CAST(? AS JSON), NULL, JSON_ARRAY(CAST(? AS JSON)))
        ON DUPLICATE KEY UPDATE forecasts = JSON_ARRAY_APPEND(forecasts, '$', CAST(? AS JSON))
        "#
    )
}

fn replace_sql(table: &str) -> String {
    format!(
        r#"
        INSERT INTO {table} (zipcode, instant, location, observed, forecasts)
        VALUES (?, ?, CAST(? AS JSON), CAST(? AS JSON), CAST(? AS JSON))
        ON DUPLICATE KEY UPDATE
            location = VALUES(location),
            observed = VALUES(observed),
            forecasts = VALUES(forecasts)
        "#
    )
}

fn insert_sql(table: &str) -> String {
    format!(
        r#"
        INSERT INTO {table} (zipcode, instant, location, observed, forecasts)
        VALUES (?, ?, CAST(? AS JSON), CAST(? AS JSON), CAST(? AS JSON))
        "#
    )
}

fn select_sql(table: &str) -> String {
    format!("SELECT {INSTANT_COLUMNS} FROM {table} WHERE zipcode = ? AND instant = ?")
}

async fn write_document(
    conn: &mut MySqlConnection,
    sql: &str,
    document: &InstantDocument,
) -> StoreResult<()> {
    let location = serde_json::to_string(&document.location)?;
    let observed = document
        .observed
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let forecasts = serde_json::to_string(&document.forecasts)?;

    sqlx::query(sql)
        .bind(&document.zipcode)
        .bind(document.instant)
        .bind(&location)
        .bind(observed)
        .bind(&forecasts)
        .execute(conn)
        .await?;
    Ok(())
}

impl MySqlStore {
    /// Create the instant table when it does not exist yet
    #[instrument(skip(self), fields(store = %self.store_name()))]
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(&create_table_sql(self.table()))
            .execute(self.pool())
            .await?;
        debug!("Ensured table {}", self.table());
        Ok(())
    }

    /// Get count of instant documents
    #[instrument(skip(self), fields(store = %self.store_name()))]
    pub async fn count_documents(&self) -> StoreResult<i64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS count FROM {}", self.table()))
            .fetch_one(self.pool())
            .await?;
        Ok(row.try_get("count")?)
    }

    /// Lock the key and report whether its row exists
    async fn lock_key(&self, conn: &mut MySqlConnection, key: &InstantKey) -> StoreResult<bool> {
        let row = sqlx::query(&lock_sql(self.table()))
            .bind(&key.zipcode)
            .bind(key.instant)
            .fetch_optional(conn)
            .await?;
        Ok(row.is_some())
    }

    async fn upsert_in_tx(&self, upsert: &Upsert) -> StoreResult<UpsertResult> {
        let location = serde_json::to_string(&upsert.location)?;
        let mut tx = self.pool().begin().await?;
        let existed = self.lock_key(&mut tx, &upsert.key).await?;

        match &upsert.update {
            DocumentUpdate::SetObserved(conditions) => {
                let observed = serde_json::to_string(conditions)?;
                sqlx::query(&set_observed_sql(self.table()))
                    .bind(&upsert.key.zipcode)
                    .bind(upsert.key.instant)
                    .bind(&location)
                    .bind(&observed)
                    .execute(&mut *tx)
                    .await?;
            }
            DocumentUpdate::PushForecast(entry) => {
                let entry = serde_json::to_string(entry)?;
                sqlx::query(&push_forecast_sql(self.table()))
                    .bind(&upsert.key.zipcode)
                    .bind(upsert.key.instant)
                    .bind(&location)
                    .bind(&entry)
                    .bind(&entry)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let row = sqlx::query_as::<_, InstantRow>(&select_sql(self.table()))
            .bind(&upsert.key.zipcode)
            .bind(upsert.key.instant)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(UpsertResult {
            status: status_for(existed),
            document: row.into(),
        })
    }

    async fn replace_in_tx(&self, document: &InstantDocument) -> StoreResult<UpsertStatus> {
        let mut tx = self.pool().begin().await?;
        let existed = self.lock_key(&mut tx, &document.key()).await?;
        write_document(&mut tx, &replace_sql(self.table()), document).await?;
        tx.commit().await?;
        Ok(status_for(existed))
    }

    async fn insert_document(&self, document: &InstantDocument) -> StoreResult<()> {
        let mut conn = self.pool().acquire().await?;
        write_document(&mut conn, &insert_sql(self.table()), document).await
    }

    async fn select_one(&self, key: &InstantKey) -> StoreResult<Option<InstantDocument>> {
        let row = sqlx::query_as::<_, InstantRow>(&select_sql(self.table()))
            .bind(&key.zipcode)
            .bind(key.instant)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(InstantDocument::from))
    }

    async fn select_one_probe(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DocumentStore for MySqlStore {
    fn name(&self) -> &str {
        self.store_name()
    }

    #[instrument(skip(self, upsert), fields(store = %self.store_name(), key = %upsert.key))]
    async fn find_one_and_update(&self, upsert: &Upsert) -> StoreResult<UpsertResult> {
        let result = self.timed(self.upsert_in_tx(upsert)).await?;
        debug!(status = ?result.status, "Upserted instant document");
        Ok(result)
    }

    #[instrument(skip(self), fields(store = %self.store_name()))]
    async fn find_one(&self, key: &InstantKey) -> StoreResult<Option<InstantDocument>> {
        self.timed(self.select_one(key)).await
    }

    #[instrument(skip(self, document), fields(store = %self.store_name(), key = %document.key()))]
    async fn replace_one(&self, document: &InstantDocument) -> StoreResult<UpsertStatus> {
        let status = self.timed(self.replace_in_tx(document)).await?;
        debug!(?status, "Replaced instant document");
        Ok(status)
    }

    #[instrument(skip(self, document), fields(store = %self.store_name(), key = %document.key()))]
    async fn insert_one(&self, document: &InstantDocument) -> StoreResult<()> {
        self.timed(self.insert_document(document)).await?;
        debug!("Inserted instant document");
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.timed(self.select_one_probe()).await
    }
}
