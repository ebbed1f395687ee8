//! MySQL layout of the instant collection
//!
//! One row per instant document. Nested parts of the document are JSON
//! columns so the row maps one-to-one onto [`InstantDocument`].

use fcast_core::{Conditions, Coordinates, ForecastEntry, InstantDocument};
use sqlx::types::Json;
use sqlx::FromRow;

/// Row of the instant table
#[derive(Debug, Clone, FromRow)]
pub struct InstantRow {
    pub zipcode: String,
    pub instant: i64,
    pub location: Json<Coordinates>,
    pub observed: Option<Json<Conditions>>,
    pub forecasts: Json<Vec<ForecastEntry>>,
}

impl From<InstantRow> for InstantDocument {
    fn from(row: InstantRow) -> Self {
        InstantDocument {
            zipcode: row.zipcode,
            instant: row.instant,
            location: row.location.0,
            observed: row.observed.map(|o| o.0),
            forecasts: row.forecasts.0,
        }
    }
}

/// Default table names
pub mod tables {
    pub const INSTANT: &str = "instant";
}

/// Column list shared by every SELECT
pub const INSTANT_COLUMNS: &str = "zipcode, instant, location, observed, forecasts";

/// DDL for an instant table
pub fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            zipcode   VARCHAR(16) NOT NULL,
            instant   BIGINT      NOT NULL,
            location  JSON        NOT NULL,
            observed  JSON        NULL,
            forecasts JSON        NOT NULL,
            PRIMARY KEY (zipcode, instant)
        )
        "#
    )
}
