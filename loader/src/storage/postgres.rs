use super::{RelationalStore, StoreTransaction};
use crate::models::{FlatTuple, Scalar};
use crate::schema::{OnConflict, TableSpec};
use async_trait::async_trait;
use bytes::BytesMut;
use common::Result;
use common::config::Settings;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::HashSet;
use std::error::Error as StdError;
use tokio_postgres::types::{IsNull, Json, ToSql, Type, to_sql_checked};
use tokio_postgres::{Client, NoTls, Transaction};
use tracing::{debug, error, info};

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let (client, connection) =
            tokio_postgres::connect(&settings.connection_string(), NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Postgres connection closed with error");
            }
        });

        info!(
            host = settings.connection.get("host").map(String::as_str).unwrap_or("default"),
            "Connected to Postgres"
        );
        Ok(Self { client })
    }

    pub async fn public_tables(&self) -> Result<Vec<String>> {
        let rows = self
            .client
            .query(
                "SELECT table_name::TEXT FROM information_schema.tables WHERE table_schema = 'public'",
                &[],
            )
            .await?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn execute(&mut self, statement: &str) -> Result<()> {
        debug!(statement = statement, "Executing");
        self.client.batch_execute(statement).await?;
        Ok(())
    }

    async fn distinct_values(&mut self, table: &TableSpec, column: &str) -> Result<HashSet<String>> {
        let query = format!("SELECT DISTINCT {}::TEXT FROM {}", column, table.name());
        let rows = self.client.query(query.as_str(), &[]).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get::<_, Option<String>>(0))
            .collect())
    }

    async fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>> {
        let tx = self.client.transaction().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

// The wire protocol counts bind parameters in an i16.
const MAX_BIND_PARAMS: usize = 32_767;

fn rows_per_statement(width: usize) -> usize {
    (MAX_BIND_PARAMS / width.max(1)).max(1)
}

struct PostgresTransaction<'a> {
    tx: Transaction<'a>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction<'_> {
    async fn insert_batch(
        &mut self,
        table: &TableSpec,
        on_conflict: OnConflict,
        rows: &[FlatTuple],
    ) -> Result<u64> {
        let mut inserted = 0;
        for chunk in rows.chunks(rows_per_statement(table.width())) {
            let statement = table.insert_statement(chunk.len(), on_conflict);
            let params: Vec<&(dyn ToSql + Sync)> = chunk
                .iter()
                .flatten()
                .map(|value| value as &(dyn ToSql + Sync))
                .collect();
            inserted += self.tx.execute(statement.as_str(), &params).await?;
        }
        Ok(inserted)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

// Values arrive already coerced to the column's kind; this only picks the
// wire encoding the server asked for.
impl ToSql for Scalar {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            Scalar::Null => Ok(IsNull::Yes),
            Scalar::Bool(b) => b.to_sql_checked(ty, out),
            Scalar::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                _ => i.to_sql_checked(ty, out),
            },
            Scalar::Decimal(d) => match *ty {
                Type::FLOAT8 => d
                    .to_f64()
                    .ok_or("decimal out of range for double precision")?
                    .to_sql(ty, out),
                _ => d.to_sql_checked(ty, out),
            },
            Scalar::Text(s) => s.to_sql_checked(ty, out),
            Scalar::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                _ => ts.to_sql_checked(ty, out),
            },
            Scalar::Json(s) => match *ty {
                Type::JSON | Type::JSONB => {
                    let value: serde_json::Value = serde_json::from_str(s)?;
                    Json(value).to_sql(ty, out)
                }
                _ => s.to_sql_checked(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
