//! Postgres 零售商存储实现

use crate::error::StorageError;
use crate::traits::RetailerStore;
use domain::{Retailer, RetailerAddress, RetailerStatus};
use serde_json::Value;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

pub struct PgRetailerStore {
    pub pool: PgPool,
}

impl PgRetailerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RetailerStore for PgRetailerStore {
    async fn find_retailer(&self, retailer_id: &str) -> Result<Option<Retailer>, StorageError> {
        let row = sqlx::query(
            "select id, business_name, business_type, registration_number, tax_number, \
             contact_email, contact_phone, address_street, address_city, address_state, \
             address_postal_code, credit_limit::float8 as credit_limit, \
             current_balance::float8 as current_balance, status, approved_by, \
             (extract(epoch from approved_at) * 1000)::bigint as approved_at_ms, \
             documents::text as documents, metadata::text as metadata, \
             (extract(epoch from created_at) * 1000)::bigint as created_at_ms, \
             (extract(epoch from updated_at) * 1000)::bigint as updated_at_ms \
             from retailers where id = $1",
        )
        .bind(retailer_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let documents: Option<String> = row.try_get("documents")?;
        let metadata: Option<String> = row.try_get("metadata")?;

        Ok(Some(Retailer {
            id: row.try_get("id")?,
            business_name: row.try_get("business_name")?,
            business_type: row.try_get("business_type")?,
            registration_number: row.try_get("registration_number")?,
            tax_number: row.try_get("tax_number")?,
            contact_email: row.try_get("contact_email")?,
            contact_phone: row.try_get("contact_phone")?,
            address: RetailerAddress {
                street: row.try_get("address_street")?,
                city: row.try_get("address_city")?,
                state: row.try_get("address_state")?,
                postal_code: row.try_get("address_postal_code")?,
            },
            credit_limit: row.try_get("credit_limit")?,
            current_balance: row.try_get("current_balance")?,
            status: RetailerStatus::parse(&status),
            approved_by: row.try_get("approved_by")?,
            approved_at: row.try_get("approved_at_ms")?,
            documents: parse_documents(documents.as_deref()),
            metadata: parse_metadata(metadata.as_deref()),
            created_at: row.try_get("created_at_ms")?,
            updated_at: row.try_get("updated_at_ms")?,
        }))
    }
}

/// 自由格式列解析失败时按空值处理，只记录日志。
fn parse_documents(raw: Option<&str>) -> Vec<Value> {
    match raw.map(serde_json::from_str::<Vec<Value>>) {
        Some(Ok(items)) => items,
        Some(Err(err)) => {
            tracing::warn!(error = %err, "retailer documents column is not a json array");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn parse_metadata(raw: Option<&str>) -> BTreeMap<String, Value> {
    match raw.map(serde_json::from_str::<BTreeMap<String, Value>>) {
        Some(Ok(map)) => map,
        Some(Err(err)) => {
            tracing::warn!(error = %err, "retailer metadata column is not a json object");
            BTreeMap::new()
        }
        None => BTreeMap::new(),
    }
}
