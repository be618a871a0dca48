// src/store/postgres.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::debug;
use std::time::Duration;
use tokio_postgres::Row;

use crate::identifiers::IdentifierKind;
use crate::models::core::StoreEntity;
use crate::store::cache::IdentifierCache;
use crate::store::RecordStore;
use crate::utils::db_connect::PgPool;

const ENTITY_COLUMNS: &str = "entity_id, full_name, short_name, ultimate_parent, mei, lei, ein, \
     debt_domain_id, country_code, legal_address, tax_address, last_modified, \
     'MAIN' AS record_type, NULL::BIGINT AS parent_customer_id";

const LOCATION_COLUMNS: &str = "l.location_id AS entity_id, COALESCE(c.full_name, '') AS full_name, \
     c.short_name, c.ultimate_parent, l.mei, l.lei, l.ein, \
     NULL::TEXT AS debt_domain_id, c.country_code, c.legal_address, c.tax_address, \
     c.last_modified, 'LOCATION' AS record_type, l.parent_customer_id";

/// LoanIQ-backed record store over a shared read-only connection pool.
///
/// Identifier lookups go through a process-wide LRU cache so repeated form
/// batches for the same counterparty do not hammer the replica.
pub struct LoanIqStore {
    pool: PgPool,
    cache: IdentifierCache,
}

impl LoanIqStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_cache(pool, 1000, Duration::from_secs(600))
    }

    pub fn with_cache(pool: PgPool, cache_capacity: usize, cache_ttl: Duration) -> Self {
        Self {
            pool,
            cache: IdentifierCache::new(cache_capacity, cache_ttl),
        }
    }

    async fn query(
        &self,
        context: &str,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<StoreEntity>> {
        let conn = self
            .pool
            .get()
            .await
            .with_context(|| format!("Failed to get DB connection for {}", context))?;
        let rows = conn
            .query(sql, params)
            .await
            .with_context(|| format!("Query failed for {}", context))?;
        debug!("{}: query returned {} rows", context, rows.len());
        rows.iter().map(row_to_entity).collect()
    }

    async fn cached_identifier_lookup(
        &self,
        kind: IdentifierKind,
        value: &str,
        sql: &str,
    ) -> Result<Vec<StoreEntity>> {
        if let Some(cached) = self.cache.get(kind, value).await {
            return Ok(cached.as_ref().clone());
        }
        let results = self.query(kind.label(), sql, &[&value]).await?;
        self.cache.put(kind, value, results.clone()).await;
        Ok(results)
    }
}

#[async_trait]
impl RecordStore for LoanIqStore {
    async fn find_by_mei(&self, mei: &str) -> Result<Vec<StoreEntity>> {
        let sql = format!(
            "SELECT {} FROM counterparty WHERE UPPER(mei) = UPPER($1) \
             UNION ALL \
             SELECT {} FROM counterparty_location l \
             LEFT JOIN counterparty c ON c.entity_id = l.parent_customer_id \
             WHERE UPPER(l.mei) = UPPER($1)",
            ENTITY_COLUMNS, LOCATION_COLUMNS
        );
        self.cached_identifier_lookup(IdentifierKind::Mei, mei, &sql).await
    }

    async fn find_by_lei(&self, lei: &str) -> Result<Vec<StoreEntity>> {
        let sql = format!(
            "SELECT {} FROM counterparty WHERE UPPER(lei) = UPPER($1) \
             UNION ALL \
             SELECT {} FROM counterparty_location l \
             LEFT JOIN counterparty c ON c.entity_id = l.parent_customer_id \
             WHERE UPPER(l.lei) = UPPER($1)",
            ENTITY_COLUMNS, LOCATION_COLUMNS
        );
        self.cached_identifier_lookup(IdentifierKind::Lei, lei, &sql).await
    }

    async fn find_by_ein(&self, ein: &str) -> Result<Vec<StoreEntity>> {
        // EIN comparison ignores hyphens on both sides.
        let sql = format!(
            "SELECT {} FROM counterparty \
             WHERE REPLACE(ein, '-', '') = REPLACE($1, '-', '') \
             UNION ALL \
             SELECT {} FROM counterparty_location l \
             LEFT JOIN counterparty c ON c.entity_id = l.parent_customer_id \
             WHERE REPLACE(l.ein, '-', '') = REPLACE($1, '-', '')",
            ENTITY_COLUMNS, LOCATION_COLUMNS
        );
        self.cached_identifier_lookup(IdentifierKind::Ein, ein, &sql).await
    }

    async fn find_by_debt_domain_id(&self, debt_domain_id: &str) -> Result<Vec<StoreEntity>> {
        let sql = format!(
            "SELECT {} FROM counterparty WHERE UPPER(debt_domain_id) = UPPER($1)",
            ENTITY_COLUMNS
        );
        self.cached_identifier_lookup(IdentifierKind::DebtDomainId, debt_domain_id, &sql)
            .await
    }

    async fn find_candidates_by_name(
        &self,
        legal_name: &str,
        fund_manager: Option<&str>,
    ) -> Result<Vec<StoreEntity>> {
        let name_pattern = format!("%{}%", legal_name.to_lowercase());
        let fm_pattern = fund_manager
            .map(|fm| format!("%{}%", fm.to_lowercase()))
            .unwrap_or_else(|| name_pattern.clone());
        let exact = legal_name.to_lowercase();

        let sql = format!(
            "SELECT {} FROM counterparty \
             WHERE LOWER(full_name) LIKE $1 \
                OR LOWER(short_name) LIKE $1 \
                OR LOWER(ultimate_parent) LIKE $2 \
             ORDER BY CASE \
                WHEN LOWER(full_name) = $3 THEN 0 \
                WHEN LOWER(short_name) = $3 THEN 1 \
                ELSE 2 END, entity_id \
             LIMIT 100",
            ENTITY_COLUMNS
        );
        self.query(
            "find_candidates_by_name",
            &sql,
            &[&name_pattern, &fm_pattern, &exact],
        )
        .await
    }

    async fn find_by_email_domain(&self, email_domain: &str) -> Result<Vec<StoreEntity>> {
        let root = email_domain.split('.').next().unwrap_or(email_domain);
        let root_pattern = format!("%{}%", root.to_lowercase());
        let sql = format!(
            "SELECT {} FROM counterparty \
             WHERE LOWER(email_domain) = LOWER($1) \
                OR LOWER(full_name) LIKE $2 \
                OR LOWER(ultimate_parent) LIKE $2 \
             LIMIT 100",
            ENTITY_COLUMNS
        );
        self.query("find_by_email_domain", &sql, &[&email_domain, &root_pattern])
            .await
    }

    async fn find_by_cleaned_short_name(&self, cleaned: &str) -> Result<Vec<StoreEntity>> {
        let sql = format!(
            "SELECT {} FROM counterparty \
             WHERE REGEXP_REPLACE(LOWER(short_name), '[^a-z0-9]', '', 'g') = $1",
            ENTITY_COLUMNS
        );
        self.query("find_by_cleaned_short_name", &sql, &[&cleaned]).await
    }

    async fn find_by_id(&self, entity_id: i64) -> Result<Option<StoreEntity>> {
        let sql = format!(
            "SELECT {} FROM counterparty WHERE entity_id = $1 \
             UNION ALL \
             SELECT {} FROM counterparty_location l \
             LEFT JOIN counterparty c ON c.entity_id = l.parent_customer_id \
             WHERE l.location_id = $1",
            ENTITY_COLUMNS, LOCATION_COLUMNS
        );
        let mut results = self.query("find_by_id", &sql, &[&entity_id]).await?;
        Ok(if results.is_empty() {
            None
        } else {
            Some(results.remove(0))
        })
    }
}

fn row_to_entity(row: &Row) -> Result<StoreEntity> {
    let record_type: String = row.try_get("record_type").context("missing record_type")?;
    Ok(StoreEntity {
        entity_id: row.try_get("entity_id").context("missing entity_id")?,
        full_name: row.try_get("full_name").context("missing full_name")?,
        short_name: row.try_get("short_name")?,
        fund_manager: row.try_get("ultimate_parent")?,
        mei: row.try_get("mei")?,
        lei: row.try_get("lei")?,
        ein: row.try_get("ein")?,
        debt_domain_id: row.try_get("debt_domain_id")?,
        country_code: row.try_get("country_code")?,
        legal_address: row.try_get("legal_address")?,
        tax_address: row.try_get("tax_address")?,
        is_location: record_type == "LOCATION",
        parent_customer_id: row.try_get::<_, Option<i64>>("parent_customer_id")?,
        last_modified: row.try_get::<_, Option<NaiveDateTime>>("last_modified")?,
    })
}
