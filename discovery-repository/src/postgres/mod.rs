//! PostgreSQL implementation of the catalog store.
//!
//! Each entity kind maps to its own table (see [`EntityKind::table`]) holding
//! the store-owned envelope columns plus a JSONB body; kinds with history get a
//! `{table}_history` companion. Table names come from a closed enum, never from
//! input, so they are safe to format into statements.
//!
//! ## Transactions
//!
//! Every mutating call opens one transaction, locks the row it is about to
//! change with `SELECT ... FOR UPDATE`, applies the write, appends history and
//! commits. Unique-index and check-constraint violations are mapped to
//! [`CatalogRepositoryError::Conflict`] and validation errors.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use discovery_shared::{
    ChangeContext, EntityKind, HistoryRecord, HistoryType, Partner, Scope,
};
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::errors::CatalogRepositoryError;
use crate::interfaces::{
    plan_save, CatalogStore, RecordFilter, RecordWrite, SavePlan, StoreOutcome, StoredRecord,
};

const RECORD_COLUMNS: &str =
    "id, uuid, partner_id, natural_key, draft, source, retired, data, created, modified";

const HISTORY_COLUMNS: &str =
    "history_id, id, history_type, history_date, history_user, history_change_reason, data";

pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    /// Wraps an existing pool. The schema must already be migrated.
    pub async fn new(pool: PgPool) -> Result<Self, CatalogRepositoryError> {
        Ok(Self { pool })
    }

    /// Connects to `url` with at most `max_connections` pooled connections.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, CatalogRepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Self::new(pool).await
    }

    /// Applies the bundled migrations.
    pub async fn migrate(&self) -> Result<(), CatalogRepositoryError> {
        sqlx::migrate!("src/postgres/migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_tx(
        &self,
        kind: EntityKind,
        id: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
            RECORD_COLUMNS,
            kind.table()
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut **tx).await?;
        row.map(|row| record_from_row(kind, &row)).transpose()
    }

    async fn lock_existing_tx(
        &self,
        write: &RecordWrite,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let row = if write.kind.key_is_global() {
            let sql = format!(
                "SELECT {} FROM {} WHERE natural_key = $1 AND draft = $2 FOR UPDATE",
                RECORD_COLUMNS,
                write.kind.table()
            );
            sqlx::query(&sql)
                .bind(&write.natural_key)
                .bind(write.draft)
                .fetch_optional(&mut **tx)
                .await?
        } else {
            let sql = format!(
                "SELECT {} FROM {} WHERE partner_id IS NOT DISTINCT FROM $1 \
                 AND natural_key = $2 AND draft = $3 FOR UPDATE",
                RECORD_COLUMNS,
                write.kind.table()
            );
            sqlx::query(&sql)
                .bind(write.scope.partner_id())
                .bind(&write.natural_key)
                .bind(write.draft)
                .fetch_optional(&mut **tx)
                .await?
        };
        row.map(|row| record_from_row(write.kind, &row)).transpose()
    }

    async fn insert_tx(
        &self,
        record: &StoredRecord,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i64, CatalogRepositoryError> {
        let sql = format!(
            "INSERT INTO {} (uuid, partner_id, natural_key, draft, source, retired, data, created, modified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
            record.kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(record.uuid)
            .bind(record.partner_id)
            .bind(&record.natural_key)
            .bind(record.draft)
            .bind(&record.source)
            .bind(record.retired)
            .bind(&record.data)
            .bind(record.created)
            .bind(record.modified)
            .fetch_one(&mut **tx)
            .await
            .map_err(CatalogRepositoryError::from_database)?;
        Ok(row.try_get("id")?)
    }

    async fn update_tx(
        &self,
        record: &StoredRecord,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), CatalogRepositoryError> {
        let sql = format!(
            "UPDATE {} SET source = $2, retired = $3, data = $4, modified = $5 WHERE id = $1",
            record.kind.table()
        );
        sqlx::query(&sql)
            .bind(record.id)
            .bind(&record.source)
            .bind(record.retired)
            .bind(&record.data)
            .bind(record.modified)
            .execute(&mut **tx)
            .await
            .map_err(CatalogRepositoryError::from_database)?;
        Ok(())
    }

    async fn append_history_tx(
        &self,
        record: &StoredRecord,
        history_type: HistoryType,
        ctx: &ChangeContext,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), CatalogRepositoryError> {
        if !record.kind.has_history() {
            return Ok(());
        }
        let sql = format!(
            "INSERT INTO {}_history (id, history_type, history_date, history_user, history_change_reason, data) \
             VALUES ($1, $2, $3, $4, $5, $6)",
            record.kind.table()
        );
        sqlx::query(&sql)
            .bind(record.id)
            .bind(history_type.as_str())
            .bind(Utc::now())
            .bind(&ctx.user)
            .bind(&ctx.reason)
            .bind(record.snapshot())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn idempotent_hit_tx(
        &self,
        kind: EntityKind,
        key: &str,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let row = sqlx::query(
            "SELECT entity_id FROM idempotency_keys WHERE kind = $1 AND idempotency_key = $2",
        )
        .bind(kind.label())
        .bind(key)
        .fetch_optional(&mut **tx)
        .await?;
        match row {
            Some(row) => {
                let id: i64 = row.try_get("entity_id")?;
                self.load_tx(kind, id, tx).await
            }
            None => Ok(None),
        }
    }
}

fn record_from_row(kind: EntityKind, row: &PgRow) -> Result<StoredRecord, CatalogRepositoryError> {
    Ok(StoredRecord {
        kind,
        id: row.try_get("id")?,
        uuid: row.try_get("uuid")?,
        partner_id: row.try_get("partner_id")?,
        natural_key: row.try_get("natural_key")?,
        draft: row.try_get("draft")?,
        source: row.try_get("source")?,
        retired: row.try_get("retired")?,
        created: row.try_get("created")?,
        modified: row.try_get("modified")?,
        data: row.try_get::<Value, _>("data")?,
    })
}

fn history_from_row(kind: EntityKind, row: &PgRow) -> Result<HistoryRecord, CatalogRepositoryError> {
    let history_type: String = row.try_get("history_type")?;
    let history_type = HistoryType::parse(history_type.trim()).ok_or_else(|| {
        CatalogRepositoryError::conflict(format!("unknown history type '{}'", history_type))
    })?;
    Ok(HistoryRecord {
        history_id: row.try_get("history_id")?,
        kind,
        entity_id: row.try_get("id")?,
        history_type,
        history_date: row.try_get::<DateTime<Utc>, _>("history_date")?,
        history_user: row.try_get("history_user")?,
        change_reason: row.try_get("history_change_reason")?,
        snapshot: row.try_get("data")?,
    })
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn ensure_partner(
        &self,
        short_code: &str,
        name: &str,
    ) -> Result<Partner, CatalogRepositoryError> {
        let row = sqlx::query(
            "INSERT INTO partners (short_code, name) VALUES ($1, $2) \
             ON CONFLICT (short_code) DO UPDATE SET short_code = EXCLUDED.short_code \
             RETURNING id, short_code, name",
        )
        .bind(short_code)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(Partner {
            id: row.try_get("id")?,
            short_code: row.try_get("short_code")?,
            name: row.try_get("name")?,
        })
    }

    async fn get_partner(&self, short_code: &str) -> Result<Option<Partner>, CatalogRepositoryError> {
        let row = sqlx::query("SELECT id, short_code, name FROM partners WHERE short_code = $1")
            .bind(short_code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(Partner {
                id: row.try_get("id")?,
                short_code: row.try_get("short_code")?,
                name: row.try_get("name")?,
            })
        })
        .transpose()
    }

    async fn list_partners(&self) -> Result<Vec<Partner>, CatalogRepositoryError> {
        let rows = sqlx::query("SELECT id, short_code, name FROM partners ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Partner {
                    id: row.try_get("id")?,
                    short_code: row.try_get("short_code")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn find_by_id(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", RECORD_COLUMNS, kind.table());
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(|row| record_from_row(kind, &row)).transpose()
    }

    async fn find_by_key(
        &self,
        kind: EntityKind,
        scope: Scope,
        natural_key: &str,
        draft: bool,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {} WHERE natural_key = ",
            RECORD_COLUMNS,
            kind.table()
        ));
        query.push_bind(natural_key);
        query.push(" AND draft = ").push_bind(draft);
        if !kind.key_is_global() {
            query
                .push(" AND partner_id IS NOT DISTINCT FROM ")
                .push_bind(scope.partner_id());
        }
        let row = query.build().fetch_optional(&self.pool).await?;
        row.map(|row| record_from_row(kind, &row)).transpose()
    }

    async fn find_by_uuid(
        &self,
        kind: EntityKind,
        uuid: Uuid,
        draft: bool,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE uuid = $1 AND draft = $2 ORDER BY id LIMIT 1",
            RECORD_COLUMNS,
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(uuid)
            .bind(draft)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| record_from_row(kind, &row)).transpose()
    }

    async fn list(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
    ) -> Result<Vec<StoredRecord>, CatalogRepositoryError> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {} WHERE TRUE",
            RECORD_COLUMNS,
            kind.table()
        ));
        if let Some(partner_id) = filter.partner_id {
            query.push(" AND partner_id = ").push_bind(partner_id);
        }
        if let Some(source) = &filter.source {
            query.push(" AND source = ").push_bind(source.clone());
        }
        if let Some(draft) = filter.draft {
            query.push(" AND draft = ").push_bind(draft);
        }
        if !filter.include_retired {
            query.push(" AND NOT retired");
        }
        query.push(" ORDER BY id");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(|row| record_from_row(kind, row)).collect()
    }

    #[instrument(skip(self, write, ctx), fields(kind = %write.kind, key = %write.natural_key))]
    async fn save(
        &self,
        write: RecordWrite,
        ctx: &ChangeContext,
    ) -> Result<StoreOutcome, CatalogRepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(key) = &ctx.idempotency_key {
            if let Some(record) = self.idempotent_hit_tx(write.kind, key, &mut tx).await? {
                tx.commit().await?;
                debug!(id = record.id, "Idempotency key already applied");
                return Ok(StoreOutcome::Unchanged(record));
            }
        }

        let existing = self.lock_existing_tx(&write, &mut tx).await?;
        if let Some(current) = &existing {
            if current.partner_id != write.scope.partner_id() {
                return Err(CatalogRepositoryError::conflict(format!(
                    "{} '{}' belongs to another partner",
                    write.kind, write.natural_key
                )));
            }
        }

        let outcome = match plan_save(existing.as_ref(), &write, Utc::now()) {
            SavePlan::Unchanged(record) => StoreOutcome::Unchanged(record),
            SavePlan::Insert(mut record) => {
                record.id = self.insert_tx(&record, &mut tx).await?;
                if !ctx.skip_history {
                    self.append_history_tx(&record, HistoryType::Created, ctx, &mut tx)
                        .await?;
                }
                StoreOutcome::Created(record)
            }
            SavePlan::Update(record, changes) => {
                self.update_tx(&record, &mut tx).await?;
                if !ctx.skip_history {
                    self.append_history_tx(&record, HistoryType::Changed, ctx, &mut tx)
                        .await?;
                }
                StoreOutcome::Updated { record, changes }
            }
        };

        if let Some(key) = &ctx.idempotency_key {
            sqlx::query(
                "INSERT INTO idempotency_keys (kind, idempotency_key, entity_id) VALUES ($1, $2, $3) \
                 ON CONFLICT (kind, idempotency_key) DO NOTHING",
            )
            .bind(write.kind.label())
            .bind(key)
            .bind(outcome.record().id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(CatalogRepositoryError::from_database)?;
        Ok(outcome)
    }

    async fn delete(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(record) = self.load_tx(kind, id, &mut tx).await? else {
            return Ok(None);
        };

        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(CatalogRepositoryError::from_database)?;
        self.append_history_tx(&record, HistoryType::Deleted, ctx, &mut tx)
            .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn retire(
        &self,
        kind: EntityKind,
        id: i64,
        ctx: &ChangeContext,
    ) -> Result<Option<StoredRecord>, CatalogRepositoryError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut record) = self.load_tx(kind, id, &mut tx).await? else {
            return Ok(None);
        };
        if record.retired {
            return Ok(None);
        }

        record.retired = true;
        record.modified = Utc::now();
        self.update_tx(&record, &mut tx).await?;
        self.append_history_tx(&record, HistoryType::Changed, ctx, &mut tx)
            .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn history(
        &self,
        kind: EntityKind,
        entity_id: i64,
    ) -> Result<Vec<HistoryRecord>, CatalogRepositoryError> {
        if !kind.has_history() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {}_history WHERE id = $1 ORDER BY history_date, history_id",
            HISTORY_COLUMNS,
            kind.table()
        );
        let rows = sqlx::query(&sql).bind(entity_id).fetch_all(&self.pool).await?;
        rows.iter().map(|row| history_from_row(kind, row)).collect()
    }

    async fn list_history(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<HistoryRecord>, CatalogRepositoryError> {
        if !kind.has_history() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {}_history ORDER BY id, history_date, history_id",
            HISTORY_COLUMNS,
            kind.table()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| history_from_row(kind, row)).collect()
    }

    async fn delete_history(
        &self,
        kind: EntityKind,
        history_ids: &[i64],
    ) -> Result<u64, CatalogRepositoryError> {
        if history_ids.is_empty() || !kind.has_history() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM {}_history WHERE history_id = ANY($1)",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(history_ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_history_user(
        &self,
        old_username: &str,
        new_username: &str,
    ) -> Result<u64, CatalogRepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;
        for kind in EntityKind::ALL.iter().filter(|k| k.has_history()) {
            let sql = format!(
                "UPDATE {}_history SET history_user = $2 WHERE history_user = $1",
                kind.table()
            );
            let result = sqlx::query(&sql)
                .bind(old_username)
                .bind(new_username)
                .execute(&mut *tx)
                .await?;
            updated += result.rows_affected();
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn record_historical_slug(
        &self,
        partner_id: i64,
        course_id: i64,
        slug: &str,
    ) -> Result<(), CatalogRepositoryError> {
        sqlx::query(
            "INSERT INTO course_url_slug_history (partner_id, url_slug, course_id) VALUES ($1, $2, $3) \
             ON CONFLICT (partner_id, url_slug) DO UPDATE SET course_id = EXCLUDED.course_id",
        )
        .bind(partner_id)
        .bind(slug)
        .bind(course_id)
        .execute(&self.pool)
        .await
        .map_err(CatalogRepositoryError::from_database)?;
        Ok(())
    }

    async fn find_course_by_historical_slug(
        &self,
        partner_id: i64,
        slug: &str,
    ) -> Result<Option<i64>, CatalogRepositoryError> {
        let row = sqlx::query(
            "SELECT course_id FROM course_url_slug_history WHERE partner_id = $1 AND url_slug = $2",
        )
        .bind(partner_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.try_get::<i64, _>("course_id")).transpose()?)
    }
}
