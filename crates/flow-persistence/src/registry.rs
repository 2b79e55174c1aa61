//! `DieselFlowRegistry`: the SQL-backed `FlowRegistry` implementation.
//! Connection pooling follows the teacher crate's r2d2 setup; every
//! operation below runs its queries inside `conn.transaction(...)` so a
//! mid-operation error rolls the whole call back (§5).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use flow::errors::{RegistryError, RegistryResult};
use flow::patch::{PipelinePatch, RevisionPatch};
use flow::registry::{format_identifier, FlowRegistry};
use flow_domain::{calculate_new_schedule, Dataset, DatasetRevision, Pipeline, PipelineState, RevisionKey};
use serde_json::Value;
use tracing::instrument;

#[cfg(not(feature = "pg"))]
pub type DbConnection = diesel::sqlite::SqliteConnection;
#[cfg(feature = "pg")]
pub type DbConnection = diesel::pg::PgConnection;

pub type DbPool = Pool<ConnectionManager<DbConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

/// Builds the r2d2 pool and runs pending migrations. `database_url`
/// is `DATABASE_URL` for Postgres deployments, or a SQLite file/`:memory:`
/// path otherwise.
pub fn new_pool(database_url: &str) -> RegistryResult<DbPool> {
    let manager = ConnectionManager::<DbConnection>::new(database_url);
    let pool = Pool::builder()
        .build(manager)
        .map_err(|e| RegistryError::Storage(format!("pool init: {e}")))?;
    let mut conn = pool.get().map_err(|e| RegistryError::Storage(format!("pool checkout: {e}")))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| RegistryError::Storage(format!("migrations: {e}")))?;
    Ok(pool)
}

pub struct DieselFlowRegistry {
    pool: Arc<DbPool>,
}

impl DieselFlowRegistry {
    pub fn new(pool: DbPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Reads `DATABASE_URL` (via `dotenvy`, matching the teacher's
    /// `new_from_env` convention) and builds a registry against it.
    pub fn new_from_env() -> RegistryResult<Self> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| RegistryError::Storage("DATABASE_URL is not set".to_string()))?;
        Ok(Self::new(new_pool(&url)?))
    }

    fn conn(&self) -> RegistryResult<diesel::r2d2::PooledConnection<ConnectionManager<DbConnection>>> {
        self.pool.get().map_err(|e| RegistryError::Storage(format!("pool checkout: {e}")))
    }
}

impl FlowRegistry for DieselFlowRegistry {
    #[instrument(skip(self))]
    fn get_dataset(&self, identifier: &str) -> RegistryResult<Option<Dataset>> {
        use crate::schema::dataset::dsl;
        let mut conn = self.conn()?;
        let row = conn
            .transaction(|conn| dsl::dataset.find(identifier).first::<crate::rows::DatasetRow>(conn).optional())
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(row.map(crate::rows::DatasetRow::into_domain))
    }

    #[instrument(skip(self, spec))]
    fn create_or_update_dataset(
        &self,
        identifier: &str,
        owner: &str,
        spec: Value,
        updated_at: DateTime<Utc>,
    ) -> RegistryResult<Dataset> {
        use crate::schema::dataset::dsl;
        let mut conn = self.conn()?;
        let result = conn.transaction(|conn| {
            let existing = dsl::dataset
                .find(identifier)
                .first::<crate::rows::DatasetRow>(conn)
                .optional()?;
            let row = match existing {
                Some(mut row) => {
                    row.owner = owner.to_string();
                    row.spec = serde_json::to_string(&spec).unwrap_or_else(|_| "null".to_string());
                    row.updated_at_ts = updated_at.timestamp();
                    diesel::update(dsl::dataset.find(identifier))
                        .set((
                            dsl::owner.eq(&row.owner),
                            dsl::spec.eq(&row.spec),
                            dsl::updated_at_ts.eq(row.updated_at_ts),
                        ))
                        .execute(conn)?;
                    row
                }
                None => {
                    let row = crate::rows::DatasetRow::from_domain(&Dataset {
                        identifier: identifier.to_string(),
                        owner: owner.to_string(),
                        spec,
                        created_at: updated_at,
                        updated_at,
                        scheduled_for: None,
                        certified: false,
                    });
                    diesel::insert_into(dsl::dataset).values(&row).execute(conn)?;
                    row
                }
            };
            diesel::QueryResult::Ok(row)
        });
        result.map(crate::rows::DatasetRow::into_domain).map_err(|e| RegistryError::Storage(e.to_string()))
    }

    #[instrument(skip(self))]
    fn update_dataset_schedule(
        &self,
        identifier: &str,
        period_seconds: Option<i64>,
        now: DateTime<Utc>,
    ) -> RegistryResult<Option<DateTime<Utc>>> {
        use crate::schema::dataset::dsl;
        let mut conn = self.conn()?;
        conn.transaction(|conn| {
            let row = dsl::dataset
                .find(identifier)
                .first::<crate::rows::DatasetRow>(conn)
                .optional()?
                .ok_or_else(|| diesel::result::Error::NotFound)?;
            let current = row.scheduled_for_ts.map(|ts| DateTime::from_timestamp(ts, 0).unwrap_or(now));
            let next = calculate_new_schedule(current, period_seconds, now);
            diesel::update(dsl::dataset.find(identifier))
                .set(dsl::scheduled_for_ts.eq(next.map(|n| n.timestamp())))
                .execute(conn)?;
            diesel::QueryResult::Ok(next)
        })
        .map_err(|e| match e {
            diesel::result::Error::NotFound => RegistryError::NotFound(format!("dataset {identifier}")),
            other => RegistryError::Storage(other.to_string()),
        })
    }

    #[instrument(skip(self))]
    fn get_expired_datasets(&self, now: DateTime<Utc>) -> RegistryResult<Vec<Dataset>> {
        use crate::schema::dataset::dsl;
        let mut conn = self.conn()?;
        let rows = conn
            .transaction(|conn| {
                dsl::dataset
                    .filter(dsl::scheduled_for_ts.is_not_null())
                    .filter(dsl::scheduled_for_ts.le(now.timestamp()))
                    .load::<crate::rows::DatasetRow>(conn)
            })
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(rows.into_iter().map(crate::rows::DatasetRow::into_domain).collect())
    }

    #[instrument(skip(self))]
    fn num_datasets_for_owner(&self, owner: &str) -> RegistryResult<u64> {
        use crate::schema::dataset::dsl;
        let mut conn = self.conn()?;
        let count = conn
            .transaction(|conn| dsl::dataset.filter(dsl::owner.eq(owner)).count().get_result::<i64>(conn))
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(count as u64)
    }

    #[instrument(skip(self, errors))]
    fn create_revision(
        &self,
        dataset_id: &str,
        now: DateTime<Utc>,
        status: PipelineState,
        errors: Value,
    ) -> RegistryResult<DatasetRevision> {
        use crate::schema::dataset_revision::dsl;
        let mut conn = self.conn()?;
        let result = conn.transaction(|conn| {
            // The unique index on (dataset_id, revision) (§5) guards this
            // select-max-then-insert against concurrent writers racing past
            // each other; a loser's insert fails the transaction instead of
            // silently colliding.
            let max_revision = dsl::dataset_revision
                .filter(dsl::dataset_id.eq(dataset_id))
                .select(diesel::dsl::max(dsl::revision))
                .first::<Option<i64>>(conn)?
                .unwrap_or(0);
            let next_revision = max_revision + 1;
            let revision_id = format_identifier([dataset_id.to_string(), next_revision.to_string()]);
            let domain = DatasetRevision {
                revision_id: revision_id.clone(),
                dataset_id: dataset_id.to_string(),
                revision: next_revision,
                status,
                errors,
                stats: Value::Object(Default::default()),
                logs: Value::Array(vec![]),
                pipelines: Default::default(),
                created_at: now,
                updated_at: now,
            };
            let row = crate::rows::DatasetRevisionRow::from_domain(&domain);
            diesel::insert_into(dsl::dataset_revision).values(&row).execute(conn)?;
            diesel::QueryResult::Ok(domain)
        });
        result.map_err(|e| RegistryError::Storage(e.to_string()))
    }

    #[instrument(skip(self))]
    fn get_revision(&self, dataset_id: &str, which: RevisionKey) -> RegistryResult<Option<DatasetRevision>> {
        use crate::schema::dataset_revision::dsl;
        let mut conn = self.conn()?;
        let row = conn
            .transaction(|conn| {
                let mut query = dsl::dataset_revision.filter(dsl::dataset_id.eq(dataset_id)).into_boxed();
                query = match which {
                    RevisionKey::Latest => query.order(dsl::revision.desc()),
                    RevisionKey::Successful => query
                        .filter(dsl::status.eq(PipelineState::Success.as_str()))
                        .order(dsl::revision.desc()),
                    RevisionKey::Exact(n) => query.filter(dsl::revision.eq(n)),
                };
                query.first::<crate::rows::DatasetRevisionRow>(conn).optional()
            })
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(row.map(crate::rows::DatasetRevisionRow::into_domain))
    }

    #[instrument(skip(self))]
    fn get_revision_by_id(&self, revision_id: &str) -> RegistryResult<Option<DatasetRevision>> {
        use crate::schema::dataset_revision::dsl;
        let mut conn = self.conn()?;
        let row = conn
            .transaction(|conn| {
                dsl::dataset_revision.find(revision_id).first::<crate::rows::DatasetRevisionRow>(conn).optional()
            })
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(row.map(crate::rows::DatasetRevisionRow::into_domain))
    }

    #[instrument(skip(self, patch))]
    fn update_revision(&self, revision_id: &str, patch: RevisionPatch) -> RegistryResult<DatasetRevision> {
        use crate::schema::dataset_revision::dsl;
        let mut conn = self.conn()?;
        let result = conn.transaction(|conn| {
            let mut row = dsl::dataset_revision
                .find(revision_id)
                .first::<crate::rows::DatasetRevisionRow>(conn)
                .optional()?
                .ok_or_else(|| diesel::result::Error::NotFound)?;
            if let Some(status) = patch.status {
                row.status = status.as_str().to_string();
            }
            if let Some(errors) = &patch.errors {
                row.errors = serde_json::to_string(errors).unwrap_or_else(|_| "null".to_string());
            }
            if let Some(stats) = &patch.stats {
                row.stats = serde_json::to_string(stats).unwrap_or_else(|_| "null".to_string());
            }
            if let Some(logs) = &patch.logs {
                row.logs = serde_json::to_string(logs).unwrap_or_else(|_| "null".to_string());
            }
            if let Some(pipelines) = &patch.pipelines {
                row.pipelines = serde_json::to_string(pipelines).unwrap_or_else(|_| "{}".to_string());
            }
            row.updated_at_ts = patch.updated_at.timestamp();
            diesel::update(dsl::dataset_revision.find(revision_id))
                .set((
                    dsl::status.eq(&row.status),
                    dsl::errors.eq(&row.errors),
                    dsl::stats.eq(&row.stats),
                    dsl::logs.eq(&row.logs),
                    dsl::pipelines.eq(&row.pipelines),
                    dsl::updated_at_ts.eq(row.updated_at_ts),
                ))
                .execute(conn)?;
            diesel::QueryResult::Ok(row)
        });
        result
            .map(crate::rows::DatasetRevisionRow::into_domain)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => RegistryError::NotFound(format!("revision {revision_id}")),
                other => RegistryError::Storage(other.to_string()),
            })
    }

    #[instrument(skip(self, pipeline))]
    fn save_pipeline(&self, pipeline: Pipeline) -> RegistryResult<()> {
        use crate::schema::pipelines::dsl;
        let mut conn = self.conn()?;
        let row = crate::rows::PipelineRow::from_domain(&pipeline);
        conn.transaction(|conn| {
            diesel::insert_into(dsl::pipelines)
                .values(&row)
                .on_conflict(dsl::pipeline_id)
                .do_update()
                .set(&row)
                .execute(conn)
        })
        .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn get_pipeline(&self, pipeline_id: &str) -> RegistryResult<Option<Pipeline>> {
        use crate::schema::pipelines::dsl;
        let mut conn = self.conn()?;
        let row = conn
            .transaction(|conn| dsl::pipelines.find(pipeline_id).first::<crate::rows::PipelineRow>(conn).optional())
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(row.map(crate::rows::PipelineRow::into_domain))
    }

    #[instrument(skip(self))]
    fn list_pipelines_by_id(&self, flow_id: &str) -> RegistryResult<Vec<Pipeline>> {
        use crate::schema::pipelines::dsl;
        let mut conn = self.conn()?;
        let rows = conn
            .transaction(|conn| dsl::pipelines.filter(dsl::flow_id.eq(flow_id)).load::<crate::rows::PipelineRow>(conn))
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(rows.into_iter().map(crate::rows::PipelineRow::into_domain).collect())
    }

    #[instrument(skip(self))]
    fn list_pipelines_by_flow_and_status(
        &self,
        flow_id: &str,
        status: PipelineState,
    ) -> RegistryResult<Vec<Pipeline>> {
        use crate::schema::pipelines::dsl;
        let mut conn = self.conn()?;
        let rows = conn
            .transaction(|conn| {
                dsl::pipelines
                    .filter(dsl::flow_id.eq(flow_id))
                    .filter(dsl::status.eq(status.as_str()))
                    .load::<crate::rows::PipelineRow>(conn)
            })
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(rows.into_iter().map(crate::rows::PipelineRow::into_domain).collect())
    }

    #[instrument(skip(self, patch))]
    fn update_pipeline(&self, pipeline_id: &str, patch: PipelinePatch) -> RegistryResult<bool> {
        use crate::schema::pipelines::dsl;
        let mut conn = self.conn()?;
        let updated = conn.transaction(|conn| {
            let existing = dsl::pipelines.find(pipeline_id).first::<crate::rows::PipelineRow>(conn).optional()?;
            let Some(mut row) = existing else {
                return diesel::QueryResult::Ok(false);
            };
            if let Some(status) = patch.status {
                row.status = status.as_str().to_string();
            }
            if let Some(errors) = &patch.errors {
                row.errors = serde_json::to_string(errors).unwrap_or_else(|_| "null".to_string());
            }
            if let Some(stats) = &patch.stats {
                row.stats = serde_json::to_string(stats).unwrap_or_else(|_| "null".to_string());
            }
            if let Some(logs) = &patch.logs {
                row.logs = serde_json::to_string(logs).unwrap_or_else(|_| "null".to_string());
            }
            row.updated_at_ts = patch.updated_at.timestamp();
            diesel::update(dsl::pipelines.find(pipeline_id))
                .set((
                    dsl::status.eq(&row.status),
                    dsl::errors.eq(&row.errors),
                    dsl::stats.eq(&row.stats),
                    dsl::logs.eq(&row.logs),
                    dsl::updated_at_ts.eq(row.updated_at_ts),
                ))
                .execute(conn)?;
            diesel::QueryResult::Ok(true)
        });
        updated.map_err(|e| RegistryError::Storage(e.to_string()))
    }

    #[instrument(skip(self))]
    fn delete_pipelines(&self, flow_id: &str) -> RegistryResult<()> {
        use crate::schema::pipelines::dsl;
        let mut conn = self.conn()?;
        conn.transaction(|conn| diesel::delete(dsl::pipelines.filter(dsl::flow_id.eq(flow_id))).execute(conn))
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn check_flow_status(&self, flow_id: &str) -> RegistryResult<PipelineState> {
        use crate::schema::pipelines::dsl;
        let mut conn = self.conn()?;
        let statuses = conn
            .transaction(|conn| {
                dsl::pipelines.filter(dsl::flow_id.eq(flow_id)).select(dsl::status).load::<String>(conn)
            })
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        let mut any_running = false;
        let mut any_pending = false;
        let mut any_success = false;
        let mut any_failed = false;
        for s in statuses {
            match s.parse::<PipelineState>() {
                Ok(PipelineState::Running) => any_running = true,
                Ok(PipelineState::Pending) => any_pending = true,
                Ok(PipelineState::Success) => any_success = true,
                Ok(PipelineState::Failed) => any_failed = true,
                Err(_) => {}
            }
        }
        Ok(flow_domain::status::aggregate_flow_status(any_running, any_pending, any_success, any_failed))
    }
}
