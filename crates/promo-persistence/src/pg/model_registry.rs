//! `ModelRegistry` sobre `models` / `model_versions`.
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Text;
use log::{debug, info};
use promo_domain::{Checkpoint, Model, ModelLookup, ModelRegistry, ModelVersion, PipelineError};
use serde_json::Value;

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::{model_versions, models};

#[derive(Queryable, Debug)]
struct ModelRow {
    name: String,
    created_at: DateTime<Utc>,
}

impl From<ModelRow> for Model {
    fn from(r: ModelRow) -> Self {
        Model { name: r.name,
                created_at: r.created_at }
    }
}

#[derive(Queryable, Debug)]
struct VersionRow {
    model_name: String,
    version: i32,
    #[allow(dead_code)]
    checkpoint_uuid: String,
    checkpoint: Value,
    registered_at: DateTime<Utc>,
}

impl TryFrom<VersionRow> for ModelVersion {
    type Error = PersistenceError;

    fn try_from(r: VersionRow) -> Result<Self, Self::Error> {
        let checkpoint: Checkpoint = serde_json::from_value(r.checkpoint).map_err(|e| {
                                                                              PersistenceError::Corrupt(format!("{} v{}: {e}",
                                                                                                                r.model_name,
                                                                                                                r.version))
                                                                          })?;
        Ok(ModelVersion { model_name: r.model_name,
                          version: r.version as u32,
                          checkpoint,
                          registered_at: r.registered_at })
    }
}

#[derive(Insertable)]
#[diesel(table_name = model_versions)]
struct NewVersionRow<'a> {
    model_name: &'a str,
    version: i32,
    checkpoint_uuid: &'a str,
    checkpoint: &'a Value,
}

/// Registro de modelos en Postgres. Versiones numeradas desde 1 en orden de
/// registro; la vigente es la de mayor número.
pub struct PgModelRegistry<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgModelRegistry<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn find_model(conn: &mut PgConnection, name: &str) -> Result<Option<ModelRow>, PersistenceError> {
        Ok(models::table.filter(models::name.eq(name))
                        .first::<ModelRow>(conn)
                        .optional()?)
    }

    fn latest_version(conn: &mut PgConnection, name: &str) -> Result<Option<VersionRow>, PersistenceError> {
        Ok(model_versions::table.filter(model_versions::model_name.eq(name))
                                .order(model_versions::version.desc())
                                .first::<VersionRow>(conn)
                                .optional()?)
    }
}

impl<P: ConnectionProvider> ModelRegistry for PgModelRegistry<P> {
    fn lookup(&self, name: &str) -> Result<ModelLookup, PipelineError> {
        let found = with_retry(|| {
            let mut conn = self.provider.connection()?;
            let Some(model) = Self::find_model(&mut conn, name)? else {
                return Ok(None);
            };
            Ok(Some((model, Self::latest_version(&mut conn, name)?)))
        })?;
        Ok(match found {
            None => ModelLookup::NotFound,
            Some((model, None)) => ModelLookup::NoVersions(model.into()),
            Some((model, Some(v))) => ModelLookup::Current(model.into(), v.try_into()?),
        })
    }

    fn create_model(&self, name: &str) -> Result<Model, PipelineError> {
        let row = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(models::table).values(models::name.eq(name))
                                              .on_conflict_do_nothing()
                                              .execute(&mut conn)?;
            models::table.filter(models::name.eq(name))
                         .first::<ModelRow>(&mut conn)
                         .map_err(PersistenceError::from)
        })?;
        info!("model '{name}' present in registry");
        Ok(row.into())
    }

    fn register_version(&self, name: &str, checkpoint: &Checkpoint) -> Result<ModelVersion, PipelineError> {
        let snapshot = serde_json::to_value(checkpoint).map_err(|e| PipelineError::ModelRegistryUnavailable(e.to_string()))?;
        let row = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx| {
                    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))").bind::<Text, _>(name)
                                                                                  .execute(tx)?;
                    if Self::find_model(tx, name)?.is_none() {
                        return Err(PersistenceError::NotFound);
                    }
                    let current: Option<i32> = model_versions::table.filter(model_versions::model_name.eq(name))
                                                                    .select(diesel::dsl::max(model_versions::version))
                                                                    .first(tx)?;
                    let version = current.unwrap_or(0) + 1;
                    diesel::insert_into(model_versions::table).values(NewVersionRow { model_name: name,
                                                                                      version,
                                                                                      checkpoint_uuid: &checkpoint.uuid,
                                                                                      checkpoint: &snapshot })
                                                              .returning(model_versions::all_columns)
                                                              .get_result::<VersionRow>(tx)
                                                              .map_err(PersistenceError::from)
                })
        }).map_err(|e| match e {
              PersistenceError::NotFound => PipelineError::ModelRegistryUnavailable(format!("model '{name}' does not exist")),
              other => other.into(),
          })?;
        debug!("registered {name} v{}", row.version);
        Ok(row.try_into()?)
    }

    fn versions(&self, name: &str) -> Result<Vec<ModelVersion>, PipelineError> {
        let rows: Vec<VersionRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            model_versions::table.filter(model_versions::model_name.eq(name))
                                 .order(model_versions::version.asc())
                                 .load(&mut conn)
                                 .map_err(PersistenceError::from)
        })?;
        rows.into_iter()
            .map(|r| ModelVersion::try_from(r).map_err(PipelineError::from))
            .collect()
    }
}
