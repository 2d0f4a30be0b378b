//! `EventStore` sobre la tabla `event_log`.
//!
//! El payload guarda el enum `FlowEventKind` completo como JSON; `event_type`
//! (minúsculas) alimenta el CHECK de la tabla.
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;
use promo_core::{CoreEngineError, EventStore, FlowEvent, FlowEventKind};
use serde_json::Value;
use uuid::Uuid;

use super::{with_retry, ConnectionProvider};
use crate::error::PersistenceError;
use crate::schema::event_log;

#[derive(Insertable, Debug)]
#[diesel(table_name = event_log)]
struct NewEventRow<'a> {
    flow_id: &'a Uuid,
    event_type: &'a str,
    payload: &'a Value,
}

#[derive(Queryable, Debug)]
struct EventRow {
    seq: i64,
    flow_id: Uuid,
    ts: DateTime<Utc>,
    #[allow(dead_code)]
    event_type: String,
    payload: Value,
}

impl TryFrom<EventRow> for FlowEvent {
    type Error = PersistenceError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind: FlowEventKind =
            serde_json::from_value(row.payload).map_err(|e| PersistenceError::Corrupt(format!("event seq {}: {e}", row.seq)))?;
        Ok(FlowEvent { seq: row.seq as u64,
                       flow_id: row.flow_id,
                       kind,
                       ts: row.ts })
    }
}

pub struct PgEventStore<P: ConnectionProvider> {
    pub provider: P,
}

impl<P: ConnectionProvider> PgEventStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Flows con al menos un evento, del más reciente al más antiguo.
    pub fn flow_ids(&self) -> Result<Vec<Uuid>, PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            let mut rows: Vec<(Uuid, Option<i64>)> = event_log::table.group_by(event_log::flow_id)
                                                                 .select((event_log::flow_id, diesel::dsl::max(event_log::seq)))
                                                                 .load(&mut conn)?;
            rows.sort_by(|a, b| b.1.cmp(&a.1));
            Ok(rows.into_iter().map(|(id, _)| id).collect())
        })
    }

    fn insert(&self, flow_id: Uuid, kind: &FlowEventKind) -> Result<(i64, DateTime<Utc>), PersistenceError> {
        let payload = serde_json::to_value(kind).map_err(|e| PersistenceError::Unknown(format!("ser: {e}")))?;
        let event_type = kind.type_name();
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(event_log::table).values(NewEventRow { flow_id: &flow_id,
                                                                       event_type,
                                                                       payload: &payload })
                                                 .returning((event_log::seq, event_log::ts))
                                                 .get_result(&mut conn)
                                                 .map_err(PersistenceError::from)
        })
    }
}

impl<P: ConnectionProvider> EventStore for PgEventStore<P> {
    fn append_kind(&mut self, flow_id: Uuid, kind: FlowEventKind) -> Result<FlowEvent, CoreEngineError> {
        let (seq, ts) = self.insert(flow_id, &kind)?;
        debug!("append flow_id={flow_id} seq={seq} kind={}", kind.type_name());
        Ok(FlowEvent { seq: seq as u64,
                       flow_id,
                       kind,
                       ts })
    }

    fn list(&self, flow_id: Uuid) -> Result<Vec<FlowEvent>, CoreEngineError> {
        let rows: Vec<EventRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            event_log::table.filter(event_log::flow_id.eq(flow_id))
                            .order(event_log::seq.asc())
                            .load(&mut conn)
                            .map_err(PersistenceError::from)
        })?;
        let events = rows.into_iter()
                         .map(FlowEvent::try_from)
                         .collect::<Result<Vec<_>, _>>()?;
        debug!("list flow_id={flow_id} count={}", events.len());
        Ok(events)
    }
}
