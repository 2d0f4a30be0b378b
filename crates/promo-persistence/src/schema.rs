//! Esquema Diesel. Reemplazable con `diesel print-schema`.

diesel::table! {
    event_log (seq) {
        seq -> BigInt,
        flow_id -> Uuid,
        ts -> Timestamptz,
        event_type -> Text,
        payload -> Jsonb,
    }
}

diesel::table! {
    models (name) {
        name -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    model_versions (model_name, version) {
        model_name -> Text,
        version -> Integer,
        checkpoint_uuid -> Text,
        checkpoint -> Jsonb,
        registered_at -> Timestamptz,
    }
}

diesel::joinable!(model_versions -> models (model_name));

diesel::allow_tables_to_appear_in_same_query!(event_log, models, model_versions,);
