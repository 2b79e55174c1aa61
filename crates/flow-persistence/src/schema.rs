// Diesel schema for the three persisted tables (§3, §6). JSON-typed
// columns (`spec`, `errors`, `stats`, `logs`, `pipelines`,
// `pipeline_details`) are stored as serialized TEXT, matching the
// teacher crate's `schema.rs` convention; timestamps are stored as
// Unix seconds (`BigInt`) for portability across SQLite and Postgres.

diesel::table! {
    dataset (identifier) {
        identifier -> Text,
        owner -> Text,
        spec -> Text,
        created_at_ts -> BigInt,
        updated_at_ts -> BigInt,
        scheduled_for_ts -> Nullable<BigInt>,
        certified -> Bool,
    }
}

diesel::table! {
    dataset_revision (revision_id) {
        revision_id -> Text,
        dataset_id -> Text,
        revision -> BigInt,
        status -> Text,
        errors -> Text,
        stats -> Text,
        logs -> Text,
        pipelines -> Text,
        created_at_ts -> BigInt,
        updated_at_ts -> BigInt,
    }
}

diesel::table! {
    pipelines (pipeline_id) {
        pipeline_id -> Text,
        flow_id -> Text,
        title -> Nullable<Text>,
        pipeline_details -> Text,
        status -> Text,
        errors -> Text,
        stats -> Text,
        logs -> Text,
        created_at_ts -> BigInt,
        updated_at_ts -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(dataset, dataset_revision, pipelines);
