//! Diesel schema for task persistence.

diesel::table! {
    /// Task records with their write-ordering watermark.
    tasks (id) {
        /// Server-assigned task identifier.
        id -> Int8,
        /// Task title.
        #[max_length = 255]
        title -> Varchar,
        /// Optional free-form notes.
        content -> Nullable<Text>,
        /// Optional calendar due date.
        due_date -> Nullable<Date>,
        /// Completion flag.
        done -> Bool,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last mutation timestamp.
        updated_at -> Timestamptz,
        /// Logical timestamp of the latest accepted write.
        last_request_ts -> Timestamptz,
    }
}

diesel::table! {
    /// Writes queued until their logical timestamp comes due.
    deferred_ops (id) {
        /// Server-assigned operation identifier.
        id -> Int8,
        /// Target task, null for creates.
        task_id -> Nullable<Int8>,
        /// Operation kind: `create`, `update`, or `delete`.
        #[max_length = 10]
        op_type -> Varchar,
        /// Field snapshot plus `request_timestamp`.
        payload -> Jsonb,
        /// Earliest execution instant.
        execute_at -> Timestamptz,
        /// Logical timestamp of the originating request.
        request_ts -> Timestamptz,
        /// Enqueue timestamp.
        created_at -> Timestamptz,
    }
}
