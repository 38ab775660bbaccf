table! {
    reports (id) {
        id -> Integer,
        title -> Text,
        description -> Text,
        incident_type -> Text,
        location -> Text,
        severity -> Text,
        reporter_label -> Text,
        submitter_id -> Nullable<Text>,
        created_time -> Timestamp,
        img_path -> Nullable<Text>,
        show_on_map -> Nullable<Bool>,
    }
}
