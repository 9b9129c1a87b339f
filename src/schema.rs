// Hand-written to match the weather bot schema on both backends.
// SQLite stores flags as 0/1 integers and timestamps as text; diesel's type
// mapping normalizes both to `bool` / `NaiveDateTime` on read.

diesel::table! {
    users (user_id) {
        user_id -> BigInt,
        username -> Nullable<Text>,
        first_name -> Text,
        last_name -> Nullable<Text>,
        city -> Nullable<Text>,
        timezone -> Text,
        notification_time -> Text,
        is_active -> Bool,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    notification_settings (user_id) {
        user_id -> BigInt,
        morning_time -> Text,
        evening_time -> Text,
        send_morning -> Bool,
        send_evening -> Bool,
        weather_type -> Text,
    }
}

diesel::joinable!(notification_settings -> users (user_id));
diesel::allow_tables_to_appear_in_same_query!(users, notification_settings);
