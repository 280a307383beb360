pub mod user;

pub use user::User;

/// Serialises timestamps with the REST datetime format (`%Y-%m-%dT%H:%M:%S%z`).
pub mod datetime {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    use crate::config::DATETIME_FORMAT;

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(DATETIME_FORMAT))
    }
}
