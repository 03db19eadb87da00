mod chapter;
mod join;
mod series;

pub use self::chapter::{ChapterRecord, ChapterState};
pub use self::join::CachedPair;
pub use self::series::SeriesRecord;

pub(crate) use self::chapter::ChapterRow;
pub(crate) use self::join::CachedPairRow;
pub(crate) use self::series::SeriesRow;

/// Timestamps ride the notification bus as plain Unix seconds.
pub(crate) mod unix_ts {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::UtcDateTime;

    pub fn serialize<S: Serializer>(value: &UtcDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.unix_timestamp())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<UtcDateTime, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        UtcDateTime::from_unix_timestamp(seconds).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::UtcDateTime;

        pub fn serialize<S: Serializer>(
            value: &Option<UtcDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_some(&value.unix_timestamp()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<UtcDateTime>, D::Error> {
            let seconds = Option::<i64>::deserialize(deserializer)?;
            seconds
                .map(UtcDateTime::from_unix_timestamp)
                .transpose()
                .map_err(serde::de::Error::custom)
        }
    }
}
