use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Display name used for photos whose uploader left the name blank.
pub const DEFAULT_UPLOADER_NAME: &str = "Invitado";

/// Opaque, server-assigned record identifier.
///
/// The collection service hands out integers for some tables and strings for
/// others, so both are accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => RecordId(s),
            StringOrNumber::Signed(n) => RecordId(n.to_string()),
            StringOrNumber::Unsigned(n) => RecordId(n.to_string()),
        })
    }
}

/// Parses the timestamps the collection service emits. Offsets are honoured;
/// naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// A null timestamp is read as "now", the same as a missing one.
fn deserialize_timestamp_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional_timestamp(deserializer)?.unwrap_or_else(Utc::now))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp '{}'", raw))),
        None => Ok(None),
    }
}

/// Common view of the two record types held by a collection store.
pub trait CollectionRecord: Clone + Send + Sync + 'static {
    /// Label used in logs.
    const KIND: &'static str;

    fn id(&self) -> &RecordId;
    fn created_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PhotoPayload")]
pub struct Photo {
    pub id: RecordId,
    pub url: String,
    pub uploader_name: String,
    pub created_at: DateTime<Utc>,
}

/// A photo as it arrives on the wire, before defaults are applied.
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoPayload {
    pub id: RecordId,
    pub url: String,
    #[serde(default, alias = "author")]
    pub uploader_name: Option<String>,
    #[serde(default, alias = "timestamp", deserialize_with = "deserialize_optional_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl PhotoPayload {
    /// Builds the display record, attributing it to `fallback_uploader` when
    /// the service did not echo a name back.
    pub fn into_photo(self, fallback_uploader: &str) -> Photo {
        let uploader_name = self
            .uploader_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .or_else(|| {
                let fallback = fallback_uploader.trim();
                (!fallback.is_empty()).then(|| fallback.to_string())
            })
            .unwrap_or_else(|| DEFAULT_UPLOADER_NAME.to_string());

        Photo {
            id: self.id,
            url: self.url,
            uploader_name,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

impl From<PhotoPayload> for Photo {
    fn from(payload: PhotoPayload) -> Self {
        payload.into_photo(DEFAULT_UPLOADER_NAME)
    }
}

impl CollectionRecord for Photo {
    const KIND: &'static str = "photo";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: RecordId,
    pub author: String,
    pub content: String,
    #[serde(alias = "timestamp", default = "Utc::now", deserialize_with = "deserialize_timestamp_or_now")]
    pub created_at: DateTime<Utc>,
}

impl CollectionRecord for Message {
    const KIND: &'static str = "message";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub finished: bool,
}

pub mod remote_models;
pub mod remote_operations;
