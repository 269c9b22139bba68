//! Core types for hn-crawl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Identifier of an item in the remote source
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<ItemId> for i64 {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl PartialEq<i64> for ItemId {
    fn eq(&self, other: &i64) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

// Stored as INTEGER in the items table
impl sqlx::Type<sqlx::Sqlite> for ItemId {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
    }

    fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ItemId {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ItemId {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Closed interval of item ids processed by one run
///
/// `start > end` describes an empty range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRange {
    /// First id (inclusive)
    pub start: ItemId,
    /// Last id (inclusive)
    pub end: ItemId,
}

impl IdRange {
    /// Create a range covering `start..=end`
    pub fn new(start: ItemId, end: ItemId) -> Self {
        Self { start, end }
    }

    /// Number of ids in the range (`end - start + 1`, or 0 when empty)
    pub fn len(&self) -> u64 {
        if self.start > self.end {
            0
        } else {
            (self.end.0 - self.start.0) as u64 + 1
        }
    }

    /// Whether the range contains no ids
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Whether `id` falls inside the range
    pub fn contains(&self, id: ItemId) -> bool {
        self.start <= id && id <= self.end
    }

    /// Ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ItemId> + Send + 'static {
        (self.start.0..=self.end.0).map(ItemId)
    }

    /// Coarse position of `id` within the range, in percent
    pub fn progress_percent(&self, id: ItemId) -> f32 {
        let span = self.end.0 - self.start.0;
        if span <= 0 {
            return 100.0;
        }
        (id.0 - self.start.0) as f32 / span as f32 * 100.0
    }
}

impl std::fmt::Display for IdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// One fetched item: the id and the raw response body
///
/// The payload is never parsed; error-shaped and empty bodies are kept as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Item id
    pub id: ItemId,
    /// Response body for the id
    pub payload: String,
}

/// An id abandoned after exhausting a finite retry budget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
    /// Item id that could not be fetched
    pub id: ItemId,
    /// Number of attempts made
    pub attempts: u32,
    /// Last error observed
    pub error: String,
}

/// A fetched record the sink failed to persist
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFailure {
    /// Item id of the record
    pub id: ItemId,
    /// Error returned by the sink
    pub error: String,
}

/// Outcome of one id, sent from a worker to the sink
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerMessage {
    /// The item was fetched
    Fetched(Record),
    /// The item was given up on
    Abandoned(DeadLetter),
}

impl WorkerMessage {
    /// Id this outcome belongs to
    pub fn id(&self) -> ItemId {
        match self {
            WorkerMessage::Fetched(record) => record.id,
            WorkerMessage::Abandoned(dead) => dead.id,
        }
    }
}

/// Summary of a finished crawl
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlReport {
    /// Range that was crawled
    pub range: IdRange,
    /// Number of ids in the range
    pub expected: u64,
    /// Records successfully written to the sink
    pub persisted: u64,
    /// Records the sink rejected
    pub write_failures: Vec<WriteFailure>,
    /// Ids abandoned by the retry policy
    pub dead_letters: Vec<DeadLetter>,
    /// Wall-clock duration of the run
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl CrawlReport {
    /// Whether every id in the range ended up in the sink
    pub fn is_complete(&self) -> bool {
        self.persisted == self.expected
    }
}

/// Summary of a table to file export
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportReport {
    /// Number of lines written
    pub lines: u64,
    /// Output file
    pub path: PathBuf,
}

/// Result of one [`crate::runner::run`] invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum RunOutcome {
    /// A crawl or resume run finished
    Crawled(CrawlReport),
    /// An export finished
    Exported(ExportReport),
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
