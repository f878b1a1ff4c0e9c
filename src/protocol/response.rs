use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// Status value of a successful reply; anything else is an error description.
pub const STATUS_OK: &str = "ok";

/// A decoded server payload.
///
/// `rows` holds only the batch carried by this payload. `from_row` and `to_row`
/// locate the batch inside the complete result set of `row_count` rows.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Response {
    pub status: String,
    #[serde(rename = "msg")]
    pub message: String,
    pub action: String,
    #[serde(rename = "pubsubid")]
    pub pubsub_id: String,
    #[serde(rename = "rows")]
    pub row_count: u64,
    #[serde(rename = "fromrow")]
    pub from_row: u64,
    #[serde(rename = "torow")]
    pub to_row: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub columns: Vec<String>,
    #[serde(rename = "data", deserialize_with = "null_as_default")]
    pub rows: Vec<Vec<String>>,
}

impl Response {
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Whether this payload carries a usable batch of rows.
    pub fn has_batch(&self) -> bool {
        self.row_count > 0 && !self.rows.is_empty() && self.last_offset().is_some()
    }

    /// Zero-based offset of the last row in this batch, `None` for an inverted or
    /// unaddressable range.
    pub fn last_offset(&self) -> Option<usize> {
        let span = self.to_row.checked_sub(self.from_row)?;
        usize::try_from(span).ok()
    }

    pub fn value(&self, row: usize, ordinal: usize) -> Option<&str> {
        self.rows.get(row)?.get(ordinal).map(String::as_str)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Column name to ordinal lookup for the most recently accepted reply.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ColumnIndex {
    names: Vec<String>,
    ordinals: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new(columns: &[String]) -> Self {
        let mut ordinals = HashMap::with_capacity(columns.len());
        for (ordinal, name) in columns.iter().enumerate() {
            ordinals.entry(name.clone()).or_insert(ordinal);
        }

        Self {
            names: columns.to_vec(),
            ordinals,
        }
    }

    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.ordinals.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ordinals.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
