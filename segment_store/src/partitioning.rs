//! Partition routing: rows are routed to a partition derived from a
//! configured column, with a fallback for nulls.

use data_types::Error;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::Hasher;

/// Routes rows to partitions by the value of a configured column. The
/// partition *is* the column's value rather than a hash bucket (a row with
/// `league = "nfl"` routes to partition `"nfl"`); [`token_for`] exposes the
/// hash of a partition key so an admin op like `scanSplits` can bucket
/// partitions into token ranges the way a wide-column store would.
#[derive(Debug, Clone)]
pub struct PartitionRouter {
    partition_column: String,
    default_partition_key: Option<String>,
}

impl PartitionRouter {
    /// Route on `partition_column`, with no fallback for null values.
    pub fn new(partition_column: impl Into<String>) -> Self {
        Self {
            partition_column: partition_column.into(),
            default_partition_key: None,
        }
    }

    /// Route on `partition_column`, falling back to `default_partition_key`
    /// when the column is null.
    pub fn with_default(
        partition_column: impl Into<String>,
        default_partition_key: impl Into<String>,
    ) -> Self {
        Self {
            partition_column: partition_column.into(),
            default_partition_key: Some(default_partition_key.into()),
        }
    }

    /// Resolve the destination partition for a row's field map. `None` for
    /// the partition column means "null".
    pub fn route(&self, fields: &HashMap<String, String>) -> Result<String, Error> {
        match fields.get(&self.partition_column) {
            Some(value) => Ok(value.clone()),
            None => self.default_partition_key.clone().ok_or_else(|| {
                Error::NullPartitionValue {
                    column: self.partition_column.clone(),
                }
            }),
        }
    }
}

/// A stable 64-bit token for a partition key, for use by token-range style
/// admin operations such as `scanSplits`.
pub fn token_for(partition_key: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write(partition_key.as_bytes());
    hasher.finish()
}
