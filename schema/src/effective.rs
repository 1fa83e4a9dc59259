//! Folding versioned column definitions into an effective schema.

use crate::column::Column;
use observability_deps::tracing::debug;
use std::collections::BTreeMap;

/// The effective columns for a dataset at a particular version horizon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: BTreeMap<String, Column>,
}

impl Schema {
    /// An empty schema.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up a column by name.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Iterate the effective columns in name order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Number of effective columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Apply the fold rule for a single incoming column against this schema,
    /// mutating it in place:
    ///
    /// - `isDeleted` removes the entry.
    /// - property-equal re-declaration is rejected as redundant (logged, no
    ///   change).
    /// - a changed re-declaration replaces the entry.
    /// - an unseen name is inserted.
    fn fold_one(&mut self, column: Column) {
        match self.columns.get(column.name()) {
            Some(_) if column.is_deleted() => {
                self.columns.remove(column.name());
            }
            None if column.is_deleted() => {
                // Tombstoning a name that was never present is a no-op fold;
                // `validate` is what rejects this as invalid when it matters.
                debug!(column = column.name(), "ignoring tombstone for unknown column");
            }
            Some(existing) if existing.is_property_equal(&column) => {
                debug!(
                    column = column.name(),
                    version = column.version(),
                    "rejecting redundant column re-declaration"
                );
            }
            Some(_) => {
                self.columns.insert(column.name().to_string(), column);
            }
            None => {
                self.columns.insert(column.name().to_string(), column);
            }
        }
    }

    /// Fold a full list of column definitions into an effective schema.
    ///
    /// The result must depend only on the set of columns, not on how callers
    /// batched the inserts, so columns are sorted by ascending version
    /// (stably, so same-version ties keep their relative input order)
    /// before folding.
    pub fn fold(columns: impl IntoIterator<Item = Column>) -> Self {
        let mut columns: Vec<Column> = columns.into_iter().collect();
        columns.sort_by_key(|c| c.version());
        let mut schema = Self::empty();
        for column in columns {
            schema.fold_one(column);
        }
        schema
    }

    /// Fold one more column into an existing effective schema, returning the
    /// updated schema. Used when a single new column is inserted against an
    /// already-computed effective schema rather than refolding history.
    pub fn folded_with(mut self, column: Column) -> Self {
        self.fold_one(column);
        self
    }
}

/// A single violated rule from [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationViolation {
    /// `isSystem` did not match the `:`-prefix convention on the name.
    SystemFlagMismatch,
    /// The column already exists at a version `>=` the proposed one.
    VersionNotIncreasing { current: u32, proposed: u32 },
    /// The column already exists and the proposal is property-equal to it.
    NoPropertyChange,
    /// The column does not exist and the proposal tries to tombstone it.
    TombstoneOfUnknownColumn,
}

/// Validate a proposed new or changed column against the current effective
/// schema, returning every violated rule. An empty result means the
/// proposal is valid.
pub fn validate(schema: &Schema, candidate: &Column) -> Vec<ValidationViolation> {
    let mut violations = Vec::new();

    // `candidate.is_system()` is caller-supplied, not derived from the name
    // (see `Column::new`), so a proposal that gets the `:`-prefix convention
    // wrong is actually reachable here.
    if candidate.is_system() != candidate.name().starts_with(':') {
        violations.push(ValidationViolation::SystemFlagMismatch);
    }

    match schema.get(candidate.name()) {
        Some(existing) => {
            if candidate.version() <= existing.version() {
                violations.push(ValidationViolation::VersionNotIncreasing {
                    current: existing.version(),
                    proposed: candidate.version(),
                });
            }
            if existing.is_property_equal(candidate) {
                violations.push(ValidationViolation::NoPropertyChange);
            }
        }
        None => {
            if candidate.is_deleted() {
                violations.push(ValidationViolation::TombstoneOfUnknownColumn);
            }
        }
    }

    violations
}
