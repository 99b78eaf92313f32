//! Style records and collections.

use std::collections::HashSet;

/// Two-character marker standing in for a line break in the display form of a field.
pub const LINE_BREAK_MARKER: &str = "<br>";

/// Character appended to a colliding name until it is unique.
pub const DEDUP_SUFFIX: char = 'x';

/// A single prompt style.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyleRecord {
    /// User-editable display ordinal. Usually numeric, but not guaranteed.
    pub sort: String,
    /// Style name, possibly qualified as `prefix::name`.
    pub name: String,
    /// Prompt text.
    pub prompt: String,
    /// Negative prompt text.
    pub negative_prompt: String,
    /// Free-form notes, stored out of band in the notes sidecar.
    pub notes: String,
}

impl StyleRecord {
    /// Creates a record with empty sort ordinal and notes.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        prompt: impl Into<String>,
        negative_prompt: impl Into<String>,
    ) -> Self {
        Self {
            sort: String::new(),
            name: name.into(),
            prompt: prompt.into(),
            negative_prompt: negative_prompt.into(),
            notes: String::new(),
        }
    }

    /// Sets the notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Sets the sort ordinal.
    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    /// Parses the sort ordinal as a number.
    #[must_use]
    pub fn numeric_sort(&self) -> Option<f64> {
        self.sort
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| !value.is_nan())
    }

    fn user_fields_mut(&mut self) -> [&mut String; 3] {
        [&mut self.prompt, &mut self.negative_prompt, &mut self.notes]
    }
}

/// An ordered sequence of styles belonging to one collection.
///
/// Records are addressed by `name`. Uniqueness is only enforced when the
/// collection is persisted (see [`Collection::dedup_names`]).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Collection {
    records: Vec<StyleRecord>,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Creates a collection from records, keeping their order.
    #[must_use]
    pub const fn from_records(records: Vec<StyleRecord>) -> Self {
        Self { records }
    }

    /// Returns the records in order.
    #[must_use]
    pub fn records(&self) -> &[StyleRecord] {
        &self.records
    }

    /// Consumes the collection, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<StyleRecord> {
        self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, StyleRecord> {
        self.records.iter()
    }

    /// Names of all records, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    /// Appends a record.
    pub fn push(&mut self, record: StyleRecord) {
        self.records.push(record);
    }

    /// Returns the first record with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StyleRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Inserts the record, or replaces the first record with the same name in place.
    ///
    /// Returns `true` if an existing record was replaced.
    pub fn upsert(&mut self, record: StyleRecord) -> bool {
        if let Some(existing) = self.records.iter_mut().find(|r| r.name == record.name) {
            *existing = record;
            true
        } else {
            self.records.push(record);
            false
        }
    }

    /// Removes every record with the given name, returning how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.name != name);
        before - self.records.len()
    }

    /// Assigns sort ordinals `1..=N` in current order.
    pub fn renumber(&mut self) {
        for (i, record) in self.records.iter_mut().enumerate() {
            record.sort = (i + 1).to_string();
        }
    }

    /// Stable-sorts records by numeric sort ordinal.
    ///
    /// If any ordinal is not numeric the order is left unchanged and `false`
    /// is returned.
    pub fn autosort(&mut self) -> bool {
        let keys: Option<Vec<f64>> = self.records.iter().map(StyleRecord::numeric_sort).collect();
        let Some(keys) = keys else {
            return false;
        };

        let mut keyed: Vec<(f64, StyleRecord)> =
            keys.into_iter().zip(self.records.drain(..)).collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.records = keyed.into_iter().map(|(_, record)| record).collect();
        true
    }

    /// Replaces every occurrence of `search` in the text fields of every record.
    ///
    /// Returns the number of fields changed. An empty search string is a no-op.
    pub fn search_and_replace(&mut self, search: &str, replace: &str) -> usize {
        if search.is_empty() {
            return 0;
        }
        let mut changed = 0;
        for record in &mut self.records {
            let fields = [
                &mut record.name,
                &mut record.prompt,
                &mut record.negative_prompt,
                &mut record.notes,
            ];
            for field in fields {
                if field.contains(search) {
                    *field = field.replace(search, replace);
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Makes names unique by appending [`DEDUP_SUFFIX`] to later collisions.
    ///
    /// Returns the number of records renamed.
    pub fn dedup_names(&mut self) -> usize {
        let mut used: HashSet<String> = HashSet::with_capacity(self.records.len());
        let mut renamed = 0;
        for record in &mut self.records {
            if used.contains(&record.name) {
                while used.contains(&record.name) {
                    record.name.push(DEDUP_SUFFIX);
                }
                renamed += 1;
            }
            used.insert(record.name.clone());
        }
        renamed
    }

    /// Replaces real line breaks in prompt, negative prompt and notes with [`LINE_BREAK_MARKER`].
    pub fn mark_line_breaks(&mut self) {
        for record in &mut self.records {
            for field in record.user_fields_mut() {
                if field.contains('\n') {
                    *field = field.replace('\n', LINE_BREAK_MARKER);
                }
            }
        }
    }

    /// Reverses [`Collection::mark_line_breaks`].
    pub fn restore_line_breaks(&mut self) {
        for record in &mut self.records {
            for field in record.user_fields_mut() {
                if field.contains(LINE_BREAK_MARKER) {
                    *field = field.replace(LINE_BREAK_MARKER, "\n");
                }
            }
        }
    }
}

impl From<Vec<StyleRecord>> for Collection {
    fn from(records: Vec<StyleRecord>) -> Self {
        Self::from_records(records)
    }
}

impl FromIterator<StyleRecord> for Collection {
    fn from_iter<I: IntoIterator<Item = StyleRecord>>(iter: I) -> Self {
        Self::from_records(iter.into_iter().collect())
    }
}

impl IntoIterator for Collection {
    type Item = StyleRecord;
    type IntoIter = std::vec::IntoIter<StyleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a StyleRecord;
    type IntoIter = std::slice::Iter<'a, StyleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
