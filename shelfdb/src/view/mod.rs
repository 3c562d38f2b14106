pub mod ops;

use crate::error::{Result, ShelfDbError};
use crate::store::Collection;
use crate::value::{record_to_json, Record, Value};
use indexmap::{IndexMap, IndexSet};

/// Whether a read resolves foreign keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Foreign-key fields are replaced by the matching records of the
    /// referenced collection.
    #[default]
    Joined,
    /// Records exactly as stored.
    Raw,
}

fn cap(limit: Option<usize>) -> usize {
    limit.unwrap_or(usize::MAX)
}

/// Read path and query operators. Every operator reads the joined view, so
/// foreign keys are resolved everywhere; `limit` caps the number of records
/// produced (or folded, for `reduce`).
impl Collection {
    /// All records, up to `limit`, with foreign keys resolved against the
    /// current state of the referenced collections.
    pub fn get_all(&self, limit: Option<usize>) -> Result<Vec<Record>> {
        self.view(ReadMode::Joined).take(cap(limit)).collect()
    }

    /// The record whose primary key equals `key`, joined.
    pub fn get(&self, key: impl Into<Value>) -> Result<Option<Record>> {
        let key = key.into();
        let primary_key = self.model().primary_key();
        self.records()
            .iter()
            .find(|record| record.get(primary_key) == Some(&key))
            .map(|record| self.resolve(record))
            .transpose()
    }

    /// Project every record onto `fields`, joined.
    pub fn select(&self, fields: &[&str], limit: Option<usize>) -> Result<Vec<Record>> {
        self.select_with(fields, limit, ReadMode::Joined)
    }

    /// Project every record onto `fields`. Fields a record does not carry are
    /// left out of its projection.
    pub fn select_with(
        &self,
        fields: &[&str],
        limit: Option<usize>,
        mode: ReadMode,
    ) -> Result<Vec<Record>> {
        self.view(mode)
            .take(cap(limit))
            .map(|record| {
                record.map(|record| {
                    record
                        .into_iter()
                        .filter(|(name, _)| fields.contains(&name.as_str()))
                        .collect::<Record>()
                })
            })
            .collect()
    }

    pub fn filter<P>(&self, predicate: P, limit: Option<usize>) -> Result<Vec<Record>>
    where
        P: Fn(&Record) -> bool,
    {
        let limit = cap(limit);
        let mut matched = Vec::new();
        for record in self.view(ReadMode::Joined) {
            if matched.len() >= limit {
                break;
            }
            let record = record?;
            if predicate(&record) {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    pub fn map<T, F>(&self, mut f: F, limit: Option<usize>) -> Result<Vec<T>>
    where
        F: FnMut(Record) -> T,
    {
        self.view(ReadMode::Joined)
            .take(cap(limit))
            .map(|record| record.map(&mut f))
            .collect()
    }

    /// Left fold over the records, starting from `initial`.
    pub fn reduce<A, F>(&self, mut f: F, initial: A, limit: Option<usize>) -> Result<A>
    where
        F: FnMut(A, &Record) -> A,
    {
        let mut acc = initial;
        for record in self.view(ReadMode::Joined).take(cap(limit)) {
            acc = f(acc, &record?);
        }
        Ok(acc)
    }

    /// Records grouped by their value of `field`, groups in first-seen order.
    /// Records without the field fall in the `Null` group.
    pub fn group_by(&self, field: &str) -> Result<IndexMap<Value, Vec<Record>>> {
        self.model().require_field(field)?;

        let mut groups: IndexMap<Value, Vec<Record>> = IndexMap::new();
        for record in self.view(ReadMode::Joined) {
            let record = record?;
            let key = record.get(field).cloned().unwrap_or(Value::Null);
            groups.entry(key).or_default().push(record);
        }
        Ok(groups)
    }

    /// Group by `group_by`, collect each group's `attribute` values and fold
    /// them with `op`, one result per group in first-seen order.
    pub fn aggregate<T, F>(&self, group_by: &str, op: F, attribute: &str) -> Result<IndexMap<Value, T>>
    where
        F: Fn(&[Value]) -> T,
    {
        self.model().require_field(group_by)?;
        self.model().require_field(attribute)?;

        let mut groups: IndexMap<Value, Vec<Value>> = IndexMap::new();
        for record in self.view(ReadMode::Joined) {
            let record = record?;
            let key = record.get(group_by).cloned().unwrap_or(Value::Null);
            let value = record.get(attribute).cloned().unwrap_or(Value::Null);
            groups.entry(key).or_default().push(value);
        }

        Ok(groups
            .into_iter()
            .map(|(key, values)| (key, op(&values)))
            .collect())
    }

    /// Unique values of `attribute` in first-occurrence order.
    pub fn distinct(&self, attribute: &str) -> Result<Vec<Value>> {
        self.model().require_field(attribute)?;

        let mut seen = IndexSet::new();
        for record in self.view(ReadMode::Joined) {
            let record = record?;
            seen.insert(record.get(attribute).cloned().unwrap_or(Value::Null));
        }
        Ok(seen.into_iter().collect())
    }

    /// The joined view as a JSON array.
    pub fn to_json(&self, limit: Option<usize>) -> Result<serde_json::Value> {
        let records = self.get_all(limit)?;
        Ok(serde_json::Value::Array(
            records.iter().map(record_to_json).collect(),
        ))
    }

    fn view(&self, mode: ReadMode) -> impl Iterator<Item = Result<Record>> + '_ {
        self.records().iter().map(move |record| match mode {
            ReadMode::Raw => Ok(record.clone()),
            ReadMode::Joined => self.resolve(record),
        })
    }

    /// Replace each foreign-key field of `record` with the records of the
    /// referenced collection whose join key equals this record's primary key.
    /// Absent and null foreign-key fields are left as they are.
    fn resolve(&self, record: &Record) -> Result<Record> {
        let model = self.model();
        let key = record
            .get(model.primary_key())
            .cloned()
            .unwrap_or(Value::Null);

        let mut resolved = record.clone();
        for (name, field) in model.fields() {
            let Some(fk) = &field.foreign_key else {
                continue;
            };
            let Some(value) = record.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let joined = self.join(name, &fk.join_key, value, &key)?;
            resolved.insert(name.clone(), Value::List(joined));
        }
        Ok(resolved)
    }

    fn join(&self, field: &str, join_key: &str, value: &Value, key: &Value) -> Result<Vec<Value>> {
        let fk_error = |reason: String| ShelfDbError::ForeignKey {
            field: field.to_string(),
            reason,
        };
        let matching = |target: &Collection| -> Vec<Value> {
            target
                .records()
                .iter()
                .filter(|candidate| candidate.get(join_key) == Some(key))
                .map(|candidate| Value::Map(candidate.clone()))
                .collect()
        };

        let handle = value.as_collection().ok_or_else(|| {
            fk_error(format!("expected a collection handle, got {}", value.type_name()))
        })?;

        // A self-referencing collection may already be borrowed by the caller.
        if handle.points_to(self) {
            return Ok(matching(self));
        }

        let target = handle.upgrade().ok_or_else(|| {
            fk_error(format!("referenced collection '{}' no longer exists", handle.name()))
        })?;
        let guard = target.try_borrow().map_err(|_| {
            fk_error(format!("referenced collection '{}' is being modified", handle.name()))
        })?;

        let joined = matching(&*guard);
        log::trace!(
            "{}.{}: joined {} record(s) from {}",
            self.name(),
            field,
            joined.len(),
            handle.name()
        );
        Ok(joined)
    }
}
