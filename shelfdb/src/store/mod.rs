mod transaction;

use crate::error::{Result, ShelfDbError};
use crate::schema::{validate_model, Model, ModelDefinition};
use crate::storage::RecordList;
use crate::validation::{self, ValidationContext};
use crate::value::{Record, Value};
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use transaction::RecordTransaction;

/// Shared, mutable handle to a collection. Needed for a collection to be the
/// target of a foreign key.
pub type CollectionHandle = Rc<RefCell<Collection>>;

/// The main entry point: records bound to one model.
/// Every mutation is validated against the model; reads resolve foreign keys
/// (see the `view` module for the query surface).
pub struct Collection {
    model: Rc<Model>,
    records: RecordList,
}

impl Collection {
    /// Create an empty collection. Fails if the model does not validate.
    pub fn new(definition: ModelDefinition) -> Result<Self> {
        let model = validate_model(definition)?;
        Ok(Collection {
            model: Rc::new(model),
            records: RecordList::new(),
        })
    }

    /// Create an empty collection behind a shared handle.
    pub fn shared(definition: ModelDefinition) -> Result<CollectionHandle> {
        Ok(Rc::new(RefCell::new(Self::new(definition)?)))
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored records as they are, without foreign-key resolution.
    pub fn records(&self) -> &RecordList {
        &self.records
    }

    /// Insert a record. Auto-increment fields are assigned, the record is
    /// validated, then missing defaults are filled in. Nothing is stored if
    /// validation fails.
    pub fn add(&mut self, mut record: Record) -> Result<()> {
        self.assign_auto_increment(&mut record);
        self.validate(&record, None)?;
        self.fill_defaults(&mut record);
        self.records.push(record);

        log::debug!("{}: inserted record #{}", self.name(), self.records.len());
        Ok(())
    }

    /// Apply `patch` to every record matching `predicate`. Each record is
    /// replaced atomically; one that fails validation is left untouched and
    /// the rest are still attempted. Returns whether any record changed.
    pub fn update<P>(&mut self, predicate: P, patch: &Record) -> bool
    where
        P: Fn(&Record) -> bool,
    {
        self.update_report(predicate, patch).any_updated()
    }

    /// Same as [`update`](Self::update), reporting which records were rejected and why.
    pub fn update_report<P>(&mut self, predicate: P, patch: &Record) -> UpdateOutcome
    where
        P: Fn(&Record) -> bool,
    {
        let matched: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| predicate(record))
            .map(|(index, _)| index)
            .collect();

        let mut outcome = UpdateOutcome::default();
        for index in matched {
            let Some(txn) = RecordTransaction::begin(&self.records, index) else {
                continue;
            };
            let candidate = txn.candidate(patch);

            match self.validate(&candidate, Some(txn.index())) {
                Ok(()) => {
                    txn.commit(&mut self.records, candidate);
                    outcome.updated += 1;
                }
                Err(err) => {
                    log::warn!(
                        "{}: update of record at {} rolled back: {}",
                        self.name(),
                        index,
                        err
                    );
                    txn.rollback(&mut self.records);
                    outcome.rejected.push((index, err));
                }
            }
        }

        log::debug!(
            "{}: updated {} record(s), rejected {}",
            self.name(),
            outcome.updated,
            outcome.rejected.len()
        );
        outcome
    }

    /// Remove every record matching `predicate`, keeping survivors in order.
    /// Returns the number of removed records.
    pub fn delete<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&Record) -> bool,
    {
        let doomed: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| predicate(record))
            .map(|(index, _)| index)
            .collect();

        // Each removal shifts later positions down by one.
        for (removed, index) in doomed.iter().enumerate() {
            self.records.remove(index - removed);
        }

        log::debug!("{}: deleted {} record(s)", self.name(), doomed.len());
        doomed.len()
    }

    /// Reorder storage by `field`. The order persists until the next sort;
    /// new records are still appended at the end.
    pub fn sort(&mut self, field: &str, reverse: bool) -> Result<()> {
        self.model.require_field(field)?;
        self.records.sort_by_field(field, reverse);
        Ok(())
    }

    fn assign_auto_increment(&self, record: &mut Record) {
        let next = Value::from(self.records.len() + 1);
        for (name, field) in self.model.fields() {
            if field.auto_increment {
                record.insert(name.clone(), next.clone());
            }
        }
    }

    fn fill_defaults(&self, record: &mut Record) {
        for (name, field) in self.model.fields() {
            if let Some(default) = &field.default {
                if !record.contains_key(name) {
                    record.insert(name.clone(), default.clone());
                }
            }
        }
    }

    fn validate(&self, record: &Record, exclude: Option<usize>) -> Result<()> {
        let ctx = ValidationContext {
            collection: self,
            exclude,
        };
        validation::validate_record(&ctx, record)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name())
            .field("len", &self.len())
            .finish()
    }
}

/// Result of [`Collection::update_report`]
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    pub updated: usize,
    /// Storage position and validation error of every record that was rolled back
    pub rejected: Vec<(usize, ShelfDbError)>,
}

impl UpdateOutcome {
    pub fn any_updated(&self) -> bool {
        self.updated > 0
    }
}

/// Non-owning reference to a collection, stored as the value of a
/// foreign-key field. Carries the target's name and model so the wiring can be
/// checked without touching the target's records.
#[derive(Clone)]
pub struct CollectionRef {
    name: String,
    model: Rc<Model>,
    target: Weak<RefCell<Collection>>,
}

impl CollectionRef {
    /// Fails while the collection is mutably borrowed, since its name and
    /// model cannot be read then. No field is bound yet, so the error's field
    /// is empty.
    pub fn new(handle: &CollectionHandle) -> Result<Self> {
        let collection = handle.try_borrow().map_err(|_| ShelfDbError::ForeignKey {
            field: String::new(),
            reason: "cannot reference a collection while it is being modified".to_string(),
        })?;
        Ok(CollectionRef {
            name: collection.name().to_string(),
            model: Rc::clone(&collection.model),
            target: Rc::downgrade(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    pub(crate) fn upgrade(&self) -> Option<CollectionHandle> {
        self.target.upgrade()
    }

    /// True when this reference points at `collection` itself.
    pub(crate) fn points_to(&self, collection: &Collection) -> bool {
        self.target
            .upgrade()
            .is_some_and(|handle| std::ptr::eq(handle.as_ptr(), collection))
    }
}

impl PartialEq for CollectionRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.target, &other.target)
    }
}

impl Eq for CollectionRef {}

impl Hash for CollectionRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.target.as_ptr(), state);
    }
}

impl fmt::Debug for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CollectionRef({})", self.name)
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<collection {}>", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConstraintViolation;
    use crate::schema::parse_model_str;
    use pretty_assertions::assert_eq;

    const PEOPLE: &str = r#"
name: people
fields:
  id: { primary_key: true }
  name: { required: true, max_length: 10 }
  age: { min: 0, max: 120 }
"#;

    const TICKETS: &str = r#"
name: tickets
fields:
  id: { primary_key: true, auto_increment: true }
  code: { unique: true, required: true }
  status: { choices: [open, closed], default: open }
  priority: { data_type: int, default: 3 }
"#;

    fn collection(yaml: &str) -> Collection {
        Collection::new(parse_model_str(yaml).unwrap()).unwrap()
    }

    fn rec(yaml: &str) -> Record {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn violation(err: ShelfDbError) -> ConstraintViolation {
        match err {
            ShelfDbError::Constraint(v) => v,
            other => panic!("expected a constraint violation, got {other:?}"),
        }
    }

    #[test]
    fn test_new_requires_primary_key() {
        let definition = parse_model_str("name: t\nfields:\n  a: { unique: true }").unwrap();
        let err = Collection::new(definition).unwrap_err();
        assert!(matches!(err, ShelfDbError::Model(_)));
    }

    #[test]
    fn test_reference_example() {
        let mut people = collection(PEOPLE);

        people.add(rec("id: 1\nname: Ann\nage: 30")).unwrap();
        assert_eq!(people.len(), 1);

        let err = people.add(rec("id: 1\nname: Bob\nage: 25")).unwrap_err();
        assert_eq!(
            violation(err),
            ConstraintViolation::PrimaryKeyViolation {
                field: "id".into(),
                value: Value::Int(1),
            }
        );

        let err = people.add(rec("name: Cid\nage: 30")).unwrap_err();
        assert_eq!(
            violation(err),
            ConstraintViolation::MissingPrimaryKey { field: "id".into() }
        );

        // field checks run before the primary-key presence check
        let err = people.add(rec("name: Cid\nage: 200")).unwrap_err();
        assert!(matches!(violation(err), ConstraintViolation::MaxValue { .. }));

        assert_eq!(people.len(), 1);
    }

    #[test]
    fn test_failed_insert_leaves_storage_unchanged() {
        let mut people = collection(PEOPLE);
        people.add(rec("id: 1\nname: Ann")).unwrap();

        assert!(people.add(rec("id: 2")).is_err());
        assert!(people.add(rec("id: 2\nname: Ann\nheight: 170")).is_err());
        assert_eq!(people.len(), 1);
    }

    #[test]
    fn test_auto_increment_overrides_caller_value() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();
        tickets.add(rec("id: 99\ncode: B")).unwrap();
        tickets.add(rec("id: 1\ncode: C")).unwrap();

        let ids: Vec<&Value> = tickets.records().iter().map(|r| &r["id"]).collect();
        assert_eq!(ids, vec![&Value::Int(1), &Value::Int(2), &Value::Int(3)]);
    }

    #[test]
    fn test_defaults_filled_after_validation() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();

        let stored = tickets.records().get(0).unwrap();
        assert_eq!(stored["status"], Value::from("open"));
        assert_eq!(stored["priority"], Value::Int(3));
        let keys: Vec<&str> = stored.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["code", "id", "status", "priority"]);
    }

    #[test]
    fn test_defaults_are_not_validated() {
        let definition = parse_model_str(
            "name: t\nfields:\n  id: { primary_key: true }\n  level: { max: 5, default: 50 }",
        )
        .unwrap();
        let mut t = Collection::new(definition).unwrap();
        t.add(rec("id: 1")).unwrap();
        assert_eq!(t.records().get(0).unwrap()["level"], Value::Int(50));
    }

    #[test]
    fn test_unique_violation() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();
        let err = tickets.add(rec("code: A")).unwrap_err();
        assert_eq!(
            violation(err),
            ConstraintViolation::NonUniqueValue {
                field: "code".into(),
                value: Value::from("A"),
            }
        );
        assert_eq!(tickets.len(), 1);
    }

    #[test]
    fn test_integral_float_collides_with_int_key() {
        let mut people = collection(PEOPLE);
        people.add(rec("id: 1\nname: Ann")).unwrap();
        let err = people.add(rec("id: 1.0\nname: Bob")).unwrap_err();
        assert_eq!(
            violation(err),
            ConstraintViolation::PrimaryKeyViolation {
                field: "id".into(),
                value: Value::Float(1.0),
            }
        );
        assert_eq!(people.len(), 1);
    }

    #[test]
    fn test_choices_accept_equal_numbers_of_either_kind() {
        let mut levels =
            collection("name: levels\nfields:\n  id: { primary_key: true }\n  tier: { choices: [1, 2] }");
        levels.add(rec("id: 1\ntier: 2.0")).unwrap();
        let err = levels.add(rec("id: 2\ntier: 2.5")).unwrap_err();
        assert!(matches!(violation(err), ConstraintViolation::InvalidChoice { .. }));
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();
        tickets.add(rec("code: B")).unwrap();

        let changed = tickets.update(|r| r["code"] == Value::from("A"), &rec("status: closed"));
        assert!(changed);
        assert_eq!(tickets.len(), 2);

        let first = tickets.records().get(0).unwrap();
        assert_eq!(first["code"], Value::from("A"));
        assert_eq!(first["status"], Value::from("closed"));
        assert_eq!(tickets.records().get(1).unwrap()["status"], Value::from("open"));
    }

    #[test]
    fn test_update_does_not_collide_with_itself() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();

        // rewriting the unique and primary-key fields with their own values
        assert!(tickets.update(|_| true, &rec("id: 1\ncode: A\npriority: 1")));
        assert_eq!(tickets.records().get(0).unwrap()["priority"], Value::Int(1));
    }

    #[test]
    fn test_update_rolls_back_on_violation() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();
        tickets.add(rec("code: B")).unwrap();
        let before = tickets.records().get(1).unwrap().clone();

        let changed = tickets.update(|r| r["code"] == Value::from("B"), &rec("code: A"));
        assert!(!changed);
        assert_eq!(tickets.records().get(1).unwrap(), &before);

        let changed = tickets.update(|r| r["code"] == Value::from("B"), &rec("status: lost"));
        assert!(!changed);
        assert_eq!(tickets.records().get(1).unwrap(), &before);
    }

    #[test]
    fn test_update_attempts_each_match_independently() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();
        tickets.add(rec("code: B")).unwrap();
        tickets.add(rec("code: C")).unwrap();

        // setting code to "B" everywhere: only the record already holding B passes
        let outcome = tickets.update_report(|_| true, &rec("code: B"));
        assert_eq!(outcome.updated, 1);
        let rejected: Vec<usize> = outcome.rejected.iter().map(|(i, _)| *i).collect();
        assert_eq!(rejected, vec![0, 2]);
        assert!(outcome
            .rejected
            .iter()
            .all(|(_, e)| matches!(e.violation(), Some(ConstraintViolation::NonUniqueValue { .. }))));

        let codes: Vec<&Value> = tickets.records().iter().map(|r| &r["code"]).collect();
        assert_eq!(codes, vec![&Value::from("A"), &Value::from("B"), &Value::from("C")]);
    }

    #[test]
    fn test_update_with_unknown_field_is_rejected() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();
        assert!(!tickets.update(|_| true, &rec("owner: ann")));
        assert!(!tickets.records().get(0).unwrap().contains_key("owner"));
    }

    #[test]
    fn test_update_without_matches() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();
        assert!(!tickets.update(|_| false, &rec("status: closed")));
    }

    #[test]
    fn test_delete_keeps_survivor_order() {
        let mut people = collection(PEOPLE);
        for (id, age) in [(1, 30), (2, 101), (3, 45), (4, 110), (5, 102), (6, 20)] {
            let mut record = Record::new();
            record.insert("id".into(), Value::from(id));
            record.insert("name".into(), Value::from(format!("p{id}")));
            record.insert("age".into(), Value::from(age));
            people.add(record).unwrap();
        }

        let removed = people.delete(|r| r["age"].as_i64().is_some_and(|a| a > 100));
        assert_eq!(removed, 3);

        let ids: Vec<i64> = people.records().iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 3, 6]);
    }

    #[test]
    fn test_delete_everything_and_nothing() {
        let mut tickets = collection(TICKETS);
        tickets.add(rec("code: A")).unwrap();
        tickets.add(rec("code: B")).unwrap();

        assert_eq!(tickets.delete(|_| false), 0);
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets.delete(|_| true), 2);
        assert!(tickets.is_empty());
    }

    #[test]
    fn test_sort() {
        let mut people = collection(PEOPLE);
        people.add(rec("id: 1\nname: Cid\nage: 40")).unwrap();
        people.add(rec("id: 2\nname: Ann\nage: 20")).unwrap();
        people.add(rec("id: 3\nname: Bob\nage: 40")).unwrap();

        people.sort("age", true).unwrap();
        let ids: Vec<i64> = people.records().iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 3, 2]);

        people.sort("name", false).unwrap();
        let ids: Vec<i64> = people.records().iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        assert!(matches!(
            people.sort("height", false),
            Err(ShelfDbError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_collection_ref_identity() {
        let a = Collection::shared(parse_model_str(PEOPLE).unwrap()).unwrap();
        let b = Collection::shared(parse_model_str(PEOPLE).unwrap()).unwrap();

        let ra = CollectionRef::new(&a).unwrap();
        assert_eq!(ra, CollectionRef::new(&a).unwrap());
        assert_ne!(ra, CollectionRef::new(&b).unwrap());
        assert_eq!(ra.to_string(), "<collection people>");
        assert!(ra.points_to(&a.borrow()));
        assert!(!ra.points_to(&b.borrow()));

        drop(a);
        assert!(!ra.is_alive());
    }

    #[test]
    fn test_collection_ref_on_busy_collection() {
        let a = Collection::shared(parse_model_str(PEOPLE).unwrap()).unwrap();
        let _writer = a.borrow_mut();
        let err = CollectionRef::new(&a).unwrap_err();
        assert!(matches!(err, ShelfDbError::ForeignKey { ref reason, .. } if reason.contains("being modified")));
    }
}
