// Ordered record container backing a collection

use crate::value::{Record, Value};
use std::cmp::Ordering;

/// Insertion-ordered sequence of records with indexed access.
/// Positions shift down when an earlier record is removed.
#[derive(Debug, Clone, Default)]
pub struct RecordList {
    items: Vec<Record>,
}

impl RecordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        self.items.push(record);
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.items.get(index)
    }

    /// Replace the record at `index`, returning the previous one.
    pub fn set(&mut self, index: usize, record: Record) -> Option<Record> {
        self.items
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, record))
    }

    pub fn remove(&mut self, index: usize) -> Option<Record> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.items.iter()
    }

    /// Stable sort by the value of `field`. Records without the field sort as
    /// null. With `reverse`, equal records still keep their relative order.
    pub fn sort_by_field(&mut self, field: &str, reverse: bool) {
        self.items.sort_by(|a, b| {
            let ordering = compare_optional(a.get(field), b.get(field));
            if reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });
    }
}

fn compare_optional(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(y)) => Value::Null.total_cmp(y),
        (Some(x), None) => x.total_cmp(&Value::Null),
    }
}

impl<'a> IntoIterator for &'a RecordList {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rec(yaml: &str) -> Record {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn ids(list: &RecordList) -> Vec<i64> {
        list.iter().filter_map(|r| r["id"].as_i64()).collect()
    }

    #[test]
    fn test_push_get_set_remove() {
        let mut list = RecordList::new();
        list.push(rec("id: 1"));
        list.push(rec("id: 2"));
        list.push(rec("id: 3"));
        assert_eq!(list.len(), 3);

        let old = list.set(1, rec("id: 20")).unwrap();
        assert_eq!(old["id"], Value::Int(2));
        assert_eq!(list.get(1).unwrap()["id"], Value::Int(20));
        assert!(list.set(9, rec("id: 9")).is_none());

        assert_eq!(list.remove(0).unwrap()["id"], Value::Int(1));
        assert!(list.remove(5).is_none());
        assert_eq!(ids(&list), vec![20, 3]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut list = RecordList::new();
        list.push(rec("id: 1\nteam: b"));
        list.push(rec("id: 2\nteam: a"));
        list.push(rec("id: 3\nteam: b"));
        list.push(rec("id: 4"));

        list.sort_by_field("team", false);
        assert_eq!(ids(&list), vec![4, 2, 1, 3]);

        list.sort_by_field("team", true);
        assert_eq!(ids(&list), vec![1, 3, 2, 4]);
    }
}
