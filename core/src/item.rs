//! Display items projected from records.

use tracing::warn;

use crate::error::SyncError;
use crate::types::{QueryOutcome, Record, RecordId};

/// Field every displayable record must carry as a string.
pub const NAME_FIELD: &str = "name";

/// A record narrowed to what the list shows, plus the record itself so it can
/// be updated or deleted later.
#[derive(Debug, Clone)]
pub struct Item {
    pub name: String,
    pub record: Record,
}

impl Item {
    /// Project `record`, failing if it has no string `name` field.
    pub fn from_record(record: Record) -> Result<Self, SyncError> {
        match record.get_str(NAME_FIELD) {
            Some(name) => Ok(Self {
                name: name.to_string(),
                record,
            }),
            None => Err(SyncError::RecordFieldMissing {
                record_id: record.id,
                field: NAME_FIELD.to_string(),
            }),
        }
    }

    pub fn id(&self) -> RecordId {
        self.record.id
    }
}

/// Items are the same when they show the same name for the same record.
impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.record.id == other.record.id && self.name == other.name
    }
}

impl Eq for Item {}

/// Items built from a query plus the records that could not be shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub items: Vec<Item>,
    pub skipped: Vec<SyncError>,
}

/// Project every query result in order. Per-record failures and records
/// without a usable name are skipped and reported, never fatal.
pub fn project(outcome: QueryOutcome) -> Projection {
    let mut projection = Projection::default();
    for result in outcome.results {
        let item = result
            .map_err(|failure| SyncError::RecordFailed {
                record_id: failure.record_id,
                message: failure.message,
            })
            .and_then(Item::from_record);
        match item {
            Ok(item) => projection.items.push(item),
            Err(e) => {
                warn!(error = %e, "skipping record");
                projection.skipped.push(e);
            }
        }
    }
    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordFailure;

    #[test]
    fn projects_name_field() {
        let record = Record::new("Fruits").with(NAME_FIELD, "Mango");
        let id = record.id;
        let item = Item::from_record(record).unwrap();
        assert_eq!(item.name, "Mango");
        assert_eq!(item.id(), id);
    }

    #[test]
    fn missing_or_mistyped_name_is_rejected() {
        let record = Record::new("Fruits");
        let id = record.id;
        let err = Item::from_record(record).unwrap_err();
        assert_eq!(
            err,
            SyncError::RecordFieldMissing {
                record_id: id,
                field: "name".to_string()
            }
        );

        let record = Record::new("Fruits").with(NAME_FIELD, 42);
        assert!(Item::from_record(record).is_err());
    }

    #[test]
    fn project_keeps_order_and_reports_skips() {
        let outcome = QueryOutcome {
            results: vec![
                Ok(Record::new("Fruits").with(NAME_FIELD, "Apple")),
                Ok(Record::new("Fruits").with("colour", "red")),
                Err(RecordFailure {
                    record_id: None,
                    message: "unreadable".to_string(),
                }),
                Ok(Record::new("Fruits").with(NAME_FIELD, "Banana")),
            ],
        };
        let projection = project(outcome);
        let names: Vec<_> = projection.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Apple", "Banana"]);
        assert_eq!(projection.skipped.len(), 2);
        assert!(matches!(projection.skipped[0], SyncError::RecordFieldMissing { .. }));
        assert!(matches!(projection.skipped[1], SyncError::RecordFailed { .. }));
    }

    #[test]
    fn equality_ignores_unrelated_fields() {
        let record = Record::new("Fruits").with(NAME_FIELD, "Fig");
        let a = Item::from_record(record.clone()).unwrap();
        let b = Item::from_record(record.with("color", "purple")).unwrap();
        assert_eq!(a, b);

        let other = Item::from_record(Record::new("Fruits").with(NAME_FIELD, "Fig")).unwrap();
        assert_ne!(a, other);
    }
}
