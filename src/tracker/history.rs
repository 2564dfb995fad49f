//! Append-only change journal and its replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ModelEvent, ModificationTracker};
use crate::error::{ModelError, VetoError};
use crate::model::{Model, ModelItem};

/// One accepted change with the time it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub event: ModelEvent,
}

/// Ordered list of accepted changes. Replaying it against a model in the
/// initial state reproduces the final state, system ids included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn events(&self) -> impl Iterator<Item = &ModelEvent> {
        self.entries.iter().map(|e| &e.event)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, event: ModelEvent) {
        self.entries.push(JournalEntry {
            timestamp: Utc::now(),
            event,
        });
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Re-apply every event through the model's mutation API.
    ///
    /// Stops at the first rejected event; events before it stay applied.
    pub fn replay(&self, model: &mut Model) -> Result<(), ModelError> {
        for (position, entry) in self.entries.iter().enumerate() {
            tracing::debug!(position, kind = entry.event.kind(), "replaying journal entry");
            apply(model, &entry.event)?;
        }
        Ok(())
    }
}

fn apply(model: &mut Model, event: &ModelEvent) -> Result<(), ModelError> {
    match event {
        ModelEvent::AddTable { table } => {
            model.add_table(table.clone())?;
        }
        ModelEvent::RemoveTable { table, .. } => {
            model.remove_table(table.system_id())?;
        }
        ModelEvent::RenameTable {
            table, new_name, ..
        } => model.rename_table(*table, new_name)?,
        ModelEvent::ChangeTableComment {
            table, new_comment, ..
        } => model.change_table_comment(*table, new_comment.clone())?,
        ModelEvent::AddRelation { relation } => {
            model.add_relation(relation.clone())?;
        }
        ModelEvent::RemoveRelation { relation } => {
            model.remove_relation(relation.system_id())?;
        }
        ModelEvent::ChangeRelation { new, .. } => model.change_relation(new.system_id(), new)?,
        ModelEvent::AddAttributeToTable { table, attribute } => {
            model.add_attribute_to_table(*table, attribute.clone())?;
        }
        ModelEvent::RemoveAttributeFromTable { table, attribute } => {
            model.remove_attribute_from_table(*table, attribute.system_id())?;
        }
        ModelEvent::RenameAttribute {
            attribute,
            new_name,
            ..
        } => model.rename_attribute(*attribute, new_name)?,
        ModelEvent::ChangeAttribute { new, .. } => model.change_attribute(new.system_id(), new)?,
        ModelEvent::AddIndexToTable { table, index }
        | ModelEvent::AddPrimaryKeyToTable { table, index } => {
            model.add_index_to_table(*table, index.clone())?;
        }
        ModelEvent::RemoveIndexFromTable { table, index }
        | ModelEvent::RemovePrimaryKeyFromTable { table, index } => {
            model.remove_index(*table, index.system_id())?;
        }
        ModelEvent::ChangeIndex { new, .. } => model.change_index(new.system_id(), new)?,
        ModelEvent::AddView { view } => {
            model.add_view(view.clone())?;
        }
        ModelEvent::RemoveView { view } => {
            model.remove_view(view.system_id())?;
        }
        ModelEvent::AddDomain { domain } => {
            model.add_domain(domain.clone())?;
        }
        ModelEvent::RemoveDomain { domain } => {
            model.remove_domain(domain.system_id())?;
        }
        ModelEvent::AddSubjectArea { area } => {
            model.add_subject_area(area.clone())?;
        }
        ModelEvent::RemoveSubjectArea { area } => {
            model.remove_subject_area(area.system_id())?;
        }
    }
    Ok(())
}

/// Journals every accepted change.
#[derive(Debug, Default, Clone)]
pub struct HistoryTracker {
    journal: Journal,
    read_only: bool,
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every change while set.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn into_journal(self) -> Journal {
        self.journal
    }
}

impl ModificationTracker for HistoryTracker {
    fn announce(&self, event: &ModelEvent, _model: &Model) -> Result<(), VetoError> {
        if self.read_only {
            return Err(VetoError::new(format!(
                "history is read-only, {} refused",
                event.kind()
            )));
        }
        Ok(())
    }

    fn record(&mut self, event: ModelEvent, _model: &Model) {
        self.journal.push(event);
    }

    fn journal(&self) -> Option<&Journal> {
        Some(&self.journal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::model::{Attribute, Table};

    #[test]
    fn test_records_accepted_changes_in_order() {
        let mut model = Model::with_tracker(Dialect::MySQL, Box::new(HistoryTracker::new()));
        let id = model
            .add_table(Table::new("customer").with_attribute(Attribute::new("id", "INT")))
            .unwrap();
        model.rename_table(id, "client").unwrap();

        let journal = model.tracker().journal().unwrap();
        let kinds: Vec<&str> = journal.events().map(|e| e.kind()).collect();
        assert_eq!(kinds, ["add_table", "rename_table"]);

        // recorded values are the stored ones
        match &journal.entries()[1].event {
            ModelEvent::RenameTable {
                old_name, new_name, ..
            } => {
                assert_eq!(old_name, "CUSTOMER");
                assert_eq!(new_name, "CLIENT");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_read_only_history_vetoes() {
        let mut tracker = HistoryTracker::new();
        tracker.set_read_only(true);
        let mut model = Model::with_tracker(Dialect::Generic, Box::new(tracker));

        let err = model.add_table(Table::new("t")).unwrap_err();
        assert!(err.is_veto());
        assert!(model.tables().is_empty());
        assert!(model.tracker().journal().unwrap().is_empty());
    }

    #[test]
    fn test_json_keeps_entries() {
        let mut model = Model::with_tracker(Dialect::PostgreSQL, Box::new(HistoryTracker::new()));
        model.add_table(Table::new("Orders")).unwrap();

        let journal = model.tracker().journal().unwrap();
        let json = journal.to_json().unwrap();
        assert!(json.contains("\"kind\": \"add_table\""));
        assert_eq!(&Journal::from_json(&json).unwrap(), journal);
    }
}
