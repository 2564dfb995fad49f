//! Modification trackers: observers that see every model change before it
//! happens, may veto it, and record accepted changes.

mod history;
mod statement;

pub use history::{HistoryTracker, Journal, JournalEntry};
pub use statement::StatementTracker;

use serde::{Deserialize, Serialize};

use crate::error::VetoError;
use crate::model::{
    Attribute, Domain, Index, Model, Relation, SubjectArea, SystemId, Table, View,
};

/// A change to the model, complete enough to be replayed or rendered as SQL.
///
/// Proposed changes are announced with the caller's raw values; recorded
/// changes carry the values that were actually stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelEvent {
    AddTable {
        table: Table,
    },
    RemoveTable {
        table: Table,
        /// Relations removed together with the table.
        relations: Vec<Relation>,
    },
    RenameTable {
        table: SystemId,
        old_name: String,
        new_name: String,
    },
    ChangeTableComment {
        table: SystemId,
        old_comment: Option<String>,
        new_comment: Option<String>,
    },
    AddRelation {
        relation: Relation,
    },
    RemoveRelation {
        relation: Relation,
    },
    ChangeRelation {
        old: Relation,
        new: Relation,
    },
    AddAttributeToTable {
        table: SystemId,
        attribute: Attribute,
    },
    RemoveAttributeFromTable {
        table: SystemId,
        attribute: Attribute,
    },
    RenameAttribute {
        table: SystemId,
        attribute: SystemId,
        old_name: String,
        new_name: String,
    },
    ChangeAttribute {
        table: SystemId,
        old: Attribute,
        new: Attribute,
    },
    AddIndexToTable {
        table: SystemId,
        index: Index,
    },
    AddPrimaryKeyToTable {
        table: SystemId,
        index: Index,
    },
    RemoveIndexFromTable {
        table: SystemId,
        index: Index,
    },
    RemovePrimaryKeyFromTable {
        table: SystemId,
        index: Index,
    },
    ChangeIndex {
        table: SystemId,
        old: Index,
        new: Index,
    },
    AddView {
        view: View,
    },
    RemoveView {
        view: View,
    },
    AddDomain {
        domain: Domain,
    },
    RemoveDomain {
        domain: Domain,
    },
    AddSubjectArea {
        area: SubjectArea,
    },
    RemoveSubjectArea {
        area: SubjectArea,
    },
}

impl ModelEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ModelEvent::AddTable { .. } => "add_table",
            ModelEvent::RemoveTable { .. } => "remove_table",
            ModelEvent::RenameTable { .. } => "rename_table",
            ModelEvent::ChangeTableComment { .. } => "change_table_comment",
            ModelEvent::AddRelation { .. } => "add_relation",
            ModelEvent::RemoveRelation { .. } => "remove_relation",
            ModelEvent::ChangeRelation { .. } => "change_relation",
            ModelEvent::AddAttributeToTable { .. } => "add_attribute_to_table",
            ModelEvent::RemoveAttributeFromTable { .. } => "remove_attribute_from_table",
            ModelEvent::RenameAttribute { .. } => "rename_attribute",
            ModelEvent::ChangeAttribute { .. } => "change_attribute",
            ModelEvent::AddIndexToTable { .. } => "add_index_to_table",
            ModelEvent::AddPrimaryKeyToTable { .. } => "add_primary_key_to_table",
            ModelEvent::RemoveIndexFromTable { .. } => "remove_index_from_table",
            ModelEvent::RemovePrimaryKeyFromTable { .. } => "remove_primary_key_from_table",
            ModelEvent::ChangeIndex { .. } => "change_index",
            ModelEvent::AddView { .. } => "add_view",
            ModelEvent::RemoveView { .. } => "remove_view",
            ModelEvent::AddDomain { .. } => "add_domain",
            ModelEvent::RemoveDomain { .. } => "remove_domain",
            ModelEvent::AddSubjectArea { .. } => "add_subject_area",
            ModelEvent::RemoveSubjectArea { .. } => "remove_subject_area",
        }
    }

    /// System ids of the items the change touches, primary item first.
    pub fn affected_ids(&self) -> Vec<SystemId> {
        use crate::model::ModelItem;
        match self {
            ModelEvent::AddTable { table } => vec![table.system_id()],
            ModelEvent::RemoveTable { table, relations } => std::iter::once(table.system_id())
                .chain(relations.iter().map(|r| r.system_id()))
                .collect(),
            ModelEvent::RenameTable { table, .. } | ModelEvent::ChangeTableComment { table, .. } => {
                vec![*table]
            }
            ModelEvent::AddRelation { relation } | ModelEvent::RemoveRelation { relation } => vec![
                relation.system_id(),
                relation.importing_table(),
                relation.exporting_table(),
            ],
            ModelEvent::ChangeRelation { old, .. } => vec![
                old.system_id(),
                old.importing_table(),
                old.exporting_table(),
            ],
            ModelEvent::AddAttributeToTable { table, attribute }
            | ModelEvent::RemoveAttributeFromTable { table, attribute } => {
                vec![attribute.system_id(), *table]
            }
            ModelEvent::RenameAttribute {
                table, attribute, ..
            } => vec![*attribute, *table],
            ModelEvent::ChangeAttribute { table, old, .. } => vec![old.system_id(), *table],
            ModelEvent::AddIndexToTable { table, index }
            | ModelEvent::AddPrimaryKeyToTable { table, index }
            | ModelEvent::RemoveIndexFromTable { table, index }
            | ModelEvent::RemovePrimaryKeyFromTable { table, index } => {
                vec![index.system_id(), *table]
            }
            ModelEvent::ChangeIndex { table, old, .. } => vec![old.system_id(), *table],
            ModelEvent::AddView { view } | ModelEvent::RemoveView { view } => vec![view.system_id()],
            ModelEvent::AddDomain { domain } | ModelEvent::RemoveDomain { domain } => {
                vec![domain.system_id()]
            }
            ModelEvent::AddSubjectArea { area } | ModelEvent::RemoveSubjectArea { area } => {
                vec![area.system_id()]
            }
        }
    }
}

/// Observer of model changes with the power to veto.
///
/// `announce` runs before the model is touched and must not record anything;
/// `record` runs after the change has been applied.
pub trait ModificationTracker: std::fmt::Debug + Send + Sync {
    fn announce(&self, event: &ModelEvent, model: &Model) -> Result<(), VetoError>;

    fn record(&mut self, event: ModelEvent, model: &Model);

    /// The journal of a history tracker.
    fn journal(&self) -> Option<&Journal> {
        None
    }

    /// The script of a statement tracker.
    fn statements(&self) -> Option<&[String]> {
        None
    }
}

/// Accepts everything, records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyTracker;

impl ModificationTracker for EmptyTracker {
    fn announce(&self, _event: &ModelEvent, _model: &Model) -> Result<(), VetoError> {
        Ok(())
    }

    fn record(&mut self, _event: ModelEvent, _model: &Model) {}
}

/// Vetoes every change, e.g. for a workspace opened read-only.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOnlyTracker;

impl ModificationTracker for ReadOnlyTracker {
    fn announce(&self, event: &ModelEvent, _model: &Model) -> Result<(), VetoError> {
        Err(VetoError::new(format!(
            "model is read-only, {} refused",
            event.kind()
        )))
    }

    fn record(&mut self, _event: ModelEvent, _model: &Model) {}
}
