use serde::{Deserialize, Serialize};

use super::item::{ModelItem, OwnedItemList, SystemId};

/// Diagram-level grouping of tables and views. Holds references only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectArea {
    id: SystemId,
    pub name: String,
    pub tables: Vec<SystemId>,
    pub views: Vec<SystemId>,
}

impl SubjectArea {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SystemId::new(),
            name: name.into(),
            tables: Vec::new(),
            views: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: SystemId) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_view(mut self, view: SystemId) -> Self {
        self.views.push(view);
        self
    }

    pub fn contains_table(&self, table: SystemId) -> bool {
        self.tables.contains(&table)
    }
}

impl ModelItem for SubjectArea {
    const KIND: &'static str = "SubjectArea";

    fn system_id(&self) -> SystemId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

pub type SubjectAreaList = OwnedItemList<SubjectArea>;

impl OwnedItemList<SubjectArea> {
    /// Drop the table from every area.
    pub fn remove_table(&mut self, table: SystemId) {
        for area in self.iter_mut() {
            area.tables.retain(|t| *t != table);
        }
    }

    pub fn remove_view(&mut self, view: SystemId) {
        for area in self.iter_mut() {
            area.views.retain(|v| *v != view);
        }
    }
}
