//! The in-memory schema model and its mutation protocol.
//!
//! [`Model`] is the only way to change a schema. Every mutation announces the
//! proposed change to the modification tracker (which may veto), validates it
//! against the dialect's name rules and the model's referential invariants,
//! applies it and finally hands the stored change to the tracker.

mod attribute;
mod domain;
mod index;
mod item;
mod properties;
mod relation;
mod snapshot;
mod subject_area;
mod table;
mod verify;
mod view;

pub use attribute::{Attribute, DataTypeRef};
pub use domain::Domain;
pub use index::{ExpressionKind, Index, IndexExpression, IndexKind};
pub use item::{ModelItem, OwnedItemList, SystemId};
pub use properties::{
    ModelProperties, PROPERTY_DRIVER, PROPERTY_PASSWORD, PROPERTY_URL, PROPERTY_USER,
    RecentlyUsedConnection,
};
pub use relation::{ForeignKeyAction, Relation, RelationList, RelationMapping};
pub use snapshot::{
    AttributeSnapshot, DomainSnapshot, IndexSnapshot, ModelSnapshot, RelationSnapshot,
    SubjectAreaSnapshot, TableSnapshot, ViewSnapshot,
};
pub use subject_area::{SubjectArea, SubjectAreaList};
pub use table::Table;
pub use verify::{
    ItemKind, OwnedModelItemVerifier, check_existence, check_name_and_existence,
    check_unique_names,
};
pub use view::{View, derive_attributes};

use crate::catalog::{CatalogSession, DriverRegistry};
use crate::dialect::{Dialect, TypeFamily};
use crate::error::{CatalogError, ModelError, Result};
use crate::tracker::{EmptyTracker, ModelEvent, ModificationTracker};

/// Reference to any item of a model, for the generic [`Model::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    Table(SystemId),
    Relation(SystemId),
    Attribute(SystemId),
    Index(SystemId),
    View(SystemId),
    Domain(SystemId),
    SubjectArea(SystemId),
}

/// Aggregate root of a schema.
#[derive(Debug)]
pub struct Model {
    dialect: Dialect,
    tables: OwnedItemList<Table>,
    relations: RelationList,
    views: OwnedItemList<View>,
    domains: OwnedItemList<Domain>,
    subject_areas: SubjectAreaList,
    properties: ModelProperties,
    tracker: Box<dyn ModificationTracker>,
}

impl Model {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_tracker(dialect, Box::new(EmptyTracker))
    }

    pub fn with_tracker(dialect: Dialect, tracker: Box<dyn ModificationTracker>) -> Self {
        Self {
            dialect,
            tables: OwnedItemList::new(),
            relations: RelationList::new(),
            views: OwnedItemList::new(),
            domains: OwnedItemList::new(),
            subject_areas: SubjectAreaList::new(),
            properties: ModelProperties::default(),
            tracker,
        }
    }

    /// Replace the tracker, returning the previous one.
    pub fn set_tracker(
        &mut self,
        tracker: Box<dyn ModificationTracker>,
    ) -> Box<dyn ModificationTracker> {
        std::mem::replace(&mut self.tracker, tracker)
    }

    pub fn tracker(&self) -> &dyn ModificationTracker {
        self.tracker.as_ref()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn tables(&self) -> &OwnedItemList<Table> {
        &self.tables
    }

    pub fn relations(&self) -> &RelationList {
        &self.relations
    }

    pub fn views(&self) -> &OwnedItemList<View> {
        &self.views
    }

    pub fn domains(&self) -> &OwnedItemList<Domain> {
        &self.domains
    }

    pub fn subject_areas(&self) -> &SubjectAreaList {
        &self.subject_areas
    }

    pub fn properties(&self) -> &ModelProperties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut ModelProperties {
        &mut self.properties
    }

    pub fn table(&self, id: SystemId) -> Option<&Table> {
        self.tables.find_by_id(id)
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.find_by_name(name, self.dialect)
    }

    pub fn relation_by_name(&self, name: &str) -> Option<&Relation> {
        self.relations.find_by_name(name, self.dialect)
    }

    pub fn view_by_name(&self, name: &str) -> Option<&View> {
        self.views.find_by_name(name, self.dialect)
    }

    /// Validate a model-level name and check it is free for the kind.
    /// Returns the normalized name.
    pub fn check_name(
        &self,
        kind: ItemKind,
        name: &str,
        exclude: Option<SystemId>,
    ) -> Result<String> {
        let normalized = self.dialect.check_name(name)?;
        self.check_name_already_exists(kind, &normalized, exclude)?;
        Ok(normalized)
    }

    pub fn check_if_used_as_foreign_key(&self, attribute: SystemId) -> bool {
        self.relations.is_foreign_key_attribute(attribute)
    }

    /// Open a catalog session from the connection properties.
    pub fn create_connection(
        &self,
        drivers: &DriverRegistry,
    ) -> std::result::Result<Box<dyn CatalogSession>, CatalogError> {
        self.dialect.create_connection(
            drivers,
            self.properties.get_or_empty(PROPERTY_DRIVER),
            self.properties.get_or_empty(PROPERTY_URL),
            self.properties.get_or_empty(PROPERTY_USER),
            self.properties.get_or_empty(PROPERTY_PASSWORD),
        )
    }

    pub fn create_connection_history_entry(&self) -> RecentlyUsedConnection {
        RecentlyUsedConnection {
            dialect: self.dialect.unique_name().to_string(),
            url: self.properties.get_or_empty(PROPERTY_URL).to_string(),
            user: self.properties.get_or_empty(PROPERTY_USER).to_string(),
        }
    }

    /// System-id agnostic view of the model, for structural comparison.
    pub fn snapshot(&self) -> ModelSnapshot {
        ModelSnapshot::of(self)
    }

    // ---- protocol plumbing ----

    fn announce(&self, event: &ModelEvent) -> Result<()> {
        self.tracker.announce(event, self).map_err(|veto| {
            tracing::info!(kind = event.kind(), reason = %veto.0, "change vetoed");
            ModelError::Veto(veto)
        })
    }

    fn record(&mut self, event: ModelEvent) {
        tracing::debug!(kind = event.kind(), ids = ?event.affected_ids(), "change applied");
        let mut tracker = std::mem::replace(&mut self.tracker, Box::new(EmptyTracker));
        tracker.record(event, self);
        self.tracker = tracker;
    }

    fn find_table(&self, id: SystemId) -> Result<&Table> {
        self.tables
            .find_by_id(id)
            .ok_or_else(|| ModelError::not_found(Table::KIND, id))
    }

    fn table_mut(&mut self, id: SystemId) -> Result<&mut Table> {
        self.tables
            .find_by_id_mut(id)
            .ok_or_else(|| ModelError::not_found(Table::KIND, id))
    }

    fn table_of_attribute(&self, attribute: SystemId) -> Result<&Table> {
        self.tables
            .iter()
            .find(|t| t.attributes().contains(attribute))
            .ok_or_else(|| ModelError::not_found(Attribute::KIND, attribute))
    }

    fn table_of_index(&self, index: SystemId) -> Result<&Table> {
        self.tables
            .iter()
            .find(|t| t.indexes().contains(index))
            .ok_or_else(|| ModelError::not_found(Index::KIND, index))
    }

    /// Map the datatype to the dialect's catalog spelling.
    fn resolve_datatype(&self, attribute: &mut Attribute) -> Result<()> {
        match &attribute.datatype {
            DataTypeRef::Type(name) => {
                let found = self
                    .dialect
                    .find_data_type(name)
                    .ok_or_else(|| ModelError::UnknownDataType(name.clone()))?;
                attribute.datatype = DataTypeRef::Type(found.name.to_string());
            }
            DataTypeRef::Domain(id) => {
                if !self.domains.contains(*id) {
                    return Err(ModelError::InvalidReference(format!(
                        "attribute {} uses domain {id} which is not part of the model",
                        attribute.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn type_family(&self, attribute: &Attribute) -> Option<TypeFamily> {
        let name = match &attribute.datatype {
            DataTypeRef::Type(name) => name.as_str(),
            DataTypeRef::Domain(id) => self.domains.find_by_id(*id)?.datatype.as_str(),
        };
        self.dialect.find_data_type(name).map(|t| t.family)
    }

    /// The attributes paired with `attribute` by relation mappings, on
    /// either side, with the relation pairing them.
    fn mapped_counterparts(&self, attribute: SystemId) -> Vec<(&Relation, &Attribute)> {
        let mut counterparts = Vec::new();
        for relation in self.relations.iter() {
            let (Some(importing), Some(exporting)) = (
                self.tables.find_by_id(relation.importing_table()),
                self.tables.find_by_id(relation.exporting_table()),
            ) else {
                continue;
            };
            for m in &relation.mapping {
                let key = exporting
                    .index_of_expression(m.expression)
                    .and_then(|i| i.find_expression(m.expression))
                    .and_then(|e| e.attribute_ref());
                let other = if m.attribute == attribute {
                    key.and_then(|k| exporting.attributes().find_by_id(k))
                } else if key == Some(attribute) {
                    importing.attributes().find_by_id(m.attribute)
                } else {
                    None
                };
                if let Some(other) = other.filter(|o| o.system_id() != attribute) {
                    counterparts.push((relation, other));
                }
            }
        }
        counterparts
    }

    /// A mapped attribute must stay in the type family of its counterparts.
    fn check_mapping_types(&self, attribute: &Attribute) -> Result<()> {
        let Some(family) = self.type_family(attribute) else {
            return Ok(());
        };
        let mismatch = self
            .mapped_counterparts(attribute.system_id())
            .into_iter()
            .find(|(_, other)| self.type_family(other).is_some_and(|f| f != family));
        match mismatch {
            Some((relation, other)) => Err(ModelError::cannot_delete(
                Attribute::KIND,
                attribute.name.clone(),
                format!(
                    "its type no longer matches {} mapped by relation {}",
                    other.name, relation.name
                ),
            )),
            None => Ok(()),
        }
    }

    fn prepare_attribute(
        &self,
        table: &Table,
        mut attribute: Attribute,
        exclude: Option<SystemId>,
    ) -> Result<Attribute> {
        attribute.name =
            check_name_and_existence(table.attributes(), &attribute.name, self.dialect, exclude)?;
        self.resolve_datatype(&mut attribute)?;
        attribute.set_owner(table.system_id());
        Ok(attribute)
    }

    /// Index expressions must reference attributes of the table.
    fn check_index_expressions(table: &Table, index: &Index) -> Result<()> {
        if index.expressions.is_empty() {
            return Err(ModelError::InvalidReference(format!(
                "index {} has no expressions",
                index.name
            )));
        }
        for attribute in index.expressions.iter().filter_map(|e| e.attribute_ref()) {
            if !table.attributes().contains(attribute) {
                return Err(ModelError::InvalidReference(format!(
                    "index {} references attribute {attribute} outside table {}",
                    index.name, table.name
                )));
            }
        }
        Ok(())
    }

    fn prepare_index(
        &self,
        table: &Table,
        mut index: Index,
        exclude: Option<SystemId>,
    ) -> Result<Index> {
        index.name = check_name_and_existence(table.indexes(), &index.name, self.dialect, exclude)?;
        if index.is_primary_key() {
            if let Some(pk) = table
                .primary_key()
                .filter(|pk| Some(pk.system_id()) != exclude)
            {
                return Err(ModelError::already_exists("Primary key", pk.name.clone()));
            }
        }
        Self::check_index_expressions(table, &index)?;
        index.set_owner(table.system_id());
        Ok(index)
    }

    fn prepare_table(&self, mut table: Table) -> Result<Table> {
        table.name = self.check_name(ItemKind::Table, &table.name, None)?;

        let names = check_unique_names(table.attributes().iter(), self.dialect)?;
        let mut attributes: Vec<Attribute> = table.attributes().iter().cloned().collect();
        for (attribute, name) in attributes.iter_mut().zip(names) {
            attribute.name = name;
            self.resolve_datatype(attribute)?;
        }
        for attribute in attributes {
            table.attributes_mut().add(attribute);
        }

        let names = check_unique_names(table.indexes().iter(), self.dialect)?;
        for (index, name) in table.indexes_mut().iter_mut().zip(names) {
            index.name = name;
        }
        if let Some(second) = table.indexes().iter().filter(|i| i.is_primary_key()).nth(1) {
            return Err(ModelError::already_exists("Primary key", second.name.clone()));
        }
        for index in table.indexes() {
            Self::check_index_expressions(&table, index)?;
        }

        table.adopt_children();
        Ok(table)
    }

    /// Relation invariants: both endpoints in the model, values in the
    /// importing table, keys covering one primary or unique index of the
    /// exporting table.
    fn check_relation(&self, relation: &Relation) -> Result<()> {
        let dangling = |what: &str, id: SystemId| {
            ModelError::InvalidReference(format!(
                "relation {} references {what} {id} which is not part of the model",
                relation.name
            ))
        };
        let importing = self
            .tables
            .find_by_id(relation.importing_table())
            .ok_or_else(|| dangling("importing table", relation.importing_table()))?;
        let exporting = self
            .tables
            .find_by_id(relation.exporting_table())
            .ok_or_else(|| dangling("exporting table", relation.exporting_table()))?;

        let Some(first) = relation.mapping.first() else {
            return Err(ModelError::InvalidReference(format!(
                "relation {} has an empty mapping",
                relation.name
            )));
        };
        for m in &relation.mapping {
            if !importing.attributes().contains(m.attribute) {
                return Err(dangling("attribute", m.attribute));
            }
        }

        let index = exporting
            .index_of_expression(first.expression)
            .ok_or_else(|| dangling("index expression", first.expression))?;
        if !index.kind.is_unique() {
            return Err(ModelError::InvalidReference(format!(
                "relation {} must reference a primary or unique index, {} is neither",
                relation.name, index.name
            )));
        }
        let mut seen = Vec::with_capacity(relation.mapping.len());
        for m in &relation.mapping {
            if index.find_expression(m.expression).is_none() || seen.contains(&m.expression) {
                return Err(ModelError::InvalidReference(format!(
                    "relation {} does not map the expressions of index {}",
                    relation.name, index.name
                )));
            }
            seen.push(m.expression);
        }
        if seen.len() != index.expressions.len() {
            return Err(ModelError::InvalidReference(format!(
                "relation {} maps {} of {} expressions of index {}",
                relation.name,
                seen.len(),
                index.expressions.len(),
                index.name
            )));
        }
        Ok(())
    }

    // ---- tables ----

    pub fn add_table(&mut self, table: Table) -> Result<SystemId> {
        if self.tables.contains(table.system_id()) {
            return Err(ModelError::already_exists(Table::KIND, table.name.clone()));
        }
        self.announce(&ModelEvent::AddTable {
            table: table.clone(),
        })?;
        let table = self.prepare_table(table)?;

        let id = table.system_id();
        self.tables.add(table.clone());
        self.record(ModelEvent::AddTable { table });
        Ok(id)
    }

    /// Remove a table together with every relation touching it and its
    /// subject-area memberships.
    pub fn remove_table(&mut self, id: SystemId) -> Result<Table> {
        let table = self.find_table(id)?.clone();
        let relations: Vec<Relation> = self.relations.relations_of_table(id).cloned().collect();
        self.announce(&ModelEvent::RemoveTable {
            table: table.clone(),
            relations: relations.clone(),
        })?;

        self.relations.remove_by_table(id);
        self.subject_areas.remove_table(id);
        self.tables.remove_by_id(id);
        self.record(ModelEvent::RemoveTable {
            table: table.clone(),
            relations,
        });
        Ok(table)
    }

    pub fn rename_table(&mut self, id: SystemId, name: &str) -> Result<()> {
        let old_name = self.find_table(id)?.name.clone();
        self.announce(&ModelEvent::RenameTable {
            table: id,
            old_name: old_name.clone(),
            new_name: name.to_string(),
        })?;
        let new_name = self.check_name(ItemKind::Table, name, Some(id))?;

        self.table_mut(id)?.name = new_name.clone();
        self.record(ModelEvent::RenameTable {
            table: id,
            old_name,
            new_name,
        });
        Ok(())
    }

    pub fn change_table_comment(&mut self, id: SystemId, comment: Option<String>) -> Result<()> {
        let old_comment = self.find_table(id)?.comment.clone();
        let event = ModelEvent::ChangeTableComment {
            table: id,
            old_comment,
            new_comment: comment.clone(),
        };
        self.announce(&event)?;

        self.table_mut(id)?.comment = comment;
        self.record(event);
        Ok(())
    }

    // ---- relations ----

    pub fn add_relation(&mut self, mut relation: Relation) -> Result<SystemId> {
        if self.relations.contains(relation.system_id()) {
            return Err(ModelError::already_exists(Relation::KIND, relation.name.clone()));
        }
        self.announce(&ModelEvent::AddRelation {
            relation: relation.clone(),
        })?;
        relation.name = self.check_name(ItemKind::Relation, &relation.name, None)?;
        self.check_relation(&relation)?;

        let id = relation.system_id();
        self.relations.add(relation.clone());
        self.record(ModelEvent::AddRelation { relation });
        Ok(id)
    }

    pub fn remove_relation(&mut self, id: SystemId) -> Result<Relation> {
        let relation = self
            .relations
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| ModelError::not_found(Relation::KIND, id))?;
        self.announce(&ModelEvent::RemoveRelation {
            relation: relation.clone(),
        })?;

        self.relations.remove_by_id(id);
        self.record(ModelEvent::RemoveRelation {
            relation: relation.clone(),
        });
        Ok(relation)
    }

    /// Restore the mutable fields of a relation from a template.
    pub fn change_relation(&mut self, id: SystemId, template: &Relation) -> Result<()> {
        let old = self
            .relations
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| ModelError::not_found(Relation::KIND, id))?;
        let mut new = old.clone();
        new.restore_from(template);
        self.announce(&ModelEvent::ChangeRelation {
            old: old.clone(),
            new: new.clone(),
        })?;
        new.name = self.check_name(ItemKind::Relation, &new.name, Some(id))?;
        self.check_relation(&new)?;

        self.relations.add(new.clone());
        self.record(ModelEvent::ChangeRelation { old, new });
        Ok(())
    }

    // ---- attributes ----

    pub fn add_attribute_to_table(
        &mut self,
        table: SystemId,
        attribute: Attribute,
    ) -> Result<SystemId> {
        let owner = self.find_table(table)?;
        if self.table_of_attribute(attribute.system_id()).is_ok() {
            return Err(ModelError::already_exists(Attribute::KIND, attribute.name.clone()));
        }
        self.announce(&ModelEvent::AddAttributeToTable {
            table,
            attribute: attribute.clone(),
        })?;
        let attribute = self.prepare_attribute(owner, attribute, None)?;

        let id = attribute.system_id();
        self.table_mut(table)?.attributes_mut().add(attribute.clone());
        self.record(ModelEvent::AddAttributeToTable { table, attribute });
        Ok(id)
    }

    /// Remove an attribute. Index expressions referencing it go with it, and
    /// so does any index left without expressions.
    pub fn remove_attribute_from_table(
        &mut self,
        table: SystemId,
        attribute: SystemId,
    ) -> Result<Attribute> {
        let owner = self.find_table(table)?;
        let removed = owner
            .attributes()
            .find_by_id(attribute)
            .cloned()
            .ok_or_else(|| ModelError::not_found(Attribute::KIND, attribute))?;
        self.announce(&ModelEvent::RemoveAttributeFromTable {
            table,
            attribute: removed.clone(),
        })?;

        if let Some(relation) = self.relations.iter().find(|r| r.uses_attribute(attribute)) {
            return Err(ModelError::cannot_delete(
                Attribute::KIND,
                removed.name.clone(),
                format!("it is mapped by relation {}", relation.name),
            ));
        }
        if let Some(index) = owner
            .indexes()
            .iter()
            .find(|i| i.references_attribute(attribute) && self.relations.is_index_in_use(i))
        {
            return Err(ModelError::cannot_delete(
                Attribute::KIND,
                removed.name.clone(),
                format!("index {} is referenced by a relation", index.name),
            ));
        }

        let owner = self.table_mut(table)?;
        owner.attributes_mut().remove_by_id(attribute);
        for index in owner.indexes_mut().iter_mut() {
            index.expressions.retain(|e| e.attribute_ref() != Some(attribute));
        }
        owner.indexes_mut().drain_where(|i| i.expressions.is_empty());

        self.record(ModelEvent::RemoveAttributeFromTable {
            table,
            attribute: removed.clone(),
        });
        Ok(removed)
    }

    pub fn rename_attribute(&mut self, attribute: SystemId, name: &str) -> Result<()> {
        let owner = self.table_of_attribute(attribute)?;
        let table = owner.system_id();
        let old_name = owner.attribute_name(attribute).unwrap_or_default().to_string();
        self.announce(&ModelEvent::RenameAttribute {
            table,
            attribute,
            old_name: old_name.clone(),
            new_name: name.to_string(),
        })?;
        let new_name =
            check_name_and_existence(owner.attributes(), name, self.dialect, Some(attribute))?;

        if let Some(a) = self.table_mut(table)?.attributes_mut().find_by_id_mut(attribute) {
            a.name = new_name.clone();
        }
        self.record(ModelEvent::RenameAttribute {
            table,
            attribute,
            old_name,
            new_name,
        });
        Ok(())
    }

    /// Restore every mutable field of an attribute from a template.
    pub fn change_attribute(&mut self, attribute: SystemId, template: &Attribute) -> Result<()> {
        let owner = self.table_of_attribute(attribute)?;
        let table = owner.system_id();
        let old = owner
            .attributes()
            .find_by_id(attribute)
            .cloned()
            .ok_or_else(|| ModelError::not_found(Attribute::KIND, attribute))?;
        let mut new = old.clone();
        new.restore_from(template);
        self.announce(&ModelEvent::ChangeAttribute {
            table,
            old: old.clone(),
            new: new.clone(),
        })?;
        let new = self.prepare_attribute(owner, new, Some(attribute))?;
        self.check_mapping_types(&new)?;

        self.table_mut(table)?.attributes_mut().add(new.clone());
        self.record(ModelEvent::ChangeAttribute { table, old, new });
        Ok(())
    }

    // ---- indexes ----

    /// Add an index. A primary key is announced and recorded as such; a
    /// second primary key is rejected.
    pub fn add_index_to_table(&mut self, table: SystemId, index: Index) -> Result<SystemId> {
        let owner = self.find_table(table)?;
        if self.table_of_index(index.system_id()).is_ok() {
            return Err(ModelError::already_exists(Index::KIND, index.name.clone()));
        }
        let event = |index: Index| {
            if index.is_primary_key() {
                ModelEvent::AddPrimaryKeyToTable { table, index }
            } else {
                ModelEvent::AddIndexToTable { table, index }
            }
        };
        self.announce(&event(index.clone()))?;
        let index = self.prepare_index(owner, index, None)?;

        let id = index.system_id();
        self.table_mut(table)?.indexes_mut().add(index.clone());
        self.record(event(index));
        Ok(id)
    }

    pub fn remove_index(&mut self, table: SystemId, index: SystemId) -> Result<Index> {
        let removed = self
            .find_table(table)?
            .indexes()
            .find_by_id(index)
            .cloned()
            .ok_or_else(|| ModelError::not_found(Index::KIND, index))?;
        let event = if removed.is_primary_key() {
            ModelEvent::RemovePrimaryKeyFromTable {
                table,
                index: removed.clone(),
            }
        } else {
            ModelEvent::RemoveIndexFromTable {
                table,
                index: removed.clone(),
            }
        };
        self.announce(&event)?;

        if let Some(relation) = self.relations.iter().find(|r| r.uses_index(&removed)) {
            return Err(ModelError::cannot_delete(
                Index::KIND,
                removed.name.clone(),
                format!("it is referenced by relation {}", relation.name),
            ));
        }

        self.table_mut(table)?.indexes_mut().remove_by_id(index);
        self.record(event);
        Ok(removed)
    }

    /// Restore an index from a template. An index referenced by a relation
    /// must stay unique and keep exactly its mapped expressions.
    pub fn change_index(&mut self, index: SystemId, template: &Index) -> Result<()> {
        let owner = self.table_of_index(index)?;
        let table = owner.system_id();
        let old = owner
            .indexes()
            .find_by_id(index)
            .cloned()
            .ok_or_else(|| ModelError::not_found(Index::KIND, index))?;
        let mut new = old.clone();
        new.restore_from(template);
        self.announce(&ModelEvent::ChangeIndex {
            table,
            old: old.clone(),
            new: new.clone(),
        })?;
        let new = self.prepare_index(owner, new, Some(index))?;

        if let Some(relation) = self.relations.iter().find(|r| r.uses_index(&old)) {
            let keeps_mapping = new.kind.is_unique()
                && new.expressions.len() == old.expressions.len()
                && relation
                    .mapping
                    .iter()
                    .all(|m| new.find_expression(m.expression).is_some());
            if !keeps_mapping {
                return Err(ModelError::cannot_delete(
                    Index::KIND,
                    old.name.clone(),
                    format!("relation {} depends on its unique expressions", relation.name),
                ));
            }
        }

        self.table_mut(table)?.indexes_mut().add(new.clone());
        self.record(ModelEvent::ChangeIndex { table, old, new });
        Ok(())
    }

    // ---- views ----

    pub fn add_view(&mut self, mut view: View) -> Result<SystemId> {
        if self.views.contains(view.system_id()) {
            return Err(ModelError::already_exists(View::KIND, view.name.clone()));
        }
        self.announce(&ModelEvent::AddView { view: view.clone() })?;
        view.name = self.check_name(ItemKind::View, &view.name, None)?;

        let id = view.system_id();
        self.views.add(view.clone());
        self.record(ModelEvent::AddView { view });
        Ok(id)
    }

    pub fn remove_view(&mut self, id: SystemId) -> Result<View> {
        let view = self
            .views
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| ModelError::not_found(View::KIND, id))?;
        self.announce(&ModelEvent::RemoveView { view: view.clone() })?;

        self.subject_areas.remove_view(id);
        self.views.remove_by_id(id);
        self.record(ModelEvent::RemoveView { view: view.clone() });
        Ok(view)
    }

    // ---- domains ----

    pub fn add_domain(&mut self, mut domain: Domain) -> Result<SystemId> {
        if self.domains.contains(domain.system_id()) {
            return Err(ModelError::already_exists(Domain::KIND, domain.name.clone()));
        }
        self.announce(&ModelEvent::AddDomain {
            domain: domain.clone(),
        })?;
        domain.name = self.check_name(ItemKind::Domain, &domain.name, None)?;
        let datatype = self
            .dialect
            .find_data_type(&domain.datatype)
            .ok_or_else(|| ModelError::UnknownDataType(domain.datatype.clone()))?;
        domain.datatype = datatype.name.to_string();

        let id = domain.system_id();
        self.domains.add(domain.clone());
        self.record(ModelEvent::AddDomain { domain });
        Ok(id)
    }

    /// Remove a domain no attribute uses.
    pub fn remove_domain(&mut self, id: SystemId) -> Result<Domain> {
        let domain = self
            .domains
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| ModelError::not_found(Domain::KIND, id))?;
        self.announce(&ModelEvent::RemoveDomain {
            domain: domain.clone(),
        })?;

        let user = self.tables.iter().find_map(|t| {
            t.attributes()
                .iter()
                .find(|a| a.datatype == DataTypeRef::Domain(id))
                .map(|a| format!("{}.{}", t.name, a.name))
        });
        if let Some(user) = user {
            return Err(ModelError::cannot_delete(
                Domain::KIND,
                domain.name.clone(),
                format!("it is used by attribute {user}"),
            ));
        }

        self.domains.remove_by_id(id);
        self.record(ModelEvent::RemoveDomain {
            domain: domain.clone(),
        });
        Ok(domain)
    }

    // ---- subject areas ----

    pub fn add_subject_area(&mut self, mut area: SubjectArea) -> Result<SystemId> {
        if self.subject_areas.contains(area.system_id()) {
            return Err(ModelError::already_exists(SubjectArea::KIND, area.name.clone()));
        }
        self.announce(&ModelEvent::AddSubjectArea { area: area.clone() })?;
        area.name = self.check_name(ItemKind::SubjectArea, &area.name, None)?;
        if let Some(missing) = area.tables.iter().find(|t| !self.tables.contains(**t)) {
            return Err(ModelError::InvalidReference(format!(
                "subject area {} lists table {missing} which is not part of the model",
                area.name
            )));
        }
        if let Some(missing) = area.views.iter().find(|v| !self.views.contains(**v)) {
            return Err(ModelError::InvalidReference(format!(
                "subject area {} lists view {missing} which is not part of the model",
                area.name
            )));
        }

        let id = area.system_id();
        self.subject_areas.add(area.clone());
        self.record(ModelEvent::AddSubjectArea { area });
        Ok(id)
    }

    pub fn remove_subject_area(&mut self, id: SystemId) -> Result<SubjectArea> {
        let area = self
            .subject_areas
            .find_by_id(id)
            .cloned()
            .ok_or_else(|| ModelError::not_found(SubjectArea::KIND, id))?;
        self.announce(&ModelEvent::RemoveSubjectArea { area: area.clone() })?;

        self.subject_areas.remove_by_id(id);
        self.record(ModelEvent::RemoveSubjectArea { area: area.clone() });
        Ok(area)
    }

    // ---- generic ----

    /// Delete a table or a relation. A table still connected by a relation
    /// must be removed explicitly with [`Model::remove_table`].
    pub fn delete(&mut self, item: ItemRef) -> Result<()> {
        match item {
            ItemRef::Table(id) => {
                let table = self.find_table(id)?;
                if let Some(relation) = self.relations.relations_of_table(id).next() {
                    return Err(ModelError::cannot_delete(
                        Table::KIND,
                        table.name.clone(),
                        format!("it is used by relation {}", relation.name),
                    ));
                }
                self.remove_table(id).map(drop)
            }
            ItemRef::Relation(id) => self.remove_relation(id).map(drop),
            other => Err(ModelError::Unsupported(format!("delete of {other:?}"))),
        }
    }
}

impl OwnedModelItemVerifier for Model {
    fn check_name_already_exists(
        &self,
        kind: ItemKind,
        name: &str,
        exclude: Option<SystemId>,
    ) -> Result<()> {
        match kind {
            ItemKind::Table => check_existence(&self.tables, name, self.dialect, exclude),
            ItemKind::Relation => check_existence(&self.relations, name, self.dialect, exclude),
            ItemKind::View => check_existence(&self.views, name, self.dialect, exclude),
            ItemKind::Domain => check_existence(&self.domains, name, self.dialect, exclude),
            ItemKind::SubjectArea => {
                check_existence(&self.subject_areas, name, self.dialect, exclude)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VetoError;

    /// customer(id PK, name) and orders(id PK, cust_id) with FK_ORDERS_CUSTOMER.
    fn shop(dialect: Dialect) -> (Model, SystemId, SystemId, SystemId) {
        let mut model = Model::new(dialect);

        let customer_id = Attribute::new("id", "INTEGER").not_null();
        let customer_pk = Index::primary_key("pk_customer").with_attribute(customer_id.system_id());
        let key = customer_pk.expressions[0].system_id();
        let customer = model
            .add_table(
                Table::new("customer")
                    .with_attribute(customer_id)
                    .with_attribute(Attribute::new("name", "VARCHAR").size(40))
                    .with_index(customer_pk),
            )
            .unwrap();

        let orders_id = Attribute::new("id", "INTEGER").not_null();
        let cust_id = Attribute::new("cust_id", "INTEGER");
        let cust_ref = cust_id.system_id();
        let orders = model
            .add_table(
                Table::new("orders")
                    .with_attribute(orders_id.clone())
                    .with_attribute(cust_id)
                    .with_index(Index::primary_key("pk_orders").with_attribute(orders_id.system_id())),
            )
            .unwrap();

        model
            .add_relation(Relation::new("fk_orders_customer", orders, customer).map(key, cust_ref))
            .unwrap();
        (model, customer, orders, cust_ref)
    }

    #[derive(Debug)]
    struct VetoRemovals;

    impl ModificationTracker for VetoRemovals {
        fn announce(&self, event: &ModelEvent, _model: &Model) -> Result<(), VetoError> {
            if event.kind().starts_with("remove") {
                return Err(VetoError::new("no removals"));
            }
            Ok(())
        }

        fn record(&mut self, _event: ModelEvent, _model: &Model) {}
    }

    #[test]
    fn test_add_table_normalizes_children() {
        let (model, customer, _, _) = shop(Dialect::PostgreSQL);
        let table = model.table(customer).unwrap();
        assert_eq!(table.name, "customer");
        let attribute = table.attributes().find_by_name("NAME", Dialect::PostgreSQL).unwrap();
        assert_eq!(attribute.name, "name");
        assert_eq!(attribute.owner(), Some(customer));
        assert_eq!(table.primary_key().unwrap().owner(), Some(customer));
    }

    #[test]
    fn test_add_table_rejects_unknown_type() {
        let mut model = Model::new(Dialect::MySQL);
        let err = model
            .add_table(Table::new("t").with_attribute(Attribute::new("a", "GEOMETRY")))
            .unwrap_err();
        assert_eq!(err, ModelError::UnknownDataType("GEOMETRY".into()));
        assert!(model.tables().is_empty());
    }

    #[test]
    fn test_add_table_rejects_dangling_index() {
        let mut model = Model::new(Dialect::Generic);
        let err = model
            .add_table(Table::new("t").with_index(Index::primary_key("pk").with_attribute(SystemId::new())))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidReference(_)));
    }

    #[test]
    fn test_second_primary_key_is_rejected() {
        let (mut model, customer, _, _) = shop(Dialect::MySQL);
        let name = model.table(customer).unwrap().attributes().iter().nth(1).unwrap().system_id();
        let err = model
            .add_index_to_table(customer, Index::primary_key("pk_again").with_attribute(name))
            .unwrap_err();
        assert!(matches!(err, ModelError::AlreadyExists { .. }));
        assert_eq!(model.table(customer).unwrap().indexes().len(), 1);
    }

    #[test]
    fn test_rename_table_checks_uniqueness() {
        let (mut model, customer, orders, _) = shop(Dialect::MySQL);
        let err = model.rename_table(orders, "Customer").unwrap_err();
        assert_eq!(err, ModelError::already_exists("Table", "CUSTOMER"));

        model.rename_table(customer, "client").unwrap();
        assert_eq!(model.table(customer).unwrap().name, "CLIENT");
    }

    #[test]
    fn test_remove_attribute_cascades_into_indexes() {
        let mut model = Model::new(Dialect::Generic);
        let a = Attribute::new("a", "INTEGER");
        let b = Attribute::new("b", "INTEGER");
        let index = Index::new("ix_ab", IndexKind::NonUnique)
            .with_attribute(a.system_id())
            .with_attribute(b.system_id());
        let only_b = Index::new("ix_b", IndexKind::NonUnique).with_attribute(b.system_id());
        let (a_id, b_id) = (a.system_id(), b.system_id());
        let table = model
            .add_table(
                Table::new("t")
                    .with_attribute(a)
                    .with_attribute(b)
                    .with_index(index)
                    .with_index(only_b),
            )
            .unwrap();

        model.remove_attribute_from_table(table, b_id).unwrap();
        let t = model.table(table).unwrap();
        assert_eq!(t.indexes().len(), 1);
        let ix = t.indexes().find_by_name("ix_ab", Dialect::Generic).unwrap();
        assert_eq!(ix.expressions.len(), 1);
        assert_eq!(ix.expressions[0].attribute_ref(), Some(a_id));
    }

    #[test]
    fn test_mapped_index_is_protected() {
        let (mut model, customer, _, _) = shop(Dialect::MySQL);
        let pk = model.table(customer).unwrap().primary_key().unwrap().clone();

        let err = model.remove_index(customer, pk.system_id()).unwrap_err();
        assert!(matches!(err, ModelError::CannotDelete { .. }));

        let mut weaker = pk.clone();
        weaker.kind = IndexKind::NonUnique;
        let err = model.change_index(pk.system_id(), &weaker).unwrap_err();
        assert!(matches!(err, ModelError::CannotDelete { .. }));

        let mut renamed = pk.clone();
        renamed.name = "pk_client".into();
        model.change_index(pk.system_id(), &renamed).unwrap();
        assert_eq!(model.table(customer).unwrap().primary_key().unwrap().name, "PK_CLIENT");
    }

    #[test]
    fn test_relation_must_cover_unique_index() {
        let (mut model, customer, orders, cust_ref) = shop(Dialect::MySQL);
        let err = model
            .add_relation(Relation::new("fk_empty", orders, customer))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidReference(_)));

        let err = model
            .add_relation(Relation::new("fk_dangling", orders, SystemId::new()).map(SystemId::new(), cust_ref))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidReference(_)));
        assert_eq!(model.relations().len(), 1);
    }

    #[test]
    fn test_change_attribute_restores_fields() {
        let (mut model, _, orders, cust_ref) = shop(Dialect::MySQL);
        let template = Attribute::new("customer_id", "bigint").not_null();
        model.change_attribute(cust_ref, &template).unwrap();

        let attribute = model.table(orders).unwrap().attributes().find_by_id(cust_ref).unwrap();
        assert_eq!(attribute.name, "CUSTOMER_ID");
        assert_eq!(attribute.datatype, DataTypeRef::Type("BIGINT".into()));
        assert!(!attribute.nullable);
        assert_eq!(attribute.owner(), Some(orders));
        assert!(model.check_if_used_as_foreign_key(cust_ref));
    }

    #[test]
    fn test_change_attribute_keeps_mapped_types() {
        let (mut model, customer, _, cust_ref) = shop(Dialect::MySQL);
        let before = model.snapshot();

        let err = model
            .change_attribute(cust_ref, &Attribute::new("cust_id", "BLOB"))
            .unwrap_err();
        assert!(matches!(err, ModelError::CannotDelete { .. }));

        let key = model.table(customer).unwrap().primary_key().unwrap().expressions[0]
            .attribute_ref()
            .unwrap();
        let err = model
            .change_attribute(key, &Attribute::new("id", "VARCHAR").size(10).not_null())
            .unwrap_err();
        assert!(matches!(err, ModelError::CannotDelete { .. }));
        assert_eq!(model.snapshot(), before);

        // unmapped attributes may change family
        let name = model.table(customer).unwrap().attributes().iter().nth(1).unwrap().system_id();
        model.change_attribute(name, &Attribute::new("name", "BLOB")).unwrap();
    }

    #[derive(Debug)]
    struct VetoChanges;

    impl ModificationTracker for VetoChanges {
        fn announce(&self, event: &ModelEvent, _model: &Model) -> Result<(), VetoError> {
            if event.kind().starts_with("change") {
                return Err(VetoError::new("frozen"));
            }
            Ok(())
        }

        fn record(&mut self, _event: ModelEvent, _model: &Model) {}
    }

    #[test]
    fn test_change_relation() {
        let (mut model, customer, orders, cust_ref) = shop(Dialect::MySQL);
        let (id, name) = {
            let table = model.table(customer).unwrap();
            let id = table.primary_key().unwrap().expressions[0].attribute_ref().unwrap();
            (id, table.attributes().find_by_name("name", Dialect::MySQL).unwrap().system_id())
        };
        let unique = model
            .add_index_to_table(customer, Index::new("uk_name", IndexKind::Unique).with_attribute(name))
            .unwrap();
        let pair = model
            .add_index_to_table(
                customer,
                Index::new("uk_id_name", IndexKind::Unique).with_attribute(id).with_attribute(name),
            )
            .unwrap();
        let expression = |model: &Model, index: SystemId| {
            model.table(customer).unwrap().indexes().find_by_id(index).unwrap().expressions[0].system_id()
        };
        let unique_key = expression(&model, unique);
        let pair_key = expression(&model, pair);

        let cust_name = model
            .add_attribute_to_table(orders, Attribute::new("cust_name", "VARCHAR").size(40))
            .unwrap();
        model
            .add_relation(Relation::new("fk_orders_name", orders, customer).map(unique_key, cust_name))
            .unwrap();
        let relation = model.relation_by_name("fk_orders_customer").unwrap().clone();
        let before = model.snapshot();

        let mut renamed = relation.clone();
        renamed.name = "FK_Orders_Name".into();
        assert!(matches!(
            model.change_relation(relation.system_id(), &renamed),
            Err(ModelError::AlreadyExists { .. })
        ));

        // one of two expressions of uk_id_name
        let partial = Relation::new("fk_orders_customer", orders, customer).map(pair_key, cust_ref);
        assert!(matches!(
            model.change_relation(relation.system_id(), &partial),
            Err(ModelError::InvalidReference(_))
        ));

        model.set_tracker(Box::new(VetoChanges));
        let remapped = Relation::new("fk_orders_customer", orders, customer)
            .map(unique_key, cust_name)
            .on_delete(ForeignKeyAction::Cascade);
        assert!(model.change_relation(relation.system_id(), &remapped).unwrap_err().is_veto());
        assert_eq!(model.snapshot(), before);

        model.set_tracker(Box::new(EmptyTracker));
        model.change_relation(relation.system_id(), &remapped).unwrap();
        let changed = model.relations().find_by_id(relation.system_id()).unwrap();
        assert_eq!(
            changed.mapping,
            [RelationMapping {
                expression: unique_key,
                attribute: cust_name
            }]
        );
        assert_eq!(changed.on_delete, ForeignKeyAction::Cascade);
        assert_eq!(changed.importing_table(), orders);
        // the primary key is free again
        assert!(!model.relations().is_index_in_use(model.table(customer).unwrap().primary_key().unwrap()));
    }

    #[test]
    fn test_generic_delete() {
        let (mut model, customer, orders, _) = shop(Dialect::MySQL);
        let err = model.delete(ItemRef::Table(customer)).unwrap_err();
        assert!(matches!(err, ModelError::CannotDelete { .. }));

        let relation = model.relations().iter().next().unwrap().system_id();
        model.delete(ItemRef::Relation(relation)).unwrap();
        model.delete(ItemRef::Table(customer)).unwrap();
        assert!(model.table(customer).is_none());

        let attribute = model.table(orders).unwrap().attributes().iter().next().unwrap().system_id();
        assert!(matches!(
            model.delete(ItemRef::Attribute(attribute)),
            Err(ModelError::Unsupported(_))
        ));
    }

    #[test]
    fn test_veto_leaves_model_untouched() {
        let (mut model, customer, _, _) = shop(Dialect::MySQL);
        model.set_tracker(Box::new(VetoRemovals));
        let before = model.snapshot();

        assert!(model.remove_table(customer).unwrap_err().is_veto());
        assert_eq!(model.snapshot(), before);
        assert_eq!(model.relations().len(), 1);
    }

    #[test]
    fn test_domain_in_use_cannot_be_removed() {
        let mut model = Model::new(Dialect::PostgreSQL);
        let domain = model.add_domain(Domain::new("money_amount", "numeric").size(12).fraction(2)).unwrap();
        assert_eq!(model.domains().find_by_id(domain).unwrap().datatype, "NUMERIC");

        let table = model
            .add_table(Table::new("invoice").with_attribute(Attribute::with_domain("total", domain)))
            .unwrap();
        assert!(matches!(
            model.remove_domain(domain),
            Err(ModelError::CannotDelete { .. })
        ));

        let total = model.table(table).unwrap().attributes().iter().next().unwrap().system_id();
        model.remove_attribute_from_table(table, total).unwrap();
        model.remove_domain(domain).unwrap();
        assert!(model.domains().is_empty());
    }

    #[test]
    fn test_subject_areas_follow_removals() {
        let (mut model, customer, orders, _) = shop(Dialect::MySQL);
        let view = model.add_view(View::new("v_customer", "SELECT id FROM customer")).unwrap();
        let area = model
            .add_subject_area(SubjectArea::new("sales").with_table(customer).with_table(orders).with_view(view))
            .unwrap();

        model.remove_table(customer).unwrap();
        model.remove_view(view).unwrap();
        let area = model.subject_areas().find_by_id(area).unwrap();
        assert_eq!(area.tables, [orders]);
        assert!(area.views.is_empty());
    }

    #[test]
    fn test_connection_history_entry() {
        let mut model = Model::new(Dialect::MySQL);
        model.properties_mut().set(PROPERTY_URL, "ddl:shop.sql");
        model.properties_mut().set(PROPERTY_USER, "scott");
        model.properties_mut().set("COLOR", "blue");

        let entry = model.create_connection_history_entry();
        assert_eq!(entry.to_string(), "MySQL - ddl:shop.sql - scott");
    }
}
