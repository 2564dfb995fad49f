//! Name validation and uniqueness checks shared by every entity set.

use super::item::{ModelItem, OwnedItemList, SystemId};
use crate::dialect::Dialect;
use crate::error::ModelError;

/// Kinds of model-level items with a model-wide unique name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Table,
    Relation,
    View,
    Domain,
    SubjectArea,
}

/// Answers whether a name is already taken in the scope owned by the verifier.
pub trait OwnedModelItemVerifier {
    fn check_name_already_exists(
        &self,
        kind: ItemKind,
        name: &str,
        exclude: Option<SystemId>,
    ) -> Result<(), ModelError>;
}

/// Fail with `AlreadyExists` if another item normalizes to the same name.
pub fn check_existence<T: ModelItem + Clone>(
    list: &OwnedItemList<T>,
    name: &str,
    dialect: Dialect,
    exclude: Option<SystemId>,
) -> Result<(), ModelError> {
    let wanted = dialect.normalize(name);
    let taken = list
        .iter()
        .any(|item| Some(item.system_id()) != exclude && dialect.normalize(item.name()) == wanted);
    if taken {
        return Err(ModelError::already_exists(T::KIND, wanted));
    }
    Ok(())
}

/// Validate a name with the dialect and check it is free in the list.
/// Returns the normalized name.
pub fn check_name_and_existence<T: ModelItem + Clone>(
    list: &OwnedItemList<T>,
    name: &str,
    dialect: Dialect,
    exclude: Option<SystemId>,
) -> Result<String, ModelError> {
    let normalized = dialect.check_name(name)?;
    check_existence(list, &normalized, dialect, exclude)?;
    Ok(normalized)
}

/// Validate every name of a batch of items that will share one scope.
/// Returns the normalized names in input order.
pub fn check_unique_names<'a, T: ModelItem + 'a>(
    items: impl IntoIterator<Item = &'a T>,
    dialect: Dialect,
) -> Result<Vec<String>, ModelError> {
    let mut seen: Vec<String> = Vec::new();
    for item in items {
        let normalized = dialect.check_name(item.name())?;
        if seen.contains(&normalized) {
            return Err(ModelError::already_exists(T::KIND, normalized));
        }
        seen.push(normalized);
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, Table};

    #[test]
    fn test_check_name_and_existence() {
        let mut tables = OwnedItemList::new();
        let customer = Table::new("CUSTOMER");
        let id = customer.system_id();
        tables.add(customer);

        let err = check_name_and_existence(&tables, "customer", Dialect::MySQL, None).unwrap_err();
        assert_eq!(err, ModelError::already_exists("Table", "CUSTOMER"));

        // renaming an item to its own name is fine
        let name = check_name_and_existence(&tables, "customer", Dialect::MySQL, Some(id)).unwrap();
        assert_eq!(name, "CUSTOMER");

        assert_eq!(
            check_name_and_existence(&tables, "orders", Dialect::MySQL, None).unwrap(),
            "ORDERS"
        );
    }

    #[test]
    fn test_check_unique_names() {
        let attrs = [Attribute::new("id", "INT"), Attribute::new("ID", "INT")];
        assert!(check_unique_names(attrs.iter(), Dialect::Generic).is_ok());
        assert!(matches!(
            check_unique_names(attrs.iter(), Dialect::MySQL),
            Err(ModelError::AlreadyExists { kind: "Attribute", .. })
        ));
    }
}
