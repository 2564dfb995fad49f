use serde::{Deserialize, Serialize};

use super::item::{ModelItem, SystemId};

/// A named, reusable datatype specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    id: SystemId,
    pub name: String,
    pub datatype: String,
    pub size: Option<u32>,
    pub fraction: Option<u32>,
    pub scale: Option<u32>,
}

impl Domain {
    pub fn new(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            id: SystemId::new(),
            name: name.into(),
            datatype: datatype.into(),
            size: None,
            fraction: None,
            scale: None,
        }
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn fraction(mut self, fraction: u32) -> Self {
        self.fraction = Some(fraction);
        self
    }
}

impl ModelItem for Domain {
    const KIND: &'static str = "Domain";

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
