//! Static registry of tile definitions.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ColonyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Wood,
    Crystal,
    Cargo,
    Population,
}

impl ResourceType {
    /// Fixed enumeration order. Legacy saves store amounts positionally in this order.
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Wood,
        ResourceType::Crystal,
        ResourceType::Cargo,
        ResourceType::Population,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Wood => "Wood",
            ResourceType::Crystal => "Crystal",
            ResourceType::Cargo => "Cargo",
            ResourceType::Population => "Population",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    Headquarters,
    Terrain,
    Resource,
    Storage,
    Production,
}

/// Sub-category counted by map generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileTag {
    Trees,
    Crystals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub resource: ResourceType,
    pub amount: i64,
}

fn default_resource() -> ResourceType {
    ResourceType::Wood
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileDefinition {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    pub kind: TileKind,
    #[serde(default = "default_resource")]
    pub resource: ResourceType,
    #[serde(default)]
    pub capacity: i64,
    #[serde(default)]
    pub rate: i64,
    #[serde(default)]
    pub costs: Vec<ResourceCost>,
    #[serde(default)]
    pub replacement_options: Vec<String>,
    #[serde(default)]
    pub tag: Option<TileTag>,
}

impl TileDefinition {
    pub fn new(name: impl Into<String>, kind: TileKind) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            description: String::new(),
            kind,
            resource: default_resource(),
            capacity: 0,
            rate: 0,
            costs: Vec::new(),
            replacement_options: Vec::new(),
            tag: None,
        }
    }

    pub fn storage(name: impl Into<String>, resource: ResourceType, capacity: i64) -> Self {
        Self {
            resource,
            capacity,
            ..Self::new(name, TileKind::Storage)
        }
    }

    pub fn production(name: impl Into<String>, resource: ResourceType, rate: i64) -> Self {
        Self {
            resource,
            rate,
            ..Self::new(name, TileKind::Production)
        }
    }

    pub fn with_cost(mut self, resource: ResourceType, amount: i64) -> Self {
        self.costs.push(ResourceCost { resource, amount });
        self
    }

    pub fn with_replacements<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replacement_options
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_tag(mut self, tag: TileTag) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Label for the UI, falling back to the catalog name.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Storage contribution; zero unless this is a storage tile.
    pub fn storage_capacity(&self) -> i64 {
        if self.kind == TileKind::Storage {
            self.capacity
        } else {
            0
        }
    }

    /// Production contribution; zero unless this is a production tile.
    pub fn production_rate(&self) -> i64 {
        if self.kind == TileKind::Production {
            self.rate
        } else {
            0
        }
    }

    pub fn is_replaceable(&self) -> bool {
        !self.replacement_options.is_empty()
    }

    fn normalized(mut self) -> Self {
        if self.kind != TileKind::Storage {
            self.capacity = 0;
        }
        if self.kind != TileKind::Production {
            self.rate = 0;
        }
        self
    }
}

#[derive(Debug, Default)]
pub struct TileCatalog {
    by_name: HashMap<String, Arc<TileDefinition>>,
    ordered: Vec<Arc<TileDefinition>>,
}

impl TileCatalog {
    /// Builds the catalog, rejecting duplicate names and dangling replacement options.
    pub fn new(definitions: impl IntoIterator<Item = TileDefinition>) -> Result<Self, ColonyError> {
        let mut catalog = TileCatalog::default();
        for definition in definitions {
            if catalog.by_name.contains_key(&definition.name) {
                return Err(ColonyError::DuplicateTile(definition.name));
            }
            let definition = Arc::new(definition.normalized());
            catalog
                .by_name
                .insert(definition.name.clone(), Arc::clone(&definition));
            catalog.ordered.push(definition);
        }
        for definition in &catalog.ordered {
            for option in &definition.replacement_options {
                if !catalog.contains(option) {
                    return Err(ColonyError::UnknownTile(option.clone()));
                }
            }
        }
        Ok(catalog)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<TileDefinition>, ColonyError> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| ColonyError::UnknownTile(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn by_kind(&self, kind: TileKind) -> Vec<Arc<TileDefinition>> {
        self.ordered
            .iter()
            .filter(|definition| definition.kind == kind)
            .cloned()
            .collect()
    }

    pub fn replacement_options(
        &self,
        definition: &TileDefinition,
    ) -> Result<Vec<Arc<TileDefinition>>, ColonyError> {
        definition
            .replacement_options
            .iter()
            .map(|name| self.lookup(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TileDefinition>> {
        self.ordered.iter()
    }

    /// Count of definitions per kind, used for startup logging.
    pub fn kind_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for definition in &self.ordered {
            *counts.entry(format!("{:?}", definition.kind)).or_insert(0) += 1;
        }
        counts
    }
}
