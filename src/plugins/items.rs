use bevy::prelude::*;
use bevy::utils::HashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::plugins::fragments::{FragmentTag, ItemFragment};

pub struct ItemsPlugin;

impl Plugin for ItemsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ItemDatabase>()
           .init_resource::<ItemDataSource>()
           .add_systems(Startup, load_items);
    }
}

#[derive(Debug, Error)]
pub enum ItemDataError {
    #[error("Could not read item data: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("Duplicate item id {0}")]
    DuplicateId(String),
    #[error("Item {id} is invalid: {reason}")]
    Invalid { id: String, reason: &'static str },
    #[error("Unknown item id {0}")]
    UnknownItem(String),
}

/// Dotted gameplay tag, e.g. `Item.Weapon.Sword`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemTag(pub String);

impl ItemTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// True if this tag is `parent` or nested under it.
    pub fn matches(&self, parent: &ItemTag) -> bool {
        self.0 == parent.0
            || (self.0.starts_with(&parent.0) && self.0[parent.0.len()..].starts_with('.'))
    }
}

fn default_stack_size() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Cells covered in the unrotated orientation.
    pub shape: Vec<IVec2>,
    /// Placement anchor and rotation pivot. Defaults to the first shape cell.
    #[serde(default)]
    pub shape_root: Option<IVec2>,
    #[serde(default = "default_stack_size")]
    pub stack_size_max: u32,
    #[serde(default)]
    pub tags: BTreeSet<ItemTag>,
    #[serde(default)]
    pub fragments: Vec<ItemFragment>,
}

impl ItemDefinition {
    pub fn new(id: impl Into<String>, shape: Vec<IVec2>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            shape,
            shape_root: None,
            stack_size_max: 1,
            tags: BTreeSet::new(),
            fragments: Vec::new(),
        }
    }

    pub fn rectangle(id: impl Into<String>, width: i32, height: i32) -> Self {
        let mut shape = Vec::new();
        for y in 0..height {
            for x in 0..width {
                shape.push(IVec2::new(x, y));
            }
        }
        Self::new(id, shape)
    }

    pub fn with_stack_size(mut self, stack_size_max: u32) -> Self {
        self.stack_size_max = stack_size_max;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(ItemTag::new(tag));
        self
    }

    pub fn with_fragment(mut self, fragment: ItemFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn shape_root(&self) -> IVec2 {
        self.shape_root
            .or_else(|| self.shape.first().copied())
            .unwrap_or(IVec2::ZERO)
    }

    pub fn validate(&self) -> Result<(), ItemDataError> {
        let invalid = |reason| ItemDataError::Invalid { id: self.id.clone(), reason };
        if self.shape.is_empty() {
            return Err(invalid("shape is empty"));
        }
        if self.stack_size_max == 0 {
            return Err(invalid("stack_size_max must be at least 1"));
        }
        if !self.shape.contains(&self.shape_root()) {
            return Err(invalid("shape_root is not a cell of the shape"));
        }
        Ok(())
    }
}

/// Identity of one item instance. Slots refer to instances through it.
///
/// Ids come from a process-wide counter. That counter is the only state
/// shared between inventories; it hands out each value once and nothing
/// reads it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemInstanceId(u64);

impl ItemInstanceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Runtime instantiation of an [`ItemDefinition`].
#[derive(Debug)]
pub struct ItemInstance {
    id: ItemInstanceId,
    definition: Arc<ItemDefinition>,
    quantity: u32,
    tags: BTreeSet<ItemTag>,
    fragments: Vec<ItemFragment>,
}

impl ItemInstance {
    pub fn new(definition: Arc<ItemDefinition>, quantity: u32) -> Self {
        let mut fragments = definition.fragments.clone();
        for fragment in fragments.iter_mut() {
            fragment.on_instanced();
        }

        Self {
            id: ItemInstanceId::next(),
            tags: definition.tags.clone(),
            definition,
            quantity,
            fragments,
        }
    }

    pub fn id(&self) -> ItemInstanceId {
        self.id
    }

    pub fn definition(&self) -> &Arc<ItemDefinition> {
        &self.definition
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
    }

    pub fn stack_size_max(&self) -> u32 {
        self.definition.stack_size_max
    }

    pub fn shape(&self) -> &[IVec2] {
        &self.definition.shape
    }

    pub fn shape_root(&self) -> IVec2 {
        self.definition.shape_root()
    }

    pub fn tags(&self) -> &BTreeSet<ItemTag> {
        &self.tags
    }

    pub fn add_tag(&mut self, tag: ItemTag) {
        self.tags.insert(tag);
    }

    pub fn fragments(&self) -> &[ItemFragment] {
        &self.fragments
    }

    pub fn fragment(&self, tag: FragmentTag) -> Option<&ItemFragment> {
        self.fragments.iter().find(|f| f.tag() == tag)
    }

    pub fn fragment_mut(&mut self, tag: FragmentTag) -> Option<&mut ItemFragment> {
        self.fragments.iter_mut().find(|f| f.tag() == tag)
    }

    /// Type-level equality: same definition, same tags, equal fragments.
    pub fn is_equal(&self, other: &ItemInstance) -> bool {
        self.definition.id == other.definition.id
            && self.tags == other.tags
            && self.fragments.len() == other.fragments.len()
            && self
                .fragments
                .iter()
                .zip(other.fragments.iter())
                .all(|(a, b)| a.equals(b))
    }

    pub fn can_stack_with(&self, other: &ItemInstance) -> bool {
        self.is_equal(other)
    }

    pub fn is_well_formed(&self) -> bool {
        self.definition.validate().is_ok()
    }

    pub(crate) fn activate(&mut self) {
        for fragment in self.fragments.iter_mut() {
            fragment.on_activated();
        }
    }

    pub(crate) fn deactivate(&mut self) {
        for fragment in self.fragments.iter_mut() {
            fragment.on_deactivated();
        }
    }
}

#[derive(Deserialize)]
struct ItemList {
    items: Vec<ItemDefinition>,
}

/// Where [`ItemsPlugin`] reads its definitions from.
#[derive(Resource, Debug, Clone)]
pub struct ItemDataSource(pub PathBuf);

impl Default for ItemDataSource {
    fn default() -> Self {
        Self(PathBuf::from("assets/items.ron"))
    }
}

#[derive(Resource, Default, Debug)]
pub struct ItemDatabase {
    items: HashMap<String, Arc<ItemDefinition>>,
    loaded: bool,
}

impl ItemDatabase {
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ItemDefinition>,
    ) -> Result<Self, ItemDataError> {
        let mut db = Self { items: HashMap::default(), loaded: true };
        for definition in definitions {
            db.insert(definition)?;
        }
        Ok(db)
    }

    pub fn from_ron_str(source: &str) -> Result<Self, ItemDataError> {
        let list: ItemList = ron::de::from_str(source)?;
        Self::from_definitions(list.items)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ItemDataError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    pub fn insert(
        &mut self,
        definition: ItemDefinition,
    ) -> Result<Arc<ItemDefinition>, ItemDataError> {
        definition.validate()?;
        if self.items.contains_key(&definition.id) {
            return Err(ItemDataError::DuplicateId(definition.id));
        }
        let definition = Arc::new(definition);
        self.items.insert(definition.id.clone(), definition.clone());
        self.loaded = true;
        Ok(definition)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<ItemDefinition>> {
        self.items.get(id)
    }

    pub fn instantiate(&self, id: &str, quantity: u32) -> Result<ItemInstance, ItemDataError> {
        self.get(id)
            .map(|definition| ItemInstance::new(definition.clone(), quantity))
            .ok_or_else(|| ItemDataError::UnknownItem(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

fn load_items(source: Res<ItemDataSource>, mut item_db: ResMut<ItemDatabase>) {
    // Tests and tools may insert a prepared database before startup.
    if item_db.is_loaded() {
        info!("ItemDatabase already populated with {} items.", item_db.len());
        return;
    }

    match ItemDatabase::load(&source.0) {
        Ok(db) => {
            *item_db = db;
            info!("ItemDatabase loaded with {} items from {:?}.", item_db.len(), source.0);
        }
        Err(err) => error!("Failed to load items from {:?}: {}", source.0, err),
    }
}
