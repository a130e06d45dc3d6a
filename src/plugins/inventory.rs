use bevy::prelude::*;
use bevy::utils::{HashMap, HashSet};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::plugins::config::InventoryConfig;
use crate::plugins::core::AppState;
use crate::plugins::grid::{Slot, SlotGrid};
use crate::plugins::items::{ItemDatabase, ItemInstance, ItemInstanceId, ItemTag};
use crate::plugins::shape::{compute_occupied_coordinates, rotate_shape_with_root, Rotation};

pub struct InventoryPlugin;

impl Plugin for InventoryPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<AddItemRequest>()
           .add_event::<RemoveItemRequest>()
           .add_event::<ItemRejected>()
           .add_event::<InventoryInitialized>()
           .add_event::<InventoryChanged>()
           .add_systems(
               Update,
               (
                   reinitialize_inventories,
                   initialize_inventories,
                   handle_add_requests,
                   handle_remove_requests,
                   publish_inventory_changes,
               )
                   .chain()
                   .run_if(in_state(AppState::Ready)),
           );
    }
}

// Events

/// Ask the inventory on `inventory` to take ownership of `item`.
#[derive(Event, Debug)]
pub struct AddItemRequest {
    pub inventory: Entity,
    pub item: ItemInstance,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct RemoveItemRequest {
    pub inventory: Entity,
    pub item: ItemInstanceId,
}

/// Whatever did not fit; `item.quantity()` is the remaining amount.
#[derive(Event, Debug)]
pub struct ItemRejected {
    pub inventory: Entity,
    pub item: ItemInstance,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryInitialized(pub Entity);

#[derive(Event, Debug, Clone, PartialEq)]
pub struct InventoryChanged {
    pub inventory: Entity,
    pub change: InventoryChange,
}

/// Mutation record for an external replication or save layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum InventoryChange {
    Initialized {
        total_slots: usize,
        max_columns: usize,
    },
    Added {
        item: ItemInstanceId,
        definition: String,
        root: IVec2,
        rotation: Rotation,
        quantity: u32,
    },
    QuantityChanged {
        item: ItemInstanceId,
        quantity: u32,
    },
    Moved {
        item: ItemInstanceId,
        root: IVec2,
        rotation: Rotation,
    },
    Removed {
        item: ItemInstanceId,
    },
}

#[derive(Debug)]
pub enum AddOutcome {
    /// Fully absorbed by existing stacks.
    Stacked,
    /// The leftover became a new footprint rooted at `root`.
    Placed { root: IVec2 },
    /// Not (fully) added. The item's quantity holds what remains.
    Rejected { item: ItemInstance },
}

impl AddOutcome {
    pub fn is_added(&self) -> bool {
        !matches!(self, AddOutcome::Rejected { .. })
    }

    pub fn remaining(&self) -> u32 {
        match self {
            AddOutcome::Rejected { item } => item.quantity(),
            _ => 0,
        }
    }
}

#[derive(Debug)]
pub struct RemovedItem {
    pub root: IVec2,
    pub item: ItemInstance,
}

/// Spatial grid inventory. Owns its slots and every instance placed in them.
#[derive(Component, Debug, Default)]
pub struct Inventory {
    pub(crate) grid: SlotGrid,
    pub(crate) items: HashMap<ItemInstanceId, ItemInstance>,
    rotation_priority: Rotation,
    changes: Vec<InventoryChange>,
}

impl Inventory {
    pub fn new(total_slots: usize, max_columns: usize, default_tags: BTreeSet<ItemTag>) -> Self {
        let mut inventory = Self::default();
        inventory.initialize(total_slots, max_columns, &default_tags);
        inventory
    }

    pub fn with_rotation_priority(mut self, rotation: Rotation) -> Self {
        self.rotation_priority = rotation;
        self
    }

    pub fn from_config(config: &InventoryConfig, item_db: &ItemDatabase) -> Self {
        let mut inventory = Self::default();
        inventory.apply_config(config, item_db);
        inventory
    }

    /// Re-initializes from `config` and seeds its pre-populated items.
    pub fn apply_config(&mut self, config: &InventoryConfig, item_db: &ItemDatabase) {
        self.rotation_priority = config.rotation_priority;
        self.initialize(config.total_slots, config.max_columns, &config.default_tags);

        let seeds = config.prepopulate.iter().filter_map(|entry| {
            match item_db.instantiate(&entry.item, entry.quantity) {
                Ok(item) => Some(item),
                Err(err) => {
                    warn!("Skipping pre-populated item: {}", err);
                    None
                }
            }
        });
        let seeds: Vec<ItemInstance> = seeds.collect();
        let placed = self.prepopulate(seeds);
        info!(
            "Inventory initialized: {} slots, {} columns, {} of {} seed items added",
            config.total_slots,
            config.max_columns,
            placed,
            config.prepopulate.len()
        );
    }

    /// Drops every slot and item and regenerates the grid.
    pub fn initialize(
        &mut self,
        total_slots: usize,
        max_columns: usize,
        default_tags: &BTreeSet<ItemTag>,
    ) {
        for (_, mut item) in self.items.drain() {
            item.deactivate();
        }
        self.grid.initialize(total_slots, max_columns, default_tags);
        self.record(InventoryChange::Initialized {
            total_slots: self.grid.total_slots(),
            max_columns,
        });
    }

    /// Best-effort seeding: items that do not fit are dropped silently.
    /// Returns how many were fully added.
    pub fn prepopulate(&mut self, items: impl IntoIterator<Item = ItemInstance>) -> usize {
        let mut added = 0;
        for item in items {
            match self.try_add_item(item) {
                AddOutcome::Rejected { item } => {
                    debug!(
                        "Seed item {} did not fit, {} left over",
                        item.definition().id,
                        item.quantity()
                    );
                }
                _ => added += 1,
            }
        }
        added
    }

    /// Stacks onto compatible items first, then places the remainder at the
    /// first anchor that fits. The amount considered is clamped to
    /// `1..=stack_size_max`.
    pub fn try_add_item(&mut self, mut item: ItemInstance) -> AddOutcome {
        if !item.is_well_formed() {
            warn!("Rejected malformed item {}", item.definition().id);
            return AddOutcome::Rejected { item };
        }

        let mut to_add = item.quantity().clamp(1, item.stack_size_max());
        while to_add > 0 {
            let added = self.add_quantity_to_first_available_stack(&item, to_add);
            if added == 0 {
                break;
            }
            to_add -= added;
        }
        if to_add == 0 {
            return AddOutcome::Stacked;
        }

        item.set_quantity(to_add);
        match self.grid.find_first_fit(item.shape(), item.shape_root(), self.rotation_priority) {
            Some((anchor, rotation)) => {
                let root = self.insert_at(anchor, rotation, item);
                AddOutcome::Placed { root }
            }
            None => {
                debug!("No room for {} x{}", item.definition().id, to_add);
                AddOutcome::Rejected { item }
            }
        }
    }

    /// Read-only feasibility check matching [`Self::try_add_item`].
    pub fn can_add_item(&self, item: &ItemInstance) -> bool {
        if !item.is_well_formed() {
            return false;
        }
        self.spare_stack_capacity(item) > 0
            || self
                .grid
                .find_first_fit(item.shape(), item.shape_root(), self.rotation_priority)
                .is_some()
    }

    /// Removes the instance if present. Reports success either way.
    pub fn try_remove_item(&mut self, item: ItemInstanceId) -> bool {
        self.remove_item(item);
        true
    }

    /// Removes the instance and hands it back together with its former root.
    pub fn remove_item(&mut self, item: ItemInstanceId) -> Option<RemovedItem> {
        let root = self.grid.remove(item);
        let mut removed = self.items.remove(&item)?;
        removed.deactivate();
        self.record(InventoryChange::Removed { item });
        root.map(|root| RemovedItem { root, item: removed })
    }

    /// Moves a placed item to a new anchor and rotation. Its current cells
    /// count as free; on failure nothing changes.
    pub fn try_move_item(
        &mut self,
        item: ItemInstanceId,
        anchor: IVec2,
        rotation: Rotation,
    ) -> bool {
        let Some(instance) = self.items.get(&item) else {
            return false;
        };
        match self.grid.relocate(instance, anchor, rotation) {
            Some(root) => {
                self.record(InventoryChange::Moved { item, root, rotation });
                true
            }
            None => false,
        }
    }

    /// Takes up to `amount` from a stack, removing it when emptied.
    /// Returns the amount taken.
    pub fn consume_quantity(&mut self, item: ItemInstanceId, amount: u32) -> u32 {
        let Some(stack) = self.items.get_mut(&item) else {
            return 0;
        };
        let taken = amount.min(stack.quantity());
        let quantity = stack.quantity() - taken;
        stack.set_quantity(quantity);

        if quantity == 0 {
            self.remove_item(item);
        } else if taken > 0 {
            self.record(InventoryChange::QuantityChanged { item, quantity });
        }
        taken
    }

    /// Root slot indices of other, type-equal items with a different quantity
    /// whose footprint touches `shape_coordinates`. Used to find a partial
    /// stack to top off when dragging one stack over another.
    pub fn get_relevant_items(
        &self,
        shape_coordinates: &[IVec2],
        reference: &ItemInstance,
    ) -> Vec<usize> {
        let wanted: HashSet<IVec2> = shape_coordinates.iter().copied().collect();

        self.grid
            .slots()
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                if !slot.is_root_slot() {
                    return None;
                }
                let id = slot.item()?;
                let item = self.items.get(&id)?;
                if id == reference.id()
                    || !item.is_equal(reference)
                    || item.quantity() == reference.quantity()
                {
                    return None;
                }
                let touches = self.footprint(id).iter().any(|c| wanted.contains(c));
                touches.then_some(index)
            })
            .collect()
    }

    /// Cells covered by a placed item, recomputed from its root slot.
    pub fn footprint(&self, item: ItemInstanceId) -> Vec<IVec2> {
        let Some(slot) = self.find_root_slot_by_instance(item) else {
            return Vec::new();
        };
        let Some(instance) = self.items.get(&item) else {
            return Vec::new();
        };
        let (shape, shape_root) = (instance.shape(), instance.shape_root());
        let rotation = slot.rotation();
        let (_, rotated_root) = rotate_shape_with_root(shape, rotation, shape_root);
        let anchor = slot.coordinates() - rotated_root;
        compute_occupied_coordinates(anchor, shape, shape_root, rotation).0
    }

    // Queries

    pub fn contains_item(&self, item: &ItemInstance) -> bool {
        self.find_root_slot_by_item_type(item).is_some()
    }

    pub fn contains_instance(&self, item: ItemInstanceId) -> bool {
        self.items.contains_key(&item)
    }

    pub fn find_root_slot_by_item_type(&self, item: &ItemInstance) -> Option<&Slot> {
        self.find_stackable_roots(item).into_iter().next()
    }

    pub fn find_root_slot_by_instance(&self, item: ItemInstanceId) -> Option<&Slot> {
        self.find_roots_by_instance(item).into_iter().next()
    }

    pub fn root_slots(&self) -> impl Iterator<Item = &Slot> {
        self.grid.root_slots()
    }

    pub fn root_slots_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.grid.root_slots_mut()
    }

    pub fn slots(&self) -> &[Slot] {
        self.grid.slots()
    }

    pub fn grid(&self) -> &SlotGrid {
        &self.grid
    }

    pub fn item(&self, item: ItemInstanceId) -> Option<&ItemInstance> {
        self.items.get(&item)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemInstance> {
        self.items.values()
    }

    pub fn total_slots(&self) -> usize {
        self.grid.total_slots()
    }

    pub fn max_columns(&self) -> usize {
        self.grid.max_columns()
    }

    pub fn free_slot_count(&self) -> usize {
        self.grid.free_slot_count()
    }

    pub fn rotation_priority(&self) -> Rotation {
        self.rotation_priority
    }

    pub fn set_rotation_priority(&mut self, rotation: Rotation) {
        self.rotation_priority = rotation;
    }

    // Change log

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn drain_changes(&mut self) -> std::vec::Drain<'_, InventoryChange> {
        self.changes.drain(..)
    }

    pub(crate) fn record(&mut self, change: InventoryChange) {
        self.changes.push(change);
    }

    fn insert_at(&mut self, anchor: IVec2, rotation: Rotation, mut item: ItemInstance) -> IVec2 {
        item.activate();
        let root = self.grid.place(anchor, &item, rotation).coordinates();
        self.record(InventoryChange::Added {
            item: item.id(),
            definition: item.definition().id.clone(),
            root,
            rotation,
            quantity: item.quantity(),
        });
        self.items.insert(item.id(), item);
        root
    }
}

// Systems

fn reinitialize_inventories(
    item_db: Res<ItemDatabase>,
    mut q_inventories: Query<(Entity, &InventoryConfig, &mut Inventory), Changed<InventoryConfig>>,
    mut initialized: EventWriter<InventoryInitialized>,
) {
    for (entity, config, mut inventory) in q_inventories.iter_mut() {
        if let Err(err) = config.validate() {
            error!("Inventory {:?} keeps its old layout: {}", entity, err);
            continue;
        }
        inventory.apply_config(config, &item_db);
        initialized.send(InventoryInitialized(entity));
    }
}

fn initialize_inventories(
    mut commands: Commands,
    item_db: Res<ItemDatabase>,
    q_configs: Query<(Entity, &InventoryConfig), Without<Inventory>>,
    mut initialized: EventWriter<InventoryInitialized>,
) {
    for (entity, config) in q_configs.iter() {
        let inventory = match config.validate() {
            Ok(()) => Inventory::from_config(config, &item_db),
            Err(err) => {
                error!("Inventory {:?} has an invalid config, created empty: {}", entity, err);
                Inventory::default()
            }
        };
        commands.entity(entity).insert(inventory);
        initialized.send(InventoryInitialized(entity));
    }
}

fn handle_add_requests(
    mut requests: ResMut<Events<AddItemRequest>>,
    mut q_inventories: Query<&mut Inventory>,
    mut rejected: EventWriter<ItemRejected>,
) {
    for AddItemRequest { inventory, item } in requests.drain() {
        let Ok(mut target) = q_inventories.get_mut(inventory) else {
            warn!("Add request for {:?}, which has no inventory", inventory);
            rejected.send(ItemRejected { inventory, item });
            continue;
        };

        let name = item.definition().name.clone();
        match target.try_add_item(item) {
            AddOutcome::Rejected { item } => {
                info!("No room for {} ({} left over)", name, item.quantity());
                rejected.send(ItemRejected { inventory, item });
            }
            AddOutcome::Placed { root } => info!("Placed {} at {}", name, root),
            AddOutcome::Stacked => info!("Stacked {}", name),
        }
    }
}

fn handle_remove_requests(
    mut requests: EventReader<RemoveItemRequest>,
    mut q_inventories: Query<&mut Inventory>,
) {
    for request in requests.read() {
        match q_inventories.get_mut(request.inventory) {
            Ok(mut inventory) => {
                inventory.try_remove_item(request.item);
            }
            Err(_) => warn!("Remove request for {:?}, which has no inventory", request.inventory),
        }
    }
}

fn publish_inventory_changes(
    mut q_inventories: Query<(Entity, &mut Inventory)>,
    mut changed: EventWriter<InventoryChanged>,
) {
    for (entity, mut inventory) in q_inventories.iter_mut() {
        if !inventory.has_pending_changes() {
            continue;
        }
        for change in inventory.drain_changes() {
            changed.send(InventoryChanged { inventory: entity, change });
        }
    }
}
