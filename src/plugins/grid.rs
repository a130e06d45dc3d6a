use bevy::prelude::*;
use bevy::utils::HashMap;
use std::collections::BTreeSet;

use crate::plugins::items::{ItemInstance, ItemInstanceId, ItemTag};
use crate::plugins::shape::Rotation;

/// Root coordinate of an empty slot. Never part of a generated grid.
pub const NO_ROOT: IVec2 = IVec2::new(-1, -1);

/// One cell of the inventory grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    coordinates: IVec2,
    item: Option<ItemInstanceId>,
    root_slot: IVec2,
    rotation: Rotation,
    permitted_tags: BTreeSet<ItemTag>,
}

impl Slot {
    fn new(coordinates: IVec2, permitted_tags: BTreeSet<ItemTag>) -> Self {
        Self {
            coordinates,
            item: None,
            root_slot: NO_ROOT,
            rotation: Rotation::Deg0,
            permitted_tags,
        }
    }

    pub fn coordinates(&self) -> IVec2 {
        self.coordinates
    }

    pub fn item(&self) -> Option<ItemInstanceId> {
        self.item
    }

    pub fn root_slot(&self) -> IVec2 {
        self.root_slot
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn permitted_tags(&self) -> &BTreeSet<ItemTag> {
        &self.permitted_tags
    }

    pub fn set_permitted_tags(&mut self, tags: BTreeSet<ItemTag>) {
        self.permitted_tags = tags;
    }

    pub fn is_root_slot(&self) -> bool {
        self.root_slot == self.coordinates
    }

    pub fn is_empty(&self) -> bool {
        self.item.is_none()
    }

    /// Tag filter for UI drop targets. Placement does not consult it.
    pub fn accepts(&self, item: &ItemInstance) -> bool {
        self.permitted_tags.is_empty()
            || item
                .tags()
                .iter()
                .any(|tag| self.permitted_tags.iter().any(|permitted| tag.matches(permitted)))
    }

    pub(crate) fn occupy(&mut self, item: ItemInstanceId, root_slot: IVec2, rotation: Rotation) {
        self.item = Some(item);
        self.root_slot = root_slot;
        self.rotation = rotation;
    }

    pub(crate) fn clear(&mut self) {
        self.item = None;
        self.root_slot = NO_ROOT;
        self.rotation = Rotation::Deg0;
    }
}

/// Fixed set of slots laid out row-major, with an occupancy index keyed by
/// coordinate. A coordinate is in bounds iff it has an occupancy entry.
#[derive(Debug, Clone, Default)]
pub struct SlotGrid {
    pub(crate) slots: Vec<Slot>,
    pub(crate) occupancy: HashMap<IVec2, bool>,
    max_columns: usize,
}

impl SlotGrid {
    pub fn new(total_slots: usize, columns: usize, default_tags: &BTreeSet<ItemTag>) -> Self {
        let mut grid = Self::default();
        grid.initialize(total_slots, columns, default_tags);
        grid
    }

    /// Regenerates every slot, dropping all previous state.
    pub fn initialize(
        &mut self,
        total_slots: usize,
        columns: usize,
        default_tags: &BTreeSet<ItemTag>,
    ) {
        self.slots.clear();
        self.occupancy.clear();
        self.max_columns = columns;

        if columns == 0 {
            if total_slots > 0 {
                warn!(
                    "Inventory grid requested {} slots with zero columns; grid left empty",
                    total_slots
                );
            }
            return;
        }

        self.slots.reserve(total_slots);
        for i in 0..total_slots {
            let coordinates = IVec2::new((i % columns) as i32, (i / columns) as i32);
            self.slots.push(Slot::new(coordinates, default_tags.clone()));
            self.occupancy.insert(coordinates, false);
        }
    }

    pub fn total_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn max_columns(&self) -> usize {
        self.max_columns
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn is_out_of_bounds(&self, coordinates: IVec2) -> bool {
        !self.occupancy.contains_key(&coordinates)
    }

    /// Occupancy flag of an in-bounds coordinate.
    ///
    /// # Panics
    /// If `coordinates` is out of bounds. Check [`Self::is_out_of_bounds`] first.
    pub fn is_occupied(&self, coordinates: IVec2) -> bool {
        match self.occupancy.get(&coordinates) {
            Some(occupied) => *occupied,
            None => panic!("occupancy queried for out-of-bounds coordinate {}", coordinates),
        }
    }

    pub fn slot_index(&self, coordinates: IVec2) -> Option<usize> {
        if self.is_out_of_bounds(coordinates) {
            return None;
        }
        Some(coordinates.y as usize * self.max_columns + coordinates.x as usize)
    }

    pub fn slot_at(&self, coordinates: IVec2) -> Option<&Slot> {
        self.slot_index(coordinates).map(|i| &self.slots[i])
    }

    pub(crate) fn slot_at_mut(&mut self, coordinates: IVec2) -> Option<&mut Slot> {
        let index = self.slot_index(coordinates)?;
        Some(&mut self.slots[index])
    }

    pub fn root_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.is_root_slot())
    }

    pub fn root_slots_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.iter_mut().filter(|slot| slot.is_root_slot())
    }

    pub fn free_slot_count(&self) -> usize {
        self.occupancy.values().filter(|occupied| !**occupied).count()
    }

    /// Coordinates currently holding `item`, in slot order.
    pub fn cells_of(&self, item: ItemInstanceId) -> Vec<IVec2> {
        self.slots
            .iter()
            .filter(|slot| slot.item == Some(item))
            .map(|slot| slot.coordinates)
            .collect()
    }

    /// Occupancy index and slot contents agree, and every empty slot is reset.
    pub fn is_consistent(&self) -> bool {
        self.slots.len() == self.occupancy.len()
            && self.slots.iter().all(|slot| {
                let indexed = self.occupancy.get(&slot.coordinates).copied();
                let reset = slot.item.is_some()
                    || (slot.root_slot == NO_ROOT && slot.rotation == Rotation::Deg0);
                indexed == Some(slot.item.is_some()) && reset
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::items::ItemDefinition;
    use std::sync::Arc;

    #[test]
    fn test_row_major_layout() {
        let grid = SlotGrid::new(7, 3, &BTreeSet::new());
        let coords: Vec<IVec2> = grid.slots().iter().map(Slot::coordinates).collect();
        assert_eq!(
            coords,
            vec![
                IVec2::new(0, 0),
                IVec2::new(1, 0),
                IVec2::new(2, 0),
                IVec2::new(0, 1),
                IVec2::new(1, 1),
                IVec2::new(2, 1),
                IVec2::new(0, 2),
            ]
        );
        assert_eq!(grid.total_slots(), 7);
        assert_eq!(grid.max_columns(), 3);
        assert_eq!(grid.free_slot_count(), 7);
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_bounds_are_set_membership() {
        let grid = SlotGrid::new(7, 3, &BTreeSet::new());
        // Last row is partial
        assert!(!grid.is_out_of_bounds(IVec2::new(0, 2)));
        assert!(grid.is_out_of_bounds(IVec2::new(1, 2)));
        assert!(grid.is_out_of_bounds(IVec2::new(3, 0)));
        assert!(grid.is_out_of_bounds(IVec2::new(-1, 0)));
        assert_eq!(grid.slot_index(IVec2::new(0, 2)), Some(6));
        assert_eq!(grid.slot_index(IVec2::new(1, 2)), None);
    }

    #[test]
    #[should_panic(expected = "out-of-bounds")]
    fn test_is_occupied_out_of_bounds_panics() {
        let grid = SlotGrid::new(4, 2, &BTreeSet::new());
        grid.is_occupied(IVec2::new(5, 5));
    }

    #[test]
    fn test_empty_slot_defaults() {
        let grid = SlotGrid::new(2, 2, &BTreeSet::new());
        let slot = grid.slot_at(IVec2::new(1, 0)).unwrap();
        assert!(slot.is_empty());
        assert!(!slot.is_root_slot());
        assert_eq!(slot.root_slot(), NO_ROOT);
        assert_eq!(slot.rotation(), Rotation::Deg0);
    }

    #[test]
    fn test_reinitialize_replaces_state() {
        let mut grid = SlotGrid::new(4, 2, &BTreeSet::new());
        grid.occupancy.insert(IVec2::ZERO, true);
        grid.initialize(6, 3, &BTreeSet::new());
        assert_eq!(grid.total_slots(), 6);
        assert!(!grid.is_occupied(IVec2::ZERO));
        assert!(!grid.is_out_of_bounds(IVec2::new(2, 1)));
    }

    #[test]
    fn test_zero_columns_yields_empty_grid() {
        let grid = SlotGrid::new(5, 0, &BTreeSet::new());
        assert_eq!(grid.total_slots(), 0);
        assert!(grid.is_out_of_bounds(IVec2::ZERO));
    }

    #[test]
    fn test_slot_tag_filter() {
        let tags: BTreeSet<ItemTag> = [ItemTag::new("Item.Consumable")].into_iter().collect();
        let grid = SlotGrid::new(1, 1, &tags);
        let slot = &grid.slots()[0];

        let potion = ItemInstance::new(
            Arc::new(ItemDefinition::rectangle("potion", 1, 1).with_tag("Item.Consumable.Potion")),
            1,
        );
        let sword = ItemInstance::new(
            Arc::new(ItemDefinition::rectangle("sword", 1, 2).with_tag("Item.Weapon")),
            1,
        );
        assert!(slot.accepts(&potion));
        assert!(!slot.accepts(&sword));

        let open = SlotGrid::new(1, 1, &BTreeSet::new());
        assert!(open.slots()[0].accepts(&sword));
    }
}
