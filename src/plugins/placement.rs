use bevy::prelude::*;
use bevy::utils::HashSet;

use crate::plugins::grid::{Slot, SlotGrid};
use crate::plugins::items::{ItemInstance, ItemInstanceId};
use crate::plugins::shape::{compute_occupied_coordinates, Rotation};

impl SlotGrid {
    /// Every coordinate is outside `excluded`, in bounds and unoccupied.
    pub fn are_slots_available(
        &self,
        coordinates: &[IVec2],
        excluded: Option<&HashSet<IVec2>>,
    ) -> bool {
        coordinates.iter().all(|c| {
            !excluded.is_some_and(|set| set.contains(c))
                && !self.is_out_of_bounds(*c)
                && !self.is_occupied(*c)
        })
    }

    pub fn fits(
        &self,
        anchor: IVec2,
        shape: &[IVec2],
        shape_root: IVec2,
        rotation: Rotation,
    ) -> bool {
        let (occupied, _) = compute_occupied_coordinates(anchor, shape, shape_root, rotation);
        self.are_slots_available(&occupied, None)
    }

    /// Tries `preferred` first, then the remaining rotations in
    /// [`Rotation::ALL`] order. Returns the first rotation that fits.
    pub fn can_place(
        &self,
        anchor: IVec2,
        shape: &[IVec2],
        shape_root: IVec2,
        preferred: Rotation,
    ) -> Option<Rotation> {
        if self.fits(anchor, shape, shape_root, preferred) {
            return Some(preferred);
        }

        Rotation::ALL
            .into_iter()
            .filter(|rotation| *rotation != preferred)
            .find(|rotation| self.fits(anchor, shape, shape_root, *rotation))
    }

    /// First-fit scan over anchors in slot order.
    pub fn find_first_fit(
        &self,
        shape: &[IVec2],
        shape_root: IVec2,
        preferred: Rotation,
    ) -> Option<(IVec2, Rotation)> {
        self.slots.iter().find_map(|slot| {
            let anchor = slot.coordinates();
            self.can_place(anchor, shape, shape_root, preferred)
                .map(|rotation| (anchor, rotation))
        })
    }

    /// Writes `item` into every cell of its footprint and returns the root slot.
    ///
    /// # Panics
    /// If the footprint is no longer available. Callers validate with
    /// [`Self::can_place`] immediately before placing.
    pub fn place(&mut self, anchor: IVec2, item: &ItemInstance, rotation: Rotation) -> &Slot {
        let (occupied, root) =
            compute_occupied_coordinates(anchor, item.shape(), item.shape_root(), rotation);

        assert!(
            self.are_slots_available(&occupied, None),
            "placement of {:?} at {} ({:?}) failed re-validation",
            item.id(),
            anchor,
            rotation
        );

        for coordinates in &occupied {
            if let Some(slot) = self.slot_at_mut(*coordinates) {
                slot.occupy(item.id(), root, rotation);
            }
            if let Some(flag) = self.occupancy.get_mut(coordinates) {
                *flag = true;
            }
        }

        match self.slot_at(root) {
            Some(slot) if slot.is_root_slot() => slot,
            _ => panic!("footprint of {:?} does not contain its root {}", item.id(), root),
        }
    }

    /// Clears every slot holding `item`. Returns the root coordinate if the
    /// item was present.
    pub fn remove(&mut self, item: ItemInstanceId) -> Option<IVec2> {
        let mut root = None;
        for slot in self.slots.iter_mut() {
            if slot.item() != Some(item) {
                continue;
            }
            if slot.is_root_slot() {
                root = Some(slot.coordinates());
            }
            slot.clear();
            if let Some(flag) = self.occupancy.get_mut(&slot.coordinates()) {
                *flag = false;
            }
        }
        root
    }

    /// Moves an already placed item. Cells it currently covers count as free;
    /// every other destination cell goes through [`Self::are_slots_available`].
    pub fn relocate(
        &mut self,
        item: &ItemInstance,
        anchor: IVec2,
        rotation: Rotation,
    ) -> Option<IVec2> {
        let (occupied, _) =
            compute_occupied_coordinates(anchor, item.shape(), item.shape_root(), rotation);

        let own: HashSet<IVec2> = self.cells_of(item.id()).into_iter().collect();
        let fresh: Vec<IVec2> = occupied.into_iter().filter(|c| !own.contains(c)).collect();
        if !self.are_slots_available(&fresh, None) {
            return None;
        }

        self.remove(item.id());
        Some(self.place(anchor, item, rotation).coordinates())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::items::ItemDefinition;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn grid(total: usize, columns: usize) -> SlotGrid {
        SlotGrid::new(total, columns, &BTreeSet::new())
    }

    fn instance(def: ItemDefinition) -> ItemInstance {
        ItemInstance::new(Arc::new(def), 1)
    }

    #[test]
    fn test_slots_available_rules() {
        let mut grid = grid(4, 2);
        assert!(grid.are_slots_available(&[], None));
        assert!(grid.are_slots_available(&[IVec2::new(0, 0), IVec2::new(1, 1)], None));
        assert!(!grid.are_slots_available(&[IVec2::new(2, 0)], None));

        let excluded: HashSet<IVec2> = [IVec2::new(1, 1)].into_iter().collect();
        assert!(!grid.are_slots_available(&[IVec2::new(1, 1)], Some(&excluded)));
        assert!(grid.are_slots_available(&[IVec2::new(0, 1)], Some(&excluded)));

        let pebble = instance(ItemDefinition::rectangle("pebble", 1, 1));
        grid.place(IVec2::new(0, 1), &pebble, Rotation::Deg0);
        assert!(!grid.are_slots_available(&[IVec2::new(0, 1)], None));
    }

    #[test]
    fn test_preferred_rotation_wins_when_it_fits() {
        let grid = grid(40, 10);
        let bar = ItemDefinition::rectangle("bar", 2, 1);
        let rotation = grid.can_place(IVec2::ZERO, &bar.shape, bar.shape_root(), Rotation::Deg180);
        assert_eq!(rotation, Some(Rotation::Deg180));
    }

    #[test]
    fn test_fallback_rotation_order() {
        // One row: a vertical bar only fits lying down.
        let grid = grid(3, 3);
        let bar = ItemDefinition::rectangle("bar", 1, 2);
        for preferred in [Rotation::Deg0, Rotation::Deg180] {
            let rotation = grid.can_place(IVec2::ZERO, &bar.shape, bar.shape_root(), preferred);
            assert_eq!(rotation, Some(Rotation::Deg90));
        }
        let rotation =
            grid.can_place(IVec2::ZERO, &bar.shape, bar.shape_root(), Rotation::DegNeg90);
        assert_eq!(rotation, Some(Rotation::DegNeg90));
    }

    #[test]
    fn test_square_never_fits_single_row() {
        // MaxColumns=2, TotalSlots=2 is a single row
        let one_row = grid(2, 2);
        let square = ItemDefinition::rectangle("square", 2, 2);
        assert!(one_row.is_out_of_bounds(IVec2::new(0, 1)));
        for rotation in Rotation::ALL {
            assert!(!one_row.fits(IVec2::ZERO, &square.shape, square.shape_root(), rotation));
        }
        let root = square.shape_root();
        assert_eq!(one_row.can_place(IVec2::ZERO, &square.shape, root, Rotation::Deg0), None);
        assert_eq!(one_row.find_first_fit(&square.shape, root, Rotation::Deg0), None);
    }

    #[test]
    fn test_place_marks_exactly_the_footprint() {
        let mut grid = grid(12, 4);
        let ell = instance(ItemDefinition::new(
            "ell",
            vec![IVec2::new(0, 0), IVec2::new(0, 1), IVec2::new(1, 1)],
        ));
        let before = grid.clone();

        let root = grid.place(IVec2::new(1, 0), &ell, Rotation::Deg0).coordinates();
        assert_eq!(root, IVec2::new(1, 0));

        let expected = [IVec2::new(1, 0), IVec2::new(1, 1), IVec2::new(2, 1)];
        for slot in grid.slots() {
            let c = slot.coordinates();
            if expected.contains(&c) {
                assert_eq!(slot.item(), Some(ell.id()));
                assert_eq!(slot.root_slot(), root);
                assert_eq!(slot.rotation(), Rotation::Deg0);
                assert!(grid.is_occupied(c));
            } else {
                assert_eq!(Some(slot), before.slot_at(c));
                assert!(!grid.is_occupied(c));
            }
        }
        assert_eq!(grid.root_slots().count(), 1);
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_root_follows_rotation() {
        let mut grid = grid(40, 10);
        let bar = instance(ItemDefinition::rectangle("bar", 2, 1));
        let root = grid.place(IVec2::new(3, 2), &bar, Rotation::Deg180).coordinates();
        // (0,0) rotated half a turn lands on the far end after normalization
        assert_eq!(root, IVec2::new(4, 2));
        assert_eq!(grid.cells_of(bar.id()), vec![IVec2::new(3, 2), IVec2::new(4, 2)]);
    }

    #[test]
    fn test_remove_is_inverse_of_place() {
        let mut grid = grid(40, 10);
        let bar = instance(ItemDefinition::rectangle("bar", 1, 3));
        let anchor = IVec2::new(5, 0);
        let root = bar.shape_root();
        let rotation = grid.can_place(anchor, bar.shape(), root, Rotation::Deg90).unwrap();
        let (footprint, _) = compute_occupied_coordinates(anchor, bar.shape(), root, rotation);

        let root = grid.place(anchor, &bar, rotation).coordinates();
        assert_eq!(grid.remove(bar.id()), Some(root));
        assert!(grid.is_consistent());
        assert_eq!(grid.free_slot_count(), 40);

        assert_eq!(grid.can_place(anchor, bar.shape(), bar.shape_root(), rotation), Some(rotation));
        let (again, _) = compute_occupied_coordinates(anchor, bar.shape(), root, rotation);
        assert_eq!(again, footprint);
    }

    #[test]
    fn test_remove_missing_item() {
        let mut grid = grid(4, 2);
        let ghost = instance(ItemDefinition::rectangle("ghost", 1, 1));
        assert_eq!(grid.remove(ghost.id()), None);
    }

    #[test]
    #[should_panic(expected = "failed re-validation")]
    fn test_place_on_occupied_cells_panics() {
        let mut grid = grid(4, 2);
        let a = instance(ItemDefinition::rectangle("a", 1, 1));
        let b = instance(ItemDefinition::rectangle("b", 1, 1));
        grid.place(IVec2::ZERO, &a, Rotation::Deg0);
        grid.place(IVec2::ZERO, &b, Rotation::Deg0);
    }

    #[test]
    fn test_relocate_may_overlap_own_cells() {
        let mut grid = grid(8, 4);
        let bar = instance(ItemDefinition::rectangle("bar", 2, 1));
        let rock = instance(ItemDefinition::rectangle("rock", 1, 1));
        grid.place(IVec2::ZERO, &bar, Rotation::Deg0);
        grid.place(IVec2::new(3, 0), &rock, Rotation::Deg0);

        // Slide right by one: overlaps its own (1,0)
        assert_eq!(grid.relocate(&bar, IVec2::new(1, 0), Rotation::Deg0), Some(IVec2::new(1, 0)));
        assert_eq!(grid.cells_of(bar.id()), vec![IVec2::new(1, 0), IVec2::new(2, 0)]);

        // Into the rock: rejected, nothing changes
        assert_eq!(grid.relocate(&bar, IVec2::new(2, 0), Rotation::Deg0), None);
        assert_eq!(grid.cells_of(bar.id()), vec![IVec2::new(1, 0), IVec2::new(2, 0)]);
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_relocate_turning_in_place() {
        // 2x2 grid, bar across the top row next to nothing else
        let mut grid = grid(4, 2);
        let bar = instance(ItemDefinition::rectangle("bar", 2, 1));
        grid.place(IVec2::ZERO, &bar, Rotation::Deg0);

        // Standing up keeps (0,0) and claims the free (0,1)
        assert_eq!(grid.relocate(&bar, IVec2::ZERO, Rotation::Deg90), Some(IVec2::ZERO));
        assert_eq!(grid.cells_of(bar.id()), vec![IVec2::new(0, 0), IVec2::new(0, 1)]);
        assert_eq!(grid.slot_at(IVec2::ZERO).unwrap().rotation(), Rotation::Deg90);

        // Sliding right would leave the grid at (2,0)
        assert_eq!(grid.relocate(&bar, IVec2::new(1, 0), Rotation::Deg0), None);
        assert_eq!(grid.cells_of(bar.id()), vec![IVec2::new(0, 0), IVec2::new(0, 1)]);
        assert_eq!(grid.free_slot_count(), 2);
        assert!(grid.is_consistent());
    }
}
