use crate::plugins::grid::Slot;
use crate::plugins::inventory::{Inventory, InventoryChange};
use crate::plugins::items::{ItemInstance, ItemInstanceId};

impl Inventory {
    /// Root slots holding an item type-equal to `candidate`, in slot order.
    pub fn find_stackable_roots(&self, candidate: &ItemInstance) -> Vec<&Slot> {
        self.grid
            .root_slots()
            .filter(|slot| {
                slot.item()
                    .and_then(|id| self.items.get(&id))
                    .is_some_and(|item| item.is_equal(candidate))
            })
            .collect()
    }

    /// Root slots holding exactly this instance.
    pub fn find_roots_by_instance(&self, instance: ItemInstanceId) -> Vec<&Slot> {
        self.grid
            .root_slots()
            .filter(|slot| slot.item() == Some(instance))
            .collect()
    }

    /// Deposits into the first compatible stack that still has room.
    /// Returns how much was added, never pushing a stack past its maximum.
    pub fn add_quantity_to_first_available_stack(
        &mut self,
        candidate: &ItemInstance,
        quantity_to_add: u32,
    ) -> u32 {
        if quantity_to_add == 0 {
            return 0;
        }

        let target = self.grid.root_slots().find_map(|slot| {
            let id = slot.item()?;
            let item = self.items.get(&id)?;
            let has_room = item.quantity() < item.stack_size_max();
            (item.can_stack_with(candidate) && has_room).then_some(id)
        });
        let Some(id) = target else {
            return 0;
        };
        let Some(stack) = self.items.get_mut(&id) else {
            return 0;
        };

        let added = (stack.stack_size_max() - stack.quantity()).min(quantity_to_add);
        stack.set_quantity(stack.quantity() + added);
        let quantity = stack.quantity();
        self.record(InventoryChange::QuantityChanged { item: id, quantity });
        added
    }

    /// Total room left across stacks compatible with `candidate`.
    pub fn spare_stack_capacity(&self, candidate: &ItemInstance) -> u32 {
        self.find_stackable_roots(candidate)
            .into_iter()
            .filter_map(|slot| slot.item().and_then(|id| self.items.get(&id)))
            .map(|item| item.stack_size_max().saturating_sub(item.quantity()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::inventory::AddOutcome;
    use crate::plugins::items::ItemDefinition;
    use crate::plugins::shape::Rotation;
    use bevy::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn coins() -> Arc<ItemDefinition> {
        Arc::new(ItemDefinition::rectangle("coins", 1, 1).with_stack_size(10))
    }

    #[test]
    fn test_stackable_roots_use_type_equality() {
        let mut inventory = Inventory::new(10, 5, BTreeSet::new());
        let def = coins();
        let first = ItemInstance::new(def.clone(), 10);
        let first_id = first.id();
        assert!(matches!(inventory.try_add_item(first), AddOutcome::Placed { .. }));

        let incoming = ItemInstance::new(def, 1);
        let roots = inventory.find_stackable_roots(&incoming);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].item(), Some(first_id));

        assert!(inventory.find_roots_by_instance(incoming.id()).is_empty());
        assert_eq!(inventory.find_roots_by_instance(first_id).len(), 1);

        let gem = ItemInstance::new(Arc::new(ItemDefinition::rectangle("gem", 1, 1)), 1);
        assert!(inventory.find_stackable_roots(&gem).is_empty());
    }

    #[test]
    fn test_deposit_goes_to_first_stack_with_room() {
        let mut inventory = Inventory::new(10, 5, BTreeSet::new());
        let def = coins();
        let full = ItemInstance::new(def.clone(), 10);
        let full_id = full.id();
        let partial = ItemInstance::new(def.clone(), 4);
        let partial_id = partial.id();

        // Full stack occupies (0,0); a distinct partial stack is placed directly
        let root = inventory.grid.place(IVec2::ZERO, &full, Rotation::Deg0).coordinates();
        assert_eq!(root, IVec2::ZERO);
        inventory.items.insert(full_id, full);
        inventory.grid.place(IVec2::new(1, 0), &partial, Rotation::Deg0);
        inventory.items.insert(partial_id, partial);

        let incoming = ItemInstance::new(def, 1);
        assert_eq!(inventory.spare_stack_capacity(&incoming), 6);

        assert_eq!(inventory.add_quantity_to_first_available_stack(&incoming, 9), 6);
        assert_eq!(inventory.item(full_id).unwrap().quantity(), 10);
        assert_eq!(inventory.item(partial_id).unwrap().quantity(), 10);

        // Nothing left anywhere
        assert_eq!(inventory.add_quantity_to_first_available_stack(&incoming, 3), 0);
        assert_eq!(inventory.add_quantity_to_first_available_stack(&incoming, 0), 0);
    }

    #[test]
    fn test_stack_never_exceeds_max() {
        let mut inventory = Inventory::new(4, 2, BTreeSet::new());
        let def = coins();
        for qty in [3, 9, 10, 1, 7] {
            inventory.try_add_item(ItemInstance::new(def.clone(), qty));
            for item in inventory.items() {
                assert!(item.quantity() <= item.stack_size_max());
            }
        }
        let total: u32 = inventory.items().map(ItemInstance::quantity).sum();
        assert_eq!(total, 30);
    }
}
