use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FragmentTag {
    Stats,
    Durability,
    Consumable,
    Equippable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentSlot {
    MainHand,
    OffHand,
    Head,
    Body,
    Trinket,
}

/// Optional behaviour attached to an item definition.
///
/// Each instance gets its own copy of the definition's fragments, so runtime
/// state such as durability or the equipped flag is never shared between
/// instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemFragment {
    Stats {
        #[serde(default)]
        attack: f32,
        #[serde(default)]
        defense: f32,
        #[serde(default)]
        speed: f32,
    },
    Durability {
        max: u32,
        #[serde(default)]
        current: u32,
    },
    Consumable {
        charges: u32,
    },
    Equippable {
        slot: EquipmentSlot,
        #[serde(default, skip_serializing)]
        active: bool,
    },
}

impl ItemFragment {
    pub fn tag(&self) -> FragmentTag {
        match self {
            ItemFragment::Stats { .. } => FragmentTag::Stats,
            ItemFragment::Durability { .. } => FragmentTag::Durability,
            ItemFragment::Consumable { .. } => FragmentTag::Consumable,
            ItemFragment::Equippable { .. } => FragmentTag::Equippable,
        }
    }

    /// Stacking equality. Transient state (the equipped flag) is ignored.
    pub fn equals(&self, other: &ItemFragment) -> bool {
        match (self, other) {
            (
                ItemFragment::Equippable { slot: a, .. },
                ItemFragment::Equippable { slot: b, .. },
            ) => a == b,
            _ => self == other,
        }
    }

    /// Called once when an instance is created from its definition.
    pub fn on_instanced(&mut self) {
        match self {
            ItemFragment::Durability { max, current } => *current = *max,
            ItemFragment::Equippable { active, .. } => *active = false,
            ItemFragment::Stats { .. } | ItemFragment::Consumable { .. } => {}
        }
    }

    /// Called when the owning instance enters an inventory.
    pub fn on_activated(&mut self) {
        if let ItemFragment::Equippable { active, .. } = self {
            *active = true;
        }
    }

    /// Called when the owning instance leaves an inventory.
    pub fn on_deactivated(&mut self) {
        if let ItemFragment::Equippable { active, .. } = self {
            *active = false;
        }
    }
}
