//! Shape-aware grid inventory ("Tetris-style") for Bevy.
//!
//! Items occupy multi-cell shapes on a fixed grid of slots. The engine
//! decides where a shape fits, in which of four rotations, how quantities
//! merge into existing stacks, and keeps slot occupancy consistent while
//! items are added, moved and removed.

pub mod plugins;

pub use plugins::config::{ConfigError, InventoryConfig, PrepopulatedItem};
pub use plugins::core::{AppState, CorePlugin};
pub use plugins::fragments::{EquipmentSlot, FragmentTag, ItemFragment};
pub use plugins::grid::{Slot, SlotGrid, NO_ROOT};
pub use plugins::inventory::{
    AddItemRequest, AddOutcome, Inventory, InventoryChange, InventoryChanged, InventoryInitialized,
    InventoryPlugin, ItemRejected, RemoveItemRequest, RemovedItem,
};
pub use plugins::items::{
    ItemDataError, ItemDataSource, ItemDatabase, ItemDefinition, ItemInstance, ItemInstanceId,
    ItemTag, ItemsPlugin,
};
pub use plugins::shape::Rotation;
