use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use bevy::utils::HashMap;
use rand::Rng;

use spatial_inventory::plugins::config::InventoryConfig;
use spatial_inventory::plugins::core::CorePlugin;
use spatial_inventory::plugins::inventory::{
    AddItemRequest, Inventory, InventoryChange, InventoryChanged, InventoryPlugin, ItemRejected,
};
use spatial_inventory::plugins::items::{ItemDatabase, ItemsPlugin};
use spatial_inventory::plugins::shape::bounding_box;

#[derive(Resource, Default)]
struct ChangeJournal(Vec<InventoryChange>);

fn main() {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
       .add_plugins(LogPlugin::default())
       .add_plugins(StatesPlugin)
       .add_plugins(CorePlugin)
       .add_plugins(ItemsPlugin)
       .add_plugins(InventoryPlugin)
       .init_resource::<ChangeJournal>()
       .add_systems(PostUpdate, (record_changes, report_rejections));

    let config = InventoryConfig::load("assets/inventory.ron").unwrap_or_else(|err| {
        error!("Falling back to the default backpack: {}", err);
        InventoryConfig::default()
    });
    let backpack = app.world_mut().spawn(config).id();

    // Startup loads items, the next frames enter Ready and build the backpack
    for _ in 0..3 {
        app.update();
    }

    let ids: Vec<String> = app
        .world()
        .resource::<ItemDatabase>()
        .ids()
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        error!("No item definitions loaded, nothing to add");
        return;
    }

    let mut rng = rand::thread_rng();
    for _ in 0..8 {
        let id = &ids[rng.gen_range(0..ids.len())];
        let quantity = rng.gen_range(1..=6);
        match app.world().resource::<ItemDatabase>().instantiate(id, quantity) {
            Ok(item) => {
                app.world_mut().send_event(AddItemRequest { inventory: backpack, item });
            }
            Err(err) => warn!("{}", err),
        }
    }
    app.update();

    if let Some(inventory) = app.world().get::<Inventory>(backpack) {
        print_layout(inventory);
    }

    let journal = app.world().resource::<ChangeJournal>();
    match serde_json::to_string_pretty(&journal.0) {
        Ok(json) => println!("{}", json),
        Err(err) => error!("Could not encode change log: {}", err),
    }
}

fn record_changes(mut events: EventReader<InventoryChanged>, mut journal: ResMut<ChangeJournal>) {
    journal.0.extend(events.read().map(|event| event.change.clone()));
}

fn report_rejections(mut events: EventReader<ItemRejected>) {
    for event in events.read() {
        warn!(
            "{} x{} left on the ground",
            event.item.definition().name,
            event.item.quantity()
        );
    }
}

fn print_layout(inventory: &Inventory) {
    let mut letters = HashMap::default();
    for slot in inventory.root_slots() {
        let Some(id) = slot.item() else { continue };
        let Some(item) = inventory.item(id) else { continue };
        let letter = (b'A' + (letters.len() % 26) as u8) as char;
        letters.insert(id, letter);

        let (_, size) = bounding_box(item.shape(), slot.rotation());
        println!(
            "{} {} x{} at {} ({}x{}, {:?})",
            letter,
            item.definition().name,
            item.quantity(),
            slot.coordinates(),
            size.x,
            size.y,
            slot.rotation()
        );
    }

    let columns = inventory.max_columns().max(1);
    for row in inventory.slots().chunks(columns) {
        let line: String = row
            .iter()
            .map(|slot| slot.item().and_then(|id| letters.get(&id).copied()).unwrap_or('.'))
            .collect();
        println!("{}", line);
    }
}
