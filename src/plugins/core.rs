use bevy::prelude::*;

use crate::plugins::items::ItemDatabase;

pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<AppState>()
           .add_systems(Update, finish_loading.run_if(in_state(AppState::Loading)))
           .add_systems(OnEnter(AppState::Ready), announce_ready);
    }
}

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum AppState {
    #[default]
    Loading,
    // Item data is available; inventories may be built
    Ready,
}

fn finish_loading(item_db: Res<ItemDatabase>, mut next_state: ResMut<NextState<AppState>>) {
    if item_db.is_loaded() {
        next_state.set(AppState::Ready);
    }
}

fn announce_ready(item_db: Res<ItemDatabase>) {
    info!("Item data ready ({} definitions). Inventories enabled.", item_db.len());
}
