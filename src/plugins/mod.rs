pub mod config;
pub mod core;
pub mod fragments;
pub mod grid;
pub mod inventory;
pub mod items;
pub mod placement;
pub mod shape;
pub mod stacking;
