//! Scenario tests over small synthetic levels

mod flip_maps;
mod sector_heights;
mod stacked_rooms;
