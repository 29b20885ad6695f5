//! Pokemon card catalog TUI
//!
//! The library exposes the store pieces (state, actions, reducer, effects),
//! the PokeAPI source and the rendering layer so they can be tested without
//! a terminal.

pub mod action;
pub mod api;
pub mod effect;
pub mod grid;
pub mod reducer;
pub mod sprite;
pub mod sprite_backend;
pub mod state;
pub mod trigger;
pub mod ui;
pub mod view;
