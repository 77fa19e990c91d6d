//! Shared game engine and wire types for bestsweep.
//!
//! The engine is split bottom-up: [`grid`] knows about coordinates only,
//! [`generator`] lays out mines around a safe first click, [`reveal`] applies
//! player actions to a [`board::Board`], and [`session`] sequences those
//! actions into a single game with a clock and a final outcome.

pub mod board;
pub mod clock;
pub mod error;
pub mod generator;
pub mod grid;
pub mod models;
pub mod protocol;
pub mod reveal;
pub mod session;
