//! Shared types for the kestrel scheduling core.
//!
//! This crate holds the pieces every other crate agrees on: entity ids,
//! positions, the [`Actor`] interface the world layer implements, the shared
//! seed source and the on-disk configuration.

pub mod config;
pub mod rng;
pub mod world;

pub use rng::{ActorRng, SeedSource};
pub use world::{Actor, ConnectionId, EntityId, Position};
