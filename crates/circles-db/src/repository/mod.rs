//! Repository layer: query functions organized by table.

pub mod circles;
pub mod frames;
pub mod links;
pub mod members;
