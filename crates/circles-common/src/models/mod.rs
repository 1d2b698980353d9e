//! Domain models for circles, their members, federated links, and sharing frames.

pub mod circle;
pub mod frame;
pub mod link;
pub mod member;
