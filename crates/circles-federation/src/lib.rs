//! # circles-federation
//!
//! Propagation of sharing frames between federated circles.
//!
//! ```text
//!  a.example.com (circle C)              b.example.com (circle R)
//!       │                                      │
//!       ├── PUT /_circles/v1/payload ────────► │  receive_frame
//!       │   { apiVersion, circleUniqueId: C,   │   (token, C) → link → R
//!       │     item, token }                    │
//!       │ ◄──────────── { status: 1 } ─────────┤
//! ```
//!
//! ## Key concepts
//!
//! - **Engine** (`engine.rs`): authors frames, claims them for local delivery,
//!   fans them out to up links, and accepts inbound copies.
//! - **Transport** (`client.rs`): the [`client::PayloadTransport`] seam and its
//!   `reqwest` implementation.
//! - **Remote addresses** (`remote.rs`): link address → payload endpoint URL.
//! - **Notifications** (`notify.rs`): share activity per affected member.
//! - **Wire types** (`types.rs`) and the protocol **error taxonomy** (`error.rs`).

pub mod client;
pub mod engine;
pub mod error;
pub mod notify;
pub mod remote;
pub mod types;

pub use client::{HttpTransport, PayloadTransport};
pub use engine::{EngineSettings, ForwardReport, SharingFrameService};
pub use error::ShareError;
