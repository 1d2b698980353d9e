//! Identifier generation.
//!
//! Frames travel between independently administered nodes, so their ids must
//! be unique without coordination. A v4 UUID carries 122 bits drawn from the
//! OS CSPRNG; ids are rendered as 32 lowercase hex characters.

use uuid::Uuid;

/// Generate a new globally unique frame id.
pub fn generate_frame_id() -> String {
    Uuid::new_v4().simple().to_string()
}
