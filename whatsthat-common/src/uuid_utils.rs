//! Identifier utilities

use uuid::Uuid;

/// Length of venue and table identifiers
pub const SHORT_ID_LEN: usize = 8;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generate a short identifier (first 8 hex digits of a UUIDv4)
///
/// Used for venue and table ids, which end up in QR-encoded URLs.
pub fn short_id() -> String {
    let mut id = generate().simple().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}
