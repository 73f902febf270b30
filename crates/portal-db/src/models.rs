//! Database row types. These map directly to SQLite rows and stay
//! independent of the wire types in portal-types.

pub struct UserRow {
    pub id: i64,
    pub username: String,
}

/// A message joined with its sender's username.
pub struct MessageRow {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub sender_username: String,
    pub body: String,
    pub sent_at: String,
}
