use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO users (username) VALUES (?1)", [username])?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_id, username FROM users WHERE username = ?1",
                    [username],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            username: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Everyone except `exclude_id`, optionally narrowed to usernames that
    /// contain `filter`, ignoring case. Sorted by lowercased username, then id.
    pub fn list_users(&self, exclude_id: i64, filter: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| query_users(conn, exclude_id, filter))
    }

    // -- Messages --

    /// Append a message. The store stamps `sent_at`; returns the new id.
    pub fn insert_message(&self, sender_id: i64, recipient_id: i64, body: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, message) VALUES (?1, ?2, ?3)",
                rusqlite::params![sender_id, recipient_id, body],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Both directions of the `a`/`b` pair, oldest first.
    pub fn get_conversation(&self, a: i64, b: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_conversation(conn, a, b))
    }

    /// Replace a message body, but only if `sender_id` wrote it. A single
    /// conditional statement, so concurrent edits of the same row cannot
    /// interleave a read and a write.
    ///
    /// Returns `false` when no row matched: the message is missing or
    /// belongs to someone else, and callers must not tell those apart.
    /// SQLite counts matched rows, so rewriting an identical body still
    /// returns `true`.
    pub fn update_message_body(&self, message_id: i64, sender_id: i64, body: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET message = ?1 WHERE id = ?2 AND sender_id = ?3",
                rusqlite::params![body, message_id, sender_id],
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_users(conn: &Connection, exclude_id: i64, filter: Option<&str>) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare("SELECT user_id, username FROM users WHERE user_id <> ?1")?;
    let mut rows = stmt
        .query_map([exclude_id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // SQLite's LIKE and NOCASE only fold ASCII, so matching and ordering
    // happen here with full Unicode lowercasing.
    if let Some(needle) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        let needle = needle.to_lowercase();
        rows.retain(|row| row.username.to_lowercase().contains(&needle));
    }
    rows.sort_by_cached_key(|row| (row.username.to_lowercase(), row.id));

    Ok(rows)
}

fn query_conversation(conn: &Connection, a: i64, b: i64) -> Result<Vec<MessageRow>> {
    // LEFT JOIN so a message outlives its sender's user row
    let mut stmt = conn.prepare(
        "SELECT m.id, m.sender_id, m.recipient_id, u.username, m.message, m.sent_at
         FROM messages m
         LEFT JOIN users u ON u.user_id = m.sender_id
         WHERE (m.sender_id = ?1 AND m.recipient_id = ?2)
            OR (m.sender_id = ?2 AND m.recipient_id = ?1)
         ORDER BY m.sent_at ASC, m.id ASC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![a, b], |row| {
            Ok(MessageRow {
                id: row.get(0)?,
                sender_id: row.get(1)?,
                recipient_id: row.get(2)?,
                sender_username: row
                    .get::<_, Option<String>>(3)?
                    .unwrap_or_else(|| "unknown".to_string()),
                body: row.get(4)?,
                sent_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Database, i64, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice").unwrap();
        let bob = db.create_user("bob").unwrap();
        let carol = db.create_user("carol").unwrap();
        (db, alice, bob, carol)
    }

    fn names(rows: &[UserRow]) -> Vec<&str> {
        rows.iter().map(|r| r.username.as_str()).collect()
    }

    #[test]
    fn list_users_excludes_caller_and_sorts() {
        let (db, alice, _, _) = seeded();
        db.create_user("Bea").unwrap();
        let rows = db.list_users(alice, None).unwrap();
        assert_eq!(names(&rows), vec!["Bea", "bob", "carol"]);
    }

    #[test]
    fn list_users_filter_is_case_insensitive_substring() {
        let (db, alice, bob, _) = seeded();
        assert_eq!(names(&db.list_users(bob, Some("al")).unwrap()), vec!["alice"]);
        assert_eq!(names(&db.list_users(bob, Some("AL")).unwrap()), vec!["alice"]);
        assert!(db.list_users(alice, Some("al")).unwrap().is_empty());
        // blank filter means no filter
        assert_eq!(db.list_users(bob, Some("  ")).unwrap().len(), 2);
    }

    #[test]
    fn list_users_filter_treats_wildcards_literally() {
        let (db, alice, _, _) = seeded();
        assert!(db.list_users(alice, Some("%")).unwrap().is_empty());
        assert!(db.list_users(alice, Some("_")).unwrap().is_empty());
        db.create_user("under_score").unwrap();
        assert_eq!(names(&db.list_users(alice, Some("_")).unwrap()), vec!["under_score"]);
    }

    #[test]
    fn list_users_folds_case_beyond_ascii() {
        let (db, _, bob, _) = seeded();
        db.create_user("Örjan").unwrap();
        db.create_user("Élodie").unwrap();

        assert_eq!(names(&db.list_users(bob, Some("él")).unwrap()), vec!["Élodie"]);
        assert_eq!(names(&db.list_users(bob, Some("ÖR")).unwrap()), vec!["Örjan"]);
        assert_eq!(
            names(&db.list_users(bob, None).unwrap()),
            vec!["alice", "carol", "Élodie", "Örjan"]
        );
    }

    #[test]
    fn conversation_covers_both_directions_only() {
        let (db, alice, bob, carol) = seeded();
        db.insert_message(alice, bob, "hi bob").unwrap();
        db.insert_message(bob, alice, "hi alice").unwrap();
        db.insert_message(alice, carol, "hi carol").unwrap();

        let from_alice = db.get_conversation(alice, bob).unwrap();
        let from_bob = db.get_conversation(bob, alice).unwrap();
        assert_eq!(from_alice.len(), 2);
        assert_eq!(from_bob.len(), 2);
        assert_eq!(from_alice[0].body, "hi bob");
        assert_eq!(from_alice[0].sender_username, "alice");
        assert_eq!(from_alice[1].sender_id, bob);
        assert_eq!(from_alice[1].recipient_id, alice);
    }

    #[test]
    fn conversation_orders_by_sent_at_then_id() {
        let (db, alice, bob, _) = seeded();
        let first = db.insert_message(alice, bob, "first").unwrap();
        let second = db.insert_message(bob, alice, "second").unwrap();
        let older = db.insert_message(alice, bob, "older").unwrap();

        db.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET sent_at = '2026-01-01 10:00:00.000' WHERE id IN (?1, ?2)",
                [first, second],
            )?;
            conn.execute(
                "UPDATE messages SET sent_at = '2025-12-31 23:59:59.999' WHERE id = ?1",
                [older],
            )?;
            Ok(())
        })
        .unwrap();

        let ids: Vec<i64> = db.get_conversation(alice, bob).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![older, first, second]);
    }

    #[test]
    fn update_requires_original_sender() {
        let (db, alice, bob, _) = seeded();
        let id = db.insert_message(alice, bob, "mine").unwrap();

        assert!(!db.update_message_body(id, bob, "hijacked").unwrap());
        assert!(!db.update_message_body(id + 100, alice, "ghost").unwrap());
        assert_eq!(db.get_conversation(alice, bob).unwrap()[0].body, "mine");

        assert!(db.update_message_body(id, alice, "edited").unwrap());
        assert_eq!(db.get_conversation(alice, bob).unwrap()[0].body, "edited");
    }

    #[test]
    fn rewriting_same_body_still_matches() {
        let (db, alice, bob, _) = seeded();
        let id = db.insert_message(alice, bob, "bye").unwrap();
        assert!(db.update_message_body(id, alice, "Message unsent").unwrap());
        assert!(db.update_message_body(id, alice, "Message unsent").unwrap());
    }

    #[test]
    fn self_conversation_is_allowed() {
        let (db, alice, _, _) = seeded();
        db.insert_message(alice, alice, "note to self").unwrap();
        assert_eq!(db.get_conversation(alice, alice).unwrap().len(), 1);
    }
}
