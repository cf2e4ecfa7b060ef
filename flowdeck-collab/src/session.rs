//! Collaboration session state — who is online, and where their cursors are.
//!
//! `SessionState` is the synchronous core of the collaboration layer: it
//! consumes decoded [`WireMessage`]s and maintains the online-user roster
//! and the per-user cursor map, emitting high-level [`SessionEvent`]s for
//! the editor to consume. It owns no I/O, which keeps the whole presence
//! state machine testable without a socket.
//!
//! Rules:
//!
//! * Roster frames (`USER_JOINED`/`USER_LEFT`) replace the roster wholesale
//!   with the server's list — including the echo of our own join.
//! * Mutation and cursor frames attributed to the local user are dropped
//!   (local echo suppression): a client never applies its own outbound
//!   update as a remote delta.
//! * Cursors are last-write-wins per user; out-of-order delivery simply
//!   overwrites. A leaving user takes their cursor with them.
//! * `clear()` empties everything — called on any disconnect.

use std::collections::HashMap;

use flowdeck_core::graph::RemoteDelta;

use crate::protocol::{CollaborationUser, WireMessage};

/// Ephemeral remote cursor, last-write-wins per user.
#[derive(Debug, Clone, PartialEq)]
pub struct CollaborationCursor {
    pub user_id: String,
    pub username: String,
    pub x: f32,
    pub y: f32,
}

/// High-level events surfaced to the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Channel established (includes reconnects).
    Connected,
    /// Channel lost or closed; session state has been cleared.
    Disconnected,
    /// A user joined; the roster has been updated.
    UserJoined { user_id: String, username: String },
    /// A user left; the roster and their cursor have been updated.
    UserLeft { user_id: String },
    /// A graph mutation from a collaborator, ready for
    /// `EditorState::apply_remote_delta`.
    Delta {
        delta: RemoteDelta,
        from_user: String,
    },
    /// A collaborator's cursor moved.
    CursorMoved(CollaborationCursor),
    /// Transport or server-reported error. Does not terminate the session.
    Error { message: String },
}

/// Online roster + cursor map for one (entity, user) session.
#[derive(Debug)]
pub struct SessionState {
    local_user_id: String,
    users: Vec<CollaborationUser>,
    cursors: HashMap<String, CollaborationCursor>,
}

impl SessionState {
    pub fn new(local_user_id: impl Into<String>) -> Self {
        Self {
            local_user_id: local_user_id.into(),
            users: Vec::new(),
            cursors: HashMap::new(),
        }
    }

    /// Apply one inbound frame, returning the event to surface (if any).
    pub fn handle_message(&mut self, msg: &WireMessage) -> Option<SessionEvent> {
        match msg {
            WireMessage::UserJoined {
                user_id,
                username,
                users,
            } => {
                self.users = users.clone();
                Some(SessionEvent::UserJoined {
                    user_id: user_id.clone(),
                    username: username.clone(),
                })
            }

            WireMessage::UserLeft { user_id, users } => {
                self.users = users.clone();
                self.cursors.remove(user_id);
                Some(SessionEvent::UserLeft {
                    user_id: user_id.clone(),
                })
            }

            WireMessage::NodeUpdated { node, user_id } => self
                .from_remote(user_id)
                .then(|| SessionEvent::Delta {
                    delta: RemoteDelta::NodeUpsert(node.clone()),
                    from_user: user_id.clone(),
                }),

            WireMessage::EdgeUpdated { edge, user_id } => self
                .from_remote(user_id)
                .then(|| SessionEvent::Delta {
                    delta: RemoteDelta::EdgeUpsert(edge.clone()),
                    from_user: user_id.clone(),
                }),

            WireMessage::NodeDeleted { node_id, user_id } => self
                .from_remote(user_id)
                .then(|| SessionEvent::Delta {
                    delta: RemoteDelta::NodeDelete(node_id.clone()),
                    from_user: user_id.clone(),
                }),

            WireMessage::EdgeDeleted { edge_id, user_id } => self
                .from_remote(user_id)
                .then(|| SessionEvent::Delta {
                    delta: RemoteDelta::EdgeDelete(edge_id.clone()),
                    from_user: user_id.clone(),
                }),

            WireMessage::CursorMoved {
                user_id,
                username,
                x,
                y,
            } => {
                if !self.from_remote(user_id) {
                    return None;
                }
                let cursor = CollaborationCursor {
                    user_id: user_id.clone(),
                    username: username.clone(),
                    x: *x,
                    y: *y,
                };
                self.cursors.insert(user_id.clone(), cursor.clone());
                Some(SessionEvent::CursorMoved(cursor))
            }

            WireMessage::Error { message } => Some(SessionEvent::Error {
                message: message.clone(),
            }),

            WireMessage::HbAck => None,

            // Client→server frames arriving inbound would be a server bug;
            // ignore them rather than corrupt state.
            other => {
                log::warn!("ignoring unexpected inbound frame: {other:?}");
                None
            }
        }
    }

    /// True when the frame's author is someone other than ourselves.
    fn from_remote(&self, user_id: &str) -> bool {
        user_id != self.local_user_id
    }

    /// Drop all session state (roster + cursors).
    pub fn clear(&mut self) {
        self.users.clear();
        self.cursors.clear();
    }

    pub fn local_user_id(&self) -> &str {
        &self.local_user_id
    }

    pub fn users(&self) -> &[CollaborationUser] {
        &self.users
    }

    pub fn cursors(&self) -> Vec<CollaborationCursor> {
        let mut all: Vec<CollaborationCursor> = self.cursors.values().cloned().collect();
        all.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        all
    }

    pub fn cursor_of(&self, user_id: &str) -> Option<&CollaborationCursor> {
        self.cursors.get(user_id)
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::graph::NodePatch;

    fn roster(ids: &[(&str, &str)]) -> Vec<CollaborationUser> {
        ids.iter()
            .map(|(id, name)| CollaborationUser::new(*id, *name))
            .collect()
    }

    #[test]
    fn test_join_then_leave_restores_roster() {
        let mut s = SessionState::new("u1");

        s.handle_message(&WireMessage::UserJoined {
            user_id: "u1".into(),
            username: "John".into(),
            users: roster(&[("u1", "John")]),
        });
        let before = s.users().to_vec();

        // u2 joins, moves a cursor, and leaves again.
        s.handle_message(&WireMessage::UserJoined {
            user_id: "u2".into(),
            username: "Jane".into(),
            users: roster(&[("u1", "John"), ("u2", "Jane")]),
        });
        s.handle_message(&WireMessage::CursorMoved {
            user_id: "u2".into(),
            username: "Jane".into(),
            x: 10.0,
            y: 20.0,
        });
        assert_eq!(s.users().len(), 2);
        assert!(s.cursor_of("u2").is_some());

        s.handle_message(&WireMessage::UserLeft {
            user_id: "u2".into(),
            users: roster(&[("u1", "John")]),
        });

        assert_eq!(s.users(), before.as_slice());
        assert!(s.cursor_of("u2").is_none());
    }

    #[test]
    fn test_cursor_last_write_wins() {
        let mut s = SessionState::new("u1");
        for (x, y) in [(1.0, 1.0), (50.0, 60.0), (7.0, 8.0)] {
            s.handle_message(&WireMessage::CursorMoved {
                user_id: "u2".into(),
                username: "Jane".into(),
                x,
                y,
            });
        }
        let cursor = s.cursor_of("u2").unwrap();
        assert_eq!((cursor.x, cursor.y), (7.0, 8.0));
        assert_eq!(s.cursors().len(), 1);
    }

    #[test]
    fn test_own_delta_is_suppressed() {
        let mut s = SessionState::new("u1");

        let own = s.handle_message(&WireMessage::NodeUpdated {
            node: NodePatch::for_id("n1"),
            user_id: "u1".into(),
        });
        assert!(own.is_none());

        let remote = s.handle_message(&WireMessage::NodeUpdated {
            node: NodePatch::for_id("n1"),
            user_id: "u2".into(),
        });
        assert!(matches!(remote, Some(SessionEvent::Delta { from_user, .. }) if from_user == "u2"));
    }

    #[test]
    fn test_own_cursor_is_suppressed() {
        let mut s = SessionState::new("u1");
        let event = s.handle_message(&WireMessage::CursorMoved {
            user_id: "u1".into(),
            username: "John".into(),
            x: 1.0,
            y: 1.0,
        });
        assert!(event.is_none());
        assert!(s.cursors().is_empty());
    }

    #[test]
    fn test_roster_applies_even_for_own_join_echo() {
        let mut s = SessionState::new("u1");
        s.handle_message(&WireMessage::UserJoined {
            user_id: "u1".into(),
            username: "John".into(),
            users: roster(&[("u1", "John")]),
        });
        assert_eq!(s.users().len(), 1);
    }

    #[test]
    fn test_delete_deltas_map_through() {
        let mut s = SessionState::new("u1");
        let event = s.handle_message(&WireMessage::EdgeDeleted {
            edge_id: "e9".into(),
            user_id: "u3".into(),
        });
        assert_eq!(
            event,
            Some(SessionEvent::Delta {
                delta: RemoteDelta::EdgeDelete("e9".into()),
                from_user: "u3".into(),
            })
        );
    }

    #[test]
    fn test_error_frame_surfaces_without_clearing() {
        let mut s = SessionState::new("u1");
        s.handle_message(&WireMessage::UserJoined {
            user_id: "u2".into(),
            username: "Jane".into(),
            users: roster(&[("u1", "John"), ("u2", "Jane")]),
        });

        let event = s.handle_message(&WireMessage::Error {
            message: "room full".into(),
        });
        assert!(matches!(event, Some(SessionEvent::Error { .. })));
        assert_eq!(s.users().len(), 2); // session survives errors
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut s = SessionState::new("u1");
        s.handle_message(&WireMessage::UserJoined {
            user_id: "u2".into(),
            username: "Jane".into(),
            users: roster(&[("u2", "Jane")]),
        });
        s.handle_message(&WireMessage::CursorMoved {
            user_id: "u2".into(),
            username: "Jane".into(),
            x: 5.0,
            y: 5.0,
        });

        s.clear();
        assert!(s.users().is_empty());
        assert!(s.cursors().is_empty());
    }

    #[test]
    fn test_inbound_client_frame_ignored() {
        let mut s = SessionState::new("u1");
        let event = s.handle_message(&WireMessage::Hb);
        assert!(event.is_none());
    }
}
