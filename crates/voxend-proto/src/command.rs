//! Connection states and the state-gated command tables.
//!
//! Each connection state is an independent bit so a command's legality
//! is a bitmask test rather than a single-state comparison. Command id
//! 0 is reserved in both directions; dispatch loops treat it (and any
//! unknown id) as a protocol error fatal to the connection.

use std::ops::BitOr;

/// Per-connection lifecycle state. `Disconnected` is terminal and
/// never dispatch-reachable, so it has no bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    Authenticating,
    Active,
}

impl ConnectionState {
    pub const fn mask(self) -> StateMask {
        StateMask(match self {
            ConnectionState::Created => 1,
            ConnectionState::Authenticating => 1 << 1,
            ConnectionState::Active => 1 << 2,
        })
    }
}

/// Set of connection states in which a command is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMask(pub u8);

impl StateMask {
    pub const NONE: StateMask = StateMask(0);

    /// The "good" check: is the command legal in `state`?
    pub fn permits(self, state: ConnectionState) -> bool {
        self.0 & state.mask().0 != 0
    }
}

impl BitOr for StateMask {
    type Output = StateMask;
    fn bitor(self, rhs: StateMask) -> StateMask {
        StateMask(self.0 | rhs.0)
    }
}

impl BitOr for ConnectionState {
    type Output = StateMask;
    fn bitor(self, rhs: ConnectionState) -> StateMask {
        self.mask() | rhs.mask()
    }
}

impl BitOr<ConnectionState> for StateMask {
    type Output = StateMask;
    fn bitor(self, rhs: ConnectionState) -> StateMask {
        self | rhs.mask()
    }
}

/// Expands a literal `{id, name, allowed-states}` table into a command
/// enum with lookup accessors. Id 0 never appears in a table, so
/// `from_id(0)` always misses.
macro_rules! command_table {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $id:literal => $variant:ident, $cname:literal, $allowed:expr; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $( $variant = $id, )+
        }

        impl $name {
            /// Look up a wire id; zero, out-of-range, and reserved
            /// slots all miss.
            pub fn from_id(id: u8) -> Option<Self> {
                match id {
                    $( $id => Some(Self::$variant), )+
                    _ => None,
                }
            }

            pub fn id(self) -> u8 {
                self as u8
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $cname, )+
                }
            }

            pub fn allowed(self) -> StateMask {
                match self {
                    $( Self::$variant => $allowed, )+
                }
            }
        }
    };
}

use ConnectionState::{Active, Authenticating, Created};

command_table! {
    /// Commands a client sends to the server.
    pub enum ServerBound {
        1 => Disconnect, "DISCONNECT", Created | Authenticating | Active;
        2 => Auth, "AUTH", Authenticating.mask();
        3 => Move, "MOVE", Active.mask();
    }
}

command_table! {
    /// Commands the server sends to a client.
    pub enum ClientBound {
        1 => Disconnect, "DISCONNECT", Created | Authenticating | Active;
        2 => Auth, "AUTH", Authenticating.mask();
        3 => Block, "BLOCK", Active.mask();
        4 => WorldInfo, "WORLD_INFO", Authenticating | Active;
        5 => TimeOfDay, "TIME_OF_DAY", Authenticating | Active;
        6 => Movement, "MOVEMENT", Authenticating | Active;
        7 => EntityAdd, "ENTITY_ADD", Authenticating | Active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_unknown_ids_miss() {
        assert!(ServerBound::from_id(0).is_none());
        assert!(ServerBound::from_id(4).is_none());
        assert!(ServerBound::from_id(u8::MAX).is_none());
        assert!(ClientBound::from_id(0).is_none());
        assert!(ClientBound::from_id(8).is_none());
    }

    #[test]
    fn ids_roundtrip() {
        for id in 1..=3u8 {
            assert_eq!(ServerBound::from_id(id).unwrap().id(), id);
        }
        for id in 1..=7u8 {
            assert_eq!(ClientBound::from_id(id).unwrap().id(), id);
        }
    }

    #[test]
    fn state_gating() {
        // DISCONNECT is legal everywhere.
        for state in [Created, Authenticating, Active] {
            assert!(ServerBound::Disconnect.allowed().permits(state));
        }
        // AUTH only while authenticating.
        assert!(ServerBound::Auth.allowed().permits(Authenticating));
        assert!(!ServerBound::Auth.allowed().permits(Created));
        assert!(!ServerBound::Auth.allowed().permits(Active));
        // BLOCK only while active.
        assert!(ClientBound::Block.allowed().permits(Active));
        assert!(!ClientBound::Block.allowed().permits(Authenticating));
    }

    #[test]
    fn names() {
        assert_eq!(ServerBound::Auth.name(), "AUTH");
        assert_eq!(ClientBound::Block.name(), "BLOCK");
    }

    #[test]
    fn empty_mask_permits_nothing() {
        for state in [Created, Authenticating, Active] {
            assert!(!StateMask::NONE.permits(state));
        }
    }
}
