//! Operation codes.

use std::fmt;

/// Reserved response op marking an error; the payload is a diagnostic string.
pub const ERROR_OP: i32 = -1;

/// Request operations understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Op {
    /// Liveness check, empty response.
    Ping = 0,
    /// Names of connected players.
    ListUsers = 1,
    /// Name of the loaded world.
    WorldName = 2,
    /// Connection quality figures.
    NetworkStats = 3,
    /// Process start time in epoch milliseconds.
    StartTime = 4,
    /// World name followed by the player list.
    Status = 5,
    /// Sends a chat message to all players.
    Broadcast = 6,
}

impl Op {
    pub const ALL: [Op; 7] = [
        Op::Ping,
        Op::ListUsers,
        Op::WorldName,
        Op::NetworkStats,
        Op::StartTime,
        Op::Status,
        Op::Broadcast,
    ];

    /// Returns the wire value.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Resolves a wire value, `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Op> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Ping => "PING",
            Op::ListUsers => "LIST_USERS",
            Op::WorldName => "WORLD_NAME",
            Op::NetworkStats => "NETWORK_STATS",
            Op::StartTime => "START_TIME",
            Op::Status => "STATUS",
            Op::Broadcast => "BROADCAST",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
