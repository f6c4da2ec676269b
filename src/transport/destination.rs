use std::fmt;

use crate::domain::ids::RoomId;

/// Application destinations a room session publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Join(RoomId),
    Read(RoomId),
    Send(RoomId),
    Leave(RoomId),
}

impl Destination {
    pub fn room_id(self) -> RoomId {
        match self {
            Self::Join(room_id)
            | Self::Read(room_id)
            | Self::Send(room_id)
            | Self::Leave(room_id) => room_id,
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Read(_) => "read",
            Self::Send(_) => "send",
            Self::Leave(_) => "leave",
        }
    }

    pub fn path(self) -> String {
        format!("/app/chat/{}/{}", self.action(), self.room_id())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Topic carrying message frames for a room.
pub fn room_topic(room_id: RoomId) -> String {
    format!("/topic/room/{room_id}")
}

/// Topic carrying read receipts for a room.
pub fn read_topic(room_id: RoomId) -> String {
    format!("/topic/room/{room_id}/read")
}
