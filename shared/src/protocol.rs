//! Message types exchanged between the game server and its clients.
//!
//! Requests are `{"type": ..., "data": ...}` objects. Server messages are a
//! flattened [`Happening`] plus a `player` object carrying the fields of the
//! receiving client's own player that changed since the previous message.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const GROUND_SYMBOL: &str = " ";
pub const WALL_SYMBOL: &str = "#";
pub const ZOMBIE_SYMBOL: &str = "Z";
/// Prefix marking a cell whose occupant was just hit.
pub const DAMAGED_PREFIX: char = 'd';
/// Prefix marking the cell of an occupant at the moment it is killed.
pub const FINISHER_PREFIX: char = 'f';

/// Grid coordinates, `x` is the column and `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Move,
    Attack,
}

/// Compass direction of a move or attack. Rows grow southwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    N,
    S,
    E,
    W,
    NW,
    NE,
    SW,
    SE,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::N,
        Direction::S,
        Direction::E,
        Direction::W,
        Direction::NW,
        Direction::NE,
        Direction::SW,
        Direction::SE,
    ];

    /// Column and row offset of the neighbouring cell in this direction.
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::N => (0, -1),
            Direction::S => (0, 1),
            Direction::E => (1, 0),
            Direction::W => (-1, 0),
            Direction::NW => (-1, -1),
            Direction::NE => (1, -1),
            Direction::SW => (-1, 1),
            Direction::SE => (1, 1),
        }
    }

    pub fn is_diagonal(self) -> bool {
        let (dx, dy) = self.offset();
        dx != 0 && dy != 0
    }

    /// Direction pointing along the sign of the given delta, `None` for (0, 0).
    pub fn from_delta(dx: isize, dy: isize) -> Option<Direction> {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Some(Direction::N),
            (0, 1) => Some(Direction::S),
            (1, 0) => Some(Direction::E),
            (-1, 0) => Some(Direction::W),
            (-1, -1) => Some(Direction::NW),
            (1, -1) => Some(Direction::NE),
            (-1, 1) => Some(Direction::SW),
            (1, 1) => Some(Direction::SE),
            _ => None,
        }
    }

    /// Neighbour of `from` in this direction, if it lies inside a
    /// `width` x `height` grid.
    pub fn step(self, from: Position, width: usize, height: usize) -> Option<Position> {
        let (dx, dy) = self.offset();
        let x = from.x.checked_add_signed(dx)?;
        let y = from.y.checked_add_signed(dy)?;
        (x < width && y < height).then_some(Position { x, y })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub action: Action,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Place the player on the map if it is not on it, and request the map.
    Join {},
    Move(MoveIntent),
    /// Request a full map snapshot.
    Map {},
    Chat(ChatRequest),
}

impl ClientMessage {
    /// Decodes a request, treating a missing `data` key as an empty payload
    /// so that `{"type":"join"}` is accepted like `{"type":"join","data":{}}`.
    pub fn from_value(mut value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if let Some(object) = value.as_object_mut() {
            object
                .entry("data")
                .or_insert_with(|| serde_json::Value::Object(Default::default()));
        }
        serde_json::from_value(value)
    }
}

/// New symbol shown at a single cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    pub x: usize,
    pub y: usize,
    pub what: String,
}

impl CellChange {
    pub fn new(at: Position, what: impl Into<String>) -> Self {
        Self {
            x: at.x,
            y: at.y,
            what: what.into(),
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub kills: u32,
    pub deaths: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    pub message: String,
    pub who: String,
}

/// A state change published by the world to every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Happening {
    Join {
        data: Vec<CellChange>,
    },
    Changes {
        data: Vec<CellChange>,
    },
    Scoreboard {
        data: BTreeMap<String, Score>,
    },
    Kill {
        /// Absent when the victim left the game.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        killer: Option<String>,
        victim: String,
    },
    Chat {
        data: ChatLine,
    },
    /// Full snapshot, rows of per-cell symbols. Only sent to the requester.
    Map {
        data: Vec<Vec<String>>,
    },
}

/// A message as written to a client's socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    #[serde(flatten)]
    pub happening: Happening,
    #[serde(default)]
    pub player: PlayerDiff,
}

/// Synchronised state of a player, as seen by its own client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub number: Option<u32>,
    pub health: i32,
    pub strength: i32,
    pub damaged: bool,
    pub kills: u32,
    pub deaths: u32,
    pub position: Option<Position>,
}

/// Fields of a [`PlayerSnapshot`] that changed since the last message.
///
/// `position` is doubly optional: the outer `None` means unchanged, while
/// `Some(None)` means the player is no longer on the map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDiff {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damaged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kills: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deaths: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub position: Option<Option<Position>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl PlayerDiff {
    /// Field-by-field difference of `current` against `previous`. With no
    /// previous snapshot every field is reported.
    pub fn between(previous: Option<&PlayerSnapshot>, current: &PlayerSnapshot) -> Self {
        fn changed<T: PartialEq + Clone>(old: Option<&T>, new: &T) -> Option<T> {
            match old {
                Some(old) if old == new => None,
                _ => Some(new.clone()),
            }
        }

        Self {
            number: current
                .number
                .filter(|n| previous.and_then(|p| p.number) != Some(*n)),
            health: changed(previous.map(|p| &p.health), &current.health),
            strength: changed(previous.map(|p| &p.strength), &current.strength),
            damaged: changed(previous.map(|p| &p.damaged), &current.damaged),
            kills: changed(previous.map(|p| &p.kills), &current.kills),
            deaths: changed(previous.map(|p| &p.deaths), &current.deaths),
            position: changed(previous.map(|p| &p.position), &current.position),
        }
    }

    pub fn full(current: &PlayerSnapshot) -> Self {
        Self::between(None, current)
    }

    pub fn is_empty(&self) -> bool {
        *self == PlayerDiff::default()
    }

    /// Applies the changed fields onto a client-side copy of the player.
    pub fn merge_into(&self, player: &mut PlayerSnapshot) {
        if let Some(number) = self.number {
            player.number = Some(number);
        }
        if let Some(health) = self.health {
            player.health = health;
        }
        if let Some(strength) = self.strength {
            player.strength = strength;
        }
        if let Some(damaged) = self.damaged {
            player.damaged = damaged;
        }
        if let Some(kills) = self.kills {
            player.kills = kills;
        }
        if let Some(deaths) = self.deaths {
            player.deaths = deaths;
        }
        if let Some(position) = self.position {
            player.position = position;
        }
    }
}

/// Symbol shown while an occupant is inside its invincibility window.
pub fn damaged_symbol(symbol: &str) -> String {
    format!("{DAMAGED_PREFIX}{symbol}")
}

/// Symbol shown at the moment an occupant is killed.
pub fn finisher_symbol(symbol: &str) -> String {
    format!("{FINISHER_PREFIX}{symbol}")
}

/// Strips the cursor-up/cursor-down escape sequences a terminal may leave in
/// a chat line.
pub fn sanitize_chat(message: &str) -> String {
    message.replace("\x1b[A", "").replace("\x1b[B", "")
}
