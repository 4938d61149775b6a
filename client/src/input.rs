//! Line commands typed by the player, turned into client messages

use shared::{Action, ChatRequest, ClientMessage, Direction, MoveIntent};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{0}' needs a direction")]
    MissingDirection(String),
    #[error("unknown direction '{0}'")]
    BadDirection(String),
}

/// Parses one line of input.
///
/// `w`/`a`/`s`/`d` move one cell; `move <dir>` and `attack <dir>` take a
/// compass direction such as `n` or `north`, `ne`; `say <text>` chats;
/// `map` and `join` are sent as they are.
pub fn parse_command(line: &str) -> Result<ClientMessage, CommandError> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "" => Err(CommandError::Empty),
        "w" => Ok(movement(Action::Move, Direction::N)),
        "a" => Ok(movement(Action::Move, Direction::W)),
        "s" => Ok(movement(Action::Move, Direction::S)),
        "d" => Ok(movement(Action::Move, Direction::E)),
        "move" | "attack" => {
            let action = if command.eq_ignore_ascii_case("move") {
                Action::Move
            } else {
                Action::Attack
            };
            if rest.is_empty() {
                return Err(CommandError::MissingDirection(command.to_string()));
            }
            let direction =
                parse_direction(rest).ok_or_else(|| CommandError::BadDirection(rest.to_string()))?;
            Ok(movement(action, direction))
        }
        "map" => Ok(ClientMessage::Map {}),
        "join" => Ok(ClientMessage::Join {}),
        "say" => Ok(ClientMessage::Chat(ChatRequest {
            message: rest.to_string(),
        })),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn movement(action: Action, direction: Direction) -> ClientMessage {
    ClientMessage::Move(MoveIntent { action, direction })
}

pub fn parse_direction(text: &str) -> Option<Direction> {
    let direction = match text.trim().to_ascii_lowercase().as_str() {
        "n" | "north" | "up" => Direction::N,
        "s" | "south" | "down" => Direction::S,
        "e" | "east" | "right" => Direction::E,
        "w" | "west" | "left" => Direction::W,
        "nw" | "northwest" => Direction::NW,
        "ne" | "northeast" => Direction::NE,
        "sw" | "southwest" => Direction::SW,
        "se" | "southeast" => Direction::SE,
        _ => return None,
    };
    Some(direction)
}
