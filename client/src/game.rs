//! Client-side mirror of the game.
//!
//! The server is authoritative, so the client never predicts anything: it
//! applies every server message in order to a local copy of the map, its own
//! player's stats, the scoreboard and the chat log.

use shared::{CellChange, Happening, PlayerSnapshot, Position, Score, ServerMessage};
use std::collections::BTreeMap;

/// Chat lines kept for display.
pub const CHAT_HISTORY: usize = 100;

#[derive(Debug, Default, Clone)]
pub struct ClientView {
    map: Vec<Vec<String>>,
    player: PlayerSnapshot,
    scoreboard: BTreeMap<String, Score>,
    chat_log: Vec<String>,
    dead: bool,
}

impl ClientView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a server message and returns the chat line it produced, if any.
    ///
    /// The player diff is merged first so the happening is interpreted
    /// against the player's state after the change.
    pub fn apply(&mut self, message: &ServerMessage) -> Option<String> {
        message.player.merge_into(&mut self.player);
        if self.player.position.is_some() {
            self.dead = false;
        }

        let line = match &message.happening {
            Happening::Map { data } => {
                self.map = data.clone();
                None
            }
            Happening::Join { data } => {
                self.update_cells(data);
                data.first().map(|c| format!("Player {} joined", c.what))
            }
            Happening::Changes { data } => {
                self.update_cells(data);
                None
            }
            Happening::Scoreboard { data } => {
                self.scoreboard = data.clone();
                None
            }
            Happening::Kill { killer, victim } => {
                if self.is_own_number(victim) {
                    // the diff already carries the reset stats
                    self.player.health = 0;
                    self.dead = true;
                }
                Some(match killer {
                    None => format!("Player {} left", victim),
                    Some(killer) if killer.parse::<u32>().is_err() => {
                        format!("Player {} died", victim)
                    }
                    Some(killer) => format!("Player {} killed player {}", killer, victim),
                })
            }
            Happening::Chat { data } => Some(format!("Player {}: {}", data.who, data.message)),
        };

        if let Some(line) = &line {
            self.chat_log.push(line.clone());
            if self.chat_log.len() > CHAT_HISTORY {
                let overflow = self.chat_log.len() - CHAT_HISTORY;
                self.chat_log.drain(..overflow);
            }
        }
        line
    }

    fn is_own_number(&self, symbol: &str) -> bool {
        match (self.player.number, symbol.parse::<u32>()) {
            (Some(own), Ok(number)) => own == number,
            _ => false,
        }
    }

    fn update_cells(&mut self, changes: &[CellChange]) {
        for change in changes {
            let at = change.position();
            if let Some(cell) = self.map.get_mut(at.y).and_then(|row| row.get_mut(at.x)) {
                cell.clone_from(&change.what);
            }
        }
    }

    pub fn cell(&self, at: Position) -> Option<&str> {
        self.map
            .get(at.y)
            .and_then(|row| row.get(at.x))
            .map(String::as_str)
    }

    pub fn player(&self) -> &PlayerSnapshot {
        &self.player
    }

    pub fn scoreboard(&self) -> &BTreeMap<String, Score> {
        &self.scoreboard
    }

    pub fn chat_log(&self) -> &[String] {
        &self.chat_log
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// The map as printable rows. Damage and kill markers show only their
    /// last character.
    pub fn map_text(&self) -> String {
        self.map
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.chars().last().unwrap_or(' '))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ChatLine, PlayerDiff};

    fn message(happening: Happening, player: PlayerDiff) -> ServerMessage {
        ServerMessage { happening, player }
    }

    fn map_message() -> ServerMessage {
        let rows = ["###", "# #", "###"];
        message(
            Happening::Map {
                data: rows
                    .iter()
                    .map(|r| r.chars().map(String::from).collect())
                    .collect(),
            },
            PlayerDiff {
                number: Some(1),
                health: Some(10),
                strength: Some(1),
                damaged: Some(false),
                kills: Some(0),
                deaths: Some(0),
                position: Some(Some(Position::new(1, 1))),
            },
        )
    }

    #[test]
    fn test_map_then_changes() {
        let mut view = ClientView::new();
        view.apply(&map_message());
        assert_eq!(view.cell(Position::new(1, 1)), Some(" "));
        assert_eq!(view.player().number, Some(1));

        view.apply(&message(
            Happening::Changes {
                data: vec![
                    CellChange::new(Position::new(1, 1), "d1"),
                    CellChange::new(Position::new(9, 9), "Z"),
                ],
            },
            PlayerDiff {
                health: Some(7),
                ..Default::default()
            },
        ));
        assert_eq!(view.cell(Position::new(1, 1)), Some("d1"));
        assert_eq!(view.cell(Position::new(9, 9)), None);
        assert_eq!(view.player().health, 7);
        assert_eq!(view.map_text(), "###\n#1#\n###");
    }

    #[test]
    fn test_join_announces_player() {
        let mut view = ClientView::new();
        view.apply(&map_message());
        let line = view.apply(&message(
            Happening::Join {
                data: vec![CellChange::new(Position::new(1, 1), "2")],
            },
            PlayerDiff::default(),
        ));
        assert_eq!(line.as_deref(), Some("Player 2 joined"));
        assert_eq!(view.cell(Position::new(1, 1)), Some("2"));
    }

    #[test]
    fn test_kill_lines() {
        let mut view = ClientView::new();
        let kill = |killer: Option<&str>, victim: &str| {
            message(
                Happening::Kill {
                    killer: killer.map(String::from),
                    victim: victim.to_string(),
                },
                PlayerDiff::default(),
            )
        };

        view.apply(&kill(None, "3"));
        view.apply(&kill(Some("Z"), "4"));
        view.apply(&kill(Some("2"), "5"));

        assert_eq!(
            view.chat_log(),
            &[
                "Player 3 left".to_string(),
                "Player 4 died".to_string(),
                "Player 2 killed player 5".to_string(),
            ]
        );
        assert!(!view.is_dead());
    }

    #[test]
    fn test_own_death_and_respawn() {
        let mut view = ClientView::new();
        view.apply(&map_message());

        view.apply(&message(
            Happening::Kill {
                killer: Some("Z".to_string()),
                victim: "1".to_string(),
            },
            PlayerDiff {
                health: Some(10),
                deaths: Some(1),
                position: Some(None),
                ..Default::default()
            },
        ));
        assert!(view.is_dead());
        assert_eq!(view.player().health, 0);
        assert_eq!(view.player().deaths, 1);

        view.apply(&message(
            Happening::Join {
                data: vec![CellChange::new(Position::new(1, 1), "1")],
            },
            PlayerDiff {
                health: Some(10),
                position: Some(Some(Position::new(1, 1))),
                ..Default::default()
            },
        ));
        assert!(!view.is_dead());
        assert_eq!(view.player().health, 10);
    }

    #[test]
    fn test_scoreboard_and_chat() {
        let mut view = ClientView::new();
        let mut scores = BTreeMap::new();
        scores.insert("1".to_string(), Score { kills: 2, deaths: 1 });
        view.apply(&message(
            Happening::Scoreboard {
                data: scores.clone(),
            },
            PlayerDiff::default(),
        ));
        assert_eq!(view.scoreboard(), &scores);

        let line = view.apply(&message(
            Happening::Chat {
                data: ChatLine {
                    message: "gg".to_string(),
                    who: "1".to_string(),
                },
            },
            PlayerDiff::default(),
        ));
        assert_eq!(line.as_deref(), Some("Player 1: gg"));
    }

    #[test]
    fn test_chat_history_is_bounded() {
        let mut view = ClientView::new();
        for i in 0..CHAT_HISTORY + 5 {
            view.apply(&message(
                Happening::Chat {
                    data: ChatLine {
                        message: i.to_string(),
                        who: "1".to_string(),
                    },
                },
                PlayerDiff::default(),
            ));
        }
        assert_eq!(view.chat_log().len(), CHAT_HISTORY);
        assert_eq!(view.chat_log()[0], "Player 1: 5");
    }
}
