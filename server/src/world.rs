//! The authoritative grid world.
//!
//! The world owns everything that changes during a game: the cell grid, the
//! arena of living entities, the scoreboard, the deferred effect queue and
//! the event bus the connections subscribe to. It is driven from a single
//! task, so every mutation runs to completion before the next one starts.
//!
//! Movement and combat live in [`crate::combat`]; this module covers map
//! generation, players joining and leaving, and map snapshots.

use crate::config::WorldConfig;
use crate::entity::{inert_symbol, EntityId, HitId, Inert, Living, Occupant, Strength};
use crate::error::WorldError;
use crate::events::{Delivery, EventBus, SubscriptionId};
use crate::schedule::DeferredQueue;
use crate::scoreboard::Scoreboard;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{sanitize_chat, CellChange, ChatLine, Happening, Position};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct GridWorld {
    pub(crate) width: usize,
    pub(crate) height: usize,
    /// Row-major, exactly `width * height` occupants.
    pub(crate) cells: Vec<Occupant>,
    pub(crate) living: HashMap<EntityId, Living>,
    pub(crate) scoreboard: Scoreboard,
    pub(crate) bus: EventBus,
    pub(crate) deferred: DeferredQueue,
    rng: StdRng,
    /// Invincibility window in milliseconds.
    pub(crate) window: u64,
    next_entity: u64,
    next_hit: HitId,
}

impl GridWorld {
    fn empty(width: usize, height: usize, window: Duration, rng: StdRng) -> Self {
        Self {
            width,
            height,
            cells: Vec::with_capacity(width * height),
            living: HashMap::new(),
            scoreboard: Scoreboard::new(),
            bus: EventBus::new(),
            deferred: DeferredQueue::new(),
            rng,
            window: window.as_millis().try_into().unwrap_or(u64::MAX),
            next_entity: 0,
            next_hit: 0,
        }
    }

    /// Generates a walled map with random interior walls and zombies.
    pub fn generate(config: &WorldConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut world = Self::empty(
            config.width,
            config.height,
            config.invincibility_window,
            rng,
        );
        let wall_chance = config.wall_chance.clamp(0.0, 1.0);
        let zombie_chance = config.zombie_chance.clamp(0.0, 1.0);

        for y in 0..config.height {
            for x in 0..config.width {
                let border = x == 0 || y == 0 || x + 1 == config.width || y + 1 == config.height;
                let id = world.allocate_id();
                let occupant = if border || world.rng.gen_bool(wall_chance) {
                    Occupant::Wall(Inert::new(id))
                } else if world.rng.gen_bool(zombie_chance) {
                    world
                        .living
                        .insert(id, Living::zombie(id, Position::new(x, y)));
                    Occupant::Zombie(id)
                } else {
                    Occupant::Ground(Inert::new(id))
                };
                world.cells.push(occupant);
            }
        }

        info!(
            "Generated {}x{} map with {} zombies",
            config.width,
            config.height,
            world.living.len()
        );
        world
    }

    /// Builds a world from a fixed layout of `#` (wall), ` ` (ground) and
    /// `Z` (zombie) rows.
    pub fn from_rows(rows: &[&str], window: Duration) -> Result<Self, WorldError> {
        let height = rows.len();
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        if width == 0 {
            return Err(WorldError::InvalidLayout("empty map".to_string()));
        }

        let mut world = Self::empty(width, height, window, StdRng::seed_from_u64(0));
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(WorldError::InvalidLayout(format!(
                    "row {} has {} cells, expected {}",
                    y,
                    row.chars().count(),
                    width
                )));
            }
            for (x, symbol) in row.chars().enumerate() {
                let id = world.allocate_id();
                let occupant = match symbol {
                    '#' => Occupant::Wall(Inert::new(id)),
                    ' ' => Occupant::Ground(Inert::new(id)),
                    'Z' => {
                        world
                            .living
                            .insert(id, Living::zombie(id, Position::new(x, y)));
                        Occupant::Zombie(id)
                    }
                    other => {
                        return Err(WorldError::InvalidLayout(format!(
                            "unknown symbol {:?} at ({}, {})",
                            other, x, y
                        )))
                    }
                };
                world.cells.push(occupant);
            }
        }
        Ok(world)
    }

    pub(crate) fn allocate_id(&mut self) -> EntityId {
        self.next_entity += 1;
        EntityId(self.next_entity)
    }

    pub(crate) fn allocate_hit(&mut self) -> HitId {
        self.next_hit += 1;
        self.next_hit
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub(crate) fn index(&self, at: Position) -> usize {
        at.y * self.width + at.x
    }

    pub fn cell(&self, at: Position) -> Option<&Occupant> {
        if at.x < self.width && at.y < self.height {
            self.cells.get(self.index(at))
        } else {
            None
        }
    }

    pub fn player(&self, id: EntityId) -> Option<&Living> {
        self.living.get(&id).filter(|l| l.is_player())
    }

    pub fn living(&self, id: EntityId) -> Option<&Living> {
        self.living.get(&id)
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    /// Plain symbol of the occupant at `at`, without damage markers.
    pub fn symbol_at(&self, at: Position) -> String {
        match self.cell(at) {
            Some(occupant) => self.occupant_symbol(occupant),
            None => String::new(),
        }
    }

    pub(crate) fn occupant_symbol(&self, occupant: &Occupant) -> String {
        if let Some(symbol) = inert_symbol(occupant) {
            return symbol.to_string();
        }
        occupant
            .living()
            .and_then(|id| self.living.get(&id))
            .map(Living::symbol)
            .unwrap_or_default()
    }

    pub(crate) fn strength_at(&self, at: Position) -> Strength {
        match self.cell(at) {
            Some(Occupant::Ground(_)) => Strength::NegInfinity,
            Some(Occupant::Wall(_)) | None => Strength::Infinity,
            Some(Occupant::Zombie(id)) | Some(Occupant::Player(id)) => self
                .living
                .get(id)
                .map(|l| Strength::Finite(l.strength))
                .unwrap_or(Strength::Infinity),
        }
    }

    /// Adds a player to the arena without placing it on the map.
    pub fn spawn_player(&mut self) -> EntityId {
        let id = self.allocate_id();
        self.living.insert(id, Living::player(id));
        id
    }

    pub fn is_on_map(&self, id: EntityId) -> bool {
        self.living
            .get(&id)
            .and_then(|l| l.position)
            .is_some_and(|at| self.cell(at).and_then(Occupant::living) == Some(id))
    }

    /// Places a player on a random ground cell.
    ///
    /// A player that is already on the map stays where it is.
    pub fn join(&mut self, id: EntityId) -> Result<Position, WorldError> {
        let player = self.player(id).ok_or(WorldError::UnknownPlayer(id))?;
        if let Some(at) = player.position {
            return Ok(at);
        }
        if !self.cells.iter().any(Occupant::is_ground) {
            return Err(WorldError::NoFreeCell);
        }

        let at = loop {
            let candidate = Position::new(
                self.rng.gen_range(0..self.width),
                self.rng.gen_range(0..self.height),
            );
            if self.cells[self.index(candidate)].is_ground() {
                break candidate;
            }
        };
        self.join_at(id, at)
    }

    /// Places a player on the given ground cell.
    pub fn join_at(&mut self, id: EntityId, at: Position) -> Result<Position, WorldError> {
        if self.player(id).is_none() {
            return Err(WorldError::UnknownPlayer(id));
        }
        if !self.cell(at).is_some_and(Occupant::is_ground) {
            return Err(WorldError::CellNotFree(at));
        }

        let number = match self.living.get(&id).and_then(|p| p.number) {
            Some(number) => number,
            None => self.free_number(id),
        };
        let index = self.index(at);
        self.cells[index] = Occupant::Player(id);
        if let Some(player) = self.living.get_mut(&id) {
            player.number = Some(number);
            player.position = Some(at);
        }

        let symbol = number.to_string();
        self.scoreboard.add(&symbol);
        info!("Player {} joined at ({}, {})", symbol, at.x, at.y);

        self.publish(Happening::Join {
            data: vec![CellChange::new(at, symbol)],
        });
        self.publish_scoreboard();
        Ok(at)
    }

    fn free_number(&self, id: EntityId) -> u32 {
        (1..)
            .find(|n| {
                !self
                    .living
                    .values()
                    .any(|l| l.id != id && l.number == Some(*n))
            })
            .unwrap_or(u32::MAX)
    }

    /// Removes a player: killed without a killer, struck from the
    /// scoreboard, and dropped from the arena.
    pub fn leave(&mut self, id: EntityId, now: u64) -> Result<(), WorldError> {
        let symbol = self
            .player(id)
            .map(Living::symbol)
            .ok_or(WorldError::UnknownPlayer(id))?;

        self.kill(None, id, now);
        self.scoreboard.remove(&symbol);
        self.publish_scoreboard();
        self.living.remove(&id);
        info!("Player {} left", symbol);
        Ok(())
    }

    /// Current map as rows of cell symbols.
    pub fn snapshot(&self) -> Vec<Vec<String>> {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| {
                row.iter()
                    .map(|o| self.occupant_symbol(o))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Broadcasts a chat line from a player.
    pub fn chat(&mut self, id: EntityId, message: &str) {
        let Some(who) = self.player(id).map(Living::symbol) else {
            return;
        };
        let message = sanitize_chat(message);
        debug!("Player {} says {:?}", who, message);
        self.publish(Happening::Chat {
            data: ChatLine { message, who },
        });
    }

    /// Sends the full map to one subscriber only.
    pub fn send_map(&mut self, subscription: SubscriptionId) -> bool {
        let map = Happening::Map {
            data: self.snapshot(),
        };
        self.bus.send_to(subscription, map, &self.living)
    }

    pub fn subscribe(
        &mut self,
        player: EntityId,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<Delivery>) {
        self.bus.subscribe(player)
    }

    pub fn attach(
        &mut self,
        player: EntityId,
        sender: mpsc::UnboundedSender<Delivery>,
    ) -> SubscriptionId {
        self.bus.attach(player, sender)
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        self.bus.unsubscribe(subscription)
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.len()
    }

    pub(crate) fn publish(&mut self, happening: Happening) {
        self.bus.publish(happening, &self.living);
    }

    pub(crate) fn publish_scoreboard(&mut self) {
        let data = self.scoreboard.snapshot();
        self.publish(Happening::Scoreboard { data });
    }
}
