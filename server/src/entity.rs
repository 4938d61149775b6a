use shared::{
    PlayerSnapshot, Position, GROUND_SYMBOL, PLAYER_HEALTH, PLAYER_STRENGTH, WALL_SYMBOL,
    ZOMBIE_HEALTH, ZOMBIE_STRENGTH, ZOMBIE_SYMBOL,
};

// Identity of anything that can occupy a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

// Sequence number of a single hit, stored in the damage mark it sets
pub type HitId = u64;

/// Strength or health extended with the two infinities.
///
/// Variants are declared in ascending order so the derived `Ord` places
/// ground below every living entity and walls above every living entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strength {
    NegInfinity,
    Finite(i32),
    Infinity,
}

// Ground or wall cell: no stats beyond its identity and damage mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inert {
    pub id: EntityId,
    pub damage: Option<HitId>,
}

impl Inert {
    pub fn new(id: EntityId) -> Self {
        Inert { id, damage: None }
    }
}

// Contents of one grid cell. Living occupants point into the world's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Ground(Inert),
    Wall(Inert),
    Zombie(EntityId),
    Player(EntityId),
}

impl Occupant {
    pub fn id(&self) -> EntityId {
        match self {
            Occupant::Ground(inert) | Occupant::Wall(inert) => inert.id,
            Occupant::Zombie(id) | Occupant::Player(id) => *id,
        }
    }

    pub fn living(&self) -> Option<EntityId> {
        match self {
            Occupant::Zombie(id) | Occupant::Player(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, Occupant::Ground(_))
    }

    pub fn is_wall(&self) -> bool {
        matches!(self, Occupant::Wall(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivingKind {
    Zombie,
    Player,
}

// Zombie or player with combat stats
#[derive(Debug, Clone)]
pub struct Living {
    pub id: EntityId,
    pub kind: LivingKind,
    /// Player number, unique among connected players.
    pub number: Option<u32>,
    pub health: i32,
    pub strength: i32,
    pub damage: Option<HitId>,
    pub position: Option<Position>,
    /// World time in milliseconds of the last attack.
    pub last_attack: Option<u64>,
    pub kills: u32,
    pub deaths: u32,
}

impl Living {
    pub fn zombie(id: EntityId, position: Position) -> Self {
        Living {
            id,
            kind: LivingKind::Zombie,
            number: None,
            health: ZOMBIE_HEALTH,
            strength: ZOMBIE_STRENGTH,
            damage: None,
            position: Some(position),
            last_attack: None,
            kills: 0,
            deaths: 0,
        }
    }

    pub fn player(id: EntityId) -> Self {
        Living {
            id,
            kind: LivingKind::Player,
            number: None,
            health: PLAYER_HEALTH,
            strength: PLAYER_STRENGTH,
            damage: None,
            position: None,
            last_attack: None,
            kills: 0,
            deaths: 0,
        }
    }

    pub fn is_player(&self) -> bool {
        self.kind == LivingKind::Player
    }

    pub fn is_damaged(&self) -> bool {
        self.damage.is_some()
    }

    // Restore combat stats after a death. Counters and number survive.
    pub fn reset(&mut self) {
        let (health, strength) = match self.kind {
            LivingKind::Zombie => (ZOMBIE_HEALTH, ZOMBIE_STRENGTH),
            LivingKind::Player => (PLAYER_HEALTH, PLAYER_STRENGTH),
        };
        self.health = health;
        self.strength = strength;
        self.damage = None;
        self.position = None;
    }

    pub fn symbol(&self) -> String {
        match self.kind {
            LivingKind::Zombie => ZOMBIE_SYMBOL.to_string(),
            LivingKind::Player => self.number.unwrap_or(0).to_string(),
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            number: self.number,
            health: self.health,
            strength: self.strength,
            damaged: self.is_damaged(),
            kills: self.kills,
            deaths: self.deaths,
            position: self.position,
        }
    }
}

pub fn inert_symbol(occupant: &Occupant) -> Option<&'static str> {
    match occupant {
        Occupant::Ground(_) => Some(GROUND_SYMBOL),
        Occupant::Wall(_) => Some(WALL_SYMBOL),
        _ => None,
    }
}
