//! Movement and combat rules.
//!
//! A move swaps the mover with a strictly weaker occupant of a neighbouring
//! cardinal cell. An attack damages whatever stands on the target cell and
//! leaves it invulnerable for one invincibility window. Zombies act one
//! window late, and every timed effect re-checks the state it was scheduled
//! against before touching the world.

use crate::entity::{EntityId, HitId, Inert, LivingKind, Occupant, Strength};
use crate::schedule::Deferred;
use crate::world::GridWorld;
use log::{debug, info};
use shared::{damaged_symbol, finisher_symbol, Action, CellChange, Direction, Happening, Position};

impl GridWorld {
    /// Entry point for a move or attack request of any living entity.
    ///
    /// Zombie actions are deferred by one invincibility window; everything
    /// else is performed immediately.
    pub fn resolve(&mut self, actor: EntityId, action: Action, direction: Direction, now: u64) {
        let Some(living) = self.living.get(&actor) else {
            return;
        };
        if living.position.is_none() {
            return;
        }

        if living.kind == LivingKind::Zombie {
            self.deferred.schedule(
                now.saturating_add(self.window),
                Deferred::LivingAction {
                    actor,
                    action,
                    direction,
                },
            );
            return;
        }

        self.perform(actor, action, direction, now);
    }

    /// Performs a move or attack right away. Illegal requests are ignored.
    pub fn perform(&mut self, actor: EntityId, action: Action, direction: Direction, now: u64) {
        let Some(living) = self.living.get(&actor) else {
            return;
        };
        if living.health <= 0 {
            return;
        }
        let Some(from) = living.position else {
            return;
        };
        let strength = living.strength;
        if self.cell(from).and_then(Occupant::living) != Some(actor) {
            return;
        }
        let Some(target) = direction.step(from, self.width, self.height) else {
            debug!("{:?} {:?} {:?} leaves the map", actor, action, direction);
            return;
        };

        match action {
            Action::Move => {
                if direction.is_diagonal() {
                    debug!("{:?} tried a diagonal move", actor);
                    return;
                }
                if self.strength_at(target) >= Strength::Finite(strength) {
                    return;
                }
                self.move_to(actor, from, target, now);
            }
            Action::Attack => self.attack(actor, target, now),
        }
    }

    fn move_to(&mut self, actor: EntityId, from: Position, target: Position, now: u64) {
        let from_index = self.index(from);
        let target_index = self.index(target);

        match &mut self.cells[target_index] {
            Occupant::Ground(inert) | Occupant::Wall(inert) => inert.damage = None,
            Occupant::Zombie(id) | Occupant::Player(id) => {
                let id = *id;
                if let Some(displaced) = self.living.get_mut(&id) {
                    displaced.damage = None;
                }
            }
        }

        self.cells.swap(from_index, target_index);
        if let Some(mover) = self.living.get_mut(&actor) {
            mover.position = Some(target);
        }
        if let Some(id) = self.cells[from_index].living() {
            if let Some(displaced) = self.living.get_mut(&id) {
                displaced.position = Some(from);
            }
        }

        self.publish(Happening::Changes {
            data: vec![
                CellChange::new(from, self.symbol_at(from)),
                CellChange::new(target, self.symbol_at(target)),
            ],
        });

        if let Some((zombie, at)) = self.zombie_near(target) {
            let dx = target.x as isize - at.x as isize;
            let dy = target.y as isize - at.y as isize;
            if let Some(direction) = Direction::from_delta(dx, dy) {
                self.resolve(zombie, Action::Attack, direction, now);
            }
        }
    }

    /// First zombie in the 3x3 block around `center`, scanning row by row.
    fn zombie_near(&self, center: Position) -> Option<(EntityId, Position)> {
        for y in center.y.saturating_sub(1)..=center.y + 1 {
            for x in center.x.saturating_sub(1)..=center.x + 1 {
                let at = Position::new(x, y);
                if at == center {
                    continue;
                }
                if let Some(Occupant::Zombie(id)) = self.cell(at) {
                    return Some((*id, at));
                }
            }
        }
        None
    }

    fn attack(&mut self, actor: EntityId, target: Position, now: u64) {
        let window = self.window;
        let Some(attacker) = self.living.get_mut(&actor) else {
            return;
        };
        if let Some(last) = attacker.last_attack {
            if now.saturating_sub(last) < window {
                return;
            }
        }
        attacker.last_attack = Some(now);
        let strength = attacker.strength;

        let hit = self.allocate_hit();
        let target_index = self.index(target);
        let defender = match self.cells[target_index] {
            Occupant::Ground(inert) | Occupant::Wall(inert) => {
                if inert.damage.is_some() {
                    return;
                }
                if let Occupant::Ground(marked) | Occupant::Wall(marked) =
                    &mut self.cells[target_index]
                {
                    marked.damage = Some(hit);
                }
                inert.id
            }
            Occupant::Zombie(id) | Occupant::Player(id) => {
                let Some(victim) = self.living.get_mut(&id) else {
                    return;
                };
                if victim.damage.is_some() {
                    return;
                }
                victim.health -= strength;
                victim.damage = Some(hit);
                if victim.health <= 0 {
                    self.kill(Some(actor), id, now);
                    return;
                }
                id
            }
        };

        self.publish(Happening::Changes {
            data: vec![CellChange::new(
                target,
                damaged_symbol(&self.symbol_at(target)),
            )],
        });
        self.deferred.schedule(
            now.saturating_add(window),
            Deferred::ClearDamage {
                at: target,
                defender,
                hit,
            },
        );
    }

    /// Removes `victim` from the map.
    ///
    /// Does nothing if the victim is no longer on the cell it believes it
    /// occupies. A killed player keeps its number and kill count and waits
    /// off the map for a rejoin; a killed zombie is gone for good.
    pub fn kill(&mut self, killer: Option<EntityId>, victim: EntityId, now: u64) {
        let Some(living) = self.living.get(&victim) else {
            return;
        };
        let Some(at) = living.position else {
            return;
        };
        if self.cell(at).and_then(Occupant::living) != Some(victim) {
            return;
        }
        let symbol = living.symbol();
        let kind = living.kind;

        self.publish(Happening::Changes {
            data: vec![CellChange::new(at, finisher_symbol(&symbol))],
        });

        let ground = Inert::new(self.allocate_id());
        let index = self.index(at);
        self.cells[index] = Occupant::Ground(ground);
        self.deferred.schedule(
            now.saturating_add(self.window),
            Deferred::ConfirmVacated {
                at,
                ground: ground.id,
            },
        );

        match kind {
            LivingKind::Zombie => {
                self.living.remove(&victim);
            }
            LivingKind::Player => {
                if let Some(player) = self.living.get_mut(&victim) {
                    player.deaths += 1;
                    player.reset();
                }
                self.scoreboard.increase_deaths(&symbol);

                let credited = killer
                    .and_then(|id| self.living.get(&id).map(|k| (id, k.symbol(), k.is_player())));
                let killer_symbol = match credited {
                    Some((id, killer_symbol, true)) => {
                        if let Some(killer) = self.living.get_mut(&id) {
                            killer.kills += 1;
                        }
                        self.scoreboard.increase_kills(&killer_symbol);
                        Some(killer_symbol)
                    }
                    Some((_, killer_symbol, false)) => Some(killer_symbol),
                    None => None,
                };

                match &killer_symbol {
                    Some(k) => info!("{} killed player {}", k, symbol),
                    None => info!("Player {} removed", symbol),
                }
                self.publish_scoreboard();
                self.publish(Happening::Kill {
                    killer: killer_symbol,
                    victim: symbol,
                });
            }
        }
    }

    /// Earliest due time of a pending deferred effect.
    pub fn next_due(&self) -> Option<u64> {
        self.deferred.next_due()
    }

    /// Runs every deferred effect due at or before `now`, each with its own
    /// due time as the clock. Returns how many ran.
    pub fn advance(&mut self, now: u64) -> usize {
        let mut ran = 0;
        while let Some(scheduled) = self.deferred.pop_due(now) {
            self.apply_deferred(scheduled.effect, scheduled.due);
            ran += 1;
        }
        ran
    }

    fn apply_deferred(&mut self, effect: Deferred, now: u64) {
        match effect {
            Deferred::ClearDamage { at, defender, hit } => self.clear_damage(at, defender, hit),
            Deferred::ConfirmVacated { at, ground } => {
                if self.cell(at).map(Occupant::id) == Some(ground) {
                    self.publish(Happening::Changes {
                        data: vec![CellChange::new(at, self.symbol_at(at))],
                    });
                }
            }
            Deferred::LivingAction {
                actor,
                action,
                direction,
            } => self.perform(actor, action, direction, now),
        }
    }

    fn clear_damage(&mut self, at: Position, defender: EntityId, hit: HitId) {
        if let Some(living) = self.living.get_mut(&defender) {
            if living.damage != Some(hit) {
                return;
            }
            living.damage = None;
            if let Some(position) = living.position {
                self.publish(Happening::Changes {
                    data: vec![CellChange::new(position, self.symbol_at(position))],
                });
            }
            return;
        }

        if self.cell(at).is_none() {
            return;
        }
        let index = self.index(at);
        let cleared = match &mut self.cells[index] {
            Occupant::Ground(inert) | Occupant::Wall(inert)
                if inert.id == defender && inert.damage == Some(hit) =>
            {
                inert.damage = None;
                true
            }
            _ => false,
        };
        if cleared {
            self.publish(Happening::Changes {
                data: vec![CellChange::new(at, self.symbol_at(at))],
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Delivery;
    use crate::world::tests::{drain, WINDOW};
    use shared::Score;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn changes(events: &mut UnboundedReceiver<Delivery>) -> Vec<Vec<CellChange>> {
        drain(events)
            .into_iter()
            .filter_map(|d| match &*d.happening {
                Happening::Changes { data } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    fn corridor() -> GridWorld {
        GridWorld::from_rows(&["#####", "#   #", "#####"], WINDOW).unwrap()
    }

    #[test]
    fn test_move_onto_ground_swaps_cells() {
        let mut world = corridor();
        let id = world.spawn_player();
        world.join_at(id, Position::new(1, 1)).unwrap();
        let (_, mut events) = world.subscribe(id);

        world.resolve(id, Action::Move, Direction::E, 0);

        assert_eq!(world.player(id).unwrap().position, Some(Position::new(2, 1)));
        assert_eq!(world.cell(Position::new(2, 1)), Some(&Occupant::Player(id)));
        assert!(world.cell(Position::new(1, 1)).unwrap().is_ground());
        assert_eq!(
            changes(&mut events),
            vec![vec![
                CellChange::new(Position::new(1, 1), " "),
                CellChange::new(Position::new(2, 1), "1"),
            ]]
        );
    }

    #[test]
    fn test_illegal_moves_are_ignored() {
        let mut world = GridWorld::from_rows(&["#####", "# Z #", "#   #", "#####"], WINDOW).unwrap();
        let id = world.spawn_player();
        world.join_at(id, Position::new(1, 1)).unwrap();
        let (_, mut events) = world.subscribe(id);
        let before = world.snapshot();

        // wall, zombie, diagonal
        world.resolve(id, Action::Move, Direction::N, 0);
        world.resolve(id, Action::Move, Direction::E, 0);
        world.resolve(id, Action::Move, Direction::SE, 0);

        assert_eq!(world.snapshot(), before);
        assert!(changes(&mut events).is_empty());
    }

    #[test]
    fn test_moving_next_to_zombie_triggers_delayed_attack() {
        let mut world = GridWorld::from_rows(&["#####", "#  Z#", "#####"], WINDOW).unwrap();
        let id = world.spawn_player();
        world.join_at(id, Position::new(1, 1)).unwrap();
        let (_, mut events) = world.subscribe(id);

        world.resolve(id, Action::Move, Direction::E, 1_000);
        assert_eq!(world.next_due(), Some(1_300));
        drain(&mut events);

        assert_eq!(world.advance(1_299), 0);
        assert_eq!(world.player(id).unwrap().health, 10);

        assert_eq!(world.advance(1_300), 1);
        let player = world.player(id).unwrap();
        assert_eq!(player.health, 7);
        assert!(player.is_damaged());

        let delivered = drain(&mut events);
        let diff_health = delivered[0].player.as_ref().map(|p| p.health);
        assert_eq!(diff_health, Some(7));
        assert_eq!(
            *delivered[0].happening,
            Happening::Changes {
                data: vec![CellChange::new(Position::new(2, 1), "d1")]
            }
        );

        assert_eq!(world.next_due(), Some(1_600));
        world.advance(1_600);
        assert!(!world.player(id).unwrap().is_damaged());
        assert_eq!(
            changes(&mut events),
            vec![vec![CellChange::new(Position::new(2, 1), "1")]]
        );
    }

    #[test]
    fn test_diagonal_zombie_attacks_towards_mover() {
        let mut world =
            GridWorld::from_rows(&["#####", "#   #", "#  Z#", "#####"], WINDOW).unwrap();
        let id = world.spawn_player();
        world.join_at(id, Position::new(1, 1)).unwrap();

        world.resolve(id, Action::Move, Direction::E, 0);
        world.advance(WINDOW.as_millis() as u64);

        assert_eq!(world.player(id).unwrap().health, 7);
    }

    #[test]
    fn test_attack_cooldown_and_invincibility() {
        let mut world = corridor();
        let id = world.spawn_player();
        world.join_at(id, Position::new(1, 1)).unwrap();
        let (_, mut events) = world.subscribe(id);
        let wall = Position::new(1, 0);

        world.resolve(id, Action::Attack, Direction::N, 0);
        assert_eq!(
            changes(&mut events),
            vec![vec![CellChange::new(wall, "d#")]]
        );

        // cooldown
        world.resolve(id, Action::Attack, Direction::N, 299);
        // cooldown over, wall still invulnerable until the clear runs
        world.resolve(id, Action::Attack, Direction::N, 300);
        assert!(changes(&mut events).is_empty());

        world.advance(300);
        assert_eq!(changes(&mut events), vec![vec![CellChange::new(wall, "#")]]);

        world.resolve(id, Action::Attack, Direction::N, 600);
        assert_eq!(changes(&mut events), vec![vec![CellChange::new(wall, "d#")]]);
        assert!(world.cell(wall).unwrap().is_wall());
    }

    #[test]
    fn test_cooldown_blocks_attack_on_fresh_target() {
        let mut world = corridor();
        let attacker = world.spawn_player();
        let prey = world.spawn_player();
        world.join_at(attacker, Position::new(1, 1)).unwrap();
        world.join_at(prey, Position::new(2, 1)).unwrap();
        let (_, mut events) = world.subscribe(attacker);

        world.resolve(attacker, Action::Attack, Direction::N, 0);
        drain(&mut events);

        // the prey was never hit, only the cooldown stands in the way
        world.resolve(attacker, Action::Attack, Direction::E, 100);
        assert_eq!(world.player(prey).unwrap().health, 10);
        assert!(!world.player(prey).unwrap().is_damaged());
        assert!(changes(&mut events).is_empty());

        world.resolve(attacker, Action::Attack, Direction::E, 300);
        assert_eq!(world.player(prey).unwrap().health, 9);
        assert_eq!(
            changes(&mut events),
            vec![vec![CellChange::new(Position::new(2, 1), "d2")]]
        );
    }

    #[test]
    fn test_killing_a_zombie_frees_its_cell() {
        let mut world = GridWorld::from_rows(&["####", "# Z#", "####"], WINDOW).unwrap();
        let id = world.spawn_player();
        world.join_at(id, Position::new(1, 1)).unwrap();
        let zombie = world.cell(Position::new(2, 1)).and_then(Occupant::living).unwrap();
        let (_, mut events) = world.subscribe(id);

        for now in [0, 300, 600] {
            world.advance(now);
            world.resolve(id, Action::Attack, Direction::E, now);
        }

        assert!(world.living(zombie).is_none());
        assert!(world.cell(Position::new(2, 1)).unwrap().is_ground());
        let seen = changes(&mut events);
        assert_eq!(
            seen.last(),
            Some(&vec![CellChange::new(Position::new(2, 1), "fZ")])
        );
        // zombies are not on the scoreboard
        assert_eq!(world.player(id).unwrap().kills, 0);

        world.advance(900);
        assert_eq!(
            changes(&mut events),
            vec![vec![CellChange::new(Position::new(2, 1), " ")]]
        );
    }

    #[test]
    fn test_player_kill_updates_scores() {
        let mut world = corridor();
        let hunter = world.spawn_player();
        let prey = world.spawn_player();
        world.join_at(hunter, Position::new(1, 1)).unwrap();
        world.join_at(prey, Position::new(2, 1)).unwrap();
        world.living.get_mut(&hunter).unwrap().strength = 10;
        let (_, mut events) = world.subscribe(prey);

        world.resolve(hunter, Action::Attack, Direction::E, 0);

        let victim = world.player(prey).unwrap();
        assert_eq!(victim.position, None);
        assert_eq!(victim.deaths, 1);
        assert_eq!(victim.health, 10);
        assert!(!victim.is_damaged());
        assert_eq!(world.player(hunter).unwrap().kills, 1);
        assert_eq!(world.scoreboard().get("1"), Some(Score { kills: 1, deaths: 0 }));
        assert_eq!(world.scoreboard().get("2"), Some(Score { kills: 0, deaths: 1 }));

        let happenings: Vec<Happening> = drain(&mut events)
            .into_iter()
            .map(|d| (*d.happening).clone())
            .collect();
        assert_eq!(
            happenings.first(),
            Some(&Happening::Changes {
                data: vec![CellChange::new(Position::new(2, 1), "f2")]
            })
        );
        assert_eq!(
            happenings.last(),
            Some(&Happening::Kill {
                killer: Some("1".to_string()),
                victim: "2".to_string()
            })
        );

        // rejoin keeps the number
        world.join(prey).unwrap();
        assert_eq!(world.player(prey).unwrap().number, Some(2));
    }

    #[test]
    fn test_zombie_kill_names_zombie() {
        let mut world = GridWorld::from_rows(&["####", "#  #", "# Z#", "####"], WINDOW).unwrap();
        let id = world.spawn_player();
        world.join_at(id, Position::new(1, 1)).unwrap();
        world.living.get_mut(&id).unwrap().health = 3;
        let (_, mut events) = world.subscribe(id);

        world.resolve(id, Action::Move, Direction::E, 0);
        world.advance(300);

        assert!(!world.is_on_map(id));
        let delivered = drain(&mut events);
        let last = delivered.last().unwrap();
        assert_eq!(
            *last.happening,
            Happening::Kill {
                killer: Some("Z".to_string()),
                victim: "1".to_string()
            }
        );
        assert_eq!(last.player.as_ref().unwrap().position, None);
        assert_eq!(world.player(id).unwrap().kills, 0);
    }

    #[test]
    fn test_kill_is_idempotent() {
        let mut world = corridor();
        let id = world.spawn_player();
        world.join_at(id, Position::new(2, 1)).unwrap();
        let (_, mut events) = world.subscribe(id);

        world.kill(None, id, 0);
        let first = drain(&mut events).len();
        world.kill(None, id, 0);

        assert!(first > 0);
        assert!(drain(&mut events).is_empty());
        assert_eq!(world.player(id).unwrap().deaths, 1);
    }

    #[test]
    fn test_stale_damage_clear_is_ignored() {
        let mut world = corridor();
        let hunter = world.spawn_player();
        let prey = world.spawn_player();
        world.join_at(hunter, Position::new(1, 1)).unwrap();
        world.join_at(prey, Position::new(2, 1)).unwrap();

        world.resolve(hunter, Action::Attack, Direction::E, 0);
        // a newer hit replaced the mark before the first clear fires
        world.living.get_mut(&prey).unwrap().damage = Some(999);
        world.advance(300);

        assert_eq!(world.player(prey).unwrap().damage, Some(999));
    }

    #[test]
    fn test_confirm_vacated_skips_reoccupied_cell() {
        let mut world = corridor();
        let first = world.spawn_player();
        let second = world.spawn_player();
        world.join_at(first, Position::new(2, 1)).unwrap();
        world.join_at(second, Position::new(1, 1)).unwrap();
        world.kill(None, first, 0);

        world.resolve(second, Action::Move, Direction::E, 100);
        let (_, mut events) = world.subscribe(second);
        world.advance(300);

        assert!(changes(&mut events).is_empty());
        assert_eq!(world.cell(Position::new(2, 1)), Some(&Occupant::Player(second)));
    }

    #[test]
    fn test_delayed_action_of_dead_zombie_is_dropped() {
        let mut world = GridWorld::from_rows(&["#####", "#  Z#", "#####"], WINDOW).unwrap();
        let id = world.spawn_player();
        world.join_at(id, Position::new(1, 1)).unwrap();
        let zombie = world.cell(Position::new(3, 1)).and_then(Occupant::living).unwrap();

        world.resolve(id, Action::Move, Direction::E, 0);
        world.kill(Some(id), zombie, 100);
        world.advance(300);

        assert_eq!(world.player(id).unwrap().health, 10);
    }

    #[test]
    fn test_off_map_player_cannot_act() {
        let mut world = corridor();
        let id = world.spawn_player();
        world.resolve(id, Action::Move, Direction::E, 0);
        world.resolve(id, Action::Attack, Direction::E, 0);
        assert_eq!(world.next_due(), None);
        assert_eq!(world.player(id).unwrap().last_attack, None);
    }
}
