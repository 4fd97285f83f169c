//! Action requests and their consequences.
//!
//! Each public request validates everything up front and only then mutates,
//! so an `Err` always means nothing changed. The private helpers below carry
//! out what an accepted action sets in motion: missile launches and pursuit,
//! shot volleys, destruction, retreat and amoeba splits.

use tracing::{debug, warn};

use super::{BattleView, CombatResolver};
use crate::arena::GridPos;
use crate::captain::{adjacent_free_cell, default_captain};
use crate::entity::{
    MissileState, Movable, Pursuit, SpecialEffect, Stack, StackFlags, StackId, StackInner,
    Targetable, WeaponKind, WeaponSpec,
};
use crate::error::ActionError;
use crate::event::CombatEvent;
use crate::faction::FactionId;
use crate::path;
use crate::shots::ShotRoll;

/// A validated move.
struct MovePlan {
    cells: Vec<GridPos>,
    teleport: bool,
    prey: Option<StackId>,
}

/// Who is shooting, copied out of the firing stack.
#[derive(Clone, Copy)]
struct Shooter {
    faction: Option<FactionId>,
    attack_level: i32,
}

#[derive(Default)]
struct VolleyReport {
    hits: u32,
    damage: f32,
    units_lost: u32,
    bio: bool,
}

impl CombatResolver {
    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Moves the acting stack to `to`.
    ///
    /// Teleport-capable stacks jump straight there. Others fly the best path,
    /// which must fit in their remaining movement; missiles chasing the stack
    /// pursue it step by step. An amoeba may end its move on an unarmed
    /// hostile ship, consuming it.
    ///
    /// # Errors
    ///
    /// Refused if it is not this stack's turn, the cell is invalid or held by
    /// another stack, or the stack cannot get there this turn.
    pub fn move_to(&mut self, id: StackId, to: GridPos) -> Result<(), ActionError> {
        self.check_actor(id)?;
        let plan = self.plan_move(id, to)?;
        self.execute_move(id, plan);
        Ok(())
    }

    /// Fires every weapon of the acting stack that can currently engage
    /// `target`, rotating through the slots from the current weapon index.
    /// Returns the number of slots fired.
    ///
    /// # Errors
    ///
    /// Refused if it is not this stack's turn, the target is gone, or no slot
    /// can fire at it.
    pub fn attack(&mut self, id: StackId, target: StackId) -> Result<u32, ActionError> {
        self.check_actor(id)?;
        let foe = self.require_active(target)?;
        let me = self.require_active(id)?;
        if !me.can_attack(foe, &self.diplomacy) {
            return Err(match me.check_slot(me.weapon_index, foe, &self.diplomacy) {
                Err(ActionError::NoSuchSlot { .. }) | Ok(()) => ActionError::NoUsableWeapon {
                    attacker: id,
                    target,
                },
                Err(err) => err,
            });
        }
        let mut fired = 0;
        for _ in 0..me.weapons.len() {
            let Some(foe) = self.arena.get(target).cloned() else {
                break;
            };
            let Some(slot) = self
                .arena
                .get_mut(id)
                .and_then(|me| me.rotate_to_usable_weapon(&foe, &self.diplomacy))
            else {
                break;
            };
            self.discharge(id, target, slot, true);
            fired += 1;
        }
        Ok(fired)
    }

    /// Fires one slot of the acting stack at `target`, taking one shot or
    /// all remaining shots.
    ///
    /// # Errors
    ///
    /// Refused if it is not this stack's turn, the target is gone, or the slot
    /// cannot fire at it (see [`Stack::check_slot`]).
    pub fn fire_weapon(
        &mut self,
        id: StackId,
        target: StackId,
        slot: usize,
        all_shots: bool,
    ) -> Result<(), ActionError> {
        self.check_actor(id)?;
        let foe = self.require_active(target)?;
        self.require_active(id)?
            .check_slot(slot, foe, &self.diplomacy)?;
        self.discharge(id, target, slot, all_shots);
        Ok(())
    }

    /// Withdraws the acting ship squadron to its retreat destination.
    ///
    /// # Errors
    ///
    /// Refused if it is not this stack's turn, or the stack is not a ship with
    /// somewhere to go.
    pub fn retreat(&mut self, id: StackId) -> Result<(), ActionError> {
        self.check_actor(id)?;
        let destination = self
            .require_active(id)?
            .as_ship()
            .and_then(|ship| ship.retreat_to);
        if destination.is_none() {
            return Err(ActionError::NoRetreatDestination(id));
        }
        self.withdraw(id);
        Ok(())
    }

    /// In stasis, or unable both to move and to fire at anything.
    #[must_use]
    pub fn is_turn_complete(&self, id: StackId) -> bool {
        let Some(me) = self.arena.get(id) else {
            return true;
        };
        if me.in_stasis() {
            return true;
        }
        !me.can_move() && !self.arena.stacks().any(|t| me.can_attack(t, &self.diplomacy))
    }

    // -------------------------------------------------------------------------
    // Movement
    // -------------------------------------------------------------------------

    #[allow(clippy::cast_precision_loss)]
    fn plan_move(&self, id: StackId, to: GridPos) -> Result<MovePlan, ActionError> {
        let mover = self.require_active(id)?;
        if !self.arena.is_valid(to) {
            return Err(ActionError::InvalidCell(to));
        }
        let prey = match self.arena.stack_at(to) {
            Some(other) if other != id => {
                let held = self.arena.get(other);
                if held.is_some_and(|p| mover.can_consume(p, &self.diplomacy)) {
                    Some(other)
                } else {
                    return Err(ActionError::Occupied(to));
                }
            }
            _ => None,
        };
        if to == mover.pos {
            return Ok(MovePlan {
                cells: Vec::new(),
                teleport: false,
                prey: None,
            });
        }
        let out_of_moves = ActionError::OutOfMoves { stack: id, to };
        if !mover.can_move() {
            return Err(out_of_moves);
        }
        if mover.can_teleport() {
            return Ok(MovePlan {
                cells: vec![to],
                teleport: true,
                prey,
            });
        }
        if prey.is_none() && !path::is_valid_move(&self.arena, mover, to) {
            return Err(out_of_moves);
        }
        match path::find_path(&self.arena, mover, to) {
            Some(route) if route.len() as f32 <= mover.move_points => Ok(MovePlan {
                cells: route.cells().to_vec(),
                teleport: false,
                prey,
            }),
            _ => Err(out_of_moves),
        }
    }

    fn execute_move(&mut self, id: StackId, plan: MovePlan) {
        let last = plan.cells.last().copied();
        for cell in plan.cells {
            if Some(cell) == last {
                if let Some(prey) = plan.prey {
                    self.consume(id, prey);
                }
            }
            let Some(stack) = self.arena.get_mut(id) else {
                return;
            };
            let from = stack.pos;
            stack.pos = cell;
            if plan.teleport {
                stack.move_points = 0.0;
            } else {
                stack.move_points = (stack.move_points - 1.0).max(0.0);
            }
            self.emit(CombatEvent::UnitMoved {
                stack: id,
                from,
                to: cell,
                teleported: plan.teleport,
            });
            let step = from.to_vec2().distance(cell.to_vec2());
            self.pursue_missiles(id, step);
            if !self.arena.contains(id) {
                return;
            }
        }
    }

    fn consume(&mut self, predator: StackId, prey: StackId) {
        let Some(units) = self.arena.get(prey).map(|p| p.num) else {
            return;
        };
        if let Some(victim) = self.arena.get_mut(prey) {
            victim.num = 0;
            victim.hits = 0.0;
        }
        if let Some(victim) = self.arena.get(prey) {
            self.outcome.record_losses(victim, units);
        }
        debug!(%predator, %prey, "stack consumed");
        self.emit(CombatEvent::StackConsumed { predator, prey });
        self.destroy(prey);
    }

    // -------------------------------------------------------------------------
    // Missiles
    // -------------------------------------------------------------------------

    fn missiles_where(&self, pred: impl Fn(&MissileState) -> bool) -> Vec<StackId> {
        self.arena
            .stacks()
            .filter(|s| s.as_missile().is_some_and(&pred))
            .map(|s| s.id)
            .collect()
    }

    /// Every missile chasing `target` closes in after it moved `step`. A
    /// salvo whose target is cloaked or gone self-destructs instead.
    fn pursue_missiles(&mut self, target: StackId, step: f32) {
        let fire_distance = self.config.missile_fire_distance;
        for missile in self.missiles_where(|m| m.target == target) {
            let goal = self
                .arena
                .get(target)
                .filter(|t| !t.is_cloaked() && !t.destroyed())
                .map(|t| t.pos.to_vec2());
            let Some(goal) = goal else {
                self.expire_missile(missile);
                continue;
            };
            let result = self
                .arena
                .get_mut(missile)
                .and_then(Stack::as_missile_mut)
                .map(|m| m.pursue(goal, step, fire_distance));
            self.sync_missile_cell(missile);
            match result {
                Some(Pursuit::Detonate) => self.detonate(missile),
                Some(Pursuit::Exhausted) => self.expire_missile(missile),
                _ => {}
            }
        }
    }

    /// Refreshes the movement of missiles chasing a stack about to act.
    pub(super) fn refresh_missiles(&mut self, target: StackId) {
        for missile in self.missiles_where(|m| m.target == target) {
            if let Some(m) = self.arena.get_mut(missile).and_then(Stack::as_missile_mut) {
                m.refresh_move();
            }
        }
    }

    /// End-of-turn work for missiles launched by `owner`: expired salvos are
    /// removed, the rest spend their remaining movement and age one turn.
    pub(super) fn finish_missiles(&mut self, owner: StackId) {
        let fire_distance = self.config.missile_fire_distance;
        for missile in self.missiles_where(|m| m.owner == owner) {
            let Some(state) = self.arena.get(missile).and_then(Stack::as_missile) else {
                continue;
            };
            let expired = state.expired() || !self.arena.contains(owner);
            let goal = self
                .arena
                .get(state.target)
                .filter(|t| !t.is_cloaked() && !t.destroyed())
                .map(|t| t.pos.to_vec2());
            let Some(goal) = goal.filter(|_| !expired) else {
                self.expire_missile(missile);
                continue;
            };
            let result = self
                .arena
                .get_mut(missile)
                .and_then(Stack::as_missile_mut)
                .map(|m| {
                    let r = m.finish_move(goal, fire_distance);
                    m.tick_turn();
                    r
                });
            self.sync_missile_cell(missile);
            match result {
                Some(Pursuit::Detonate) => self.detonate(missile),
                Some(Pursuit::Exhausted) => self.expire_missile(missile),
                _ => {}
            }
        }
    }

    fn sync_missile_cell(&mut self, missile: StackId) {
        if let Some(stack) = self.arena.get_mut(missile) {
            if let Some(pos) = stack.as_missile().map(|m| GridPos::from_vec2(m.position)) {
                stack.pos = pos;
            }
        }
    }

    fn launch_missile(
        &mut self,
        owner: StackId,
        target: StackId,
        weapon: WeaponSpec,
        salvo: u32,
        shooter: Shooter,
    ) {
        let Some(from) = self.arena.get(owner).map(|s| s.pos) else {
            return;
        };
        let target_move = self.arena.get(target).map_or(0.0, |t| t.max_move);
        let name = weapon.name.clone();
        let state = MissileState::launch(
            owner,
            target,
            weapon,
            salvo,
            shooter.attack_level,
            from,
            target_move,
            self.config.missile_max_turns,
        );
        let mut stack = Stack::new(name, shooter.faction, salvo, 1.0, StackInner::Missile(state));
        stack.pos = from;
        let missile = self.arena.spawn(stack);
        self.note_engagement(shooter.faction, target);
        self.emit(CombatEvent::MissileLaunched {
            missile,
            owner,
            target,
            salvo,
        });
    }

    fn detonate(&mut self, missile: StackId) {
        let Some(stack) = self.arena.despawn(missile) else {
            return;
        };
        let Some(state) = stack.as_missile() else {
            return;
        };
        if !self.arena.contains(state.target) {
            self.emit(CombatEvent::MissileExpired { missile });
            return;
        }
        let shooter = Shooter {
            faction: stack.faction,
            attack_level: state.attack_level,
        };
        let report = self.volley(shooter, state.target, &state.weapon, state.salvo);
        self.emit(CombatEvent::MissileDetonated {
            missile,
            target: state.target,
            hits: report.hits,
            damage: report.damage,
        });
        self.settle_hit(shooter, state.target, &report);
    }

    fn expire_missile(&mut self, missile: StackId) {
        if self.arena.despawn(missile).is_some() {
            self.emit(CombatEvent::MissileExpired { missile });
        }
    }

    /// Removes every missile launched by or chasing a departed stack.
    fn purge_missiles(&mut self, id: StackId) {
        for missile in self.missiles_where(|m| m.owner == id || m.target == id) {
            self.expire_missile(missile);
        }
    }

    // -------------------------------------------------------------------------
    // Firing
    // -------------------------------------------------------------------------

    /// Fires a validated slot.
    fn discharge(&mut self, id: StackId, target: StackId, slot: usize, all_shots: bool) {
        let Some(me) = self.arena.get_mut(id) else {
            return;
        };
        let Some(weapon) = me.weapons.get_mut(slot) else {
            return;
        };
        let taken = weapon.take_shots(all_shots);
        if taken == 0 {
            return;
        }
        let spec = weapon.spec.clone();
        let per_shot = weapon.count;
        me.weapon_index = slot;
        if spec.kind != WeaponKind::Special {
            me.flags.remove(StackFlags::CLOAKED);
        }
        let shooter = Shooter {
            faction: me.faction,
            attack_level: me.attack_level,
        };
        let volley = me.num.saturating_mul(taken).saturating_mul(per_shot);

        match (spec.kind, spec.special) {
            (WeaponKind::Missile, _) => self.launch_missile(id, target, spec, volley, shooter),
            (WeaponKind::Special, Some(effect)) => self.apply_special(id, target, &spec, effect, taken),
            _ if spec.area => {
                for victim in self.area_targets(id, target, &spec) {
                    self.fire_volley(id, victim, &spec, volley, shooter);
                }
            }
            _ => self.fire_volley(id, target, &spec, volley, shooter),
        }
    }

    fn fire_volley(
        &mut self,
        id: StackId,
        target: StackId,
        spec: &WeaponSpec,
        count: u32,
        shooter: Shooter,
    ) {
        let report = self.volley(shooter, target, spec, count);
        self.emit(CombatEvent::WeaponFired {
            attacker: id,
            target,
            weapon: spec.name.clone(),
            shots: count,
            hits: report.hits,
            damage: report.damage,
        });
        self.settle_hit(shooter, target, &report);
    }

    /// Hostile stacks around the firer that an area weapon catches, the
    /// primary target first.
    fn area_targets(&self, id: StackId, primary: StackId, spec: &WeaponSpec) -> Vec<StackId> {
        let Some(me) = self.arena.get(id) else {
            return Vec::new();
        };
        let mut victims = vec![primary];
        victims.extend(
            self.arena
                .stacks()
                .filter(|s| s.id != primary && s.is_combatant())
                .filter(|s| me.pos.chebyshev(s.pos) <= 1)
                .filter(|s| me.hostile_to(s, &self.diplomacy) && s.can_be_targeted_with(spec))
                .map(|s| s.id),
        );
        victims
    }

    fn apply_special(
        &mut self,
        id: StackId,
        target: StackId,
        spec: &WeaponSpec,
        effect: SpecialEffect,
        shots: u32,
    ) {
        let shooter = self.arena.get(id).map(|s| Shooter {
            faction: s.faction,
            attack_level: s.attack_level,
        });
        let Some(foe) = self.arena.get_mut(target) else {
            return;
        };
        let mut report = VolleyReport {
            hits: 1,
            ..VolleyReport::default()
        };
        match effect {
            SpecialEffect::BlackHole { pct } => {
                report.units_lost = foe.take_black_hole_damage(pct).units_lost;
            }
            SpecialEffect::Stasis => foe.flags.insert(StackFlags::IN_STASIS),
        }
        self.emit(CombatEvent::WeaponFired {
            attacker: id,
            target,
            weapon: spec.name.clone(),
            shots,
            hits: report.hits,
            damage: 0.0,
        });
        if let Some(shooter) = shooter {
            self.settle_hit(shooter, target, &report);
        }
    }

    /// Rolls `count` shots at a target through the shot model.
    #[allow(clippy::cast_precision_loss)]
    fn volley(&mut self, shooter: Shooter, target: StackId, spec: &WeaponSpec, count: u32) -> VolleyReport {
        let mut report = VolleyReport::default();
        for _ in 0..count {
            let Some(foe) = self.arena.get(target) else {
                break;
            };
            if foe.destroyed() {
                break;
            }
            let roll = ShotRoll {
                weapon: spec,
                attack_level: shooter.attack_level,
                defense: foe.defense_against(spec.kind),
            };
            let multiplier = foe.damage_multiplier(spec.kind);
            let Some(raw) = self.shots.roll(&roll, &mut self.rng) else {
                continue;
            };
            report.hits += 1;
            let Some(foe) = self.arena.get_mut(target) else {
                break;
            };
            let raw = raw * multiplier;
            if spec.bioweapon && foe.is_colony() {
                let killed = foe.take_bio_damage(raw, spec.shield_adj);
                if killed > 0.0 {
                    report.bio = true;
                    report.damage += killed;
                }
            } else {
                let dealt = if spec.streaming {
                    foe.take_streaming_damage(raw, spec.shield_adj)
                } else {
                    foe.take_damage(raw, spec.shield_adj)
                };
                report.damage += dealt.applied;
                report.units_lost += dealt.units_lost;
            }
        }
        report
    }

    /// Books a volley's consequences and removes or splits the target.
    fn settle_hit(&mut self, shooter: Shooter, target: StackId, report: &VolleyReport) {
        self.note_engagement(shooter.faction, target);
        if report.bio {
            if let Some(faction) = shooter.faction {
                self.outcome.bioweapon_users.insert(faction);
            }
        }
        let Some(foe) = self.arena.get(target) else {
            return;
        };
        self.outcome.record_losses(foe, report.units_lost);
        if foe.destroyed() {
            self.destroy(target);
        } else {
            self.maybe_split(target);
        }
    }

    fn note_engagement(&mut self, faction: Option<FactionId>, target: StackId) {
        let Some(faction) = faction else {
            return;
        };
        let Some(foe) = self.arena.get(target) else {
            return;
        };
        if let Some(victim) = foe.faction {
            if victim != faction {
                self.engagements.insert((faction, victim));
            }
        }
        if foe.is_colony() {
            self.colony_attackers.insert(faction);
        }
    }

    // -------------------------------------------------------------------------
    // Leaving the battle
    // -------------------------------------------------------------------------

    fn depart(&mut self, id: StackId, flag: StackFlags) {
        let Some(mut stack) = self.arena.despawn(id) else {
            return;
        };
        stack.flags.insert(flag);
        self.captains.remove(&id);
        self.departed.insert(id, stack);
        self.purge_missiles(id);
    }

    /// Removes a destroyed stack from the grid.
    pub(super) fn destroy(&mut self, id: StackId) {
        let Some(kind) = self.arena.get(id).map(Stack::kind) else {
            return;
        };
        if kind.is_monster() {
            self.outcome.record_monster_destroyed();
        }
        debug!(stack = %id, %kind, "stack destroyed");
        self.emit(CombatEvent::UnitDestroyed { stack: id, kind });
        self.depart(id, StackFlags::DESTROYED);
    }

    /// Takes a stack out of the battle as retreated.
    pub(super) fn withdraw(&mut self, id: StackId) {
        let Some(stack) = self.arena.get(id) else {
            return;
        };
        let destination = stack.as_ship().and_then(|s| s.retreat_to);
        self.outcome.record_retreat(stack);
        debug!(stack = %id, ?destination, "stack retreated");
        self.emit(CombatEvent::UnitRetreated {
            stack: id,
            destination,
        });
        self.depart(id, StackFlags::RETREATED);
    }

    /// Removes a monster that found no cell to move to.
    pub(super) fn remove_stalled(&mut self, id: StackId) {
        if !self.arena.get(id).is_some_and(Stack::is_monster) {
            return;
        }
        warn!(stack = %id, "monster has nowhere to move; removing it");
        self.emit(CombatEvent::MonsterStalled { stack: id });
        self.depart(id, StackFlags::empty());
    }

    // -------------------------------------------------------------------------
    // Amoeba splitting
    // -------------------------------------------------------------------------

    fn maybe_split(&mut self, id: StackId) {
        let wants = self.arena.get(id).is_some_and(|s| match &s.inner {
            StackInner::Amoeba(state) => state.wants_split(s.max_hits),
            _ => false,
        });
        if !wants {
            return;
        }
        let view = BattleView {
            arena: &self.arena,
            diplomacy: &self.diplomacy,
            config: &self.config,
            round: self.round,
        };
        let cell = match self.captains.get_mut(&id) {
            Some(captain) => captain.split_destination(&view, id),
            None => adjacent_free_cell(&view, id),
        };
        let Some(cell) = cell else {
            debug!(stack = %id, "no room to split");
            return;
        };
        let Some(mut child) = self.arena.get_mut(id).and_then(Stack::split_off) else {
            return;
        };
        child.pos = cell;
        let captain = default_captain(&child);
        let child_id = self.arena.spawn(child);
        self.captains.insert(child_id, captain);
        self.emit(CombatEvent::AmoebaSplit {
            parent: id,
            child: child_id,
        });
    }
}
