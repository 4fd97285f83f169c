//! The round loop, stack turns, termination and finalization.

use tracing::{debug, info, warn};

use super::{CombatResolver, PlayerCommand, StepResult, TurnContext};
use crate::entity::{Stack, StackId, WeaponBearer};
use crate::error::ActionError;
use crate::event::CombatEvent;
use crate::outcome::{CombatOutcome, ColonyReport, Termination};

impl CombatResolver {
    /// Advances the battle by one stack turn.
    ///
    /// Starts a new round when the previous one is complete and checks the
    /// termination rules before every round and after every turn. In
    /// interactive mode the turn of a player-controlled stack is left open and
    /// [`StepResult::AwaitingCommand`] is returned until
    /// [`end_player_turn`](Self::end_player_turn) closes it.
    pub fn step(&mut self) -> StepResult {
        if self.finished {
            return StepResult::Finished;
        }
        if self.awaiting_player {
            if let Some(id) = self.acting {
                return StepResult::AwaitingCommand(id);
            }
            self.awaiting_player = false;
        }
        if self.cancel_requested() {
            info!(round = self.round, "resolution cancelled");
            self.force_attacker_withdrawal();
            self.finalize(Termination::Cancelled);
            return StepResult::Finished;
        }

        let id = loop {
            if self.scheduler.round_complete() && !self.start_round() {
                return StepResult::Finished;
            }
            if let Some(id) = self.scheduler.next_stack(&self.arena) {
                break id;
            }
        };
        self.take_turn(id)
    }

    /// Executes a command for the player-controlled stack awaiting orders.
    ///
    /// The turn closes by itself once the stack has nothing left to do.
    ///
    /// # Errors
    ///
    /// Refused if no player stack is awaiting orders or the action itself is
    /// refused.
    pub fn command(&mut self, command: PlayerCommand) -> Result<(), ActionError> {
        if self.finished {
            return Err(ActionError::BattleFinished);
        }
        let Some(id) = self.acting.filter(|_| self.awaiting_player) else {
            return Err(ActionError::NotYourTurn(match command {
                PlayerCommand::Attack { target } | PlayerCommand::FireWeapon { target, .. } => target,
                PlayerCommand::MoveTo { .. } | PlayerCommand::Retreat => StackId::new(u64::MAX),
            }));
        };
        match command {
            PlayerCommand::MoveTo { to } => self.move_to(id, to)?,
            PlayerCommand::Attack { target } => {
                self.attack(id, target)?;
            }
            PlayerCommand::FireWeapon {
                target,
                slot,
                all_shots,
            } => self.fire_weapon(id, target, slot, all_shots)?,
            PlayerCommand::Retreat => self.retreat(id)?,
        }
        if self.is_turn_complete(id) {
            self.end_player_turn();
        }
        Ok(())
    }

    /// Closes the turn of the player-controlled stack awaiting orders.
    pub fn end_player_turn(&mut self) {
        if !self.awaiting_player {
            return;
        }
        self.awaiting_player = false;
        if let Some(id) = self.acting {
            self.finish_stack_turn(id);
        }
    }

    // -------------------------------------------------------------------------
    // Rounds and turns
    // -------------------------------------------------------------------------

    /// Closes the previous round and opens the next. Returns `false` once the
    /// battle has been finalized instead.
    fn start_round(&mut self) -> bool {
        if self.round > 0 {
            let chance = self.config.asteroid_erosion_chance;
            for pos in self.arena.erode_asteroids(chance, &mut self.rng) {
                self.emit(CombatEvent::AsteroidEroded { pos });
            }
        }
        if !self.arena.stacks().any(Stack::is_combatant) {
            self.finalize(Termination::NoParticipants);
            return false;
        }
        self.round += 1;
        if self.round > self.config.max_rounds {
            warn!(
                round = self.round,
                ceiling = self.config.max_rounds,
                "turn ceiling reached; forcing the attacker to withdraw"
            );
            self.force_attacker_withdrawal();
            self.finalize(Termination::TurnCeiling);
            return false;
        }
        if !self.conflict_remains() {
            self.finalize(Termination::NoConflict);
            return false;
        }
        debug!(round = self.round, "round started");
        self.emit(CombatEvent::RoundStarted { round: self.round });
        self.scheduler.start_round(&self.arena, &self.config);
        true
    }

    fn take_turn(&mut self, id: StackId) -> StepResult {
        let Some(stack) = self.arena.get_mut(id) else {
            return StepResult::Continue;
        };
        stack.begin_turn(self.interdiction);
        let frozen = stack.in_stasis();
        let player = self.interactive && stack.is_player();
        self.refresh_missiles(id);
        self.acting = Some(id);
        debug!(stack = %id, round = self.round, frozen, player, "stack turn");

        if !frozen {
            if player {
                self.awaiting_player = true;
                return StepResult::AwaitingCommand(id);
            }
            self.run_captain(id);
        }
        self.finish_stack_turn(id);
        if self.finished {
            StepResult::Finished
        } else {
            StepResult::Continue
        }
    }

    fn run_captain(&mut self, id: StackId) {
        let Some(mut captain) = self.captains.remove(&id) else {
            return;
        };
        let mut ctx = TurnContext {
            resolver: self,
            stack: id,
        };
        captain.perform_turn(&mut ctx);
        if self.arena.contains(id) {
            self.captains.insert(id, captain);
        }
    }

    fn finish_stack_turn(&mut self, id: StackId) {
        if let Some(stack) = self.arena.get_mut(id) {
            stack.end_turn();
        }
        self.finish_missiles(id);
        self.acting = None;
        if !self.finished && !self.conflict_remains() {
            self.finalize(Termination::NoConflict);
        }
    }

    /// Some active armed stack could still fight a hostile one.
    pub(super) fn conflict_remains(&self) -> bool {
        let combatants: Vec<&Stack> = self.arena.stacks().filter(|s| s.is_combatant()).collect();
        combatants.iter().any(|a| {
            a.is_armed()
                && combatants
                    .iter()
                    .any(|b| a.could_engage(b, &self.diplomacy))
        })
    }

    /// Every ship of the attacking faction leaves the battle.
    fn force_attacker_withdrawal(&mut self) {
        let Some(attacker) = self.outcome.attacker else {
            return;
        };
        let ships: Vec<StackId> = self
            .arena
            .stacks()
            .filter(|s| s.is_ship() && s.faction == Some(attacker))
            .map(|s| s.id)
            .collect();
        for id in ships {
            self.withdraw(id);
        }
    }

    // -------------------------------------------------------------------------
    // Finalization
    // -------------------------------------------------------------------------

    pub(super) fn finalize(&mut self, termination: Termination) {
        if self.finished {
            return;
        }
        let missiles: Vec<StackId> = self
            .arena
            .stacks()
            .filter(|s| s.is_missile())
            .map(|s| s.id)
            .collect();
        for id in missiles {
            self.arena.despawn(id);
        }

        let outcome = &mut self.outcome;
        outcome.rounds = self.round;
        outcome.termination = termination;
        for stack in self.arena.stacks() {
            outcome.record_damaged(stack);
        }
        let colony = self
            .colony
            .and_then(|id| self.arena.get(id).or_else(|| self.departed.get(&id)));
        outcome.colony = colony.and_then(colony_report);
        let rebels = colony
            .and_then(Stack::as_colony)
            .map_or(0.0, |c| c.rebels);

        let (victor, monster) = CombatOutcome::pick_victor(self.arena.stacks());
        outcome.victor = victor;
        outcome.monster_victorious = monster;
        outcome.suppress_rebels(rebels, self.config.rebel_suppression_fraction);
        outcome.raise_incidents(&self.engagements, &self.colony_attackers);
        outcome.finalized = true;

        self.finished = true;
        self.acting = None;
        self.awaiting_player = false;
        info!(
            rounds = self.round,
            ?termination,
            victor = ?self.outcome.victor,
            monster_victorious = self.outcome.monster_victorious,
            "battle finalized"
        );
    }
}

fn colony_report(stack: &Stack) -> Option<ColonyReport> {
    let colony = stack.as_colony()?;
    Some(ColonyReport {
        owner: colony.owner,
        population_before: colony.starting_population,
        population_after: colony.population.max(0.0),
        bases_before: colony.starting_bases,
        bases_after: stack.num,
        destroyed: colony.population <= 0.0,
        rebels_suppressed: 0.0,
    })
}
