// Client-side cast prediction. Runs the same gate as the server against the
// latest replicated values so the UI can react before the server answers.
// The server stays authoritative: every snapshot overwrites local guesses.

use crate::domain::resources::{ResourcePool, Role};
use crate::domain::systems::abilities::{Spellbook, validate_cast};
use crate::domain::{AbilitySlot, CastRejection, CastRequest, PlayerSnapshot, Tuning};
use glam::Vec3;

pub struct CastPredictor {
    tuning: Tuning,
    tick_rate_hz: u32,
    mana: ResourcePool,
    is_dead: bool,
    spellbook: Spellbook,
    /// Mana shown to the player, lowered speculatively on predicted casts.
    displayed_mana: f32,
}

impl CastPredictor {
    /// `tick_rate_hz` is the server's simulation rate; all times are
    /// server ticks as carried by `WorldUpdate`.
    pub fn new(tuning: Tuning, tick_rate_hz: u32) -> Self {
        let mana = ResourcePool::mana(tuning.player.max_mana);
        Self {
            spellbook: Spellbook::new(&tuning, tick_rate_hz),
            tick_rate_hz,
            displayed_mana: mana.current(),
            mana,
            is_dead: false,
            tuning,
        }
    }

    /// Replaces every local guess with the replicated values.
    pub fn apply_snapshot(&mut self, snapshot: &PlayerSnapshot) {
        if snapshot.max_mana != self.mana.max() {
            self.mana = ResourcePool::mana(snapshot.max_mana);
        }
        self.mana.sync_from_snapshot(snapshot.mana, false);
        self.is_dead = snapshot.is_dead;
        self.displayed_mana = self.mana.current();
        self.spellbook
            .cooldown_mut(AbilitySlot::Fireball)
            .sync(snapshot.fireball_cast_tick);
        self.spellbook
            .cooldown_mut(AbilitySlot::SummonGolems)
            .sync(snapshot.summon_cast_tick);
    }

    pub fn displayed_mana(&self) -> f32 {
        self.displayed_mana
    }

    /// Seconds until `slot` is ready again.
    pub fn remaining_cooldown(&self, slot: AbilitySlot, tick: u64) -> f64 {
        self.spellbook
            .cooldown(slot)
            .remaining_seconds(tick, self.tick_rate_hz)
    }

    /// Checks a cast locally and, if it would pass, returns the request to
    /// send. A rejection is only a local "not ready" hint.
    pub fn predict(
        &mut self,
        slot: AbilitySlot,
        tick: u64,
        caster: Vec3,
        camera_forward: Vec3,
    ) -> Result<CastRequest, CastRejection> {
        let cost = slot.mana_cost(&self.tuning);
        validate_cast(
            self.spellbook.cooldown(slot),
            cost,
            &self.mana,
            self.is_dead,
            tick,
            self.tick_rate_hz,
        )?;
        // Proxies only check the balance; the server pays.
        if !self.mana.try_consume(cost, Role::Proxy) {
            return Err(CastRejection::InsufficientMana {
                required: cost,
                available: self.mana.current(),
            });
        }

        self.displayed_mana = (self.displayed_mana - cost).max(0.0);
        self.spellbook.cooldown_mut(slot).record(tick);
        Ok(CastRequest::from_camera(
            slot,
            caster,
            camera_forward,
            &self.tuning.fireball,
        ))
    }
}
