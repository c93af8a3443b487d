// Numeric resource pools (health, mana) owned by the state authority.

/// Who is calling into a pool. Only the authority may mutate shared values;
/// proxies (client prediction) only get the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authority,
    Proxy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Health,
    Mana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Nothing changed (already dead or a non-positive amount).
    Ignored,
    Damaged,
    /// This call latched the death flag.
    Died,
}

/// A clamped pool with an optional death latch.
///
/// Invariant: `0 <= current <= max`. `is_dead` is only ever set on health
/// pools and only cleared by [`ResourcePool::respawn`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourcePool {
    kind: PoolKind,
    current: f32,
    max: f32,
    is_dead: bool,
}

impl ResourcePool {
    pub fn health(max: f32) -> Self {
        Self::full(PoolKind::Health, max)
    }

    pub fn mana(max: f32) -> Self {
        Self::full(PoolKind::Mana, max)
    }

    fn full(kind: PoolKind, max: f32) -> Self {
        let max = if max.is_finite() { max.max(0.0) } else { 0.0 };
        Self {
            kind,
            current: max,
            max,
            is_dead: false,
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn is_dead(&self) -> bool {
        self.is_dead
    }

    pub fn ratio(&self) -> f32 {
        if self.max > 0.0 {
            self.current / self.max
        } else {
            0.0
        }
    }

    pub fn apply_damage(&mut self, amount: f32) -> DamageOutcome {
        if self.is_dead || !amount.is_finite() || amount <= 0.0 {
            return DamageOutcome::Ignored;
        }

        self.current = (self.current - amount).max(0.0);
        if self.current <= 0.0 && self.kind == PoolKind::Health {
            self.is_dead = true;
            return DamageOutcome::Died;
        }
        DamageOutcome::Damaged
    }

    pub fn can_afford(&self, amount: f32) -> bool {
        self.current >= amount
    }

    /// Checks the balance and, for the authority only, pays for it.
    pub fn try_consume(&mut self, amount: f32, role: Role) -> bool {
        if !amount.is_finite() || amount < 0.0 || !self.can_afford(amount) {
            return false;
        }
        if role == Role::Authority {
            self.current -= amount;
        }
        true
    }

    pub fn regenerate(&mut self, rate: f32, dt: f32) {
        if self.is_dead || !rate.is_finite() || rate <= 0.0 || dt <= 0.0 {
            return;
        }
        self.current = (self.current + rate * dt).min(self.max);
    }

    /// Refills the pool and clears the death latch. Returns false (and changes
    /// nothing) when the pool is not dead.
    pub fn respawn(&mut self) -> bool {
        if !self.is_dead {
            return false;
        }
        self.current = self.max;
        self.is_dead = false;
        true
    }

    /// Resets a pool that has no death latch (mana) back to full.
    pub fn refill(&mut self) {
        self.current = self.max;
    }

    /// Overwrites the value from a replicated snapshot (proxies only).
    pub fn sync_from_snapshot(&mut self, current: f32, is_dead: bool) {
        self.current = current.clamp(0.0, self.max);
        self.is_dead = is_dead && self.kind == PoolKind::Health;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_and_regen_sequences_stay_within_bounds() {
        let mut pool = ResourcePool::mana(50.0);
        let steps: [(bool, f32); 8] = [
            (true, 20.0),
            (false, 100.0),
            (true, 80.0),
            (true, 1.0),
            (false, 0.5),
            (true, -3.0),
            (false, f32::NAN),
            (true, f32::INFINITY),
        ];

        for (is_damage, amount) in steps {
            if is_damage {
                pool.apply_damage(amount);
            } else {
                pool.regenerate(amount, 0.25);
            }
            assert!(pool.current() >= 0.0);
            assert!(pool.current() <= pool.max());
        }
    }

    #[test]
    fn when_health_reaches_zero_then_death_latches_once() {
        let mut health = ResourcePool::health(30.0);

        assert_eq!(health.apply_damage(10.0), DamageOutcome::Damaged);
        assert_eq!(health.apply_damage(25.0), DamageOutcome::Died);
        assert!(health.is_dead());
        assert_eq!(health.current(), 0.0);

        assert_eq!(health.apply_damage(5.0), DamageOutcome::Ignored);
        health.regenerate(10.0, 1.0);
        assert_eq!(health.current(), 0.0);
        assert!(health.is_dead());
    }

    #[test]
    fn when_mana_is_drained_then_it_never_latches_death() {
        let mut mana = ResourcePool::mana(10.0);

        assert_eq!(mana.apply_damage(50.0), DamageOutcome::Damaged);
        assert!(!mana.is_dead());
    }

    #[test]
    fn proxy_consume_only_checks_the_balance() {
        let mut mana = ResourcePool::mana(30.0);

        assert!(mana.try_consume(20.0, Role::Proxy));
        assert_eq!(mana.current(), 30.0);

        assert!(mana.try_consume(20.0, Role::Authority));
        assert_eq!(mana.current(), 10.0);

        assert!(!mana.try_consume(20.0, Role::Authority));
        assert_eq!(mana.current(), 10.0);
    }

    #[test]
    fn when_not_dead_then_respawn_is_a_no_op() {
        let mut health = ResourcePool::health(100.0);
        health.apply_damage(40.0);

        assert!(!health.respawn());
        assert_eq!(health.current(), 60.0);

        health.apply_damage(100.0);
        assert!(health.respawn());
        assert_eq!(health.current(), 100.0);
        assert!(!health.is_dead());
    }
}
