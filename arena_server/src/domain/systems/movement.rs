// Player movement: hierarchical state machine (Grounded{Idle,Walk,Sprint} /
// Jumping), chained jumps and velocity-Verlet vertical integration.

use crate::domain::scheduler::{Scheduler, TimerHandle};
use crate::domain::state::{EntityId, InputEdges, PlayerInput};
use crate::domain::terrain::Terrain;
use crate::domain::tuning::PlayerTuning;
use crate::domain::world::ScheduledEvent;
use glam::{Vec2, Vec3};

pub const MAX_JUMPS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundedSubState {
    Idle,
    Walk,
    Sprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementState {
    Grounded(GroundedSubState),
    Jumping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementEvent {
    JumpPressed,
    Landed {
        movement_pressed: bool,
        sprint_pressed: bool,
    },
    InputChanged {
        movement_pressed: bool,
        sprint_pressed: bool,
    },
}

/// Leaf state for a grounded character. Sprint without a direction does not move.
pub fn grounded_sub_state(movement_pressed: bool, sprint_pressed: bool) -> GroundedSubState {
    match (movement_pressed, sprint_pressed) {
        (false, false) => GroundedSubState::Idle,
        (false, true) => GroundedSubState::Idle,
        (true, false) => GroundedSubState::Walk,
        (true, true) => GroundedSubState::Sprint,
    }
}

pub fn transition(state: MovementState, event: MovementEvent) -> MovementState {
    match (state, event) {
        (MovementState::Grounded(_), MovementEvent::JumpPressed) => MovementState::Jumping,
        (
            MovementState::Grounded(_),
            MovementEvent::InputChanged {
                movement_pressed,
                sprint_pressed,
            },
        ) => MovementState::Grounded(grounded_sub_state(movement_pressed, sprint_pressed)),
        (
            MovementState::Jumping,
            MovementEvent::Landed {
                movement_pressed,
                sprint_pressed,
            },
        ) => MovementState::Grounded(grounded_sub_state(movement_pressed, sprint_pressed)),
        // Airborne jumps and stray landings leave the state alone.
        (state, _) => state,
    }
}

/// Initial velocities and gravities for each jump in a chain.
/// Index 0 is the gravity used when no jump is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpTable {
    velocities: [f32; 4],
    gravities: [f32; 4],
}

impl JumpTable {
    pub fn new(max_jump_height: f32, max_jump_time: f32) -> Self {
        let h = max_jump_height;
        let t = max_jump_time / 2.0;

        let v1 = 2.0 * h / t;
        let g1 = -2.0 * h / (t * t);
        let (h2, t2) = (h + 2.0, t * 1.25);
        let v2 = 2.0 * h2 / t2;
        let g2 = -2.0 * h2 / (t2 * t2);
        let (h3, t3) = (h + 4.0, t * 1.5);
        let v3 = 2.0 * h3 / t3;
        let g3 = -2.0 * h3 / (t3 * t3);

        Self {
            velocities: [0.0, v1, v2, v3],
            gravities: [g1, g1, g2, g3],
        }
    }

    pub fn velocity(&self, jump_count: u8) -> f32 {
        self.velocities[usize::from(jump_count.min(MAX_JUMPS))]
    }

    pub fn gravity(&self, jump_count: u8) -> f32 {
        self.gravities[usize::from(jump_count.min(MAX_JUMPS))]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnimationFlags {
    pub is_grounded: bool,
    pub is_jumping: bool,
    pub is_idle: bool,
    pub is_walking: bool,
    pub is_sprinting: bool,
}

pub struct MovementContext {
    pub state: MovementState,
    /// Input in effect this tick.
    pub input: PlayerInput,
    /// Last input the client actually delivered; presses are measured
    /// against it.
    pub delivered_input: PlayerInput,
    pub edges: InputEdges,
    /// Velocity carried between ticks (y is the vertical velocity).
    pub current_movement: Vec3,
    /// Velocity actually applied this tick after integration.
    pub applied_movement: Vec3,
    pub jump_count: u8,
    pub jump_table: JumpTable,
    pub grounded: bool,
    pub pending_jump_reset: Option<TimerHandle>,
    pub animation: AnimationFlags,
    pub radius: f32,
}

impl MovementContext {
    pub fn new(tuning: &PlayerTuning) -> Self {
        Self::standing(
            JumpTable::new(tuning.max_jump_height, tuning.max_jump_time),
            tuning.radius,
        )
    }

    fn standing(jump_table: JumpTable, radius: f32) -> Self {
        Self {
            state: MovementState::Grounded(GroundedSubState::Idle),
            input: PlayerInput::default(),
            delivered_input: PlayerInput::default(),
            edges: InputEdges::default(),
            current_movement: Vec3::ZERO,
            applied_movement: Vec3::ZERO,
            jump_count: 0,
            jump_table,
            grounded: true,
            pending_jump_reset: None,
            animation: AnimationFlags {
                is_grounded: true,
                is_idle: true,
                ..Default::default()
            },
            radius,
        }
    }

    /// Takes a delivered input and recomputes button presses.
    pub fn observe_input(&mut self, input: PlayerInput) {
        self.edges = InputEdges::between(&self.delivered_input, &input);
        self.delivered_input = input;
        self.input = input;
    }

    /// Nothing arrived this tick: continuous fields repeat, buttons read as
    /// released and nothing is pressed. The press baseline is untouched, so
    /// a button still held when delivery resumes does not fire again.
    pub fn hold_input(&mut self) {
        self.input = self.input.without_edges();
        self.edges = InputEdges::default();
    }

    /// Applies this tick's delivery, or holds the last one when none came.
    pub fn advance_input(&mut self, input: Option<PlayerInput>) {
        match input {
            Some(input) => self.observe_input(input),
            None => self.hold_input(),
        }
    }

    /// Back to a standing start. Returns the pending reset timer for the
    /// caller to cancel.
    pub fn reset(&mut self) -> Option<TimerHandle> {
        let pending = self.pending_jump_reset.take();
        *self = Self::standing(self.jump_table, self.radius);
        pending
    }
}

/// Everything a movement tick needs besides the character itself.
pub struct MovementEnv<'a> {
    pub tuning: &'a PlayerTuning,
    pub terrain: &'a dyn Terrain,
    pub scheduler: &'a mut Scheduler<ScheduledEvent>,
    pub tick: u64,
    pub dt: f32,
    pub reset_grace_ticks: u64,
}

/// Maps stick input onto the ground plane relative to the camera yaw (degrees).
pub fn camera_relative(move_dir: Vec2, camera_yaw: f32) -> Vec3 {
    let yaw = camera_yaw.to_radians();
    let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
    let right = Vec3::new(yaw.cos(), 0.0, -yaw.sin());
    let dir = forward * move_dir.y + right * move_dir.x;
    if dir.length_squared() > 1.0 {
        dir.normalize()
    } else {
        dir
    }
}

/// Advances one character by one tick and returns its new position and yaw.
pub fn tick_player(
    ctx: &mut MovementContext,
    entity: EntityId,
    position: Vec3,
    yaw: f32,
    input: Option<PlayerInput>,
    env: &mut MovementEnv<'_>,
) -> (Vec3, f32) {
    ctx.advance_input(input);

    let movement_pressed = ctx.input.movement_pressed();
    let sprint_pressed = ctx.input.sprint;

    // Resolve the transition driven by input.
    let event = if ctx.edges.jump {
        MovementEvent::JumpPressed
    } else {
        MovementEvent::InputChanged {
            movement_pressed,
            sprint_pressed,
        }
    };
    let next = transition(ctx.state, event);
    change_state(ctx, next, env);

    update_horizontal(ctx, env.tuning);
    update_vertical(ctx, env.tuning, env.dt);

    let motion = env.terrain.move_character(
        position,
        ctx.applied_movement * env.dt,
        ctx.radius,
    );
    ctx.grounded = motion.grounded;
    if motion.grounded {
        ctx.current_movement.y = ctx.current_movement.y.max(0.0);
    }

    if ctx.state == MovementState::Jumping && motion.grounded {
        let next = transition(
            ctx.state,
            MovementEvent::Landed {
                movement_pressed,
                sprint_pressed,
            },
        );
        change_state(ctx, next, env);
        schedule_jump_reset(ctx, entity, env);
    }

    let horizontal = Vec3::new(ctx.applied_movement.x, 0.0, ctx.applied_movement.z);
    let yaw = if horizontal.length_squared() > 1e-6 {
        horizontal.x.atan2(horizontal.z)
    } else {
        yaw
    };

    (motion.position, yaw)
}

/// Fired by the scheduler once the grace period on the ground has elapsed.
pub fn reset_jump_count(ctx: &mut MovementContext) {
    ctx.jump_count = 0;
    ctx.pending_jump_reset = None;
}

fn change_state(ctx: &mut MovementContext, next: MovementState, env: &mut MovementEnv<'_>) {
    if next == ctx.state {
        return;
    }
    exit_state(ctx, ctx.state, next);
    let previous = ctx.state;
    ctx.state = next;
    enter_state(ctx, previous, next, env);
}

fn exit_state(ctx: &mut MovementContext, state: MovementState, next: MovementState) {
    match (state, next) {
        // Sub-state swaps stay inside the Grounded super-state.
        (MovementState::Grounded(_), MovementState::Grounded(_)) => {}
        (MovementState::Grounded(_), _) => {
            ctx.animation.is_grounded = false;
            ctx.animation.is_idle = false;
            ctx.animation.is_walking = false;
            ctx.animation.is_sprinting = false;
        }
        (MovementState::Jumping, _) => {
            ctx.animation.is_jumping = false;
        }
    }
}

fn enter_state(
    ctx: &mut MovementContext,
    previous: MovementState,
    state: MovementState,
    env: &mut MovementEnv<'_>,
) {
    match state {
        MovementState::Grounded(sub) => {
            if !matches!(previous, MovementState::Grounded(_)) {
                ctx.animation.is_grounded = true;
                ctx.animation.is_jumping = false;
            }
            enter_sub_state(ctx, sub);
        }
        MovementState::Jumping => handle_jump(ctx, env),
    }
}

fn enter_sub_state(ctx: &mut MovementContext, sub: GroundedSubState) {
    ctx.animation.is_idle = sub == GroundedSubState::Idle;
    ctx.animation.is_walking = sub == GroundedSubState::Walk;
    ctx.animation.is_sprinting = sub == GroundedSubState::Sprint;
    if sub == GroundedSubState::Idle {
        ctx.current_movement.x = 0.0;
        ctx.current_movement.z = 0.0;
        ctx.applied_movement.x = 0.0;
        ctx.applied_movement.z = 0.0;
    }
}

fn handle_jump(ctx: &mut MovementContext, env: &mut MovementEnv<'_>) {
    if let Some(handle) = ctx.pending_jump_reset.take() {
        env.scheduler.cancel(handle);
    }
    ctx.jump_count = (ctx.jump_count + 1).min(MAX_JUMPS);
    let velocity = ctx.jump_table.velocity(ctx.jump_count);
    ctx.current_movement.y = velocity;
    ctx.applied_movement.y = velocity;
    ctx.animation.is_jumping = true;
}

fn schedule_jump_reset(ctx: &mut MovementContext, entity: EntityId, env: &mut MovementEnv<'_>) {
    if let Some(handle) = ctx.pending_jump_reset.take() {
        env.scheduler.cancel(handle);
    }
    if ctx.jump_count >= MAX_JUMPS {
        ctx.jump_count = 0;
        return;
    }
    let fire_at = env.tick + env.reset_grace_ticks;
    ctx.pending_jump_reset = Some(
        env.scheduler
            .schedule(fire_at, ScheduledEvent::ResetJumpCount(entity)),
    );
}

fn update_horizontal(ctx: &mut MovementContext, tuning: &PlayerTuning) {
    let speed = match ctx.state {
        MovementState::Grounded(GroundedSubState::Idle) => 0.0,
        MovementState::Grounded(GroundedSubState::Walk) => tuning.walk_speed,
        MovementState::Grounded(GroundedSubState::Sprint) => {
            tuning.walk_speed * tuning.sprint_multiplier
        }
        MovementState::Jumping => tuning.walk_speed * tuning.air_control,
    };
    let dir = camera_relative(ctx.input.move_dir, ctx.input.camera_yaw);
    ctx.current_movement.x = dir.x * speed;
    ctx.current_movement.z = dir.z * speed;
    ctx.applied_movement.x = ctx.current_movement.x;
    ctx.applied_movement.z = ctx.current_movement.z;
}

fn update_vertical(ctx: &mut MovementContext, tuning: &PlayerTuning, dt: f32) {
    match ctx.state {
        MovementState::Grounded(_) => {
            ctx.current_movement.y = tuning.grounded_gravity;
            ctx.applied_movement.y = tuning.grounded_gravity;
        }
        MovementState::Jumping => {
            let falling = ctx.current_movement.y <= 0.0 || !ctx.input.jump;
            let gravity = ctx.jump_table.gravity(ctx.jump_count);
            let previous = ctx.current_movement.y;
            if falling {
                ctx.current_movement.y = previous + gravity * tuning.fall_multiplier * dt;
                ctx.applied_movement.y =
                    ((previous + ctx.current_movement.y) * 0.5).max(-tuning.terminal_velocity);
            } else {
                ctx.current_movement.y = previous + gravity * dt;
                ctx.applied_movement.y = (previous + ctx.current_movement.y) * 0.5;
            }
            ctx.current_movement.y = ctx.current_movement.y.max(-tuning.terminal_velocity);
        }
    }
}
