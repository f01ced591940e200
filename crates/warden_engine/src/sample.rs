//! # Samples
//!
//! One observed event for one entity, as decoded by the interception layer.
//!
//! Samples are small `Copy` values. They move by value through the stripe
//! queues and are consumed exactly once, so there is nothing to recycle.

use warden_core::{Aabb, Vec3};

/// One movement tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementSample {
    /// Server tick the movement was observed at.
    pub tick: u64,
    /// Ticks since the previous movement sample.
    pub dt_ticks: i32,
    /// Round-trip latency in milliseconds.
    pub ping: u32,
    /// Absolute position after the move.
    pub position: Vec3,
    /// Displacement since the previous position.
    pub delta: Vec3,
    /// Yaw in degrees.
    pub yaw: f32,
    /// Pitch in degrees.
    pub pitch: f32,
    /// Standing on a block.
    pub on_ground: bool,
    /// Sprinting.
    pub sprinting: bool,
    /// Jump input held.
    pub jumping: bool,
    /// Ability flight.
    pub flying: bool,
    /// Elytra gliding.
    pub gliding: bool,
    /// Sneaking.
    pub sneaking: bool,
}

impl MovementSample {
    /// Observed horizontal displacement.
    #[inline]
    #[must_use]
    pub fn horizontal_distance(&self) -> f32 {
        self.delta.horizontal_length()
    }
}

/// One attack or interaction against another entity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CombatSample {
    /// Server tick of the interaction.
    pub tick: u64,
    /// Round-trip latency in milliseconds.
    pub ping: u32,
    /// Runtime id of the target.
    pub target_id: u64,
    /// Target feet position.
    pub target_position: Vec3,
    /// Target hitbox width.
    pub target_width: f32,
    /// Target hitbox height.
    pub target_height: f32,
    /// Attacker eye position.
    pub eye: Vec3,
    /// Attacker yaw in degrees.
    pub yaw: f32,
    /// Attacker pitch in degrees.
    pub pitch: f32,
}

impl CombatSample {
    /// Center of the target's hitbox.
    #[inline]
    #[must_use]
    pub fn target_center(&self) -> Vec3 {
        Aabb::from_feet(self.target_position, self.target_width, self.target_height).center()
    }
}

/// Packet cadence observation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketSample {
    /// Packets received in the current one-second window.
    pub packets_per_second: u32,
    /// An interaction arrived while the entity was sleeping.
    pub action_while_sleeping: bool,
}

/// Any sample the engine accepts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// Movement tick.
    Movement(MovementSample),
    /// Combat interaction.
    Combat(CombatSample),
    /// Packet cadence.
    Packet(PacketSample),
}

impl From<MovementSample> for Sample {
    fn from(sample: MovementSample) -> Self {
        Self::Movement(sample)
    }
}

impl From<CombatSample> for Sample {
    fn from(sample: CombatSample) -> Self {
        Self::Combat(sample)
    }
}

impl From<PacketSample> for Sample {
    fn from(sample: PacketSample) -> Self {
        Self::Packet(sample)
    }
}

/// Raw movement as known by a layer that only tracks absolute positions.
///
/// The engine derives the tick delta and displacement from entity state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MovementInput {
    /// Server tick.
    pub tick: u64,
    /// Absolute position.
    pub position: Vec3,
    /// Yaw in degrees.
    pub yaw: f32,
    /// Pitch in degrees.
    pub pitch: f32,
    /// Standing on a block.
    pub on_ground: bool,
    /// Sprinting.
    pub sprinting: bool,
    /// Jump input held.
    pub jumping: bool,
    /// Ability flight.
    pub flying: bool,
    /// Elytra gliding.
    pub gliding: bool,
    /// Sneaking.
    pub sneaking: bool,
}

/// Target of an interaction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TargetGeometry {
    /// Runtime id of the target.
    pub id: u64,
    /// Target feet position.
    pub position: Vec3,
    /// Hitbox width.
    pub width: f32,
    /// Hitbox height.
    pub height: f32,
}
