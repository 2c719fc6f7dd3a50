//! Animation clock - pulse phase and completion particles
//!
//! UI-only state, advanced by `tick(dt)` once per frame. Nothing here feeds
//! back into the scene.

use egui::{Pos2, Vec2};
use std::f32::consts::TAU;

use crate::config::AnimationSettings;

/// Particle speed in world units per second
const PARTICLE_SPEED: f32 = 90.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub pos: Pos2,
    pub velocity: Vec2,
    /// Seconds left
    pub life: f32,
}

impl Particle {
    /// Remaining life in `[0, 1]`, for fading
    pub fn alpha(&self, max_life: f32) -> f32 {
        if max_life <= 0.0 {
            0.0
        } else {
            (self.life / max_life).clamp(0.0, 1.0)
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationClock {
    settings: AnimationSettings,
    phase: f32,
    particles: Vec<Particle>,
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self::new(AnimationSettings::default())
    }
}

impl AnimationClock {
    pub fn new(settings: AnimationSettings) -> Self {
        Self {
            settings,
            phase: 0.0,
            particles: Vec::new(),
        }
    }

    /// Advance by `dt` seconds. Returns true while particles are alive.
    pub fn tick(&mut self, dt: f32) -> bool {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.phase = (self.phase + dt * self.settings.pulse_speed) % TAU;
        for particle in &mut self.particles {
            particle.pos += particle.velocity * dt;
            particle.life -= dt;
        }
        self.particles.retain(|p| p.life > 0.0);
        !self.particles.is_empty()
    }

    /// Pulse intensity in `[0, 1]` for in-progress cards
    pub fn pulse(&self) -> f32 {
        0.5 + 0.5 * self.phase.sin()
    }

    /// Radial burst centred on `center`
    pub fn burst(&mut self, center: Pos2) {
        let count = self.settings.burst_size;
        for i in 0..count {
            let angle = i as f32 * TAU / count as f32;
            self.particles.push(Particle {
                pos: center,
                velocity: Vec2::angled(angle) * PARTICLE_SPEED,
                life: self.settings.particle_life,
            });
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particle_life(&self) -> f32 {
        self.settings.particle_life
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_expires_after_life() {
        let mut clock = AnimationClock::default();
        clock.burst(Pos2::new(10.0, 10.0));
        assert_eq!(clock.particles().len(), 12);
        assert!(clock.tick(0.5));
        assert!(clock.particles()[0].pos != Pos2::new(10.0, 10.0));
        assert!(!clock.tick(0.5));
        assert!(clock.particles().is_empty());
    }

    #[test]
    fn test_pulse_stays_in_range() {
        let mut clock = AnimationClock::default();
        for _ in 0..100 {
            clock.tick(0.037);
            let p = clock.pulse();
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_bad_dt_is_ignored() {
        let mut clock = AnimationClock::default();
        clock.burst(Pos2::ZERO);
        clock.tick(f32::NAN);
        clock.tick(-1.0);
        assert_eq!(clock.particles().len(), 12);
    }
}
