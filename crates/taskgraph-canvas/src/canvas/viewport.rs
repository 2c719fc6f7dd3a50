//! Viewport - pan/zoom transform between screen and world
//!
//! `screen = world * scale + offset`. Scale is uniform and always clamped to
//! `[min_scale, max_scale]`, so the transform is invertible at all times.
//!
//! # Methods
//! - `screen_to_world(pos)` / `world_to_screen(pos)` - exact inverses
//! - `zoom_at(screen_pos, factor)` - zoom keeping the world point under the cursor fixed
//! - `pan(delta)` - shift by a screen-space delta

use egui::{Pos2, Rect, Vec2};
use taskgraph_types::SavedViewport;

use crate::config::ViewportSettings;

/// 2D viewport with pan offset (screen units) and uniform scale
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    offset: Vec2,
    scale: f32,
    /// Zoom limits
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewportSettings::default())
    }
}

impl Viewport {
    pub fn new(settings: ViewportSettings) -> Self {
        // Scale must stay positive for the transform to be invertible
        let min_scale = settings.min_scale.max(f32::EPSILON);
        let max_scale = settings.max_scale.max(min_scale);
        Self {
            offset: Vec2::ZERO,
            scale: 1.0_f32.clamp(min_scale, max_scale),
            min_scale,
            max_scale,
        }
    }

    // =========================================================================
    // CURRENT VALUES
    // =========================================================================

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    // =========================================================================
    // COORDINATE TRANSFORMS
    // =========================================================================

    /// Transform screen position to world position
    pub fn screen_to_world(&self, screen_pos: Pos2) -> Pos2 {
        Pos2::new(
            (screen_pos.x - self.offset.x) / self.scale,
            (screen_pos.y - self.offset.y) / self.scale,
        )
    }

    /// Transform world position to screen position
    pub fn world_to_screen(&self, world_pos: Pos2) -> Pos2 {
        Pos2::new(
            world_pos.x * self.scale + self.offset.x,
            world_pos.y * self.scale + self.offset.y,
        )
    }

    /// World-space rect visible in a screen of the given size
    pub fn visible_bounds(&self, screen_size: Vec2) -> Rect {
        Rect::from_min_max(
            self.screen_to_world(Pos2::ZERO),
            self.screen_to_world(screen_size.to_pos2()),
        )
    }

    // =========================================================================
    // CONTROLS
    // =========================================================================

    /// Pan by delta in screen coordinates
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.offset += screen_delta;
    }

    /// Zoom by factor, keeping the world point under `screen_pos` fixed.
    ///
    /// The offset is solved against the clamped scale, so the anchor also
    /// holds when the zoom stops at a limit.
    pub fn zoom_at(&mut self, screen_pos: Pos2, factor: f32) {
        let anchor = self.screen_to_world(screen_pos);
        self.scale = self.clamp_scale(self.scale * factor);
        self.offset = Vec2::new(
            screen_pos.x - anchor.x * self.scale,
            screen_pos.y - anchor.y * self.scale,
        );
    }

    /// Set scale directly (clamped), keeping the offset
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = self.clamp_scale(scale);
    }

    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Reset to identity transform
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.scale = self.clamp_scale(1.0);
    }

    fn clamp_scale(&self, scale: f32) -> f32 {
        if scale.is_finite() && scale > 0.0 {
            scale.clamp(self.min_scale, self.max_scale)
        } else {
            self.scale
        }
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    pub fn restore(&mut self, saved: &SavedViewport) {
        self.offset = Vec2::new(saved.offset_x, saved.offset_y);
        self.set_scale(saved.scale);
    }

    pub fn to_saved(&self) -> SavedViewport {
        SavedViewport {
            scale: self.scale,
            offset_x: self.offset.x,
            offset_y: self.offset.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f32 = 1e-3;

    fn approx(a: Pos2, b: Pos2) -> bool {
        (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS
    }

    #[test]
    fn test_screen_to_world_formula() {
        let mut viewport = Viewport::default();
        viewport.set_offset(Vec2::new(100.0, 50.0));
        viewport.set_scale(2.0);
        assert_eq!(
            viewport.screen_to_world(Pos2::new(300.0, 250.0)),
            Pos2::new(100.0, 100.0)
        );
        assert_eq!(
            viewport.world_to_screen(Pos2::new(100.0, 100.0)),
            Pos2::new(300.0, 250.0)
        );
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut viewport = Viewport::default();
        viewport.pan(Vec2::new(40.0, -20.0));
        let cursor = Pos2::new(320.0, 240.0);
        let before = viewport.screen_to_world(cursor);
        viewport.zoom_at(cursor, 1.5);
        assert!((viewport.scale() - 1.5).abs() < EPS);
        assert!(approx(viewport.screen_to_world(cursor), before));
    }

    #[test]
    fn test_zoom_clamps_at_limits() {
        let mut viewport = Viewport::default();
        viewport.zoom_at(Pos2::new(10.0, 10.0), 100.0);
        assert_eq!(viewport.scale(), 2.0);
        viewport.zoom_at(Pos2::new(10.0, 10.0), 0.0001);
        assert_eq!(viewport.scale(), 0.5);
    }

    #[test]
    fn test_clamped_zoom_keeps_anchor() {
        let mut viewport = Viewport::default();
        viewport.set_scale(1.9);
        let cursor = Pos2::new(200.0, 200.0);
        let before = viewport.screen_to_world(cursor);
        viewport.zoom_at(cursor, 1.5);
        assert_eq!(viewport.scale(), 2.0);
        assert!(approx(viewport.screen_to_world(cursor), before));
    }

    #[test]
    fn test_non_finite_factor_is_ignored() {
        let mut viewport = Viewport::default();
        viewport.zoom_at(Pos2::ZERO, f32::NAN);
        assert_eq!(viewport.scale(), 1.0);
    }

    #[test]
    fn test_saved_roundtrip() {
        let mut viewport = Viewport::default();
        viewport.restore(&SavedViewport {
            scale: 9.0,
            offset_x: 12.0,
            offset_y: -4.0,
        });
        assert_eq!(viewport.scale(), 2.0);
        assert_eq!(viewport.offset(), Vec2::new(12.0, -4.0));
    }

    proptest! {
        #[test]
        fn prop_world_to_screen_inverts(
            sx in -5000.0f32..5000.0,
            sy in -5000.0f32..5000.0,
            ox in -2000.0f32..2000.0,
            oy in -2000.0f32..2000.0,
            scale in 0.5f32..2.0,
        ) {
            let mut viewport = Viewport::default();
            viewport.set_offset(Vec2::new(ox, oy));
            viewport.set_scale(scale);
            let screen = Pos2::new(sx, sy);
            let back = viewport.world_to_screen(viewport.screen_to_world(screen));
            prop_assert!((back.x - sx).abs() < 1e-2 && (back.y - sy).abs() < 1e-2);
        }

        #[test]
        fn prop_unclamped_zoom_preserves_anchor(
            sx in 0.0f32..1600.0,
            sy in 0.0f32..1200.0,
            factor in 0.8f32..1.25,
        ) {
            let mut viewport = Viewport::default();
            let cursor = Pos2::new(sx, sy);
            let before = viewport.screen_to_world(cursor);
            viewport.zoom_at(cursor, factor);
            let after = viewport.screen_to_world(cursor);
            prop_assert!((before.x - after.x).abs() < 1e-2);
            prop_assert!((before.y - after.y).abs() < 1e-2);
        }

        #[test]
        fn prop_scale_stays_clamped(factors in proptest::collection::vec(0.01f32..100.0, 1..40)) {
            let mut viewport = Viewport::default();
            for factor in factors {
                viewport.zoom_at(Pos2::new(400.0, 300.0), factor);
                prop_assert!(viewport.scale() >= 0.5 && viewport.scale() <= 2.0);
            }
        }
    }
}
