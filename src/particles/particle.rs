use cgmath::{Vector2, Vector3, Zero};

/// Downward acceleration applied in proportion to a particle's gravity effect.
pub const GRAVITY: f32 = -10.0;

/// How a particle walks through a square texture atlas over its life.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atlas {
    /// Rows (and columns) in the atlas.
    pub rows: u32,
    /// How many times the atlas is played over one life.
    pub stage_cycles: f32,
}

impl Atlas {
    /// Atlas coordinates of the top-left corner of stage `index`.
    pub fn offset(&self, index: u32) -> Vector2<f32> {
        let rows = self.rows.max(1);
        let column = index % rows;
        let row = index / rows;
        Vector2::new(column as f32 / rows as f32, row as f32 / rows as f32)
    }
}

/// One live particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub gravity_effect: f32,
    pub life_length: f32,
    /// Degrees around the view axis.
    pub rotation: f32,
    pub scale: f32,
    atlas: Atlas,
    elapsed_time: f32,
    transparency: f32,
    texture_offset1: Vector2<f32>,
    texture_offset2: Vector2<f32>,
    texture_blend_factor: f32,
}

impl Particle {
    pub fn new(
        atlas: Atlas,
        position: Vector3<f32>,
        velocity: Vector3<f32>,
        gravity_effect: f32,
        life_length: f32,
        rotation: f32,
        scale: f32,
    ) -> Self {
        Self {
            position,
            velocity,
            gravity_effect,
            life_length,
            rotation,
            scale,
            atlas,
            elapsed_time: 0.0,
            transparency: 0.0,
            texture_offset1: Vector2::zero(),
            texture_offset2: Vector2::zero(),
            texture_blend_factor: 0.0,
        }
    }

    /// Advances the particle by `delta` seconds. Returns `false` once it has
    /// faded out and should be removed.
    ///
    /// Past its life length a particle keeps moving while its transparency
    /// rises by one per second.
    pub fn update(&mut self, delta: f32) -> bool {
        self.velocity.y += GRAVITY * self.gravity_effect * delta;
        self.position += self.velocity * delta;
        self.elapsed_time += delta;

        if self.elapsed_time > self.life_length {
            self.transparency += delta;
        }
        if !self.is_alive() {
            return false;
        }

        self.update_texture_coordinates();
        true
    }

    fn update_texture_coordinates(&mut self) {
        let life_factor = if self.life_length > 0.0 {
            self.atlas.stage_cycles * self.elapsed_time / self.life_length
        } else {
            0.0
        };
        let stage_count = self.atlas.rows.max(1).pow(2);
        let progression = life_factor.fract() * stage_count as f32;
        let index1 = (progression.floor() as u32).min(stage_count - 1);
        let index2 = if index1 < stage_count - 1 {
            index1 + 1
        } else {
            index1
        };
        self.texture_blend_factor = progression.fract();
        self.texture_offset1 = self.atlas.offset(index1);
        self.texture_offset2 = self.atlas.offset(index2);
    }

    pub fn is_alive(&self) -> bool {
        self.transparency < 1.0
    }

    pub fn elapsed_time(&self) -> f32 {
        self.elapsed_time
    }

    /// 0 is opaque, 1 is gone.
    pub fn transparency(&self) -> f32 {
        self.transparency
    }

    pub fn texture_offsets(&self) -> (Vector2<f32>, Vector2<f32>) {
        (self.texture_offset1, self.texture_offset2)
    }

    /// How far the current atlas stage has blended into the next one.
    pub fn texture_blend_factor(&self) -> f32 {
        self.texture_blend_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn particle(rows: u32, stage_cycles: f32) -> Particle {
        Particle::new(
            Atlas { rows, stage_cycles },
            Vector3::zero(),
            Vector3::zero(),
            0.0,
            4.0,
            0.0,
            1.0,
        )
    }

    #[test]
    fn atlas_offsets_walk_rows_then_columns() {
        let atlas = Atlas { rows: 4, stage_cycles: 1.0 };
        assert_eq!(atlas.offset(0), Vector2::new(0.0, 0.0));
        assert_eq!(atlas.offset(1), Vector2::new(0.25, 0.0));
        assert_eq!(atlas.offset(5), Vector2::new(0.25, 0.25));
    }

    #[test]
    fn stage_advances_with_life() {
        // 2x2 atlas played once over 4 s: 1 s per stage.
        let mut p = particle(2, 1.0);
        assert!(p.update(1.5));
        let (first, second) = p.texture_offsets();
        assert_eq!(first, Vector2::new(0.5, 0.0));
        assert_eq!(second, Vector2::new(0.0, 0.5));
        assert!((p.texture_blend_factor() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn last_stage_blends_into_itself() {
        let mut p = particle(2, 1.0);
        assert!(p.update(3.5));
        let (first, second) = p.texture_offsets();
        assert_eq!(first, second);
        assert_eq!(first, Vector2::new(0.5, 0.5));
    }

    #[test]
    fn gravity_pulls_down() {
        let mut p = particle(1, 1.0);
        p.gravity_effect = 1.0;
        p.update(0.5);
        assert_eq!(p.velocity.y, -5.0);
        assert_eq!(p.position.y, -2.5);
    }

    #[test]
    fn fades_after_life_length() {
        let mut p = particle(1, 1.0);
        assert!(!p.update(4.5));
        assert_eq!(p.transparency(), 4.5);
        assert!(!p.is_alive());

        let mut p = particle(1, 1.0);
        assert!(p.update(4.0));
        assert!(p.update(0.5));
        assert!((p.transparency() - 0.5).abs() < 1e-5);
        assert!(!p.update(0.6));
    }
}
