use glam::Vec3;

/// A cubic Bézier segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubicBezier {
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
    pub p3: Vec3,
}

impl CubicBezier {
    pub fn new(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Self {
        Self { p0, p1, p2, p3 }
    }

    pub fn point(&self, t: f32) -> Vec3 {
        let s = 1.0 - t;
        self.p0 * (s * s * s)
            + self.p1 * (3.0 * s * s * t)
            + self.p2 * (3.0 * s * t * t)
            + self.p3 * (t * t * t)
    }

    /// First derivative with respect to `t`.
    pub fn derivative(&self, t: f32) -> Vec3 {
        let s = 1.0 - t;
        (self.p1 - self.p0) * (3.0 * s * s)
            + (self.p2 - self.p1) * (6.0 * s * t)
            + (self.p3 - self.p2) * (3.0 * t * t)
    }

    /// `segments + 1` points at uniform parameter steps, ends included.
    pub fn sample(&self, segments: usize) -> Vec<Vec3> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point(i as f32 / segments as f32))
            .collect()
    }

    /// Polyline length over `segments` uniform steps.
    pub fn length_estimate(&self, segments: usize) -> f32 {
        self.sample(segments)
            .windows(2)
            .map(|w| w[0].distance(w[1]))
            .sum()
    }
}
