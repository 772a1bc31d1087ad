use na::Vector3;
use nalgebra as na;

use super::field::{FieldSample, ScalarField};

/// 点電荷。
/// 位置と電荷量を持ち、それ自体が逆二乗のスカラー場になる。
#[derive(Clone, Debug, PartialEq)]
pub struct Charge {
    position: Vector3<f64>,
    magnitude: f64,
}

impl Charge {
    pub fn new(position: Vector3<f64>, magnitude: f64) -> Self {
        Self {
            position,
            magnitude,
        }
    }

    /// 原点に置いた点電荷。
    pub fn at_origin(magnitude: f64) -> Self {
        Self::new(Vector3::zeros(), magnitude)
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    pub fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }
}

impl ScalarField for Charge {
    /// value = m / r^2、gradient = -2m (p - c) / r^4。
    /// 電荷と同じ位置では値が有限にならない。ここでは弾かずにそのまま返し、
    /// マーチ側で非有限のステップをmissとして扱う。
    fn field_at(&self, position: &Vector3<f64>) -> FieldSample {
        let disp = position - self.position;
        let radius2 = disp.norm_squared();
        let value = self.magnitude / radius2;
        FieldSample {
            value,
            gradient: -2.0 * value * (disp / radius2),
        }
    }
}
