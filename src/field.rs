use std::ops::{Add, AddAssign};

use na::Vector3;
use nalgebra as na;

/// ある位置でのスカラー場の値とその勾配。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldSample {
    pub value: f64,
    pub gradient: Vector3<f64>,
}

impl FieldSample {
    pub fn new(value: f64, gradient: Vector3<f64>) -> Self {
        Self { value, gradient }
    }

    /// 何もない空間での値。重ね合わせの初期値として使う。
    pub fn zero() -> Self {
        Self {
            value: 0.0,
            gradient: Vector3::zeros(),
        }
    }
}

impl Add for FieldSample {
    type Output = FieldSample;

    fn add(self, other: FieldSample) -> FieldSample {
        FieldSample {
            value: self.value + other.value,
            gradient: self.gradient + other.gradient,
        }
    }
}

impl AddAssign for FieldSample {
    fn add_assign(&mut self, other: FieldSample) {
        self.value += other.value;
        self.gradient += other.gradient;
    }
}

/// 位置からスカラー値と勾配を返す場。
///
/// レンダリング中は複数のワーカースレッドから同時に呼ばれるので、
/// 実装は`&self`だけで完結する純粋な関数でなければならない。
pub trait ScalarField {
    fn field_at(&self, position: &Vector3<f64>) -> FieldSample;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_add_componentwise() {
        let mut a = FieldSample::new(1.0, Vector3::new(1.0, 0.0, -1.0));
        let b = FieldSample::new(0.5, Vector3::new(0.0, 2.0, 1.0));
        assert_eq!(a + b, FieldSample::new(1.5, Vector3::new(1.0, 2.0, 0.0)));

        a += b;
        assert_eq!(a, FieldSample::new(1.5, Vector3::new(1.0, 2.0, 0.0)));
    }

    #[test]
    fn zero_is_identity() {
        let a = FieldSample::new(0.25, Vector3::new(3.0, 4.0, 5.0));
        assert_eq!(FieldSample::zero() + a, a);
    }
}
