use na::Vector3;
use nalgebra as na;

use super::charge::Charge;
use super::field::{FieldSample, ScalarField};

/// シーンのビルダー用構造体。
pub struct SceneBuilder {
    charges: Vec<Charge>,
}

impl SceneBuilder {
    /// 点電荷を追加する
    pub fn add_charge(mut self, position: Vector3<f64>, magnitude: f64) -> Self {
        self.charges.push(Charge::new(position, magnitude));
        self
    }

    pub fn build(self) -> Scene {
        Scene {
            charges: self.charges,
        }
    }
}

/// 点電荷の集合を保持するシーン構造体。
/// 各電荷の場を足し合わせたものがシーン全体のスカラー場になる。
///
/// 電荷の集合はシーンが所有し、レンダラーやアニメーションには参照で渡す。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    charges: Vec<Charge>,
}

impl Scene {
    /// 空のシーンを作る。
    pub fn new() -> Self {
        Self::default()
    }

    /// シーンのビルダーオブジェクトを生成する。
    pub fn builder() -> SceneBuilder {
        SceneBuilder { charges: vec![] }
    }

    /// count個の電荷をすべて原点に置いたシーン。
    /// アニメーションで散らばらせる前提の初期配置。
    pub fn cluster(count: usize, magnitude: f64) -> Self {
        Self {
            charges: vec![Charge::at_origin(magnitude); count],
        }
    }

    /// 原点を囲むように単位電荷を4つ置いたシーン。
    pub fn quad() -> Self {
        Self::builder()
            .add_charge(Vector3::new(0.0, 2.0, 0.0), 1.0)
            .add_charge(Vector3::new(-2.0, 0.0, 0.0), 1.0)
            .add_charge(Vector3::new(2.0, 0.0, 0.0), 1.0)
            .add_charge(Vector3::new(0.0, -2.0, 0.0), 1.0)
            .build()
    }

    pub fn push(&mut self, charge: Charge) {
        self.charges.push(charge);
    }

    pub fn charges(&self) -> &[Charge] {
        &self.charges
    }

    pub fn charges_mut(&mut self) -> &mut [Charge] {
        &mut self.charges
    }

    pub fn len(&self) -> usize {
        self.charges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charges.is_empty()
    }
}

impl From<Vec<Charge>> for Scene {
    fn from(charges: Vec<Charge>) -> Self {
        Self { charges }
    }
}

impl ScalarField for Scene {
    fn field_at(&self, position: &Vector3<f64>) -> FieldSample {
        let mut sample = FieldSample::zero();
        for charge in &self.charges {
            sample += charge.field_at(position);
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn field_is_superposition_of_charges() {
        let scene = Scene::builder()
            .add_charge(Vector3::new(1.0, 0.0, 0.0), 1.0)
            .add_charge(Vector3::new(-1.0, 0.5, 0.0), 2.5)
            .add_charge(Vector3::new(0.0, 0.0, -3.0), -0.75)
            .build();

        for p in &[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.2, -1.3, 2.0),
            Vector3::new(4.0, 4.0, 4.0),
        ] {
            let expected = scene
                .charges()
                .iter()
                .map(|c| c.field_at(p))
                .fold(FieldSample::zero(), |acc, s| acc + s);
            let sample = scene.field_at(p);
            assert_relative_eq!(sample.value, expected.value, max_relative = 1e-12);
            assert_relative_eq!(sample.gradient, expected.gradient, max_relative = 1e-12);
        }
    }

    #[test]
    fn empty_scene_is_zero_everywhere() {
        let scene = Scene::new();
        assert!(scene.is_empty());
        assert_eq!(scene.field_at(&Vector3::new(1.0, 2.0, 3.0)), FieldSample::zero());
    }

    #[test]
    fn quad_scene_at_origin_sums_to_one() {
        let scene = Scene::quad();
        assert_eq!(scene.len(), 4);
        let sample = scene.field_at(&Vector3::zeros());
        assert_relative_eq!(sample.value, 1.0, epsilon = 1e-12);
        assert_relative_eq!(sample.gradient, Vector3::zeros(), epsilon = 1e-12);
    }

    #[test]
    fn cluster_places_every_charge_at_origin() {
        let scene = Scene::cluster(5, 1.5);
        assert_eq!(scene.len(), 5);
        assert!(scene
            .charges()
            .iter()
            .all(|c| *c.position() == Vector3::zeros() && c.magnitude() == 1.5));
    }
}
