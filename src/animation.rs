use na::Vector3;
use nalgebra as na;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use super::scene::Scene;

/// 電荷をランダムな方向に等速で動かし、枠に当たったら跳ね返らせるアニメーション。
/// 方向は電荷ごとに最初に一度だけ決める。
pub struct Drift {
    directions: Vec<Vector3<f64>>,
}

impl Drift {
    /// x方向の枠。
    pub const BOUND_X: f64 = 5.5;
    /// y方向の枠。
    pub const BOUND_Y: f64 = 3.5;
    // 1ステップで進む距離の各成分の上限
    const SPEED: f64 = 0.2;

    /// シーンの電荷の数だけ方向を決める。
    /// 各成分は[0, SPEED)の一様乱数で、z方向には動かさない。
    pub fn new<R: Rng + ?Sized>(scene: &Scene, rng: &mut R) -> Self {
        let uniform = Uniform::new(0.0, Self::SPEED);
        let directions = (0..scene.len())
            .map(|_| Vector3::new(uniform.sample(rng), uniform.sample(rng), 0.0))
            .collect();
        Self { directions }
    }

    pub fn directions(&self) -> &[Vector3<f64>] {
        &self.directions
    }

    /// 1ステップ分電荷を動かす。
    /// 枠を超えた場合はその成分の向きを反転し、次のステップから戻り始める。
    /// 生成後に追加された電荷は動かさない。
    pub fn step(&mut self, scene: &mut Scene) {
        for (charge, direction) in scene.charges_mut().iter_mut().zip(self.directions.iter_mut()) {
            let pos = charge.position() + *direction;
            if pos.x.abs() > Self::BOUND_X {
                direction.x = -direction.x;
            }
            if pos.y.abs() > Self::BOUND_Y {
                direction.y = -direction.y;
            }
            charge.set_position(pos);
        }
    }
}
