use na::Vector3;
use nalgebra as na;

use super::field::ScalarField;
use super::ray::Ray;

/// 描画する等値面の値。
pub const ISOVALUE: f64 = 1.0;
/// 等値面に収束したとみなす許容誤差。
pub const EPSILON: f64 = 0.001;
/// 1回のステップで進む距離の上限。
/// 電荷の近くで勾配が暴れても飛びすぎないようにしている。
pub const STEP_LIMIT: f64 = 0.5;
pub const MAX_ITERATIONS: u32 = 20;

/// レイマーチの結果。
/// 等値面に収束した場合はHitを、そうでない場合はMissを。
#[derive(Clone, Debug, PartialEq)]
pub enum MarchHit {
    Miss,
    Hit {
        position: Vector3<f64>,
        gradient: Vector3<f64>, // 正規化前
    },
}

impl MarchHit {
    pub fn is_hit(&self) -> bool {
        matches!(self, MarchHit::Hit { .. })
    }
}

/// レイと等値面の交点をレイマーチで求める。
///
/// 勾配をレイ方向に射影した値でニュートン法的に次のステップ幅を決めて、
/// STEP_LIMITでクランプしながら進む。
/// 収束した時点で歩いた距離がray.length未満、かつ反復回数がMAX_ITERATIONS未満ならHit。
///
/// 射影した勾配が0やNaNでステップ幅が有限にならない場合はMissとして扱う。
/// 空のシーンや電荷の真上から始まるレイなどがこれに当たる。
///
/// 反復回数も一緒に返す。統計用。
pub fn march<F: ScalarField + ?Sized>(ray: &Ray, field: &F) -> (MarchHit, u32) {
    let mut pos = ray.o;
    let mut walked = 0.0;
    let mut iterations = 0;

    loop {
        let sample = field.field_at(&pos);
        let delta = ISOVALUE - sample.value;

        if delta.abs() <= EPSILON {
            let hit = if walked < ray.length && iterations < MAX_ITERATIONS {
                MarchHit::Hit {
                    position: pos,
                    gradient: sample.gradient,
                }
            } else {
                MarchHit::Miss
            };
            return (hit, iterations);
        }

        if !(walked < ray.length) || iterations >= MAX_ITERATIONS {
            return (MarchHit::Miss, iterations);
        }

        // レイ方向に射影した勾配の大きさ
        let grad_val = sample.gradient.dot(&ray.d).abs();
        let disp = delta / grad_val;
        if !disp.is_finite() {
            return (MarchHit::Miss, iterations);
        }
        let disp = disp.clamp(-STEP_LIMIT, STEP_LIMIT);

        pos += disp * ray.d;
        walked += disp;
        iterations += 1;
    }
}

/// 1つの反復回数の系列の統計。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IterationStats {
    pub count: u64,
    pub total: u64,
    pub min: u32,
    pub max: u32,
}

impl IterationStats {
    fn record(&mut self, iterations: u32) {
        if self.count == 0 {
            self.min = iterations;
            self.max = iterations;
        } else {
            self.min = self.min.min(iterations);
            self.max = self.max.max(iterations);
        }
        self.count += 1;
        self.total += iterations as u64;
    }

    fn merge(&mut self, other: &IterationStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        self.count += other.count;
        self.total += other.total;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.total as f64 / self.count as f64)
        }
    }
}

/// レイマーチの統計情報。
/// 描画結果には影響しない。ワーカーごとに集計してフレームの終わりにマージする。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarchStats {
    pub hits: IterationStats,
    pub misses: IterationStats,
}

impl MarchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, hit: &MarchHit, iterations: u32) {
        match hit {
            MarchHit::Hit { .. } => self.hits.record(iterations),
            MarchHit::Miss => self.misses.record(iterations),
        }
    }

    pub fn merge(&mut self, other: &MarchStats) {
        self.hits.merge(&other.hits);
        self.misses.merge(&other.misses);
    }

    pub fn rays(&self) -> u64 {
        self.hits.count + self.misses.count
    }

    /// 統計情報をログに出す。
    pub fn log_summary(&self, label: &str) {
        if let Some(average) = self.hits.average() {
            log::debug!(
                "{} hit: {} rays, iterations min {} avg {:.2} max {}",
                label,
                self.hits.count,
                self.hits.min,
                average,
                self.hits.max
            );
        }
        if let Some(average) = self.misses.average() {
            log::debug!(
                "{} miss: {} rays, iterations min {} avg {:.2} max {}",
                label,
                self.misses.count,
                self.misses.min,
                average,
                self.misses.max
            );
        }
    }
}
