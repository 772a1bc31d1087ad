use na::Vector3;
use nalgebra as na;

/// レイを表現する構造体。
/// oが始点、dが正規化された方向、lengthが始点からマーチする最大距離。
#[derive(Clone, Debug, PartialEq)]
pub struct Ray {
    pub o: Vector3<f64>,
    pub d: Vector3<f64>,
    pub length: f64,
}

impl Ray {
    /// 2点を結ぶレイを作る。
    /// 2点が一致する場合は方向がゼロベクトル、長さ0のレイになる。
    pub fn between(from: Vector3<f64>, to: Vector3<f64>) -> Self {
        let diff = to - from;
        let length = diff.norm();
        let d = if length > 0.0 {
            diff / length
        } else {
            Vector3::zeros()
        };
        Self { o: from, d, length }
    }
}
