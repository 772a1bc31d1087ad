use std::time::Instant;

use na::Vector3;
use nalgebra as na;
use rayon::prelude::*;

use super::ray::Ray;

/// 視錐台の手前と奥の2枚の投影面。
///
/// 各平面はz座標と拡大率を持ち、画面上のピクセル(x, y)は
/// 画面中心を原点に拡大率で縮め、Y軸を反転した位置に逆投影される。
/// 手前の点から奥の点に向かうレイが、そのピクセルのレイになる。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub near_z: f64,
    pub near_zoom: f64,
    pub far_z: f64,
    pub far_zoom: f64,
}

impl Default for Frustum {
    fn default() -> Self {
        Self::new(2.0, 50.0, -2.0, 37.5)
    }
}

impl Frustum {
    pub fn new(near_z: f64, near_zoom: f64, far_z: f64, far_zoom: f64) -> Self {
        Self {
            near_z,
            near_zoom,
            far_z,
            far_zoom,
        }
    }

    /// 手前の平面に逆投影した位置。
    pub fn near_point(&self, x: u32, y: u32, width: u32, height: u32) -> Vector3<f64> {
        unproject(x, y, width, height, self.near_zoom, self.near_z)
    }

    /// 奥の平面に逆投影した位置。
    pub fn far_point(&self, x: u32, y: u32, width: u32, height: u32) -> Vector3<f64> {
        unproject(x, y, width, height, self.far_zoom, self.far_z)
    }

    /// x/yで指定したピクセルのレイを取得する。
    pub fn ray(&self, x: u32, y: u32, width: u32, height: u32) -> Ray {
        Ray::between(
            self.near_point(x, y, width, height),
            self.far_point(x, y, width, height),
        )
    }
}

// 画面中心は整数で切り捨てる。奇数サイズの画像では中心が半ピクセル左上に寄る。
fn unproject(x: u32, y: u32, width: u32, height: u32, zoom: f64, z: f64) -> Vector3<f64> {
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;
    Vector3::new((x as f64 - cx) / zoom, -(y as f64 - cy) / zoom, z)
}

/// 画像の全ピクセル分の事前計算されたレイ。
/// y * width + xの行優先で並んでいる。
pub struct RayBuffer {
    width: u32,
    height: u32,
    rays: Vec<Ray>,
}

impl RayBuffer {
    /// 画像サイズと視錐台からレイを計算する。
    /// 行ごとにrayonで並列に計算している。
    pub fn compute(width: u32, height: u32, frustum: &Frustum) -> Self {
        let start = Instant::now();

        let mut rays = vec![
            Ray {
                o: Vector3::zeros(),
                d: Vector3::zeros(),
                length: 0.0,
            };
            width as usize * height as usize
        ];
        if width > 0 {
            rays.par_chunks_mut(width as usize)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, ray) in row.iter_mut().enumerate() {
                        *ray = frustum.ray(x as u32, y as u32, width, height);
                    }
                });
        }

        let end = start.elapsed();
        log::debug!(
            "Computed {}x{} rays in {}.{:03}s",
            width,
            height,
            end.as_secs(),
            end.subsec_millis()
        );

        Self {
            width,
            height,
            rays,
        }
    }

    /// 画像サイズ0のバッファ。
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            rays: vec![],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<&Ray> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.rays.get(y as usize * self.width as usize + x as usize)
    }

    /// y行目のレイ。
    pub fn row(&self, y: u32) -> &[Ray] {
        if y >= self.height {
            return &[];
        }
        let w = self.width as usize;
        let start = y as usize * w;
        &self.rays[start..start + w]
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn center_pixel_looks_down_the_z_axis() {
        let frustum = Frustum::default();
        let ray = frustum.ray(32, 32, 64, 64);
        assert_relative_eq!(ray.o, Vector3::new(0.0, 0.0, 2.0));
        assert_relative_eq!(ray.d, Vector3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(ray.length, 4.0);
    }

    #[test]
    fn planes_use_independent_zoom_and_flip_y() {
        let frustum = Frustum::default();
        let near = frustum.near_point(132, 28, 64, 64);
        let far = frustum.far_point(132, 28, 64, 64);
        assert_relative_eq!(near, Vector3::new(2.0, 0.08, 2.0), epsilon = 1e-12);
        assert_relative_eq!(far, Vector3::new(100.0 / 37.5, 4.0 / 37.5, -2.0), epsilon = 1e-12);
    }

    #[test]
    fn buffer_is_row_major_and_matches_frustum() {
        let frustum = Frustum::new(1.0, 10.0, -3.0, 5.0);
        let buffer = RayBuffer::compute(7, 5, &frustum);
        assert_eq!(buffer.dimensions(), (7, 5));
        for y in 0..5 {
            assert_eq!(buffer.row(y).len(), 7);
            for x in 0..7 {
                let expected = frustum.ray(x, y, 7, 5);
                assert_eq!(buffer.get(x, y), Some(&expected));
                assert_eq!(&buffer.row(y)[x as usize], &expected);
                assert_relative_eq!(expected.d.norm(), 1.0, epsilon = 1e-12);
            }
        }
        assert!(buffer.get(7, 0).is_none());
        assert!(buffer.row(5).is_empty());
    }

    #[test]
    fn zero_sized_buffer_is_empty() {
        let buffer = RayBuffer::compute(0, 10, &Frustum::default());
        assert_eq!(buffer.width(), 0);
        assert!(buffer.row(3).is_empty());
    }
}
