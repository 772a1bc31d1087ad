use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::SeedableRng;

use charge_field_marcher::{Drift, FieldRenderer, Frustum, Scene};

/// 初期シーンの種類。
#[derive(Clone, Copy, Debug, ValueEnum)]
enum SceneKind {
    /// 原点に集めた5つの電荷。アニメーションで散らばる。
    Cluster,
    /// 原点を囲む4つの単位電荷。
    Quad,
}

/// 点電荷のポテンシャル場の等値面をレイマーチでレンダリングする。
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value_t = 640)]
    width: u32,

    #[arg(long, default_value_t = 480)]
    height: u32,

    /// レンダリングするフレーム数。2フレーム目以降は電荷を動かしてから描画する。
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// ワーカースレッド数。省略時はハードウェアの並列数。
    #[arg(long)]
    threads: Option<usize>,

    #[arg(long, value_enum, default_value_t = SceneKind::Cluster)]
    scene: SceneKind,

    /// アニメーションの乱数シード。省略時はランダム。
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = Frustum::default().near_z, allow_negative_numbers = true)]
    near_z: f64,

    #[arg(long, default_value_t = Frustum::default().near_zoom)]
    near_zoom: f64,

    #[arg(long, default_value_t = Frustum::default().far_z, allow_negative_numbers = true)]
    far_z: f64,

    #[arg(long, default_value_t = Frustum::default().far_zoom)]
    far_zoom: f64,

    /// 出力するPNGファイル。複数フレームの場合はファイル名に連番を付ける。
    #[arg(long, default_value = "field.png")]
    output: PathBuf,
}

fn make_scene(kind: SceneKind) -> Scene {
    match kind {
        SceneKind::Cluster => Scene::cluster(5, 1.5),
        SceneKind::Quad => Scene::quad(),
    }
}

// 複数フレームの場合はfield.pngをfield_0000.pngのようにする
fn frame_path(output: &Path, frame: u32, frames: u32) -> PathBuf {
    if frames <= 1 {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "field".to_string());
    let extension = output
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    output.with_file_name(format!("{}_{:04}.{}", stem, frame, extension))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    log::info!("Start {:?} scene.", args.scene);

    let scene = make_scene(args.scene);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut drift = Drift::new(&scene, &mut rng);

    let mut renderer = match args.threads {
        Some(threads) => FieldRenderer::with_threads(scene, threads),
        None => FieldRenderer::new(scene),
    }
    .context("failed to start the renderer")?;
    renderer.set_frustum(args.near_z, args.near_zoom, args.far_z, args.far_zoom);

    let mut image = RgbaImage::new(args.width, args.height);
    let start = Instant::now();
    for frame in 0..args.frames {
        if frame > 0 {
            drift.step(renderer.field_mut());
        }
        renderer
            .render(&mut image)
            .with_context(|| format!("failed to render frame {}", frame))?;

        let path = frame_path(&args.output, frame, args.frames);
        log::info!("save image {}...", path.display());
        image
            .save(&path)
            .with_context(|| format!("failed to save {}", path.display()))?;
    }

    let end = start.elapsed();
    log::info!(
        "Finish rendering {} frames.\nRendering time: {}.{:03}s",
        args.frames,
        end.as_secs(),
        end.subsec_millis()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_keeps_output_path() {
        assert_eq!(frame_path(Path::new("out/field.png"), 0, 1), PathBuf::from("out/field.png"));
    }

    #[test]
    fn multiple_frames_are_numbered() {
        assert_eq!(
            frame_path(Path::new("out/field.png"), 7, 30),
            PathBuf::from("out/field_0007.png")
        );
        assert_eq!(frame_path(Path::new("anim"), 12, 30), PathBuf::from("anim_0012.png"));
    }

    #[test]
    fn args_accept_negative_far_plane() {
        let args = Args::try_parse_from(["field", "--far-z", "-3.5", "--scene", "quad"]).unwrap();
        assert_eq!(args.far_z, -3.5);
        assert_eq!(args.near_z, 2.0);
        assert!(matches!(args.scene, SceneKind::Quad));
    }
}
