use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use na::Vector3;
use nalgebra as na;

use super::error::{RenderError, Result};
use super::field::ScalarField;
use super::frustum::{Frustum, RayBuffer};
use super::march::{march, MarchHit, MarchStats};

// ワーカーの生存確認の間隔。フレームの打ち切りには使わない。
// 全ワーカーが落ちればチャンネルが切断されるので分かるが、
// 1つだけ落ちて残りが生きている場合はチャンネルが切れず、完了通知も揃わない。
// その場合をJoinHandle::is_finishedで見つけるために定期的に起きる。
const LIVENESS_POLL: Duration = Duration::from_millis(100);

/// 光源の位置。レンダラーの生存中は固定。
pub fn default_light_source() -> Vector3<f64> {
    Vector3::new(0.0, 0.0, 50.0)
}

/// ランバート反射でヒット位置の明るさを0..=255のグレースケールで求める。
/// missの場合や法線が求まらない場合は黒。
pub fn shade(hit: &MarchHit, light_source: &Vector3<f64>) -> u8 {
    match hit {
        MarchHit::Miss => 0,
        MarchHit::Hit { position, gradient } => {
            let normal = gradient.normalize();
            let light = (position - light_source).normalize();
            let intensity = normal.dot(&light);
            if !intensity.is_finite() {
                return 0;
            }
            (intensity.clamp(0.0, 1.0) * 255.0).round() as u8
        }
    }
}

// 1ピクセルをRGBAの順に詰めたもの。
fn pack_gray(gray: u8) -> u32 {
    u32::from_le_bytes([gray, gray, gray, 255])
}

/// ワーカーが直接書き込むフレームバッファ。
/// 1行は1つのワーカーだけが担当するので、書き込みは互いに重ならずロックも要らない。
/// 画像サイズが変わったときだけ作り直す。
struct FrameBuffer {
    pixels: Vec<AtomicU32>,
}

impl FrameBuffer {
    fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: (0..width as usize * height as usize)
                .map(|_| AtomicU32::new(pack_gray(0)))
                .collect(),
        }
    }

    fn len(&self) -> usize {
        self.pixels.len()
    }

    // 全ワーカーの完了通知を受け取った後に呼ぶ。
    fn copy_to(&self, image: &mut RgbaImage) {
        debug_assert_eq!(self.len(), image.width() as usize * image.height() as usize);
        for (pixel, value) in image.pixels_mut().zip(self.pixels.iter()) {
            *pixel = Rgba(value.load(Ordering::Relaxed).to_le_bytes());
        }
    }
}

/// 1フレーム分の仕事。
/// フレームごとに作り直すので、行カウンタのリセットは不要。
struct FrameJob<F> {
    field: Arc<F>,
    rays: Arc<RayBuffer>,
    frame: Arc<FrameBuffer>,
    light_source: Vector3<f64>,
    next_row: AtomicU32,
}

enum WorkerCommand<F> {
    Render(Arc<FrameJob<F>>),
    Shutdown,
}

enum WorkerMessage {
    Ready,
    Done { worker: usize, stats: MarchStats },
}

struct Worker<F> {
    commands: Sender<WorkerCommand<F>>,
    handle: Option<JoinHandle<()>>,
}

/// スカラー場の等値面をスキャンラインで並列にレンダリングする構造体。
///
/// 生成時に固定数のワーカースレッドを起動し、フレーム間で使い回す。
/// 1フレームの流れは次の通り。
///
/// 1. 全ワーカーにフレームの仕事を送る。
/// 2. 各ワーカーは共有カウンタから行を取り合い、取った行をレイマーチしてフレームバッファに書く。
/// 3. 全ワーカーから完了通知が届くまで待ってから、フレームバッファを画像に写して返す。
///
/// ワーカーはフレームの終わりに場とレイへの参照を手放すので、
/// フレーム間であれば[field_mut]で場を書き換えられる。
pub struct FieldRenderer<F> {
    field: Arc<F>,
    frustum: Frustum,
    rays: Arc<RayBuffer>,
    frame: Arc<FrameBuffer>,
    light_source: Vector3<f64>,
    workers: Vec<Worker<F>>,
    messages: Receiver<WorkerMessage>,
    stats: MarchStats,
    broken: bool,
}

impl<F: ScalarField + Send + Sync + 'static> FieldRenderer<F> {
    /// ハードウェアの並列数と同じ数のワーカーでレンダラーを作る。
    pub fn new(field: F) -> Result<Self> {
        let thread_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_threads(field, thread_count)
    }

    /// ワーカー数を指定してレンダラーを作る。0は1として扱う。
    pub fn with_threads(field: F, thread_count: usize) -> Result<Self> {
        let thread_count = thread_count.max(1);
        let (message_tx, messages) = mpsc::channel();

        let mut workers = Vec::with_capacity(thread_count);
        for index in 0..thread_count {
            let (command_tx, command_rx) = mpsc::channel();
            let message_tx = message_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("field_worker_{}", index))
                .spawn(move || worker_loop(index, command_rx, message_tx))
                .map_err(|source| RenderError::SpawnWorker { index, source })?;
            workers.push(Worker {
                commands: command_tx,
                handle: Some(handle),
            });
        }
        drop(message_tx);

        let mut renderer = Self {
            field: Arc::new(field),
            frustum: Frustum::default(),
            rays: Arc::new(RayBuffer::empty()),
            frame: Arc::new(FrameBuffer::new(0, 0)),
            light_source: default_light_source(),
            workers,
            messages,
            stats: MarchStats::new(),
            broken: false,
        };

        // 全ワーカーが待機状態に入るまで待つ
        let mut ready = 0;
        while ready < thread_count {
            if let WorkerMessage::Ready = renderer.next_message()? {
                ready += 1;
            }
        }
        log::info!("Started {} render workers", thread_count);

        Ok(renderer)
    }

    /// 画像にレンダリングする。
    ///
    /// 画像サイズが前回と違う場合はレイを計算し直す。
    /// 全ワーカーが完了するまでブロックし、戻った時点で全ピクセルが書き込まれている。
    pub fn render(&mut self, image: &mut RgbaImage) -> Result<()> {
        if self.broken {
            return Err(RenderError::WorkerDisconnected);
        }

        let (width, height) = image.dimensions();
        if self.rays.dimensions() != (width, height) {
            self.rays = Arc::new(RayBuffer::compute(width, height, &self.frustum));
            self.frame = Arc::new(FrameBuffer::new(width, height));
        }

        let start = Instant::now();

        let job = Arc::new(FrameJob {
            field: Arc::clone(&self.field),
            rays: Arc::clone(&self.rays),
            frame: Arc::clone(&self.frame),
            light_source: self.light_source,
            next_row: AtomicU32::new(0),
        });
        for worker in &self.workers {
            if worker
                .commands
                .send(WorkerCommand::Render(Arc::clone(&job)))
                .is_err()
            {
                self.broken = true;
                return Err(RenderError::WorkerDisconnected);
            }
        }
        drop(job);

        let mut frame_stats = MarchStats::new();
        let mut done = 0;
        while done < self.workers.len() {
            match self.next_message()? {
                WorkerMessage::Done { worker, stats } => {
                    log::trace!("worker {} finished with {} rays", worker, stats.rays());
                    frame_stats.merge(&stats);
                    done += 1;
                }
                WorkerMessage::Ready => {}
            }
        }

        self.frame.copy_to(image);

        let end = start.elapsed();
        log::debug!(
            "Finish rendering {}x{}. Rendering time: {}.{:03}s",
            width,
            height,
            end.as_secs(),
            end.subsec_millis()
        );
        frame_stats.log_summary("frame");
        self.stats.merge(&frame_stats);

        Ok(())
    }

    /// 視錐台を設定し直す。
    /// 既にレンダリングしたことがあれば、そのサイズでレイをすぐに計算し直す。
    pub fn set_frustum(&mut self, near_z: f64, near_zoom: f64, far_z: f64, far_zoom: f64) {
        self.frustum = Frustum::new(near_z, near_zoom, far_z, far_zoom);
        let (width, height) = self.rays.dimensions();
        self.rays = Arc::new(RayBuffer::compute(width, height, &self.frustum));
    }

    // ワーカーからのメッセージを待つ。
    // 途中でワーカーが落ちた場合は永遠に待たないようにエラーにする。
    fn next_message(&mut self) -> Result<WorkerMessage> {
        loop {
            match self.messages.recv_timeout(LIVENESS_POLL) {
                Ok(message) => return Ok(message),
                Err(RecvTimeoutError::Timeout) => {
                    let dead = self.workers.iter().any(|w| {
                        w.handle
                            .as_ref()
                            .map_or(true, |handle| handle.is_finished())
                    });
                    if dead {
                        self.broken = true;
                        return Err(RenderError::WorkerDisconnected);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.broken = true;
                    return Err(RenderError::WorkerDisconnected);
                }
            }
        }
    }
}

impl<F> FieldRenderer<F> {
    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    pub fn light_source(&self) -> &Vector3<f64> {
        &self.light_source
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// これまでにレンダリングした全フレームのレイマーチ統計。
    pub fn stats(&self) -> &MarchStats {
        &self.stats
    }
}

impl<F: Clone> FieldRenderer<F> {
    /// フレーム間で場を書き換える。
    pub fn field_mut(&mut self) -> &mut F {
        Arc::make_mut(&mut self.field)
    }
}

impl<F> Drop for FieldRenderer<F> {
    fn drop(&mut self) {
        for worker in &self.workers {
            // 既に終了しているワーカーには送れないが、joinはできるので無視する
            let _ = worker.commands.send(WorkerCommand::Shutdown);
        }
        for (index, worker) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    log::warn!("render worker {} panicked", index);
                }
            }
        }
        log::info!("Stopped {} render workers", self.workers.len());
        self.stats.log_summary("total");
    }
}

// ワーカースレッドの本体。
// 仕事が来るのを待ち、来たら行がなくなるまで描画して完了を通知する、を繰り返す。
fn worker_loop<F: ScalarField>(
    index: usize,
    commands: Receiver<WorkerCommand<F>>,
    messages: Sender<WorkerMessage>,
) {
    log::trace!("worker {} in", index);

    if messages.send(WorkerMessage::Ready).is_err() {
        return;
    }

    while let Ok(command) = commands.recv() {
        let job = match command {
            WorkerCommand::Render(job) => job,
            WorkerCommand::Shutdown => break,
        };

        let stats = render_rows(&job);
        // 完了を通知する前に場への参照を手放す
        drop(job);

        if messages
            .send(WorkerMessage::Done {
                worker: index,
                stats,
            })
            .is_err()
        {
            break;
        }
    }

    log::trace!("worker {} out", index);
}

// 行がなくなるまで共有カウンタから行を取ってきて描画する。
// 書き込んだピクセルは完了通知の送信で描画側から見えるようになる。
fn render_rows<F: ScalarField>(job: &FrameJob<F>) -> MarchStats {
    let mut stats = MarchStats::new();
    let width = job.rays.width() as usize;
    let height = job.rays.height();

    loop {
        let y = job.next_row.fetch_add(1, Ordering::Relaxed);
        if y >= height {
            break;
        }

        let line = &job.frame.pixels[y as usize * width..(y as usize + 1) * width];
        for (ray, pixel) in job.rays.row(y).iter().zip(line) {
            let (hit, iterations) = march(ray, job.field.as_ref());
            stats.record(&hit, iterations);
            pixel.store(pack_gray(shade(&hit, &job.light_source)), Ordering::Relaxed);
        }
    }

    stats
}
