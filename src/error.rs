use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

/// レンダラーのエラー。
/// ピクセル単位のmissはエラーではなく黒いピクセルとして描画されるので、
/// ここにあるのはワーカースレッドまわりの致命的なものだけ。
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to spawn render worker {index}")]
    SpawnWorker {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("render worker disconnected before finishing the frame")]
    WorkerDisconnected,
}
