//! The render thread and its ownership of stdout.
//!
//! Exactly one [`RenderHost`] runs at a time; it is the process's only
//! stdout writer while a game is on screen. The host paces the renderer
//! node against a monotonic clock and joins cleanly on shutdown.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use takt_flow::{Node, Step};

use crate::renderer::RendererNode;

/// Handle to the running render thread.
pub struct RenderHost {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RenderHost {
    /// Start rendering `node` to `writer` at the node's frame rate.
    ///
    /// The thread stops when `shutdown` is set (or rendering fails) and
    /// leaves the cursor on a fresh line.
    pub fn spawn(
        mut node: RendererNode,
        mut writer: impl Write + Send + 'static,
        shutdown: Arc<AtomicBool>,
    ) -> RenderHost {
        let flag = shutdown.clone();
        let framerate = node.framerate();
        let thread = std::thread::Builder::new()
            .name("takt-render".into())
            .spawn(move || {
                if let Err(err) = node.start() {
                    tracing::error!(%err, "renderer failed to start");
                    return;
                }
                let origin = Instant::now();
                let mut frame: u64 = 0;
                while !flag.load(Ordering::Relaxed) {
                    let due = origin + Duration::from_secs_f64(frame as f64 / framerate);
                    if let Some(wait) = due.checked_duration_since(Instant::now()) {
                        std::thread::sleep(wait);
                    }
                    frame += 1;

                    match node.send(()) {
                        Ok(Step::Yield(line)) => {
                            if writer.write_all(line.as_bytes()).is_err()
                                || writer.flush().is_err()
                            {
                                break;
                            }
                        }
                        Ok(Step::Done) => break,
                        Err(err) => {
                            tracing::error!(%err, "render tick failed");
                            flag.store(true, Ordering::Relaxed);
                            break;
                        }
                    }
                }
                let _ = writer.write_all(b"\n");
                let _ = writer.flush();
                if let Err(err) = node.close() {
                    tracing::error!(%err, "renderer failed to close");
                }
            })
            .expect("spawning the render thread");

        RenderHost {
            shutdown,
            thread: Some(thread),
        }
    }

    /// Signal shutdown and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RenderHost {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
