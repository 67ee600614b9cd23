//! The frame loop: one compose + present per display refresh.
//!
//! Each activation reads the playback position, the latest timeline and the
//! latest style, draws one frame synchronously, then awaits the next tick.
//! The loop never blocks on I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lyriclip_common::error::LyriclipResult;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::compositor::{Compositor, FrameComposition};
use crate::playback::PlaybackPosition;
use crate::shared::{SharedStyle, SharedTimeline};
use crate::surface::Surface;

/// Source of display refresh ticks.
#[async_trait::async_trait]
pub trait FrameScheduler: Send {
    /// Wait for the next refresh. Returns `None` once no more frames will come.
    async fn next_frame(&mut self) -> Option<Instant>;
}

/// Emulates a display link firing at a fixed refresh rate.
///
/// Ticks missed while a frame was being drawn are skipped, never bunched up.
#[derive(Debug)]
pub struct DisplayLinkScheduler {
    period: Duration,
    interval: Option<Interval>,
}

impl DisplayLinkScheduler {
    /// Zero is treated as 1 Hz.
    pub fn new(refresh_hz: u32) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(refresh_hz.max(1))),
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait::async_trait]
impl FrameScheduler for DisplayLinkScheduler {
    async fn next_frame(&mut self) -> Option<Instant> {
        let period = self.period;
        // Created lazily so construction does not need a runtime.
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        Some(interval.tick().await)
    }
}

/// Everything one frame needs.
#[derive(Clone)]
pub struct FrameRenderer {
    compositor: Compositor,
    timeline: SharedTimeline,
    style: SharedStyle,
    position: Arc<dyn PlaybackPosition>,
    surface: Arc<dyn Surface>,
}

impl FrameRenderer {
    pub fn new(
        compositor: Compositor,
        timeline: SharedTimeline,
        style: SharedStyle,
        position: Arc<dyn PlaybackPosition>,
        surface: Arc<dyn Surface>,
    ) -> Self {
        Self {
            compositor,
            timeline,
            style,
            position,
            surface,
        }
    }

    /// Compose and present the frame for the current playback position.
    pub fn render_once(&self) -> LyriclipResult<FrameComposition> {
        let now = self.position.current_time();
        let timeline = self.timeline.snapshot();
        let style = self.style.get();
        let frame = self
            .compositor
            .compose(&timeline, now, &style, self.surface.size());
        self.surface.present(&frame)?;
        Ok(frame)
    }
}

/// Counters reported when a frame loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameLoopStats {
    pub frames_presented: u64,
    pub present_errors: u64,
}

/// A running frame loop task.
///
/// Dropping the handle cancels and aborts the task, so a disposed surface is
/// never drawn to.
pub struct FrameLoop {
    cancelled: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: Option<JoinHandle<FrameLoopStats>>,
}

impl FrameLoop {
    /// Spawn the loop on the current tokio runtime.
    pub fn spawn<S>(renderer: FrameRenderer, mut scheduler: S) -> Self
    where
        S: FrameScheduler + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let task_cancelled = cancelled.clone();
        let task_wake = wake.clone();
        let handle = tokio::spawn(async move {
            let mut stats = FrameLoopStats::default();
            tracing::debug!("Frame loop started");

            loop {
                if task_cancelled.load(Ordering::SeqCst) {
                    break;
                }

                let tick = tokio::select! {
                    tick = scheduler.next_frame() => tick,
                    _ = task_wake.notified() => None,
                };
                if tick.is_none() || task_cancelled.load(Ordering::SeqCst) {
                    break;
                }

                match renderer.render_once() {
                    Ok(_) => stats.frames_presented += 1,
                    Err(e) => {
                        stats.present_errors += 1;
                        tracing::warn!(error = %e, "Frame present failed; stopping frame loop");
                        break;
                    }
                }
            }

            tracing::debug!(
                frames = stats.frames_presented,
                errors = stats.present_errors,
                "Frame loop finished"
            );
            stats
        });

        Self {
            cancelled,
            wake,
            handle: Some(handle),
        }
    }

    /// Stop scheduling frames. Takes effect before the next draw.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the loop to end and return its counters.
    ///
    /// Call [`cancel`](Self::cancel) first unless the scheduler or surface
    /// is expected to end the loop.
    pub async fn join(mut self) -> FrameLoopStats {
        let Some(handle) = self.handle.take() else {
            return FrameLoopStats::default();
        };
        match handle.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "Frame loop task failed");
                FrameLoopStats::default()
            }
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
