//! Canvas surface backed by raw RGBA frames.
//!
//! Fill rectangles are rasterized here; text lines are handed to the
//! encoder's `textoverlay` elements, one line per slot. Each pushed buffer
//! carries its frame sequence in the buffer offset, and the overlay settings
//! for that frame wait in an [`OverlayQueue`] until the buffer reaches the
//! overlays.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use lyriclip_common::clock::RateController;
use lyriclip_common::error::{LyriclipError, LyriclipResult};
use lyriclip_render_engine::{DrawCommand, FrameComposition, LayoutMetrics, Surface, SurfaceSize};

use crate::media::{MediaStream, MediaTrack};

/// Frames whose overlay settings may wait for the encoder at once.
const MAX_PENDING_FRAMES: usize = 256;

/// Number of `textoverlay` slots needed to show every visible text line a
/// compositor with `metrics` can emit on a surface of `size`.
///
/// Active lines are spaced `active_line_height` apart, so at most
/// `ceil((height + font) / line_height)` of them touch the frame. Next-line
/// rows are capped by `next_max_lines`.
pub fn overlay_slot_count(metrics: &LayoutMetrics, size: SurfaceSize) -> usize {
    let height = f64::from(size.height);
    let line_height = metrics.active_line_height.max(1.0);
    let active = ((height + metrics.active_font_px.max(0.0)) / line_height).ceil();
    let active = if active.is_finite() { active as usize } else { 1 };
    (active + metrics.next_max_lines).max(1)
}

/// Settings for one `textoverlay` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayText {
    pub text: String,
    /// Top of the line as a fraction of the frame height.
    pub ypos: f64,
    pub color_argb: u32,
    pub font_desc: String,
}

/// Map the frame's visible text commands onto `count` overlay slots, in
/// draw order.
///
/// Lines lying entirely above or below the frame are skipped. Always returns
/// `count` entries; unused slots are `None`.
pub fn overlay_slots(frame: &FrameComposition, count: usize) -> Vec<Option<OverlayText>> {
    let height = f64::from(frame.size.height.max(1));
    let mut slots: Vec<Option<OverlayText>> = frame
        .commands
        .iter()
        .filter_map(|command| match command {
            DrawCommand::Text {
                text,
                y,
                font,
                color,
                ..
            } => {
                // Commands carry a baseline; overlays are placed by their top.
                let top = y - font.size_px * 0.8;
                let bottom = y + font.size_px * 0.2;
                if bottom <= 0.0 || top >= height {
                    return None;
                }
                Some(Some(OverlayText {
                    text: text.clone(),
                    ypos: (top / height).clamp(0.0, 1.0),
                    color_argb: color.to_argb_u32(),
                    font_desc: font.pango_description(),
                }))
            }
            DrawCommand::FillRect { .. } => None,
        })
        .collect();

    if slots.len() > count {
        tracing::warn!(
            lines = slots.len(),
            slots = count,
            "Frame has more visible text lines than overlay slots; extra lines dropped"
        );
    }
    slots.resize(count, None);
    slots
}

/// Overlay settings waiting for their frame to reach the text overlays,
/// keyed by frame sequence.
#[derive(Debug, Default)]
pub struct OverlayQueue {
    pending: Mutex<VecDeque<(u64, Vec<Option<OverlayText>>)>>,
}

impl OverlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn push(&self, seq: u64, slots: Vec<Option<OverlayText>>) {
        let mut pending = self.lock();
        if pending.len() >= MAX_PENDING_FRAMES {
            pending.pop_front();
        }
        pending.push_back((seq, slots));
    }

    /// Remove the settings for frame `seq`. Entries for earlier frames were
    /// never delivered and are discarded.
    pub fn take(&self, seq: u64) -> Option<Vec<Option<OverlayText>>> {
        let mut pending = self.lock();
        while pending.front().is_some_and(|(front, _)| *front < seq) {
            pending.pop_front();
        }
        if pending.front().is_some_and(|(front, _)| *front == seq) {
            pending.pop_front().map(|(_, slots)| slots)
        } else {
            None
        }
    }

    /// Remove the oldest entry, for buffers that lost their sequence.
    pub fn take_next(&self) -> Option<Vec<Option<OverlayText>>> {
        self.lock().pop_front().map(|(_, slots)| slots)
    }

    /// Forget frame `seq`, which never made it into the pipeline.
    pub fn discard(&self, seq: u64) {
        self.lock().retain(|(pending, _)| *pending != seq);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<(u64, Vec<Option<OverlayText>>)>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Apply one frame's settings to the overlay chain.
pub(crate) fn apply_overlays(elements: &[gst::Element], slots: &[Option<OverlayText>]) {
    for (i, element) in elements.iter().enumerate() {
        apply_overlay(element, slots.get(i).and_then(Option::as_ref));
    }
}

/// Rasterize the frame's fill rectangles into tightly packed RGBA.
pub fn rasterize(frame: &FrameComposition) -> Vec<u8> {
    let width = frame.size.width as usize;
    let height = frame.size.height as usize;
    let mut pixels = vec![0u8; width * height * 4];

    for command in &frame.commands {
        if let DrawCommand::FillRect {
            x,
            y,
            width: w,
            height: h,
            color,
        } = command
        {
            let x0 = clamp_px(*x, width);
            let x1 = clamp_px(x + w, width);
            let y0 = clamp_px(*y, height);
            let y1 = clamp_px(y + h, height);
            if x0 >= x1 || y0 >= y1 {
                continue;
            }
            let rgba = color.to_rgba_bytes();
            for row in y0..y1 {
                let start = (row * width + x0) * 4;
                let end = (row * width + x1) * 4;
                for px in pixels[start..end].chunks_exact_mut(4) {
                    blend(px, rgba);
                }
            }
        }
    }
    pixels
}

fn clamp_px(value: f64, max: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else if value >= max as f64 {
        max
    } else {
        value.round() as usize
    }
}

fn blend(dst: &mut [u8], src: [u8; 4]) {
    let alpha = u32::from(src[3]);
    if alpha == 255 {
        dst.copy_from_slice(&src);
        return;
    }
    let inv = 255 - alpha;
    for i in 0..3 {
        dst[i] = ((u32::from(src[i]) * alpha + u32::from(dst[i]) * inv) / 255) as u8;
    }
    dst[3] = (alpha + u32::from(dst[3]) * inv / 255) as u8;
}

/// Encoder-side endpoints a feed pushes into.
pub(crate) struct FeedSink {
    pub(crate) appsrc: gst_app::AppSrc,
    pub(crate) overlays: Arc<OverlayQueue>,
}

/// One capture of the canvas at a fixed rate.
pub struct VideoFeed {
    size: SurfaceSize,
    fps: u32,
    overlay_slots: usize,
    epoch: Instant,
    rate: Mutex<RateController>,
    sink: Mutex<Option<FeedSink>>,
    closed: AtomicBool,
    sequence: AtomicU64,
    frames_pushed: AtomicU64,
}

impl VideoFeed {
    fn new(size: SurfaceSize, fps: u32, overlay_slots: usize) -> Self {
        Self {
            size,
            fps,
            overlay_slots: overlay_slots.max(1),
            epoch: Instant::now(),
            rate: Mutex::new(RateController::new(fps)),
            sink: Mutex::new(None),
            closed: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            frames_pushed: AtomicU64::new(0),
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Text overlay slots the encoder must provide for this feed.
    pub fn overlay_slots(&self) -> usize {
        self.overlay_slots
    }

    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_attached(&self) -> bool {
        self.sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub(crate) fn attach(&self, sink: FeedSink) {
        if self.is_closed() {
            return;
        }
        self.rate.lock().unwrap_or_else(|e| e.into_inner()).reset();
        *self.sink.lock().unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    pub(crate) fn detach(&self) {
        self.sink.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.detach();
    }

    fn push(&self, frame: &FrameComposition, pixels: &[u8]) {
        let guard = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sink) = guard.as_ref() else {
            return;
        };

        let now_ns = self.epoch.elapsed().as_nanos() as u64;
        if !self
            .rate
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .should_tick(now_ns)
        {
            return;
        }

        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut buffer = gst::Buffer::from_mut_slice(pixels.to_vec());
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_offset(seq);
        }
        sink.overlays.push(seq, overlay_slots(frame, self.overlay_slots));

        match sink.appsrc.push_buffer(buffer) {
            Ok(_) => {
                self.frames_pushed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                sink.overlays.discard(seq);
                tracing::debug!(error = ?e, "Canvas frame not accepted by encoder");
            }
        }
    }
}

fn apply_overlay(element: &gst::Element, slot: Option<&OverlayText>) {
    match slot {
        Some(text) => {
            element.set_property("text", text.text.as_str());
            element.set_property("font-desc", text.font_desc.as_str());
            element.set_property("color", text.color_argb);
            element.set_property("ypos", text.ypos);
            element.set_property("silent", false);
        }
        None => element.set_property("silent", true),
    }
}

/// A [`Surface`] whose frames can be captured as video tracks.
pub struct GstCanvas {
    size: SurfaceSize,
    overlay_slots: usize,
    feeds: Mutex<Vec<Arc<VideoFeed>>>,
    frames: AtomicU64,
    last: Mutex<Option<FrameComposition>>,
    closed: AtomicBool,
}

impl GstCanvas {
    /// A canvas for frames laid out with the default metrics.
    pub fn new(size: SurfaceSize) -> Self {
        Self::with_metrics(size, &LayoutMetrics::default())
    }

    /// A canvas for frames laid out with `metrics`; sizes the encoder's
    /// overlay chain to fit them.
    pub fn with_metrics(size: SurfaceSize, metrics: &LayoutMetrics) -> Self {
        Self {
            size,
            overlay_slots: overlay_slot_count(metrics, size),
            feeds: Mutex::new(Vec::new()),
            frames: AtomicU64::new(0),
            last: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn last_frame(&self) -> Option<FrameComposition> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Dispose the canvas; later presents fail and open feeds close.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for feed in self.feeds.lock().unwrap_or_else(|e| e.into_inner()).drain(..) {
            feed.close();
        }
    }

    /// Open a video track that receives presented frames at `fps`.
    pub(crate) fn capture_stream(&self, fps: u32) -> LyriclipResult<MediaStream> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LyriclipError::acquisition("canvas has been disposed"));
        }

        let feed = Arc::new(VideoFeed::new(self.size, fps, self.overlay_slots));
        {
            let mut feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
            feeds.retain(|f| !f.is_closed());
            feeds.push(feed.clone());
        }

        let on_stop = feed.clone();
        let track = MediaTrack::video("canvas")
            .with_source(feed)
            .with_stop_hook(move || on_stop.close());
        Ok(MediaStream::new(vec![track]))
    }
}

impl Surface for GstCanvas {
    fn size(&self) -> SurfaceSize {
        self.size
    }

    fn present(&self, frame: &FrameComposition) -> LyriclipResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LyriclipError::render("canvas has been disposed"));
        }

        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame.clone());
        self.frames.fetch_add(1, Ordering::SeqCst);

        let attached: Vec<Arc<VideoFeed>> = self
            .feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|f| !f.is_closed() && f.is_attached())
            .cloned()
            .collect();
        if attached.is_empty() {
            return Ok(());
        }

        let pixels = rasterize(frame);
        for feed in attached {
            feed.push(frame, &pixels);
        }
        Ok(())
    }
}
