//! Run progress tracking and rendering.
//!
//! [`ProgressReporter`] owns the run counters; how they are drawn is decided
//! once at startup by picking a [`ProgressRenderer`]. The rich renderer needs
//! an interactive, colour-capable terminal and falls back to a plain counter
//! otherwise. The migration itself never knows which one is active.

use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

use colored::{Colorize, control::ShouldColorize};

use crate::types::RunState;

/// Draws progress for one run.
pub trait ProgressRenderer {
    fn start(&mut self, total: u64);
    fn update(&mut self, state: &RunState);
    fn finish(&mut self, state: &RunState);
}

/// How progress should be drawn, before capability detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Rich bar when stdout supports it, counter lines otherwise.
    Auto,
    /// Counter lines regardless of the terminal.
    Plain,
    /// Nothing at all.
    Silent,
}

/// Picks the renderer for this process.
pub fn select_renderer(mode: RenderMode) -> Box<dyn ProgressRenderer> {
    match mode {
        RenderMode::Silent => Box::new(SilentRenderer),
        RenderMode::Plain => Box::new(TextRenderer::new(io::stdout())),
        RenderMode::Auto => {
            if rich_rendering_available() {
                Box::new(RichRenderer::new(io::stdout()))
            } else {
                log::info!("rich progress unavailable, using counter output");
                Box::new(TextRenderer::new(io::stdout()))
            }
        }
    }
}

fn rich_rendering_available() -> bool {
    io::stdout().is_terminal() && ShouldColorize::from_env().should_colorize()
}

/// Number of decimal digits needed to print `total`.
pub fn counter_width(total: u64) -> usize {
    total.checked_ilog10().map_or(1, |digits| digits as usize + 1)
}

/// Estimated time left at the current average rate.
pub fn estimate_remaining(elapsed: Duration, done: u64, total: u64) -> Option<Duration> {
    if done == 0 || total == 0 {
        return None;
    }
    let remaining = total.saturating_sub(done);
    Some(elapsed.mul_f64(remaining as f64 / done as f64))
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Zero-padded `seen/total` lines, one every `every` records and one at the end.
pub struct TextRenderer<W: Write> {
    out: W,
    width: usize,
    every: u64,
}

impl<W: Write> TextRenderer<W> {
    pub const DEFAULT_EVERY: u64 = 1_000;

    pub fn new(out: W) -> Self {
        Self::with_interval(out, Self::DEFAULT_EVERY)
    }

    pub fn with_interval(out: W, every: u64) -> Self {
        Self {
            out,
            width: 1,
            every: every.max(1),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, state: &RunState) {
        let _ = writeln!(
            self.out,
            "{:0width$}/{:0width$}",
            state.seen(),
            state.total,
            width = self.width
        );
    }
}

impl<W: Write> ProgressRenderer for TextRenderer<W> {
    fn start(&mut self, total: u64) {
        self.width = counter_width(total);
        let _ = writeln!(self.out, "Going to process {total} items");
    }

    fn update(&mut self, state: &RunState) {
        if state.seen() % self.every == 0 && !state.is_complete() {
            self.line(state);
        }
    }

    fn finish(&mut self, state: &RunState) {
        self.line(state);
        let _ = self.out.flush();
    }
}

/// Single redrawn line: percentage, counter, ETA and a bar.
pub struct RichRenderer<W: Write> {
    out: W,
    width: usize,
    bar_width: usize,
    last_draw: Option<Instant>,
    interval: Duration,
}

impl<W: Write> RichRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            width: 1,
            bar_width: 30,
            last_draw: None,
            interval: Duration::from_millis(100),
        }
    }

    fn draw(&mut self, state: &RunState) {
        let done = state.seen();
        let ratio = if state.total == 0 {
            1.0
        } else {
            (done as f64 / state.total as f64).min(1.0)
        };
        let filled = (ratio * self.bar_width as f64).round() as usize;
        let bar = format!("{}{}", "#".repeat(filled), " ".repeat(self.bar_width - filled));
        let eta = estimate_remaining(state.started_at.elapsed(), done, state.total)
            .map(format_duration)
            .unwrap_or_else(|| "--:--:--".to_string());

        let _ = write!(
            self.out,
            "\r{} :: {:>width$}/{} :: ETA {} :: [{}]",
            format!("{:>5.1}%", ratio * 100.0).cyan().bold(),
            done,
            state.total,
            eta,
            bar.green(),
            width = self.width
        );
        let _ = self.out.flush();
        self.last_draw = Some(Instant::now());
    }
}

impl<W: Write> ProgressRenderer for RichRenderer<W> {
    fn start(&mut self, total: u64) {
        self.width = counter_width(total);
        let _ = writeln!(self.out, "Going to process {total} items");
    }

    fn update(&mut self, state: &RunState) {
        let due = self.last_draw.is_none_or(|at| at.elapsed() >= self.interval);
        if due {
            self.draw(state);
        }
    }

    fn finish(&mut self, state: &RunState) {
        self.draw(state);
        let _ = writeln!(self.out);
    }
}

/// Draws nothing.
pub struct SilentRenderer;

impl ProgressRenderer for SilentRenderer {
    fn start(&mut self, _total: u64) {}
    fn update(&mut self, _state: &RunState) {}
    fn finish(&mut self, _state: &RunState) {}
}

/// Final numbers of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub total: u64,
    pub processed: u64,
    pub skipped: u64,
    pub duration: Duration,
    pub throughput_per_second: f64,
}

/// Owns the counters of one run and forwards them to the renderer.
pub struct ProgressReporter {
    renderer: Box<dyn ProgressRenderer>,
    state: Option<RunState>,
}

impl ProgressReporter {
    pub fn new(renderer: Box<dyn ProgressRenderer>) -> Self {
        Self { renderer, state: None }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(SilentRenderer))
    }

    /// Starts the clock. Returns `false` when there is nothing to do, in
    /// which case the renderer is never touched.
    pub fn start(&mut self, total: u64) -> bool {
        self.state = Some(RunState::new(total));
        if total == 0 {
            return false;
        }
        self.renderer.start(total);
        true
    }

    pub fn advance(&mut self, skipped: bool) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if skipped {
            state.skipped += 1;
        } else {
            state.processed += 1;
        }
        if state.total > 0 {
            self.renderer.update(state);
        }
    }

    pub fn state(&self) -> Option<&RunState> {
        self.state.as_ref()
    }

    pub fn finish(&mut self) -> RunReport {
        let state = self.state.take().unwrap_or_else(|| RunState::new(0));
        if state.total > 0 {
            self.renderer.finish(&state);
        }

        let duration = state.started_at.elapsed();
        let secs = duration.as_secs_f64();
        let seen = state.seen() as f64;
        let throughput_per_second = if secs > 0.0 { seen / secs } else { seen };

        RunReport {
            total: state.total,
            processed: state.processed,
            skipped: state.skipped,
            duration,
            throughput_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    #[test]
    fn counter_width_matches_digit_count() {
        assert_eq!(counter_width(0), 1);
        assert_eq!(counter_width(9), 1);
        assert_eq!(counter_width(10), 2);
        assert_eq!(counter_width(250_000), 6);
    }

    #[test]
    fn eta_scales_with_remaining_work() {
        let eta = estimate_remaining(Duration::from_secs(10), 25, 100).expect("eta");
        assert_eq!(eta, Duration::from_secs(30));
        assert!(estimate_remaining(Duration::from_secs(1), 0, 100).is_none());
        assert_eq!(format_duration(Duration::from_secs(3_725)), "01:02:05");
    }

    #[test]
    fn zero_total_is_nothing_to_do() {
        let buf = SharedBuf::default();
        let mut reporter = ProgressReporter::new(Box::new(TextRenderer::new(buf.clone())));
        assert!(!reporter.start(0));

        let report = reporter.finish();
        assert_eq!(report.total, 0);
        assert_eq!(report.throughput_per_second, 0.0);
        assert!(buf.text().is_empty());
    }

    #[test]
    fn text_renderer_prints_padded_counters() {
        let buf = SharedBuf::default();
        let mut reporter = ProgressReporter::new(Box::new(TextRenderer::with_interval(buf.clone(), 2)));
        assert!(reporter.start(12));
        for i in 0..12 {
            reporter.advance(i % 3 == 0);
        }
        let report = reporter.finish();

        assert_eq!(report.processed, 8);
        assert_eq!(report.skipped, 4);
        assert!(report.throughput_per_second > 0.0);

        let text = buf.text();
        assert!(text.starts_with("Going to process 12 items\n"));
        assert!(text.contains("02/12\n"));
        assert!(text.contains("10/12\n"));
        assert!(text.ends_with("12/12\n"));
        assert_eq!(text.matches("12/12").count(), 1);
    }

    #[test]
    fn rich_renderer_draws_final_state() {
        colored::control::set_override(false);
        let buf = SharedBuf::default();
        let mut reporter = ProgressReporter::new(Box::new(RichRenderer::new(buf.clone())));
        reporter.start(4);
        for _ in 0..4 {
            reporter.advance(false);
        }
        reporter.finish();

        let text = buf.text();
        assert!(text.contains("100.0%"));
        assert!(text.contains("4/4"));
        assert!(text.ends_with("]\n"));
    }

    #[test]
    fn advance_before_start_is_ignored() {
        let mut reporter = ProgressReporter::silent();
        reporter.advance(false);
        assert!(reporter.state().is_none());
        reporter.start(3);
        reporter.advance(true);
        assert_eq!(reporter.state().map(|s| s.skipped), Some(1));
    }
}
