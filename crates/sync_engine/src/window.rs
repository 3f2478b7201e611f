//! Timestamp matching window.
//!
//! The window is one frame period wide, shifted back by a quarter period and
//! by the configured depth-off-color delay. A negative delay anchors it on the
//! depth timestamp; zero and positive delays anchor it on the color timestamp.

use contracts::{StreamKind, SyncConfig};

/// Window timing derived from the frame rate and inter-camera delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowTiming {
    /// Frame period (µs)
    pub frame_period: i64,
    /// Quarter frame period (µs)
    pub quarter_period: i64,
    /// Signed depth-minus-color delay (µs)
    pub depth_delay_off_color: i64,
}

impl WindowTiming {
    pub fn from_config(config: &SyncConfig) -> Self {
        let frame_period = config.frame_rate.period_usec() as i64;
        Self {
            frame_period,
            quarter_period: frame_period / 4,
            depth_delay_off_color: config.depth_delay_off_color_usec as i64,
        }
    }

    /// Stream whose timestamp anchors the window
    pub fn anchor(&self) -> StreamKind {
        if self.depth_delay_off_color < 0 {
            StreamKind::Depth
        } else {
            StreamKind::Color
        }
    }

    /// Half-open window `[start, end)` around `anchor_ts`
    pub fn window(&self, anchor_ts: u64) -> MatchWindow {
        let start = anchor_ts as i64 + self.depth_delay_off_color - self.quarter_period;
        MatchWindow {
            start,
            end: start + self.frame_period,
        }
    }

    /// Decide what to do with the two pending samples
    pub fn evaluate(&self, color_ts: u64, depth_ts: u64) -> MatchDecision {
        let (anchor_ts, other_ts) = match self.anchor() {
            StreamKind::Depth => (depth_ts, color_ts),
            StreamKind::Color => (color_ts, depth_ts),
        };
        let other = other_stream(self.anchor());

        match self.window(anchor_ts).locate(other_ts) {
            WindowPosition::Before => MatchDecision::Drop(other),
            WindowPosition::After => MatchDecision::Drop(self.anchor()),
            WindowPosition::Inside => MatchDecision::Merge,
        }
    }
}

/// Matching window in device microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchWindow {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    Before,
    Inside,
    After,
}

impl MatchWindow {
    pub fn locate(&self, ts: u64) -> WindowPosition {
        let ts = ts as i64;
        if ts < self.start {
            WindowPosition::Before
        } else if ts >= self.end {
            WindowPosition::After
        } else {
            WindowPosition::Inside
        }
    }
}

/// Outcome of comparing two pending samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// The pending sample of this stream is too old to ever match
    Drop(StreamKind),
    /// Both samples describe the same moment
    Merge,
}

/// The stream that is not `stream`
pub fn other_stream(stream: StreamKind) -> StreamKind {
    match stream {
        StreamKind::Color => StreamKind::Depth,
        StreamKind::Depth => StreamKind::Color,
    }
}
