//! Position tracker: the per-frame read side of the transport.
//!
//! Once per animation frame the player asks for a [`FrameRequest`]; the
//! request carries the play generation it was issued under. When the frame
//! runs, a request from an older generation is ignored, so a frame queued
//! before a pause or stop can never revive playback.

use dv_ir::normalize;

/// Positions at or past this count as the end of the track.
pub const END_OF_TRACK_THRESHOLD: f64 = 0.999;

/// A pending animation-frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRequest {
    pub(crate) generation: u64,
}

impl FrameRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// One observation of the clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerReading {
    pub position: f64,
    pub at_end: bool,
}

#[derive(Clone, Debug, Default)]
pub struct PositionTracker {
    /// Generation the tracker is running for; `None` when halted
    live: Option<u64>,
    last_position: f64,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling for `generation`.
    pub fn start(&mut self, generation: u64) {
        self.live = Some(generation);
    }

    /// Stop polling. Outstanding requests become stale.
    pub fn halt(&mut self) {
        self.live = None;
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Schedule the next frame, if the tracker is running.
    pub fn request(&self) -> Option<FrameRequest> {
        self.live.map(|generation| FrameRequest { generation })
    }

    /// Whether a frame issued earlier may still act.
    pub fn accepts(&self, request: &FrameRequest, current_generation: u64) -> bool {
        self.live == Some(request.generation) && request.generation == current_generation
    }

    /// Derive the playhead from a clock reading.
    pub fn observe(&mut self, now: f64, effective_duration: f64) -> TrackerReading {
        let position = normalize(now, effective_duration);
        self.last_position = position;
        TrackerReading { position, at_end: position >= END_OF_TRACK_THRESHOLD }
    }

    pub fn last_position(&self) -> f64 {
        self.last_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halted_tracker_requests_nothing() {
        let tracker = PositionTracker::new();
        assert!(tracker.request().is_none());
    }

    #[test]
    fn stale_request_rejected_after_halt() {
        let mut tracker = PositionTracker::new();
        tracker.start(3);
        let req = tracker.request().unwrap();
        assert!(tracker.accepts(&req, 3));

        tracker.halt();
        assert!(!tracker.accepts(&req, 3));

        tracker.start(4);
        assert!(!tracker.accepts(&req, 4));
    }

    #[test]
    fn reading_reaches_end_at_threshold() {
        let mut tracker = PositionTracker::new();
        assert_eq!(tracker.observe(1.0, 4.0), TrackerReading { position: 0.25, at_end: false });
        assert!(tracker.observe(3.997, 4.0).at_end);
        assert_eq!(tracker.observe(5.0, 4.0).position, 1.0);
    }

    #[test]
    fn zero_length_is_immediately_at_end() {
        let mut tracker = PositionTracker::new();
        let reading = tracker.observe(0.0, 0.0);
        assert_eq!(reading.position, 1.0);
        assert!(reading.at_end);
    }
}
