//! Note scheduler: turns the note list into engine triggers.
//!
//! A pass takes the notes at or after a start point, converts each onset
//! from score time to transport time, and schedules one trigger per note.
//! Notes before the start point are skipped, never caught up. The handles
//! of the pass are kept so they can be cancelled as a set.

use std::collections::BTreeSet;

use dv_ir::{InvalidTempo, NoteList};
use tracing::{debug, error};

use crate::clock::{AudioEngine, HandleId, Trigger, TransportClock};
use crate::error::PlaybackError;

/// Slack when comparing a note onset against the start point.
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// Handles of scheduled, not yet cancelled triggers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScheduledHandleSet {
    handles: Vec<HandleId>,
}

impl ScheduledHandleSet {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn contains(&self, handle: HandleId) -> bool {
        self.handles.contains(&handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.handles.iter().copied()
    }
}

/// Result of a scheduling pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    pub scheduled: usize,
    /// Notes before the start point
    pub skipped_before_start: usize,
    /// Notes whose pitch has no loadable sound
    pub skipped_unavailable: usize,
}

#[derive(Debug, Default)]
pub struct NoteScheduler {
    pending: ScheduledHandleSet,
}

impl NoteScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handles(&self) -> &ScheduledHandleSet {
        &self.pending
    }

    /// Schedule every note with onset at or after `from_score_seconds`.
    ///
    /// Outstanding handles from an earlier pass are cancelled first.
    /// Trigger times are `note.time / ratio`. Notes whose pitch is in
    /// `unavailable` are left out. If the engine rejects a call, the
    /// handles already registered by this pass are cancelled and the error
    /// returned.
    pub fn schedule_from<E: AudioEngine>(
        &mut self,
        clock: &mut TransportClock<E>,
        notes: &NoteList,
        ratio: f64,
        from_score_seconds: f64,
        unavailable: &BTreeSet<u8>,
    ) -> Result<ScheduleReport, PlaybackError> {
        self.cancel_all(clock);
        if !(ratio.is_finite() && ratio > 0.0) {
            return Err(InvalidTempo::Ratio(ratio).into());
        }

        let from_score_seconds = from_score_seconds.max(0.0);
        let first = notes.first_at_or_after(from_score_seconds, BOUNDARY_TOLERANCE);
        let mut report = ScheduleReport { skipped_before_start: first, ..Default::default() };

        for note in &notes.as_slice()[first..] {
            if unavailable.contains(&note.pitch) {
                report.skipped_unavailable += 1;
                continue;
            }
            let at = note.time / ratio;
            match clock.schedule(at, Trigger::for_note(note)) {
                Ok(handle) => {
                    self.pending.handles.push(handle);
                    report.scheduled += 1;
                }
                Err(err) => {
                    error!(%err, at, pitch = note.pitch, "schedule call rejected, aborting pass");
                    self.cancel_all(clock);
                    return Err(err.into());
                }
            }
        }

        debug!(
            from_score_seconds,
            ratio,
            scheduled = report.scheduled,
            skipped = report.skipped_before_start,
            unavailable = report.skipped_unavailable,
            "scheduling pass complete"
        );
        Ok(report)
    }

    /// Cancel every outstanding handle.
    ///
    /// The scheduler is the only producer of triggers on its clock, so the
    /// engine's whole queue is cleared in one call.
    pub fn cancel_all<E: AudioEngine>(&mut self, clock: &mut TransportClock<E>) {
        if self.pending.is_empty() {
            return;
        }
        debug!(count = self.pending.len(), "cancelling scheduled triggers");
        clock.cancel_all();
        self.pending.handles.clear();
    }

    /// Cancel a single handle from the current pass.
    pub fn cancel<E: AudioEngine>(&mut self, clock: &mut TransportClock<E>, handle: HandleId) {
        if let Some(idx) = self.pending.handles.iter().position(|h| *h == handle) {
            self.pending.handles.swap_remove(idx);
            clock.cancel(handle);
        }
    }
}
