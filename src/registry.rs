use crate::twilio_types::CallStatus;
use crate::types::{CallRecord, ConversationTurn, RegistrySnapshot};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// What a status callback did to the registry.
#[derive(Debug, PartialEq, Eq)]
pub enum StatusOutcome {
    Unknown,
    Updated,
    Completed,
    /// A terminal status for a call that had already closed; its past record took the
    /// provider's status and duration.
    Amended,
}

#[derive(Default)]
struct Calls {
    // call sid => record of a call still in progress
    current: HashMap<String, CallRecord>,
    past: VecDeque<CallRecord>,
    // sids of the records in `past`
    closed: HashSet<String>,
}

impl Calls {
    fn past_mut(&mut self, call_sid: &str) -> Option<&mut CallRecord> {
        if !self.closed.contains(call_sid) {
            return None;
        }
        self.past.iter_mut().rev().find(|record| record.call_sid == call_sid)
    }
}

/// In-memory record of every call this process has handled.
///
/// Calls in progress are keyed by their Twilio call sid so concurrent calls never share state.
/// Closed calls move to a bounded queue; once `max_past_calls` is reached the oldest is dropped.
/// A closed call is never reopened while it is still in the queue.
/// The lock is only held for map operations, never across an `.await`.
pub struct CallRegistry {
    calls: Mutex<Calls>,
    max_past_calls: usize,
}

impl CallRegistry {
    pub fn new(max_past_calls: usize) -> Self {
        Self {
            calls: Mutex::new(Calls::default()),
            max_past_calls,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Calls> {
        // No update leaves a record half-written, so a poisoned lock is still consistent.
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a record for an inbound call.  Returns false when the call is already known, e.g.
    /// when the menu redirects back to the greeting, or when it has already closed.
    pub fn start_call(&self, call_sid: &str, caller: &str, now: OffsetDateTime) -> bool {
        let mut calls = self.lock();
        if calls.current.contains_key(call_sid) || calls.closed.contains(call_sid) {
            return false;
        }
        calls
            .current
            .insert(call_sid.to_string(), CallRecord::new(call_sid, caller, now));
        true
    }

    pub fn record_turn(
        &self,
        call_sid: &str,
        user_input: &str,
        bot_reply: &str,
        now: OffsetDateTime,
    ) -> bool {
        self.update_call(call_sid, |record| {
            record.conversations.push(ConversationTurn {
                user_input: user_input.to_string(),
                bot_reply: bot_reply.to_string(),
                timestamp: now,
            })
        })
    }

    /// Apply `f` to the record for `call_sid`.  Data arriving after the call closed lands on its
    /// past record; unknown calls are left alone.
    pub fn update_call(&self, call_sid: &str, f: impl FnOnce(&mut CallRecord)) -> bool {
        let mut calls = self.lock();
        if let Some(record) = calls.current.get_mut(call_sid) {
            f(record);
            return true;
        }
        match calls.past_mut(call_sid) {
            Some(record) => {
                debug!(call_sid, "late update for closed call");
                f(record);
                true
            }
            None => false,
        }
    }

    /// The record of a call still in progress.
    pub fn get(&self, call_sid: &str) -> Option<CallRecord> {
        self.lock().current.get(call_sid).cloned()
    }

    pub fn is_closed(&self, call_sid: &str) -> bool {
        self.lock().closed.contains(call_sid)
    }

    pub fn update_status(
        &self,
        call_sid: &str,
        status: CallStatus,
        duration: Option<u64>,
        now: OffsetDateTime,
    ) -> StatusOutcome {
        if status.is_terminal() {
            if self.complete_call(call_sid, status, duration, now).is_some() {
                return StatusOutcome::Completed;
            }
            return self.amend_closed(call_sid, status, duration);
        }
        match self.lock().current.get_mut(call_sid) {
            Some(record) => {
                record.status = status;
                StatusOutcome::Updated
            }
            None => StatusOutcome::Unknown,
        }
    }

    // The provider reports the final status after the bot has already hung up.
    fn amend_closed(
        &self,
        call_sid: &str,
        status: CallStatus,
        duration: Option<u64>,
    ) -> StatusOutcome {
        let mut calls = self.lock();
        let Some(record) = calls.past_mut(call_sid) else {
            return StatusOutcome::Unknown;
        };
        record.status = status;
        if let Some(duration) = duration {
            record.duration = duration;
        }
        info!(call_sid, %status, duration = record.duration, "closed call amended");
        StatusOutcome::Amended
    }

    /// Move a call from the current map to the past calls.  Only the first completion of a call
    /// does anything; later ones return `None`.
    pub fn complete_call(
        &self,
        call_sid: &str,
        status: CallStatus,
        duration: Option<u64>,
        now: OffsetDateTime,
    ) -> Option<CallRecord> {
        let mut calls = self.lock();
        let mut record = calls.current.remove(call_sid)?;
        record.status = status;
        record.duration = duration.unwrap_or_else(|| record.elapsed_secs(now));
        self.push_past(&mut calls, record.clone());
        info!(call_sid, %status, duration = record.duration, "call closed");
        Some(record)
    }

    fn push_past(&self, calls: &mut Calls, record: CallRecord) {
        calls.closed.insert(record.call_sid.clone());
        calls.past.push_back(record);
        while calls.past.len() > self.max_past_calls {
            if let Some(evicted) = calls.past.pop_front() {
                debug!(call_sid = %evicted.call_sid, "evicted oldest past call");
                if !calls.past.iter().any(|r| r.call_sid == evicted.call_sid) {
                    calls.closed.remove(&evicted.call_sid);
                }
            }
        }
    }

    /// Close every call that has been open longer than `max_age`.  Twilio does not always tell
    /// us a caller hung up, so without this the record would stay open forever.
    pub fn reap_stale(&self, max_age: Duration, now: OffsetDateTime) -> usize {
        let mut calls = self.lock();
        let stale: Vec<String> = calls
            .current
            .values()
            .filter(|record| record.elapsed_secs(now) >= max_age.as_secs())
            .map(|record| record.call_sid.clone())
            .collect();
        for call_sid in &stale {
            if let Some(mut record) = calls.current.remove(call_sid) {
                record.status = CallStatus::TimedOut;
                record.duration = record.elapsed_secs(now);
                warn!(call_sid = %record.call_sid, caller = %record.caller, "call timed out");
                self.push_past(&mut calls, record);
            }
        }
        stale.len()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let calls = self.lock();
        let mut current: Vec<CallRecord> = calls.current.values().cloned().collect();
        current.sort_by_key(|record| record.start_time);
        RegistrySnapshot {
            current,
            past: calls.past.iter().cloned().collect(),
        }
    }

    /// Replace the registry contents with a previously saved snapshot.
    pub fn restore(&self, snapshot: RegistrySnapshot) {
        let mut calls = self.lock();
        calls.current = snapshot
            .current
            .into_iter()
            .map(|record| (record.call_sid.clone(), record))
            .collect();
        calls.past.clear();
        calls.closed.clear();
        for record in snapshot.past {
            self.push_past(&mut calls, record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-03-01 09:00 UTC);

    #[test]
    fn completed_call_moves_to_past_once() {
        let registry = CallRegistry::new(10);
        assert!(registry.start_call("CA1", "+27821234567", T0));
        let later = T0 + time::Duration::seconds(42);

        let closed = registry
            .complete_call("CA1", CallStatus::Completed, None, later)
            .unwrap();
        assert_eq!(closed.duration, 42);
        assert!(registry
            .complete_call("CA1", CallStatus::Completed, None, later)
            .is_none());
        let snapshot = registry.snapshot();
        assert!(snapshot.current.is_empty());
        assert_eq!(snapshot.past.len(), 1);
        assert_eq!(snapshot.past[0].status, CallStatus::Completed);
    }

    #[test]
    fn closed_call_is_not_reopened() {
        let registry = CallRegistry::new(10);
        registry.start_call("CA1", "+1", T0);
        registry.complete_call("CA1", CallStatus::Completed, None, T0);

        assert!(!registry.start_call("CA1", "+1", T0 + time::Duration::seconds(3)));
        assert!(registry.is_closed("CA1"));
        assert!(registry.get("CA1").is_none());
        assert!(registry.update_call("CA1", |record| {
            record.issue_recording_url = Some("https://api.twilio.com/RE1".to_string())
        }));
        assert!(registry.record_turn("CA1", "https://api.twilio.com/RE1", "logged", T0));
        assert!(registry
            .complete_call("CA1", CallStatus::Completed, None, T0)
            .is_none());

        let past = registry.snapshot().past;
        assert_eq!(past.len(), 1);
        assert_eq!(
            past[0].issue_recording_url.as_deref(),
            Some("https://api.twilio.com/RE1")
        );
        assert_eq!(past[0].conversations.len(), 1);
    }

    #[test]
    fn late_terminal_status_amends_past_record() {
        let registry = CallRegistry::new(10);
        registry.start_call("CA1", "+1", T0);
        let later = T0 + time::Duration::seconds(5);
        registry.complete_call("CA1", CallStatus::Completed, None, later);

        assert_eq!(
            registry.update_status("CA1", CallStatus::Ringing, None, T0),
            StatusOutcome::Unknown
        );
        assert_eq!(
            registry.update_status("CA1", CallStatus::Completed, Some(37), T0),
            StatusOutcome::Amended
        );
        let snapshot = registry.snapshot();
        assert!(snapshot.current.is_empty());
        assert_eq!(snapshot.past.len(), 1);
        assert_eq!(snapshot.past[0].duration, 37);
        assert_eq!(snapshot.past[0].status, CallStatus::Completed);
    }

    #[test]
    fn repeated_start_keeps_existing_record() {
        let registry = CallRegistry::new(10);
        assert!(registry.start_call("CA1", "+1", T0));
        registry.record_turn("CA1", "1", "Please provide your first name.", T0);
        assert!(!registry.start_call("CA1", "+1", T0 + time::Duration::seconds(5)));
        let record = registry.get("CA1").unwrap();
        assert_eq!(record.start_time, T0);
        assert_eq!(record.conversations.len(), 1);
    }

    #[test]
    fn unknown_call_status_is_a_no_op() {
        let registry = CallRegistry::new(10);
        assert_eq!(
            registry.update_status("CAnope", CallStatus::Ringing, None, T0),
            StatusOutcome::Unknown
        );
        assert_eq!(
            registry.update_status("CAnope", CallStatus::Failed, None, T0),
            StatusOutcome::Unknown
        );
        assert!(!registry.record_turn("CAnope", "hi", "hello", T0));
        assert_eq!(registry.snapshot(), RegistrySnapshot::default());
    }

    #[test]
    fn turns_belong_to_their_own_call() {
        let registry = CallRegistry::new(10);
        registry.start_call("CA1", "+1", T0);
        registry.start_call("CA2", "+2", T0);
        registry.record_turn("CA1", "1", "first name?", T0);
        registry.record_turn("CA2", "2", "describe your issue", T0);
        registry.record_turn("CA1", "Thandi", "last name?", T0);

        assert_eq!(registry.get("CA1").unwrap().conversations.len(), 2);
        let other = registry.get("CA2").unwrap();
        assert_eq!(other.conversations.len(), 1);
        assert_eq!(other.conversations[0].user_input, "2");
    }

    #[test]
    fn non_terminal_status_updates_in_place() {
        let registry = CallRegistry::new(10);
        registry.start_call("CA1", "+1", T0);
        assert_eq!(
            registry.update_status("CA1", CallStatus::Ringing, None, T0),
            StatusOutcome::Updated
        );
        assert_eq!(registry.get("CA1").unwrap().status, CallStatus::Ringing);
        assert_eq!(
            registry.update_status("CA1", CallStatus::Busy, Some(3), T0),
            StatusOutcome::Completed
        );
        assert_eq!(registry.snapshot().past[0].duration, 3);
    }

    #[test]
    fn past_calls_are_bounded() {
        let registry = CallRegistry::new(2);
        for sid in ["CA1", "CA2", "CA3"] {
            registry.start_call(sid, "+1", T0);
            registry.complete_call(sid, CallStatus::Completed, None, T0);
        }
        let past: Vec<String> = registry
            .snapshot()
            .past
            .into_iter()
            .map(|r| r.call_sid)
            .collect();
        assert_eq!(past, vec!["CA2", "CA3"]);
        assert!(!registry.is_closed("CA1"));
        assert!(registry.is_closed("CA3"));
    }

    #[test]
    fn stale_calls_time_out() {
        let registry = CallRegistry::new(10);
        registry.start_call("CAold", "+1", T0);
        registry.start_call("CAnew", "+2", T0 + time::Duration::minutes(50));
        let now = T0 + time::Duration::minutes(61);

        assert_eq!(registry.reap_stale(Duration::from_secs(3_600), now), 1);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.current.len(), 1);
        assert_eq!(snapshot.current[0].call_sid, "CAnew");
        assert_eq!(snapshot.past[0].status, CallStatus::TimedOut);
        assert_eq!(snapshot.past[0].duration, 61 * 60);
    }

    #[test]
    fn restore_replaces_contents() {
        let source = CallRegistry::new(10);
        source.start_call("CA1", "+1", T0);
        source.start_call("CA2", "+2", T0);
        source.complete_call("CA2", CallStatus::Completed, Some(9), T0);

        let target = CallRegistry::new(10);
        target.start_call("CAstale", "+3", T0);
        target.restore(source.snapshot());
        assert!(target.get("CAstale").is_none());
        assert_eq!(target.snapshot(), source.snapshot());
        assert!(target.is_closed("CA2"));
        assert!(!target.start_call("CA2", "+2", T0));
    }
}
