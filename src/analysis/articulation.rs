// ArticulationTracker - loudness-driven note lifecycle state machine
//
// Tracks where the current sound event is in its lifecycle
// (silence -> attack -> sustain -> release -> silence) from one loudness
// reading per block. Detection runs on raw, unsmoothed loudness so state
// changes are not delayed by the smoothing filters.
//
// Evaluation order each update, preserved from the source behavior:
// 1. Forced silence: loudness continuously below silence_threshold_db for
//    longer than min_silence_ms forces Silence from any state. When this
//    fires, no other transition is considered that update.
// 2. Attack trigger: loudness rising more than energy_threshold_db above
//    the rolling average (window excluding the current sample), from any
//    state other than Attack.
// 3. State-specific transitions (attack hold expiry, sustain drop,
//    release decay).

use std::collections::VecDeque;

use crate::config::ArticulationConfig;
use crate::error::ConfigError;
use crate::frame::Articulation;

pub struct ArticulationTracker {
    config: ArticulationConfig,
    /// Recent loudness values, oldest first; current sample is pushed only
    /// after transitions are evaluated
    history: VecDeque<f32>,
    state: Articulation,
    state_entered_ms: f64,
    /// Set while in attack or sustain; basis for attack_time_ms
    attack_started_ms: Option<f64>,
    /// Start of the current continuous sub-silence-threshold run
    below_silence_since: Option<f64>,
    state_changes: u64,
    attack_entries: u64,
}

impl ArticulationTracker {
    pub fn new(config: ArticulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.history_window;
        Ok(Self {
            config,
            history: VecDeque::with_capacity(capacity),
            state: Articulation::Silence,
            state_entered_ms: 0.0,
            attack_started_ms: None,
            below_silence_since: None,
            state_changes: 0,
            attack_entries: 0,
        })
    }

    /// Advance the state machine by one block
    ///
    /// Non-finite input holds the state unchanged: no transition is
    /// evaluated and the sample is not added to the history.
    pub fn update(&mut self, loudness_db: f32, timestamp_ms: f64) -> Articulation {
        if !loudness_db.is_finite() || !timestamp_ms.is_finite() {
            log::warn!(
                "[Articulation] non-finite input (loudness={}, t={}), holding state {:?}",
                loudness_db,
                timestamp_ms,
                self.state
            );
            return self.state;
        }

        // Rolling average excludes the current sample
        let window_avg = self.window_average();

        if loudness_db < self.config.silence_threshold_db {
            if self.below_silence_since.is_none() {
                self.below_silence_since = Some(timestamp_ms);
            }
        } else {
            self.below_silence_since = None;
        }

        let forced_silence = self
            .below_silence_since
            .map(|since| timestamp_ms - since > self.config.min_silence_ms as f64)
            .unwrap_or(false);

        if forced_silence && self.state != Articulation::Silence {
            self.transition(Articulation::Silence, timestamp_ms);
        } else if !forced_silence {
            self.evaluate_transitions(loudness_db, window_avg, timestamp_ms);
        }

        self.push_history(loudness_db);
        self.state
    }

    fn evaluate_transitions(&mut self, loudness_db: f32, window_avg: Option<f32>, now_ms: f64) {
        // Attack trigger applies from any non-attack state
        if self.state != Articulation::Attack {
            if let Some(avg) = window_avg {
                if loudness_db - avg > self.config.energy_threshold_db {
                    self.transition(Articulation::Attack, now_ms);
                    return;
                }
            }
        }

        match self.state {
            Articulation::Attack => {
                if now_ms - self.state_entered_ms > self.config.attack_duration_ms as f64 {
                    self.transition(Articulation::Sustain, now_ms);
                }
            }
            Articulation::Sustain => {
                if let Some(avg) = window_avg {
                    if avg - loudness_db > self.config.energy_threshold_db / 2.0 {
                        self.transition(Articulation::Release, now_ms);
                    }
                }
            }
            Articulation::Release => {
                if now_ms - self.state_entered_ms > self.config.attack_duration_ms as f64
                    && loudness_db < self.config.silence_threshold_db
                {
                    self.transition(Articulation::Silence, now_ms);
                }
            }
            Articulation::Silence => {}
        }
    }

    fn transition(&mut self, next: Articulation, now_ms: f64) {
        if next == self.state {
            return;
        }
        log::debug!(
            "[Articulation] {:?} -> {:?} at {:.1} ms",
            self.state,
            next,
            now_ms
        );
        self.state = next;
        self.state_entered_ms = now_ms;
        self.state_changes += 1;
        match next {
            Articulation::Attack => {
                self.attack_started_ms = Some(now_ms);
                self.attack_entries += 1;
            }
            Articulation::Sustain => {}
            Articulation::Release | Articulation::Silence => {
                self.attack_started_ms = None;
            }
        }
    }

    fn push_history(&mut self, loudness_db: f32) {
        if self.history.len() == self.config.history_window {
            self.history.pop_front();
        }
        self.history.push_back(loudness_db);
    }

    fn window_average(&self) -> Option<f32> {
        if self.history.is_empty() {
            return None;
        }
        Some(self.history.iter().sum::<f32>() / self.history.len() as f32)
    }

    pub fn state(&self) -> Articulation {
        self.state
    }

    /// Milliseconds since the current attack began; 0 outside attack/sustain
    pub fn attack_elapsed_ms(&self, now_ms: f64) -> f32 {
        match self.attack_started_ms {
            Some(start) => (now_ms - start).max(0.0) as f32,
            None => 0.0,
        }
    }

    /// Total state transitions since construction or reset (diagnostics)
    pub fn state_changes(&self) -> u64 {
        self.state_changes
    }

    /// Total entries into the attack state (diagnostics)
    pub fn attack_entries(&self) -> u64 {
        self.attack_entries
    }

    /// Return to the initial silent state, clearing the loudness history
    pub fn reset(&mut self) {
        self.history.clear();
        self.state = Articulation::Silence;
        self.state_entered_ms = 0.0;
        self.attack_started_ms = None;
        self.below_silence_since = None;
        self.state_changes = 0;
        self.attack_entries = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ArticulationTracker {
        ArticulationTracker::new(ArticulationConfig::default()).unwrap()
    }

    /// Feed `n` updates of constant loudness, 10 ms apart, starting at `t0`
    fn feed(tracker: &mut ArticulationTracker, loudness: f32, t0: f64, n: usize) -> f64 {
        let mut t = t0;
        for _ in 0..n {
            tracker.update(loudness, t);
            t += 10.0;
        }
        t
    }

    #[test]
    fn test_initial_state_is_silence() {
        assert_eq!(tracker().state(), Articulation::Silence);
    }

    #[test]
    fn test_step_loudness_triggers_attack_within_one_update() {
        let mut tracker = tracker();
        // Establish a quiet baseline
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        assert_eq!(tracker.state(), Articulation::Silence);

        // Step well past the 10 dB energy threshold
        let state = tracker.update(-20.0, t);
        assert_eq!(state, Articulation::Attack);
        assert_eq!(tracker.attack_entries(), 1);
    }

    #[test]
    fn test_attack_becomes_sustain_after_hold() {
        let mut tracker = tracker();
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        tracker.update(-20.0, t);

        // Hold loudness past attack_duration_ms (80 ms default)
        feed(&mut tracker, -20.0, t + 10.0, 10);
        assert_eq!(tracker.state(), Articulation::Sustain);
    }

    #[test]
    fn test_sustain_drop_enters_release() {
        let mut tracker = tracker();
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        let t = feed(&mut tracker, -20.0, t, 12);
        assert_eq!(tracker.state(), Articulation::Sustain);

        // Drop by more than energy_threshold / 2 = 5 dB below the window avg
        tracker.update(-35.0, t);
        assert_eq!(tracker.state(), Articulation::Release);
    }

    #[test]
    fn test_release_decays_to_silence() {
        let mut tracker = tracker();
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        let t = feed(&mut tracker, -20.0, t, 12);
        let t = feed(&mut tracker, -35.0, t, 1);
        assert_eq!(tracker.state(), Articulation::Release);

        // Below silence threshold, past the hold time
        feed(&mut tracker, -70.0, t, 12);
        assert_eq!(tracker.state(), Articulation::Silence);
    }

    #[test]
    fn test_sustained_silence_returns_to_silence() {
        let mut tracker = tracker();
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        let t = feed(&mut tracker, -20.0, t, 12);
        assert_eq!(tracker.state(), Articulation::Sustain);

        // 200 ms below the silence threshold is past both the release decay
        // and the forced min_silence_ms timeout
        feed(&mut tracker, -80.0, t, 20);
        assert_eq!(tracker.state(), Articulation::Silence);
    }

    #[test]
    fn test_forced_silence_timeout_beats_release_decay() {
        let mut tracker = tracker();
        // Baseline at t = 0..40, attack triggered at t = 50
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        tracker.update(-20.0, t);
        assert_eq!(tracker.state(), Articulation::Attack);

        // Silent run begins at t = 60. Walking the chain
        // (attack hold -> sustain -> release -> release hold) would reach
        // silence at t = 240; the forced timeout fires first once the run
        // exceeds 150 ms, at t = 220.
        let mut now = t + 10.0;
        while now < 215.0 {
            tracker.update(-80.0, now);
            now += 10.0;
        }
        assert_ne!(tracker.state(), Articulation::Silence);
        tracker.update(-80.0, 220.0);
        assert_eq!(tracker.state(), Articulation::Silence);
    }

    #[test]
    fn test_non_finite_input_holds_state() {
        let mut tracker = tracker();
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        tracker.update(-20.0, t);
        assert_eq!(tracker.state(), Articulation::Attack);
        let changes = tracker.state_changes();

        assert_eq!(tracker.update(f32::NAN, t + 10.0), Articulation::Attack);
        assert_eq!(tracker.update(-20.0, f64::INFINITY), Articulation::Attack);
        assert_eq!(tracker.state_changes(), changes);
    }

    #[test]
    fn test_attack_elapsed_persists_through_sustain() {
        let mut tracker = tracker();
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        tracker.update(-20.0, t);
        let attack_at = t;

        let t = feed(&mut tracker, -20.0, t + 10.0, 12);
        assert_eq!(tracker.state(), Articulation::Sustain);
        let elapsed = tracker.attack_elapsed_ms(t);
        assert!((elapsed as f64 - (t - attack_at)).abs() < 1e-6);

        // Leaving sustain clears the clock
        tracker.update(-35.0, t);
        assert_eq!(tracker.attack_elapsed_ms(t), 0.0);
    }

    #[test]
    fn test_reattack_from_sustain() {
        let mut tracker = tracker();
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        let t = feed(&mut tracker, -30.0, t, 12);
        assert_eq!(tracker.state(), Articulation::Sustain);

        // A fresh, louder onset re-enters attack without passing silence
        tracker.update(-10.0, t);
        assert_eq!(tracker.state(), Articulation::Attack);
        assert_eq!(tracker.attack_entries(), 2);
    }

    #[test]
    fn test_counters_and_reset() {
        let mut tracker = tracker();
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        feed(&mut tracker, -20.0, t, 12);
        assert!(tracker.state_changes() >= 2);
        assert_eq!(tracker.attack_entries(), 1);

        tracker.reset();
        assert_eq!(tracker.state(), Articulation::Silence);
        assert_eq!(tracker.state_changes(), 0);
        assert_eq!(tracker.attack_entries(), 0);

        // Post-reset behaves like a fresh tracker
        let t = feed(&mut tracker, -60.0, 0.0, 5);
        tracker.update(-20.0, t);
        assert_eq!(tracker.state(), Articulation::Attack);
    }
}
