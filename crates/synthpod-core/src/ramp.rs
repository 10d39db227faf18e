//! Click-free connection/port ramps (§4.9).
//!
//! Disconnecting a live audio connection, or silencing a port whose module
//! is being removed, must not introduce a discontinuity. A [`Ramp`] walks a
//! gain from 0 to 1 (`Up`) or 1 to 0 (`Down`) over an exact, caller-chosen
//! number of samples using linear interpolation with exact snap-to-target
//! on the last step — the same "no overshoot, no residual" arithmetic as a
//! linear-smoothed parameter, generalized from a scalar parameter smoother
//! to a per-connection lifecycle state machine.
//!
//! After a `Down` ramp completes, a connection is not yet safe to drop: any
//! in-flight atom sequence events already queued for delivery still need to
//! drain. `DownDel`/`DownDrain` model that two-step teardown (see the state
//! descriptions below).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampState {
    /// Not ramping; `gain` is the settled value (0.0 or 1.0).
    Off,
    /// Gain rising from 0 toward 1 — a newly made connection fading in.
    Up,
    /// Gain falling from 1 toward 0 — a connection being removed, still
    /// producing audio until the ramp completes.
    Down,
    /// The `Down` ramp reached 0; the connection is silent but its removal
    /// is deferred until the next safe point (e.g. end of block).
    DownDel,
    /// Deletion was requested but atom/event data already in flight must be
    /// drained first; no more samples are produced while in this state.
    DownDrain,
}

/// A linear gain ramp with exact-sample completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    pub state: RampState,
    pub gain: f32,
    step: f32,
    remaining: u32,
}

impl Ramp {
    /// A ramp settled fully on (gain 1, not ramping). The default state for
    /// a freshly made, already-audible connection.
    #[must_use]
    pub fn settled_on() -> Self {
        Self {
            state: RampState::Off,
            gain: 1.0,
            step: 0.0,
            remaining: 0,
        }
    }

    /// A ramp settled fully off (gain 0, not ramping).
    #[must_use]
    pub fn settled_off() -> Self {
        Self {
            state: RampState::Off,
            gain: 0.0,
            step: 0.0,
            remaining: 0,
        }
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state == RampState::Off
    }

    /// Begins a fade-in to gain 1.0 over `n` samples. `n == 0` snaps
    /// immediately.
    pub fn start_up(&mut self, n: u32) {
        self.begin(RampState::Up, 1.0, n);
    }

    /// Begins a fade-out to gain 0.0 over `n` samples, after which the ramp
    /// enters [`RampState::DownDel`].
    pub fn start_down(&mut self, n: u32) {
        self.begin(RampState::Down, 0.0, n);
    }

    fn begin(&mut self, state: RampState, target: f32, n: u32) {
        if n == 0 {
            self.gain = target;
            self.state = if state == RampState::Down {
                RampState::DownDel
            } else {
                RampState::Off
            };
            self.remaining = 0;
            self.step = 0.0;
            return;
        }
        self.step = (target - self.gain) / n as f32;
        self.remaining = n;
        self.state = state;
    }

    /// Advances the ramp by one sample, returning the gain to apply to that
    /// sample. Transitions `Up -> Off` and `Down -> DownDel` on the sample
    /// that reaches the target exactly.
    pub fn next_sample(&mut self) -> f32 {
        match self.state {
            RampState::Off | RampState::DownDrain => self.gain,
            RampState::Up | RampState::Down => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.gain = if self.state == RampState::Up { 1.0 } else { 0.0 };
                    self.state = if self.state == RampState::Up {
                        RampState::Off
                    } else {
                        RampState::DownDel
                    };
                } else {
                    self.gain += self.step;
                }
                self.gain
            }
            RampState::DownDel => self.gain,
        }
    }

    /// Multiplies `buf` in place by this ramp's envelope, sample by sample.
    /// Returns `true` if the ramp finished (transitioned out of `Up`/`Down`)
    /// during this block.
    pub fn apply(&mut self, buf: &mut [f32]) -> bool {
        if self.state == RampState::Off {
            if self.gain != 1.0 {
                buf.iter_mut().for_each(|s| *s *= self.gain);
            }
            return false;
        }
        if self.state == RampState::DownDrain || self.state == RampState::DownDel {
            buf.iter_mut().for_each(|s| *s = 0.0);
            return false;
        }
        let was = self.state;
        for s in buf.iter_mut() {
            *s *= self.next_sample();
        }
        self.state != was
    }

    /// Marks a completed `Down` ramp as awaiting drain rather than
    /// immediate removal, per the two-step teardown in §4.9.
    pub fn begin_drain(&mut self) {
        debug_assert_eq!(self.state, RampState::DownDel);
        self.state = RampState::DownDrain;
    }

    /// True once a down ramp (and its drain, if any) has fully completed
    /// and the connection is safe to remove.
    #[must_use]
    pub fn is_removable(&self) -> bool {
        matches!(self.state, RampState::DownDel | RampState::DownDrain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_ramp_reaches_exactly_one() {
        let mut ramp = Ramp::settled_off();
        ramp.start_up(4);
        let mut last = 0.0;
        for _ in 0..4 {
            last = ramp.next_sample();
        }
        assert_eq!(last, 1.0);
        assert_eq!(ramp.state, RampState::Off);
    }

    #[test]
    fn down_ramp_reaches_exactly_zero_and_marks_del() {
        let mut ramp = Ramp::settled_on();
        ramp.start_down(3);
        let mut last = 1.0;
        for _ in 0..3 {
            last = ramp.next_sample();
        }
        assert_eq!(last, 0.0);
        assert_eq!(ramp.state, RampState::DownDel);
        assert!(ramp.is_removable());
    }

    #[test]
    fn zero_length_ramp_snaps_immediately() {
        let mut ramp = Ramp::settled_off();
        ramp.start_down(0);
        assert_eq!(ramp.gain, 0.0);
        assert_eq!(ramp.state, RampState::DownDel);
    }

    #[test]
    fn apply_multiplies_block_and_reports_completion() {
        let mut ramp = Ramp::settled_off();
        ramp.start_up(4);
        let mut buf = [1.0f32; 4];
        let finished = ramp.apply(&mut buf);
        assert!(finished);
        assert_eq!(buf[3], 1.0);
        assert!(buf[0] < buf[1] && buf[1] < buf[2]);
    }

    #[test]
    fn drain_state_silences_and_blocks_removal_until_marked() {
        let mut ramp = Ramp::settled_on();
        ramp.start_down(2);
        ramp.next_sample();
        ramp.next_sample();
        assert_eq!(ramp.state, RampState::DownDel);
        ramp.begin_drain();
        assert_eq!(ramp.state, RampState::DownDrain);
        assert!(ramp.is_removable());
        let mut buf = [1.0f32; 2];
        assert!(!ramp.apply(&mut buf));
        assert_eq!(buf, [0.0, 0.0]);
    }
}
