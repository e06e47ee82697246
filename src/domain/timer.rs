// Tick-driven countdowns replacing blocking timed sequences. Advanced once
// per fixed step; emits at most one second boundary per call.

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountdownStep {
    /// Still inside the current displayed second.
    Pending,
    /// Crossed into a new displayed second (value is seconds remaining).
    SecondElapsed(u32),
    Finished,
}

#[derive(Debug, Clone, Copy)]
pub struct SecondCountdown {
    remaining: f32,
}

impl SecondCountdown {
    pub fn new(seconds: f32) -> Self {
        Self {
            remaining: seconds.max(0.0),
        }
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.remaining.ceil() as u32
    }

    pub fn advance(&mut self, dt: f32) -> CountdownStep {
        if self.remaining <= 0.0 {
            return CountdownStep::Finished;
        }
        let before = self.remaining.ceil();
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.remaining = 0.0;
            return CountdownStep::Finished;
        }
        let after = self.remaining.ceil();
        if after < before {
            CountdownStep::SecondElapsed(after as u32)
        } else {
            CountdownStep::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_one_update_per_elapsed_second() {
        let mut countdown = SecondCountdown::new(3.0);
        let dt = 1.0 / 60.0;
        let mut seconds = Vec::new();
        let mut finished = false;

        for _ in 0..(60 * 4) {
            match countdown.advance(dt) {
                CountdownStep::SecondElapsed(s) => seconds.push(s),
                CountdownStep::Finished => {
                    finished = true;
                    break;
                }
                CountdownStep::Pending => {}
            }
        }

        assert_eq!(seconds, vec![2, 1]);
        assert!(finished);
    }

    #[test]
    fn zero_duration_finishes_immediately() {
        let mut countdown = SecondCountdown::new(0.0);
        assert_eq!(countdown.advance(1.0 / 60.0), CountdownStep::Finished);
    }
}
