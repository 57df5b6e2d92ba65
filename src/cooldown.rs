//! Duplicate-activation throttle for interactive controls.
//!
//! A fixed window per guild+participant+control keeps a rapid double-click
//! from opening two modals. This is the only explicit backpressure in the
//! bot; rejected activations get a "try again shortly" reply and never reach
//! the handler.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct CooldownGate {
    window: Duration,
    stamps: Mutex<HashMap<(String, String, String), Instant>>,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            stamps: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when the activation may proceed, recording the trigger
    /// time. Within-window repeats return false and do not refresh the stamp.
    pub fn check(&self, guild_id: &str, participant_id: &str, control_id: &str) -> bool {
        let key = (
            guild_id.to_string(),
            participant_id.to_string(),
            control_id.to_string(),
        );
        let now = Instant::now();
        let mut stamps = self.stamps.lock();

        // Expired stamps are dead weight; sweep them so the map stays
        // proportional to currently-throttled keys.
        stamps.retain(|_, last| now.duration_since(*last) < self.window);

        if stamps.contains_key(&key) {
            return false;
        }

        stamps.insert(key, now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_activation_within_window_is_rejected() {
        let gate = CooldownGate::new(Duration::from_secs(3));
        assert!(gate.check("g1", "u1", "deskrelay:report"));
        assert!(!gate.check("g1", "u1", "deskrelay:report"));
    }

    #[test]
    fn distinct_keys_do_not_interfere() {
        let gate = CooldownGate::new(Duration::from_secs(3));
        assert!(gate.check("g1", "u1", "deskrelay:report"));
        assert!(gate.check("g1", "u2", "deskrelay:report"));
        assert!(gate.check("g2", "u1", "deskrelay:report"));
        assert!(gate.check("g1", "u1", "deskrelay:contact"));
    }

    #[test]
    fn activation_allowed_after_window() {
        let gate = CooldownGate::new(Duration::from_millis(0));
        assert!(gate.check("g1", "u1", "deskrelay:report"));
        assert!(gate.check("g1", "u1", "deskrelay:report"));
    }

    #[test]
    fn expired_stamps_are_swept() {
        let gate = CooldownGate::new(Duration::from_millis(0));
        assert!(gate.check("g1", "u1", "deskrelay:report"));
        assert!(gate.check("g1", "u2", "deskrelay:report"));
        assert!(gate.check("g1", "u3", "deskrelay:report"));
        // Every earlier stamp expired before the last check, so only the
        // newest key survives in the map.
        assert_eq!(gate.stamps.lock().len(), 1);
    }
}
