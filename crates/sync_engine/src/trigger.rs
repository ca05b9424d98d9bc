//! Fist-hold gesture trigger for alignment sessions.

use contracts::{HandGesture, Handedness, TriggerConfig};
use tracing::debug;

/// What the trigger asks the runtime to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Start a session; the given hand is the trigger hand
    Start(Handedness),
    Stop,
}

#[derive(Debug, Clone, Copy)]
struct Fist {
    hand: Handedness,
    since: f64,
}

/// Starts a session once a fist has been held long enough, stops it on release
#[derive(Debug)]
pub struct GestureTrigger {
    hold_seconds: f64,
    fist: Option<Fist>,
    triggered: bool,
}

impl GestureTrigger {
    pub fn new(config: &TriggerConfig) -> Self {
        Self {
            hold_seconds: config.fist_hold_seconds,
            fist: None,
            triggered: false,
        }
    }

    /// Gesture transition reported by the hand tracker
    pub fn on_gesture_changed(
        &mut self,
        handedness: Handedness,
        old: HandGesture,
        new: HandGesture,
        now: f64,
    ) -> Option<TriggerAction> {
        if new == HandGesture::Fisting {
            debug!(hand = %handedness, "Fist detected");
            self.fist = Some(Fist {
                hand: handedness,
                since: now,
            });
            return None;
        }

        if old != HandGesture::Fisting {
            return None;
        }

        match self.fist {
            Some(fist) if fist.hand == handedness => {
                self.fist = None;
                if std::mem::take(&mut self.triggered) {
                    debug!(hand = %handedness, "Fist released");
                    Some(TriggerAction::Stop)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Poll once per frame
    pub fn update(&mut self, now: f64) -> Option<TriggerAction> {
        let fist = self.fist?;
        if self.triggered || now - fist.since <= self.hold_seconds {
            return None;
        }
        self.triggered = true;
        Some(TriggerAction::Start(fist.hand))
    }

    /// Hand currently holding a fist
    pub fn fist_hand(&self) -> Option<Handedness> {
        self.fist.map(|f| f.hand)
    }
}
