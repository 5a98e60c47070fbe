//! Turns raw press/release edges into gestures.
//!
//! The decoder only measures and flags; what a gesture *means* is decided by the mode
//! state machine. All state lives in one [`InputDecoder`] owned by the consumer of the
//! edge queue, so there is no window where a release resets a timer while a reader is
//! computing a duration from it.

use crate::input::raw::{ButtonId, EdgeKind, RawEdge};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Timing thresholds, supplied from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Held this long, a press reports [`DecodedEvent::LongHold`] once.
    pub long_hold: Duration,
    /// Two releases closer than this report [`DecodedEvent::DoubleTap`].
    pub double_tap_window: Duration,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            long_hold: Duration::from_secs(3),
            double_tap_window: Duration::from_millis(400),
        }
    }
}

/// Two-button gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComboKind {
    /// Primary + secondary held together.
    Record,
    /// Select + primary held together.
    Exit,
}

impl ComboKind {
    pub const ALL: [ComboKind; 2] = [ComboKind::Record, ComboKind::Exit];

    pub fn buttons(self) -> (ButtonId, ButtonId) {
        match self {
            ComboKind::Record => (ButtonId::Primary, ButtonId::Secondary),
            ComboKind::Exit => (ButtonId::Select, ButtonId::Primary),
        }
    }

    pub fn involves(self, button: ButtonId) -> bool {
        let (a, b) = self.buttons();
        a == button || b == button
    }

    fn index(self) -> usize {
        match self {
            ComboKind::Record => 0,
            ComboKind::Exit => 1,
        }
    }
}

/// Set of buttons that were already down when an edge arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldButtons(u8);

impl HeldButtons {
    pub fn contains(self, button: ButtonId) -> bool {
        self.0 & (1 << button.index()) != 0
    }

    fn insert(&mut self, button: ButtonId) {
        self.0 |= 1 << button.index();
    }
}

impl FromIterator<ButtonId> for HeldButtons {
    fn from_iter<I: IntoIterator<Item = ButtonId>>(iter: I) -> Self {
        let mut held = HeldButtons::default();
        for button in iter {
            held.insert(button);
        }
        held
    }
}

/// Gestures produced by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedEvent {
    /// A button went down while the `held` buttons were already down.
    Press { button: ButtonId, held: HeldButtons },
    /// A short press ended. Not reported for presses that already fired a long hold.
    Tap { button: ButtonId, duration: Duration },
    LongHold(ButtonId),
    DoubleTap(ButtonId),
    ComboStart(ComboKind),
    ComboEnd { kind: ComboKind, duration: Duration },
}

/// Per-button tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ButtonState {
    pressed: bool,
    /// Logical press start used for long-hold detection; cleared once it fires.
    pressed_at: Option<Instant>,
    /// Physical press start, used for tap duration.
    pressed_since: Option<Instant>,
    long_fired: bool,
    last_release: Option<Instant>,
}

#[derive(Debug, Clone, Copy, Default)]
struct ComboState {
    started_at: Option<Instant>,
    last_duration: Option<Duration>,
}

/// Edge-to-gesture decoder for the three buttons.
#[derive(Debug)]
pub struct InputDecoder {
    config: DecoderConfig,
    buttons: [ButtonState; 3],
    combos: [ComboState; 2],
    pending: VecDeque<DecodedEvent>,
    last_tap: [Option<Duration>; 3],
    double_tap: [bool; 3],
}

impl InputDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            buttons: [ButtonState::default(); 3],
            combos: [ComboState::default(); 2],
            pending: VecDeque::new(),
            last_tap: [None; 3],
            double_tap: [false; 3],
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Feed one edge. Edges must arrive in timestamp order.
    pub fn ingest(&mut self, edge: RawEdge) {
        match edge.kind {
            EdgeKind::Press => self.on_press(edge.button, edge.at),
            EdgeKind::Release => self.on_release(edge.button, edge.at),
        }
    }

    fn on_press(&mut self, button: ButtonId, at: Instant) {
        if self.buttons[button.index()].pressed {
            return;
        }
        let held: HeldButtons = ButtonId::ALL
            .into_iter()
            .filter(|&other| self.buttons[other.index()].pressed)
            .collect();

        let state = &mut self.buttons[button.index()];
        state.pressed = true;
        state.pressed_at = Some(at);
        state.pressed_since = Some(at);
        state.long_fired = false;
        self.pending.push_back(DecodedEvent::Press { button, held });

        for kind in ComboKind::ALL {
            let (a, b) = kind.buttons();
            let combo = &mut self.combos[kind.index()];
            if kind.involves(button)
                && combo.started_at.is_none()
                && self.buttons[a.index()].pressed
                && self.buttons[b.index()].pressed
            {
                combo.started_at = Some(at);
                self.pending.push_back(DecodedEvent::ComboStart(kind));
            }
        }
    }

    fn on_release(&mut self, button: ButtonId, at: Instant) {
        if !self.buttons[button.index()].pressed {
            return;
        }

        // Combos end first, so a reader sees the combo before the hold or tap that
        // the same release completes.
        for kind in ComboKind::ALL {
            let combo = &mut self.combos[kind.index()];
            if kind.involves(button) {
                if let Some(started) = combo.started_at.take() {
                    let duration = at.saturating_duration_since(started);
                    combo.last_duration = Some(duration);
                    self.pending
                        .push_back(DecodedEvent::ComboEnd { kind, duration });
                }
            }
        }

        let state = &mut self.buttons[button.index()];
        let held = state
            .pressed_since
            .map_or(Duration::ZERO, |since| at.saturating_duration_since(since));
        state.pressed = false;
        state.pressed_since = None;

        // A hold that outlived the threshold between polls still counts as a hold.
        let crossed_unseen = state
            .pressed_at
            .is_some_and(|start| at.saturating_duration_since(start) >= self.config.long_hold);
        state.pressed_at = None;

        if crossed_unseen {
            state.long_fired = true;
            self.pending.push_back(DecodedEvent::LongHold(button));
        }

        if !state.long_fired {
            self.last_tap[button.index()] = Some(held);
            self.pending.push_back(DecodedEvent::Tap {
                button,
                duration: held,
            });

            let is_double = state
                .last_release
                .is_some_and(|prev| at.saturating_duration_since(prev) <= self.config.double_tap_window);
            if is_double {
                state.last_release = None;
                self.double_tap[button.index()] = true;
                self.pending.push_back(DecodedEvent::DoubleTap(button));
            } else {
                state.last_release = Some(at);
            }
        } else {
            state.last_release = None;
        }
        state.long_fired = false;
    }

    /// Check held buttons against the long-hold threshold and return every event
    /// produced since the last poll, oldest first.
    pub fn poll(&mut self, now: Instant) -> Vec<DecodedEvent> {
        for button in ButtonId::ALL {
            let state = &mut self.buttons[button.index()];
            let Some(start) = state.pressed_at else {
                continue;
            };
            if state.pressed && now.saturating_duration_since(start) >= self.config.long_hold {
                state.long_fired = true;
                // Re-arm: no reference left, so the next poll cannot fire again.
                state.pressed_at = None;
                self.pending.push_back(DecodedEvent::LongHold(button));
            }
        }
        self.pending.drain(..).collect()
    }

    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.buttons[button.index()].pressed
    }

    /// How long the button has been physically down.
    pub fn held_for(&self, button: ButtonId, now: Instant) -> Option<Duration> {
        self.buttons[button.index()]
            .pressed_since
            .map(|since| now.saturating_duration_since(since))
    }

    /// Live duration of a combo in progress.
    pub fn combo_held_for(&self, kind: ComboKind, now: Instant) -> Option<Duration> {
        self.combos[kind.index()]
            .started_at
            .map(|started| now.saturating_duration_since(started))
    }

    pub fn combo_active(&self, kind: ComboKind) -> bool {
        self.combos[kind.index()].started_at.is_some()
    }

    /// Duration of the most recently finished combo, frozen at its first release.
    pub fn last_combo_duration(&self, kind: ComboKind) -> Option<Duration> {
        self.combos[kind.index()].last_duration
    }

    /// Duration of the last short tap; consumed by the first read.
    pub fn take_tap(&mut self, button: ButtonId) -> Option<Duration> {
        self.last_tap[button.index()].take()
    }

    /// One-shot double-tap flag, cleared by the first read.
    pub fn take_double_tap(&mut self, button: ButtonId) -> bool {
        std::mem::take(&mut self.double_tap[button.index()])
    }
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}
