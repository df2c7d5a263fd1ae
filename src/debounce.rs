//! # Button Edge Detection
//!
//! Turns polled button levels into one event per press.
//!
//! Every tracked button owns an [`EdgeDetector`] that remembers the level
//! seen on the previous tick. A press is reported only on the tick where the
//! level goes from released to pressed, so holding a button for many ticks
//! still counts once.

/// Rising-edge detector for one polled boolean input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeDetector {
    previous: bool,
}

impl EdgeDetector {
    #[must_use]
    pub const fn new() -> Self {
        Self { previous: false }
    }

    /// Feeds this tick's level. Returns true only on a released-to-pressed
    /// transition. The stored level is always updated.
    ///
    /// ```
    /// use rover_teleop::debounce::EdgeDetector;
    ///
    /// let mut button = EdgeDetector::new();
    /// assert!(button.edge(true));
    /// assert!(!button.edge(true));
    /// assert!(!button.edge(false));
    /// assert!(button.edge(true));
    /// ```
    pub fn edge(&mut self, current: bool) -> bool {
        let rising = current && !self.previous;
        self.previous = current;
        rising
    }

    /// Level observed on the last call to [`edge`](Self::edge).
    #[must_use]
    pub fn previous(&self) -> bool {
        self.previous
    }
}

/// Momentary buttons whose presses are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Toggles drive enable and resets the brush level.
    EnableToggle,
    /// Raises the brush level by one.
    AuxUp,
    /// Lowers the brush level by one.
    AuxDown,
}

impl Button {
    pub const COUNT: usize = 3;

    const fn index(self) -> usize {
        match self {
            Button::EnableToggle => 0,
            Button::AuxUp => 1,
            Button::AuxDown => 2,
        }
    }
}

/// One [`EdgeDetector`] per [`Button`].
#[derive(Debug, Clone, Default)]
pub struct ButtonBank {
    detectors: [EdgeDetector; Button::COUNT],
}

impl ButtonBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds `button`'s level for this tick and reports a press edge.
    pub fn edge(&mut self, button: Button, current: bool) -> bool {
        self.detectors[button.index()].edge(current)
    }

    /// Forgets all held levels, e.g. after the gamepad is lost.
    pub fn reset(&mut self) {
        self.detectors = Default::default();
    }
}
