use super::types::{DecorationOption, StateColor};

impl StateColor {
    /// Whether a marker colored `self` may be recolored to `requested`.
    ///
    /// `uninteresting` and `current` always apply; every other color only
    /// applies over colors of lower precedence, so a later request in the same
    /// pass can never downgrade a marker.
    pub fn yields_to(self, requested: StateColor) -> bool {
        use StateColor::*;
        match requested {
            Uninteresting | Current => true,
            Previous => self != Current,
            Error => !matches!(self, Current | Previous),
            Interesting => !matches!(self, Current | Previous | Error),
        }
    }

    /// Concrete color string for the editor.
    pub fn css(self, dark: bool) -> &'static str {
        use StateColor::*;
        match (self, dark) {
            (Current, true) => "#ff4f4f",
            (Current, false) => "#d40000",
            (Previous, true) => "#4fd14f",
            (Previous, false) => "#008a00",
            (Error, true) => "#ffa64d",
            (Error, false) => "#c25e00",
            (Interesting, true) => "#6fb7ff",
            (Interesting, false) => "#0057b8",
            (Uninteresting, true) => "#8c8c8c",
            (Uninteresting, false) => "#5c5c5c",
        }
    }
}

impl DecorationOption {
    /// Request a color change; returns whether it was applied.
    pub fn request_color(&mut self, requested: StateColor) -> bool {
        if self.color.yields_to(requested) {
            self.color = requested;
            true
        } else {
            false
        }
    }
}
