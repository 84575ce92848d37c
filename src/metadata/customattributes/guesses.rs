use std::collections::HashMap;

use dashmap::DashMap;
use strum::Display;

/// Upper bound on decode attempts for one attribute, whatever the number of enums involved.
pub const MAX_ATTEMPTS: usize = 64;

/// Assumed byte width of an enum's underlying integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum EnumWidth {
    /// `byte` or `sbyte`
    #[strum(to_string = "1")]
    One,
    /// `short` or `ushort`
    #[strum(to_string = "2")]
    Two,
    /// `int` or `uint`
    #[default]
    #[strum(to_string = "4")]
    Four,
    /// `long` or `ulong`
    #[strum(to_string = "8")]
    Eight,
}

impl EnumWidth {
    /// Width in bytes.
    #[must_use]
    pub fn bytes(self) -> usize {
        match self {
            EnumWidth::One => 1,
            EnumWidth::Two => 2,
            EnumWidth::Four => 4,
            EnumWidth::Eight => 8,
        }
    }

    /// The next guess in the cycle 4, 1, 2, 8, 4.
    #[must_use]
    pub fn next(self) -> EnumWidth {
        match self {
            EnumWidth::Four => EnumWidth::One,
            EnumWidth::One => EnumWidth::Two,
            EnumWidth::Two => EnumWidth::Eight,
            EnumWidth::Eight => EnumWidth::Four,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Guess {
    width: EnumWidth,
    start: EnumWidth,
}

/// Enum widths assumed while decoding one custom attribute.
///
/// Widths come from the module's committed cache when an enum was decoded successfully
/// before, and default to 4 bytes otherwise. After a failed attempt, [`advance`] moves to
/// the next combination of widths for the enums that attempt consulted, like an odometer:
/// the first enum cycles through 4, 1, 2, 8 and every wrap back to its starting width
/// carries into the next enum. Once the last enum wraps, every combination has been tried.
///
/// [`advance`]: EnumWidthGuesses::advance
#[derive(Debug, Default)]
pub struct EnumWidthGuesses {
    guesses: HashMap<String, Guess>,
    touched: Vec<String>,
    attempts: usize,
}

impl EnumWidthGuesses {
    /// Start without any guesses.
    #[must_use]
    pub fn new() -> EnumWidthGuesses {
        EnumWidthGuesses::default()
    }

    /// Number of attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Returns `true` if the current attempt consulted any enum width.
    #[must_use]
    pub fn has_touched(&self) -> bool {
        !self.touched.is_empty()
    }

    /// Begin a new decode attempt.
    pub fn begin_attempt(&mut self) {
        self.attempts += 1;
        self.touched.clear();
    }

    /// The width to assume for enum `id` in the current attempt.
    pub fn width_of(&mut self, committed: &DashMap<String, EnumWidth>, id: &str) -> EnumWidth {
        if !self.touched.iter().any(|touched| touched == id) {
            self.touched.push(id.to_string());
        }

        if let Some(guess) = self.guesses.get(id) {
            return guess.width;
        }

        let start = committed.get(id).map(|width| *width).unwrap_or_default();
        self.guesses.insert(
            id.to_string(),
            Guess {
                width: start,
                start,
            },
        );
        start
    }

    /// Move to the next combination of widths for the enums of the last attempt.
    ///
    /// Returns `false` once every combination has been tried.
    pub fn advance(&mut self) -> bool {
        for id in &self.touched {
            let Some(guess) = self.guesses.get_mut(id) else {
                continue;
            };

            guess.width = guess.width.next();
            if guess.width != guess.start {
                return true;
            }
        }
        false
    }

    /// Publish the current guesses into `committed` after a successful decode.
    pub fn commit(&self, committed: &DashMap<String, EnumWidth>) {
        for (id, guess) in &self.guesses {
            committed.insert(id.clone(), guess.width);
        }
    }
}
