//! Star ratings.

use serde::{Deserialize, Serialize};

/// Error returned for ratings outside 1..=5.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("rating must be between {min} and {max}, got {got}")]
pub struct RatingError {
    pub min: u8,
    pub max: u8,
    pub got: i64,
}

/// A customer's rating of a product, one to five stars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// # Errors
    ///
    /// Returns [`RatingError`] when `value` is outside 1..=5.
    pub fn new(value: i64) -> Result<Self, RatingError> {
        u8::try_from(value)
            .ok()
            .filter(|v| (Self::MIN..=Self::MAX).contains(v))
            .map(Self)
            .ok_or(RatingError {
                min: Self::MIN,
                max: Self::MAX,
                got: value,
            })
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> Self {
        r.0
    }
}

/// How one star of the five-star widget is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarState {
    /// Filled by the viewer's own rating.
    Own,
    /// Filled by the product's average.
    Average,
    Empty,
}

impl StarState {
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Own => "star star--own",
            Self::Average => "star star--average",
            Self::Empty => "star",
        }
    }
}

/// Star states for the widget, index 0 is the first star.
///
/// The viewer's own rating wins over the average; the average is floored.
#[must_use]
pub fn star_states(user_rating: Option<Rating>, average: f64) -> [StarState; 5] {
    let mut states = [StarState::Empty; 5];
    let (filled, state) = match user_rating {
        Some(r) => (usize::from(r.get()), StarState::Own),
        None => (floor_stars(average), StarState::Average),
    };
    for slot in states.iter_mut().take(filled) {
        *slot = state;
    }
    states
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floor_stars(average: f64) -> usize {
    if average.is_nan() || average <= 0.0 {
        return 0;
    }
    (average.floor() as usize).min(usize::from(Rating::MAX))
}
