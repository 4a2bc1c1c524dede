//! Dice rolling
//!
//! Parses and rolls `NdS±M` notation ("2d6+3", "1d20", "4d6-2"). All
//! randomness flows through a [`Roller`] so combat is reproducible under a
//! fixed seed and scriptable in tests.

use std::collections::VecDeque;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Source of die faces and uniform picks
pub trait Roller: Send {
    /// Roll one die, returning a face in `1..=sides`
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Pick an index uniformly in `0..len` (`len` > 0)
    fn pick(&mut self, len: usize) -> usize;

    /// Position to save with a snapshot, if this roller can resume
    fn state(&self) -> Option<RollerState> {
        None
    }

    /// Continue from a saved position
    fn resume(&mut self, _state: RollerState) {}
}

/// Where a seeded roller is in its sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollerState {
    pub seed: u64,
    pub draws: u64,
}

/// Seeded, counter-based [`Roller`]
///
/// Draw `n` is a pure function of the seed and `n`, so a roller rebuilt from
/// its [`RollerState`] continues the same sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RngRoller {
    state: RollerState,
}

impl RngRoller {
    /// Deterministic roller for a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            state: RollerState { seed, draws: 0 },
        }
    }

    /// Roller with a seed drawn from the OS
    pub fn from_entropy() -> Self {
        Self::seeded(rand::random())
    }

    fn next_rng(&mut self) -> StdRng {
        let RollerState { seed, draws } = self.state;
        self.state.draws = draws.wrapping_add(1);
        StdRng::seed_from_u64(seed ^ draws.wrapping_mul(0x9e37_79b9_7f4a_7c15))
    }
}

impl Roller for RngRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.next_rng().random_range(1..=sides.max(1))
    }

    fn pick(&mut self, len: usize) -> usize {
        self.next_rng().random_range(0..len.max(1))
    }

    fn state(&self) -> Option<RollerState> {
        Some(self.state)
    }

    fn resume(&mut self, state: RollerState) {
        self.state = state;
    }
}

/// Replays a fixed sequence of faces, then falls back to 1
///
/// Faces larger than the die are clamped to the die size. Picks consume the
/// same queue modulo `len`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoller {
    faces: VecDeque<u32>,
}

impl ScriptedRoller {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
        }
    }

    /// Append more faces to the script
    pub fn push(&mut self, faces: impl IntoIterator<Item = u32>) {
        self.faces.extend(faces);
    }

    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl Roller for ScriptedRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.faces.pop_front().unwrap_or(1).clamp(1, sides.max(1))
    }

    fn pick(&mut self, len: usize) -> usize {
        self.faces.pop_front().unwrap_or(0) as usize % len.max(1)
    }
}

/// A parsed dice roll specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

/// Outcome of rolling a [`DiceRoll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub faces: Vec<u32>,
    pub total: i32,
}

impl DiceRoll {
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self {
            count,
            sides,
            modifier,
        }
    }

    /// Roll the dice and return the total
    pub fn roll(&self, roller: &mut dyn Roller) -> i32 {
        self.roll_detailed(roller).total
    }

    /// Roll and keep the individual faces
    pub fn roll_detailed(&self, roller: &mut dyn Roller) -> RollOutcome {
        self.roll_times(roller, self.count)
    }

    /// Roll twice the dice, adding the modifier once (critical "double dice")
    pub fn roll_doubled(&self, roller: &mut dyn Roller) -> RollOutcome {
        self.roll_times(roller, self.count * 2)
    }

    fn roll_times(&self, roller: &mut dyn Roller, count: u32) -> RollOutcome {
        let faces: Vec<u32> = (0..count).map(|_| roller.roll_die(self.sides)).collect();
        let sum: i64 = faces.iter().map(|f| *f as i64).sum();
        let total = Self::saturate(sum + self.modifier as i64);
        RollOutcome { faces, total }
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        Self::saturate(self.count as i64 + self.modifier as i64)
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        Self::saturate(self.count as i64 * self.sides as i64 + self.modifier as i64)
    }

    fn saturate(total: i64) -> i32 {
        total.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }
}

impl FromStr for DiceRoll {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.modifier {
            0 => write!(f, "{}d{}", self.count, self.sides),
            m if m > 0 => write!(f, "{}d{}+{}", self.count, self.sides, m),
            m => write!(f, "{}d{}{}", self.count, self.sides, m),
        }
    }
}

/// Largest dice pool accepted from authored content
const MAX_DICE: u32 = 100;

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceRoll, String> {
    let notation = notation.trim().to_lowercase();

    let (count_str, rest) = notation
        .split_once('d')
        .ok_or("missing 'd' in dice notation")?;

    // "d6" means "1d6"
    let count: u32 = if count_str.is_empty() {
        1
    } else {
        count_str
            .parse()
            .map_err(|_| format!("invalid dice count: {}", count_str))?
    };
    if count == 0 {
        return Err("dice count must be at least 1".to_string());
    }
    if count > MAX_DICE {
        return Err(format!("at most {} dice per roll", MAX_DICE));
    }

    let (sides_str, modifier) = match rest.find(['+', '-']) {
        Some(pos) => {
            let mod_str = &rest[pos..];
            let modifier: i32 = mod_str
                .trim_start_matches('+')
                .parse()
                .map_err(|_| format!("invalid modifier: {}", mod_str))?;
            (&rest[..pos], modifier)
        }
        None => (rest, 0),
    };

    let sides: u32 = sides_str
        .parse()
        .map_err(|_| format!("invalid die sides: {}", sides_str))?;
    if sides == 0 {
        return Err("die sides must be at least 1".to_string());
    }

    Ok(DiceRoll::new(count, sides, modifier))
}
