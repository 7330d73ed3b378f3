//! Dice and rolling.

pub mod roll;

pub use roll::{DieResult, RollResult};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A die the table rolls: d6 for overdraft damage, d20 for initiative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Die {
    /// Six-sided die.
    D6,
    /// Twenty-sided die.
    D20,
}

impl Die {
    /// Returns the number of sides on this die.
    pub fn sides(self) -> u32 {
        match self {
            Self::D6 => 6,
            Self::D20 => 20,
        }
    }

    /// Roll `count` dice of this type.
    pub fn roll<R: Rng + ?Sized>(self, count: u32, rng: &mut R) -> RollResult {
        let dice = (0..count)
            .map(|_| DieResult {
                die: self,
                value: rng.random_range(1..=self.sides()),
            })
            .collect();
        RollResult { dice }
    }
}

impl std::fmt::Display for Die {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn display() {
        assert_eq!(Die::D6.to_string(), "d6");
        assert_eq!(Die::D20.to_string(), "d20");
    }

    #[test]
    fn rolls_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let result = Die::D6.roll(50, &mut rng);
        assert_eq!(result.count(), 50);
        assert!(result.dice.iter().all(|d| (1..=6).contains(&d.value)));
    }

    #[test]
    fn seeded_rolls_repeat() {
        let a = Die::D20.roll(5, &mut StdRng::seed_from_u64(42));
        let b = Die::D20.roll(5, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
