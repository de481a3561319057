//! The coin equation on the ruins door.
//!
//! Five coins worth 2, 3, 5, 7 and 9 must be placed into
//! `_ + _ * _^2 + _^3 - _ = 399`.

use serde::Serialize;
use std::fmt;

/// Target value of the equation.
pub const TARGET: i64 = 399;

/// The five coins, named by their in-game description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Coin {
    Red,
    Corroded,
    Shiny,
    Concave,
    Blue,
}

impl Coin {
    pub const ALL: [Coin; 5] = [Coin::Red, Coin::Corroded, Coin::Shiny, Coin::Concave, Coin::Blue];

    /// Number of dots on the coin.
    pub const fn value(self) -> i64 {
        match self {
            Coin::Red => 2,
            Coin::Corroded => 3,
            Coin::Shiny => 5,
            Coin::Concave => 7,
            Coin::Blue => 9,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Coin::Red => "red",
            Coin::Corroded => "corroded",
            Coin::Shiny => "shiny",
            Coin::Concave => "concave",
            Coin::Blue => "blue",
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} coin", self.name())
    }
}

fn evaluate(order: &[Coin; 5]) -> i64 {
    let [a, b, c, d, e] = order.map(Coin::value);
    a + b * c.pow(2) + d.pow(3) - e
}

/// Find the first coin order (in lexicographic permutation order) that
/// satisfies the equation.
pub fn solve_coins() -> Option<[Coin; 5]> {
    let mut order = Coin::ALL;
    loop {
        if evaluate(&order) == TARGET {
            return Some(order);
        }
        if !next_permutation(&mut order) {
            return None;
        }
    }
}

/// Advance to the next lexicographic permutation by coin value.
fn next_permutation(items: &mut [Coin]) -> bool {
    let Some(pivot) = (1..items.len())
        .rev()
        .find(|&i| items[i - 1].value() < items[i].value())
    else {
        return false;
    };
    let pivot = pivot - 1;
    let swap = (pivot + 1..items.len())
        .rev()
        .find(|&j| items[j].value() > items[pivot].value())
        .unwrap_or(pivot + 1);
    items.swap(pivot, swap);
    items[pivot + 1..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution() {
        let order = solve_coins().unwrap();
        assert_eq!(order.map(Coin::value), [9, 2, 5, 7, 3]);
        assert_eq!(
            order,
            [Coin::Blue, Coin::Red, Coin::Shiny, Coin::Concave, Coin::Corroded]
        );
        assert_eq!(evaluate(&order), TARGET);
    }

    #[test]
    fn test_permutations_are_exhaustive() {
        let mut order = Coin::ALL;
        let mut count = 1;
        while next_permutation(&mut order) {
            count += 1;
        }
        assert_eq!(count, 120);
    }
}
