//! The vault orb grid.
//!
//! The orb starts at the south-west corner of a 4x4 grid of numbers and
//! operators, carrying weight 22. Each move to an adjacent room applies the
//! operator in the room being left to the number in the room being entered.
//! The vault door in the north-east corner opens only for weight 30, and
//! the orb cannot return to its starting room.

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;

pub const WIDTH: usize = 4;
pub const HEIGHT: usize = 4;
pub const START: (usize, usize) = (0, 3);
pub const GOAL: (usize, usize) = (3, 0);
pub const START_WEIGHT: i64 = 22;
pub const GOAL_WEIGHT: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Number(i64),
    Add,
    Sub,
    Mul,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Add => f.write_str("+"),
            Cell::Sub => f.write_str("-"),
            Cell::Mul => f.write_str("*"),
        }
    }
}

use Cell::{Add, Mul, Number as N, Sub};

/// Rows from north (y = 0) to south.
pub const GRID: [[Cell; WIDTH]; HEIGHT] = [
    [Mul, N(8), Sub, N(1)],
    [N(4), Mul, N(11), Mul],
    [Add, N(4), Sub, N(18)],
    [N(22), Sub, N(9), Mul],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    fn step(self, (x, y): (usize, usize)) -> Option<(usize, usize)> {
        let next = match self {
            Direction::North => (x, y.checked_sub(1)?),
            Direction::South => (x, y + 1),
            Direction::East => (x + 1, y),
            Direction::West => (x.checked_sub(1)?, y),
        };
        (next.0 < WIDTH && next.1 < HEIGHT).then_some(next)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A shortest route to the vault door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrbSolution {
    pub moves: Vec<Direction>,
    /// Weight after each move.
    pub weights: Vec<i64>,
}

impl OrbSolution {
    pub fn final_weight(&self) -> i64 {
        self.weights.last().copied().unwrap_or(START_WEIGHT)
    }
}

#[derive(Debug, Clone, Copy)]
struct State {
    pos: (usize, usize),
    weight: i64,
    /// Index of the predecessor in the arena.
    prev: Option<usize>,
    via: Option<Direction>,
}

fn cell((x, y): (usize, usize)) -> Cell {
    GRID[y][x]
}

/// Weight after moving from `from` into `to`.
fn apply(weight: i64, from: (usize, usize), to: (usize, usize)) -> Option<i64> {
    let N(value) = cell(to) else {
        return Some(weight);
    };
    match cell(from) {
        Add => weight.checked_add(value),
        Sub => weight.checked_sub(value),
        Mul => weight.checked_mul(value),
        N(_) => Some(weight),
    }
}

/// Breadth-first search for the shortest route that reaches the vault
/// door with the required weight.
pub fn solve_orb() -> Option<OrbSolution> {
    let mut arena = vec![State {
        pos: START,
        weight: START_WEIGHT,
        prev: None,
        via: None,
    }];
    let mut queue = VecDeque::from([0usize]);
    let mut seen = HashSet::from([(START, START_WEIGHT)]);

    while let Some(index) = queue.pop_front() {
        let state = arena[index];

        if state.pos == GOAL {
            if state.weight == GOAL_WEIGHT {
                return Some(unwind(&arena, index));
            }
            // Entering the vault room with the wrong weight resets the orb.
            continue;
        }

        for dir in Direction::ALL {
            let Some(next) = dir.step(state.pos) else {
                continue;
            };
            if next == START {
                continue;
            }
            let Some(weight) = apply(state.weight, state.pos, next) else {
                continue;
            };
            if !seen.insert((next, weight)) {
                continue;
            }
            arena.push(State {
                pos: next,
                weight,
                prev: Some(index),
                via: Some(dir),
            });
            queue.push_back(arena.len() - 1);
        }
    }

    None
}

fn unwind(arena: &[State], mut index: usize) -> OrbSolution {
    let mut moves = Vec::new();
    let mut weights = Vec::new();
    while let (Some(prev), Some(dir)) = (arena[index].prev, arena[index].via) {
        moves.push(dir);
        weights.push(arena[index].weight);
        index = prev;
    }
    moves.reverse();
    weights.reverse();
    OrbSolution { moves, weights }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_corners() {
        assert_eq!(cell(START), N(22));
        assert_eq!(cell(GOAL), N(1));
    }

    #[test]
    fn test_apply_uses_operator_being_left() {
        assert_eq!(apply(22, (0, 2), (1, 2)), Some(26));
        assert_eq!(apply(22, (0, 3), (1, 3)), Some(22));
        assert_eq!(apply(4, (1, 1), (2, 1)), Some(44));
    }

    #[test]
    fn test_solution_reaches_vault_with_weight_30() {
        let solution = solve_orb().unwrap();
        assert_eq!(solution.final_weight(), GOAL_WEIGHT);
        assert_eq!(solution.moves.len(), 12);

        // Replay the route.
        let mut pos = START;
        let mut weight = START_WEIGHT;
        for (dir, expected) in solution.moves.iter().zip(&solution.weights) {
            let next = dir.step(pos).unwrap();
            assert_ne!(next, START);
            weight = apply(weight, pos, next).unwrap();
            assert_eq!(weight, *expected);
            pos = next;
        }
        assert_eq!(pos, GOAL);
        assert_eq!(weight, GOAL_WEIGHT);
    }

    #[test]
    fn test_edges() {
        assert_eq!(Direction::North.step((0, 0)), None);
        assert_eq!(Direction::West.step((0, 2)), None);
        assert_eq!(Direction::East.step((3, 1)), None);
        assert_eq!(Direction::South.step((1, 3)), None);
        assert_eq!(Direction::North.step((1, 3)), Some((1, 2)));
    }
}
