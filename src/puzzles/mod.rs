//! Offline solvers for the puzzles inside the challenge image.
//!
//! Each solver is a pure function over the puzzle's parameters, so results
//! can be checked in tests and printed by the `solve` subcommand.

pub mod coins;
pub mod orb;
pub mod teleporter;

pub use coins::{solve_coins, Coin};
pub use orb::{solve_orb, Direction, OrbSolution};
pub use teleporter::{confirm, find_r7};
