// mrcbf_sim/src/lib.rs

// This prelude is for convenience for other files WITHIN the mrcbf_sim crate.
pub mod prelude;

// This module contains all the scenario-driven simulation logic.
pub mod cli;
pub mod simulation;
