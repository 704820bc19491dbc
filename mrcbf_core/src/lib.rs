// mrcbf_core/src/lib.rs

// This file defines the public modules of the library.
pub mod control;
pub mod error;
pub mod frames;
pub mod models;
pub mod obstacles;
pub mod prelude;
pub mod simulation;
pub mod types;
pub mod utils;
