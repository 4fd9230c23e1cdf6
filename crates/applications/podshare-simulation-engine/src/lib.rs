//! Podshare Simulation Engine
//!
//! Replays a recorded (or synthetic) per-pod CPU demand series against a host
//! of fixed capacity. Pods are sized from a percentile of their own demand
//! history, then every time step hands out CPU in weighted randomized
//! round-robin passes where each pod's weight is its request.

pub mod series;
pub mod synthetic;
pub mod model;
pub mod sizing;
pub mod allocation;
pub mod simulation;
pub mod metrics;
pub mod sweep;
pub mod observer;
pub mod config;
