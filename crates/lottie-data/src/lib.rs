//! Serde model of the Lottie document consumed by the expression engine.

pub mod model;
