//! Battle Commander - tactical decision engine for simulated battles

pub mod battle;
pub mod core;
