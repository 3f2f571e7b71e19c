// src/services/mod.rs

pub mod discovery;
pub mod router;
pub mod scorer;
pub mod session;
