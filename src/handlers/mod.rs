// src/handlers/mod.rs

pub mod attempt;
pub mod catalog;
pub mod common;
pub mod review;
pub mod session;
