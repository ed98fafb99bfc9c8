// src/handlers/mod.rs

pub mod admin;
pub mod player;
pub mod session;
