//! Library crate for courtside-back: a shared basketball scoreboard where one host drives
//! the clocks and score of a game and any number of spectators follow it live.

pub mod config;
pub mod dao;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
