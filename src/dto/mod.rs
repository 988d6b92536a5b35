pub mod game;
pub mod health;
pub mod sse;
pub mod validation;
pub mod ws;
