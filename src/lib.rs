pub mod config;
pub mod error;
pub mod genetic;
pub mod geometry;
pub mod piece;
pub mod placer;
pub mod rules;
pub mod solver;
pub mod store;
pub mod types;
pub mod validator;
pub mod wire;
