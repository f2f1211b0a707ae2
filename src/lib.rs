#[macro_use]
extern crate log;

#[macro_use]
extern crate serde;

pub mod common;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod params;
pub mod plugins;
pub mod pool;
pub mod round_engine;
pub mod state;
