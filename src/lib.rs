#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod api;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod logs;
pub mod point;
pub mod renderer;
pub mod server;
pub mod utils;
