#![forbid(unsafe_code)]
#[macro_use]
extern crate tracing;

pub mod address;
pub mod broker;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod link;
pub mod message;
pub mod notice;
pub mod queue;
pub mod reactor;

pub use error::{Error, Result};
