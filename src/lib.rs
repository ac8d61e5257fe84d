#![forbid(unsafe_code)]

pub mod batch;
pub mod cli;
pub mod config;
pub mod confirm;
pub mod detect;
pub mod error;
pub mod formats;
pub mod interrupt;
pub mod logging;
pub mod openai;
pub mod pipeline;
pub mod review;
pub mod source;
pub mod split;
