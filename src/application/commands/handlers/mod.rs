//! Command Handlers 实现

mod request_full_handler;
mod submit_query_handler;

pub use request_full_handler::*;
pub use submit_query_handler::*;

#[cfg(test)]
mod scenarios;
