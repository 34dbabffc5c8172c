//! Resource locator plumbing: the route tree and the strategy that
//! places, moves and resolves human-readable paths over it.

pub mod mapper;
pub mod strategy;

pub use mapper::RouteMapper;
pub use strategy::{TreeStrategy, MAX_HISTORY_HOPS};
