//! Built-in frame sources

pub mod replay;

pub use replay::ReplaySource;
