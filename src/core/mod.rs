pub mod bio;
pub mod config;
pub mod interpreter;
pub mod lint;
pub mod markup;
pub mod output;
pub mod persistence;
pub mod resolver;
pub mod reveal;
