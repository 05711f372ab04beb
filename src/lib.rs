pub mod accessibility;
pub mod compare;
pub mod config;
pub mod error;
pub mod fetch;
pub mod frame;
pub mod geometry;
pub mod loaders;
pub mod maps;
pub mod matrix;
pub mod output;
pub mod pipeline;
pub mod types;
