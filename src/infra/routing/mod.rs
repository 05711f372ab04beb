mod client;

pub use client::HttpRoutingEngine;
