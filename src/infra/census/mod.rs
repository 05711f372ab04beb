mod source;

pub use source::CartographicBoundarySource;
