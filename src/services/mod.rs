pub mod routing_api;
pub mod tract_api;
