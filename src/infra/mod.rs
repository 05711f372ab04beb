pub mod census;
pub mod publish;
pub mod routing;
