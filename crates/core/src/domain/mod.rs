pub mod actor;
pub mod movement;
pub mod product;
pub mod request;
