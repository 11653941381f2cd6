pub mod api;
pub mod token_middleware;

pub use api::create_routes;
