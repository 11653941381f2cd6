pub mod config;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod live;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use config::Config;
pub use routes::create_routes;
pub use state::AppState;
