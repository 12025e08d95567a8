pub mod catalog;
pub mod handlers;
pub mod middleware;
pub mod overlay;
pub mod routes;
pub mod search;

pub use routes::create_router;
