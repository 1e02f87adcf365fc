mod handlers;
pub mod models;
pub mod response;
mod routes;

pub use routes::create_router;
