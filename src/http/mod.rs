//! HTTP surface: health and load reporting

mod routes;

pub use routes::build_router;
