//! CORS middleware configuration

use tower_http::cors::CorsLayer;

/// Any origin, method and header is accepted.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}
