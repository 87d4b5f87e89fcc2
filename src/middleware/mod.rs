/// Middleware module
///
/// Request-boundary middleware for actix-web.

mod jwt_middleware;

pub use jwt_middleware::JwtMiddleware;
