/// Authentication module
///
/// Password hashing, JWT issuance/verification, session issuance,
/// refresh-token analysis and the per-request access guard.

mod claims;
mod guard;
mod jwt;
mod password;
mod refresh_token;
mod service;
mod session;

pub use claims::{Access, AccessClaims, Claims, Identity, Refresh, RefreshClaims, TokenClass, TokenKind};
pub use guard::AccessGuard;
pub use jwt::{SigningKey, TokenCodec};
pub use password::{validate_password_strength, PasswordHasher};
pub use refresh_token::{RefreshAnalyzer, RefreshOutcome};
pub use service::AuthService;
pub use session::{SessionIssuer, TokenPair};
