pub mod google;
pub mod retry;
pub mod token;

pub use google::{GoogleVerifier, IdentityClaim, IdentityVerifier, VerifyError};
pub use retry::{RetryError, RetryPolicy, Retryable};
pub use token::{Claims, HmacSigner, Signer, SigningError, TokenError, TokenService};
