pub mod federated;
pub mod login;
pub mod whoami;

pub use federated::google_sign_in;
pub use login::{login, SessionResponse};
pub use whoami::whoami;
