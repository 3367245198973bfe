mod authorizor;
mod password;
mod platform;
mod token;
mod user;

pub use authorizor::Authorizor;
pub use password::{hash_password, verify_password};
pub use platform::Platform;
pub use token::{AccessToken, AccessTokenClaims, TokenIssuer};
pub use user::User;
