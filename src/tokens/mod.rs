mod store;

pub use store::{TokenKind, TokenStore};
