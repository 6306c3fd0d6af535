pub mod identity;

pub use identity::AuthUser;
