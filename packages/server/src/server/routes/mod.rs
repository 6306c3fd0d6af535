// HTTP routes
pub mod health;
pub mod stream;
pub mod tracking;

pub use health::*;
pub use stream::*;
pub use tracking::*;
