mod chat;
mod plan;
mod user;

pub use chat::*;
pub use plan::*;
pub use user::*;
