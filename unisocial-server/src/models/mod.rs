mod content;
mod message;
mod moderation;
mod notification;
mod social;
mod user;

pub use content::*;
pub use message::*;
pub use moderation::*;
pub use notification::*;
pub use social::*;
pub use user::*;
