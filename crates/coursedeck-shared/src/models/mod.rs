mod content;
mod course;
mod user;

pub use content::*;
pub use course::*;
pub use user::*;
