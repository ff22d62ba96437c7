mod courses;
mod stats;
mod uploads;
mod users;

pub use courses::*;
pub use stats::*;
pub use uploads::*;
pub use users::*;
