mod store;

pub(crate) use store::replaced_avatar;
pub use store::UserStore;
