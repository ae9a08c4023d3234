pub mod athlete;
pub mod conversation;
pub mod link;
pub mod plan;
pub mod session;
pub mod slot;
