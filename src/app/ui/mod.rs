mod details;
pub(super) mod login;
mod panels;
pub(super) mod sensors;
