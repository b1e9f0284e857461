pub(crate) mod chat;
pub(crate) mod continuity;
pub(crate) mod health;
pub(crate) mod models;
pub(crate) mod sessions;
pub(crate) mod tools;
