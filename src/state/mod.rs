pub mod app_settings;
pub mod changes;
pub mod messages;
pub mod refresher;
pub mod store;
pub mod sync;

#[cfg(test)]
pub mod testing;
