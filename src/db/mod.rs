mod retention;
mod sanitize;
mod schema;
mod store;

pub use retention::RetentionPolicy;
pub use store::ItemStore;
