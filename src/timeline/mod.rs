mod client;
mod cursor;
mod record;

use std::future::Future;

pub use client::TimelineClient;
pub use cursor::{Cursor, FetchRequest};
pub use record::RawRecord;

use crate::error::Result;

/// Anything that can hand back timeline records for a cursor request.
pub trait TimelineSource {
    fn fetch_since(&self, request: FetchRequest) -> impl Future<Output = Result<Vec<RawRecord>>>;
}
