mod renderer;

pub use renderer::{write_feed, FeedRenderer};
