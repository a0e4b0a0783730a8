pub mod cache;
pub mod client;
pub mod connector;

pub use cache::QuoteCache;
pub use client::{spawn_feed, FeedHandle, FeedStatus};
pub use connector::{FeedMessage, QuoteConnector, QuoteUpdate};
