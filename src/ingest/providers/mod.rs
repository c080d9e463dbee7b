pub mod mock;
pub mod rss;

pub use mock::StaticSource;
pub use rss::RssSource;
