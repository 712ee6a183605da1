pub mod json_feed;
pub mod sample_feed;

pub use json_feed::HttpTimelineFeed;
pub use sample_feed::SampleTimelineFeed;
