pub mod apify;
pub mod traits;
pub mod types;

pub use apify::{ApifyClient, MarketActors};
pub use traits::ScrapeProvider;
pub use types::{JobId, JobRequest, JobState, JobStatus, RawRecord};
