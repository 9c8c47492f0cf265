pub mod outcome;
pub mod posting;
pub mod settings;
pub mod work_item;

pub use outcome::{Failure, Outcome};
pub use posting::{ExtractedJob, JobPosting, Overrides, RefinedJob, ScrapedCandidate};
pub use settings::Settings;
pub use work_item::{WorkItem, WorkStatus};
