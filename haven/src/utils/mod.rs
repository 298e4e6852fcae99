pub mod retry;

pub use retry::{PollStep, poll_until, with_retry, with_timeout};
