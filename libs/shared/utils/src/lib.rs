pub mod clock;
pub mod ids;
pub mod test_utils;

pub use clock::{Clock, SystemClock};
pub use ids::{IdGenerator, UuidIdGenerator};
