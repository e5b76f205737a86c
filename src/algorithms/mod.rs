//! Concrete administration algorithms, one module per strategy.

pub mod astrat;
pub mod chooser;
pub mod class_rates;
pub mod closest_diff;
pub mod estimate;
pub mod exposure;
pub mod fixed_length;
pub mod max_fisher;
pub mod max_kl;
pub mod pick_rand;
pub mod simulate;
pub mod stop_se;

pub use astrat::AStratify;
pub use chooser::Chooser;
pub use class_rates::ClassRates;
pub use closest_diff::ClosestDiff;
pub use estimate::EstimateMle;
pub use exposure::ExposureCounter;
pub use fixed_length::FixedLength;
pub use max_fisher::{FisherObjective, MaxFisher};
pub use max_kl::MaxKl;
pub use pick_rand::PickRand;
pub use simulate::Simulate;
pub use stop_se::StopOnSe;
