pub mod alternatives;
pub mod availability;
pub mod conflict;
pub mod lock;
pub mod recurrence;
pub mod scheduler;
pub mod series;
pub mod store;
pub mod timezone;
pub mod validation;

pub use alternatives::AlternativeRankingService;
pub use availability::AvailabilityService;
pub use conflict::ConflictDetectionService;
pub use lock::PractitionerLocks;
pub use recurrence::{RecurrencePlanner, SeriesDates};
pub use scheduler::SchedulerService;
pub use series::SeriesService;
pub use store::{BookingStore, InMemoryBookingStore, InMemoryPreferenceStore, PreferenceStore};
pub use timezone::{ChronoTzConverter, TimezoneConverter, TimezoneService};
pub use validation::SchedulingValidationService;
