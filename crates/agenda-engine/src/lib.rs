//! # agenda-engine
//!
//! Calendar query and scheduling engine.
//!
//! Reads event snapshots from a calendar store and answers the questions an
//! assistant asks about a schedule: what is on, where the gaps are, which
//! meetings collide, where the time goes. Writes go back to the store as
//! structured requests.
//!
//! ## Modules
//!
//! - [`temporal`] - Date parsing, closed range membership, half-open overlap
//! - [`model`] - Events, calendars, attendees
//! - [`recurrence`] - Frequency/interval/until rules, expanded with `rrule`
//! - [`query`] - Scope, range, text filtering with truncation
//! - [`freetime`] - Greedy free-slot search under business-hour constraints
//! - [`conflict`] - Pairwise overlap detection
//! - [`stats`] - Counts, durations, start-hour histogram
//! - [`export`] - Text, CSV, and iCalendar renderings
//! - [`store`] - The calendar store contract and an in-memory store
//! - [`service`] - Request-level operations with defaults and validation
//! - [`cancel`] - Cooperative cancellation
//! - [`error`] - Error types

pub mod cancel;
pub mod conflict;
pub mod error;
pub mod export;
pub mod freetime;
pub mod model;
pub mod query;
pub mod recurrence;
pub mod service;
pub mod stats;
pub mod store;
pub mod temporal;

pub use cancel::Cancellation;
pub use conflict::{detect_conflicts, Conflict, ConflictReport};
pub use error::{AgendaError, ErrorKind, Failure};
pub use export::{format_export, ExportFormat};
pub use freetime::{find_free_slots, FreeSlot, FreeTimeOptions};
pub use model::{Attendee, Calendar, Event, ParticipationStatus, ScopedEvent};
pub use query::{filter_events, FilterOptions, QueryResult};
pub use recurrence::{Frequency, Recurrence};
pub use service::{AgendaService, QueryDefaults};
pub use stats::{compute_statistics, CalendarStatistics};
pub use store::{CalendarStore, EventLocator, MemoryStore, WriteReceipt, WriteRequest};
pub use temporal::{overlaps, parse_datetime, within_range, BusySlot, DateRange};
