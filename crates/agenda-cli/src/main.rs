//! agenda - calendar queries and scheduling over a JSON snapshot
//!
//! Usage:
//!   agenda list --start 2025-01-06             Events in the following week
//!   agenda free --start 2025-01-06 --duration 45
//!   agenda conflicts --calendar Work
//!   agenda create Work "Lunch" --start "2025-01-06 12:00" --end "2025-01-06 13:00"
//!   agenda operations                          Describe every operation
//!
//! Results go to stdout as JSON. Failures go to stderr as
//! `{"kind": ..., "message": ...}` with exit status 1.

mod config;
mod describe;

use std::path::PathBuf;
use std::process::ExitCode;

use agenda_engine::error::{AgendaError, Failure};
use agenda_engine::export::ExportFormat;
use agenda_engine::service::{
    AgendaService, AnalysisRequest, CreateEventRequest, DeleteEventRequest, ExportRequest,
    FreeTimeRequest, ListEventsRequest, MoveEventRequest, RecurringEventRequest,
    RemindersRequest, SearchRequest, UpdateEventRequest,
};
use agenda_engine::store::MemoryStore;
use agenda_engine::temporal::{local_now, parse_datetime};
use anyhow::Result;
use chrono::{Local, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::describe::describe_operations;

#[derive(Parser, Debug)]
#[command(name = "agenda", version, about = "Calendar queries and scheduling over a JSON snapshot")]
struct Cli {
    /// Calendar snapshot to read, and to update after a write.
    #[arg(long, global = true, env = "AGENDA_STORE", default_value = "calendars.json")]
    store: PathBuf,

    /// Settings file. Defaults to ./agenda.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pin the current time (YYYY-MM-DD or "YYYY-MM-DD HH:MM").
    #[arg(long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Calendar scope and date window. Missing bounds fall back to "now" and
/// the configured span.
#[derive(Args, Debug, Clone)]
struct Window {
    #[arg(long)]
    calendar: Option<String>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    end: Option<String>,
}

impl From<Window> for AnalysisRequest {
    fn from(w: Window) -> Self {
        AnalysisRequest {
            calendar: w.calendar,
            start: w.start,
            end: w.end,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct EventArgs {
    calendar: String,
    title: String,
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    url: Option<String>,
    /// Invitee email address; repeat for several.
    #[arg(long = "attendee")]
    attendees: Vec<String>,
    /// Reminder, in minutes before start.
    #[arg(long)]
    alert: Option<u32>,
    #[arg(long)]
    all_day: bool,
}

impl From<EventArgs> for CreateEventRequest {
    fn from(a: EventArgs) -> Self {
        CreateEventRequest {
            calendar: a.calendar,
            title: a.title,
            start: a.start,
            end: a.end,
            location: a.location,
            notes: a.notes,
            url: a.url,
            attendees: a.attendees,
            alert_minutes: a.alert,
            all_day: a.all_day,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Store(StoreCommand),
    /// Describe every operation, with configured preferences appended
    Operations,
}

/// Subcommands answered from the calendar snapshot.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// List calendars with event counts
    Calendars {
        #[arg(long)]
        no_counts: bool,
    },
    /// Calendar names and today's date
    Overview,
    /// Events in a date range
    List {
        #[command(flatten)]
        window: Window,
        #[arg(long)]
        max: Option<usize>,
        #[arg(long)]
        no_all_day: bool,
    },
    /// Case-insensitive text search
    Search {
        query: String,
        #[command(flatten)]
        window: Window,
        /// Also match locations.
        #[arg(long)]
        location: bool,
        /// Also match notes.
        #[arg(long)]
        notes: bool,
        #[arg(long)]
        max: Option<usize>,
    },
    /// First event whose title contains the text
    Details {
        calendar: String,
        title: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Today's schedule
    Today {
        #[arg(long)]
        calendar: Option<String>,
    },
    /// Suggest free slots
    Free {
        #[command(flatten)]
        window: Window,
        /// Slot length in minutes.
        #[arg(long)]
        duration: Option<u32>,
        /// Allow slots outside 09:00-17:00.
        #[arg(long)]
        any_hour: bool,
        #[arg(long)]
        max: Option<usize>,
    },
    /// Overlapping timed events
    Conflicts {
        #[command(flatten)]
        window: Window,
    },
    /// Counts, durations and busiest hours
    Stats {
        #[command(flatten)]
        window: Window,
    },
    /// Render events as txt, csv or ics
    Export {
        #[command(flatten)]
        window: Window,
        #[arg(long, default_value = "txt")]
        format: String,
        /// Also write the export to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Create an event
    Create(EventArgs),
    /// Create a recurring series
    CreateRecurring {
        #[command(flatten)]
        event: EventArgs,
        /// daily, weekly, monthly or yearly
        #[arg(long)]
        frequency: String,
        #[arg(long, default_value_t = 1)]
        interval: u32,
        /// Last date a repetition may start on.
        #[arg(long)]
        until: Option<String>,
    },
    /// Free-form event text (not supported)
    QuickAdd { calendar: String, text: String },
    /// Change fields of an event
    Update {
        calendar: String,
        title: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        new_title: Option<String>,
        #[arg(long)]
        new_start: Option<String>,
        #[arg(long)]
        new_end: Option<String>,
        #[arg(long)]
        new_location: Option<String>,
        #[arg(long)]
        new_notes: Option<String>,
        #[arg(long)]
        new_url: Option<String>,
    },
    /// Move an event, keeping its duration unless --end is given
    Move {
        calendar: String,
        title: String,
        /// Day the event currently starts on.
        #[arg(long)]
        date: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        end: Option<String>,
    },
    /// Delete an event
    Delete {
        calendar: String,
        title: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        all_occurrences: bool,
    },
    /// Add or reset reminders
    Reminders {
        calendar: String,
        title: String,
        #[arg(long)]
        date: String,
        /// Minutes before start, comma separated.
        #[arg(long, value_delimiter = ',')]
        minutes: Vec<u32>,
        /// Remove existing reminders first.
        #[arg(long)]
        clear: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?.with_env(|key| std::env::var(key).ok())?;

    let command = match cli.command {
        Command::Operations => {
            return print_json(&describe_operations(settings.preferences.as_deref()));
        }
        Command::Store(command) => command,
    };

    let now = resolve_now(cli.now.as_deref(), settings.timezone.as_deref())?;
    let store = MemoryStore::load(&cli.store)?;
    let mut service = AgendaService::new(store, settings.defaults, now);
    tracing::debug!(%now, store = %cli.store.display(), "agenda ready");

    let (output, mutated) = dispatch(&mut service, command)?;
    if mutated {
        service.store().save(&cli.store)?;
        tracing::info!(store = %cli.store.display(), "snapshot saved");
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Run one subcommand. The flag is true when the store changed.
fn dispatch(
    service: &mut AgendaService<MemoryStore>,
    command: StoreCommand,
) -> Result<(Value, bool)> {
    let read = |value: Result<Value>| value.map(|v| (v, false));
    let wrote = |value: Result<Value>| value.map(|v| (v, true));

    match command {
        StoreCommand::Calendars { no_counts } => read(json(service.list_calendars(!no_counts)?)),
        StoreCommand::Overview => read(json(service.calendar_overview()?)),
        StoreCommand::List {
            window,
            max,
            no_all_day,
        } => read(json(service.list_events(&ListEventsRequest {
            calendar: window.calendar,
            start: window.start,
            end: window.end,
            max_results: max,
            include_all_day: !no_all_day,
        })?)),
        StoreCommand::Search {
            query,
            window,
            location,
            notes,
            max,
        } => read(json(service.search_events(&SearchRequest {
            query,
            calendar: window.calendar,
            start: window.start,
            end: window.end,
            search_location: location,
            search_notes: notes,
            max_results: max,
        })?)),
        StoreCommand::Details {
            calendar,
            title,
            date,
        } => read(json(service.get_event_details(
            &calendar,
            &title,
            date.as_deref(),
        )?)),
        StoreCommand::Today { calendar } => {
            read(json(service.todays_schedule(calendar.as_deref())?))
        }
        StoreCommand::Free {
            window,
            duration,
            any_hour,
            max,
        } => read(json(service.find_free_time(&FreeTimeRequest {
            window: window.into(),
            duration_minutes: duration,
            business_hours_only: any_hour.then_some(false),
            max_suggestions: max,
        })?)),
        StoreCommand::Conflicts { window } => read(json(service.detect_conflicts(&window.into())?)),
        StoreCommand::Stats { window } => read(json(service.statistics(&window.into())?)),
        StoreCommand::Export {
            window,
            format,
            output,
        } => {
            let request = ExportRequest {
                window: window.into(),
                format: format.parse::<ExportFormat>()?,
                output,
            };
            match service.export_events(&request) {
                Ok(result) => read(json(result)),
                Err(err) => {
                    if let AgendaError::ExportWriteFailure { data, .. } = &err {
                        print!("{data}");
                    }
                    Err(err.into())
                }
            }
        }
        StoreCommand::Create(event) => wrote(json(service.create_event(&event.into())?)),
        StoreCommand::CreateRecurring {
            event,
            frequency,
            interval,
            until,
        } => wrote(json(service.create_recurring_event(&RecurringEventRequest {
            event: event.into(),
            frequency,
            interval,
            until,
        })?)),
        StoreCommand::QuickAdd { calendar, text } => wrote(json(service.quick_add(&calendar, &text)?)),
        StoreCommand::Update {
            calendar,
            title,
            date,
            new_title,
            new_start,
            new_end,
            new_location,
            new_notes,
            new_url,
        } => wrote(json(service.update_event(&UpdateEventRequest {
            calendar,
            title,
            date,
            new_title,
            new_start,
            new_end,
            new_location,
            new_notes,
            new_url,
        })?)),
        StoreCommand::Move {
            calendar,
            title,
            date,
            to,
            end,
        } => wrote(json(service.move_event(&MoveEventRequest {
            calendar,
            title,
            current_date: date,
            new_start: to,
            new_end: end,
        })?)),
        StoreCommand::Delete {
            calendar,
            title,
            date,
            all_occurrences,
        } => wrote(json(service.delete_event(&DeleteEventRequest {
            calendar,
            title,
            date,
            all_occurrences,
        })?)),
        StoreCommand::Reminders {
            calendar,
            title,
            date,
            minutes,
            clear,
        } => wrote(json(service.manage_reminders(&RemindersRequest {
            calendar,
            title,
            date,
            minutes,
            clear_existing: clear,
        })?)),
    }
}

fn resolve_now(pinned: Option<&str>, timezone: Option<&str>) -> Result<NaiveDateTime> {
    if let Some(pinned) = pinned {
        return Ok(parse_datetime(pinned)?);
    }
    Ok(match timezone {
        Some(tz) => local_now(Utc::now(), tz)?,
        None => Local::now().naive_local(),
    })
}

fn json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the failure as JSON on stderr. Engine errors keep their kind;
/// anything else (bad config syntax, I/O) is reported as `internal`.
fn report(err: &anyhow::Error) {
    let body = match err.chain().find_map(|e| e.downcast_ref::<AgendaError>()) {
        Some(agenda) => serde_json::to_string(&Failure::from(agenda)),
        None => serde_json::to_string(&serde_json::json!({
            "kind": "internal",
            "message": format!("{err:#}"),
        })),
    };
    match body {
        Ok(body) => eprintln!("{body}"),
        Err(_) => eprintln!("{err:#}"),
    }
}
