//! Property-based tests for the engine invariants.
//!
//! - Overlap is symmetric and half-open
//! - Conflict detection reports each overlapping pair once
//! - Statistics counts and histogram agree
//! - Filtering respects the result limit and flags truncation exactly
//! - CSV keeps one record per event
//! - Free slots have the requested length and avoid busy time

use agenda_engine::cancel::Cancellation;
use agenda_engine::conflict::detect_conflicts;
use agenda_engine::export::{format_export, ExportFormat};
use agenda_engine::freetime::{busy_slots, find_free_slots, FreeTimeOptions};
use agenda_engine::model::{Calendar, Event, ScopedEvent};
use agenda_engine::query::{filter_events, FilterOptions};
use agenda_engine::stats::compute_statistics;
use agenda_engine::temporal::{overlaps, parse_datetime, BusySlot, DateRange};
use chrono::{Duration, NaiveDateTime, Timelike};
use proptest::prelude::*;

const WEEK_MINUTES: i64 = 7 * 24 * 60;

fn base() -> NaiveDateTime {
    parse_datetime("2025-01-06").unwrap()
}

fn week() -> DateRange {
    DateRange::new(base(), base() + Duration::days(7)).unwrap()
}

fn arb_slot() -> impl Strategy<Value = BusySlot> {
    (0i64..WEEK_MINUTES, 0i64..480).prop_map(|(offset, len)| {
        let start = base() + Duration::minutes(offset);
        BusySlot::new(start, start + Duration::minutes(len))
    })
}

fn arb_event() -> impl Strategy<Value = Event> {
    (0i64..WEEK_MINUTES, 0i64..240, any::<bool>(), "[A-Za-z ,\n]{1,16}").prop_map(
        |(offset, len, all_day, title)| {
            let start = base() + Duration::minutes(offset);
            let mut event = Event::new(title, start, start + Duration::minutes(len));
            event.all_day = all_day;
            event
        },
    )
}

fn arb_calendars() -> impl Strategy<Value = Vec<Calendar>> {
    prop::collection::vec(prop::collection::vec(arb_event(), 0..12), 1..4).prop_map(|lists| {
        lists
            .into_iter()
            .enumerate()
            .map(|(i, events)| Calendar {
                name: format!("Calendar {i}"),
                events,
            })
            .collect()
    })
}

// ============================================================================
// Overlap and conflicts
// ============================================================================

#[test]
fn proptest_overlap_is_symmetric() {
    proptest!(|(a in arb_slot(), b in arb_slot())| {
        prop_assert_eq!(overlaps(&a, &b), overlaps(&b, &a));
        prop_assert_eq!(a.intersection(&b).is_some(), overlaps(&a, &b));
    });
}

#[test]
fn proptest_touching_slots_never_overlap() {
    proptest!(|(a in arb_slot(), len in 0i64..480)| {
        let next = BusySlot::new(a.end, a.end + Duration::minutes(len));
        prop_assert!(!overlaps(&a, &next));
    });
}

#[test]
fn proptest_one_conflict_per_overlapping_pair() {
    proptest!(|(calendars in arb_calendars())| {
        let report = detect_conflicts(&calendars, &week(), None, &Cancellation::new()).unwrap();

        let timed: Vec<BusySlot> = calendars
            .iter()
            .flat_map(|c| c.events.iter())
            .filter(|e| !e.all_day)
            .map(|e| e.busy_slot())
            .collect();
        let mut expected = 0;
        for i in 0..timed.len() {
            for j in i + 1..timed.len() {
                if overlaps(&timed[i], &timed[j]) {
                    expected += 1;
                }
            }
        }
        prop_assert_eq!(report.total, expected);
        for conflict in &report.conflicts {
            prop_assert!(conflict.overlap.start < conflict.overlap.end);
        }
    });
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn proptest_statistics_counts_agree() {
    proptest!(|(calendars in arb_calendars())| {
        let stats = compute_statistics(&calendars, &week(), None, &Cancellation::new()).unwrap();
        prop_assert_eq!(stats.timed_events + stats.all_day_events, stats.total_events);
        prop_assert_eq!(stats.hour_histogram.iter().sum::<usize>(), stats.timed_events);
        for hour in &stats.busiest_hours {
            prop_assert_eq!(stats.hour_histogram[*hour as usize], stats.busiest_hour_count);
        }
    });
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn proptest_filter_limit_and_truncation() {
    proptest!(|(calendars in arb_calendars(), k in 0usize..20, include_all_day in any::<bool>())| {
        let unlimited = FilterOptions {
            max_results: usize::MAX,
            include_all_day,
            ..Default::default()
        };
        let all = filter_events(&calendars, &week(), &unlimited, &Cancellation::new()).unwrap();

        let limited = FilterOptions { max_results: k, ..unlimited };
        let result = filter_events(&calendars, &week(), &limited, &Cancellation::new()).unwrap();

        prop_assert!(result.events.len() <= k);
        prop_assert_eq!(result.truncated, all.events.len() > k);
        prop_assert_eq!(&result.events[..], &all.events[..result.events.len()]);
    });
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn proptest_csv_keeps_one_record_per_event() {
    proptest!(|(events in prop::collection::vec(arb_event(), 0..20), quoted in "[A-Za-z \",]{1,8}")| {
        let mut scoped: Vec<ScopedEvent> =
            events.into_iter().map(|e| ScopedEvent::new("Work, Team", e)).collect();
        scoped.push(ScopedEvent::new("Home", Event::new(quoted, base(), base())));
        let csv = format_export(&scoped, ExportFormat::Csv, &week(), base().and_utc()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        prop_assert_eq!(records.len(), scoped.len());
        for (record, event) in records.iter().zip(&scoped) {
            prop_assert_eq!(record.len(), 8);
            prop_assert_eq!(&record[0], event.event.title.replace(',', ";").replace('\n', " "));
            prop_assert_eq!(&record[6], event.calendar.replace(',', ";"));
        }
    });
}

// ============================================================================
// Free time
// ============================================================================

#[test]
fn proptest_free_slots_avoid_busy_time() {
    proptest!(|(
        calendars in arb_calendars(),
        duration in 15u32..120,
        business_hours_only in any::<bool>(),
        max in 1usize..8,
    )| {
        let options = FreeTimeOptions {
            calendar: None,
            duration_minutes: duration,
            business_hours_only,
            max_suggestions: max,
        };
        let range = week();
        let slots = find_free_slots(&calendars, &range, &options, &Cancellation::new()).unwrap();
        let busy = busy_slots(&calendars, &range, None).unwrap();

        prop_assert!(slots.len() <= max);
        for (i, slot) in slots.iter().enumerate() {
            prop_assert_eq!(slot.end - slot.start, Duration::minutes(i64::from(duration)));
            prop_assert!(slot.start >= range.start && slot.end <= range.end);
            let as_busy = BusySlot::new(slot.start, slot.end);
            prop_assert!(busy.iter().all(|b| !overlaps(b, &as_busy)));
            if business_hours_only {
                prop_assert!((9..17).contains(&slot.start.hour()));
            }
            if i > 0 {
                prop_assert!(slots[i - 1].end <= slot.start);
            }
        }
    });
}

#[test]
fn proptest_free_week_fills_every_suggestion() {
    proptest!(|(duration in 15u32..240, max in 1usize..10)| {
        let options = FreeTimeOptions {
            calendar: None,
            duration_minutes: duration,
            business_hours_only: true,
            max_suggestions: max,
        };
        let slots = find_free_slots(&[], &week(), &options, &Cancellation::new()).unwrap();
        prop_assert_eq!(slots.len(), max);
    });
}
