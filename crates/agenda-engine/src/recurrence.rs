//! Recurring-series rules.
//!
//! A [`Recurrence`] is the frequency/interval/until triple a calendar store
//! keeps on the first event of a series. It travels as an RFC 5545 rule
//! string (`FREQ=WEEKLY;INTERVAL=2;UNTIL=20250131T000000Z`) and is expanded
//! into concrete start times with the `rrule` crate.
//!
//! Times are local and timezone-naive. For expansion they are pinned to UTC
//! so the arithmetic never crosses a DST transition, then converted back.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rrule::RRuleSet;
use serde::{Deserialize, Serialize};

use crate::error::AgendaError;

const RULE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn rule_name(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl FromStr for Frequency {
    type Err = AgendaError;

    /// Accepts `daily`/`weekly`/`monthly`/`yearly` in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(AgendaError::InvalidRequest(format!(
                "unknown recurrence frequency '{other}' (expected daily, weekly, monthly or yearly)"
            ))),
        }
    }
}

/// How a series repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Recurrence {
    pub frequency: Frequency,
    /// Repeat every `interval` units of `frequency`. Always at least 1.
    pub interval: u32,
    /// Last instant an occurrence may start at, if bounded.
    pub until: Option<NaiveDateTime>,
}

impl Recurrence {
    pub fn new(
        frequency: Frequency,
        interval: u32,
        until: Option<NaiveDateTime>,
    ) -> Result<Self, AgendaError> {
        if interval == 0 {
            return Err(AgendaError::InvalidRequest(
                "recurrence interval must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            frequency,
            interval,
            until,
        })
    }

    /// Expand the series into at most `limit` start times, beginning with
    /// `first_start` itself.
    pub fn occurrences(
        &self,
        first_start: NaiveDateTime,
        limit: u16,
    ) -> Result<Vec<NaiveDateTime>, AgendaError> {
        let text = format!(
            "DTSTART:{}Z\nRRULE:{}",
            first_start.format(RULE_TIME_FORMAT),
            self
        );
        let set: RRuleSet = text.parse().map_err(|e: rrule::RRuleError| {
            AgendaError::InvalidRequest(format!("cannot expand recurrence '{self}': {e}"))
        })?;
        Ok(set
            .all(limit)
            .dates
            .into_iter()
            .map(|dt| dt.naive_utc())
            .collect())
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FREQ={};INTERVAL={}",
            self.frequency.rule_name(),
            self.interval
        )?;
        if let Some(until) = self.until {
            write!(f, ";UNTIL={}Z", until.format(RULE_TIME_FORMAT))?;
        }
        Ok(())
    }
}

impl FromStr for Recurrence {
    type Err = AgendaError;

    /// Parse `FREQ=..;INTERVAL=..;UNTIL=..`. `INTERVAL` defaults to 1 and
    /// `UNTIL` may omit its trailing `Z`. Other rule parts are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: String| AgendaError::InvalidRequest(format!("rule '{s}': {why}"));

        let mut frequency = None;
        let mut interval = 1u32;
        let mut until = None;

        for part in s.trim().split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("malformed part '{part}'")))?;
            match key.to_ascii_uppercase().as_str() {
                "FREQ" => frequency = Some(value.parse::<Frequency>()?),
                "INTERVAL" => {
                    interval = value
                        .parse()
                        .map_err(|_| invalid(format!("bad interval '{value}'")))?;
                }
                "UNTIL" => {
                    let raw = value.trim_end_matches('Z');
                    let parsed = NaiveDateTime::parse_from_str(raw, RULE_TIME_FORMAT)
                        .map_err(|e| invalid(format!("bad until '{value}': {e}")))?;
                    until = Some(parsed);
                }
                other => return Err(invalid(format!("unsupported part '{other}'"))),
            }
        }

        let frequency = frequency.ok_or_else(|| invalid("missing FREQ".to_string()))?;
        Recurrence::new(frequency, interval, until)
    }
}

impl TryFrom<String> for Recurrence {
    type Error = AgendaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Recurrence> for String {
    fn from(value: Recurrence) -> Self {
        value.to_string()
    }
}
