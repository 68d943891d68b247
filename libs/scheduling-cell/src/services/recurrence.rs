// libs/scheduling-cell/src/services/recurrence.rs
//
// Pure expansion of a recurrence rule into calendar dates. Every date is
// computed from the anchor (never from the previous date), so month-end
// clamping cannot drift and the sequence restarts identically when cloned.

use std::collections::BTreeSet;

use chrono::{Duration, Months, NaiveDate};

use crate::error::{Result, SchedulingError};
use crate::models::{RecurrencePattern, SchedulingRules, SeriesHorizon, SeriesRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Count(u32),
    Through(NaiveDate),
    Before(NaiveDate),
}

/// Finite, restartable sequence of series dates.
#[derive(Debug, Clone)]
pub struct SeriesDates {
    pattern: RecurrencePattern,
    anchor: NaiveDate,
    exceptions: BTreeSet<NaiveDate>,
    stop: Stop,
    step: u32,
    max_steps: u32,
}

impl SeriesDates {
    fn date_at(&self, n: u32) -> Option<NaiveDate> {
        step_date(self.anchor, self.pattern, n)
    }

    fn reached_stop(&self, step: u32, date: NaiveDate) -> bool {
        match self.stop {
            Stop::Count(count) => step >= count,
            Stop::Through(last) => date > last,
            Stop::Before(cap) => date >= cap,
        }
    }
}

impl Iterator for SeriesDates {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while self.step < self.max_steps {
            let step = self.step;
            let date = self.date_at(step)?;
            if self.reached_stop(step, date) {
                self.step = self.max_steps;
                return None;
            }
            self.step += 1;

            // Exceptions drop a date without shifting the ones after it.
            if !self.exceptions.contains(&date) {
                return Some(date);
            }
        }
        None
    }
}

/// Date of the `n`-th step from the anchor.
pub fn step_date(anchor: NaiveDate, pattern: RecurrencePattern, n: u32) -> Option<NaiveDate> {
    match pattern {
        RecurrencePattern::Weekly => anchor.checked_add_signed(Duration::days(7 * i64::from(n))),
        RecurrencePattern::Biweekly => anchor.checked_add_signed(Duration::days(14 * i64::from(n))),
        RecurrencePattern::Monthly => anchor.checked_add_months(Months::new(n)),
    }
}

#[derive(Debug, Clone)]
pub struct RecurrencePlanner {
    cap_months: u32,
    max_occurrences: u32,
}

impl RecurrencePlanner {
    pub fn new(rules: &SchedulingRules) -> Self {
        Self {
            cap_months: rules.recurrence_cap_months,
            max_occurrences: rules.max_series_occurrences,
        }
    }

    pub fn plan(&self, rule: &SeriesRule) -> Result<SeriesDates> {
        let stop = match rule.horizon {
            Some(SeriesHorizon::Occurrences(0)) => {
                return Err(SchedulingError::Validation(
                    "A series needs at least one occurrence".to_string(),
                ));
            }
            Some(SeriesHorizon::Occurrences(count)) if count > self.max_occurrences => {
                return Err(SchedulingError::Validation(format!(
                    "A series may not exceed {} occurrences, got {}",
                    self.max_occurrences, count
                )));
            }
            Some(SeriesHorizon::Occurrences(count)) => Stop::Count(count),
            Some(SeriesHorizon::Until(end)) if end < rule.anchor_date => {
                return Err(SchedulingError::Validation(format!(
                    "Series end date {} is before its anchor {}",
                    end, rule.anchor_date
                )));
            }
            Some(SeriesHorizon::Until(end)) => Stop::Through(end),
            None => {
                let cap = rule
                    .anchor_date
                    .checked_add_months(Months::new(self.cap_months))
                    .ok_or_else(|| {
                        SchedulingError::Validation("Series anchor date is out of range".to_string())
                    })?;
                Stop::Before(cap)
            }
        };

        let dates = SeriesDates {
            pattern: rule.pattern,
            anchor: rule.anchor_date,
            exceptions: rule.exception_dates.clone(),
            stop,
            step: 0,
            max_steps: self.max_occurrences,
        };

        if let Stop::Through(end) = stop {
            if dates.date_at(self.max_occurrences).is_some_and(|d| d <= end) {
                return Err(SchedulingError::Validation(format!(
                    "Series through {} would exceed {} occurrences",
                    end, self.max_occurrences
                )));
            }
        }

        Ok(dates)
    }
}
