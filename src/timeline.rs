// src/timeline.rs

use crate::error::{MineError, Result};
use crate::model::{ChangeId, ChangeMap, Day, DayIndex};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// The distinct, ascending sequence of days under consideration.
///
/// Its length is the denominator for relative support, and positions on it
/// are the unit in which lags are measured.
#[derive(Debug, Clone)]
pub struct Timeline {
    days: Vec<Day>,
    positions: HashMap<Day, DayIndex>,
}

impl Timeline {
    pub fn new(days: Vec<Day>) -> Result<Self> {
        if let Some(pair) = days.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(MineError::MalformedTimeline(format!(
                "days must be strictly ascending, found '{}' before '{}'",
                pair[0], pair[1]
            )));
        }
        let positions = days
            .iter()
            .enumerate()
            .map(|(i, day)| (day.clone(), i))
            .collect();
        Ok(Self { days, positions })
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    pub fn position(&self, day: &str) -> Option<DayIndex> {
        self.positions.get(day).copied()
    }

    /// Absolute occurrence-count bounds for the given relative support range.
    pub fn support_bounds(&self, min_support: f64, max_support: f64) -> SupportBounds {
        let n = self.days.len() as f64;
        SupportBounds {
            min_count: (min_support * n).ceil() as usize,
            max_count: (max_support * n).floor() as usize,
        }
    }

    /// Maps a change's occurrence list onto timeline positions, rejecting
    /// unsorted lists, duplicates and days the timeline does not know.
    pub fn resolve(&self, change: &str, occurrences: &[Day]) -> Result<Vec<DayIndex>> {
        let mut resolved = Vec::with_capacity(occurrences.len());
        for day in occurrences {
            let position = self.position(day).ok_or_else(|| {
                MineError::malformed(change, format!("day '{day}' is not on the timeline"))
            })?;
            if let Some(&previous) = resolved.last() {
                if position <= previous {
                    return Err(MineError::malformed(
                        change,
                        format!(
                            "occurrences must be strictly ascending, found '{}' after '{}'",
                            day, self.days[previous]
                        ),
                    ));
                }
            }
            resolved.push(position);
        }
        Ok(resolved)
    }

    /// Checks every occurrence list in `changes` against this timeline.
    pub fn validate(&self, changes: &ChangeMap) -> Result<()> {
        for (change, occurrences) in changes {
            self.resolve(change, occurrences)?;
        }
        Ok(())
    }
}

/// Inclusive range of occurrence counts a change needs to take part in mining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportBounds {
    pub min_count: usize,
    pub max_count: usize,
}

impl SupportBounds {
    pub fn admits(&self, occurrences: usize) -> bool {
        occurrences > 0 && occurrences >= self.min_count && occurrences <= self.max_count
    }
}

/// Drops every change whose occurrence count falls outside `bounds`.
/// Returns the surviving changes and the number dropped.
pub fn filter_by_support(changes: ChangeMap, bounds: &SupportBounds) -> (ChangeMap, usize) {
    let before = changes.len();
    let kept: ChangeMap = changes
        .into_iter()
        .filter(|(_, occurrences)| bounds.admits(occurrences.len()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// A set of changes resolved against the global timeline, together with the
/// day -> changes index the sweep walks.
///
/// Changes are addressed by their position in `ids`, which follows the
/// `ChangeMap`'s key order.
#[derive(Debug, Clone)]
pub struct ChangePool {
    ids: Vec<ChangeId>,
    occurrences: Vec<Vec<DayIndex>>,
    daily: DailyActiveSet,
}

impl ChangePool {
    pub fn build(changes: &ChangeMap, timeline: &Timeline) -> Result<Self> {
        let mut ids = Vec::with_capacity(changes.len());
        let mut occurrences = Vec::with_capacity(changes.len());
        let mut daily = DailyActiveSet::new(timeline.len());

        for (local, (change, days)) in changes.iter().enumerate() {
            let resolved = timeline.resolve(change, days)?;
            for &day in &resolved {
                daily.insert(day, local as u32);
            }
            ids.push(change.clone());
            occurrences.push(resolved);
        }

        Ok(Self {
            ids,
            occurrences,
            daily,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn num_days(&self) -> usize {
        self.daily.num_days()
    }

    pub fn id(&self, local: u32) -> &ChangeId {
        &self.ids[local as usize]
    }

    /// Local index of `change`, if it belongs to this pool.
    pub fn find(&self, change: &str) -> Option<u32> {
        self.ids
            .binary_search_by(|id| id.as_str().cmp(change))
            .ok()
            .map(|i| i as u32)
    }

    pub fn occurrences(&self, local: u32) -> &[DayIndex] {
        &self.occurrences[local as usize]
    }

    pub fn active_on(&self, day: DayIndex) -> &[u32] {
        self.daily.on(day)
    }
}

/// Day -> changes occurring that day, for one pool of changes.
#[derive(Debug, Clone)]
pub struct DailyActiveSet {
    by_day: Vec<Vec<u32>>,
}

impl DailyActiveSet {
    fn new(num_days: usize) -> Self {
        Self {
            by_day: vec![Vec::new(); num_days],
        }
    }

    fn insert(&mut self, day: DayIndex, change: u32) {
        self.by_day[day].push(change);
    }

    pub fn num_days(&self) -> usize {
        self.by_day.len()
    }

    pub fn on(&self, day: DayIndex) -> &[u32] {
        &self.by_day[day]
    }
}

/// Collects the timeline from a directory of per-day change files.
///
/// Files are expected to be named after their day (`2016-01-31...`); names
/// whose first ten characters are not a calendar date are ignored.
pub fn days_from_change_dir(dir: &Path) -> Result<Vec<Day>> {
    let entries = std::fs::read_dir(dir).map_err(|e| MineError::io(dir, e))?;
    let mut days = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| MineError::io(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with("20") {
            continue;
        }
        let Some(prefix) = name.get(..10) else { continue };
        if NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok() {
            days.insert(prefix.to_string());
        }
    }
    Ok(days.into_iter().collect())
}
