//! Occupancy tracking across the staff, batch and room namespaces.
//!
//! Each key keeps, per day, a start-sorted list of non-overlapping
//! reservations. Reservations are stored exactly as made (never merged) so a
//! single one can be released again during repair.

use chrono::Weekday;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::interval::Interval;
use crate::models::{day_index, CANONICAL_DAYS};

/// One of the three independent occupancy namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Staff,
    Batch,
    Room,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Staff => write!(f, "staff"),
            Namespace::Batch => write!(f, "batch"),
            Namespace::Room => write!(f, "room"),
        }
    }
}

/// Identifies whose time is being reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OccupancyKey<'a> {
    Staff(&'a str),
    Batch(&'a str),
    Room(&'a str),
}

impl<'a> OccupancyKey<'a> {
    pub fn namespace(&self) -> Namespace {
        match self {
            OccupancyKey::Staff(_) => Namespace::Staff,
            OccupancyKey::Batch(_) => Namespace::Batch,
            OccupancyKey::Room(_) => Namespace::Room,
        }
    }

    pub fn id(&self) -> &'a str {
        match self {
            OccupancyKey::Staff(id) | OccupancyKey::Batch(id) | OccupancyKey::Room(id) => id,
        }
    }
}

/// A requested interval collides with an existing reservation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{namespace} {id} is already booked on {day} from {existing_start} to {existing_end}")]
pub struct Overlap {
    pub namespace: Namespace,
    pub id: String,
    pub day: Weekday,
    pub existing_start: chrono::NaiveTime,
    pub existing_end: chrono::NaiveTime,
}

impl Overlap {
    fn new(key: OccupancyKey<'_>, day: Weekday, existing: Interval) -> Self {
        Self {
            namespace: key.namespace(),
            id: key.id().to_string(),
            day,
            existing_start: existing.start_time(),
            existing_end: existing.end_time(),
        }
    }
}

/// Reservations for one key, one list per day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct WeekSchedule {
    days: [Vec<Interval>; 7],
}

impl WeekSchedule {
    /// First reservation on `day` overlapping `interval`.
    ///
    /// Uses binary search: reservations are disjoint and sorted by start, so
    /// their ends are sorted too.
    fn conflicting(&self, day: Weekday, interval: &Interval) -> Option<Interval> {
        let list = &self.days[day_index(day)];
        let idx = list.partition_point(|r| r.end <= interval.start);
        list.get(idx).copied().filter(|r| r.overlaps(interval))
    }

    fn insert(&mut self, day: Weekday, interval: Interval) -> Result<(), Interval> {
        if let Some(existing) = self.conflicting(day, &interval) {
            return Err(existing);
        }
        let list = &mut self.days[day_index(day)];
        let idx = list.partition_point(|r| r.start < interval.start);
        list.insert(idx, interval);
        Ok(())
    }

    fn remove(&mut self, day: Weekday, interval: &Interval) -> bool {
        let list = &mut self.days[day_index(day)];
        match list.binary_search(interval) {
            Ok(idx) => {
                list.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    fn len(&self) -> usize {
        self.days.iter().map(Vec::len).sum()
    }
}

/// All keys of one namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceTable {
    entries: FxHashMap<String, WeekSchedule>,
}

impl NamespaceTable {
    fn get(&self, id: &str) -> Option<&WeekSchedule> {
        self.entries.get(id)
    }

    fn get_mut(&mut self, id: &str) -> &mut WeekSchedule {
        self.entries.entry(id.to_string()).or_default()
    }

    /// Reserve `interval` for staff member `id` in a ledger table.
    pub fn insert(&mut self, id: &str, day: Weekday, interval: Interval) -> Result<(), Overlap> {
        self.get_mut(id)
            .insert(day, interval)
            .map_err(|existing| Overlap::new(OccupancyKey::Staff(id), day, existing))
    }

    pub fn reservation_count(&self) -> usize {
        self.entries.values().map(WeekSchedule::len).sum()
    }

    /// Whether exactly this reservation is already present.
    pub fn contains(&self, id: &str, day: Weekday, interval: &Interval) -> bool {
        self.get(id)
            .map(|w| w.days[day_index(day)].binary_search(interval).is_ok())
            .unwrap_or(false)
    }
}

/// The keys a single slot occupies. The room is optional.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reservation<'a> {
    pub staff: &'a str,
    pub batch: &'a str,
    pub room: Option<&'a str>,
}

impl<'a> Reservation<'a> {
    pub fn keys(&self) -> impl Iterator<Item = OccupancyKey<'a>> {
        [
            Some(OccupancyKey::Staff(self.staff)),
            Some(OccupancyKey::Batch(self.batch)),
            self.room.map(OccupancyKey::Room),
        ]
        .into_iter()
        .flatten()
    }
}

/// Reserved time for every staff member, batch and room in one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Occupancy {
    staff: NamespaceTable,
    batch: NamespaceTable,
    room: NamespaceTable,
}

impl Occupancy {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, namespace: Namespace) -> &NamespaceTable {
        match namespace {
            Namespace::Staff => &self.staff,
            Namespace::Batch => &self.batch,
            Namespace::Room => &self.room,
        }
    }

    fn table_mut(&mut self, namespace: Namespace) -> &mut NamespaceTable {
        match namespace {
            Namespace::Staff => &mut self.staff,
            Namespace::Batch => &mut self.batch,
            Namespace::Room => &mut self.room,
        }
    }

    pub fn is_free(&self, key: OccupancyKey<'_>, day: Weekday, interval: Interval) -> bool {
        self.table(key.namespace())
            .get(key.id())
            .map(|w| w.conflicting(day, &interval).is_none())
            .unwrap_or(true)
    }

    /// Reserve `interval` for a single key.
    pub fn reserve(
        &mut self,
        key: OccupancyKey<'_>,
        day: Weekday,
        interval: Interval,
    ) -> Result<(), Overlap> {
        self.table_mut(key.namespace())
            .get_mut(key.id())
            .insert(day, interval)
            .map_err(|existing| Overlap::new(key, day, existing))
    }

    /// Release an exact earlier reservation. Returns false if it was not held.
    pub fn release(&mut self, key: OccupancyKey<'_>, day: Weekday, interval: Interval) -> bool {
        let table = self.table_mut(key.namespace());
        let Some(week) = table.entries.get_mut(key.id()) else {
            return false;
        };
        let removed = week.remove(day, &interval);
        if week.len() == 0 {
            table.entries.remove(key.id());
        }
        removed
    }

    /// Reserve the interval for every key of `reservation`, or for none of them.
    pub fn reserve_all(
        &mut self,
        reservation: &Reservation<'_>,
        day: Weekday,
        interval: Interval,
    ) -> Result<(), Overlap> {
        for key in reservation.keys() {
            if let Some(existing) = self
                .table(key.namespace())
                .get(key.id())
                .and_then(|w| w.conflicting(day, &interval))
            {
                return Err(Overlap::new(key, day, existing));
            }
        }
        for key in reservation.keys() {
            self.reserve(key, day, interval)?;
        }
        Ok(())
    }

    pub fn release_all(&mut self, reservation: &Reservation<'_>, day: Weekday, interval: Interval) {
        for key in reservation.keys() {
            self.release(key, day, interval);
        }
    }

    /// Reservations held by `key` on `day`, sorted by start.
    pub fn reservations(&self, key: OccupancyKey<'_>, day: Weekday) -> &[Interval] {
        self.table(key.namespace())
            .get(key.id())
            .map(|w| w.days[day_index(day)].as_slice())
            .unwrap_or(&[])
    }

    pub fn reservation_count(&self) -> usize {
        self.staff.reservation_count()
            + self.batch.reservation_count()
            + self.room.reservation_count()
    }

    /// Add every staff reservation from `table`.
    ///
    /// Reservations already held exactly are skipped, so a slot seeded from
    /// the snapshot and recorded in the ledger by an earlier run counts once.
    pub fn merge_staff(&mut self, table: &NamespaceTable) -> Result<(), Overlap> {
        for (id, week) in &table.entries {
            for (day, list) in CANONICAL_DAYS.iter().zip(week.days.iter()) {
                for interval in list {
                    if self.staff.contains(id, *day, interval) {
                        continue;
                    }
                    self.reserve(OccupancyKey::Staff(id), *day, *interval)?;
                }
            }
        }
        Ok(())
    }
}

/// Staff reservations written back by completed runs, grouped by the batch
/// whose timetable made them.
#[derive(Clone, Debug, Default)]
pub struct StaffLedger {
    batches: FxHashMap<String, NamespaceTable>,
}

impl StaffLedger {
    /// Tables of every batch not in `skip`.
    pub fn tables_except<'a>(
        &'a self,
        skip: &'a FxHashSet<&'a str>,
    ) -> impl Iterator<Item = &'a NamespaceTable> + 'a {
        self.batches
            .iter()
            .filter(move |(batch_id, _)| !skip.contains(batch_id.as_str()))
            .map(|(_, table)| table)
    }

    /// Replace everything recorded for `batch_id`. An empty table drops the batch.
    pub fn replace_batch(&mut self, batch_id: &str, table: NamespaceTable) {
        if table.reservation_count() == 0 {
            self.batches.remove(batch_id);
        } else {
            self.batches.insert(batch_id.to_string(), table);
        }
    }

    /// Forget every reservation recorded for `batch_id`. Returns how many there were.
    pub fn release_batch(&mut self, batch_id: &str) -> usize {
        self.batches
            .remove(batch_id)
            .map(|table| table.reservation_count())
            .unwrap_or(0)
    }

    pub fn reservation_count(&self) -> usize {
        self.batches.values().map(NamespaceTable::reservation_count).sum()
    }

    pub fn is_free(&self, staff_id: &str, day: Weekday, interval: Interval) -> bool {
        self.batches.values().all(|table| {
            table
                .get(staff_id)
                .map(|w| w.conflicting(day, &interval).is_none())
                .unwrap_or(true)
        })
    }
}

/// Staff occupancy shared by concurrent runs whose staff overlap.
///
/// A run holds the lock from seeding until it writes its reservations back,
/// so only one run at a time may book any shared staff member. A run replaces
/// the entries of every batch in its snapshot.
#[derive(Clone, Debug, Default)]
pub struct SharedStaffOccupancy {
    inner: Arc<Mutex<StaffLedger>>,
}

impl SharedStaffOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take exclusive run-level access.
    pub fn lock(&self) -> MutexGuard<'_, StaffLedger> {
        // A poisoned ledger still holds consistent data: writes happen only
        // after a run completes.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop a batch's reservations, for example after its timetable was discarded.
    pub fn release_batch(&self, batch_id: &str) -> usize {
        self.lock().release_batch(batch_id)
    }

    pub fn reservation_count(&self) -> usize {
        self.lock().reservation_count()
    }

    pub fn is_free(&self, staff_id: &str, day: Weekday, interval: Interval) -> bool {
        self.lock().is_free(staff_id, day, interval)
    }
}
