use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::domain::booking::{Booking, BookingDraft, BookingId, BookingStatus, Slot};
use crate::domain::vehicle::VehicleId;
use crate::errors::ReserveError;

/// Time source for window checks and booking identifiers. Injected so ledger
/// tests are deterministic.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Rolling booking-window policy. The horizon counts forward from "today";
/// retroactive bookings are always rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingPolicy {
    pub horizon_days: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self { horizon_days: 30 }
    }
}

/// Outcome of a slot availability check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotCheck {
    Free,
    Taken,
    InPast,
    BeyondHorizon,
}

impl SlotCheck {
    pub fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

/// Single source of truth for reserved slots. The only mutable shared state in
/// the core; `reserve` is the sole mutation path and runs as one critical
/// section so a check can never interleave with another session's write for
/// the same slot. All methods are synchronous, so the lock is never held
/// across a suspension point.
pub struct AvailabilityLedger {
    policy: BookingPolicy,
    clock: Box<dyn Clock>,
    inner: Mutex<LedgerInner>,
}

#[derive(Default)]
struct LedgerInner {
    bookings: Vec<Booking>,
    occupied: HashSet<(VehicleId, NaiveDate, NaiveTime)>,
    last_id_millis: i64,
    same_tick_sequence: u32,
}

impl AvailabilityLedger {
    pub fn new(policy: BookingPolicy) -> Self {
        Self::with_clock(policy, Box::new(SystemClock))
    }

    pub fn with_clock(policy: BookingPolicy, clock: Box<dyn Clock>) -> Self {
        Self { policy, clock, inner: Mutex::new(LedgerInner::default()) }
    }

    pub fn policy(&self) -> BookingPolicy {
        self.policy
    }

    /// Checks one slot against the window policy and the booked set. Pure
    /// read: repeated calls without an intervening `reserve` always agree.
    pub fn check(&self, slot: &Slot) -> SlotCheck {
        let inner = self.inner.lock().expect("ledger lock poisoned");
        self.check_locked(&inner, slot)
    }

    pub fn is_free(&self, slot: &Slot) -> bool {
        self.check(slot).is_free()
    }

    /// Atomically re-checks the slot and, if free, creates and stores the
    /// booking. Either fully commits or fails without observable effect.
    pub fn reserve(&self, slot: Slot, draft: BookingDraft) -> Result<Booking, ReserveError> {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");

        match self.check_locked(&inner, &slot) {
            SlotCheck::Free => {}
            SlotCheck::Taken => return Err(ReserveError::SlotTaken(slot)),
            SlotCheck::InPast => {
                return Err(ReserveError::SlotOutOfWindow {
                    slot,
                    reason: "the requested date is in the past".to_string(),
                })
            }
            SlotCheck::BeyondHorizon => {
                return Err(ReserveError::SlotOutOfWindow {
                    slot,
                    reason: format!(
                        "bookings are only accepted up to {} days ahead",
                        self.policy.horizon_days
                    ),
                })
            }
        }

        let created_at = self.clock.now();
        let id = next_booking_id(&mut inner, created_at);

        let booking = Booking {
            id,
            customer_name: draft.customer_name,
            customer_phone: draft.customer_phone,
            customer_email: draft.customer_email,
            vehicle_id: slot.vehicle_id.clone(),
            vehicle_label: draft.vehicle_label,
            date: slot.date,
            time: slot.time,
            duration_minutes: draft.duration_minutes,
            status: BookingStatus::Confirmed,
            created_at,
        };

        inner.occupied.insert((slot.vehicle_id, slot.date, slot.time));
        inner.bookings.push(booking.clone());

        Ok(booking)
    }

    /// All bookings in creation order.
    pub fn bookings(&self) -> Vec<Booking> {
        self.inner.lock().expect("ledger lock poisoned").bookings.clone()
    }

    pub fn booking(&self, id: &BookingId) -> Option<Booking> {
        self.inner
            .lock()
            .expect("ledger lock poisoned")
            .bookings
            .iter()
            .find(|booking| &booking.id == id)
            .cloned()
    }

    fn check_locked(&self, inner: &LedgerInner, slot: &Slot) -> SlotCheck {
        let today = self.clock.today();
        if slot.date < today {
            return SlotCheck::InPast;
        }
        if slot.date > today + Duration::days(i64::from(self.policy.horizon_days)) {
            return SlotCheck::BeyondHorizon;
        }
        if inner.occupied.contains(&(slot.vehicle_id.clone(), slot.date, slot.time)) {
            return SlotCheck::Taken;
        }
        SlotCheck::Free
    }
}

/// `TD-` plus the millisecond timestamp; two reservations landing in the same
/// tick get a sequence suffix so identifiers stay unique for the ledger's
/// lifetime.
fn next_booking_id(inner: &mut LedgerInner, created_at: DateTime<Utc>) -> BookingId {
    let millis = created_at.timestamp_millis();
    if millis == inner.last_id_millis {
        inner.same_tick_sequence += 1;
        BookingId(format!("TD-{millis}-{}", inner.same_tick_sequence))
    } else {
        inner.last_id_millis = millis;
        inner.same_tick_sequence = 0;
        BookingId(format!("TD-{millis}"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

    use crate::domain::booking::{BookingDraft, BookingStatus, Slot};
    use crate::domain::vehicle::VehicleId;
    use crate::errors::ReserveError;

    use super::{AvailabilityLedger, BookingPolicy, Clock, SlotCheck};

    struct FixedClock {
        today: NaiveDate,
        now: DateTime<Utc>,
    }

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            self.today
        }

        fn now(&self) -> DateTime<Utc> {
            self.now
        }
    }

    fn ledger() -> AvailabilityLedger {
        let today = NaiveDate::from_ymd_opt(2030, 6, 1).expect("valid date");
        let now = today.and_hms_opt(8, 0, 0).expect("valid time").and_utc();
        AvailabilityLedger::with_clock(BookingPolicy::default(), Box::new(FixedClock { today, now }))
    }

    fn slot(date: (i32, u32, u32)) -> Slot {
        Slot {
            vehicle_id: VehicleId("sedan_001".to_string()),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("valid date"),
            time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
        }
    }

    fn draft(name: &str) -> BookingDraft {
        BookingDraft {
            customer_name: name.to_string(),
            customer_phone: "555-0100".to_string(),
            customer_email: None,
            vehicle_label: "Aurora Elegance (2024)".to_string(),
            duration_minutes: 45,
        }
    }

    #[test]
    fn past_dates_are_never_free() {
        let ledger = ledger();
        assert_eq!(ledger.check(&slot((2030, 5, 31))), SlotCheck::InPast);
        assert!(!ledger.is_free(&slot((2029, 12, 25))));
    }

    #[test]
    fn dates_beyond_the_horizon_are_never_free() {
        let ledger = ledger();
        // 2030-07-01 is exactly 30 days out, the last acceptable date.
        assert_eq!(ledger.check(&slot((2030, 7, 1))), SlotCheck::Free);
        assert_eq!(ledger.check(&slot((2030, 7, 2))), SlotCheck::BeyondHorizon);
    }

    #[test]
    fn horizon_is_policy_not_hard_coded() {
        let today = NaiveDate::from_ymd_opt(2030, 6, 1).expect("valid date");
        let now = today.and_hms_opt(8, 0, 0).expect("valid time").and_utc();
        let ledger = AvailabilityLedger::with_clock(
            BookingPolicy { horizon_days: 7 },
            Box::new(FixedClock { today, now }),
        );

        assert_eq!(ledger.check(&slot((2030, 6, 8))), SlotCheck::Free);
        assert_eq!(ledger.check(&slot((2030, 6, 9))), SlotCheck::BeyondHorizon);
    }

    #[test]
    fn check_is_idempotent_without_intervening_reserve() {
        let ledger = ledger();
        let probe = slot((2030, 6, 15));
        let first = ledger.check(&probe);
        for _ in 0..10 {
            assert_eq!(ledger.check(&probe), first);
        }
    }

    #[test]
    fn reserve_commits_a_confirmed_booking() {
        let ledger = ledger();
        let booking =
            ledger.reserve(slot((2030, 6, 15)), draft("Alice")).expect("free slot should book");

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert!(booking.id.0.starts_with("TD-"));
        assert_eq!(ledger.booking(&booking.id).expect("stored").id, booking.id);
        assert!(!ledger.is_free(&slot((2030, 6, 15))));
    }

    #[test]
    fn second_reserve_for_the_same_slot_is_rejected() {
        let ledger = ledger();
        ledger.reserve(slot((2030, 6, 15)), draft("Alice")).expect("first booking");

        let error = ledger
            .reserve(slot((2030, 6, 15)), draft("Bob"))
            .expect_err("double booking must fail");
        assert!(matches!(error, ReserveError::SlotTaken(_)));
        assert_eq!(ledger.bookings().len(), 1);
    }

    #[test]
    fn same_vehicle_different_time_is_still_free() {
        let ledger = ledger();
        ledger.reserve(slot((2030, 6, 15)), draft("Alice")).expect("first booking");

        let mut other = slot((2030, 6, 15));
        other.time = NaiveTime::from_hms_opt(14, 0, 0).expect("valid time");
        assert!(ledger.is_free(&other));
    }

    #[test]
    fn out_of_window_reserve_fails_without_side_effects() {
        let ledger = ledger();
        let error = ledger
            .reserve(slot((2030, 5, 1)), draft("Alice"))
            .expect_err("past date must be rejected");
        assert!(matches!(error, ReserveError::SlotOutOfWindow { .. }));
        assert!(ledger.bookings().is_empty());
    }

    #[test]
    fn booking_ids_are_unique_within_one_timestamp_tick() {
        let ledger = ledger();
        let mut ids = HashSet::new();

        // The fixed clock pins every reservation to the same millisecond.
        for day in 2..12 {
            let booking = ledger.reserve(slot((2030, 6, day)), draft("Alice")).expect("free slot");
            assert!(ids.insert(booking.id.0.clone()), "duplicate id {}", booking.id);
        }
    }

    #[test]
    fn concurrent_reserves_for_one_slot_yield_exactly_one_success() {
        let ledger = Arc::new(ledger());
        let contended = slot((2030, 6, 20));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let ledger = Arc::clone(&ledger);
                let target = contended.clone();
                std::thread::spawn(move || {
                    ledger.reserve(target, draft(&format!("customer-{worker}")))
                })
            })
            .collect();

        let results: Vec<_> =
            handles.into_iter().map(|handle| handle.join().expect("worker panicked")).collect();

        let successes = results.iter().filter(|result| result.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|result| matches!(result, Err(ReserveError::SlotTaken(_))))
            .count();

        assert_eq!(successes, 1, "exactly one worker should win the slot");
        assert_eq!(conflicts, 7, "every other worker should observe SlotTaken");
        assert_eq!(ledger.bookings().len(), 1);
    }

    #[test]
    fn bookings_are_listed_in_creation_order() {
        let ledger = ledger();
        let first = ledger.reserve(slot((2030, 6, 10)), draft("Alice")).expect("booking");
        let second = ledger.reserve(slot((2030, 6, 11)), draft("Bob")).expect("booking");

        let listed: Vec<_> = ledger.bookings().into_iter().map(|booking| booking.id).collect();
        assert_eq!(listed, vec![first.id, second.id]);
    }

    #[test]
    fn system_clock_dates_far_in_the_future_are_beyond_horizon() {
        let ledger = AvailabilityLedger::new(BookingPolicy::default());
        let far = Slot {
            vehicle_id: VehicleId("sedan_001".to_string()),
            date: Utc::now().date_naive() + Duration::days(365),
            time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
        };
        assert_eq!(ledger.check(&far), SlotCheck::BeyondHorizon);
    }
}
