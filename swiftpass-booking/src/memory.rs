use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use swiftpass_core::booking::{
    Booking, Customer, Payment, Settlement, SettlementIds, SettlementRequest,
};
use swiftpass_core::repository::{SettlementStore, TicketStore};
use swiftpass_core::ticket::{RedeemOutcome, ScanRecord, Ticket, TicketDetails};
use swiftpass_core::trip::{SeatReservation, Trip};
use swiftpass_core::{CoreError, CoreResult};
use uuid::Uuid;

/// In-memory store implementing both storage seams. Used by the test
/// suites and for running the API without Postgres.
///
/// One mutex guards all tables; each store call holds it for its whole
/// critical section, which gives the same all-or-nothing and
/// check-and-set guarantees the Postgres transactions provide.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    trips: HashMap<Uuid, Trip>,
    customers: HashMap<Uuid, Customer>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
    tickets: HashMap<Uuid, Ticket>,
    scans: Vec<ScanRecord>,
    by_reference: HashMap<String, SettlementIds>,
}

impl Inner {
    fn reserve(&mut self, trip_id: Uuid, seats: i32) -> CoreResult<SeatReservation> {
        let trip = self
            .trips
            .get_mut(&trip_id)
            .ok_or(CoreError::TripNotFound(trip_id))?;
        if trip.available_seats < seats {
            return Err(CoreError::InsufficientSeats {
                requested: seats,
                available: trip.available_seats,
            });
        }
        let previous = trip.available_seats;
        trip.available_seats -= seats;
        Ok(SeatReservation {
            previous_available: previous,
            new_available: trip.available_seats,
        })
    }

    fn details(&self, ticket: &Ticket) -> Option<TicketDetails> {
        let booking = self.bookings.get(&ticket.booking_id)?;
        let customer = self.customers.get(&booking.customer_id)?;
        let trip = self.trips.get(&booking.trip_id)?;
        Some(TicketDetails {
            ticket_id: ticket.id,
            booking_id: booking.id,
            state: ticket.state,
            checked_at: ticket.checked_at,
            issued_at: ticket.created_at,
            number_of_seats: booking.number_of_seats,
            firstname: customer.firstname.clone(),
            lastname: customer.lastname.clone(),
            contact: customer.contact.clone(),
            email: customer.email.clone(),
            trip_id: trip.id,
            departure_at: trip.departure_at,
            arrival_estimate: trip.arrival_estimate,
            bus_model: None,
            plates_number: None,
            route_departure: None,
            route_destination: None,
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn add_trip(&self, trip: Trip) {
        let mut inner = self.inner.lock().unwrap();
        inner.trips.insert(trip.id, trip);
    }

    /// Standalone reservation, same check-and-set as the settlement path.
    pub fn reserve(&self, trip_id: Uuid, seats: i32) -> CoreResult<SeatReservation> {
        let mut inner = self.inner.lock().unwrap();
        inner.reserve(trip_id, seats)
    }

    pub fn available_seats(&self, trip_id: Uuid) -> Option<i32> {
        let inner = self.inner.lock().unwrap();
        inner.trips.get(&trip_id).map(|t| t.available_seats)
    }

    pub fn ticket(&self, ticket_id: Uuid) -> Option<Ticket> {
        let inner = self.inner.lock().unwrap();
        inner.tickets.get(&ticket_id).cloned()
    }

    pub fn scan_count(&self, ticket_id: Uuid) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.scans.iter().filter(|s| s.ticket_id == ticket_id).count()
    }

    /// (customers, bookings, payments, tickets) row counts.
    pub fn record_counts(&self) -> (usize, usize, usize, usize) {
        let inner = self.inner.lock().unwrap();
        (
            inner.customers.len(),
            inner.bookings.len(),
            inner.payments.len(),
            inner.tickets.len(),
        )
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn find_by_reference(&self, reference: &str) -> CoreResult<Option<SettlementIds>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.by_reference.get(reference).copied())
    }

    async fn settle(&self, request: &SettlementRequest) -> CoreResult<Settlement> {
        let mut inner = self.inner.lock().unwrap();

        if inner.by_reference.contains_key(&request.transaction_ref) {
            return Err(CoreError::DuplicateReference(
                request.transaction_ref.clone(),
            ));
        }

        // Reservation first: exhausted inventory aborts before any insert.
        let reservation = inner.reserve(request.trip_id, request.number_of_seats)?;
        let now = Utc::now();

        let customer = Customer {
            id: Uuid::new_v4(),
            firstname: request.firstname.clone(),
            lastname: request.lastname.clone(),
            contact: request.contact.clone(),
            email: request.email.clone(),
            created_at: now,
        };
        let booking = Booking {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            trip_id: request.trip_id,
            number_of_seats: request.number_of_seats,
            booking_date: now,
        };
        let payment = Payment {
            id: Uuid::new_v4(),
            booking_id: booking.id,
            amount: request.amount,
            method: request.method.clone(),
            transaction_ref: request.transaction_ref.clone(),
            status: "completed".to_string(),
            time_paid: now,
            created_at: now,
        };
        let ticket = Ticket::issue(booking.id, now);

        let ids = SettlementIds {
            customer_id: customer.id,
            booking_id: booking.id,
            payment_id: payment.id,
            ticket_id: ticket.id,
        };

        inner.customers.insert(customer.id, customer);
        inner.bookings.insert(booking.id, booking);
        inner.payments.insert(payment.id, payment);
        inner.tickets.insert(ticket.id, ticket);
        inner
            .by_reference
            .insert(request.transaction_ref.clone(), ids);

        Ok(Settlement { ids, reservation })
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn redeem(&self, ticket_id: Uuid, scanner_info: &str) -> CoreResult<RedeemOutcome> {
        let mut inner = self.inner.lock().unwrap();

        let now = Utc::now();
        let (redeemed, scanned_at) = match inner.tickets.get_mut(&ticket_id) {
            None => return Ok(RedeemOutcome::NotFound),
            Some(ticket) => {
                if ticket.redeem(now) {
                    (true, now)
                } else {
                    (false, ticket.checked_at.unwrap_or(now))
                }
            }
        };

        if !redeemed {
            return Ok(RedeemOutcome::AlreadyUsed { scanned_at });
        }

        let scan = ScanRecord {
            id: Uuid::new_v4(),
            ticket_id,
            scanned_at: now,
            scanner_info: scanner_info.to_string(),
        };
        let scan_id = scan.id;
        inner.scans.push(scan);

        let ticket = inner.tickets.get(&ticket_id).cloned().ok_or_else(|| {
            CoreError::Store("scanned ticket disappeared".to_string())
        })?;
        let details = inner
            .details(&ticket)
            .ok_or_else(|| CoreError::Store("ticket booking chain is incomplete".to_string()))?;

        Ok(RedeemOutcome::Redeemed {
            ticket: details,
            scan_id,
        })
    }

    async fn ticket_details(&self, ticket_id: Uuid) -> CoreResult<Option<TicketDetails>> {
        let inner = self.inner.lock().unwrap();
        let Some(ticket) = inner.tickets.get(&ticket_id) else {
            return Ok(None);
        };
        inner
            .details(ticket)
            .map(Some)
            .ok_or_else(|| CoreError::Store("ticket booking chain is incomplete".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(seats: i32) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            departure_at: Utc::now(),
            arrival_estimate: None,
            available_seats: seats,
        }
    }

    #[test]
    fn reserve_accounts_exactly() {
        let store = MemoryStore::new();
        let t = trip(12);
        let trip_id = t.id;
        store.add_trip(t);

        let first = store.reserve(trip_id, 5).unwrap();
        assert_eq!(first.previous_available, 12);
        assert_eq!(first.new_available, 7);

        let second = store.reserve(trip_id, 7).unwrap();
        assert_eq!(second.new_available, 0);

        let err = store.reserve(trip_id, 1).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientSeats {
                requested: 1,
                available: 0
            }
        ));
        assert_eq!(store.available_seats(trip_id), Some(0));
    }

    #[test]
    fn failed_reserve_leaves_count_unchanged() {
        let store = MemoryStore::new();
        let t = trip(4);
        let trip_id = t.id;
        store.add_trip(t);

        assert!(store.reserve(trip_id, 5).is_err());
        assert_eq!(store.available_seats(trip_id), Some(4));
        assert!(store.reserve(Uuid::new_v4(), 1).is_err());
    }
}
