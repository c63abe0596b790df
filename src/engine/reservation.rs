use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;

/// Exclusive driver claims, keyed by driver and holding the trip id.
#[derive(Default)]
pub struct Reservations {
    by_driver: DashMap<Uuid, Uuid>,
}

impl Reservations {
    /// Atomic check-and-set: fails if any trip already holds the driver.
    pub fn reserve(&self, driver_id: Uuid, trip_id: Uuid) -> Result<(), AppError> {
        match self.by_driver.entry(driver_id) {
            Entry::Occupied(_) => Err(AppError::CandidateNoLongerAvailable),
            Entry::Vacant(slot) => {
                slot.insert(trip_id);
                Ok(())
            }
        }
    }

    /// Releases the claim only if `trip_id` still holds it.
    pub fn release(&self, driver_id: Uuid, trip_id: Uuid) -> bool {
        self.by_driver
            .remove_if(&driver_id, |_, holder| *holder == trip_id)
            .is_some()
    }

    pub fn holder(&self, driver_id: &Uuid) -> Option<Uuid> {
        self.by_driver.get(driver_id).map(|entry| *entry.value())
    }

    pub fn is_reserved(&self, driver_id: &Uuid) -> bool {
        self.by_driver.contains_key(driver_id)
    }

    pub fn len(&self) -> usize {
        self.by_driver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_driver.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use uuid::Uuid;

    use super::Reservations;
    use crate::error::AppError;

    #[test]
    fn second_reservation_of_same_driver_fails() {
        let reservations = Reservations::default();
        let driver = Uuid::new_v4();

        reservations.reserve(driver, Uuid::new_v4()).unwrap();
        let result = reservations.reserve(driver, Uuid::new_v4());

        assert!(matches!(result, Err(AppError::CandidateNoLongerAvailable)));
    }

    #[test]
    fn release_requires_matching_trip() {
        let reservations = Reservations::default();
        let driver = Uuid::new_v4();
        let trip = Uuid::new_v4();
        reservations.reserve(driver, trip).unwrap();

        assert!(!reservations.release(driver, Uuid::new_v4()));
        assert_eq!(reservations.holder(&driver), Some(trip));

        assert!(reservations.release(driver, trip));
        assert!(!reservations.is_reserved(&driver));
    }

    #[test]
    fn concurrent_reservations_have_exactly_one_winner() {
        let reservations = Arc::new(Reservations::default());
        let driver = Uuid::new_v4();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let reservations = reservations.clone();
                thread::spawn(move || reservations.reserve(driver, Uuid::new_v4()).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(reservations.len(), 1);
    }
}
