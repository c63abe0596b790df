use crate::config::MatchingConfig;
use crate::error::AppError;
use crate::models::coordinate::Coordinate;
use crate::models::driver::DriverCandidate;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance in kilometres on a spherical Earth.
pub fn haversine_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    // Rounding can push this a hair above 1 for antipodal points.
    let haversine = (sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng).min(1.0);
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn filter_within_radius(
    origin: &Coordinate,
    candidates: &[DriverCandidate],
    radius_km: f64,
) -> Vec<DriverCandidate> {
    candidates
        .iter()
        .filter(|candidate| haversine_km(origin, &candidate.location) <= radius_km)
        .cloned()
        .collect()
}

/// Straight-line travel time. No traffic model.
pub fn estimate_eta_minutes(distance_km: f64, average_speed_kmh: f64) -> Result<f64, AppError> {
    if !average_speed_kmh.is_finite() || average_speed_kmh <= 0.0 {
        return Err(AppError::InvalidConfiguration(format!(
            "average speed must be > 0 km/h, got {average_speed_kmh}"
        )));
    }

    Ok(distance_km.max(0.0) / average_speed_kmh * 60.0)
}

/// Distance and ETA with the configured radius and speed baked in.
#[derive(Debug, Clone)]
pub struct GeoIndex {
    default_radius_km: f64,
    average_speed_kmh: f64,
}

impl GeoIndex {
    pub fn new(config: &MatchingConfig) -> Result<Self, AppError> {
        config.validate()?;

        Ok(Self {
            default_radius_km: config.search_radius_km,
            average_speed_kmh: config.average_speed_kmh,
        })
    }

    pub fn distance(&self, a: &Coordinate, b: &Coordinate) -> f64 {
        haversine_km(a, b)
    }

    pub fn filter_within_radius(
        &self,
        origin: &Coordinate,
        candidates: &[DriverCandidate],
        radius_km: Option<f64>,
    ) -> Vec<DriverCandidate> {
        filter_within_radius(
            origin,
            candidates,
            radius_km.unwrap_or(self.default_radius_km),
        )
    }

    pub fn eta_minutes(&self, from: &Coordinate, to: &Coordinate) -> Result<f64, AppError> {
        estimate_eta_minutes(haversine_km(from, to), self.average_speed_kmh)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{estimate_eta_minutes, filter_within_radius, haversine_km, GeoIndex};
    use crate::config::MatchingConfig;
    use crate::error::AppError;
    use crate::models::coordinate::Coordinate;
    use crate::models::driver::DriverCandidate;

    fn point(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    fn candidate_at(lat: f64, lng: f64) -> DriverCandidate {
        DriverCandidate {
            id: Uuid::new_v4(),
            name: "test-driver".to_string(),
            location: point(lat, lng),
            available: true,
            at_capacity: false,
            rating: 4.5,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = point(53.5511, 9.9937);
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = point(51.5074, -0.1278);
        let paris = point(48.8566, 2.3522);
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (point(0.416, 9.467), point(0.431, 9.482)),
            (point(-33.86, 151.21), point(40.71, -74.0)),
            (point(89.9, 0.0), point(-89.9, 179.9)),
        ];

        for (a, b) in pairs {
            assert!((haversine_km(&a, &b) - haversine_km(&b, &a)).abs() < 1e-9);
        }
    }

    #[test]
    fn triangle_inequality_holds() {
        let a = point(0.39, 9.45);
        let b = point(4.05, 9.7);
        let c = point(3.87, 11.52);

        assert!(haversine_km(&a, &c) <= haversine_km(&a, &b) + haversine_km(&b, &c) + 1e-9);
    }

    #[test]
    fn antipodal_points_do_not_produce_nan() {
        let distance = haversine_km(&point(0.0, 0.0), &point(0.0, 180.0));
        assert!(distance.is_finite());
        assert!((distance - std::f64::consts::PI * 6_371.0).abs() < 1e-6);
    }

    #[test]
    fn libreville_pickup_is_about_half_a_km() {
        let distance = haversine_km(&point(0.416, 9.467), &point(0.418, 9.471));
        assert!((distance - 0.5).abs() < 0.05);
    }

    #[test]
    fn filter_keeps_only_candidates_inside_radius() {
        let origin = point(0.416, 9.467);
        let near = candidate_at(0.418, 9.471);
        let far = candidate_at(0.9, 9.9);

        let kept = filter_within_radius(&origin, &[near.clone(), far], 10.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, near.id);
    }

    #[test]
    fn filter_returns_empty_when_nothing_matches() {
        let origin = point(0.416, 9.467);
        let kept = filter_within_radius(&origin, &[candidate_at(10.0, 10.0)], 10.0);
        assert!(kept.is_empty());
    }

    #[test]
    fn index_uses_default_radius_unless_overridden() {
        let index = GeoIndex::new(&MatchingConfig::default()).unwrap();
        let origin = point(0.0, 0.0);
        // Roughly 15.6 km away.
        let pool = [candidate_at(0.1, 0.1)];

        assert!(index.filter_within_radius(&origin, &pool, None).is_empty());
        assert_eq!(index.filter_within_radius(&origin, &pool, Some(20.0)).len(), 1);
    }

    #[test]
    fn eta_is_linear_in_distance() {
        assert!((estimate_eta_minutes(15.0, 30.0).unwrap() - 30.0).abs() < 1e-9);
        assert_eq!(estimate_eta_minutes(-1.0, 30.0).unwrap(), 0.0);
    }

    #[test]
    fn eta_rejects_non_positive_speed() {
        assert!(matches!(
            estimate_eta_minutes(5.0, 0.0),
            Err(AppError::InvalidConfiguration(_))
        ));
        assert!(estimate_eta_minutes(5.0, -10.0).is_err());
    }

    #[test]
    fn index_eta_uses_configured_speed() {
        let index = GeoIndex::new(&MatchingConfig {
            average_speed_kmh: 60.0,
            ..MatchingConfig::default()
        })
        .unwrap();
        let from = point(0.416, 9.467);
        let to = point(0.431, 9.482);

        let eta = index.eta_minutes(&from, &to).unwrap();

        assert!((eta - haversine_km(&from, &to)).abs() < 1e-9);
    }
}
