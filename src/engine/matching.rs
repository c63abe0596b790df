use std::cmp::Ordering;

use serde::Serialize;

use crate::error::AppError;
use crate::geo::GeoIndex;
use crate::models::driver::DriverCandidate;
use crate::models::request::RideRequest;

#[derive(Debug, Clone, Serialize)]
pub struct MatchedCandidate {
    pub candidate: DriverCandidate,
    pub distance_km: f64,
}

/// Picks the single best driver for `request` from a fleet snapshot.
/// Pure: identical inputs always produce the same winner.
pub fn match_request(
    geo: &GeoIndex,
    request: &RideRequest,
    pool: &[DriverCandidate],
) -> Result<MatchedCandidate, AppError> {
    rank_candidates(geo, request, pool)
        .into_iter()
        .next()
        .ok_or(AppError::NoCandidateFound)
}

/// Eligible candidates ordered by distance, then rating (high first), then id.
pub fn rank_candidates(
    geo: &GeoIndex,
    request: &RideRequest,
    pool: &[DriverCandidate],
) -> Vec<MatchedCandidate> {
    let eligible: Vec<DriverCandidate> = pool
        .iter()
        .filter(|candidate| candidate.can_take_ride())
        .filter(|candidate| !request.declined_by.contains(&candidate.id))
        .filter(|candidate| {
            request
                .min_rating
                .is_none_or(|min_rating| candidate.rating >= min_rating)
        })
        .cloned()
        .collect();

    let mut ranked: Vec<MatchedCandidate> = geo
        .filter_within_radius(&request.origin, &eligible, request.max_distance_km)
        .into_iter()
        .map(|candidate| MatchedCandidate {
            distance_km: geo.distance(&request.origin, &candidate.location),
            candidate,
        })
        .collect();

    ranked.sort_by(compare_ranked);
    ranked
}

fn compare_ranked(a: &MatchedCandidate, b: &MatchedCandidate) -> Ordering {
    a.distance_km
        .total_cmp(&b.distance_km)
        .then_with(|| b.candidate.rating.total_cmp(&a.candidate.rating))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}
