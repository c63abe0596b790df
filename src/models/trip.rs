use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::coordinate::Coordinate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripState {
    PendingAssignment,
    Assigned,
    EnRoute,
    Arrived,
    ChildPickedUp,
    ChildDropped,
    Completed,
    Cancelled,
    Declined,
}

impl TripState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TripState::Completed | TripState::Cancelled | TripState::Declined
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TripState::PendingAssignment => "PENDING_ASSIGNMENT",
            TripState::Assigned => "ASSIGNED",
            TripState::EnRoute => "EN_ROUTE",
            TripState::Arrived => "ARRIVED",
            TripState::ChildPickedUp => "CHILD_PICKED_UP",
            TripState::ChildDropped => "CHILD_DROPPED",
            TripState::Completed => "COMPLETED",
            TripState::Cancelled => "CANCELLED",
            TripState::Declined => "DECLINED",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckpointLabel {
    EnRoute,
    Arrived,
    ChildPickedUp,
    ChildDropped,
    Completed,
}

impl CheckpointLabel {
    pub const ORDER: [CheckpointLabel; 5] = [
        CheckpointLabel::EnRoute,
        CheckpointLabel::Arrived,
        CheckpointLabel::ChildPickedUp,
        CheckpointLabel::ChildDropped,
        CheckpointLabel::Completed,
    ];

    pub fn target_state(self) -> TripState {
        match self {
            CheckpointLabel::EnRoute => TripState::EnRoute,
            CheckpointLabel::Arrived => TripState::Arrived,
            CheckpointLabel::ChildPickedUp => TripState::ChildPickedUp,
            CheckpointLabel::ChildDropped => TripState::ChildDropped,
            CheckpointLabel::Completed => TripState::Completed,
        }
    }

    /// The only state from which this label may be recorded.
    pub fn required_state(self) -> TripState {
        match self {
            CheckpointLabel::EnRoute => TripState::Assigned,
            CheckpointLabel::Arrived => TripState::EnRoute,
            CheckpointLabel::ChildPickedUp => TripState::Arrived,
            CheckpointLabel::ChildDropped => TripState::ChildPickedUp,
            CheckpointLabel::Completed => TripState::ChildDropped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub label: CheckpointLabel,
    pub timestamp: DateTime<Utc>,
    pub location: Option<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub request_id: Uuid,
    pub requester_id: Uuid,
    pub driver_id: Uuid,
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub state: TripState,
    pub checkpoints: Vec<Checkpoint>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckpointOutcome {
    Recorded(Checkpoint),
    /// The label was already the current one; nothing changed.
    Unchanged(Checkpoint),
}

impl CheckpointOutcome {
    pub fn checkpoint(&self) -> &Checkpoint {
        match self {
            CheckpointOutcome::Recorded(checkpoint) | CheckpointOutcome::Unchanged(checkpoint) => {
                checkpoint
            }
        }
    }
}

impl Trip {
    /// Where the driver is heading next: the pickup until the child is on
    /// board, then the destination. None once nothing is left to reach.
    pub fn next_target(&self) -> Option<Coordinate> {
        match self.state {
            TripState::Assigned | TripState::EnRoute => Some(self.origin),
            TripState::ChildPickedUp => Some(self.destination),
            _ => None,
        }
    }

    pub fn apply_checkpoint(
        &mut self,
        label: CheckpointLabel,
        timestamp: DateTime<Utc>,
        location: Option<Coordinate>,
    ) -> Result<CheckpointOutcome, AppError> {
        if matches!(self.state, TripState::Cancelled | TripState::Declined) {
            return Err(AppError::InvalidTransition(format!(
                "trip {} is {}; no checkpoints accepted",
                self.id,
                self.state.as_str()
            )));
        }

        if label.target_state() == self.state {
            if let Some(existing) = self.checkpoints.iter().rev().find(|c| c.label == label) {
                return Ok(CheckpointOutcome::Unchanged(existing.clone()));
            }
        }

        if label.required_state() != self.state {
            return Err(AppError::InvalidTransition(format!(
                "cannot record {:?} while trip {} is {}",
                label,
                self.id,
                self.state.as_str()
            )));
        }

        if let Some(last) = self.checkpoints.last() {
            if timestamp < last.timestamp {
                return Err(AppError::InvalidTransition(format!(
                    "{:?} at {} predates previous checkpoint {:?} at {}",
                    label, timestamp, last.label, last.timestamp
                )));
            }
        }

        let checkpoint = Checkpoint {
            label,
            timestamp,
            location,
        };

        self.checkpoints.push(checkpoint.clone());
        self.state = label.target_state();
        self.updated_at = Utc::now();
        if self.state == TripState::Completed {
            self.completed_at = Some(timestamp);
        }

        Ok(CheckpointOutcome::Recorded(checkpoint))
    }

    pub fn decline(&mut self) -> Result<(), AppError> {
        if self.state != TripState::Assigned {
            return Err(AppError::InvalidTransition(format!(
                "trip {} can only be declined while ASSIGNED, current state {}",
                self.id,
                self.state.as_str()
            )));
        }

        self.state = TripState::Declined;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        if self.state.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "trip {} is already {}",
                self.id,
                self.state.as_str()
            )));
        }

        let now = Utc::now();
        self.state = TripState::Cancelled;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
