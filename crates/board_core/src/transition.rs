use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::{Sector, Task},
    error::ApiError,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{api::ApiClient, board::BoardState};

/// A drag awaiting human confirmation. Exists only between the drop and the
/// confirm/cancel decision; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransition {
    pub task: Task,
    pub to: Sector,
}

impl PendingTransition {
    pub fn from(&self) -> Sector {
        self.task.sector
    }

    /// Text shown in the confirmation prompt.
    pub fn describe(&self) -> String {
        format!(
            "Mover pedido {} de {} para {}?",
            self.task.order_number,
            self.from().label(),
            self.to.label()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// Dropped on the task's current sector, or no drag was in progress.
    /// Ignored by design, not an error.
    NoOp,
    /// A different sector: awaiting confirmation, board untouched.
    Pending(PendingTransition),
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("no transition awaiting confirmation")]
    NothingPending,
    #[error("a sector commit is already in progress")]
    CommitInProgress,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// What a successful commit reports back to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionReport {
    pub order_number: String,
    pub from: Sector,
    pub to: Sector,
    pub moved_at: DateTime<Utc>,
}

enum GestureState {
    Idle,
    Dragging { task: Task },
    Pending(PendingTransition),
    Committing(PendingTransition),
}

/// Mediates one drag gesture at a time into a confirmed, persisted sector
/// change: `Idle -> Dragging -> Pending -> Committing -> Idle`.
///
/// The board is never mutated before the remote accepts the move
/// (confirm-then-commit), so board and remote cannot diverge from this
/// controller's actions: on failure the board simply was never touched.
pub struct TransitionController {
    api: Arc<ApiClient>,
    state: GestureState,
}

impl TransitionController {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            state: GestureState::Idle,
        }
    }

    /// Captures the source task. A fresh drag supersedes a stale gesture or
    /// a dismissed confirmation; only an in-flight commit blocks it.
    pub fn drag_start(&mut self, task: &Task) -> Result<(), TransitionError> {
        if matches!(self.state, GestureState::Committing(_)) {
            return Err(TransitionError::CommitInProgress);
        }
        self.state = GestureState::Dragging { task: task.clone() };
        Ok(())
    }

    /// Release outside any drop target: the gesture ends with no side
    /// effects.
    pub fn drag_end(&mut self) {
        if matches!(self.state, GestureState::Dragging { .. }) {
            self.state = GestureState::Idle;
        }
    }

    /// Drop onto a sector column. Same sector (or no active drag) is a
    /// no-op; a different sector parks the move for confirmation without
    /// touching the board.
    pub fn drop_on(&mut self, target: Sector) -> DropOutcome {
        let GestureState::Dragging { task } =
            std::mem::replace(&mut self.state, GestureState::Idle)
        else {
            return DropOutcome::NoOp;
        };
        if task.sector == target {
            return DropOutcome::NoOp;
        }
        let pending = PendingTransition { task, to: target };
        self.state = GestureState::Pending(pending.clone());
        DropOutcome::Pending(pending)
    }

    pub fn pending(&self) -> Option<&PendingTransition> {
        match &self.state {
            GestureState::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn is_committing(&self) -> bool {
        matches!(self.state, GestureState::Committing(_))
    }

    /// User confirmed: persist the move, then mutate the board. While the
    /// commit is in flight re-confirmation is rejected, so a double submit
    /// cannot issue two requests.
    pub async fn confirm(
        &mut self,
        board: &mut BoardState,
    ) -> Result<TransitionReport, TransitionError> {
        let pending = match &self.state {
            GestureState::Pending(pending) => pending.clone(),
            GestureState::Committing(_) => return Err(TransitionError::CommitInProgress),
            _ => return Err(TransitionError::NothingPending),
        };
        self.state = GestureState::Committing(pending.clone());

        let result = self
            .api
            .update_order_sector(pending.task.id, pending.to)
            .await;
        // Confirmation state is cleared on both outcomes.
        self.state = GestureState::Idle;

        match result {
            Ok(()) => {
                let moved_at = Utc::now();
                let from = pending.from();
                if !board.mutate_sector(pending.task.id, pending.to, moved_at) {
                    warn!(
                        order = %pending.task.order_number,
                        "moved order is no longer on the board"
                    );
                }
                info!(
                    order = %pending.task.order_number,
                    from = from.label(),
                    to = pending.to.label(),
                    "order moved"
                );
                Ok(TransitionReport {
                    order_number: pending.task.order_number,
                    from,
                    to: pending.to,
                    moved_at,
                })
            }
            Err(err) => {
                warn!(
                    order = %pending.task.order_number,
                    error = %err,
                    "sector commit failed, board untouched"
                );
                Err(TransitionError::Api(err))
            }
        }
    }

    /// User declined: no network call, no board mutation.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        match self.state {
            GestureState::Pending(_) => {
                self.state = GestureState::Idle;
                Ok(())
            }
            GestureState::Committing(_) => Err(TransitionError::CommitInProgress),
            _ => Err(TransitionError::NothingPending),
        }
    }
}
