//! Status change requests and their side effects.

use common::OrderId;

use super::{Order, OrderStatus, VerificationAction};
use crate::error::CommerceError;

/// Where a status change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOrigin {
    /// Approve/reject of a screenshot payment.
    Verification,
    /// Direct status update from the back office.
    AdminUpdate,
}

/// A requested status change for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest {
    pub target: OrderStatus,
    /// When set, the order must currently be in exactly this status.
    pub require_current: Option<OrderStatus>,
    pub origin: TransitionOrigin,
}

impl TransitionRequest {
    /// Resolves a `pending_verification` order.
    pub fn verify(action: VerificationAction) -> Self {
        Self {
            target: action.target_status(),
            require_current: Some(OrderStatus::PendingVerification),
            origin: TransitionOrigin::Verification,
        }
    }

    /// Moves an order along the status table.
    pub fn admin(target: OrderStatus) -> Self {
        Self {
            target,
            require_current: None,
            origin: TransitionOrigin::AdminUpdate,
        }
    }
}

/// What a store has to do to apply a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Decrement stock by the order's quantities (entering `paid`).
    pub decrement_stock: bool,
    /// Drop the owner's cart rows.
    pub clear_owner_cart: bool,
}

impl TransitionPlan {
    pub fn changes_status(&self) -> bool {
        self.from != self.to
    }
}

/// Checks a request against the order's current status.
///
/// Setting the current status again is a no-op plan. Entering `paid` always
/// decrements stock; a back-office update to `paid` also clears the owner's
/// cart.
pub fn plan_transition(
    order_id: OrderId,
    current: OrderStatus,
    request: &TransitionRequest,
) -> Result<TransitionPlan, CommerceError> {
    if let Some(required) = request.require_current
        && current != required
    {
        return Err(CommerceError::AlreadyProcessed {
            order_id,
            status: current,
        });
    }

    if current == request.target {
        return Ok(TransitionPlan {
            from: current,
            to: current,
            decrement_stock: false,
            clear_owner_cart: false,
        });
    }

    if !current.can_transition_to(request.target) {
        return Err(CommerceError::InvalidTransition {
            from: current,
            to: request.target,
        });
    }

    let decrement_stock = request.target == OrderStatus::Paid;
    Ok(TransitionPlan {
        from: current,
        to: request.target,
        decrement_stock,
        clear_owner_cart: decrement_stock && request.origin == TransitionOrigin::AdminUpdate,
    })
}

/// An order after a status change, with the status it had before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transitioned {
    pub order: Order,
    pub previous: OrderStatus,
}

impl Transitioned {
    pub fn changed(&self) -> bool {
        self.previous != self.order.status
    }
}
