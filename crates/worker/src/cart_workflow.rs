// Cart checkout workflow
// Decision: Workflow is a state machine that produces commands in response to activations
// Decision: Stale abandoned-cart timers are left to fire and ignored rather than cancelled,
//           so a timer that fires in the same activation as a signal never races a cancel
//
// Lifecycle:
// 1. Shopping: signals mutate the cart; every handled signal re-arms the abandoned-cart
//    timer while the cart is non-empty and no reminder has been sent
// 2. Current timer fires: the reminder email activity is scheduled (once per address)
// 3. Checkout signal with an email: the payment activity is scheduled
// 4. Payment activity resolves (either way): the workflow completes with the final cart
//
// All state is deterministic and replayable from Temporal history.

use std::time::Duration;

use cart_core::{
    activity_names, signal_names, AddToCartSignal, CartState, CheckoutSignal,
    RemoveFromCartSignal, UpdateEmailSignal,
};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::traits::{Workflow, WorkflowInput};
use crate::types::{workflow_names, WorkflowAction};

/// How long a cart may sit untouched before the shopper gets a reminder
pub const ABANDONED_CART_TIMEOUT: Duration = Duration::from_secs(10);

/// Start-to-close timeout for both cart activities
pub const ACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the workflow is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartPhase {
    /// Accepting cart signals
    Shopping,
    /// Waiting for the payment activity
    CheckingOut { activity_id: String },
    /// Workflow finished
    Completed,
}

/// Cart workflow logic
#[derive(Debug)]
pub struct CartWorkflow {
    /// Current cart contents
    state: CartState,
    /// Current phase
    phase: CartPhase,
    /// Whether the reminder for the current address went out
    sent_abandoned_cart_email: bool,
    /// Timer whose firing should trigger the reminder
    active_timer: Option<String>,
    /// Sequence counter for timer IDs
    timer_seq: u32,
    /// Sequence counter for activity IDs
    activity_seq: u32,
}

impl CartWorkflow {
    /// Create a new workflow instance
    pub fn new(state: CartState) -> Self {
        Self {
            state,
            phase: CartPhase::Shopping,
            sent_abandoned_cart_email: false,
            active_timer: None,
            timer_seq: 0,
            activity_seq: 0,
        }
    }

    /// Current cart contents
    pub fn state(&self) -> &CartState {
        &self.state
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> &CartPhase {
        &self.phase
    }

    fn next_activity_id(&mut self, activity_type: &str) -> String {
        self.activity_seq += 1;
        format!("{}-{}", activity_type, self.activity_seq)
    }

    fn schedule(&mut self, activity_type: &str, input: serde_json::Value) -> (String, WorkflowAction) {
        let activity_id = self.next_activity_id(activity_type);
        let action = WorkflowAction::ScheduleActivity {
            activity_id: activity_id.clone(),
            activity_type: activity_type.to_string(),
            input,
            start_to_close_timeout: ACTIVITY_TIMEOUT,
        };
        (activity_id, action)
    }

    /// Restart the abandoned-cart timer if a reminder is still due
    fn rearm_abandoned_cart_timer(&mut self) -> Vec<WorkflowAction> {
        if self.sent_abandoned_cart_email || self.state.is_empty() {
            self.active_timer = None;
            return vec![];
        }

        self.timer_seq += 1;
        let timer_id = format!("abandoned-cart-{}", self.timer_seq);
        self.active_timer = Some(timer_id.clone());

        vec![WorkflowAction::StartTimer {
            timer_id,
            fire_after: ABANDONED_CART_TIMEOUT,
        }]
    }

    fn checkout(&mut self, signal: CheckoutSignal) -> Vec<WorkflowAction> {
        if !signal.email.is_empty() {
            self.state.email = signal.email;
        }

        if !self.state.has_email() {
            info!("Can't check out: no email");
            return self.rearm_abandoned_cart_timer();
        }

        info!(
            email = %self.state.email,
            items = self.state.items.len(),
            "Checking out cart"
        );

        let input = serde_json::to_value(&self.state).unwrap_or_default();
        let (activity_id, action) = self.schedule(activity_names::CREATE_STRIPE_CHARGE, input);
        self.phase = CartPhase::CheckingOut { activity_id };
        self.active_timer = None;

        vec![action]
    }

    fn finish_checkout(&mut self) -> Vec<WorkflowAction> {
        self.phase = CartPhase::Completed;
        info!(email = %self.state.email, "Cart workflow completed");

        vec![WorkflowAction::CompleteWorkflow {
            result: Some(serde_json::to_value(&self.state).unwrap_or_default()),
        }]
    }

    fn is_checkout_activity(&self, activity_id: &str) -> bool {
        matches!(&self.phase, CartPhase::CheckingOut { activity_id: id } if id == activity_id)
    }
}

/// Decode a signal payload, logging and discarding malformed ones
fn decode_signal<T: DeserializeOwned>(signal_name: &str, payload: serde_json::Value) -> Option<T> {
    match serde_json::from_value(payload) {
        Ok(signal) => Some(signal),
        Err(e) => {
            warn!(signal = %signal_name, error = %e, "Ignoring malformed signal payload");
            None
        }
    }
}

impl Workflow for CartWorkflow {
    fn workflow_type(&self) -> &'static str {
        workflow_names::CART_WORKFLOW
    }

    fn on_start(&mut self) -> Vec<WorkflowAction> {
        info!(
            items = self.state.items.len(),
            email = %self.state.email,
            "Starting cart workflow"
        );
        self.rearm_abandoned_cart_timer()
    }

    fn on_signal(&mut self, signal_name: &str, payload: serde_json::Value) -> Vec<WorkflowAction> {
        if self.phase != CartPhase::Shopping {
            info!(signal = %signal_name, "Ignoring signal after checkout");
            return vec![];
        }

        match signal_name {
            signal_names::ADD_TO_CART => {
                if let Some(signal) = decode_signal::<AddToCartSignal>(signal_name, payload) {
                    if let Err(e) = self.state.add_item(signal.item) {
                        warn!(signal = %signal_name, error = %e, "Ignoring add to cart signal");
                    }
                }
            }
            signal_names::REMOVE_FROM_CART => {
                if let Some(signal) = decode_signal::<RemoveFromCartSignal>(signal_name, payload) {
                    if let Err(e) = self.state.remove_item(&signal.item) {
                        warn!(signal = %signal_name, error = %e, "Ignoring remove from cart signal");
                    }
                }
            }
            signal_names::UPDATE_EMAIL => {
                if let Some(signal) = decode_signal::<UpdateEmailSignal>(signal_name, payload) {
                    self.state.email = signal.email;
                    self.sent_abandoned_cart_email = false;
                }
            }
            signal_names::CHECKOUT => {
                if let Some(signal) = decode_signal::<CheckoutSignal>(signal_name, payload) {
                    return self.checkout(signal);
                }
            }
            other => {
                warn!(signal = %other, "Unknown signal");
                return vec![];
            }
        }

        self.rearm_abandoned_cart_timer()
    }

    fn on_timer_fired(&mut self, timer_id: &str) -> Vec<WorkflowAction> {
        if self.phase != CartPhase::Shopping || self.active_timer.as_deref() != Some(timer_id) {
            return vec![];
        }

        self.active_timer = None;
        self.sent_abandoned_cart_email = true;

        info!(email = %self.state.email, "Cart abandoned, scheduling reminder email");

        let input = serde_json::Value::String(self.state.email.clone());
        let (_, action) = self.schedule(activity_names::SEND_ABANDONED_CART_EMAIL, input);
        vec![action]
    }

    fn on_activity_completed(
        &mut self,
        activity_id: &str,
        _result: serde_json::Value,
    ) -> Vec<WorkflowAction> {
        if self.is_checkout_activity(activity_id) {
            return self.finish_checkout();
        }

        info!(activity_id = %activity_id, "Activity completed");
        vec![]
    }

    fn on_activity_failed(&mut self, activity_id: &str, error: &str) -> Vec<WorkflowAction> {
        if self.is_checkout_activity(activity_id) {
            error!(activity_id = %activity_id, error = %error, "Error creating stripe charge");
            return self.finish_checkout();
        }

        error!(activity_id = %activity_id, error = %error, "Error sending email");
        vec![]
    }

    fn is_completed(&self) -> bool {
        self.phase == CartPhase::Completed
    }
}

impl WorkflowInput for CartWorkflow {
    const WORKFLOW_TYPE: &'static str = workflow_names::CART_WORKFLOW;
    type Input = CartState;

    fn from_input(input: Self::Input) -> Self {
        CartWorkflow::new(input)
    }
}
