//! Checkout state machine.

use marketstall_core::{
    CartLines, CheckoutStep, OrderCreated, OrderRequest, PaymentMethod, ShippingForm,
    ShippingRecord, StepSequence, ValidationErrors,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::{GatewayError, OrderGateway, SessionToken};

/// Errors that block a checkout transition. The session is unchanged.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("step {requested} is outside 1..={len}")]
    OutOfRange { requested: usize, len: usize },

    #[error("shipping details are required before continuing")]
    MissingShipping,

    #[error("a payment method is required before continuing")]
    MissingPaymentMethod,

    #[error("payment is handled by the payment provider")]
    PaymentDelegated,

    #[error("shipping details are invalid: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("expected to be on the {expected} step, currently on {actual}")]
    WrongStep {
        expected: CheckoutStep,
        actual: CheckoutStep,
    },

    #[error("already on the last step")]
    AtLastStep,

    #[error("the cart is empty")]
    EmptyCart,

    #[error("order creation failed: {0}")]
    Order(#[from] GatewayError),
}

/// Where a `step` parameter value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepParamSource {
    /// The checkout page was loaded. A missing parameter forces step 1.
    InitialLoad,
    /// The parameter changed while the page was open. A missing or unknown
    /// value leaves the cursor where it is.
    Update,
}

/// Tab-scoped checkout state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub current_step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self {
            current_step: 1,
            shipping: None,
            payment_method: None,
        }
    }
}

/// The checkout cursor plus the data each step collects.
#[derive(Debug, Clone)]
pub struct CheckoutMachine {
    sequence: StepSequence,
    session: CheckoutSession,
}

impl CheckoutMachine {
    /// A fresh checkout at step 1.
    #[must_use]
    pub fn new(sequence: StepSequence) -> Self {
        Self {
            sequence,
            session: CheckoutSession::default(),
        }
    }

    /// Mount the checkout page from its URL parameter.
    ///
    /// Always starts from a fresh session: nothing from a previous page
    /// survives a reload. A recognized parameter then moves the cursor if
    /// the guards allow it.
    #[must_use]
    pub fn mount(sequence: StepSequence, step_param: Option<&str>) -> Self {
        let mut machine = Self::new(sequence);
        if let Err(e) = machine.apply_step_param(step_param, StepParamSource::InitialLoad) {
            tracing::debug!(error = %e, "Deep-linked step rejected, staying on step 1");
        }
        machine
    }

    /// Resume a stored session between in-page interactions.
    ///
    /// A cursor outside the sequence (e.g. written under another
    /// configuration) is reset to step 1.
    #[must_use]
    pub fn restore(sequence: StepSequence, session: CheckoutSession) -> Self {
        let mut machine = Self { sequence, session };
        if machine.sequence.step_at(machine.session.current_step).is_none() {
            machine.session.current_step = 1;
        }
        if !machine.sequence.contains(CheckoutStep::PaymentMethod) {
            machine.session.payment_method = None;
        }
        machine
    }

    #[must_use]
    pub const fn session(&self) -> &CheckoutSession {
        &self.session
    }

    #[must_use]
    pub fn into_session(self) -> CheckoutSession {
        self.session
    }

    #[must_use]
    pub const fn sequence(&self) -> &StepSequence {
        &self.sequence
    }

    #[must_use]
    pub const fn current_position(&self) -> usize {
        self.session.current_step
    }

    /// The step under the cursor.
    #[must_use]
    pub fn current_step(&self) -> CheckoutStep {
        self.sequence
            .step_at(self.session.current_step)
            .unwrap_or(CheckoutStep::Cart)
    }

    #[must_use]
    pub fn is_complete_step(&self) -> bool {
        self.current_step() == CheckoutStep::Confirmation
    }

    /// Apply a `step` query parameter.
    ///
    /// Returns `Ok(true)` if the cursor moved.
    ///
    /// # Errors
    ///
    /// Returns the guard error when the parameter names a step whose
    /// predecessors are incomplete. The cursor is unchanged.
    pub fn apply_step_param(
        &mut self,
        step_param: Option<&str>,
        source: StepParamSource,
    ) -> Result<bool, CheckoutError> {
        let target = step_param
            .and_then(CheckoutStep::from_query_value)
            .and_then(|step| self.sequence.position_of(step));

        match (target, source) {
            (Some(position), _) => {
                let moved = position != self.session.current_step;
                self.set_current_step(position)?;
                Ok(moved)
            }
            (None, StepParamSource::InitialLoad) => {
                let moved = self.session.current_step != 1;
                self.session.current_step = 1;
                Ok(moved)
            }
            (None, StepParamSource::Update) => Ok(false),
        }
    }

    /// Move the cursor to a 1-based position.
    ///
    /// Moving backwards is always allowed. Moving forward requires every
    /// step before the target to have its data.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::OutOfRange`] or the first failing guard.
    pub fn set_current_step(&mut self, position: usize) -> Result<(), CheckoutError> {
        if self.sequence.step_at(position).is_none() {
            return Err(CheckoutError::OutOfRange {
                requested: position,
                len: self.sequence.len(),
            });
        }

        for step in self.sequence.steps().iter().take(position - 1) {
            self.require_data_for(*step)?;
        }

        self.session.current_step = position;
        Ok(())
    }

    /// Advance one step.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::AtLastStep`] on confirmation, or the guard
    /// error for the current step.
    pub fn next_step(&mut self) -> Result<CheckoutStep, CheckoutError> {
        if self.session.current_step >= self.sequence.len() {
            return Err(CheckoutError::AtLastStep);
        }
        self.set_current_step(self.session.current_step + 1)?;
        Ok(self.current_step())
    }

    /// Submit the shipping form.
    ///
    /// This is the one place shipping input is validated. On failure the
    /// previously stored shipping data, if any, is kept.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Validation`] with every rejected field.
    pub fn submit_shipping(&mut self, form: &ShippingForm) -> Result<&ShippingRecord, CheckoutError> {
        let record = form.validate()?;
        Ok(self.session.shipping.insert(record))
    }

    /// The shipping step's "Next" control.
    ///
    /// Proxies to [`Self::submit_shipping`] so the control and the form
    /// share one validation path, then advances.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::WrongStep`] off the shipping step, or the
    /// validation error. The cursor does not move on error.
    pub fn submit_shipping_and_advance(
        &mut self,
        form: &ShippingForm,
    ) -> Result<CheckoutStep, CheckoutError> {
        self.expect_step(CheckoutStep::ShippingDetails)?;
        self.submit_shipping(form)?;
        self.next_step()
    }

    /// Record the payment method.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::PaymentDelegated`] when the sequence has no
    /// payment-method step.
    pub fn select_payment_method(&mut self, method: PaymentMethod) -> Result<(), CheckoutError> {
        if !self.sequence.contains(CheckoutStep::PaymentMethod) {
            return Err(CheckoutError::PaymentDelegated);
        }
        self.session.payment_method = Some(method);
        Ok(())
    }

    /// Build the order request from the accumulated data.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor is not on confirmation, the cart is
    /// empty, or a predecessor's data is missing.
    pub fn order_request(&self, cart: CartLines) -> Result<OrderRequest, CheckoutError> {
        self.expect_step(CheckoutStep::Confirmation)?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let shipping = self
            .session
            .shipping
            .clone()
            .ok_or(CheckoutError::MissingShipping)?;
        let payment_method = if self.sequence.contains(CheckoutStep::PaymentMethod) {
            Some(
                self.session
                    .payment_method
                    .ok_or(CheckoutError::MissingPaymentMethod)?,
            )
        } else {
            None
        };

        Ok(OrderRequest {
            cart,
            shipping,
            payment_method,
        })
    }

    /// Create the order from the confirmation step.
    ///
    /// The returned order id hands over to the order page; the checkout
    /// session itself ends here.
    ///
    /// # Errors
    ///
    /// Returns the precondition error or the order collaborator's error.
    /// The cursor is unchanged either way.
    pub async fn confirm(
        &self,
        cart: CartLines,
        orders: &dyn OrderGateway,
        token: &SessionToken,
    ) -> Result<OrderCreated, CheckoutError> {
        let request = self.order_request(cart)?;
        let created = orders.create_order(token, &request).await?;
        tracing::info!(order_id = %created.order_id, "Order created");
        Ok(created)
    }

    fn expect_step(&self, expected: CheckoutStep) -> Result<(), CheckoutError> {
        let actual = self.current_step();
        if actual == expected {
            Ok(())
        } else {
            Err(CheckoutError::WrongStep { expected, actual })
        }
    }

    fn require_data_for(&self, step: CheckoutStep) -> Result<(), CheckoutError> {
        match step {
            CheckoutStep::ShippingDetails if self.session.shipping.is_none() => {
                Err(CheckoutError::MissingShipping)
            }
            CheckoutStep::PaymentMethod if self.session.payment_method.is_none() => {
                Err(CheckoutError::MissingPaymentMethod)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use marketstall_core::{CartLine, Order, OrderId, ProductId, Quantity};
    use rust_decimal::Decimal;

    use super::*;

    fn shipping_form() -> ShippingForm {
        ShippingForm {
            full_name: "Omar Saleh".into(),
            email: "omar@example.com".into(),
            phone: "0501234567".into(),
            address_line1: "5 Olaya St".into(),
            city: "Riyadh".into(),
            country: "SA".into(),
            ..ShippingForm::default()
        }
    }

    fn cart() -> CartLines {
        CartLines::from(vec![CartLine {
            product_id: ProductId::new(1),
            name: "Dates".into(),
            unit_price: Decimal::new(1_500, 2),
            quantity: Quantity::ONE,
            image_ref: None,
        }])
    }

    fn delegated() -> StepSequence {
        StepSequence::standard(true)
    }

    #[test]
    fn test_mount_without_param_starts_at_cart() {
        let machine = CheckoutMachine::mount(delegated(), None);
        assert_eq!(machine.current_position(), 1);
        assert_eq!(machine.current_step(), CheckoutStep::Cart);
    }

    #[test]
    fn test_mount_deep_link_to_shipping() {
        let machine = CheckoutMachine::mount(delegated(), Some("shippingDetails"));
        assert_eq!(machine.current_step(), CheckoutStep::ShippingDetails);
    }

    #[test]
    fn test_mount_deep_link_to_confirmation_is_guarded() {
        let machine = CheckoutMachine::mount(delegated(), Some("confirmation"));
        assert_eq!(machine.current_position(), 1);
    }

    #[test]
    fn test_initial_load_without_param_resets_prior_cursor() {
        let mut machine = CheckoutMachine::new(delegated());
        machine.set_current_step(2).unwrap();

        machine
            .apply_step_param(None, StepParamSource::InitialLoad)
            .unwrap();
        assert_eq!(machine.current_position(), 1);
    }

    #[test]
    fn test_update_with_unknown_param_keeps_cursor() {
        let mut machine = CheckoutMachine::new(delegated());
        machine.set_current_step(2).unwrap();

        assert!(
            !machine
                .apply_step_param(Some("bogus"), StepParamSource::Update)
                .unwrap()
        );
        assert!(
            !machine
                .apply_step_param(None, StepParamSource::Update)
                .unwrap()
        );
        assert_eq!(machine.current_position(), 2);
    }

    #[test]
    fn test_payment_param_ignored_when_payment_is_delegated() {
        let mut machine = CheckoutMachine::new(delegated());
        machine.set_current_step(2).unwrap();
        machine
            .apply_step_param(Some("payment"), StepParamSource::Update)
            .unwrap();
        assert_eq!(machine.current_position(), 2);
    }

    #[test]
    fn test_cursor_stays_in_bounds() {
        let mut machine = CheckoutMachine::new(delegated());
        assert!(matches!(
            machine.set_current_step(0),
            Err(CheckoutError::OutOfRange { .. })
        ));
        assert!(matches!(
            machine.set_current_step(4),
            Err(CheckoutError::OutOfRange { .. })
        ));
        assert_eq!(machine.current_position(), 1);

        machine.submit_shipping(&shipping_form()).unwrap();
        machine.set_current_step(3).unwrap();
        assert!(matches!(machine.next_step(), Err(CheckoutError::AtLastStep)));
        assert_eq!(machine.current_position(), 3);
    }

    #[test]
    fn test_confirmation_requires_shipping() {
        let mut machine = CheckoutMachine::new(delegated());
        machine.next_step().unwrap();

        assert!(matches!(
            machine.next_step(),
            Err(CheckoutError::MissingShipping)
        ));
        assert!(matches!(
            machine.set_current_step(3),
            Err(CheckoutError::MissingShipping)
        ));
        assert_eq!(machine.current_step(), CheckoutStep::ShippingDetails);
    }

    #[test]
    fn test_invalid_shipping_does_not_advance_or_corrupt() {
        let mut machine = CheckoutMachine::new(delegated());
        machine.next_step().unwrap();
        machine.submit_shipping(&shipping_form()).unwrap();

        let bad = ShippingForm {
            city: String::new(),
            ..shipping_form()
        };
        let err = machine.submit_shipping_and_advance(&bad).unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(ref v) if v.has("city")));
        assert_eq!(machine.current_step(), CheckoutStep::ShippingDetails);
        assert_eq!(
            machine.session().shipping.as_ref().unwrap().city,
            "Riyadh"
        );
    }

    #[test]
    fn test_shipping_next_proxies_submit() {
        let mut machine = CheckoutMachine::new(delegated());
        machine.next_step().unwrap();

        let step = machine
            .submit_shipping_and_advance(&shipping_form())
            .unwrap();
        assert_eq!(step, CheckoutStep::Confirmation);
        assert!(machine.session().shipping.is_some());
    }

    #[test]
    fn test_shipping_next_off_step_is_rejected() {
        let mut machine = CheckoutMachine::new(delegated());
        assert!(matches!(
            machine.submit_shipping_and_advance(&shipping_form()),
            Err(CheckoutError::WrongStep { .. })
        ));
    }

    #[test]
    fn test_payment_step_guard() {
        let mut machine = CheckoutMachine::new(StepSequence::standard(false));
        machine.submit_shipping(&shipping_form()).unwrap();
        machine.set_current_step(3).unwrap();

        assert!(matches!(
            machine.next_step(),
            Err(CheckoutError::MissingPaymentMethod)
        ));
        machine
            .select_payment_method(PaymentMethod::CashOnDelivery)
            .unwrap();
        assert_eq!(machine.next_step().unwrap(), CheckoutStep::Confirmation);
    }

    #[test]
    fn test_select_payment_method_when_delegated() {
        let mut machine = CheckoutMachine::new(delegated());
        assert!(matches!(
            machine.select_payment_method(PaymentMethod::BankTransfer),
            Err(CheckoutError::PaymentDelegated)
        ));
    }

    #[test]
    fn test_restore_clamps_invalid_cursor() {
        let session = CheckoutSession {
            current_step: 9,
            shipping: None,
            payment_method: Some(PaymentMethod::CashOnDelivery),
        };
        let machine = CheckoutMachine::restore(delegated(), session);
        assert_eq!(machine.current_position(), 1);
        assert_eq!(machine.session().payment_method, None);
    }

    #[test]
    fn test_order_request() {
        let mut machine = CheckoutMachine::new(delegated());
        machine.submit_shipping(&shipping_form()).unwrap();
        assert!(matches!(
            machine.order_request(cart()),
            Err(CheckoutError::WrongStep { .. })
        ));

        machine.set_current_step(3).unwrap();
        assert!(matches!(
            machine.order_request(CartLines::new()),
            Err(CheckoutError::EmptyCart)
        ));

        let request = machine.order_request(cart()).unwrap();
        assert_eq!(request.payment_method, None);
        assert_eq!(request.shipping.city, "Riyadh");
    }

    struct FailingOrders;

    #[async_trait]
    impl OrderGateway for FailingOrders {
        async fn create_order(
            &self,
            _token: &SessionToken,
            _request: &OrderRequest,
        ) -> Result<OrderCreated, GatewayError> {
            Err(GatewayError::Validation("payment declined".into()))
        }

        async fn fetch_order(
            &self,
            _token: &SessionToken,
            id: OrderId,
        ) -> Result<Order, GatewayError> {
            Err(GatewayError::NotFound(id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_order_keeps_cursor() {
        let mut machine = CheckoutMachine::new(delegated());
        machine.submit_shipping(&shipping_form()).unwrap();
        machine.set_current_step(3).unwrap();
        let token = SessionToken::new("tok").unwrap();

        let err = machine
            .confirm(cart(), &FailingOrders, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Order(GatewayError::Validation(_))));
        assert!(machine.is_complete_step());
    }
}
