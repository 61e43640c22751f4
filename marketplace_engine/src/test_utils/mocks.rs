//! In-memory stand-ins for the payment processor and the shipping carrier.
//!
//! Both mocks honour idempotency keys the way the real services do: repeating a request with the same key returns
//! the original result without performing the side effect again. Every request is recorded so tests can inspect
//! what the engine sent. Individual operations can be told to fail, and a delay can be injected to exercise
//! timeouts.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use marketplace_common::Cents;

use crate::{
    db_types::RefundStatus,
    traits::{
        Carrier,
        CarrierError,
        CarrierShipment,
        PaymentIntent,
        PaymentIntentStatus,
        PaymentProcessor,
        PaymentProcessorError,
        PickupRequest,
        ProcessorRefund,
        ProcessorTransfer,
        RefundRequest,
        ShipmentRequest,
        TrackingActivity,
        TrackingInfo,
        TransferRequest,
    },
};

async fn maybe_sleep(delay: Option<Duration>) {
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }
}

//--------------------------------------   Payment processor  ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorOp {
    CreateRefund,
    RetrievePaymentIntent,
    CreateTransfer,
}

#[derive(Debug, Default)]
struct ProcessorState {
    intents: HashMap<String, PaymentIntent>,
    refunds: HashMap<String, ProcessorRefund>,
    transfers: HashMap<String, ProcessorTransfer>,
    refund_requests: Vec<RefundRequest>,
    transfer_requests: Vec<TransferRequest>,
    refund_status: Option<RefundStatus>,
    failing: HashSet<ProcessorOp>,
    delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct MockPaymentProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ProcessorState> {
        self.state.lock().expect("Mock processor state is poisoned")
    }

    /// Registers a payment intent the processor will report on.
    pub fn add_intent<S: Into<String>>(&self, id: S, amount: Cents, status: PaymentIntentStatus) {
        let id = id.into();
        self.state().intents.insert(id.clone(), PaymentIntent { id, amount, status });
    }

    /// The status new refunds are reported with. Defaults to `succeeded`.
    pub fn set_refund_status(&self, status: RefundStatus) {
        self.state().refund_status = Some(status);
    }

    pub fn fail(&self, op: ProcessorOp) {
        self.state().failing.insert(op);
    }

    pub fn recover(&self, op: ProcessorOp) {
        self.state().failing.remove(&op);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    /// Every refund request received, including idempotent repeats.
    pub fn refund_requests(&self) -> Vec<RefundRequest> {
        self.state().refund_requests.clone()
    }

    pub fn transfer_requests(&self) -> Vec<TransferRequest> {
        self.state().transfer_requests.clone()
    }

    /// The number of distinct refunds actually made.
    pub fn refunds_made(&self) -> usize {
        self.state().refunds.len()
    }

    pub fn transfers_made(&self) -> usize {
        self.state().transfers.len()
    }

    fn check(&self, op: ProcessorOp) -> Result<Option<Duration>, PaymentProcessorError> {
        let state = self.state();
        if state.failing.contains(&op) {
            return Err(PaymentProcessorError::Unavailable(format!("{op:?} is switched off")));
        }
        Ok(state.delay)
    }
}

impl PaymentProcessor for MockPaymentProcessor {
    async fn create_refund(&self, request: RefundRequest) -> Result<ProcessorRefund, PaymentProcessorError> {
        let delay = self.check(ProcessorOp::CreateRefund)?;
        maybe_sleep(delay).await;
        let mut state = self.state();
        state.refund_requests.push(request.clone());
        if !state.intents.contains_key(&request.payment_intent_id) {
            return Err(PaymentProcessorError::NotFound(request.payment_intent_id));
        }
        if let Some(refund) = state.refunds.get(&request.idempotency_key) {
            return Ok(refund.clone());
        }
        let status = state.refund_status.unwrap_or(RefundStatus::Succeeded);
        let refund = ProcessorRefund { id: format!("re_{}", state.refunds.len() + 1), status };
        state.refunds.insert(request.idempotency_key, refund.clone());
        Ok(refund)
    }

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<PaymentIntent, PaymentProcessorError> {
        let delay = self.check(ProcessorOp::RetrievePaymentIntent)?;
        maybe_sleep(delay).await;
        self.state()
            .intents
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| PaymentProcessorError::NotFound(payment_intent_id.to_string()))
    }

    async fn create_transfer(&self, request: TransferRequest) -> Result<ProcessorTransfer, PaymentProcessorError> {
        let delay = self.check(ProcessorOp::CreateTransfer)?;
        maybe_sleep(delay).await;
        let mut state = self.state();
        state.transfer_requests.push(request.clone());
        if !request.amount.is_positive() {
            return Err(PaymentProcessorError::Declined(format!("Cannot transfer {}", request.amount)));
        }
        if let Some(transfer) = state.transfers.get(&request.idempotency_key) {
            return Ok(transfer.clone());
        }
        let transfer = ProcessorTransfer { id: format!("tr_{}", state.transfers.len() + 1) };
        state.transfers.insert(request.idempotency_key, transfer.clone());
        Ok(transfer)
    }
}

//--------------------------------------        Carrier       ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CarrierOp {
    CreateShipment,
    TrackShipment,
    VoidShipment,
    SchedulePickup,
    CancelPickup,
}

#[derive(Debug, Default)]
struct CarrierState {
    labels: HashMap<String, CarrierShipment>,
    shipment_requests: Vec<ShipmentRequest>,
    tracking: HashMap<String, String>,
    voided: Vec<String>,
    pickups: HashMap<String, String>,
    cancelled_pickups: Vec<String>,
    failing: HashSet<CarrierOp>,
    delay: Option<Duration>,
}

#[derive(Debug, Clone, Default)]
pub struct MockCarrier {
    state: Arc<Mutex<CarrierState>>,
}

impl MockCarrier {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, CarrierState> {
        self.state.lock().expect("Mock carrier state is poisoned")
    }

    /// Sets the status code the carrier reports for a tracking number.
    pub fn set_tracking_code<S: Into<String>>(&self, tracking_number: &str, code: S) {
        self.state().tracking.insert(tracking_number.to_string(), code.into());
    }

    pub fn fail(&self, op: CarrierOp) {
        self.state().failing.insert(op);
    }

    pub fn recover(&self, op: CarrierOp) {
        self.state().failing.remove(&op);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state().delay = delay;
    }

    pub fn shipment_requests(&self) -> Vec<ShipmentRequest> {
        self.state().shipment_requests.clone()
    }

    pub fn labels_created(&self) -> usize {
        self.state().labels.len()
    }

    /// Carrier shipment ids that have been voided, in order.
    pub fn voided(&self) -> Vec<String> {
        self.state().voided.clone()
    }

    pub fn pickups_booked(&self) -> usize {
        self.state().pickups.len()
    }

    pub fn cancelled_pickups(&self) -> Vec<String> {
        self.state().cancelled_pickups.clone()
    }

    fn check(&self, op: CarrierOp) -> Result<Option<Duration>, CarrierError> {
        let state = self.state();
        if state.failing.contains(&op) {
            return Err(CarrierError::Unavailable(format!("{op:?} is switched off")));
        }
        Ok(state.delay)
    }
}

impl Carrier for MockCarrier {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<CarrierShipment, CarrierError> {
        let delay = self.check(CarrierOp::CreateShipment)?;
        maybe_sleep(delay).await;
        let mut errors = vec![];
        if request.package.weight <= 0.0 {
            errors.push("Package weight must be positive".to_string());
        }
        if request.recipient.postal_code.is_empty() {
            errors.push("Recipient postal code is required".to_string());
        }
        if !errors.is_empty() {
            return Err(CarrierError::Validation(errors));
        }
        let mut state = self.state();
        state.shipment_requests.push(request.clone());
        if let Some(label) = state.labels.get(&request.idempotency_key) {
            return Ok(label.clone());
        }
        let n = state.labels.len() + 1;
        let label = CarrierShipment { shipment_id: format!("SHP{n:04}"), tracking_number: format!("1Z{n:08}") };
        state.tracking.insert(label.tracking_number.clone(), "M".to_string());
        state.labels.insert(request.idempotency_key, label.clone());
        Ok(label)
    }

    async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingInfo, CarrierError> {
        let delay = self.check(CarrierOp::TrackShipment)?;
        maybe_sleep(delay).await;
        let state = self.state();
        let code =
            state.tracking.get(tracking_number).ok_or_else(|| CarrierError::NotFound(tracking_number.into()))?;
        let activity = TrackingActivity {
            status_code: code.clone(),
            description: format!("Status {code}"),
            timestamp: Utc::now(),
        };
        Ok(TrackingInfo { status_code: code.clone(), activities: vec![activity] })
    }

    async fn void_shipment(&self, shipment_id: &str, _tracking_number: &str) -> Result<(), CarrierError> {
        let delay = self.check(CarrierOp::VoidShipment)?;
        maybe_sleep(delay).await;
        let mut state = self.state();
        if !state.labels.values().any(|l| l.shipment_id == shipment_id) {
            return Err(CarrierError::NotFound(shipment_id.into()));
        }
        state.voided.push(shipment_id.to_string());
        Ok(())
    }

    async fn schedule_pickup(&self, request: PickupRequest) -> Result<String, CarrierError> {
        let delay = self.check(CarrierOp::SchedulePickup)?;
        maybe_sleep(delay).await;
        let mut state = self.state();
        if let Some(number) = state.pickups.get(&request.idempotency_key) {
            return Ok(number.clone());
        }
        let number = format!("PRN{:04}", state.pickups.len() + 1);
        state.pickups.insert(request.idempotency_key, number.clone());
        Ok(number)
    }

    async fn cancel_pickup(&self, pickup_request_number: &str) -> Result<(), CarrierError> {
        let delay = self.check(CarrierOp::CancelPickup)?;
        maybe_sleep(delay).await;
        self.state().cancelled_pickups.push(pickup_request_number.to_string());
        Ok(())
    }
}
