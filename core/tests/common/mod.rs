// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thali_orders::gateway::{CustomerContact, InitiateRequest};
use thali_orders::store::StoreResult;
use thali_orders::{
  AddressForm, ApprovalLinks, CartLine, CheckoutOrchestrator, CheckoutRequest, CheckoutSettings, GatewayError,
  Gateways, InMemoryCart, InMemoryOrderStore, Initiation, Notifier, NotifyError, Order, OrderPatch, OrderStateMachine,
  OrderStatus, OrderStore, OrderTracker, OwnerApprovalHandler, PaymentGateway, PaymentMethod, RetryPolicy,
  SentNotice, SessionHandle, StoreError, UpiSettings, Verification, VerifyEvidence,
};
use tracing::Level;
use uuid::Uuid;

static TRACING: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

pub const OWNER_EMAIL: &str = "owner@thali.test";
pub const APPROVAL_SECRET: &str = "approval-secret";

// --- Fixtures ---

pub fn cart_line(name: &str, unit_price_paise: i64, quantity: u32) -> CartLine {
  CartLine {
    product_id: name.to_lowercase().replace(' ', "-"),
    name: name.to_string(),
    unit_price_paise,
    quantity,
    veg: true,
    category: "thali".to_string(),
  }
}

/// Two ₹280 thalis: subtotal ₹560.
pub fn scenario_cart() -> Arc<InMemoryCart> {
  Arc::new(InMemoryCart::new(vec![cart_line("Veg Thali", 28000, 2)]))
}

pub fn address_form() -> AddressForm {
  AddressForm {
    full_name: "Asha Rao".into(),
    phone: "9876543210".into(),
    street: "12 MG Road".into(),
    city: "Pune".into(),
    state: "Maharashtra".into(),
    pincode: "411001".into(),
    notes: Some("Ring twice".into()),
  }
}

pub fn request(method: PaymentMethod) -> CheckoutRequest {
  CheckoutRequest {
    method,
    address: address_form(),
    customer_email: Some("asha@example.test".into()),
    reference: None,
    i_have_paid: false,
  }
}

pub fn stored_order(status: OrderStatus, method: PaymentMethod, reference: Option<&str>) -> Order {
  let now = chrono::Utc::now();
  Order {
    id: Uuid::new_v4(),
    status,
    payment_method: method,
    payment_ref_id: reference.map(String::from),
    total_paise: 60000,
    customer_name: "Asha Rao".into(),
    phone: "9876543210".into(),
    delivery_address: "12 MG Road, Pune, Maharashtra - 411001".into(),
    notes: None,
    user_id: None,
    created_at: now,
    updated_at: now,
  }
}

// --- Notifier ---

#[derive(Debug, Clone)]
pub struct Sent {
  pub to: String,
  pub subject: String,
  pub body: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
  pub sent: Mutex<Vec<Sent>>,
  pub fail: bool,
}

impl RecordingNotifier {
  pub fn failing() -> Self {
    Self {
      sent: Mutex::new(Vec::new()),
      fail: true,
    }
  }

  pub fn subjects(&self) -> Vec<String> {
    self.sent.lock().iter().map(|s| s.subject.clone()).collect()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn send(&self, to: &str, subject: &str, body: &str) -> Result<SentNotice, NotifyError> {
    if self.fail {
      return Err(NotifyError::Channel("smtp down".into()));
    }
    self.sent.lock().push(Sent {
      to: to.to_string(),
      subject: subject.to_string(),
      body: body.to_string(),
    });
    Ok(SentNotice {
      to: to.to_string(),
      subject: subject.to_string(),
      message_id: format!("test_{}", Uuid::new_v4()),
    })
  }
}

// --- Gateway ---

pub enum FakeInitiation {
  Redirect(String),
  Session,
  Fail,
}

pub struct FakeGateway {
  pub name: &'static str,
  pub initiation: FakeInitiation,
  pub verification: Mutex<Verification>,
  pub initiate_calls: AtomicUsize,
  pub verify_calls: AtomicUsize,
  pub last_request: Mutex<Option<InitiateRequest>>,
}

impl FakeGateway {
  pub fn new(name: &'static str, initiation: FakeInitiation) -> Arc<Self> {
    Arc::new(Self {
      name,
      initiation,
      verification: Mutex::new(Verification::paid(Some("pay_ext_1".into()))),
      initiate_calls: AtomicUsize::new(0),
      verify_calls: AtomicUsize::new(0),
      last_request: Mutex::new(None),
    })
  }

  pub fn answer(&self, verification: Verification) {
    *self.verification.lock() = verification;
  }

  pub fn initiations(&self) -> usize {
    self.initiate_calls.load(Ordering::SeqCst)
  }

  pub fn verifications(&self) -> usize {
    self.verify_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
  fn name(&self) -> &'static str {
    self.name
  }

  async fn initiate(&self, request: &InitiateRequest) -> Result<Initiation, GatewayError> {
    self.initiate_calls.fetch_add(1, Ordering::SeqCst);
    *self.last_request.lock() = Some(request.clone());
    match &self.initiation {
      FakeInitiation::Redirect(url) => Ok(Initiation::Redirect {
        url: url.clone(),
        gateway_ref: Some(format!("gw_{}", request.order_id.simple())),
      }),
      FakeInitiation::Session => Ok(Initiation::Session(SessionHandle {
        gateway_order_id: format!("order_{}", &request.order_id.simple().to_string()[..10]),
        key_id: "rzp_test".into(),
        amount_paise: request.amount_paise,
        currency: "INR".into(),
        merchant_name: "Thali House".into(),
        prefill: CustomerContact {
          name: request.customer.name.clone(),
          phone: request.customer.phone.clone(),
          email: request.customer.email.clone(),
        },
      })),
      FakeInitiation::Fail => Err(GatewayError::Rejected {
        gateway: self.name,
        status: 500,
        body: "gateway exploded".into(),
      }),
    }
  }

  async fn verify(&self, _order: &Order, _evidence: &VerifyEvidence) -> Result<Verification, GatewayError> {
    self.verify_calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.verification.lock().clone())
  }
}

// --- Store wrapper ---

/// Counts calls and can fail the next N of them with a backend error.
#[derive(Default)]
pub struct CountingStore {
  pub inner: InMemoryOrderStore,
  pub calls: AtomicUsize,
  pub fail_next: AtomicUsize,
  pub duplicate_next_inserts: AtomicUsize,
}

impl CountingStore {
  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn fail_next(&self, n: usize) {
    self.fail_next.store(n, Ordering::SeqCst);
  }

  fn enter(&self) -> StoreResult<()> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let pending = self.fail_next.load(Ordering::SeqCst);
    if pending > 0 {
      self.fail_next.store(pending - 1, Ordering::SeqCst);
      return Err(StoreError::Backend(anyhow::anyhow!("connection reset")));
    }
    Ok(())
  }
}

#[async_trait]
impl OrderStore for CountingStore {
  async fn insert(&self, order: &Order) -> StoreResult<()> {
    self.enter()?;
    let dup = self.duplicate_next_inserts.load(Ordering::SeqCst);
    if dup > 0 {
      self.duplicate_next_inserts.store(dup - 1, Ordering::SeqCst);
      return Err(StoreError::DuplicateId(order.id));
    }
    self.inner.insert(order).await
  }

  async fn transition(
    &self,
    id: Uuid,
    expected: OrderStatus,
    next: OrderStatus,
    patch: OrderPatch,
  ) -> StoreResult<bool> {
    self.enter()?;
    self.inner.transition(id, expected, next, patch).await
  }

  async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Order>> {
    self.enter()?;
    self.inner.find_by_id(id).await
  }

  async fn find_by_payment_ref(&self, reference: &str, status: OrderStatus) -> StoreResult<Vec<Order>> {
    self.enter()?;
    self.inner.find_by_payment_ref(reference, status).await
  }
}

// --- Harness ---

pub struct Harness {
  pub store: Arc<CountingStore>,
  pub machine: OrderStateMachine,
  pub notifier: Arc<RecordingNotifier>,
  pub phonepe: Arc<FakeGateway>,
  pub stripe: Arc<FakeGateway>,
  pub razorpay: Arc<FakeGateway>,
  pub checkout: CheckoutOrchestrator,
  pub tracker: OrderTracker,
  pub approvals: OwnerApprovalHandler,
}

pub fn settings() -> CheckoutSettings {
  CheckoutSettings {
    delivery_fee_paise: 4000,
    cash_confirm_delay: Duration::ZERO,
    public_site_url: "https://thali.test".into(),
    upi: UpiSettings {
      payee_vpa: "thali@ybl".into(),
      payee_name: "Thali House".into(),
      owner_qr_image_url: None,
    },
    owner_email: Some(OWNER_EMAIL.into()),
  }
}

pub fn harness() -> Harness {
  harness_with(FakeInitiation::Redirect("https://pay.test/checkout/abc".into()), settings())
}

pub fn harness_with(redirect: FakeInitiation, settings: CheckoutSettings) -> Harness {
  let store = Arc::new(CountingStore::default());
  let machine = OrderStateMachine::new(store.clone()).with_retry(RetryPolicy {
    attempts: 3,
    backoff: Duration::from_millis(1),
  });
  let notifier = Arc::new(RecordingNotifier::default());
  let phonepe = FakeGateway::new("phonepe", redirect);
  let stripe = FakeGateway::new("stripe", FakeInitiation::Redirect("https://checkout.stripe.test/s".into()));
  let razorpay = FakeGateway::new("razorpay", FakeInitiation::Session);
  let gateways = Gateways::new()
    .with_phonepe(phonepe.clone())
    .with_stripe(stripe.clone())
    .with_razorpay(razorpay.clone());
  let links = ApprovalLinks {
    base_url: "https://thali.test".into(),
    secret: APPROVAL_SECRET.into(),
  };

  let checkout = CheckoutOrchestrator::new(machine.clone(), gateways, notifier.clone(), links, settings);
  let tracker = OrderTracker::new(machine.clone(), checkout.verifier().clone());
  let approvals = OwnerApprovalHandler::new(machine.clone(), notifier.clone(), Some(OWNER_EMAIL.into()));

  Harness {
    store,
    machine,
    notifier,
    phonepe,
    stripe,
    razorpay,
    checkout,
    tracker,
    approvals,
  }
}
