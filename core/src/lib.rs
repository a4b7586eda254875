// core/src/lib.rs

//! Order core for the Thali storefront.
//!
//! The crate holds the order payment-status state machine and everything that
//! drives it:
//!  - a small async step-pipeline engine (named steps, before/on hooks,
//!    Continue/Stop control) used by checkout and owner approval,
//!  - the order record, its status graph and the `OrderStore` seam,
//!  - PhonePe, Stripe and Razorpay adapters behind `PaymentGateway`,
//!  - the checkout orchestrator, the tracking view with its approval poller,
//!    and the owner approval handler.

pub mod approval;
pub mod cart;
pub mod checkout;
pub mod core;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod notify;
pub mod order;
pub mod pipeline;
pub mod reference;
pub mod state_machine;
pub mod store;
pub mod tracking;
pub mod verification;

pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};
pub use crate::pipeline::definition::Pipeline;

pub use crate::approval::{approval_token, ApprovalLinks, ApprovalReceipt, ApprovalRequest, OwnerApprovalHandler};
pub use crate::cart::{CartLine, CartService, InMemoryCart};
pub use crate::checkout::{
  AddressForm, CheckoutOrchestrator, CheckoutOutcome, CheckoutRequest, CheckoutSettings, UpiSettings,
};
pub use crate::error::{FlowError, OrderError, OrderResult};
pub use crate::gateway::{
  GatewayError, Gateways, Initiation, PaymentGateway, PaymentOutcome, SessionHandle, Verification, VerifyEvidence,
};
pub use crate::identity::{Identity, IdentityService, StaticIdentity};
pub use crate::notify::{LogNotifier, Notifier, NotifyError, SentNotice};
pub use crate::order::{Order, OrderPatch, OrderStatus, PaymentMethod, QrVariant, RedirectGateway};
pub use crate::state_machine::{OrderStateMachine, RetryPolicy, Transition};
pub use crate::store::{memory::InMemoryOrderStore, OrderStore, StoreError};
pub use crate::tracking::{OrderTracker, PollHandle, PollState, ReturnMarker, TrackingView};
pub use crate::verification::PaymentVerifier;
