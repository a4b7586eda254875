// storefront/src/services/order_core.rs

//! Builds the order core services from configuration.

use crate::config::AppConfig;
use crate::db::PgOrderStore;
use crate::errors::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;
use thali_orders::gateway::phonepe::PhonePeGateway;
use thali_orders::gateway::razorpay::RazorpayGateway;
use thali_orders::gateway::stripe::StripeGateway;
use thali_orders::{
  ApprovalLinks, CheckoutOrchestrator, CheckoutSettings, Gateways, LogNotifier, Notifier, OrderStateMachine,
  OrderTracker, OwnerApprovalHandler, UpiSettings,
};
use sqlx::PgPool;

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(20);

pub struct OrderCore {
  pub checkout: Arc<CheckoutOrchestrator>,
  pub tracker: Arc<OrderTracker>,
  pub approvals: Arc<OwnerApprovalHandler>,
  pub links: ApprovalLinks,
}

/// Registers a gateway only when its credentials are configured.
pub fn build_gateways(config: &AppConfig, client: &reqwest::Client) -> Gateways {
  let mut gateways = Gateways::new();
  if let Some(phonepe) = &config.phonepe {
    gateways = gateways.with_phonepe(Arc::new(PhonePeGateway::new(phonepe.clone(), client.clone())));
  }
  if let Some(stripe) = &config.stripe {
    gateways = gateways.with_stripe(Arc::new(StripeGateway::new(stripe.clone(), client.clone())));
  }
  if let Some(razorpay) = &config.razorpay {
    gateways = gateways.with_razorpay(Arc::new(RazorpayGateway::new(razorpay.clone(), client.clone())));
  }
  tracing::info!(configured = ?gateways.configured(), "Payment gateways registered.");
  gateways
}

pub fn checkout_settings(config: &AppConfig) -> CheckoutSettings {
  CheckoutSettings {
    delivery_fee_paise: config.delivery_fee_paise,
    cash_confirm_delay: config.cash_confirm_delay,
    public_site_url: config.public_site_url.clone(),
    upi: UpiSettings {
      payee_vpa: config.upi_payee_vpa.clone(),
      payee_name: config.upi_payee_name.clone(),
      owner_qr_image_url: config.owner_qr_image_url.clone(),
    },
    owner_email: config.owner_email.clone(),
  }
}

pub fn build(config: &AppConfig, pool: PgPool) -> Result<OrderCore> {
  let client = reqwest::Client::builder()
    .timeout(GATEWAY_TIMEOUT)
    .build()
    .map_err(|e| AppError::Config(format!("Could not build HTTP client: {}", e)))?;

  let machine = OrderStateMachine::new(Arc::new(PgOrderStore::new(pool)));
  let gateways = build_gateways(config, &client);
  let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier {
    sender: config.notify_sender.clone(),
  });
  let links = ApprovalLinks {
    base_url: config.app_base_url.clone(),
    secret: config.approval_secret.clone(),
  };

  let checkout = CheckoutOrchestrator::new(
    machine.clone(),
    gateways,
    notifier.clone(),
    links.clone(),
    checkout_settings(config),
  );
  let tracker = OrderTracker::new(machine.clone(), checkout.verifier().clone()).with_poll_interval(config.poll_interval);
  let approvals = OwnerApprovalHandler::new(machine, notifier, config.owner_email.clone());

  Ok(OrderCore {
    checkout: Arc::new(checkout),
    tracker: Arc::new(tracker),
    approvals: Arc::new(approvals),
    links,
  })
}
