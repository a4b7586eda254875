// core/src/checkout/pipeline.rs

use super::context::CheckoutCtx;
use super::{CheckoutDeps, CheckoutOutcome};
use crate::cart;
use crate::error::OrderError;
use crate::gateway::{CustomerContact, InitiateRequest, Initiation};
use crate::order::{Order, PaymentMethod};
use crate::reference::validate_reference;
use crate::{ContextData, Pipeline, PipelineControl, SkipCondition};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub(super) fn build(deps: Arc<CheckoutDeps>) -> Pipeline<CheckoutCtx, OrderError> {
  let only_after_submission: SkipCondition<CheckoutCtx> =
    Arc::new(|ctx: ContextData<CheckoutCtx>| !ctx.read().reference_submitted);

  let mut p = Pipeline::<CheckoutCtx, OrderError>::new(
    "checkout",
    &[
      ("guard_cart", false, None),
      ("validate_address", false, None),
      ("price_order", false, None),
      ("dispatch_payment", false, None),
      ("notify_owner", true, Some(only_after_submission)),
    ],
  );

  p.on_root("guard_cart", |ctx: ContextData<CheckoutCtx>| async move {
    let cart = ctx.read().cart.clone();
    let lines = cart.lines().await;
    if lines.is_empty() {
      info!("Cart is empty; sending the customer back to it.");
      ctx.write().outcome = Some(CheckoutOutcome::RedirectToCart);
      return Ok::<_, OrderError>(PipelineControl::Stop);
    }
    ctx.write().lines = lines;
    Ok(PipelineControl::Continue)
  });

  let d = deps.clone();
  p.on_root("validate_address", move |ctx: ContextData<CheckoutCtx>| {
    let deps = d.clone();
    async move {
      let (address, method, inline_reference) = {
        let c = ctx.read();
        (c.address.clone(), c.method, c.inline_reference.clone())
      };
      address.validate()?;
      if method.is_manual_qr() {
        if let Some(raw) = inline_reference.as_deref().filter(|r| !r.trim().is_empty()) {
          let reference = validate_reference(raw)?;
          // No order exists yet, so any completed holder is a conflict.
          deps.machine.ensure_reference_unused(&reference, Uuid::nil()).await?;
        }
      }
      Ok::<_, OrderError>(PipelineControl::Continue)
    }
  });

  let d = deps.clone();
  p.on_root("price_order", move |ctx: ContextData<CheckoutCtx>| {
    let deps = d.clone();
    async move {
      let lines = ctx.read().lines.clone();
      let subtotal = cart::subtotal(&lines)?;
      let total = subtotal + deps.settings.delivery_fee_paise;
      let order_id = Uuid::new_v4();
      {
        let mut c = ctx.write();
        c.subtotal_paise = subtotal;
        c.total_paise = total;
        c.order_id = Some(order_id);
      }
      info!(order_id = %order_id, subtotal, total, "Order priced.");
      Ok::<_, OrderError>(PipelineControl::Continue)
    }
  });

  let d = deps.clone();
  p.on_root("dispatch_payment", move |ctx: ContextData<CheckoutCtx>| {
    let deps = d.clone();
    async move {
      dispatch_payment(&deps, &ctx).await?;
      Ok::<_, OrderError>(PipelineControl::Continue)
    }
  });

  let d = deps;
  p.on_root("notify_owner", move |ctx: ContextData<CheckoutCtx>| {
    let deps = d.clone();
    async move {
      let order = ctx.read().order.clone();
      if let Some(order) = order {
        deps.notify_owner_of_submission(&order).await;
      }
      Ok::<_, OrderError>(PipelineControl::Continue)
    }
  });

  p
}

fn draft_order(c: &CheckoutCtx, id: Uuid) -> Order {
  let now = Utc::now();
  Order {
    id,
    status: c.method.entry_status(),
    payment_method: c.method,
    payment_ref_id: None,
    total_paise: c.total_paise,
    customer_name: c.address.full_name.trim().to_string(),
    phone: c.address.phone.trim().to_string(),
    delivery_address: c.address.delivery_address(),
    notes: c.address.notes(),
    user_id: c.user_id,
    created_at: now,
    updated_at: now,
  }
}

async fn dispatch_payment(deps: &CheckoutDeps, ctx: &ContextData<CheckoutCtx>) -> Result<(), OrderError> {
  let (mut draft, method, cart, customer, inline_reference, i_have_paid) = {
    let c = ctx.read();
    let order_id = c.order_id.ok_or_else(|| OrderError::validation("order", "order was not priced"))?;
    let customer = CustomerContact {
      name: c.address.full_name.trim().to_string(),
      phone: c.address.phone.trim().to_string(),
      email: c.customer_email.clone(),
    };
    (
      draft_order(&c, order_id),
      c.method,
      c.cart.clone(),
      customer,
      c.inline_reference.clone().filter(|r| !r.trim().is_empty()),
      c.i_have_paid,
    )
  };

  let outcome = match method {
    PaymentMethod::Cod => {
      let order = deps.machine.create(draft, true).await?;
      tokio::time::sleep(deps.settings.cash_confirm_delay).await;
      cart.clear().await;
      let outcome = CheckoutOutcome::Track { order_id: order.id };
      ctx.write().order = Some(order);
      outcome
    }

    PaymentMethod::Redirect(_) | PaymentMethod::Session => {
      let gateway = deps.gateways.for_method(method)?;
      let request = InitiateRequest {
        order_id: draft.id,
        amount_paise: draft.total_paise,
        redirect_target: deps.settings.tracking_url(draft.id),
        customer,
      };
      let initiation = gateway.initiate(&request).await.map_err(|e| {
        warn!(gateway = gateway.name(), error = %e, "Gateway initiation failed; nothing persisted.");
        OrderError::from(e)
      })?;
      draft.payment_ref_id = initiation.gateway_ref().map(String::from);
      let order = deps.machine.create(draft, false).await?;
      let outcome = match initiation {
        Initiation::Redirect { url, .. } => {
          cart.clear().await;
          CheckoutOutcome::Redirect { order_id: order.id, url }
        }
        Initiation::Session(handle) => CheckoutOutcome::OpenSession {
          order_id: order.id,
          handle,
        },
      };
      ctx.write().order = Some(order);
      outcome
    }

    PaymentMethod::ManualQr(variant) => {
      let order = deps.machine.create(draft, true).await?;
      if inline_reference.is_some() || i_have_paid {
        let submitted = deps
          .machine
          .submit_reference(order.id, inline_reference.as_deref(), i_have_paid)
          .await?;
        cart.clear().await;
        let outcome = CheckoutOutcome::Track { order_id: submitted.id };
        let mut c = ctx.write();
        c.order = Some(submitted);
        c.reference_submitted = true;
        outcome
      } else {
        let (upi_url, qr_image_url) = deps.settings.upi_payment(order.id, order.total_paise, variant)?;
        let outcome = CheckoutOutcome::ShowQr {
          order_id: order.id,
          upi_url,
          qr_image_url,
        };
        ctx.write().order = Some(order);
        outcome
      }
    }
  };

  ctx.write().outcome = Some(outcome);
  Ok(())
}
