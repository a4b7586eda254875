// core/src/approval.rs

//! Owner approval of manually reported QR payments.

use crate::error::{FlowError, OrderError, OrderResult};
use crate::notify::{self, Notifier};
use crate::order::{Order, OrderPatch, OrderStatus};
use crate::reference::validate_reference;
use crate::state_machine::{OrderStateMachine, Transition};
use crate::{ContextData, Pipeline, PipelineControl, SkipCondition};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// `hex(HMAC-SHA256(secret, order_id))`, the credential carried by an
/// approval link.
pub fn approval_token(secret: &str, order_id: Uuid) -> String {
  match HmacSha256::new_from_slice(secret.as_bytes()) {
    Ok(mut mac) => {
      mac.update(order_id.to_string().as_bytes());
      hex::encode(mac.finalize().into_bytes())
    }
    Err(_) => String::new(),
  }
}

/// Builds and checks the approve/reject links mailed to the owner.
#[derive(Debug, Clone)]
pub struct ApprovalLinks {
  pub base_url: String,
  pub secret: String,
}

impl ApprovalLinks {
  pub fn link(&self, order_id: Uuid, approve: bool, reference: Option<&str>) -> String {
    let action = if approve { "approve" } else { "reject" };
    let mut url = format!(
      "{}/api/v1/approvals/{}?action={}&token={}",
      self.base_url.trim_end_matches('/'),
      order_id,
      action,
      approval_token(&self.secret, order_id)
    );
    if let Some(reference) = reference {
      url.push_str("&refId=");
      url.push_str(reference);
    }
    url
  }

  /// Constant-time check of a token taken from a link.
  pub fn verify(&self, order_id: Uuid, token: &str) -> bool {
    let (Ok(expected), Ok(mut mac)) = (hex::decode(token), HmacSha256::new_from_slice(self.secret.as_bytes())) else {
      return false;
    };
    mac.update(order_id.to_string().as_bytes());
    mac.verify_slice(&expected).is_ok()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
  pub order_id: Uuid,
  pub approved: bool,
  #[serde(default, alias = "refId")]
  pub reference: Option<String>,
  #[serde(default)]
  pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalReceipt {
  pub order: Order,
  pub message: String,
}

struct ApprovalCtx {
  request: ApprovalRequest,
  order: Option<Order>,
  reference: Option<String>,
  committed: bool,
  receipt: Option<ApprovalReceipt>,
}

struct ApprovalDeps {
  machine: OrderStateMachine,
  notifier: Arc<dyn Notifier>,
  owner_email: Option<String>,
}

/// Applies the owner's approve/reject decision. Needs no interactive session;
/// callers authenticate the owner (e.g. with an approval link token) first.
pub struct OwnerApprovalHandler {
  pipeline: Pipeline<ApprovalCtx, OrderError>,
}

impl OwnerApprovalHandler {
  pub fn new(machine: OrderStateMachine, notifier: Arc<dyn Notifier>, owner_email: Option<String>) -> Self {
    let deps = Arc::new(ApprovalDeps {
      machine,
      notifier,
      owner_email,
    });
    Self {
      pipeline: build(deps),
    }
  }

  #[instrument(
    name = "OwnerApproval::decide",
    skip_all,
    fields(order_id = %request.order_id, approved = request.approved),
    err(Display)
  )]
  pub async fn decide(&self, request: ApprovalRequest) -> OrderResult<ApprovalReceipt> {
    let ctx = ContextData::new(ApprovalCtx {
      request,
      order: None,
      reference: None,
      committed: false,
      receipt: None,
    });
    self.pipeline.run(ctx.clone()).await?;
    let receipt = ctx.write().receipt.take();
    receipt.ok_or_else(|| OrderError::Workflow(FlowError::Internal("approval produced no receipt".into())))
  }
}

fn build(deps: Arc<ApprovalDeps>) -> Pipeline<ApprovalCtx, OrderError> {
  let unless_committed: SkipCondition<ApprovalCtx> = Arc::new(|ctx: ContextData<ApprovalCtx>| !ctx.read().committed);

  let mut p = Pipeline::<ApprovalCtx, OrderError>::new(
    "owner_approval",
    &[
      ("load_order", false, None),
      ("commit_decision", false, None),
      ("notify_parties", true, Some(unless_committed)),
    ],
  );

  let d = deps.clone();
  p.on_root("load_order", move |ctx: ContextData<ApprovalCtx>| {
    let deps = d.clone();
    async move {
      let order_id = ctx.read().request.order_id;
      let order = deps.machine.load(order_id).await?;
      if order.status != OrderStatus::PendingOwnerApproval {
        return Err(OrderError::Conflict(format!(
          "order is {}; it has already been processed or was never submitted for approval",
          order.status
        )));
      }
      ctx.write().order = Some(order);
      Ok::<_, OrderError>(PipelineControl::Continue)
    }
  });

  let d = deps.clone();
  // Guard on the commit: the reference must be usable before the status moves.
  p.before_root("commit_decision", move |ctx: ContextData<ApprovalCtx>| {
    let deps = d.clone();
    async move {
      let (supplied, stored, approved, order_id) = {
        let c = ctx.read();
        (
          c.request.reference.clone().filter(|r| !r.trim().is_empty()),
          c.order.as_ref().and_then(|o| o.payment_ref_id.clone()),
          c.request.approved,
          c.request.order_id,
        )
      };
      let supplied = supplied.as_deref().map(validate_reference).transpose()?;
      let effective = supplied.clone().or(stored);
      if approved {
        if let Some(reference) = effective.as_deref() {
          deps.machine.ensure_reference_unused(reference, order_id).await?;
        }
      }
      ctx.write().reference = supplied;
      Ok::<_, OrderError>(PipelineControl::Continue)
    }
  });

  let d = deps.clone();
  p.on_root("commit_decision", move |ctx: ContextData<ApprovalCtx>| {
    let deps = d.clone();
    async move {
      let (order_id, approved, reference) = {
        let c = ctx.read();
        (c.request.order_id, c.request.approved, c.reference.clone())
      };
      let next = if approved {
        OrderStatus::Completed
      } else {
        OrderStatus::Rejected
      };
      let patch = OrderPatch {
        payment_ref_id: reference,
      };
      let transition = deps
        .machine
        .transition(order_id, OrderStatus::PendingOwnerApproval, next, patch)
        .await?;
      let order = deps.machine.load(order_id).await?;
      let short = notify::short_id(order_id);

      let message = match transition {
        Transition::Applied if approved => format!("Payment approved. Order #{} is confirmed.", short),
        Transition::Applied => format!("Payment rejected for order #{}.", short),
        Transition::Lost => format!("Order #{} was already {}.", short, order.status),
      };
      info!(order_id = %order_id, status = %order.status, "Owner decision recorded.");

      let mut c = ctx.write();
      c.committed = transition == Transition::Applied;
      c.receipt = Some(ApprovalReceipt { order, message });
      Ok::<_, OrderError>(PipelineControl::Continue)
    }
  });

  let d = deps;
  p.on_root("notify_parties", move |ctx: ContextData<ApprovalCtx>| {
    let deps = d.clone();
    async move {
      let (order, reason) = {
        let c = ctx.read();
        (
          c.receipt.as_ref().map(|r| r.order.clone()),
          c.request.rejection_reason.clone(),
        )
      };
      if let (Some(order), Some(owner)) = (order, deps.owner_email.as_deref()) {
        let approved = order.status == OrderStatus::Completed;
        let (subject, body) = notify::decision_confirmation(&order, approved, reason.as_deref());
        notify::send_best_effort(deps.notifier.as_ref(), owner, &subject, &body).await;
      }
      Ok::<_, OrderError>(PipelineControl::Continue)
    }
  });

  p
}
