// tests/gateway_http_tests.rs
mod common;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::*;
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use thali_orders::gateway::{
  CustomerContact, InitiateRequest, PhonePeConfig, PhonePeGateway, RazorpayConfig, RazorpayGateway, StripeConfig,
  StripeGateway,
};
use thali_orders::{
  GatewayError, Gateways, Initiation, Order, OrderError, OrderStateMachine, OrderStatus, OrderStore, PaymentGateway,
  PaymentMethod, PaymentOutcome, PaymentVerifier, RedirectGateway, VerifyEvidence,
};
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn initiate_request(order_id: Uuid) -> InitiateRequest {
  InitiateRequest {
    order_id,
    amount_paise: 60000,
    redirect_target: format!("https://thali.test/orders/{}", order_id),
    customer: CustomerContact {
      name: "Asha Rao".into(),
      phone: "9876543210".into(),
      email: Some("asha@example.test".into()),
    },
  }
}

fn phonepe(server: &MockServer) -> PhonePeGateway {
  PhonePeGateway::new(
    PhonePeConfig {
      merchant_id: "THALIMERCHANT".into(),
      salt_key: "salt-key".into(),
      salt_index: "1".into(),
      base_url: server.uri(),
    },
    reqwest::Client::new(),
  )
}

fn phonepe_order() -> Order {
  stored_order(OrderStatus::Initiated, PaymentMethod::Redirect(RedirectGateway::PhonePe), None)
}

fn stripe_order(session_id: Option<&str>) -> Order {
  stored_order(OrderStatus::Initiated, PaymentMethod::Redirect(RedirectGateway::Stripe), session_id)
}

fn stripe(server: &MockServer) -> StripeGateway {
  StripeGateway::new(
    StripeConfig {
      secret_key: "sk_test_123".into(),
      base_url: server.uri(),
    },
    reqwest::Client::new(),
  )
}

#[tokio::test]
#[serial]
async fn phonepe_initiate_returns_pay_page() {
  setup_tracing();
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/pg/v1/pay"))
    .and(header_exists("X-VERIFY"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "success": true,
      "code": "PAYMENT_INITIATED",
      "data": {
        "merchantId": "THALIMERCHANT",
        "instrumentResponse": {
          "type": "PAY_PAGE",
          "redirectInfo": { "url": "https://mercury.phonepe.test/transact/abc", "method": "GET" }
        }
      }
    })))
    .expect(1)
    .mount(&server)
    .await;

  let order_id = Uuid::new_v4();
  let initiation = phonepe(&server).initiate(&initiate_request(order_id)).await.unwrap();
  assert_eq!(
    initiation,
    Initiation::Redirect {
      url: "https://mercury.phonepe.test/transact/abc".into(),
      gateway_ref: Some(order_id.simple().to_string()),
    }
  );

  let received = server.received_requests().await.unwrap();
  let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
  let decoded = STANDARD.decode(body["request"].as_str().unwrap()).unwrap();
  let payload: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
  assert_eq!(payload["amount"], 60000);
  assert_eq!(payload["merchantTransactionId"], order_id.simple().to_string());
}

#[tokio::test]
#[serial]
async fn phonepe_status_codes_map_to_outcomes() {
  setup_tracing();
  let cases = [
    ("PAYMENT_SUCCESS", PaymentOutcome::Paid),
    ("PAYMENT_PENDING", PaymentOutcome::Unpaid),
    ("PAYMENT_ERROR", PaymentOutcome::Failed),
    ("PAYMENT_DECLINED", PaymentOutcome::Failed),
  ];
  for (code, expected) in cases {
    let server = MockServer::start().await;
    let order = phonepe_order();
    Mock::given(method("GET"))
      .and(path(format!("/pg/v1/status/THALIMERCHANT/{}", order.id.simple())))
      .and(header("X-MERCHANT-ID", "THALIMERCHANT"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": code == "PAYMENT_SUCCESS",
        "code": code,
        "data": { "transactionId": "T2406011234" }
      })))
      .mount(&server)
      .await;

    let evidence = VerifyEvidence::Callback {
      status: None,
      transaction_id: None,
    };
    let v = phonepe(&server).verify(&order, &evidence).await.unwrap();
    assert_eq!(v.outcome, expected, "code {}", code);
  }
}

#[tokio::test]
#[serial]
async fn phonepe_failure_marker_still_asks_the_status_api() {
  setup_tracing();
  let server = MockServer::start().await;
  let order = phonepe_order();
  Mock::given(method("GET"))
    .and(path(format!("/pg/v1/status/THALIMERCHANT/{}", order.id.simple())))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "success": true,
      "code": "PAYMENT_SUCCESS",
      "data": { "transactionId": "T2406011234" }
    })))
    .expect(1)
    .mount(&server)
    .await;

  let evidence = VerifyEvidence::Callback {
    status: Some("failure".into()),
    transaction_id: Some(order.id.simple().to_string()),
  };
  let v = phonepe(&server).verify(&order, &evidence).await.unwrap();
  assert_eq!(v.outcome, PaymentOutcome::Paid);
  assert_eq!(v.external_ref.as_deref(), Some("T2406011234"));
}

#[tokio::test]
#[serial]
async fn phonepe_return_for_another_transaction_is_refused() {
  setup_tracing();
  let server = MockServer::start().await;
  Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

  let evidence = VerifyEvidence::Callback {
    status: Some("PAYMENT_SUCCESS".into()),
    transaction_id: Some(Uuid::new_v4().simple().to_string()),
  };
  let err = phonepe(&server).verify(&phonepe_order(), &evidence).await.unwrap_err();
  assert!(matches!(err, GatewayError::Mismatch(_)));
}

#[tokio::test]
#[serial]
async fn stripe_initiate_posts_checkout_session_form() {
  setup_tracing();
  let server = MockServer::start().await;
  let order_id = Uuid::new_v4();
  Mock::given(method("POST"))
    .and(path("/v1/checkout/sessions"))
    .and(header("authorization", "Bearer sk_test_123"))
    .and(body_string_contains(format!("client_reference_id={}", order_id)))
    .and(body_string_contains("line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=60000"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "id": "cs_test_1",
      "url": "https://checkout.stripe.test/c/pay/cs_test_1",
      "client_reference_id": order_id.to_string(),
      "payment_status": "unpaid"
    })))
    .expect(1)
    .mount(&server)
    .await;

  let initiation = stripe(&server).initiate(&initiate_request(order_id)).await.unwrap();
  assert_eq!(initiation.gateway_ref(), Some("cs_test_1"));
}

#[tokio::test]
#[serial]
async fn stripe_rejection_surfaces_as_gateway_error() {
  setup_tracing();
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/v1/checkout/sessions"))
    .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":{\"message\":\"Invalid API Key\"}}"))
    .mount(&server)
    .await;

  let err = stripe(&server).initiate(&initiate_request(Uuid::new_v4())).await.unwrap_err();
  assert!(matches!(err, GatewayError::Rejected { status: 401, .. }));
}

#[tokio::test]
#[serial]
async fn stripe_paid_session_is_paid() {
  setup_tracing();
  let server = MockServer::start().await;
  let order = stripe_order(Some("cs_test_1"));
  Mock::given(method("GET"))
    .and(path("/v1/checkout/sessions/cs_test_1"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "id": "cs_test_1",
      "client_reference_id": order.id.to_string(),
      "payment_status": "paid",
      "payment_intent": "pi_3Abc"
    })))
    .mount(&server)
    .await;

  let evidence = VerifyEvidence::CheckoutSession {
    session_id: Some("cs_test_1".into()),
    marker: Some("success".into()),
  };
  let v = stripe(&server).verify(&order, &evidence).await.unwrap();
  assert_eq!(v.outcome, PaymentOutcome::Paid);
  assert_eq!(v.external_ref.as_deref(), Some("pi_3Abc"));
}

#[tokio::test]
#[serial]
async fn stripe_session_for_another_order_is_an_adapter_error() {
  setup_tracing();
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/v1/checkout/sessions/cs_test_1"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "id": "cs_test_1",
      "client_reference_id": Uuid::new_v4().to_string(),
      "payment_status": "paid"
    })))
    .mount(&server)
    .await;

  let store = Arc::new(thali_orders::InMemoryOrderStore::new());
  let order = stored_order(
    OrderStatus::Initiated,
    PaymentMethod::Redirect(RedirectGateway::Stripe),
    Some("cs_test_1"),
  );
  store.insert(&order).await.unwrap();
  let machine = OrderStateMachine::new(store.clone());
  let verifier = PaymentVerifier::new(machine.clone(), Gateways::new().with_stripe(Arc::new(stripe(&server))));

  let evidence = VerifyEvidence::CheckoutSession {
    session_id: Some("cs_test_1".into()),
    marker: Some("success".into()),
  };
  let err = verifier.verify(order.id, &evidence).await.unwrap_err();
  assert!(matches!(err, OrderError::Adapter(_)));
  assert_eq!(machine.load(order.id).await.unwrap().status, OrderStatus::Initiated);
}

#[tokio::test]
#[serial]
async fn stripe_cancelled_marker_defers_to_the_session() {
  setup_tracing();
  let server = MockServer::start().await;
  let order = stripe_order(Some("cs_test_1"));
  let session = |payment_status: &str, status: &str| {
    json!({
      "id": "cs_test_1",
      "client_reference_id": order.id.to_string(),
      "status": status,
      "payment_status": payment_status,
      "payment_intent": "pi_3Abc"
    })
  };
  let cases = [
    (session("paid", "complete"), PaymentOutcome::Paid),
    (session("unpaid", "open"), PaymentOutcome::Unpaid),
    (session("unpaid", "expired"), PaymentOutcome::Failed),
  ];
  let evidence = VerifyEvidence::CheckoutSession {
    session_id: None,
    marker: Some("cancelled".into()),
  };
  for (body, expected) in cases {
    server.reset().await;
    Mock::given(method("GET"))
      .and(path("/v1/checkout/sessions/cs_test_1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(body))
      .expect(1)
      .mount(&server)
      .await;
    let v = stripe(&server).verify(&order, &evidence).await.unwrap();
    assert_eq!(v.outcome, expected);
    server.verify().await;
  }
}

#[tokio::test]
#[serial]
async fn stripe_malformed_session_id_never_reaches_the_api() {
  setup_tracing();
  let server = MockServer::start().await;
  Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

  let evidence = VerifyEvidence::CheckoutSession {
    session_id: Some("cs_test_1/../../v1/charges".into()),
    marker: Some("success".into()),
  };
  let err = stripe(&server).verify(&stripe_order(None), &evidence).await.unwrap_err();
  assert!(matches!(err, GatewayError::Mismatch(_)));

  let swapped = VerifyEvidence::CheckoutSession {
    session_id: Some("cs_test_2".into()),
    marker: Some("success".into()),
  };
  let err = stripe(&server).verify(&stripe_order(Some("cs_test_1")), &swapped).await.unwrap_err();
  assert!(matches!(err, GatewayError::Mismatch(_)));
}

#[tokio::test]
#[serial]
async fn razorpay_initiate_creates_order_with_basic_auth() {
  setup_tracing();
  let server = MockServer::start().await;
  let expected_auth = format!("Basic {}", STANDARD.encode("rzp_test_key:rzp_secret"));
  Mock::given(method("POST"))
    .and(path("/v1/orders"))
    .and(header("authorization", expected_auth.as_str()))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "id": "order_N1a2b3c4",
      "entity": "order",
      "amount": 60000,
      "currency": "INR",
      "status": "created"
    })))
    .expect(1)
    .mount(&server)
    .await;

  let gateway = RazorpayGateway::new(
    RazorpayConfig {
      key_id: "rzp_test_key".into(),
      key_secret: "rzp_secret".into(),
      merchant_name: "Thali House".into(),
      base_url: server.uri(),
    },
    reqwest::Client::new(),
  );
  let Initiation::Session(handle) = gateway.initiate(&initiate_request(Uuid::new_v4())).await.unwrap() else {
    panic!("expected a session handle");
  };
  assert_eq!(handle.gateway_order_id, "order_N1a2b3c4");
  assert_eq!(handle.key_id, "rzp_test_key");
  assert_eq!(handle.amount_paise, 60000);
  assert_eq!(handle.prefill.name, "Asha Rao");
}

#[tokio::test]
#[serial]
async fn razorpay_signature_mismatch_fails_the_order() {
  setup_tracing();
  let gateway = Arc::new(RazorpayGateway::new(
    RazorpayConfig {
      key_id: "rzp_test_key".into(),
      key_secret: "rzp_secret".into(),
      merchant_name: "Thali House".into(),
      base_url: "http://127.0.0.1:9".into(),
    },
    reqwest::Client::new(),
  ));
  let store = Arc::new(thali_orders::InMemoryOrderStore::new());
  let order = stored_order(OrderStatus::Initiated, PaymentMethod::Session, Some("order_N1a2b3c4"));
  store.insert(&order).await.unwrap();
  let machine = OrderStateMachine::new(store.clone());
  let verifier = PaymentVerifier::new(machine.clone(), Gateways::new().with_razorpay(gateway.clone()));

  let forged = VerifyEvidence::Signature {
    gateway_order_id: "order_N1a2b3c4".into(),
    payment_id: "pay_1".into(),
    signature: gateway.sign("order_N1a2b3c4", "pay_2").unwrap(),
  };
  let failed = verifier.verify(order.id, &forged).await.unwrap();
  assert_eq!(failed.status, OrderStatus::Failed);
}

#[tokio::test]
#[serial]
async fn razorpay_signature_from_another_order_leaves_the_order_initiated() {
  setup_tracing();
  let gateway = Arc::new(RazorpayGateway::new(
    RazorpayConfig {
      key_id: "rzp_test_key".into(),
      key_secret: "rzp_secret".into(),
      merchant_name: "Thali House".into(),
      base_url: "http://127.0.0.1:9".into(),
    },
    reqwest::Client::new(),
  ));
  let store = Arc::new(thali_orders::InMemoryOrderStore::new());
  let mut pricey = stored_order(OrderStatus::Initiated, PaymentMethod::Session, Some("order_PRICEY"));
  pricey.total_paise = 250_000;
  store.insert(&pricey).await.unwrap();
  let machine = OrderStateMachine::new(store.clone());
  let verifier = PaymentVerifier::new(machine.clone(), Gateways::new().with_razorpay(gateway.clone()));

  // Genuine signature, but for a cheap order paid elsewhere.
  let borrowed = VerifyEvidence::Signature {
    gateway_order_id: "order_CHEAP".into(),
    payment_id: "pay_cheap".into(),
    signature: gateway.sign("order_CHEAP", "pay_cheap").unwrap(),
  };
  let err = verifier.verify(pricey.id, &borrowed).await.unwrap_err();
  assert!(matches!(err, OrderError::Adapter(_)));

  let after = machine.load(pricey.id).await.unwrap();
  assert_eq!(after.status, OrderStatus::Initiated);
  assert_eq!(after.payment_ref_id.as_deref(), Some("order_PRICEY"));
}
