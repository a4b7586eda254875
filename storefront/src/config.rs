// storefront/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use thali_orders::checkout::{DEFAULT_CASH_CONFIRM_DELAY, DEFAULT_DELIVERY_FEE_PAISE};
use thali_orders::gateway::phonepe::PhonePeConfig;
use thali_orders::gateway::razorpay::RazorpayConfig;
use thali_orders::gateway::stripe::StripeConfig;
use thali_orders::tracking::DEFAULT_POLL_INTERVAL;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  /// Where this API is reachable; approval links point here.
  pub app_base_url: String,
  /// Customer-facing site; gateways send the customer back to its order pages.
  pub public_site_url: String,

  pub owner_email: Option<String>,
  pub notify_sender: String,
  pub approval_secret: String,

  pub delivery_fee_paise: i64,
  pub cash_confirm_delay: Duration,
  pub poll_interval: Duration,

  pub upi_payee_vpa: String,
  pub upi_payee_name: String,
  pub owner_qr_image_url: Option<String>,

  pub phonepe: Option<PhonePeConfig>,
  pub stripe: Option<StripeConfig>,
  pub razorpay: Option<RazorpayConfig>,

  pub run_migrations: bool,
  pub seed_db: bool,
}

fn optional(var_name: &str) -> Option<String> {
  env::var(var_name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T>(var_name: &str, default: T) -> Result<T>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  match optional(var_name) {
    Some(raw) => raw
      .parse::<T>()
      .map_err(|e| AppError::Config(format!("Invalid {} value '{}': {}", var_name, raw, e))),
    None => Ok(default),
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let server_host = optional("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let server_port = parsed("SERVER_PORT", 8080u16)?;
    let database_url = optional("DATABASE_URL")
      .ok_or_else(|| AppError::Config("Missing environment variable 'DATABASE_URL'".to_string()))?;
    let app_base_url = optional("APP_BASE_URL").unwrap_or_else(|| format!("http://{}:{}", server_host, server_port));
    let public_site_url = optional("PUBLIC_SITE_URL").unwrap_or_else(|| app_base_url.clone());

    let approval_secret = match optional("APPROVAL_SECRET") {
      Some(secret) => secret,
      None => {
        tracing::warn!("APPROVAL_SECRET is not set; approval links are signed with a development secret.");
        "dev-approval-secret".to_string()
      }
    };

    let phonepe = match (
      optional("PHONEPE_MERCHANT_ID"),
      optional("PHONEPE_SALT_KEY"),
    ) {
      (Some(merchant_id), Some(salt_key)) => Some(PhonePeConfig {
        merchant_id,
        salt_key,
        salt_index: optional("PHONEPE_SALT_INDEX").unwrap_or_else(|| "1".to_string()),
        base_url: optional("PHONEPE_BASE_URL").unwrap_or_else(|| PhonePeConfig::PRODUCTION_BASE_URL.to_string()),
      }),
      _ => None,
    };

    let stripe = optional("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig {
      secret_key,
      base_url: optional("STRIPE_BASE_URL").unwrap_or_else(|| StripeConfig::API_BASE_URL.to_string()),
    });

    let razorpay = match (optional("RAZORPAY_KEY_ID"), optional("RAZORPAY_KEY_SECRET")) {
      (Some(key_id), Some(key_secret)) => Some(RazorpayConfig {
        key_id,
        key_secret,
        merchant_name: optional("RAZORPAY_MERCHANT_NAME").unwrap_or_else(|| "Thali House".to_string()),
        base_url: optional("RAZORPAY_BASE_URL").unwrap_or_else(|| RazorpayConfig::API_BASE_URL.to_string()),
      }),
      _ => None,
    };

    let config = Self {
      server_host,
      server_port,
      database_url,
      app_base_url,
      public_site_url,
      owner_email: optional("OWNER_EMAIL"),
      notify_sender: optional("NOTIFY_SENDER").unwrap_or_else(|| "orders@thali.local".to_string()),
      approval_secret,
      delivery_fee_paise: parsed("DELIVERY_FEE_PAISE", DEFAULT_DELIVERY_FEE_PAISE)?,
      cash_confirm_delay: Duration::from_millis(parsed(
        "CASH_CONFIRM_DELAY_MS",
        DEFAULT_CASH_CONFIRM_DELAY.as_millis() as u64,
      )?),
      poll_interval: Duration::from_secs(parsed("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL.as_secs())?),
      upi_payee_vpa: optional("UPI_PAYEE_VPA").unwrap_or_default(),
      upi_payee_name: optional("UPI_PAYEE_NAME").unwrap_or_else(|| "Thali House".to_string()),
      owner_qr_image_url: optional("OWNER_QR_IMAGE_URL"),
      phonepe,
      stripe,
      razorpay,
      run_migrations: parsed("RUN_MIGRATIONS", false)?,
      seed_db: parsed("SEED_DB", false)?,
    };

    if config.owner_email.is_none() {
      tracing::warn!("OWNER_EMAIL is not set; manual payments will not reach the owner.");
    }
    if config.upi_payee_vpa.is_empty() {
      tracing::warn!("UPI_PAYEE_VPA is not set; QR payments will carry an empty payee.");
    }
    tracing::info!(
      phonepe = config.phonepe.is_some(),
      stripe = config.stripe.is_some(),
      razorpay = config.razorpay.is_some(),
      "Application configuration loaded successfully."
    );
    Ok(config)
  }
}
