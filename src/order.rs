//! Order creation against the order-management service
//!
//! The order document is built deterministically from literal test
//! parameters, then submitted over authenticated HTTP. Two entry points
//! exist: the full save/start/get composition, and the single start-process
//! call whose response already carries the order and workflow identifiers.
//! The single-call variant is the one the provisioning pipeline uses.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::TokenProvider;
use crate::error::{PipelineError, PipelineResult};

/// Backend enumeration codes, mirroring the service's protobuf values.
pub mod codes {
    pub const COUNTRY_UNITED_STATES: u32 = 1;
    pub const COUNTRY_MEXICO: u32 = 2;

    pub const CURRENCY_MXN: u32 = 1;
    pub const CURRENCY_USD: u32 = 2;

    pub const ORDER_TYPE_REMITTANCE: u32 = 1;
    pub const CREATION_SOURCE_CHAT: u32 = 1;

    pub const DELIVERY_METHOD_CASH: u32 = 1;
    pub const DELIVERY_METHOD_BANK: u32 = 2;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMethodType {
    #[serde(rename = "BANK")]
    Bank,
    #[serde(rename = "CASH")]
    Cash,
}

impl DeliveryMethodType {
    fn code(self) -> u32 {
        match self {
            DeliveryMethodType::Bank => codes::DELIVERY_METHOD_BANK,
            DeliveryMethodType::Cash => codes::DELIVERY_METHOD_CASH,
        }
    }
}

/// Literal test parameters for one provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreationRequest {
    pub phone_number: String,
    pub phone_country_code: String,
    pub conversation_id: String,
    pub user_id: String,
    pub beneficiary_id: String,
    pub delivery_method_id: String,
    pub origin_amount: f64,
    pub destination_amount: f64,
    pub final_amount: f64,
    pub delivery_method_type: DeliveryMethodType,
    pub fx_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<String>,
}

impl OrderCreationRequest {
    /// The fixed sandbox order every provisioning run submits.
    pub fn sample() -> Self {
        Self {
            phone_number: "5526535283".to_string(),
            phone_country_code: "52".to_string(),
            conversation_id: "8c18e4cb-1ee4-4238-9e6d-4d91e1b1737a".to_string(),
            user_id: "749f7f6e-bb1a-458e-b277-ea116d99fb08".to_string(),
            beneficiary_id: "b59c68b7-34e4-4757-abf2-ce6b631f0f13".to_string(),
            delivery_method_id: "0e6a5d26-2440-4b2a-ad58-c5cee737a3a6".to_string(),
            origin_amount: 60.0,
            destination_amount: 450.0,
            final_amount: 450.0,
            delivery_method_type: DeliveryMethodType::Bank,
            fx_rate: 18.35,
            promotion_id: Some("7c1fa89d-54a1-4283-aeed-c207a01ba2db".to_string()),
        }
    }
}

/// Outcome of a successful creation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub order_id: String,
    pub workflow_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_review_url: Option<String>,
}

/// Protobuf-JSON timestamp: seconds as a decimal string, nanos as a number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: String,
    pub nanos: u32,
}

impl Timestamp {
    fn now() -> Self {
        let now = Utc::now();
        Self {
            seconds: now.timestamp().to_string(),
            nanos: now.timestamp_subsec_nanos(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDocument {
    /// Client-side identifier, assigned before the service ever sees the
    /// order; save failures are reported against it.
    pub id: String,
    pub order_type: u32,
    pub conversation_id: String,
    pub base_customer: BaseCustomer,
    pub base_beneficiary: BaseBeneficiary,
    pub order_information: OrderInformation,
    pub base_delivery_method: BaseDeliveryMethod,
    pub creation_source: u32,
    pub fx_rate: FxRate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_id: Option<String>,
    pub fees: Vec<serde_json::Value>,
    pub promotions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseCustomer {
    pub user_id: String,
    pub phone_number: String,
    pub phone_country_code: String,
    pub origin_country: u32,
    pub created_at: Timestamp,
    pub last_modified_date: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseBeneficiary {
    pub beneficiary_id: String,
    pub beneficiary_country: u32,
    pub created_at: Timestamp,
    pub last_modified_date: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInformation {
    pub origin_amount: f64,
    pub origin_currency: u32,
    pub origin_country: u32,
    pub destination_country: u32,
    pub destination_currency: u32,
    pub destination_amount: f64,
    pub final_amount: f64,
    pub non_promotional_fee: f64,
    pub created_at: Timestamp,
    pub last_modified_date: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDeliveryMethod {
    pub id: String,
    pub delivery_method_type: u32,
    pub created_at: Timestamp,
    pub last_modified_date: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxRate {
    pub remitflow_rate: f64,
    pub order_rate: f64,
    pub origin_currency: u32,
    pub destination_currency: u32,
    pub created_at: Timestamp,
    pub last_modified_date: Timestamp,
}

/// Build the order document the service expects. Pure field mapping: all
/// codes are constants, amounts and identifiers come from the request. The
/// client-side id and the timestamps (stamped once, shared across every
/// sub-message) are the only generated values.
pub fn build_order_document(data: &OrderCreationRequest) -> OrderDocument {
    let now = Timestamp::now();

    OrderDocument {
        id: uuid::Uuid::new_v4().to_string(),
        order_type: codes::ORDER_TYPE_REMITTANCE,
        conversation_id: data.conversation_id.clone(),
        base_customer: BaseCustomer {
            user_id: data.user_id.clone(),
            phone_number: data.phone_number.clone(),
            phone_country_code: data.phone_country_code.clone(),
            origin_country: codes::COUNTRY_MEXICO,
            created_at: now.clone(),
            last_modified_date: now.clone(),
        },
        base_beneficiary: BaseBeneficiary {
            beneficiary_id: data.beneficiary_id.clone(),
            beneficiary_country: codes::COUNTRY_MEXICO,
            created_at: now.clone(),
            last_modified_date: now.clone(),
        },
        order_information: OrderInformation {
            origin_amount: data.origin_amount,
            origin_currency: codes::CURRENCY_USD,
            origin_country: codes::COUNTRY_UNITED_STATES,
            destination_country: codes::COUNTRY_MEXICO,
            destination_currency: codes::CURRENCY_MXN,
            destination_amount: data.destination_amount,
            final_amount: data.final_amount,
            non_promotional_fee: 0.0,
            created_at: now.clone(),
            last_modified_date: now.clone(),
        },
        base_delivery_method: BaseDeliveryMethod {
            id: data.delivery_method_id.clone(),
            delivery_method_type: data.delivery_method_type.code(),
            created_at: now.clone(),
            last_modified_date: now.clone(),
        },
        creation_source: codes::CREATION_SOURCE_CHAT,
        fx_rate: FxRate {
            remitflow_rate: data.fx_rate,
            order_rate: data.fx_rate,
            origin_currency: codes::CURRENCY_USD,
            destination_currency: codes::CURRENCY_MXN,
            created_at: now.clone(),
            last_modified_date: now,
        },
        promotion_id: data.promotion_id.clone(),
        fees: Vec::new(),
        promotions: Vec::new(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderEnvelope<'a> {
    order: &'a OrderDocument,
    service_account: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveResponse {
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    workflow_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetOrderResponse {
    #[serde(default)]
    order: Option<OrderPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderPayload {
    id: String,
    #[serde(default)]
    payment_review_url: Option<String>,
}

/// Authenticated HTTP client for the order-management service.
///
/// No call is retried internally; each is attempted once and its failure
/// propagates to the caller.
pub struct OrderClient {
    http: reqwest::Client,
    base_url: String,
    service_account: String,
    tokens: TokenProvider,
}

impl OrderClient {
    pub fn new(base_url: impl Into<String>, service_account: impl Into<String>, tokens: TokenProvider) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            service_account: service_account.into(),
            tokens,
        }
    }

    /// Bearer token for this client's service URL, cache-checked per call.
    async fn bearer(&self) -> PipelineResult<String> {
        self.tokens.get_authentication_token(&self.base_url).await
    }

    pub async fn save_order(&self, document: &OrderDocument) -> PipelineResult<String> {
        let token = self.bearer().await?;
        let envelope = OrderEnvelope {
            order: document,
            service_account: &self.service_account,
        };

        let response = self
            .http
            .post(format!("{}/v1/orders:save", self.base_url))
            .bearer_auth(&token)
            .json(&envelope)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::OrderSave {
                order_id: document.id.clone(),
                reason: e.to_string(),
            })?;

        let body: SaveResponse = response.json().await?;
        Ok(body.order_id.unwrap_or_default())
    }

    pub async fn start_process(&self, document: &OrderDocument) -> PipelineResult<StartOutcome> {
        let token = self.bearer().await?;
        let envelope = OrderEnvelope {
            order: document,
            service_account: &self.service_account,
        };

        let response = self
            .http
            .post(format!("{}/v1/orders:start", self.base_url))
            .bearer_auth(&token)
            .json(&envelope)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::ProcessStart(e.to_string()))?;

        let body: StartResponse = response.json().await?;
        Ok(StartOutcome {
            order_id: body.order_id,
            workflow_id: body.workflow_id,
        })
    }

    pub async fn get_order(&self, order_id: &str) -> PipelineResult<(String, Option<String>)> {
        let token = self.bearer().await?;

        let response = self
            .http
            .get(format!("{}/v1/orders/{}", self.base_url, order_id))
            .bearer_auth(&token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|_| PipelineError::OrderNotFound(order_id.to_string()))?;

        let body: GetOrderResponse = response.json().await?;
        let order = body
            .order
            .ok_or_else(|| PipelineError::OrderNotFound(order_id.to_string()))?;
        Ok((order.id, order.payment_review_url))
    }

    /// Full three-call composition: save, start, then read the order back.
    pub async fn create_and_start_order(
        &self,
        data: &OrderCreationRequest,
    ) -> PipelineResult<OrderResult> {
        let document = build_order_document(data);

        let saved_id = self.save_order(&document).await?;
        info!("Order saved successfully: {}", saved_id);

        let started = self.start_process(&document).await?;
        let workflow_id = started.workflow_id.unwrap_or_default();
        info!("Process started successfully: {}", workflow_id);

        let (order_id, payment_review_url) = self.get_order(&document.id).await?;

        Ok(OrderResult {
            order_id,
            workflow_id,
            message: "Order created and process started successfully".to_string(),
            payment_review_url,
        })
    }

    /// Single-call variant: one start-process request whose response already
    /// carries the order and workflow identifiers. This is the entry point
    /// the provisioning pipeline uses.
    pub async fn start_order(&self, data: &OrderCreationRequest) -> PipelineResult<OrderResult> {
        let document = build_order_document(data);
        info!(
            "Order document created for startProcess: {}",
            serde_json::to_string(&document)?
        );

        let started = self.start_process(&document).await.map_err(|e| {
            error!("Detailed startProcess error: {}", e);
            e
        })?;

        let order_id = started
            .order_id
            .ok_or_else(|| PipelineError::ProcessStart("response carried no orderId".to_string()))?;
        let workflow_id = started.workflow_id.unwrap_or_default();
        info!(
            "Process started successfully. Order ID: {}, Workflow ID: {}",
            order_id, workflow_id
        );

        Ok(OrderResult {
            order_id,
            workflow_id,
            message: "Order created and process started successfully".to_string(),
            payment_review_url: None,
        })
    }
}

/// Identifiers returned by the start-process call.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub order_id: Option<String>,
    pub workflow_id: Option<String>,
}
