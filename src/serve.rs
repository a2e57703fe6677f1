use std::sync::Arc;

use anyhow::Result;
use axum::{
  Json, Router, async_trait, debug_handler,
  extract::{FromRequestParts, Path, State},
  http::request::Parts,
  response::IntoResponse,
  routing::{get, post},
  serve as axum_serve,
};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::{
  Governance, GovernanceConfig, ProposalForm, ProposalId, Session, VoteRequest,
  util::{Wrapper, shutdown_signal},
};

/// Header carrying the address of the connected wallet.
///
/// The header is taken on trust: nothing here checks a wallet signature, so
/// any client can act as any account, the admin included. Only expose this
/// service behind a gateway that authenticates the wallet and sets the header,
/// or for local demos.
pub const WALLET_ADDRESS_HEADER: &str = "x-wallet-address";

#[derive(Clone, Parser)]
pub struct ServeArgs {
  /// API Host.
  #[clap(long, env, default_value = "0.0.0.0")]
  pub host: String,
  /// API Port.
  #[clap(long, env, default_value = "8080")]
  pub port: u16,
  /// Governance Args.
  #[command(flatten)]
  pub config: GovernanceConfig,
}

impl ServeArgs {
  pub async fn serve(&self) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let listener = TcpListener::bind(format!("{}:{}", self.host, self.port)).await?;
    tracing::info!("Starting server at http://{}.", listener.local_addr()?);

    let governance = self.config.to_governance().await?;
    axum_serve(listener, router(Arc::new(governance))).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
  }
}

pub fn router(governance: Arc<Governance>) -> Router {
  Router::new()
    .route("/api/info", get(get_info))
    .route("/api/proposals", get(get_proposals).post(create_proposal))
    .route("/api/proposals/active", get(get_active_proposals))
    .route("/api/proposal/:id", get(get_proposal))
    .route("/api/proposal/:id/status", get(get_proposal_status))
    .route("/api/proposal/:id/tally", get(get_proposal_tally))
    .route("/api/proposal/:id/vote/:voter", get(get_user_vote))
    .route("/api/proposal/:id/ratio/:token", get(get_token_ratio))
    .route("/api/proposal/:id/vote", post(cast_vote))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(governance)
}

/// Unverified; see [`WALLET_ADDRESS_HEADER`].
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let address = parts.headers.get(WALLET_ADDRESS_HEADER).and_then(|value| value.to_str().ok());
    Ok(address.map(Session::connected).unwrap_or_default())
  }
}

#[debug_handler]
async fn get_info(ctx: State<Arc<Governance>>) -> impl IntoResponse {
  tracing::info!("get_info");
  Wrapper(ctx.info().await)
}

#[debug_handler]
async fn get_proposals(ctx: State<Arc<Governance>>, session: Session) -> impl IntoResponse {
  tracing::info!("get_proposals");
  Wrapper(ctx.overview(&session).await)
}

#[debug_handler]
async fn get_active_proposals(ctx: State<Arc<Governance>>) -> impl IntoResponse {
  tracing::info!("get_active_proposals");
  Wrapper(ctx.active_proposal_ids().await)
}

#[debug_handler]
async fn get_proposal(ctx: State<Arc<Governance>>, session: Session, Path(id): Path<ProposalId>) -> impl IntoResponse {
  tracing::info!("get_proposal {}", id);
  Wrapper(ctx.proposal_context(&session, id).await)
}

#[debug_handler]
async fn get_proposal_status(ctx: State<Arc<Governance>>, Path(id): Path<ProposalId>) -> impl IntoResponse {
  tracing::info!("get_proposal_status {}", id);
  Wrapper(ctx.proposal_status(id).await)
}

#[debug_handler]
async fn get_proposal_tally(ctx: State<Arc<Governance>>, Path(id): Path<ProposalId>) -> impl IntoResponse {
  tracing::info!("get_proposal_tally {}", id);
  Wrapper(ctx.tally(id).await)
}

#[debug_handler]
async fn get_user_vote(
  ctx: State<Arc<Governance>>,
  Path((id, voter)): Path<(ProposalId, String)>,
) -> impl IntoResponse {
  tracing::info!("get_user_vote {} {}", id, voter);
  Json(ctx.user_vote(Some(&voter), id).await)
}

#[debug_handler]
async fn get_token_ratio(
  ctx: State<Arc<Governance>>,
  Path((id, token)): Path<(ProposalId, String)>,
) -> impl IntoResponse {
  tracing::info!("get_token_ratio {} {}", id, token);
  Wrapper(ctx.token_ratio(id, &token).await)
}

#[debug_handler]
async fn create_proposal(
  ctx: State<Arc<Governance>>,
  session: Session,
  Json(form): Json<ProposalForm>,
) -> impl IntoResponse {
  tracing::info!("create_proposal {:?}", form.title);
  Wrapper(ctx.create_proposal(&session, &form).await)
}

#[debug_handler]
async fn cast_vote(
  ctx: State<Arc<Governance>>,
  session: Session,
  Path(id): Path<ProposalId>,
  Json(request): Json<VoteRequest>,
) -> impl IntoResponse {
  tracing::info!("cast_vote {} {}", id, request.decision);
  Wrapper(ctx.vote(&session, id, request.decision).await)
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt;

  use super::*;
  use crate::{
    LedgerSnapshot, MemoryLedger, Network, StatusSource,
    util::{Caches, Clock},
  };

  #[tokio::test]
  async fn test_get_proposal_context() {
    let router = get_test_router();
    let (status, body) = send(&router, Request::get("/api/proposal/1").header(WALLET_ADDRESS_HEADER, "erd1alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["proposal_status"], "active");
    assert_eq!(body["can_vote"], true);
    assert_eq!(body["users_vote"], Value::Null);
  }

  #[tokio::test]
  async fn test_unknown_proposal_is_not_found() {
    let router = get_test_router();
    let (status, _) = send(&router, Request::get("/api/proposal/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_user_vote_is_null_when_missing() {
    let router = get_test_router();
    let (status, body) = send(&router, Request::get("/api/proposal/42/vote/erd1alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let (_, body) = send(&router, Request::get("/api/proposal/2/vote/erd1bob")).await;
    assert_eq!(body["decision"], "Reject");
  }

  #[tokio::test]
  async fn test_vote_flow() {
    let router = get_test_router();
    let vote = || {
      Request::post("/api/proposal/1/vote").header(WALLET_ADDRESS_HEADER, "erd1alice")
    };

    let (status, _) = send_json(&router, Request::post("/api/proposal/1/vote"), json!({ "decision": "Approve" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&router, vote(), json!({ "decision": "Invalid" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(&router, vote(), json!({ "decision": "Approve" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, _) = send_json(&router, vote(), json!({ "decision": "Approve" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&router, Request::get("/api/proposal/1/tally")).await;
    assert_eq!(body["approve_percentage"], 100.0);
  }

  #[tokio::test]
  async fn test_create_proposal_requires_admin() {
    let router = get_test_router();
    let form = json!({
      "title": "Extend opening hours",
      "start_time": "2030-01-01T10:00",
      "end_time": "2030-01-08T10:00",
      "min_voting_power_percent": 10
    });
    let create = |sender: &str| Request::post("/api/proposals").header(WALLET_ADDRESS_HEADER, sender);

    let (status, _) = send_json(&router, create("erd1alice"), form.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send_json(&router, create("erd1admin"), form).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&router, Request::get("/api/proposal/3/status")).await;
    assert_eq!(body, "pending");
  }

  #[tokio::test]
  async fn test_token_ratio() {
    let router = get_test_router();
    let (status, body) = send(&router, Request::get("/api/proposal/1/ratio/TRO-1a2b3c")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token"], "TRO-1a2b3c");

    let (status, _) = send(&router, Request::get("/api/proposal/42/ratio/TRO-1a2b3c")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_overview_and_info() {
    let router = get_test_router();
    let (status, body) = send(&router, Request::get("/api/proposals")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["past"][0]["proposal_status"], "approved");

    let (_, body) = send(&router, Request::get("/api/proposals/active")).await;
    assert_eq!(body, json!([1]));

    let (_, body) = send(&router, Request::get("/api/info")).await;
    assert_eq!(body["network"], "devnet");
    assert_eq!(body["last_proposal_id"], 2);
    assert_eq!(body["now"], 1500);
  }

  async fn send(router: &Router, request: axum::http::request::Builder) -> (StatusCode, Value) {
    dispatch(router, request.body(Body::empty()).unwrap()).await
  }

  async fn send_json(router: &Router, request: axum::http::request::Builder, body: Value) -> (StatusCode, Value) {
    let request = request.header("content-type", "application/json").body(Body::from(body.to_string())).unwrap();
    dispatch(router, request).await
  }

  async fn dispatch(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  fn get_test_router() -> Router {
    let clock = Clock::fixed(1500);
    let snapshot = LedgerSnapshot::from_slice(
      br#"{
        "admin": "erd1admin",
        "base_token": "TRO-1a2b3c",
        "total_voting_power": "1000",
        "voting_power": { "erd1alice": "700", "erd1bob": "300" },
        "proposals": [
          { "id": 1, "title": "Fund the spring exhibition", "description": "", "creator": "erd1admin",
            "created_at": 100, "start_time": 1000, "end_time": 2000, "min_voting_power_to_validate_vote": "500" },
          { "id": 2, "title": "Lower the minting fee", "description": "", "creator": "erd1admin",
            "created_at": 100, "start_time": 200, "end_time": 300, "min_voting_power_to_validate_vote": "1000",
            "votes": [
              { "voter": "erd1alice", "decision": "Approve", "voting_power": "700", "timestamp": 250 },
              { "voter": "erd1bob", "decision": "Reject", "voting_power": "300", "timestamp": 260 }
            ] }
        ]
      }"#,
    )
    .unwrap();
    router(Arc::new(Governance {
      caches: Caches::build(),
      ledger: Arc::new(MemoryLedger::new(snapshot, clock.clone())),
      network: Network::Devnet,
      chain_id: "D".to_string(),
      contract_address: "erd1qqqqqqqqqqqqqpgq".to_string(),
      admin_address: Some("erd1admin".to_string()),
      status_source: StatusSource::Local,
      clock,
    }))
  }
}
