use anyhow::Result;
use axum::{
  extract::Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{ErrorCategory, GovernanceError};

pub struct Wrapper<T>(pub T);

impl<T: Serialize> IntoResponse for Wrapper<Result<T>> {
  fn into_response(self) -> Response {
    match self.0 {
      Ok(v) => Json(v).into_response(),
      Err(e) => {
        let status = status_code(&e);
        if status.is_server_error() {
          tracing::error!("{e:#}");
        }
        (status, format!("{e:#}")).into_response()
      }
    }
  }
}

fn status_code(error: &anyhow::Error) -> StatusCode {
  match error.downcast_ref::<GovernanceError>().map(GovernanceError::category) {
    Some(ErrorCategory::Validation) => StatusCode::BAD_REQUEST,
    Some(ErrorCategory::Authentication) => StatusCode::UNAUTHORIZED,
    Some(ErrorCategory::Authorization) => StatusCode::FORBIDDEN,
    Some(ErrorCategory::NotFound) => StatusCode::NOT_FOUND,
    Some(ErrorCategory::Transaction) => StatusCode::CONFLICT,
    Some(ErrorCategory::Remote) => StatusCode::BAD_GATEWAY,
    None => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

#[cfg(test)]
mod tests {
  use anyhow::anyhow;

  use super::*;

  #[test]
  fn test_status_codes() {
    assert_eq!(status_code(&GovernanceError::EmptyTitle.into()), StatusCode::BAD_REQUEST);
    assert_eq!(status_code(&GovernanceError::NotAuthenticated.into()), StatusCode::UNAUTHORIZED);
    assert_eq!(status_code(&GovernanceError::ProposalNotFound(9).into()), StatusCode::NOT_FOUND);
    assert_eq!(
      status_code(&GovernanceError::AlreadyVoted { voter: "erd1alice".to_string(), id: 1 }.into()),
      StatusCode::CONFLICT
    );
    assert_eq!(status_code(&anyhow!("connection refused")), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn test_context_keeps_category() {
    let error = anyhow::Error::from(GovernanceError::Unauthorized("erd1bob".to_string())).context("creating proposal");
    assert_eq!(status_code(&error), StatusCode::FORBIDDEN);
  }
}
