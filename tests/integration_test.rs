use quotaguard::{
    config::QuotaConfig,
    error::QuotaError,
    plans::{self, PlanAction, PlanTier, Subscription},
    rate_limit::{rate_limit_response, RateLimitScope, RateLimiterService},
};
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Helper function to create a service over the in-memory store
async fn setup_service() -> RateLimiterService {
    let config = QuotaConfig::from_yaml(
        r#"
store:
  backend: memory
actions:
  export:
    requests: 2
    window_secs: 60
    on_store_error: fail_open
plan_actions:
  ai_message: fail_open
  tool_use: fail_closed
"#,
    )
    .unwrap();

    RateLimiterService::from_config(&config).await.unwrap()
}

#[tokio::test]
async fn test_subscription_tier_drives_ai_message_quota() {
    let service = setup_service().await;
    let mut subscription = Subscription::new("user-100");

    // Free plan: 10 messages per 30 days
    for _ in 0..10 {
        let decision = service
            .check_plan_action(
                &subscription.user_id,
                subscription.effective_tier(),
                PlanAction::AiMessage,
            )
            .await
            .unwrap();
        assert!(decision.allowed);
    }

    let denied = service
        .check_plan_action(
            &subscription.user_id,
            subscription.effective_tier(),
            PlanAction::AiMessage,
        )
        .await
        .unwrap();
    assert!(!denied.allowed);

    // After upgrading, the same counter is judged against the larger limit
    subscription.change_tier(PlanTier::Pro);
    let decision = service
        .check_plan_action(
            &subscription.user_id,
            subscription.effective_tier(),
            PlanAction::AiMessage,
        )
        .await
        .unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.limit, 3000);
    assert_eq!(decision.remaining, 3000 - 11);
}

#[tokio::test]
async fn test_custom_scope_from_config() {
    let service = setup_service().await;
    let scope = RateLimitScope::Custom("export".to_string());

    assert!(service.check_action(&scope, "user:5").await.unwrap().allowed);
    assert!(service.check_action(&scope, "user:5").await.unwrap().allowed);

    let decision = service.check_action(&scope, "user:5").await.unwrap();
    assert!(!decision.allowed);

    let err = decision.into_result(&scope).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_denied_decision_renders_429() {
    let service = setup_service().await;

    for _ in 0..5 {
        service
            .check_action(&RateLimitScope::Signup, "ip:203.0.113.9")
            .await
            .unwrap();
    }
    let decision = service
        .check_action(&RateLimitScope::Signup, "ip:203.0.113.9")
        .await
        .unwrap();
    assert!(!decision.allowed);

    let response = rate_limit_response(&decision);
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .headers()
        .get("Retry-After")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after <= 3600);
}

#[tokio::test]
async fn test_identifiers_and_scopes_are_isolated() {
    let service = setup_service().await;

    for _ in 0..20 {
        service
            .check_action(&RateLimitScope::Refresh, "ip:10.1.1.1")
            .await
            .unwrap();
    }
    assert!(
        !service
            .check_action(&RateLimitScope::Refresh, "ip:10.1.1.1")
            .await
            .unwrap()
            .allowed
    );

    // Other identifier, same scope
    assert!(
        service
            .check_action(&RateLimitScope::Refresh, "ip:10.1.1.2")
            .await
            .unwrap()
            .allowed
    );
    // Same identifier, other scope
    assert!(
        service
            .check_action(&RateLimitScope::Login, "ip:10.1.1.1")
            .await
            .unwrap()
            .allowed
    );
}

#[tokio::test]
async fn test_feature_gate_and_upload_limits() {
    let subscription = Subscription::new("user-200");
    let tier = subscription.effective_tier();

    assert!(plans::require_feature(tier, "pivot_tables").is_ok());

    let err = plans::require_feature(tier, "nonexistent_feature").unwrap_err();
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

    let err = plans::check_file_upload(tier, 12, 1).unwrap_err();
    assert!(matches!(err, QuotaError::FileTooLarge { max_mb: 5, .. }));
}
