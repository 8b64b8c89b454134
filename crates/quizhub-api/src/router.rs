use axum::{
    Json, Router, middleware,
    routing::{delete, get, post},
};

use quizhub_types::api::HealthResponse;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, friends, generator, notifications, quizzes, scores, subscription};

/// Every HTTP route. CORS and tracing layers are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/subscription/webhook", post(subscription::webhook));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        // Friends
        .route("/friends/search", get(friends::search))
        .route("/friends/list", get(friends::list_friends))
        .route("/friends/pending", get(friends::list_pending))
        .route("/friends/outgoing", get(friends::list_outgoing))
        .route("/friends/request", post(friends::send_request))
        .route("/friends/{friendship_id}/respond", post(friends::respond))
        .route("/friends/{friendship_id}", delete(friends::remove))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{notification_id}/read", post(notifications::mark_read))
        // Generation
        .route("/generate/quiz", post(generator::generate_quiz))
        .route("/generate/remaining", get(generator::remaining))
        .route("/generate/limits", get(generator::limits))
        // Quizzes
        .route("/quizzes", get(quizzes::browse).post(quizzes::create))
        .route("/quizzes/count", get(quizzes::count))
        .route("/quizzes/mine", get(quizzes::mine))
        .route("/quizzes/validate", post(quizzes::validate_draft))
        .route("/quizzes/templates", get(quizzes::templates))
        .route(
            "/quizzes/{quiz_id}",
            get(quizzes::get_quiz).put(quizzes::update).delete(quizzes::delete),
        )
        .route("/quizzes/{quiz_id}/duplicate", post(quizzes::duplicate))
        // Scores
        .route("/scores/{quiz_id}", get(scores::mine).post(scores::submit))
        .route("/scores/{quiz_id}/leaderboard", get(scores::leaderboard))
        .route("/scores/{quiz_id}/leaderboard/friends", get(scores::friends_leaderboard))
        .route("/scores/{quiz_id}/attempts", get(scores::attempts))
        // Subscription
        .route("/subscription/status", get(subscription::status))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use quizhub_core::Services;
    use quizhub_core::subscription::PlanLimits;
    use quizhub_db::Database;
    use quizhub_types::models::Question;

    use super::*;
    use crate::llm::{LlmError, QuizGenerator};
    use crate::state::AppStateInner;

    const BILLING_SECRET: &str = "whsec_test";

    struct FakeGenerator {
        fail: bool,
    }

    #[async_trait]
    impl QuizGenerator for FakeGenerator {
        async fn generate(&self, topic: &str, _difficulty: &str, _language: &str) -> Result<Vec<Question>, LlmError> {
            if self.fail {
                return Err(LlmError::Malformed("model refused".into()));
            }
            Ok(vec![Question {
                question: format!("What is {topic}?"),
                options: vec!["A thing".into(), "Another thing".into()],
                answer: "A thing".into(),
            }])
        }
    }

    fn app_with(generator: Option<Arc<dyn QuizGenerator>>) -> Router {
        build_app(generator, false)
    }

    fn build_app(generator: Option<Arc<dyn QuizGenerator>>, expose_reset_tokens: bool) -> Router {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let limits = PlanLimits {
            free_daily: 2,
            premium_daily: 3,
        };
        let state = Arc::new(AppStateInner {
            services: Services::new(db, limits),
            jwt_secret: "router-test-secret".into(),
            token_ttl: Duration::minutes(60),
            generator,
            billing_secret: Some(BILLING_SECRET.into()),
            expose_reset_tokens,
        });
        build_router(state)
    }

    fn app() -> Router {
        app_with(Some(Arc::new(FakeGenerator { fail: false })))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        send(app, req).await
    }

    async fn register(app: &Router, name: &str) -> (i64, String) {
        let (status, body) = call(
            app,
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "username": name,
                "email": format!("{name}@example.com"),
                "password": "hunter2hunter2",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (body["user_id"].as_i64().unwrap(), body["token"].as_str().unwrap().to_string())
    }

    fn quiz_body(title: &str, is_public: bool, is_premium: bool) -> Value {
        json!({
            "title": title,
            "language": "en",
            "difficulty": "easy",
            "questions": [{ "question": "2 + 2?", "options": ["3", "4"], "answer": "4" }],
            "is_public": is_public,
            "is_premium": is_premium,
        })
    }

    async fn webhook(app: &Router, event: Value, signature: Option<String>) -> StatusCode {
        let raw = event.to_string();
        let mut builder = Request::builder()
            .method("POST")
            .uri("/subscription/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header("X-Billing-Signature", sig);
        }
        send(app, builder.body(Body::from(raw)).unwrap()).await.0
    }

    fn signed(event: &Value) -> Option<String> {
        Some(subscription::sign(BILLING_SECRET, event.to_string().as_bytes()))
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let (status, body) = call(&app(), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_valid_token() {
        let app = app();
        let (status, body) = call(&app, "GET", "/friends/list", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let (status, _) = call(&app, "GET", "/auth/me", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let app = app();
        let (id, token) = register(&app, "alice").await;

        let (status, me) = call(&app, "GET", "/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["id"], id);
        assert_eq!(me["subscription_type"], "free");

        let (status, body) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "ALICE@example.com", "password": "hunter2hunter2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], id);

        let (status, body) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_credentials");

        let (status, body) = call(
            &app,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "alice2", "email": "alice@example.com", "password": "hunter2hunter2" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "email_taken");
    }

    async fn forgot(app: &Router, email: &str) -> (StatusCode, Value) {
        call(app, "POST", "/auth/forgot-password", None, Some(json!({ "email": email }))).await
    }

    #[tokio::test]
    async fn test_forgot_password_never_leaks_token_by_default() {
        let app = app();
        register(&app, "victim").await;

        let (status, known) = forgot(&app, "victim@example.com").await;
        assert_eq!(status, StatusCode::OK);
        let (status, unknown) = forgot(&app, "nobody@example.com").await;
        assert_eq!(status, StatusCode::OK);

        // identical bodies, so the caller learns nothing
        assert_eq!(known, unknown);
        assert_eq!(known.as_object().unwrap().keys().collect::<Vec<_>>(), vec!["message"]);

        let (status, _) = call(
            &app,
            "POST",
            "/auth/reset-password",
            None,
            Some(json!({ "token": "guessed", "password": "attacker-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "victim@example.com", "password": "attacker-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_password_reset_with_exposed_tokens() {
        let app = build_app(Some(Arc::new(FakeGenerator { fail: false })), true);
        register(&app, "forgetful").await;

        let (_, unknown) = forgot(&app, "nobody@example.com").await;
        assert!(unknown.get("reset_token").is_none());

        let (_, known) = forgot(&app, "forgetful@example.com").await;
        assert_eq!(known["message"], unknown["message"]);
        let token = known["reset_token"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            "POST",
            "/auth/reset-password",
            None,
            Some(json!({ "token": token, "password": "brand-new-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(
            &app,
            "POST",
            "/auth/reset-password",
            None,
            Some(json!({ "token": token, "password": "yet-another-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_reset_token");

        let (status, _) = call(
            &app,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "forgetful@example.com", "password": "brand-new-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_friend_request_flow_with_notifications() {
        let app = app();
        let (alice, alice_token) = register(&app, "alice").await;
        let (bob, bob_token) = register(&app, "bob").await;

        let (status, found) = call(&app, "GET", "/friends/search?query=bo", Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found[0]["id"], bob);

        let (status, fs) = call(
            &app,
            "POST",
            "/friends/request",
            Some(&alice_token),
            Some(json!({ "addressee_id": bob })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(fs["status"], "pending");
        let fid = fs["id"].as_i64().unwrap();

        let (status, body) = call(
            &app,
            "POST",
            "/friends/request",
            Some(&alice_token),
            Some(json!({ "addressee_id": alice })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "self_request");

        let (_, pending) = call(&app, "GET", "/friends/pending", Some(&bob_token), None).await;
        assert_eq!(pending[0]["requester_user"]["username"], "alice");
        let (_, outgoing) = call(&app, "GET", "/friends/outgoing", Some(&alice_token), None).await;
        assert_eq!(outgoing[0]["addressee_user"]["id"], bob);

        let (_, unread) = call(&app, "GET", "/notifications/unread", Some(&bob_token), None).await;
        assert_eq!(unread["unread"], 1);

        // only the addressee may answer
        let (status, body) = call(
            &app,
            "POST",
            &format!("/friends/{fid}/respond"),
            Some(&alice_token),
            Some(json!({ "status": "accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "not_addressee");

        let (status, fs) = call(
            &app,
            "POST",
            &format!("/friends/{fid}/respond"),
            Some(&bob_token),
            Some(json!({ "status": "accepted" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fs["status"], "accepted");

        let (_, list) = call(&app, "GET", "/friends/list", Some(&alice_token), None).await;
        assert_eq!(list[0]["friend_user"]["id"], bob);

        let (_, notes) = call(&app, "GET", "/notifications?limit=5", Some(&alice_token), None).await;
        assert_eq!(notes[0]["type"], "friend_accepted");
        assert_eq!(notes[0]["data"]["by_username"], "bob");
        let nid = notes[0]["id"].as_i64().unwrap();

        // someone else's notification looks missing
        let (status, _) = call(&app, "POST", &format!("/notifications/{nid}/read"), Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, note) = call(&app, "POST", &format!("/notifications/{nid}/read"), Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(note["is_read"], true);

        let (_, all) = call(&app, "POST", "/notifications/read-all", Some(&bob_token), None).await;
        assert_eq!(all["updated"], 1);

        let (status, _) = call(&app, "DELETE", &format!("/friends/{fid}"), Some(&bob_token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, list) = call(&app, "GET", "/friends/list", Some(&alice_token), None).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_generation_quota_for_free_user() {
        let app = app();
        let (_, token) = register(&app, "gen").await;
        let req = json!({ "topic": "Volcanoes", "difficulty": "easy", "language": "en" });

        for _ in 0..2 {
            let (status, quiz) = call(&app, "POST", "/generate/quiz", Some(&token), Some(req.clone())).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(quiz["title"], "Volcanoes Quiz");
        }

        let (status, body) = call(&app, "POST", "/generate/quiz", Some(&token), Some(req)).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"], "quota_exceeded");

        let (_, usage) = call(&app, "GET", "/generate/remaining", Some(&token), None).await;
        assert_eq!(usage["used"], 2);
        assert_eq!(usage["remaining"], 0);
        assert_eq!(usage["can_generate"], false);

        let (_, mine) = call(&app, "GET", "/quizzes/mine", Some(&token), None).await;
        assert_eq!(mine.as_array().unwrap().len(), 2);
        assert_eq!(mine[0]["is_public"], false);
    }

    #[tokio::test]
    async fn test_failed_generation_consumes_no_quota() {
        let app = app_with(Some(Arc::new(FakeGenerator { fail: true })));
        let (_, token) = register(&app, "unlucky").await;

        let (status, body) = call(
            &app,
            "POST",
            "/generate/quiz",
            Some(&token),
            Some(json!({ "topic": "Rust", "difficulty": "hard", "language": "en" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "upstream");

        let (_, usage) = call(&app, "GET", "/generate/remaining", Some(&token), None).await;
        assert_eq!(usage["used"], 0);
    }

    #[tokio::test]
    async fn test_generation_unavailable_without_generator() {
        let app = app_with(None);
        let (_, token) = register(&app, "nokey").await;
        let (status, _) = call(
            &app,
            "POST",
            "/generate/quiz",
            Some(&token),
            Some(json!({ "topic": "Rust", "difficulty": "hard", "language": "en" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_webhook_upgrades_and_unlocks_premium_quiz() {
        let app = app();
        let (_, author_token) = register(&app, "author").await;
        let (reader, reader_token) = register(&app, "reader").await;

        let (status, quiz) = call(
            &app,
            "POST",
            "/quizzes",
            Some(&author_token),
            Some(quiz_body("Gold", true, true)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/quizzes/{}", quiz["id"]);

        let (status, body) = call(&app, "GET", &uri, Some(&reader_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "premium_required");

        let event = json!({
            "type": "checkout_completed",
            "data": {
                "user_id": reader,
                "customer_id": "cus_reader",
                "subscription_id": "sub_reader",
                "current_period_end": "2099-01-01T00:00:00Z",
            }
        });
        assert_eq!(webhook(&app, event.clone(), None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            webhook(&app, event.clone(), Some("00".repeat(32))).await,
            StatusCode::UNAUTHORIZED
        );
        let sig = signed(&event);
        assert_eq!(webhook(&app, event, sig).await, StatusCode::OK);

        let (_, status_body) = call(&app, "GET", "/subscription/status", Some(&reader_token), None).await;
        assert_eq!(status_body["subscription_type"], "premium");
        assert_eq!(status_body["is_active"], true);

        let (_, limits) = call(&app, "GET", "/generate/limits", Some(&reader_token), None).await;
        assert_eq!(limits["is_premium"], true);
        assert_eq!(limits["daily_generation_limit"], 3);

        let (status, _) = call(&app, "GET", &uri, Some(&reader_token), None).await;
        assert_eq!(status, StatusCode::OK);

        // unknown customers are acknowledged
        let ghost = json!({ "type": "subscription_deleted", "data": { "customer_id": "cus_ghost" } });
        let sig = signed(&ghost);
        assert_eq!(webhook(&app, ghost, sig).await, StatusCode::OK);

        let cancel = json!({ "type": "subscription_deleted", "data": { "customer_id": "cus_reader" } });
        let sig = signed(&cancel);
        assert_eq!(webhook(&app, cancel, sig).await, StatusCode::OK);
        let (status, _) = call(&app, "GET", &uri, Some(&reader_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_quiz_crud_and_scores() {
        let app = app();
        let (_, owner) = register(&app, "owner").await;
        let (player_id, player) = register(&app, "player").await;

        let (status, check) = call(
            &app,
            "POST",
            "/quizzes/validate",
            Some(&owner),
            Some(json!({ "title": "", "language": "en", "difficulty": "easy", "questions": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(check["valid"], false);
        assert_eq!(check["errors"].as_array().unwrap().len(), 2);

        let (status, templates) = call(&app, "GET", "/quizzes/templates", Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(templates[0]["id"], "general-knowledge");
        let (status, from_template) = call(
            &app,
            "POST",
            "/quizzes/validate",
            Some(&owner),
            Some(templates[1].clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(from_template["valid"], true);

        let (_, public) = call(&app, "POST", "/quizzes", Some(&owner), Some(quiz_body("Maths", true, false))).await;
        let (_, private) = call(&app, "POST", "/quizzes", Some(&owner), Some(quiz_body("Notes", false, false))).await;
        let public_id = public["id"].as_i64().unwrap();

        let (status, _) = call(&app, "GET", &format!("/quizzes/{}", private["id"]), Some(&player), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            "PUT",
            &format!("/quizzes/{public_id}"),
            Some(&player),
            Some(json!({ "title": "Hijacked" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, updated) = call(
            &app,
            "PUT",
            &format!("/quizzes/{public_id}"),
            Some(&owner),
            Some(json!({ "title": "Algebra" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Algebra");

        let (_, listed) = call(&app, "GET", "/quizzes", Some(&player), None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        let (_, count) = call(&app, "GET", "/quizzes/count", Some(&player), None).await;
        assert_eq!(count["count"], 1);

        let (status, copy) = call(&app, "POST", &format!("/quizzes/{public_id}/duplicate"), Some(&player), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(copy["title"], "Algebra (Copy)");

        let (status, body) = call(
            &app,
            "POST",
            &format!("/scores/{public_id}"),
            Some(&player),
            Some(json!({ "score": 3, "max_score": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");

        for score in [1, 2] {
            let (status, _) = call(
                &app,
                "POST",
                &format!("/scores/{public_id}"),
                Some(&player),
                Some(json!({ "score": score, "max_score": 2, "answers": { "1": "4" } })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, board) = call(&app, "GET", &format!("/scores/{public_id}/leaderboard"), Some(&owner), None).await;
        assert_eq!(board[0]["user_id"], player_id);
        assert_eq!(board[0]["score"], 2);
        assert_eq!(board[0]["rank"], 1);

        let (_, friends_board) = call(
            &app,
            "GET",
            &format!("/scores/{public_id}/leaderboard/friends"),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(friends_board, json!([]));

        let (_, attempts) = call(&app, "GET", &format!("/scores/{public_id}/attempts"), Some(&owner), None).await;
        assert_eq!(attempts["attempts"], 2);

        let (_, mine) = call(&app, "GET", &format!("/scores/{public_id}"), Some(&player), None).await;
        assert_eq!(mine[0]["score"], 2);

        let (status, _) = call(&app, "DELETE", &format!("/quizzes/{public_id}"), Some(&owner), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, "GET", &format!("/quizzes/{public_id}"), Some(&owner), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
