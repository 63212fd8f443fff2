use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use parley_api::admin::DEFAULT_AUDIT_PAGE_SIZE;
use parley_api::{ApiError, ChatApi, HttpApi, OutgoingMessage, PageOrder, Session, SessionHandle};
use parley_types::api::{
    AccountStatus, Credentials, ModerationAction, ModerationActionRequest, ReportCategory,
    ReportRequest, ReportStatus,
};
use parley_types::models::{ConversationId, MessageId, Role, UserId};

#[derive(Default)]
struct Recorded {
    token_calls: usize,
    posts: Vec<(String, Value)>,
    queries: Vec<HashMap<String, String>>,
}

type Shared = Arc<Mutex<Recorded>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn chat(id: &str, minute: u32) -> Value {
    json!({
        "_id": id,
        "userId": {"_id": "u2", "role": "user"},
        "alias": "Sari",
        "message": format!("message {id}"),
        "createdAt": format!("2024-05-01T10:{minute:02}:00Z"),
    })
}

fn credentials() -> Credentials {
    Credentials {
        nim: "1301200001".into(),
        password: "secret".into(),
    }
}

async fn login(
    State(_): State<Shared>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    assert_eq!(body["nim"], "1301200001");
    (
        [(header::SET_COOKIE, "refreshToken=r1; Path=/")],
        Json(json!({
            "_id": "u1",
            "token": "t1",
            "alias": "Budi",
            "role": "user",
            "warnCount": 1
        })),
    )
}

async fn refresh(State(state): State<Shared>) -> impl IntoResponse {
    state.lock().unwrap().token_calls += 1;
    Json(json!({"accessToken": "t2"}))
}

async fn refresh_rejected(State(state): State<Shared>) -> impl IntoResponse {
    state.lock().unwrap().token_calls += 1;
    (StatusCode::UNAUTHORIZED, Json(json!({"msg": "no refresh token"})))
}

async fn chat_page(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.lock().unwrap().queries.push(query);
    if bearer(&headers) != "Bearer t2" {
        return (StatusCode::FORBIDDEN, Json(json!({"msg": "token expired"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "chats": [chat("c", 3), chat("b", 2), chat("a", 1)],
            "hasMore": true
        })),
    )
}

#[tokio::test]
async fn forbidden_request_refreshes_once_and_retries() {
    let state = Shared::default();
    let router = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/token", post(refresh))
        .route("/chat", get(chat_page))
        .with_state(state.clone());
    let base = serve(router).await;

    let api = HttpApi::login(&base, &credentials()).await.unwrap();
    assert_eq!(api.session().current().warn_count, 1);

    let page = api.fetch_page(&ConversationId::Public, 1, 20).await.unwrap();

    assert_eq!(page.order, PageOrder::NewestFirst);
    assert!(page.has_more);
    let ids: Vec<_> = page.into_chronological().into_iter().map(|m| m.id.0).collect();
    assert_eq!(ids, ["a", "b", "c"]);

    let recorded = state.lock().unwrap();
    assert_eq!(recorded.token_calls, 1);
    assert_eq!(recorded.queries.len(), 2);
    assert_eq!(recorded.queries[0].get("page").map(String::as_str), Some("1"));
    assert_eq!(recorded.queries[0].get("limit").map(String::as_str), Some("20"));
    drop(recorded);

    assert_eq!(api.session().token(), "t2");
}

#[tokio::test]
async fn failed_refresh_reports_session_expired() {
    let state = Shared::default();
    let router = Router::new()
        .route("/auth/token", post(refresh_rejected))
        .route("/chat", get(chat_page))
        .with_state(state.clone());
    let base = serve(router).await;

    let api = HttpApi::with_session(&base, SessionHandle::new(session("u1", Role::User))).unwrap();
    let err = api
        .fetch_page(&ConversationId::Public, 1, 20)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired));
    assert_eq!(state.lock().unwrap().token_calls, 1);
}

fn session(id: &str, role: Role) -> Session {
    Session {
        user_id: UserId::from(id),
        token: "stale".into(),
        alias: "Budi".into(),
        role,
        warn_count: 0,
        is_muted: false,
        mute_until: None,
        is_banned: false,
    }
}

async fn record_post(state: &Shared, path: &str, body: Value) {
    state.lock().unwrap().posts.push((path.to_string(), body));
}

fn private_reply(to: &str) -> Value {
    json!({
        "_id": "p9",
        "from": {"id": "a1", "role": "admin", "alias": "Admin"},
        "to": {"id": to},
        "message": "hello",
        "createdAt": "2024-05-01T10:00:00Z"
    })
}

#[tokio::test]
async fn private_sends_route_by_thread_owner() {
    let state = Shared::default();
    let router = Router::new()
        .route(
            "/private/send",
            post(|State(s): State<Shared>, Json(body): Json<Value>| async move {
                record_post(&s, "/private/send", body).await;
                Json(private_reply("a1"))
            }),
        )
        .route(
            "/private/reply",
            post(|State(s): State<Shared>, Json(body): Json<Value>| async move {
                record_post(&s, "/private/reply", body).await;
                Json(private_reply("u9"))
            }),
        )
        .with_state(state.clone());
    let base = serve(router).await;

    let user = HttpApi::with_session(&base, SessionHandle::new(session("u1", Role::User))).unwrap();
    let staff = HttpApi::with_session(&base, SessionHandle::new(session("a1", Role::Admin))).unwrap();
    let outgoing = OutgoingMessage {
        body: "hello".into(),
        reply_to: None,
    };

    user.post_message(&ConversationId::Private(UserId::from("u1")), &outgoing)
        .await
        .unwrap();
    let reply = staff
        .post_message(&ConversationId::Private(UserId::from("u9")), &outgoing)
        .await
        .unwrap();
    assert_eq!(reply.recipient, Some(UserId::from("u9")));

    let recorded = state.lock().unwrap();
    assert_eq!(recorded.posts[0], ("/private/send".to_string(), json!({"message": "hello"})));
    assert_eq!(
        recorded.posts[1],
        ("/private/reply".to_string(), json!({"userId": "u9", "message": "hello"}))
    );
}

#[tokio::test]
async fn rejected_send_carries_server_reason() {
    let router = Router::new().route(
        "/chat",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body, json!({"message": "spam", "replyTo": "m1"}));
            (StatusCode::BAD_REQUEST, Json(json!({"msg": "Pesan mengandung kata terlarang"})))
        }),
    );
    let base = serve(router).await;

    let api = HttpApi::with_session(&base, SessionHandle::new(session("u1", Role::User))).unwrap();
    let err = api
        .post_message(
            &ConversationId::Public,
            &OutgoingMessage {
                body: "spam".into(),
                reply_to: Some("m1".into()),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.reason(), Some("Pesan mengandung kata terlarang"));
}

#[tokio::test]
async fn notifications_round_trip() {
    let router = Router::new()
        .route(
            "/notifications",
            get(|| async {
                Json(json!([
                    {"_id": "n1", "message": "Budi mentioned you", "isRead": false,
                     "createdAt": "2024-05-01T10:00:00Z", "link": "/chat"}
                ]))
            }),
        )
        .route(
            "/notifications/read-all",
            patch(|| async { StatusCode::NO_CONTENT }),
        );
    let base = serve(router).await;

    let api = HttpApi::with_session(&base, SessionHandle::new(session("u1", Role::User))).unwrap();
    let list = api.notifications().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].link.as_deref(), Some("/chat"));

    api.mark_all_notifications_read().await.unwrap();
}

#[tokio::test]
async fn staff_moderation_calls() {
    let state = Shared::default();
    let router = Router::new()
        .route(
            "/reports",
            get(|| async {
                Json(json!([{
                    "_id": "r1",
                    "reasonCategory": "spam",
                    "status": "pending",
                    "messageText": "beli followers murah",
                    "reporterId": {"_id": "u1", "alias": "Budi"},
                    "reportedId": {"_id": "u2", "alias": "Sari"},
                    "createdAt": "2024-05-01T10:00:00Z"
                }]))
            }),
        )
        .route(
            "/reports/report",
            post(|State(s): State<Shared>, Json(body): Json<Value>| async move {
                record_post(&s, "/reports/report", body).await;
                StatusCode::CREATED
            }),
        )
        .route(
            "/reports/action",
            post(|State(s): State<Shared>, Json(body): Json<Value>| async move {
                record_post(&s, "/reports/action", body).await;
                Json(json!({"msg": "ok"}))
            }),
        )
        .route(
            "/reports/{id}",
            put(|State(s): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                record_post(&s, &format!("/reports/{id}"), body).await;
                Json(json!({"msg": "ok"}))
            }),
        )
        .route(
            "/admin/chats/{id}",
            delete(|State(s): State<Shared>, Path(id): Path<String>| async move {
                record_post(&s, &format!("/admin/chats/{id}"), Value::Null).await;
                StatusCode::NO_CONTENT
            }),
        )
        .with_state(state.clone());
    let base = serve(router).await;

    let user = HttpApi::with_session(&base, SessionHandle::new(session("u1", Role::User))).unwrap();
    user.submit_report(&ReportRequest {
        message_id: MessageId::from("m5"),
        reported_id: Some(UserId::from("u2")),
        reason_category: ReportCategory::Spam,
        reason: String::new(),
    })
    .await
    .unwrap();

    let staff = HttpApi::with_session(&base, SessionHandle::new(session("a1", Role::Admin))).unwrap();
    let reports = staff.reports().await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, ReportStatus::Pending);
    assert_eq!(reports[0].reported_id.as_ref().unwrap().id, UserId::from("u2"));

    staff
        .take_action(&ModerationActionRequest {
            user_id: UserId::from("u2"),
            action: ModerationAction::Mute,
            report_id: "r1".into(),
        })
        .await
        .unwrap();
    staff
        .update_report_status("r1", ReportStatus::ActionTaken)
        .await
        .unwrap();
    staff.delete_message(&MessageId::from("m5")).await.unwrap();

    let recorded = state.lock().unwrap();
    let posts: Vec<_> = recorded.posts.iter().map(|(path, body)| (path.as_str(), body)).collect();
    assert_eq!(
        posts,
        vec![
            (
                "/reports/report",
                &json!({"messageId": "m5", "reportedId": "u2", "reasonCategory": "spam", "reason": ""})
            ),
            ("/reports/action", &json!({"userId": "u2", "action": "mute", "reportId": "r1"})),
            ("/reports/r1", &json!({"status": "actionTaken"})),
            ("/admin/chats/m5", &Value::Null),
        ]
    );
}

#[tokio::test]
async fn admin_tables_and_user_management() {
    let state = Shared::default();
    let router = Router::new()
        .route(
            "/admin/users",
            get(|State(s): State<Shared>, Query(q): Query<HashMap<String, String>>| async move {
                s.lock().unwrap().queries.push(q);
                Json(json!({
                    "users": [
                        {"_id": "u5", "nim": "1301", "alias": "Rani", "role": "user",
                         "status": "pending", "warnCount": 2}
                    ],
                    "total": 41
                }))
            }),
        )
        .route(
            "/admin/users/{id}/approve",
            patch(|State(s): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                record_post(&s, &format!("/admin/users/{id}/approve"), body).await;
                Json(json!({"msg": "ok"}))
            }),
        )
        .route(
            "/admin/users/{id}/reject",
            patch(|State(s): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                record_post(&s, &format!("/admin/users/{id}/reject"), body).await;
                Json(json!({"msg": "ok"}))
            }),
        )
        .route(
            "/admin/users/{id}/role",
            put(|State(s): State<Shared>, Path(id): Path<String>, Json(body): Json<Value>| async move {
                record_post(&s, &format!("/admin/users/{id}/role"), body).await;
                Json(json!({"msg": "ok"}))
            }),
        )
        .route(
            "/admin/users/{id}",
            delete(|State(s): State<Shared>, Path(id): Path<String>| async move {
                record_post(&s, &format!("/admin/users/{id}"), Value::Null).await;
                StatusCode::NO_CONTENT
            }),
        )
        .route(
            "/admin/chats",
            get(|State(s): State<Shared>, Query(q): Query<HashMap<String, String>>| async move {
                s.lock().unwrap().queries.push(q);
                Json(json!({"chats": [chat("m9", 5)], "total": 3}))
            }),
        )
        .route(
            "/audit-logs",
            get(|State(s): State<Shared>, Query(q): Query<HashMap<String, String>>| async move {
                s.lock().unwrap().queries.push(q);
                Json(json!({
                    "logs": [{
                        "_id": "l1", "action": "BAN_USER", "adminAlias": "Admin",
                        "targetUserAlias": "Sari", "createdAt": "2024-05-01T10:00:00Z"
                    }],
                    "total": 26
                }))
            }),
        )
        .with_state(state.clone());
    let base = serve(router).await;
    let staff = HttpApi::with_session(&base, SessionHandle::new(session("a1", Role::SuperAdmin))).unwrap();

    let users = staff.users(3, 20).await.unwrap();
    assert_eq!(users.items[0].status, Some(AccountStatus::Pending));
    assert_eq!(users.items[0].warn_count, 2);
    assert_eq!((users.page, users.total_pages()), (3, 3));
    assert!(!users.has_next());

    let rani = UserId::from("u5");
    staff.approve_user(&rani).await.unwrap();
    staff.reject_user(&rani).await.unwrap();
    staff.change_role(&rani, Role::Moderator).await.unwrap();
    staff.delete_user(&rani).await.unwrap();

    let chats = staff.admin_chats(1, 20).await.unwrap();
    assert_eq!(chats.items[0].id, MessageId::from("m9"));
    assert_eq!(chats.items[0].author.alias, "Sari");

    let logs = staff.audit_logs(1, DEFAULT_AUDIT_PAGE_SIZE).await.unwrap();
    assert_eq!(logs.items[0].target_user_alias.as_deref(), Some("Sari"));
    assert_eq!(logs.items[0].details, None);
    assert!(logs.has_next());

    let recorded = state.lock().unwrap();
    let pages: Vec<_> = recorded
        .queries
        .iter()
        .map(|q| (q["page"].as_str(), q["limit"].as_str()))
        .collect();
    assert_eq!(pages, [("3", "20"), ("1", "20"), ("1", "25")]);

    let calls: Vec<_> = recorded.posts.iter().map(|(path, body)| (path.as_str(), body)).collect();
    assert_eq!(
        calls,
        vec![
            ("/admin/users/u5/approve", &json!({})),
            ("/admin/users/u5/reject", &json!({})),
            ("/admin/users/u5/role", &json!({"role": "moderator"})),
            ("/admin/users/u5", &Value::Null),
        ]
    );
}

#[tokio::test]
async fn analytics_dashboard() {
    let router = Router::new()
        .route(
            "/analytics/stats",
            get(|| async { Json(json!({"totalUsers": 120, "totalChats": 3400})) }),
        )
        .route(
            "/analytics/activity-by-hour",
            get(|| async { Json(json!({"labels": ["19:00", "20:00"], "data": [12, 30]})) }),
        )
        .route(
            "/analytics/active-users",
            get(|| async { Json(json!([{"alias": "Sari", "count": 88}, {"alias": "Budi", "count": 41}])) }),
        );
    let base = serve(router).await;
    let staff = HttpApi::with_session(&base, SessionHandle::new(session("a1", Role::Admin))).unwrap();

    let stats = staff.chat_stats().await.unwrap();
    assert_eq!((stats.total_users, stats.total_messages), (120, 3400));

    let activity = staff.activity_by_hour().await.unwrap();
    assert_eq!(activity.busiest(), Some(("20:00", 30)));

    let active = staff.active_users().await.unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!((active[0].alias.as_str(), active[0].count), ("Sari", 88));
}
