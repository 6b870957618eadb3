use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use storefront_gateway::{
    AppConfig, AppState, InMemoryDirectory, NotificationBridge, create_router,
    directory::{Employee, hash_password},
    roles::Role,
    routes::RouteGroups,
};
use tokio::{net::TcpListener, time::timeout};
use uuid::Uuid;

const PASSWORD: &str = "s3cure-enough";

pub struct TestApp {
    pub address: String,
    pub admin: Employee,
    pub cashier: Employee,
}

fn staff(name: &str, role: Role, password_hash: &str) -> Employee {
    Employee {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@storefront.test", name.to_lowercase()),
        role,
        password_hash: password_hash.to_string(),
        active: true,
    }
}

async fn spawn_app() -> TestApp {
    let password_hash = hash_password(PASSWORD).expect("hashing works");
    let admin = staff("Ada", Role::Admin, &password_hash);
    let cashier = staff("Cal", Role::Cashier, &password_hash);

    let directory = InMemoryDirectory::with_employees([admin.clone(), cashier.clone()]);
    let state = AppState {
        directory: Arc::new(directory),
        notifier: NotificationBridge::bound(16),
        config: AppConfig::default(),
    };
    let router = create_router(state, RouteGroups::default()).expect("valid route table");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        admin,
        cashier,
    }
}

async fn login(client: &reqwest::Client, app: &TestApp, email: &str) -> String {
    let response = client
        .post(format!("{}/api/employee/login", app.address))
        .json(&json!({ "email": email, "password": PASSWORD }))
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_welcome_and_not_found_over_the_wire() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let welcome = client.get(&app.address).send().await.expect("req fail");
    assert_eq!(welcome.text().await.unwrap(), "Welcome to the E-Commerce Backend!");

    let missing = client
        .delete(format!("{}/api/product/1", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(missing.status(), 404);
    assert!(missing.headers().contains_key("x-request-id"));
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Route not found" }));
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // 1. Anonymous access to a protected route
    let anonymous = client
        .get(format!("{}/api/employee/me", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(anonymous.status(), 401);

    // 2. Login and read own profile
    let token = login(&client, &app, &app.cashier.email).await;
    let me: Value = client
        .get(format!("{}/api/employee/me", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(me["id"], json!(app.cashier.id));
    assert_eq!(me["role"], "cashier");

    // 3. Same token on the admin tier
    let forbidden = client
        .get(format!("{}/api/admin/employees", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("req fail");
    assert_eq!(forbidden.status(), 403);
}

#[tokio::test]
async fn test_local_bypass_header() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/admin/employees", app.address))
        .header("x-user-id", app.admin.id.to_string())
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), 200);
    let employees: Vec<Value> = response.json().await.unwrap();
    assert_eq!(employees.len(), 2);
}

#[tokio::test]
async fn test_admin_broadcast_reaches_event_stream() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // Headers arrive once the handler has subscribed.
    let mut stream = client
        .get(format!("{}/api/events", app.address))
        .send()
        .await
        .expect("req fail");
    assert_eq!(stream.status(), 200);

    let token = login(&client, &app, &app.admin.email).await;
    let receipt: Value = client
        .post(format!("{}/api/admin/notifications", app.address))
        .bearer_auth(&token)
        .json(&json!({ "name": "store.announcement", "payload": { "text": "closing early" } }))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .unwrap();
    assert_eq!(receipt["delivered_to"], 1);

    // The login itself was announced first.
    let mut received = String::new();
    while !received.contains("event: store.announcement") {
        let chunk = timeout(Duration::from_secs(5), stream.chunk())
            .await
            .expect("event arrives in time")
            .expect("stream stays open")
            .expect("stream not closed");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }

    assert!(received.contains("event: employee.logged_in"));
    assert!(received.contains(r#"data: {"text":"closing early"}"#));
}
