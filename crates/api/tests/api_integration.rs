//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::auth::JwtIdentityProvider;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use common::{BookId, Identity, Money, UserId};
use domain::Book;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::{CommerceStoreExt, InMemoryStore};
use tower::ServiceExt;
use workflow::{NotificationDispatcher, RecordingNotifier};

const SECRET: &str = "api-test-secret";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: Router,
    store: InMemoryStore,
    notifier: RecordingNotifier,
    tokens: JwtIdentityProvider,
    customer: String,
    customer_id: UserId,
    admin: String,
}

impl TestApp {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let notifier = RecordingNotifier::new();
        let (dispatcher, _task) = NotificationDispatcher::spawn(notifier.clone(), 64);
        let state = api::create_state(
            store.clone(),
            Arc::new(JwtIdentityProvider::new(SECRET)),
            dispatcher,
        );
        let app = api::create_app(state, get_metrics_handle(), 1024 * 1024);

        let tokens = JwtIdentityProvider::new(SECRET);
        let customer_id = UserId::new();
        let customer = tokens
            .issue(&Identity::customer(customer_id), Duration::minutes(10))
            .unwrap();
        let admin = tokens
            .issue(&Identity::admin(UserId::new()), Duration::minutes(10))
            .unwrap();

        Self {
            app,
            store,
            notifier,
            tokens,
            customer,
            customer_id,
            admin,
        }
    }

    fn token_for_new_customer(&self) -> String {
        self.tokens
            .issue(&Identity::customer(UserId::new()), Duration::minutes(10))
            .unwrap()
    }

    async fn book(&self, title: &str, cents: i64, stock: u32) -> BookId {
        let book = Book::new(title, "Author", Money::from_cents(cents), stock);
        let id = book.id;
        self.store.insert_book(book).await;
        id
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn add_to_cart(&self, token: &str, book_id: BookId, quantity: i64) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/cart",
            Some(token),
            Some(json!({ "book_id": book_id, "quantity": quantity })),
        )
        .await
    }

    async fn checkout(&self, token: &str, method: &str) -> (StatusCode, Value) {
        let mut form = checkout_form();
        form["payment_method"] = json!(method);
        if method == "screenshot" {
            form["payment_screenshot"] = json!("data:image/png;base64,iVBORw0KGgo=");
        }
        self.send("POST", "/checkout", Some(token), Some(form)).await
    }

    async fn stock(&self, book_id: BookId) -> u32 {
        self.store.stock_of(book_id).await.unwrap().unwrap()
    }
}

fn checkout_form() -> Value {
    json!({
        "full_name": "Ada Lovelace",
        "email": "ada@example.com",
        "phone_number": "555-0100",
        "shipping_address": "12 Analytical Row",
        "city": "London",
        "zip_code": "N1"
    })
}

#[tokio::test]
async fn test_health_check() {
    let t = TestApp::new();
    let (status, json) = t.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let t = TestApp::new();
    let (status, json) = t.send("GET", "/cart", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Access denied. No token provided.");
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_unauthorized() {
    let t = TestApp::new();
    let forged = JwtIdentityProvider::new("someone-else")
        .issue(&Identity::admin(UserId::new()), Duration::minutes(5))
        .unwrap();

    let (status, _) = t.send("GET", "/admin/orders", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_then_list_cart() {
    let t = TestApp::new();
    let book = t.book("Dune", 1250, 5).await;

    let (status, json) = t.add_to_cart(&t.customer, book, 3).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["action"], "added");
    assert_eq!(json["message"], "\"Dune\" added to cart");

    let (status, json) = t.add_to_cart(&t.customer, book, 1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["action"], "updated");

    let (status, json) = t.send("GET", "/cart", Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    let lines = json["data"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 4);
    assert_eq!(lines[0]["price"], "12.50");
    assert_eq!(lines[0]["item_total"], "50.00");
    assert_eq!(json["total"], "50.00");
}

#[tokio::test]
async fn test_add_defaults_quantity_to_one() {
    let t = TestApp::new();
    let book = t.book("Emma", 800, 2).await;

    let (status, json) = t
        .send(
            "POST",
            "/cart",
            Some(&t.customer),
            Some(json!({ "book_id": book })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["quantity"], 1);
}

#[tokio::test]
async fn test_add_requires_book_id() {
    let t = TestApp::new();
    let (status, json) = t
        .send("POST", "/cart", Some(&t.customer), Some(json!({ "quantity": 1 })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Book ID is required");
}

#[tokio::test]
async fn test_add_unknown_book_is_not_found() {
    let t = TestApp::new();
    let (status, _) = t.add_to_cart(&t.customer, BookId::new(), 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_add_beyond_stock_is_rejected() {
    let t = TestApp::new();
    let book = t.book("Scarce", 1000, 1).await;

    let (status, json) = t.add_to_cart(&t.customer, book, 2).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Insufficient stock");
}

#[tokio::test]
async fn test_update_quantity_requires_positive_value() {
    let t = TestApp::new();
    let book = t.book("Dune", 1250, 5).await;
    let (_, json) = t.add_to_cart(&t.customer, book, 1).await;
    let item_id = json["data"]["id"].as_str().unwrap().to_string();

    let (status, json) = t
        .send(
            "PUT",
            &format!("/cart/{item_id}"),
            Some(&t.customer),
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Valid quantity required (minimum 1)");

    let (status, json) = t
        .send(
            "PUT",
            &format!("/cart/{item_id}"),
            Some(&t.customer),
            Some(json!({ "quantity": 4 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["quantity"], 4);
}

#[tokio::test]
async fn test_remove_twice_is_not_found() {
    let t = TestApp::new();
    let book = t.book("Dune", 1250, 5).await;
    let (_, json) = t.add_to_cart(&t.customer, book, 1).await;
    let uri = format!("/cart/{}", json["data"]["id"].as_str().unwrap());

    let (status, json) = t.send("DELETE", &uri, Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Item removed from cart");

    let (status, json) = t.send("DELETE", &uri, Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_clear_cart_reports_removed_rows() {
    let t = TestApp::new();
    let a = t.book("A", 100, 5).await;
    let b = t.book("B", 200, 5).await;
    t.add_to_cart(&t.customer, a, 1).await;
    t.add_to_cart(&t.customer, b, 2).await;

    let (status, json) = t.send("DELETE", "/cart", Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);

    let (_, json) = t.send("GET", "/cart", Some(&t.customer), None).await;
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_cart_item_id_is_bad_request() {
    let t = TestApp::new();
    let (status, json) = t
        .send("DELETE", "/cart/not-a-uuid", Some(&t.customer), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Invalid cart item id"));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let t = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/checkout")
        .header("authorization", format!("Bearer {}", t.customer))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cash_checkout_leaves_stock_untouched() {
    let t = TestApp::new();
    let book = t.book("X", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 2).await;

    let (status, json) = t.checkout(&t.customer, "cash").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Order created successfully");
    assert_eq!(json["status"], "pending");
    assert_eq!(json["total_price"], "20.00");

    let (_, cart) = t.send("GET", "/cart", Some(&t.customer), None).await;
    assert!(cart["data"].as_array().unwrap().is_empty());
    assert_eq!(t.stock(book).await, 5);

    let placed = t.notifier.wait_for(1).await;
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].recipient, "ada@example.com");
}

#[tokio::test]
async fn test_screenshot_checkout_requires_payload() {
    let t = TestApp::new();
    let book = t.book("X", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 1).await;

    let mut form = checkout_form();
    form["payment_method"] = json!("screenshot");
    let (status, json) = t
        .send("POST", "/checkout", Some(&t.customer), Some(form))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"],
        "Payment screenshot is required for screenshot verification"
    );
    assert_eq!(t.store.order_count().await, 0);
}

#[tokio::test]
async fn test_checkout_empty_cart() {
    let t = TestApp::new();
    let (status, json) = t.checkout(&t.customer, "cash").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Cart is empty");
}

#[tokio::test]
async fn test_checkout_reserved_stock_lists_details() {
    let t = TestApp::new();
    let book = t.book("Last Copy", 1500, 1).await;
    let other = t.token_for_new_customer();

    t.add_to_cart(&t.customer, book, 1).await;
    t.add_to_cart(&other, book, 1).await;

    let (status, _) = t.checkout(&t.customer, "screenshot").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = t.checkout(&other, "screenshot").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Insufficient stock");
    assert_eq!(json["details"][0], "\"Last Copy\": only 0 available");
}

#[tokio::test]
async fn test_customer_cannot_use_admin_routes() {
    let t = TestApp::new();

    let (status, json) = t
        .send("GET", "/pending-verification", Some(&t.customer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Admin access required");

    let (status, _) = t.send("GET", "/admin/orders", Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_customer_is_forbidden_before_body_validation() {
    let t = TestApp::new();
    let book = t.book("A", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 1).await;
    let (_, placed) = t.checkout(&t.customer, "screenshot").await;
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (status, json) = t
        .send(
            "PUT",
            &format!("/verify-payment/{order_id}"),
            Some(&t.customer),
            Some(json!({ "action": "maybe" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Admin access required");

    let (status, _) = t
        .send(
            "PUT",
            &format!("/admin/update-status/{order_id}"),
            Some(&t.customer),
            Some(json!({ "status": "teleported" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .send(
            "PUT",
            "/admin/update-status/not-a-uuid",
            Some(&t.customer),
            Some(json!({ "status": "paid" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_approve_payment_decrements_stock() {
    let t = TestApp::new();
    let a = t.book("A", 1000, 5).await;
    let b = t.book("B", 500, 5).await;
    t.add_to_cart(&t.customer, a, 1).await;
    t.add_to_cart(&t.customer, b, 2).await;
    let (_, placed) = t.checkout(&t.customer, "screenshot").await;
    assert_eq!(placed["status"], "pending_verification");
    assert_eq!(
        placed["message"],
        "Order submitted for verification. We will review your payment screenshot."
    );
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (status, json) = t
        .send("GET", "/pending-verification", Some(&t.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"][0]["order_id"], order_id);

    let (status, json) = t
        .send(
            "PUT",
            &format!("/verify-payment/{order_id}"),
            Some(&t.admin),
            Some(json!({ "action": "approve" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Payment verified and order approved");
    assert_eq!(json["data"]["status"], "paid");
    assert_eq!(t.stock(a).await, 4);
    assert_eq!(t.stock(b).await, 3);

    // A second decision finds nothing to verify.
    let (status, _) = t
        .send(
            "PUT",
            &format!("/verify-payment/{order_id}"),
            Some(&t.admin),
            Some(json!({ "action": "reject" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(t.stock(a).await, 4);
}

#[tokio::test]
async fn test_reject_payment_keeps_stock() {
    let t = TestApp::new();
    let book = t.book("A", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 2).await;
    let (_, placed) = t.checkout(&t.customer, "screenshot").await;
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (status, json) = t
        .send(
            "PUT",
            &format!("/verify-payment/{order_id}"),
            Some(&t.admin),
            Some(json!({ "action": "reject", "admin_notes": "Blurry image" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Payment verification rejected");
    assert_eq!(json["data"]["status"], "payment_rejected");
    assert_eq!(t.stock(book).await, 5);
}

#[tokio::test]
async fn test_verify_payment_rejects_unknown_action() {
    let t = TestApp::new();
    let book = t.book("A", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 1).await;
    let (_, placed) = t.checkout(&t.customer, "screenshot").await;
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (status, json) = t
        .send(
            "PUT",
            &format!("/verify-payment/{order_id}"),
            Some(&t.admin),
            Some(json!({ "action": "maybe" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid action. Use 'approve' or 'reject'");
}

#[tokio::test]
async fn test_update_status_walks_the_table() {
    let t = TestApp::new();
    let book = t.book("A", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 2).await;
    let (_, placed) = t.checkout(&t.customer, "cash").await;
    let uri = format!(
        "/admin/update-status/{}",
        placed["order_id"].as_str().unwrap()
    );

    let (status, json) = t
        .send("PUT", &uri, Some(&t.admin), Some(json!({ "status": "processing" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);

    let (status, json) = t
        .send("PUT", &uri, Some(&t.admin), Some(json!({ "status": "paid" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Order status updated successfully");
    assert_eq!(json["previous_status"], "pending");
    assert_eq!(json["notified"], true);
    assert_eq!(t.stock(book).await, 3);

    let (status, json) = t
        .send(
            "PUT",
            &uri,
            Some(&t.admin),
            Some(json!({ "status": "paid", "notify_user": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["notified"], false);
    assert_eq!(t.stock(book).await, 3);

    let (status, json) = t
        .send(
            "PUT",
            &uri,
            Some(&t.admin),
            Some(json!({ "status": "shipped", "notify_user": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "shipped");
    assert_eq!(json["notified"], false);
}

#[tokio::test]
async fn test_update_status_rejects_unknown_status() {
    let t = TestApp::new();
    let book = t.book("A", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 1).await;
    let (_, placed) = t.checkout(&t.customer, "cash").await;

    let (status, json) = t
        .send(
            "PUT",
            &format!(
                "/admin/update-status/{}",
                placed["order_id"].as_str().unwrap()
            ),
            Some(&t.admin),
            Some(json!({ "status": "teleported" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .starts_with("Invalid status. Must be one of:")
    );
}

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let t = TestApp::new();
    let book = t.book("A", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 1).await;
    let (_, placed) = t.checkout(&t.customer, "cash").await;
    let uri = format!("/orders/{}", placed["order_id"].as_str().unwrap());

    let (status, json) = t.send("GET", &uri, Some(&t.customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user_id"], t.customer_id.to_string());
    assert_eq!(json["data"]["items"][0]["price"], "10.00");
    assert_eq!(json["data"]["full_name"], "Ada Lovelace");

    let stranger = t.token_for_new_customer();
    let (status, _) = t.send("GET", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t
        .send("GET", "/orders/not-a-uuid", Some(&t.customer), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_shipping_info_follows_latest_order() {
    let t = TestApp::new();

    let (status, json) = t
        .send("GET", "/orders/shipping-info", Some(&t.customer), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"].is_null());

    let book = t.book("A", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 1).await;
    t.checkout(&t.customer, "cash").await;

    let (_, json) = t
        .send("GET", "/orders/shipping-info", Some(&t.customer), None)
        .await;
    assert_eq!(json["data"]["city"], "London");
    assert_eq!(json["data"]["billing_address"], "12 Analytical Row");
    assert_eq!(json["data"]["payment_method"], "cash");
}

#[tokio::test]
async fn test_order_listings() {
    let t = TestApp::new();
    let book = t.book("A", 1000, 5).await;
    let other = t.token_for_new_customer();

    t.add_to_cart(&t.customer, book, 1).await;
    t.checkout(&t.customer, "cash").await;
    t.add_to_cart(&other, book, 1).await;
    t.checkout(&other, "cash").await;

    let (_, mine) = t.send("GET", "/orders", Some(&t.customer), None).await;
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);

    let (status, all) = t.send("GET", "/admin/orders", Some(&t.admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = TestApp::new();
    let book = t.book("A", 1000, 5).await;
    t.add_to_cart(&t.customer, book, 1).await;
    t.checkout(&t.customer, "cash").await;

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("checkout_attempts_total"));
}
