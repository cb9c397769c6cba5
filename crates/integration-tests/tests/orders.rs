//! Checkout, online payment confirmation, and order administration.

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use toybox_integration_tests::{TestContext, address, expect_error, expect_json};

/// Put two tees in the client's cart.
async fn fill_cart(ctx: &TestContext, client: &Client) {
    let product = ctx.seed_product("Tee", "499", "Men").await;
    let resp = client
        .post(ctx.url("/api/cart"))
        .json(&json!({ "productId": product.id, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    expect_json(resp, StatusCode::OK).await;
}

async fn cart_len(ctx: &TestContext, client: &Client) -> usize {
    let resp = client.get(ctx.url("/api/cart")).send().await.unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    body["cart"]["items"].as_array().unwrap().len()
}

fn checkout(amount: &str) -> Value {
    json!({ "address": address(), "amount": amount, "items": [] })
}

#[tokio::test]
async fn test_cash_on_delivery_places_order_and_clears_cart() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("cod@example.com").await;
    fill_cart(&ctx, &client).await;

    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&checkout("998"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::CREATED).await;

    assert_eq!(body["message"], "Order placed");
    let order = &body["order"];
    assert_eq!(order["paymentMethod"], "cod");
    assert_eq!(order["payment"], false);
    assert_eq!(order["status"], "Placed");
    assert_eq!(order["totalAmount"], "998");
    assert_eq!(order["items"][0]["quantity"], 2);
    assert_eq!(order["shippingAddress"]["pincode"], "560001");

    assert_eq!(cart_len(&ctx, &client).await, 0);

    let resp = client
        .post(ctx.url("/api/order/userorders"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
    assert_eq!(body["orders"][0]["id"], order["id"]);
}

#[tokio::test]
async fn test_checkout_validation() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("empty@example.com").await;

    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&checkout("100"))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST, "items is empty").await;

    fill_cart(&ctx, &client).await;

    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&checkout("0"))
        .send()
        .await
        .unwrap();
    expect_error(
        resp,
        StatusCode::BAD_REQUEST,
        "Amount must be a positive number",
    )
    .await;

    let mut missing_city = address();
    missing_city["city"] = json!("  ");
    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&json!({ "address": missing_city, "amount": "998" }))
        .send()
        .await
        .unwrap();
    expect_error(
        resp,
        StatusCode::BAD_REQUEST,
        "Shipping address city is required",
    )
    .await;

    // Nothing was placed
    assert_eq!(cart_len(&ctx, &client).await, 1);
}

#[tokio::test]
async fn test_idempotency_key_replays_placement() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("retry@example.com").await;
    fill_cart(&ctx, &client).await;

    let mut request = checkout("998");
    request["idempotencyKey"] = json!("checkout-7f3a");

    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&request)
        .send()
        .await
        .unwrap();
    let first = expect_json(resp, StatusCode::CREATED).await;

    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&request)
        .send()
        .await
        .unwrap();
    let second = expect_json(resp, StatusCode::OK).await;

    assert_eq!(first["order"]["id"], second["order"]["id"]);

    let resp = client
        .post(ctx.url("/api/order/userorders"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_online_payment_flow() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("online@example.com").await;
    fill_cart(&ctx, &client).await;

    let resp = client
        .post(ctx.url("/api/order/razorpay"))
        .json(&checkout("998"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    let gateway_order_id = body["order"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["order"]["amount"], 99_800);
    assert_eq!(body["order"]["currency"], "INR");
    assert_eq!(body["order"]["receipt"], body["orderId"]);

    // The cart is kept until payment is confirmed
    assert_eq!(cart_len(&ctx, &client).await, 1);

    let resp = client
        .post(ctx.url("/api/order/verifyRazorpay"))
        .json(&json!({ "razorpay_order_id": gateway_order_id }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST, "payment fail").await;
    assert_eq!(cart_len(&ctx, &client).await, 1);

    ctx.gateway.pay(&gateway_order_id);

    let resp = client
        .post(ctx.url("/api/order/verifyRazorpay"))
        .json(&json!({ "razorpay_order_id": gateway_order_id }))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["message"], "Payment successful");
    assert_eq!(body["order"]["payment"], true);
    assert_eq!(body["order"]["paymentMethod"], "razorpay");
    assert_eq!(body["order"]["gatewayOrderId"], gateway_order_id.as_str());
    assert_eq!(cart_len(&ctx, &client).await, 0);

    // Confirming again succeeds and leaves a refilled cart alone
    fill_cart(&ctx, &client).await;
    let resp = client
        .post(ctx.url("/api/order/verifyRazorpay"))
        .json(&json!({ "razorpay_order_id": gateway_order_id }))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["order"]["payment"], true);
    assert_eq!(cart_len(&ctx, &client).await, 1);
    assert_eq!(ctx.gateway.created(), 1);
}

#[tokio::test]
async fn test_amount_must_fit_stored_precision() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("precise@example.com").await;
    fill_cart(&ctx, &client).await;

    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&checkout("0.001"))
        .send()
        .await
        .unwrap();
    expect_error(
        resp,
        StatusCode::BAD_REQUEST,
        "Amount: price cannot have more than 2 decimal places",
    )
    .await;

    let resp = client
        .post(ctx.url("/api/order/razorpay"))
        .json(&checkout("79228162514264337593543950335"))
        .send()
        .await
        .unwrap();
    expect_error(
        resp,
        StatusCode::BAD_REQUEST,
        "Amount: price cannot exceed 9999999999.99",
    )
    .await;

    assert_eq!(ctx.gateway.created(), 0);
    assert_eq!(cart_len(&ctx, &client).await, 1);
}

#[tokio::test]
async fn test_idempotency_key_cannot_switch_payment_method() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("switch@example.com").await;
    fill_cart(&ctx, &client).await;

    let mut cod = checkout("200");
    cod["idempotencyKey"] = json!("checkout-7");
    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&cod)
        .send()
        .await
        .unwrap();
    let placed = expect_json(resp, StatusCode::CREATED).await;

    let mut online = checkout("999");
    online["idempotencyKey"] = json!("checkout-7");
    let resp = client
        .post(ctx.url("/api/order/razorpay"))
        .json(&online)
        .send()
        .await
        .unwrap();
    expect_error(
        resp,
        StatusCode::BAD_REQUEST,
        "idempotencyKey was already used with a different payment method",
    )
    .await;
    assert_eq!(ctx.gateway.created(), 0);

    let resp = client
        .post(ctx.url("/api/order/userorders"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
    assert_eq!(body["orders"][0]["id"], placed["order"]["id"]);
    assert_eq!(body["orders"][0]["totalAmount"], "200");
    assert_eq!(body["orders"][0]["gatewayOrderId"], Value::Null);
}

#[tokio::test]
async fn test_cannot_confirm_another_users_payment() {
    let ctx = TestContext::new().await;
    let owner = ctx.customer("owner@example.com").await;
    let other = ctx.customer("other@example.com").await;
    fill_cart(&ctx, &owner).await;

    let resp = owner
        .post(ctx.url("/api/order/razorpay"))
        .json(&checkout("998"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    let gateway_order_id = body["order"]["id"].as_str().unwrap().to_string();
    ctx.gateway.pay(&gateway_order_id);

    let resp = other
        .post(ctx.url("/api/order/verifyRazorpay"))
        .json(&json!({ "razorpay_order_id": gateway_order_id }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::NOT_FOUND, "Order not found").await;
}

#[tokio::test]
async fn test_gateway_outage_is_bad_gateway() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("outage@example.com").await;
    fill_cart(&ctx, &client).await;
    ctx.gateway.set_down(true);

    let resp = client
        .post(ctx.url("/api/order/razorpay"))
        .json(&checkout("998"))
        .send()
        .await
        .unwrap();
    expect_error(
        resp,
        StatusCode::BAD_GATEWAY,
        "Payment gateway is unavailable",
    )
    .await;
}

#[tokio::test]
async fn test_admin_lists_and_updates_orders() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("track@example.com").await;
    let admin = ctx.admin().await;
    fill_cart(&ctx, &client).await;

    let resp = client
        .post(ctx.url("/api/order/place"))
        .json(&checkout("998"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::CREATED).await;
    let order_id = body["order"]["id"].as_str().unwrap().to_string();

    let resp = admin.post(ctx.url("/api/order/list")).send().await.unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);

    let resp = admin
        .post(ctx.url("/api/order/status"))
        .json(&json!({ "orderId": order_id, "status": "Out for delivery" }))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["order"]["status"], "OutForDelivery");

    // Moving backwards is allowed
    let resp = admin
        .post(ctx.url("/api/order/status"))
        .json(&json!({ "orderId": order_id, "status": "Packing" }))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["order"]["status"], "Packing");

    let resp = admin
        .post(ctx.url("/api/order/status"))
        .json(&json!({ "orderId": order_id, "status": "Lost" }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::BAD_REQUEST, "Invalid status: Lost").await;

    let resp = admin
        .post(ctx.url("/api/order/status"))
        .json(&json!({
            "orderId": "00000000-0000-4000-8000-000000000000",
            "status": "Shipped",
        }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::NOT_FOUND, "Order not found").await;
}

#[tokio::test]
async fn test_order_administration_requires_admin() {
    let ctx = TestContext::new().await;
    let client = ctx.customer("sneaky@example.com").await;

    let resp = client.post(ctx.url("/api/order/list")).send().await.unwrap();
    expect_error(resp, StatusCode::FORBIDDEN, "Not authorized as admin").await;

    let resp = client
        .post(ctx.url("/api/order/status"))
        .json(&json!({ "orderId": "x", "status": "Shipped" }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::FORBIDDEN, "Not authorized as admin").await;
}
