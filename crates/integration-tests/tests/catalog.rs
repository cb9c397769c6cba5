//! Catalog browsing and admin product management.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde_json::json;

use toybox_integration_tests::{TestContext, expect_error, expect_json};

fn product_form() -> Form {
    Form::new()
        .text("name", "Denim Jacket")
        .text("description", "Stonewashed")
        .text("price", "2499")
        .text("category", "Men")
        .text("subCategory", "Winterwear")
        .text("sizes", r#"["M","L"]"#)
        .text("bestseller", "true")
}

#[tokio::test]
async fn test_list_and_show() {
    let ctx = TestContext::new().await;
    let tee = ctx.seed_product("Tee", "499", "Men").await;
    ctx.seed_product("Kurta", "999", "Women").await;
    let client = TestContext::client();

    let resp = client.get(ctx.url("/api/product/list")).send().await.unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["products"][0]["name"], "Tee");

    let resp = client
        .get(ctx.url(&format!("/api/product/{}", tee.id)))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["product"]["price"], "499");
    assert_eq!(body["product"]["subCategory"], "Topwear");
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let ctx = TestContext::new().await;
    let client = TestContext::client();

    for id in ["00000000-0000-4000-8000-000000000000", "not-a-uuid"] {
        let resp = client
            .get(ctx.url(&format!("/api/product/{id}")))
            .send()
            .await
            .unwrap();
        expect_error(resp, StatusCode::NOT_FOUND, "Product not found").await;
    }
}

#[tokio::test]
async fn test_search_filters_and_sorts() {
    let ctx = TestContext::new().await;
    ctx.seed_product("Cotton Tee", "499", "Men").await;
    ctx.seed_product("Linen Shirt", "1299", "Men").await;
    ctx.seed_product("Silk Scarf", "799", "Women").await;
    let client = TestContext::client();

    let resp = client
        .get(ctx.url("/api/product?category=Men&sortBy=price-desc"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["products"][0]["name"], "Linen Shirt");
    assert_eq!(body["products"][1]["name"], "Cotton Tee");

    let resp = client
        .get(ctx.url("/api/product?search=tee"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["count"], 1);

    let resp = client
        .get(ctx.url("/api/product?minPrice=500&maxPrice=1000"))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["products"][0]["name"], "Silk Scarf");
}

#[tokio::test]
async fn test_search_rejects_inverted_price_range() {
    let ctx = TestContext::new().await;

    let resp = TestContext::client()
        .get(ctx.url("/api/product?minPrice=900&maxPrice=100"))
        .send()
        .await
        .unwrap();
    expect_error(
        resp,
        StatusCode::BAD_REQUEST,
        "minPrice cannot be greater than maxPrice",
    )
    .await;
}

#[tokio::test]
async fn test_admin_adds_product_with_images() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;

    let form = product_form()
        .part("image1", Part::bytes(vec![1_u8; 64]).file_name("front.jpg"))
        .part("image3", Part::bytes(vec![2_u8; 32]).file_name("back.png"))
        .part("image2", Part::bytes(Vec::new()).file_name(""));

    let resp = admin
        .post(ctx.url("/api/product/add"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;

    assert_eq!(body["product"]["name"], "Denim Jacket");
    assert_eq!(body["product"]["bestseller"], true);
    assert_eq!(body["product"]["sizes"], json!(["M", "L"]));
    assert_eq!(body["product"]["images"].as_array().unwrap().len(), 2);

    let mut sizes = ctx.assets.uploaded_sizes();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![32, 64]);
}

#[tokio::test]
async fn test_add_product_validates_fields() {
    let ctx = TestContext::new().await;
    let admin = ctx.admin().await;

    let form = Form::new()
        .text("name", "No Price")
        .text("description", "Missing price")
        .text("category", "Men")
        .text("subCategory", "Topwear");

    let resp = admin
        .post(ctx.url("/api/product/add"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::BAD_REQUEST).await;
    assert_eq!(body["success"], false);
    assert!(ctx.assets.uploaded_sizes().is_empty());
}

#[tokio::test]
async fn test_product_management_requires_admin() {
    let ctx = TestContext::new().await;
    let product = ctx.seed_product("Tee", "499", "Men").await;
    let customer = ctx.customer("nosy@example.com").await;

    let resp = customer
        .post(ctx.url("/api/product/add"))
        .multipart(product_form())
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::FORBIDDEN, "Not authorized as admin").await;

    let resp = customer
        .post(ctx.url("/api/product/remove"))
        .json(&json!({ "id": product.id }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::FORBIDDEN, "Not authorized as admin").await;

    let resp = TestContext::client()
        .post(ctx.url("/api/product/remove"))
        .json(&json!({ "id": product.id }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::UNAUTHORIZED, "Not authorized, no token").await;
}

#[tokio::test]
async fn test_admin_removes_product() {
    let ctx = TestContext::new().await;
    let product = ctx.seed_product("Tee", "499", "Men").await;
    let admin = ctx.admin().await;

    let resp = admin
        .post(ctx.url("/api/product/remove"))
        .json(&json!({ "id": product.id }))
        .send()
        .await
        .unwrap();
    let body = expect_json(resp, StatusCode::OK).await;
    assert_eq!(body["message"], "Product removed");

    let resp = admin
        .post(ctx.url("/api/product/remove"))
        .json(&json!({ "id": product.id }))
        .send()
        .await
        .unwrap();
    expect_error(resp, StatusCode::NOT_FOUND, "Product not found").await;
}
