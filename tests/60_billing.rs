mod common;

use anyhow::Result;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};

use sisdental_api::billing::sign_payload;
use sisdental_api::store::Table;

fn remote_subscription(status: &str) -> Value {
    json!({
        "id": "sub_1",
        "customer": "cus_test",
        "status": status,
        "items": {"data": [{"price": common::pro_price()}]}
    })
}

async fn deliver(server: &common::TestServer, payload: &[u8], signature: Option<String>) -> Result<reqwest::Response> {
    let mut request = server.client.post(server.url("/api/stripe/webhook")).body(payload.to_vec());
    if let Some(signature) = signature {
        request = request.header("Stripe-Signature", signature);
    }
    Ok(request.send().await?)
}

#[tokio::test]
async fn catalogue_is_public() -> Result<()> {
    let server = common::spawn().await?;
    let prices: Value = server.client.get(server.url("/api/stripe/prices")).send().await?.json().await?;
    assert_eq!(prices["data"][0]["id"], "price_pro");
    assert_eq!(prices["data"][0]["product_id"], "prod_pro");
    assert_eq!(prices["data"][0]["interval"], "month");

    let products: Value = server.client.get(server.url("/api/stripe/products")).send().await?.json().await?;
    assert_eq!(products["data"][0]["name"], "Pro Plan");
    assert_eq!(products["data"][0]["default_price_id"], "price_pro");
    Ok(())
}

#[tokio::test]
async fn webhook_requires_a_valid_signature() -> Result<()> {
    let server = common::spawn().await?;
    let payload = br#"{"id":"evt_1","type":"price.updated","data":{"object":{"id":"price_pro"}}}"#;

    let res = deliver(&server, payload, None).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "No signature found");

    let forged = sign_payload(payload, "whsec_wrong", Utc::now().timestamp());
    let res = deliver(&server, payload, Some(forged)).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid signature");

    let stale = sign_payload(payload, "whsec_test", Utc::now().timestamp() - 3600);
    let res = deliver(&server, payload, Some(stale)).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let signed = sign_payload(payload, "whsec_test", Utc::now().timestamp());
    let res = deliver(&server, payload, Some(signed)).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({"received": true}));
    Ok(())
}

#[tokio::test]
async fn subscription_events_sync_the_local_row() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    server
        .store
        .seed(
            Table::Subscriptions,
            json!({"doctor_id": ana.doctor_id, "plan_name": "Free Plan", "stripe_customer_id": "cus_test", "subscription_status": "active"}),
        )
        .await?;
    *server.billing.subscription.lock().unwrap() = Some(remote_subscription("active"));

    let payload = br#"{"id":"evt_2","type":"customer.subscription.updated","data":{"object":{"id":"sub_1"}}}"#;
    let signed = sign_payload(payload, "whsec_test", Utc::now().timestamp());
    let res = deliver(&server, payload, Some(signed)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let rows = server.store.dump(Table::Subscriptions).await;
    assert_eq!(rows[0]["stripe_subscription_id"], "sub_1");
    assert_eq!(rows[0]["stripe_product_id"], "prod_pro");
    assert_eq!(rows[0]["plan_name"], "Pro Plan");

    *server.billing.subscription.lock().unwrap() = Some(remote_subscription("canceled"));
    let payload = br#"{"id":"evt_3","type":"customer.subscription.deleted","data":{"object":{"id":"sub_1"}}}"#;
    let signed = sign_payload(payload, "whsec_test", Utc::now().timestamp());
    assert_eq!(deliver(&server, payload, Some(signed)).await?.status(), StatusCode::OK);

    let rows = server.store.dump(Table::Subscriptions).await;
    assert_eq!(rows[0]["subscription_status"], "canceled");
    assert_eq!(rows[0]["plan_name"], "");
    assert_eq!(rows[0]["stripe_subscription_id"], "");
    Ok(())
}

#[tokio::test]
async fn checkout_creates_a_session_for_the_doctor() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;

    let res = server.post(&ana, "/api/stripe/create-checkout-session", json!({"priceId": "price_gold"})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid price ID");

    let res = server.post(&ana, "/api/stripe/create-checkout-session", json!({"priceId": "price_pro"})).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["url"], "https://checkout.test/cs_test");
    assert_eq!(body["sessionId"], body["url"]);

    let checkouts = server.billing.checkouts.lock().unwrap().clone();
    assert_eq!(checkouts.len(), 1);
    assert_eq!(checkouts[0].client_reference_id.as_deref(), Some(ana.user_id.to_string().as_str()));
    assert_eq!(checkouts[0].customer_id.as_deref(), Some("cus_test"));
    assert!(checkouts[0].success_url.contains("/api/stripe/checkout-success?session_id={CHECKOUT_SESSION_ID}"));

    let res = server.post(&ana, "/api/stripe/create-portal-session", json!({})).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.json::<Value>().await?["error"], "No active subscription found");
    Ok(())
}

#[tokio::test]
async fn checkout_success_records_and_redirects() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    *server.billing.session.lock().unwrap() = Some(json!({
        "id": "cs_test",
        "client_reference_id": ana.user_id.to_string(),
        "customer": "cus_new",
        "subscription": remote_subscription("trialing"),
    }));

    let res = server.client.get(server.url("/api/stripe/checkout-success")).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Session ID is required");

    let res = server
        .client
        .get(server.url("/api/stripe/checkout-success?session_id=cs_test"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()["location"], "http://localhost:5173/dashboard");

    let rows = server.store.dump(Table::Subscriptions).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["doctor_id"], ana.doctor_id.to_string());
    assert_eq!(rows[0]["stripe_customer_id"], "cus_new");
    assert_eq!(rows[0]["subscription_status"], "trialing");
    assert_eq!(rows[0]["plan_name"], "Pro Plan");

    let res = server.post(&ana, "/api/stripe/create-portal-session", json!({})).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["url"], "https://portal.test/cus_new");
    Ok(())
}

#[tokio::test]
async fn subscription_rows_belong_to_the_caller() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let bruno = server.account("Dr Bruno").await?;

    let body: Value = server.get(&ana, "/api/subscriptions/me").await?.json().await?;
    assert!(body["subscription"].is_null());
    assert_eq!(body["message"], "No active subscription found");

    let res = server
        .post(&ana, "/api/subscriptions", json!({"plan_name": "Free Plan", "subscription_status": "active"}))
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await?;
    let path = format!("/api/subscriptions/{}", created["id"].as_str().unwrap());

    let body: Value = server.get(&ana, "/api/subscriptions/me").await?.json().await?;
    assert_eq!(body["subscription"]["id"], created["id"]);

    let res = server.put(&ana, &path, json!({"plan_name": "Pro Plan"})).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["plan_name"], "Pro Plan");

    assert_eq!(server.get(&bruno, &path).await?.status(), StatusCode::NOT_FOUND);
    Ok(())
}
