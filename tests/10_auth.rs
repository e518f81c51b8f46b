mod common;

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use sisdental_api::config::AppConfig;
use sisdental_api::store::Table;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::spawn().await?;
    let res = server.client.get(server.url("/api/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["auth"], "supabase-only");
    assert_eq!(body["store"], "ok");
    Ok(())
}

#[tokio::test]
async fn protected_routes_report_header_problems() -> Result<()> {
    let server = common::spawn().await?;

    let res = server.client.get(server.url("/api/auth/me")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?, json!({"error": "Missing authorization header"}));

    let res = server
        .client
        .get(server.url("/api/auth/me"))
        .header("Authorization", "Token abc")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid authorization header format");

    let res = server
        .client
        .get(server.url("/api/patients/my"))
        .bearer_auth("only.two")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid JWT format");
    Ok(())
}

#[tokio::test]
async fn unsigned_token_is_accepted_when_verification_is_off() -> Result<()> {
    let server = common::spawn().await?;
    let subject = Uuid::new_v4().to_string();
    let token = common::make_token(&subject, "forged@clinic.test");

    let res = server.client.get(server.url("/api/auth/me")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["user"]["id"], subject);
    assert_eq!(body["user"]["email"], "forged@clinic.test");
    assert_eq!(body["user"]["role"], "doctor");
    assert!(body["token"].as_str().unwrap().ends_with("..."));
    Ok(())
}

#[tokio::test]
async fn token_without_subject_is_rejected() -> Result<()> {
    let server = common::spawn().await?;
    let token = common::token_with_payload(json!({"email": "nobody@clinic.test"}));

    let res = server.client.get(server.url("/api/protected")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid user ID in token");
    Ok(())
}

#[tokio::test]
async fn signed_tokens_are_required_when_verification_is_on() -> Result<()> {
    let mut config = AppConfig::for_tests();
    config.auth.jwt_secret = Some("super-secret".to_string());
    config.auth.verify_signatures = true;
    let server = common::spawn_with(config).await?;

    let subject = Uuid::new_v4().to_string();
    let forged = common::make_token(&subject, "forged@clinic.test");
    let res = server.client.get(server.url("/api/protected")).bearer_auth(&forged).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid token");

    let claims = json!({
        "sub": subject,
        "email": "signed@clinic.test",
        "exp": Utc::now().timestamp() + 600,
    });
    let signed = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"super-secret"))?;
    let res = server.client.get(server.url("/api/protected")).bearer_auth(&signed).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["authenticated"], true);
    Ok(())
}

#[tokio::test]
async fn login_maps_identity_outcomes() -> Result<()> {
    let server = common::spawn().await?;
    let login = |email: &str, password: &str| {
        server
            .client
            .post(server.url("/api/login"))
            .json(&json!({"email": email, "password": password}))
            .send()
    };

    let res = login("ana@clinic.test", common::PASSWORD).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert!(body["access_token"].is_string());
    assert_eq!(body["user"]["email"], "ana@clinic.test");

    let res = login("ana@clinic.test", "wrong").await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid email or password");

    let res = login("pending@clinic.test", common::PASSWORD).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let message = res.json::<Value>().await?["error"].as_str().unwrap().to_string();
    assert!(message.starts_with("Please confirm your email"));

    let res = server
        .client
        .post(server.url("/api/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid request");
    Ok(())
}

#[tokio::test]
async fn signup_provisions_doctor_and_free_plan() -> Result<()> {
    let server = common::spawn().await?;
    let res = server
        .client
        .post(server.url("/api/signup"))
        .json(&json!({"email": "new@clinic.test", "password": "secret", "name": "Dr. New"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let doctors = server.store.dump(Table::Doctors).await;
    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0]["email"], "new@clinic.test");
    let subscriptions = server.store.dump(Table::Subscriptions).await;
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["plan_name"], "Free Plan");

    let res = server
        .client
        .post(server.url("/api/signup"))
        .json(&json!({"email": "taken@clinic.test", "password": "secret", "name": "Dr. Taken"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Failed to create account");
    Ok(())
}

#[tokio::test]
async fn resend_confirmation_needs_an_email() -> Result<()> {
    let server = common::spawn().await?;
    let res = server
        .client
        .post(server.url("/api/resend-confirmation"))
        .json(&json!({"email": ""}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Email is required");

    let res = server
        .client
        .post(server.url("/api/resend-confirmation"))
        .json(&json!({"email": "ana@clinic.test"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["email"], "ana@clinic.test");
    Ok(())
}

#[tokio::test]
async fn admin_seed_is_guarded_by_its_token() -> Result<()> {
    let server = common::spawn().await?;
    let body = json!({"email": "root@clinic.test", "password": "secret", "name": "Root"});

    let res = server.client.post(server.url("/api/admin/seed")).json(&body).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await?["error"], "Forbidden: invalid seed token");

    let res = server
        .client
        .post(server.url("/api/admin/seed"))
        .header("X-Admin-Seed-Token", "seed-token")
        .json(&body)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let admin: Value = res.json().await?;
    assert_eq!(admin["role"], "admin");
    assert_eq!(admin["email"], "root@clinic.test");
    Ok(())
}

#[tokio::test]
async fn doctor_profile_lookup_never_provisions() -> Result<()> {
    let server = common::spawn().await?;
    let stranger = common::make_token(&Uuid::new_v4().to_string(), "stranger@clinic.test");

    let res = server.client.get(server.url("/api/doctors/me")).bearer_auth(&stranger).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert!(body["doctor"].is_null());
    assert_eq!(body["message"], "Doctor profile not found");
    assert!(server.store.dump(Table::Doctors).await.is_empty());

    let account = server.account("Dr Ana").await?;
    let body: Value = server.get(&account, "/api/doctors/me").await?.json().await?;
    assert_eq!(body["doctor"]["id"], account.doctor_id.to_string());
    Ok(())
}

#[tokio::test]
async fn signout_is_no_content() -> Result<()> {
    let server = common::spawn().await?;
    let account = server.account("Dr Ana").await?;
    let res = server.client.post(server.url("/api/auth/signout")).bearer_auth(&account.token).send().await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    Ok(())
}
