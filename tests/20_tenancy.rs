mod common;

use anyhow::Result;
use futures::future::join_all;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use sisdental_api::store::Table;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_requests_provision_a_single_doctor() -> Result<()> {
    let server = common::spawn().await?;
    let user_id = Uuid::new_v4();
    server
        .store
        .seed(Table::Users, json!({"id": user_id, "email": "first@clinic.test", "name": "Dr. First", "role": "member"}))
        .await?;
    let token = common::make_token(&user_id.to_string(), "first@clinic.test");

    let requests = (0..8).map(|_| {
        server
            .client
            .get(server.url("/api/patients/my"))
            .bearer_auth(&token)
            .send()
    });
    for res in join_all(requests).await {
        assert_eq!(res?.status(), StatusCode::OK);
    }

    let doctors = server.store.dump(Table::Doctors).await;
    assert_eq!(doctors.len(), 1, "concurrent resolution must converge: {:?}", doctors);
    assert_eq!(doctors[0]["user_id"], user_id.to_string());
    assert_eq!(doctors[0]["name"], "Dr. First");
    Ok(())
}

#[tokio::test]
async fn legacy_doctor_account_is_its_own_tenant() -> Result<()> {
    let server = common::spawn().await?;
    let user_id = Uuid::new_v4();
    server
        .store
        .seed(Table::Users, json!({"id": user_id, "email": "legacy@clinic.test", "name": "Legacy", "role": "doctor"}))
        .await?;
    let token = common::make_token(&user_id.to_string(), "legacy@clinic.test");

    let res = server
        .client
        .post(server.url("/api/finances"))
        .bearer_auth(&token)
        .json(&json!({"description": "Consulta", "amount": 150}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let finance: Value = res.json().await?;
    assert_eq!(finance["doctor_id"], user_id.to_string());
    assert!(server.store.dump(Table::Doctors).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_account_cannot_be_provisioned() -> Result<()> {
    let server = common::spawn().await?;
    let token = common::make_token(&Uuid::new_v4().to_string(), "ghost@clinic.test");

    let res = server.client.get(server.url("/api/patients/my")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Doctor not found for user");

    let token = common::make_token("not-a-uuid", "ghost@clinic.test");
    let res = server.client.get(server.url("/api/patients/my")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid user ID");
    Ok(())
}

#[tokio::test]
async fn tenants_do_not_see_each_other() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let bruno = server.account("Dr Bruno").await?;
    let patient = server.create_patient(&ana, "Maria Silva", "maria@example.com").await?;

    let res = server.get(&bruno, &format!("/api/patients/{}", patient)).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await?["error"], "Access denied to this patient");

    let body: Value = server.get(&bruno, "/api/patients/my").await?.json().await?;
    assert_eq!(body["patients"], json!([]));
    Ok(())
}
