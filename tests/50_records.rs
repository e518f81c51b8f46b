mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use sisdental_api::store::Table;

#[tokio::test]
async fn finance_pages_share_one_total() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    for i in 0..15 {
        let res = server
            .post(&ana, "/api/finances", json!({"description": format!("Sessão {}", i), "amount": 100 + i}))
            .await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let first: Value = server.get(&ana, "/api/finances?page=1&limit=10").await?.json().await?;
    let second: Value = server.get(&ana, "/api/finances?page=2&limit=10").await?.json().await?;
    assert_eq!(first["finances"].as_array().unwrap().len(), 10);
    assert_eq!(second["finances"].as_array().unwrap().len(), 5);
    assert_eq!(first["total"], 15);
    assert_eq!(second["total"], 15);
    assert_eq!(second["page"], 2);
    assert_eq!(second["limit"], 10);

    let fallback: Value = server.get(&ana, "/api/finances?page=zero&limit=-3").await?.json().await?;
    assert_eq!(fallback["page"], 1);
    assert_eq!(fallback["limit"], 10);

    let res = server.get(&ana, "/api/finances?page=9223372036854775807&limit=10").await?;
    assert_eq!(res.status(), StatusCode::OK);
    let beyond: Value = res.json().await?;
    assert_eq!(beyond["finances"], json!([]));
    assert_eq!(beyond["total"], 15);
    Ok(())
}

#[tokio::test]
async fn finance_writes_are_audited() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;

    let res = server
        .client
        .post(server.url("/api/finances"))
        .bearer_auth(&ana.token)
        .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
        .json(&json!({"description": "Canal", "amount": 850.5, "discount": 50, "type": "income"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let finance: Value = res.json().await?;
    assert_eq!(finance["status"], "pending");
    assert_eq!(finance["balance"], 800.5);

    let path = format!("/api/finances/{}", finance["id"].as_str().unwrap());
    let res = server.put(&ana, &path, json!({"description": "Canal", "amount": 850.5, "status": "paid"})).await?;
    assert_eq!(res.json::<Value>().await?["message"], "Finance record updated successfully");
    assert_eq!(server.delete(&ana, &path).await?.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.get(&ana, &path).await?.status(), StatusCode::NOT_FOUND);

    let logs = server.store.dump(Table::ActivityLogs).await;
    let actions: Vec<&str> = logs.iter().map(|l| l["action"].as_str().unwrap()).collect();
    assert_eq!(actions, vec!["CreateFinance", "UpdateFinance", "DeleteFinance"]);
    assert_eq!(logs[0]["ip_address"], "203.0.113.7");

    let res = server.post(&ana, "/api/finances", json!({"type": "gift"})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid finance type");

    let res = server.post(&ana, "/api/finances", json!({"description": "Huge", "amount": 5e28, "tax": 5e28})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid amount");
    Ok(())
}

#[tokio::test]
async fn empty_odontogram_leaves_no_active_states() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let patient = server.create_patient(&ana, "Maria", "maria@example.com").await?;
    let base = format!("/api/patients/{}/tooth-states", patient);

    for (tooth, state) in [(11, "cavity"), (21, "filled"), (36, "crown")] {
        let res = server.post(&ana, &base, json!({"tooth_number": tooth, "state": state})).await?;
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let chart = json!([{"tooth_number": 11, "state": "filled"}, {"tooth_number": 48, "state": "missing"}]);
    let res = server.post(&ana, &format!("{}/odontogram", base), chart).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let states: Value = server.get(&ana, &base).await?.json().await?;
    assert_eq!(states.as_array().unwrap().len(), 2);

    let res = server.post(&ana, &format!("{}/odontogram", base), json!([])).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let states: Value = server.get(&ana, &base).await?.json().await?;
    assert_eq!(states, json!([]));
    assert_eq!(server.store.dump(Table::ToothStates).await.len(), 5);
    Ok(())
}

#[tokio::test]
async fn invalid_chart_changes_nothing() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let patient = server.create_patient(&ana, "Maria", "maria@example.com").await?;
    let base = format!("/api/patients/{}/tooth-states", patient);
    server.post(&ana, &base, json!({"tooth_number": 11, "state": "cavity"})).await?;

    let chart = json!([{"tooth_number": 21, "state": "filled"}, {"tooth_number": 99, "state": "filled"}]);
    let res = server.post(&ana, &format!("{}/odontogram", base), chart).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.post(&ana, &format!("{}/odontogram", base), json!({"tooth_number": 11})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid request body");

    let states: Value = server.get(&ana, &base).await?.json().await?;
    assert_eq!(states.as_array().unwrap().len(), 1);
    assert_eq!(states[0]["state"], "cavity");
    Ok(())
}

#[tokio::test]
async fn treatments_and_documents_follow_patient_access() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let bruno = server.account("Dr Bruno").await?;
    let patient = server.create_patient(&ana, "Maria", "maria@example.com").await?;

    let treatments = format!("/api/patients/{}/treatments", patient);
    let res = server
        .post(&ana, &treatments, json!({"treatment_type": "restoration", "teeth_number": "11", "price": 250}))
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let page: Value = server.get(&ana, &treatments).await?.json().await?;
    assert_eq!(page["total"], 1);
    assert_eq!(page["treatments"][0]["treatment_type"], "restoration");
    assert_eq!(server.get(&bruno, &treatments).await?.status(), StatusCode::FORBIDDEN);

    let documents = format!("/api/patients/{}/documents", patient);
    let res = server
        .post(&ana, &documents, json!({"file_name": "anamnese.pdf", "url": "/uploads/anamnese.pdf"}))
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let doc: Value = res.json().await?;
    let doc_path = format!("{}/{}", documents, doc["id"].as_str().unwrap());

    let res = server.put(&ana, &doc_path, json!({"file_name": "anamnese-v2.pdf", "url": "/uploads/v2.pdf"})).await?;
    assert_eq!(res.json::<Value>().await?["message"], "Patient document updated successfully");
    let page: Value = server.get(&ana, &documents).await?.json().await?;
    assert_eq!(page["docs"][0]["file_name"], "anamnese-v2.pdf");

    assert_eq!(server.get(&bruno, &doc_path).await?.status(), StatusCode::FORBIDDEN);
    assert_eq!(server.delete(&ana, &doc_path).await?.status(), StatusCode::NO_CONTENT);
    assert_eq!(server.get(&ana, &doc_path).await?.status(), StatusCode::NOT_FOUND);
    Ok(())
}
