mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use sisdental_api::store::Table;

fn patient_body(name: &str, email: &str, cpf: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "cpf": cpf,
        "phone": "11999990000",
        "address": "Rua das Flores, 10",
    })
}

#[tokio::test]
async fn create_validates_required_fields() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;

    let res = server.post(&ana, "/api/patients", json!({"name": "Maria", "email": "maria@example.com"})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Phone is required");

    let res = server.post(&ana, "/api/patients", patient_body("Maria", "not-an-email", "")).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid email format");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_or_cpf_is_a_conflict() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;

    let res = server.post(&ana, "/api/patients", patient_body("Maria", "maria@example.com", "123.456.789-00")).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = res.json().await?;
    assert_eq!(created["name"], "Maria");

    let res = server.post(&ana, "/api/patients", patient_body("Maria Two", "maria@example.com", "")).await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(res.json::<Value>().await?["error"], "Patient with this email already exists");

    let res = server.post(&ana, "/api/patients", patient_body("Other", "other@example.com", "123.456.789-00")).await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(res.json::<Value>().await?["error"], "Patient with this CPF already exists");

    let live: Vec<Value> = server
        .store
        .dump(Table::Patients)
        .await
        .into_iter()
        .filter(|p| p["deleted_at"].is_null())
        .collect();
    assert_eq!(live.len(), 1);
    Ok(())
}

#[tokio::test]
async fn update_keeps_its_own_email() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let id = server.create_patient(&ana, "Maria", "maria@example.com").await?;
    server.create_patient(&ana, "João", "joao@example.com").await?;

    let res = server
        .put(&ana, &format!("/api/patients/{}", id), json!({"name": "Maria Souza", "email": "maria@example.com"}))
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["name"], "Maria Souza");

    let res = server
        .put(&ana, &format!("/api/patients/{}", id), json!({"name": "Maria", "email": "joao@example.com"}))
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn deleted_patient_disappears_with_its_assignments() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let bruno = server.account("Dr Bruno").await?;
    let keep = server.create_patient(&ana, "Ana Clara", "clara@example.com").await?;
    let gone = server.create_patient(&ana, "Beatriz", "bia@example.com").await?;

    let res = server
        .post(&ana, "/api/patients/assign", json!({"patient_id": gone, "doctor_id": bruno.doctor_id}))
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = server.delete(&ana, &format!("/api/patients/{}", gone)).await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let body: Value = server.get(&ana, "/api/patients/my").await?.json().await?;
    let ids: Vec<&str> = body["patients"].as_array().unwrap().iter().map(|p| p["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec![keep.as_str()]);
    assert_eq!(body["user"]["email"], "dr.ana@clinic.test");

    let assignments = server.store.dump(Table::PatientDoctors).await;
    assert!(assignments.iter().all(|a| a["patient_id"] != gone.as_str()));

    let res = server.get(&bruno, &format!("/api/patients/{}", gone)).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn sharing_a_patient_with_another_doctor() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let bruno = server.account("Dr Bruno").await?;
    let patient = server.create_patient(&ana, "Maria", "maria@example.com").await?;

    let assign = json!({"patient_id": patient, "doctor_id": bruno.doctor_id, "notes": "ortho"});
    let res = server.post(&bruno, "/api/patients/assign", assign.clone()).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.post(&ana, "/api/patients/assign", assign.clone()).await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let assignment: Value = res.json().await?;

    let res = server.post(&ana, "/api/patients/assign", assign).await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(res.json::<Value>().await?["error"], "Patient is already assigned to this doctor");

    let res = server.get(&bruno, &format!("/api/patients/{}", patient)).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = server.get(&bruno, &format!("/api/patients/{}/doctors", patient)).await?.json().await?;
    assert_eq!(body["patient_doctors"].as_array().unwrap().len(), 2);

    let res = server
        .delete(&ana, &format!("/api/patients/assignments/{}", assignment["id"].as_str().unwrap()))
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = server.get(&bruno, &format!("/api/patients/{}", patient)).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;

    let res = server.get(&ana, "/api/patients/not-a-uuid").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid patient ID");
    Ok(())
}
