mod common;

use anyhow::Result;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

use sisdental_api::store::Table;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-an-image";

#[tokio::test]
async fn uploaded_images_are_stored_and_served() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let patient = server.create_patient(&ana, "Maria", "maria@example.com").await?;
    let upload = server.url(&format!("/api/patients/{}/upload", patient));

    let form = Form::new()
        .text("type", "xray")
        .text("title", "Panorâmica")
        .text("tooth_number", "36")
        .part("file", Part::bytes(PNG.to_vec()).file_name("x ray.png").mime_str("image/png")?);
    let res = server.client.post(&upload).bearer_auth(&ana.token).multipart(form).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let body: Value = res.json().await?;
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("/uploads/patients/patient_{}_", patient)), "{}", url);
    assert!(url.ends_with("_x_ray.png"), "{}", url);
    assert_eq!(body["file_size"], PNG.len());
    assert_eq!(body["image"]["tooth_number"], 36);
    assert_eq!(body["image"]["title"], "Panorâmica");

    let served = server.client.get(server.url(&url)).send().await?;
    assert_eq!(served.status(), StatusCode::OK);
    assert_eq!(served.bytes().await?.as_ref(), PNG);

    let images: Value = server.get(&ana, &format!("/api/patients/{}/images", patient)).await?.json().await?;
    assert_eq!(images.as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn uploads_reject_non_images_and_strangers() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let bruno = server.account("Dr Bruno").await?;
    let patient = server.create_patient(&ana, "Maria", "maria@example.com").await?;
    let upload = server.url(&format!("/api/patients/{}/upload", patient));

    let text = Form::new().part("file", Part::bytes(b"hello".to_vec()).file_name("notes.txt").mime_str("text/plain")?);
    let res = server.client.post(&upload).bearer_auth(&ana.token).multipart(text).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid file type. Only images are allowed");

    let empty = Form::new().text("title", "nothing attached");
    let res = server.client.post(&upload).bearer_auth(&ana.token).multipart(empty).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "No file provided");

    let image = Form::new().part("file", Part::bytes(PNG.to_vec()).file_name("a.png").mime_str("image/png")?);
    let res = server.client.post(&upload).bearer_auth(&bruno.token).multipart(image).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    assert!(server.store.dump(Table::PatientImages).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn reports_summarise_the_tenant() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let patient = server.create_patient(&ana, "Maria", "maria@example.com").await?;

    let today = Utc::now().format("%Y-%m-%dT10:00:00Z").to_string();
    server.post(&ana, "/api/appointments", json!({"patient_id": patient, "date_time": today})).await?;
    server.post(&ana, "/api/finances", json!({"description": "Limpeza", "amount": 300, "status": "paid"})).await?;
    server.post(&ana, "/api/finances", json!({"description": "Canal", "amount": 200})).await?;
    server
        .post(&ana, "/api/finances", json!({"description": "Luvas", "amount": 50, "type": "expense", "status": "paid"}))
        .await?;

    let stats: Value = server.get(&ana, "/api/reports/dashboard-stats").await?.json().await?;
    assert_eq!(stats["total_patients"], 1);
    assert_eq!(stats["total_appointments"], 1);
    assert_eq!(stats["today_appointments"], 1);
    assert_eq!(stats["month_revenue"].as_f64(), Some(300.0));
    assert_eq!(stats["pending_payments"].as_f64(), Some(200.0));

    let report: Value = server.get(&ana, "/api/reports/financial?period=month").await?.json().await?;
    assert_eq!(report["period"], "month");
    assert_eq!(report["total_income"].as_f64(), Some(500.0));
    assert_eq!(report["total_expenses"].as_f64(), Some(50.0));
    assert_eq!(report["net_profit"].as_f64(), Some(450.0));
    assert_eq!(report["transaction_count"], 3);

    let report: Value = server.get(&ana, "/api/reports/appointments?period=week").await?.json().await?;
    assert_eq!(report["total_appointments"], 1);

    let res = server.get(&ana, "/api/reports/financial?period=decade").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let daily: Value = server.get(&ana, "/api/reports/daily-appointments").await?.json().await?;
    assert_eq!(daily[0]["patient_name"], "Maria");
    let res = server.get(&ana, "/api/reports/daily-appointments?date=03/04/2030").await?;
    assert_eq!(res.json::<Value>().await?["error"], "Invalid date format. Use YYYY-MM-DD");
    Ok(())
}

#[tokio::test]
async fn search_spans_patients_appointments_and_finances() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;
    let maria = server.create_patient(&ana, "Maria Silva", "maria@example.com").await?;
    server.create_patient(&ana, "João Souza", "joao@example.com").await?;
    server
        .post(&ana, "/api/appointments", json!({"patient_id": maria, "date_time": "2030-03-04T14:00:00Z", "type": "Limpeza"}))
        .await?;
    server.post(&ana, "/api/finances", json!({"description": "Limpeza semestral", "amount": 120})).await?;

    let res = server.get(&ana, "/api/search").await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Search query is required");

    let found: Value = server.get(&ana, "/api/search?q=limpeza").await?.json().await?;
    assert_eq!(found["appointments"].as_array().unwrap().len(), 1);
    assert_eq!(found["finances"].as_array().unwrap().len(), 1);
    assert_eq!(found["total"], 2);

    let patients: Value = server.get(&ana, "/api/search/patients?q=silva").await?.json().await?;
    assert_eq!(patients.as_array().unwrap().len(), 1);
    assert_eq!(patients[0]["name"], "Maria Silva");

    let appointments: Value = server.get(&ana, "/api/search/appointments?q=LIMP").await?.json().await?;
    assert_eq!(appointments.as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn settings_echo_defaults_and_validate_writes() -> Result<()> {
    let server = common::spawn().await?;
    let ana = server.account("Dr Ana").await?;

    let clinic: Value = server.get(&ana, "/api/settings/clinic").await?.json().await?;
    assert_eq!(clinic["currency"], "BRL");
    assert_eq!(clinic["user_id"], ana.user_id.to_string());

    let user: Value = server.get(&ana, "/api/settings/user").await?.json().await?;
    assert_eq!(user["user_id"], ana.user_id.to_string());

    let res = server.put(&ana, "/api/settings/clinic", json!({"currency": "USD"})).await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?["message"], "Settings updated successfully");

    let res = server.put(&ana, "/api/settings/user", json!({"calendar_start": "monday"})).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.json::<Value>().await?["error"], "Invalid request body");
    Ok(())
}
