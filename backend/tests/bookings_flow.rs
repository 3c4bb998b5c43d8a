mod common;

use anyhow::Result;
use axum::http::StatusCode;
use bson::oid::ObjectId;
use common::{expect_json, object_id, TestApp};
use serde_json::json;

async fn book(app: &TestApp, tourist: &str, guide: &str) -> Result<ObjectId> {
    let response = app
        .post_json(
            "/bookings",
            &json!({
                "touristEmail": tourist,
                "tourGuideEmail": guide,
                "packageId": "65f1c2a4b7e8d90012345678",
                "price": 4200,
                "tourDate": "2025-02-14",
                "status": "Accepted",
            }),
        )
        .await?;
    let created = expect_json(response, StatusCode::OK).await?;
    object_id(&created, "insertedId")
}

#[tokio::test]
async fn new_bookings_start_pending() -> Result<()> {
    let app = TestApp::new();

    let id = book(&app, "rahim@example.com", "karim@example.com").await?;

    let booking = app
        .get_json(&format!("/bookings/{id}"), StatusCode::OK)
        .await?;
    assert_eq!(booking["status"], "Pending");
    assert_eq!(booking["tourDate"], "2025-02-14");
    assert_eq!(booking["price"], 4200);

    Ok(())
}

#[tokio::test]
async fn bookings_list_and_count_by_tourist() -> Result<()> {
    let app = TestApp::new();

    let count = app
        .get_json("/bookings/count?email=rahim@example.com", StatusCode::OK)
        .await?;
    assert_eq!(count, json!({ "count": 0 }));

    book(&app, "rahim@example.com", "karim@example.com").await?;
    book(&app, "rahim@example.com", "nasrin@example.com").await?;
    book(&app, "salma@example.com", "karim@example.com").await?;

    let rahim = app
        .get_json("/bookings?email=rahim@example.com", StatusCode::OK)
        .await?;
    assert_eq!(rahim.as_array().map(Vec::len), Some(2));

    let count = app
        .get_json("/bookings/count?email=rahim@example.com", StatusCode::OK)
        .await?;
    assert_eq!(count["count"], 2);

    let everything = app.get_json("/bookings/count", StatusCode::OK).await?;
    assert_eq!(everything["count"], 3);

    let all = app.get_json("/bookings?email=", StatusCode::OK).await?;
    assert_eq!(all.as_array().map(Vec::len), Some(3));

    let karim = app
        .get_json("/bookings/guide/karim@example.com", StatusCode::OK)
        .await?;
    let tourists: Vec<&str> = karim
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|booking| booking["touristEmail"].as_str())
        .collect();
    assert_eq!(tourists, vec!["rahim@example.com", "salma@example.com"]);

    Ok(())
}

#[tokio::test]
async fn guide_updates_booking_status() -> Result<()> {
    let app = TestApp::new();
    let id = book(&app, "rahim@example.com", "karim@example.com").await?;

    let accepted = app
        .patch_json(&format!("/bookings/{id}"), &json!({ "status": "Accepted" }))
        .await?;
    let accepted = expect_json(accepted, StatusCode::OK).await?;
    assert_eq!(accepted["matchedCount"], 1);
    assert_eq!(accepted["modifiedCount"], 1);

    let booking = app
        .get_json(&format!("/bookings/{id}"), StatusCode::OK)
        .await?;
    assert_eq!(booking["status"], "Accepted");

    let missing = app
        .patch_json(
            &format!("/bookings/{}", ObjectId::new()),
            &json!({ "status": "Rejected" }),
        )
        .await?;
    let missing = expect_json(missing, StatusCode::OK).await?;
    assert_eq!(missing["matchedCount"], 0);

    let blank = app
        .patch_json(&format!("/bookings/{id}"), &json!({ "status": "" }))
        .await?;
    assert_eq!(blank.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let malformed = app.get("/bookings/not-a-booking").await?;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn bookings_need_a_tourist_email() -> Result<()> {
    let app = TestApp::new();

    let response = app
        .post_json("/bookings", &json!({ "packageId": "65f1c2a4b7e8d90012345678" }))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    Ok(())
}
