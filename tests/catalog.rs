use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

#[tokio::test]
async fn products_paginate_and_search_consistently() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    for i in 0..5 {
        t.seed_product(company_id, brand_id, "green_label", &format!("Eco Paint {i}"), &format!("eco-paint-{i}"))
            .await?;
    }
    t.seed_product(company_id, brand_id, "green_toll", "Toll Tag", "toll-tag").await?;

    let (status, body) = t.get("/api/catalog/products?page=1&page_size=2", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 6);
    assert_eq!(body["meta"]["page_size"], 2);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let mut seen = 0;
    for page in 1..=4 {
        let (_, body) = t
            .get(&format!("/api/catalog/products?search=a&page={page}&page_size=2"), &admin)
            .await?;
        assert_eq!(body["meta"]["total"], 6);
        seen += body["data"].as_array().map(Vec::len).unwrap_or_default();
    }
    assert_eq!(seen, 6, "pages must add up to the reported total");

    let (_, body) = t.get("/api/catalog/products?program=green_label&search=paint", &admin).await?;
    assert_eq!(body["meta"]["total"], 5);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(5));

    let (_, body) = t.get("/api/catalog/products?search=TOLL%20tag", &admin).await?;
    assert_eq!(body["meta"]["total"], 1, "ASCII search ignores case: {body}");
    assert_eq!(body["data"][0]["slug"], "toll-tag");

    let (_, body) = t.get("/api/catalog/products?search=eco-paint-3", &admin).await?;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["slug"], "eco-paint-3");

    let (_, body) = t.get("/api/catalog/products?page=9&page_size=5", &admin).await?;
    assert_eq!(body["meta"]["total"], 6);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    // Non-positive values fall back to the defaults.
    let (_, body) = t.get("/api/catalog/products?page=0&page_size=-1", &admin).await?;
    assert_eq!(body["meta"]["page"], 1);
    assert_eq!(body["meta"]["page_size"], 20);

    Ok(())
}

#[tokio::test]
async fn empty_listing_still_carries_meta() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;

    let (status, body) = t.get("/api/catalog/products", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["meta"]["total"], 0);

    Ok(())
}

#[tokio::test]
async fn product_lifecycle() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    let program_id = t.program_id("green_label").await?;

    let create = json!({
        "company_id": company_id,
        "brand_id": brand_id,
        "program_id": program_id,
        "name": "Eco Paint",
        "slug": "eco-paint",
        "attributes": { "volume": "5L" }
    });
    let (status, body) = t.post("/api/catalog/products", &admin, create.clone()).await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["program"]["code"], "green_label");
    assert_eq!(body["data"]["attributes"]["volume"], "5L");

    let (status, body) = t.post("/api/catalog/products", &admin, create).await?;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = t
        .put(
            "/api/catalog/products/eco-paint",
            &admin,
            json!({
                "company_id": company_id,
                "brand_id": brand_id,
                "program_id": program_id,
                "name": "Eco Paint Plus",
                "slug": "eco-paint",
                "is_active": false
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["name"], "Eco Paint Plus");
    assert_eq!(body["data"]["is_active"], false);

    let (status, body) = t.get("/api/catalog/products/eco-paint", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Eco Paint Plus");

    let (status, _) = t.delete("/api/catalog/products/eco-paint", &admin).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t.get("/api/catalog/products/eco-paint", &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "product_not_found");

    Ok(())
}

#[tokio::test]
async fn product_payload_is_validated() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;

    let (status, body) = t
        .post(
            "/api/catalog/products",
            &admin,
            json!({
                "company_id": company_id,
                "brand_id": brand_id,
                "program_id": 999,
                "name": "Eco Paint",
                "slug": "eco-paint"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["error"]["details"].get("program_id").is_some(), "{body}");

    let (status, body) = t
        .post(
            "/api/catalog/products",
            &admin,
            json!({
                "company_id": company_id,
                "brand_id": brand_id,
                "program_id": 1,
                "name": "",
                "slug": "Not A Slug"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert!(body["error"]["details"].get("name").is_some(), "{body}");
    assert!(body["error"]["details"].get("slug").is_some(), "{body}");

    Ok(())
}

#[tokio::test]
async fn product_certificates_without_program_rule() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    t.seed_product(company_id, brand_id, "green_label", "Eco Paint", "eco-paint").await?;
    let toll_cert = t.seed_certification("green_toll", "Green Toll Pass").await?;

    // The plain product route does not compare programs.
    let (status, body) = t
        .post(
            "/api/catalog/products/eco-paint/certifications",
            &admin,
            json!({ "certification_id": toll_cert, "certificate_no": "GT-1" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["certification"]["program"]["code"], "green_toll");

    let (status, body) = t.get("/api/catalog/products/eco-paint/certifications", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);

    let (status, body) = t
        .put(
            &format!("/api/catalog/products/eco-paint/certifications/{toll_cert}"),
            &admin,
            json!({ "certificate_no": "GT-2" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["certificate_no"], "GT-2");

    let (status, body) = t
        .post(
            "/api/catalog/products/eco-paint/certifications",
            &admin,
            json!({ "certification_id": 9999 }),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "certification_not_found");

    let (status, _) = t
        .delete(&format!("/api/catalog/products/eco-paint/certifications/{toll_cert}"), &admin)
        .await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t
        .delete(&format!("/api/catalog/products/eco-paint/certifications/{toll_cert}"), &admin)
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "program_certificate_not_found");

    Ok(())
}

#[tokio::test]
async fn lookups_can_be_managed() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;

    let (status, body) = t.get("/api/catalog/programs", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let (status, body) = t
        .post("/api/catalog/statuses", &admin, json!({ "code": "suspended", "name": "Suspended" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let status_id = body["data"]["id"].as_i64().unwrap_or_default();

    let (status, body) = t
        .put(
            &format!("/api/catalog/statuses/{status_id}"),
            &admin,
            json!({ "code": "suspended", "name": "On hold" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["name"], "On hold");

    let (status, _) = t.delete(&format!("/api/catalog/statuses/{status_id}"), &admin).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t.delete(&format!("/api/catalog/statuses/{status_id}"), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "status_not_found");

    let program_id = t.program_id("green_label").await?;
    let (status, body) = t
        .post(
            "/api/catalog/certifications",
            &admin,
            json!({ "program_id": program_id, "name": "Green Label Silver" }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    // A program still referenced by a certification cannot be removed.
    let (status, _) = t.delete(&format!("/api/catalog/programs/{program_id}"), &admin).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = t.get("/api/catalog/certifications?program=green_label", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["name"], "Green Label Silver");

    Ok(())
}
