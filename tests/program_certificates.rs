use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

mod common;

const GREEN_LABEL: &str = "/api/programs/green-label/certificates";
const GREEN_TOLL: &str = "/api/programs/green-toll/certificates";

#[tokio::test]
async fn issue_update_list_and_remove_a_certificate() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    t.seed_product(company_id, brand_id, "green_label", "Eco Paint", "eco-paint").await?;
    let cert_id = t.seed_certification("green_label", "Green Label Gold").await?;

    let (status, body) = t
        .post(
            GREEN_LABEL,
            &admin,
            json!({
                "product_slug": "eco-paint",
                "certification_id": cert_id,
                "certificate_no": "GL-2025-0001",
                "issue_date": "2025-01-15",
                "expiry_date": "2027-01-14",
                "status_id": 1,
                "meta": { "auditor": "ACME Labs" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["program"]["code"], "green_label");
    assert_eq!(body["data"]["product"]["slug"], "eco-paint");
    assert_eq!(body["data"]["company"]["name"], "Acme");
    assert_eq!(body["data"]["brand"]["category"]["slug"], "paint");
    assert_eq!(body["data"]["certificate_no"], "GL-2025-0001");
    assert_eq!(body["data"]["status"]["code"], "active");
    assert_eq!(body["data"]["meta"]["auditor"], "ACME Labs");

    let (status, body) = t
        .put(
            &format!("{GREEN_LABEL}/eco-paint/{cert_id}"),
            &admin,
            json!({ "certificate_no": "GL-2025-0002", "status_id": 2 }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["certificate_no"], "GL-2025-0002");
    assert_eq!(body["data"]["status"]["code"], "expired");
    // Update replaces the attributes as a whole.
    assert!(body["data"].get("issue_date").is_none(), "{body}");

    let (status, body) = t.get(GREEN_LABEL, &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["certificate_no"], "GL-2025-0002");

    let (status, _) = t.delete(&format!("{GREEN_LABEL}/eco-paint/{cert_id}"), &admin).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = t.get(GREEN_LABEL, &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 0);

    Ok(())
}

#[tokio::test]
async fn certificate_from_another_program_is_a_mismatch() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    t.seed_product(company_id, brand_id, "green_label", "Eco Paint", "eco-paint").await?;
    t.seed_product(company_id, brand_id, "green_toll", "Toll Tag", "toll-tag").await?;
    let label_cert = t.seed_certification("green_label", "Green Label Gold").await?;
    let toll_cert = t.seed_certification("green_toll", "Green Toll Pass").await?;

    // Product belongs to green_label, route is green_toll.
    let (status, body) = t
        .post(GREEN_TOLL, &admin, json!({ "product_slug": "eco-paint", "certification_id": toll_cert }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"]["code"], "program_mismatch");

    // Certification belongs to green_label, route and product are green_toll.
    let (status, body) = t
        .post(GREEN_TOLL, &admin, json!({ "product_slug": "toll-tag", "certification_id": label_cert }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "program_mismatch");

    let assignments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_has_certification")
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(assignments, 0);

    Ok(())
}

#[tokio::test]
async fn removing_a_missing_certificate_is_not_found() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    t.seed_product(company_id, brand_id, "green_label", "Eco Paint", "eco-paint").await?;
    let cert_id = t.seed_certification("green_label", "Green Label Gold").await?;

    let (status, body) = t.delete(&format!("{GREEN_LABEL}/eco-paint/{cert_id}"), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "program_certificate_not_found");

    let (status, body) = t.delete(&format!("{GREEN_LABEL}/no-such-product/{cert_id}"), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "product_not_found");

    let (status, body) = t.delete(&format!("{GREEN_LABEL}/eco-paint/9999"), &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "certification_not_found");

    Ok(())
}

#[tokio::test]
async fn duplicate_certificate_conflicts() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    t.seed_product(company_id, brand_id, "green_label", "Eco Paint", "eco-paint").await?;
    let cert_id = t.seed_certification("green_label", "Green Label Gold").await?;

    let body = json!({ "product_slug": "eco-paint", "certification_id": cert_id });
    let (status, created) = t.post(GREEN_LABEL, &admin, body.clone()).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["meta"], json!({}), "absent metadata reads back as an empty object");

    let (status, body) = t.post(GREEN_LABEL, &admin, body).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "conflict");

    Ok(())
}

#[tokio::test]
async fn invalid_attributes_are_rejected_before_writing() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    t.seed_product(company_id, brand_id, "green_label", "Eco Paint", "eco-paint").await?;
    let cert_id = t.seed_certification("green_label", "Green Label Gold").await?;

    let (status, body) = t
        .post(
            GREEN_LABEL,
            &admin,
            json!({
                "product_slug": "eco-paint",
                "certification_id": cert_id,
                "issue_date": "2026-01-01",
                "expiry_date": "2025-01-01"
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"]["code"], "validation_failed");

    let (status, body) = t
        .post(
            GREEN_LABEL,
            &admin,
            json!({ "product_slug": "eco-paint", "certification_id": cert_id, "status_id": 999 }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["error"]["details"].get("status_id").is_some(), "{body}");

    let assignments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_has_certification")
        .fetch_one(&t.pool)
        .await?;
    assert_eq!(assignments, 0);

    Ok(())
}

#[tokio::test]
async fn list_is_scoped_to_the_program_and_searchable() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (company_id, brand_id) = t.seed_brand().await?;
    t.seed_product(company_id, brand_id, "green_label", "Eco Paint", "eco-paint").await?;
    t.seed_product(company_id, brand_id, "green_label", "Solar Varnish", "solar-varnish").await?;
    t.seed_product(company_id, brand_id, "green_toll", "Toll Tag", "toll-tag").await?;
    let label_cert = t.seed_certification("green_label", "Green Label Gold").await?;
    let toll_cert = t.seed_certification("green_toll", "Green Toll Pass").await?;

    for slug in ["eco-paint", "solar-varnish"] {
        let (status, _) = t
            .post(GREEN_LABEL, &admin, json!({ "product_slug": slug, "certification_id": label_cert }))
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = t
        .post(GREEN_TOLL, &admin, json!({ "product_slug": "toll-tag", "certification_id": toll_cert }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = t.get(GREEN_LABEL, &admin).await?;
    assert_eq!(body["meta"]["total"], 2);
    // Most recently written first.
    assert_eq!(body["data"][0]["product"]["slug"], "solar-varnish");

    let (_, body) = t.get(&format!("{GREEN_LABEL}?search=VARNISH"), &admin).await?;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (_, body) = t.get(&format!("{GREEN_LABEL}?search=%25"), &admin).await?;
    assert_eq!(body["meta"]["total"], 0, "LIKE wildcards are matched literally: {body}");

    let (_, body) = t.get(&format!("{GREEN_LABEL}?page=5&page_size=10"), &admin).await?;
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["meta"]["page"], 5);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));

    let (_, body) = t.get(GREEN_TOLL, &admin).await?;
    assert_eq!(body["meta"]["total"], 1);

    Ok(())
}

#[tokio::test]
async fn program_routes_follow_their_own_permissions() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;
    let (user_xid, user) = t.register_and_login("auditor@example.com").await?;

    t.post("/api/rbac/roles", &admin, json!({ "name": "auditor" })).await?;
    t.post(
        "/api/rbac/roles/auditor/permissions",
        &admin,
        json!({ "permission": "product.certifications.read" }),
    )
    .await?;
    t.post(&format!("/api/rbac/users/{user_xid}/roles"), &admin, json!({ "role": "auditor" }))
        .await?;

    let (status, _) = t.get(GREEN_LABEL, &user).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .post(GREEN_LABEL, &user, json!({ "product_slug": "eco-paint", "certification_id": 1 }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn malformed_path_and_query_values_use_the_error_envelope() -> Result<()> {
    let t = common::spawn_app().await?;
    let (_, admin) = t.admin().await?;

    let (status, body) = t.delete(&format!("{GREEN_LABEL}/eco-paint/abc"), &admin).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request", "{body}");

    let (status, body) = t.get(&format!("{GREEN_LABEL}?page=abc"), &admin).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request", "{body}");

    let (status, body) = t.get("/api/catalog/products?page_size=lots", &admin).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request", "{body}");

    let (status, body) = t.delete("/api/catalog/statuses/first", &admin).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request", "{body}");

    Ok(())
}

#[tokio::test]
async fn configured_programs_without_a_lookup_row_are_reported() -> Result<()> {
    let t = common::spawn_app().await?;

    let codes = vec!["green_label".to_string(), "blue_label".to_string(), "green_toll".to_string()];
    let missing = catalog_api::app::unknown_programs(&t.pool, &codes).await?;
    assert_eq!(missing, vec!["blue_label".to_string()]);

    let missing = catalog_api::app::unknown_programs(&t.pool, &codes[..1]).await?;
    assert!(missing.is_empty());

    Ok(())
}
