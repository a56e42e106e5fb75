#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::tests::TestApp;

    #[tokio::test]
    async fn test_supplier_crud_and_roles() {
        let t = TestApp::new().await;
        let admin = t.admin().await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;

        // Farmers read the catalogue but do not edit it
        let (status, _) = t
            .post(
                "/api/suppliers",
                &fiona.token,
                json!({ "name": "X", "email": "x@y.test", "phone": "+254700000000",
                        "address": { "city": "Nakuru", "region": "Rift Valley" }, "categories": ["seeds"] }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let id = t.supplier(&admin.token, "sales@green.test").await;
        let (status, body) = t.get(&format!("/api/suppliers/{}", id), &fiona.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["address"]["country"], "Kenya");
        assert_eq!(body["data"]["status"], "active");
        assert_eq!(body["data"]["rating_description"], "Not Rated");

        let (status, body) =
            t.put(&format!("/api/suppliers/{}", id), &admin.token, json!({ "payment_terms": "cash" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["payment_terms"], "cash");

        let (status, _) = t.delete(&format!("/api/suppliers/{}", id), &fiona.token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = t.delete(&format!("/api/suppliers/{}", id), &admin.token).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = t.get(&format!("/api/suppliers/{}", id), &admin.token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_supplier_validation_and_duplicates() {
        let t = TestApp::new().await;
        let admin = t.admin().await;
        let (status, body) = t
            .post(
                "/api/suppliers",
                &admin.token,
                json!({ "name": "Green", "email": "sales@green.test", "phone": "12",
                        "address": { "city": "Nakuru", "region": "Rift Valley" }, "categories": ["seeds"] }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["details"]["field"], "phone");

        t.supplier(&admin.token, "sales@green.test").await;
        let (status, _) = t
            .post(
                "/api/suppliers",
                &admin.token,
                json!({ "name": "Copy", "email": "Sales@Green.test", "phone": "+254700111222",
                        "address": { "city": "Nakuru", "region": "Rift Valley" }, "categories": ["seeds"] }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_supplier_rating_and_stats() {
        let t = TestApp::new().await;
        let admin = t.admin().await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;
        let id = t.supplier(&admin.token, "sales@green.test").await;

        let (status, _) = t.post(&format!("/api/suppliers/{}/rate", id), &fiona.token, json!({ "rating": 6 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        t.post(&format!("/api/suppliers/{}/rate", id), &fiona.token, json!({ "rating": 5 })).await;
        let (status, body) = t.post(&format!("/api/suppliers/{}/rate", id), &admin.token, json!({ "rating": 4 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["rating"], 4.5);
        assert_eq!(body["data"]["rating_count"], 2);
        assert_eq!(body["data"]["rating_description"], "Excellent");

        let (status, body) = t.get("/api/suppliers/stats", &fiona.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["by_status"]["active"], 1);
        assert_eq!(body["data"]["by_category"]["seeds"], 1);

        let (status, body) = t.get("/api/suppliers/active?limit=5", &fiona.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, body) = t.get("/api/suppliers?min_rating=4&category=seeds", &fiona.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 1);
        let (status, _) = t.get("/api/suppliers?min_rating=7", &fiona.token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_supplier_rating_keeps_full_precision() {
        let t = TestApp::new().await;
        let admin = t.admin().await;
        let id = t.supplier(&admin.token, "sales@green.test").await;

        let mut body = json!(null);
        for rating in [1, 1, 2] {
            let (status, res) = t.post(&format!("/api/suppliers/{}/rate", id), &admin.token, json!({ "rating": rating })).await;
            assert_eq!(status, StatusCode::OK);
            body = res;
        }
        assert_eq!(body["data"]["rating"], 1.33);
        assert_eq!(body["data"]["rating_description"], "Poor");

        // The stored average is not rounded, so later ratings do not drift
        let stored: f64 = sqlx::query_scalar("SELECT rating FROM suppliers WHERE id = ?1")
            .bind(id.to_string())
            .fetch_one(&t.state.db)
            .await
            .unwrap();
        assert!((stored - 4.0 / 3.0).abs() < 1e-9, "stored rating {}", stored);
    }

    #[tokio::test]
    async fn test_shop_management_rules() {
        let t = TestApp::new().await;
        let admin = t.admin().await;
        let sam = t.register("Sam Manager", "sam@shop.test", "shop_manager").await;
        let other = t.register("Olga Manager", "olga@shop.test", "shop_manager").await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;

        // Managers must hold the shop_manager role
        let (status, _) = t
            .post(
                "/api/shops",
                &admin.token,
                json!({ "name": "Bad", "manager_id": fiona.id, "district": "Molo",
                        "region": "Rift Valley", "phone": "+254711000111" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let shop = t.shop(&admin.token, sam.id).await;

        let (status, body) =
            t.put(&format!("/api/shops/{}", shop), &sam.token, json!({ "opening_hours": "Mon-Sat 8-18" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["opening_hours"], "Mon-Sat 8-18");

        let (status, _) = t.put(&format!("/api/shops/{}", shop), &sam.token, json!({ "is_active": false })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = t.put(&format!("/api/shops/{}", shop), &other.token, json!({ "name": "Mine now" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = t.get(&format!("/api/shops?manager_id={}", sam.id), &fiona.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn test_products_filters_and_stocking_rights() {
        let t = TestApp::new().await;
        let admin = t.admin().await;
        let sam = t.register("Sam Manager", "sam@shop.test", "shop_manager").await;
        let olga = t.register("Olga Manager", "olga@shop.test", "shop_manager").await;
        let supplier = t.supplier(&admin.token, "sales@green.test").await;
        let sams_shop = t.shop(&admin.token, sam.id).await;

        let cheap = t.product(&sam.token, supplier, sams_shop, 150.0, 10).await;
        t.product(&admin.token, supplier, sams_shop, 4500.0, 0).await;

        // Olga cannot stock Sam's shop
        let (status, _) = t
            .post(
                "/api/products",
                &olga.token,
                json!({ "name": "Urea", "category": "fertilizers", "unit": "bag", "price": 3000.0,
                        "supplier_id": supplier, "shop_id": sams_shop }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = t
            .post(
                "/api/products",
                &admin.token,
                json!({ "name": "Urea", "category": "fertilizers", "unit": "bag", "price": -1.0,
                        "supplier_id": supplier }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = t.get("/api/products?in_stock=true", &olga.token).await;
        assert_eq!(body["pagination"]["total"], 1);
        assert_eq!(body["data"][0]["id"], cheap.to_string());

        let (_, body) = t.get("/api/products?min_price=1000&max_price=5000", &olga.token).await;
        assert_eq!(body["pagination"]["total"], 1);
        let (status, _) = t.get("/api/products?min_price=5000&max_price=1000", &olga.token).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = t.get(&format!("/api/shops/{}/products", sams_shop), &olga.token).await;
        assert_eq!(body["pagination"]["total"], 2);
        let (_, body) = t.get(&format!("/api/suppliers/{}/products", supplier), &olga.token).await;
        assert_eq!(body["pagination"]["total"], 2);

        // A supplier with products cannot be removed
        let (status, _) = t.delete(&format!("/api/suppliers/{}", supplier), &admin.token).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
