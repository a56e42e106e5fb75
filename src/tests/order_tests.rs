#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::tests::{Account, TestApp};

    struct Shopfront {
        admin: Account,
        manager: Account,
        shop: Uuid,
        seed: Uuid,
        fertilizer: Uuid,
    }

    async fn shopfront(t: &TestApp) -> Shopfront {
        let admin = t.admin().await;
        let manager = t.register("Sam Manager", "sam@shop.test", "shop_manager").await;
        let supplier = t.supplier(&admin.token, "sales@green.test").await;
        let shop = t.shop(&admin.token, manager.id).await;
        let seed = t.product(&admin.token, supplier, shop, 250.0, 10).await;
        let fertilizer = t.product(&admin.token, supplier, shop, 1999.99, 3).await;
        Shopfront { admin, manager, shop, seed, fertilizer }
    }

    async fn stock(t: &TestApp, token: &str, product: Uuid) -> i64 {
        let (_, body) = t.get(&format!("/api/products/{}", product), token).await;
        body["data"]["stock_quantity"].as_i64().unwrap()
    }

    async fn place(t: &TestApp, token: &str, lines: Value) -> (StatusCode, Value) {
        t.post("/api/orders", token, json!({ "items": lines, "delivery_address": "Plot 7, Molo" })).await
    }

    #[tokio::test]
    async fn test_place_order_prices_and_reserves_stock() {
        let t = TestApp::new().await;
        let f = shopfront(&t).await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;

        let (status, body) = place(
            &t,
            &fiona.token,
            json!([{ "product_id": f.seed, "quantity": 4 }, { "product_id": f.fertilizer, "quantity": 2 }]),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        let order = &body["data"];
        assert_eq!(order["status"], "pending");
        assert_eq!(order["payment_status"], "unpaid");
        assert_eq!(order["buyer_id"], fiona.id.to_string());
        assert_eq!(order["shop_id"], f.shop.to_string());
        assert_eq!(order["items"][0]["subtotal"], 1000.0);
        assert_eq!(order["items"][1]["unit_price"], 1999.99);
        assert_eq!(order["total_amount"], 4999.98);
        assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));

        assert_eq!(stock(&t, &fiona.token, f.seed).await, 6);
        assert_eq!(stock(&t, &fiona.token, f.fertilizer).await, 1);
        assert_eq!(t.state.metrics.get_snapshot().orders_placed, 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_everything_untouched() {
        let t = TestApp::new().await;
        let f = shopfront(&t).await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;

        let (status, body) = place(
            &t,
            &fiona.token,
            json!([{ "product_id": f.seed, "quantity": 5 }, { "product_id": f.fertilizer, "quantity": 4 }]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("insufficient stock"));

        // The first line's decrement was rolled back with the transaction
        assert_eq!(stock(&t, &fiona.token, f.seed).await, 10);
        let (_, body) = t.get("/api/orders", &fiona.token).await;
        assert_eq!(body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn test_order_request_validation() {
        let t = TestApp::new().await;
        let f = shopfront(&t).await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;

        let (status, _) = place(&t, &fiona.token, json!([])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = place(&t, &fiona.token, json!([{ "product_id": f.seed, "quantity": 0 }])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = place(
            &t,
            &fiona.token,
            json!([{ "product_id": f.seed, "quantity": 1 }, { "product_id": f.seed, "quantity": 1 }]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = place(&t, &fiona.token, json!([{ "product_id": Uuid::new_v4(), "quantity": 1 }])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Shop managers sell, they do not buy
        let (status, _) = place(&t, &f.manager.token, json!([{ "product_id": f.seed, "quantity": 1 }])).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_order_visibility_by_role() {
        let t = TestApp::new().await;
        let f = shopfront(&t).await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;
        let peter = t.register("Peter Farmer", "peter@farm.test", "farmer").await;
        let olga = t.register("Olga Manager", "olga@shop.test", "shop_manager").await;

        let (_, body) = place(&t, &fiona.token, json!([{ "product_id": f.seed, "quantity": 1 }])).await;
        let order_id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/orders/{}", order_id);

        let (status, _) = t.get(&uri, &fiona.token).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = t.get(&uri, &f.manager.token).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = t.get(&uri, &f.admin.token).await;
        assert_eq!(status, StatusCode::OK);

        // Out-of-scope orders look missing
        let (status, _) = t.get(&uri, &peter.token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = t.get(&uri, &olga.token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = t.get("/api/orders", &peter.token).await;
        assert_eq!(body["pagination"]["total"], 0);
        let (_, body) = t.get("/api/orders?status=pending", &f.manager.token).await;
        assert_eq!(body["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn test_status_lifecycle_and_stats() {
        let t = TestApp::new().await;
        let f = shopfront(&t).await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;
        let (_, body) = place(&t, &fiona.token, json!([{ "product_id": f.seed, "quantity": 2 }])).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let status_uri = format!("/api/orders/{}/status", id);

        // Buyers may only cancel
        let (status, _) = t.put(&status_uri, &fiona.token, json!({ "status": "confirmed" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Skipping steps is a conflict
        let (status, _) = t.put(&status_uri, &f.manager.token, json!({ "status": "delivered" })).await;
        assert_eq!(status, StatusCode::CONFLICT);

        for next in ["confirmed", "processing", "shipped", "delivered"] {
            let (status, body) = t.put(&status_uri, &f.manager.token, json!({ "status": next })).await;
            assert_eq!(status, StatusCode::OK, "{}: {}", next, body);
            assert_eq!(body["data"]["status"], next);
        }

        let (status, _) = t.put(&status_uri, &f.admin.token, json!({ "status": "cancelled" })).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) =
            t.put(&format!("/api/orders/{}/payment", id), &f.manager.token, json!({ "payment_status": "paid" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["payment_status"], "paid");
        let (status, _) =
            t.put(&format!("/api/orders/{}/payment", id), &fiona.token, json!({ "payment_status": "refunded" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = t.get("/api/orders/stats", &f.manager.token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, body) = t.get("/api/orders/stats", &f.admin.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["by_status"]["delivered"], 1);
        assert_eq!(body["data"]["by_status"]["pending"], 0);
        assert_eq!(body["data"]["delivered_revenue"], 500.0);
    }

    #[tokio::test]
    async fn test_buyer_cancel_restores_stock() {
        let t = TestApp::new().await;
        let f = shopfront(&t).await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;
        let (_, body) = place(&t, &fiona.token, json!([{ "product_id": f.fertilizer, "quantity": 3 }])).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(stock(&t, &fiona.token, f.fertilizer).await, 0);

        let (status, body) =
            t.put(&format!("/api/orders/{}/status", id), &fiona.token, json!({ "status": "cancelled" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "cancelled");
        assert_eq!(stock(&t, &fiona.token, f.fertilizer).await, 3);
    }
}
