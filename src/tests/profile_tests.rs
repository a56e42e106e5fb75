#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::tests::{Account, TestApp};

    fn farm() -> Value {
        json!({
            "farm_name": "Kibet Family Farm",
            "village": "Kapsabet",
            "district": "Nandi",
            "region": "Rift Valley",
            "farm_size_hectares": 2.5,
            "crops": ["maize", "beans", "maize"],
            "irrigation_type": "drip",
            "years_experience": 12
        })
    }

    fn agent(employee_id: &str, max_farmers: i64) -> Value {
        json!({
            "employee_id": employee_id,
            "region": "Rift Valley",
            "districts": ["Nandi", "Uasin Gishu"],
            "specializations": ["soil health"],
            "years_experience": 6,
            "max_farmers": max_farmers
        })
    }

    async fn farmer_with_profile(t: &TestApp, name: &str, email: &str) -> Account {
        let acct = t.register(name, email, "farmer").await;
        let (status, body) = t.put("/api/profiles/farmer/me", &acct.token, farm()).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        acct
    }

    #[tokio::test]
    async fn test_farmer_profile_lifecycle() {
        let t = TestApp::new().await;
        let fiona = t.register("Fiona Farmer", "fiona@farm.test", "farmer").await;

        let (status, _) = t.get("/api/profiles/farmer/me", &fiona.token).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = t.put("/api/profiles/farmer/me", &fiona.token, farm()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["crops"], json!(["maize", "beans"]));
        assert_eq!(body["data"]["irrigation_type"], "drip");

        let mut bigger = farm();
        bigger["farm_size_hectares"] = json!(4.0);
        let (_, body) = t.put("/api/profiles/farmer/me", &fiona.token, bigger).await;
        assert_eq!(body["data"]["farm_size_hectares"], 4.0);

        let mut bad = farm();
        bad["farm_size_hectares"] = json!(0);
        let (status, _) = t.put("/api/profiles/farmer/me", &fiona.token, bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = t.get("/api/auth/me", &fiona.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["profile"]["farm_name"], "Kibet Family Farm");
    }

    #[tokio::test]
    async fn test_profile_roles_are_enforced() {
        let t = TestApp::new().await;
        let fiona = farmer_with_profile(&t, "Fiona Farmer", "fiona@farm.test").await;
        let peter = t.register("Peter Farmer", "peter@farm.test", "farmer").await;
        let alice = t.register("Alice Agent", "alice@ext.test", "agent").await;

        let (status, _) = t.put("/api/profiles/farmer/me", &alice.token, farm()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = t.put("/api/profiles/agent/me", &fiona.token, agent("EXT-001", 5)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let uri = format!("/api/profiles/farmer/{}", fiona.id);
        let (status, _) = t.get(&uri, &peter.token).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = t.get(&uri, &fiona.token).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = t.get(&uri, &alice.token).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_agent_profile_and_unique_employee_id() {
        let t = TestApp::new().await;
        let alice = t.register("Alice Agent", "alice@ext.test", "agent").await;
        let bob = t.register("Bob Agent", "bob@ext.test", "agent").await;

        let (status, _) = t.put("/api/profiles/agent/me", &alice.token, agent("ext 1", 5)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = t.put("/api/profiles/agent/me", &alice.token, agent("EXT-001", 5)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["availability"], "available");
        assert_eq!(body["data"]["rating_description"], "Not Rated");
        assert_eq!(body["data"]["assigned_farmers"], 0);

        let (status, body) = t.put("/api/profiles/agent/me", &bob.token, agent("EXT-001", 5)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"]["message"].as_str().unwrap().contains("EXT-001"));

        t.put("/api/profiles/agent/me", &bob.token, agent("EXT-002", 5)).await;
        let (status, body) = t.get("/api/profiles/agents?region=rift%20valley", &alice.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["total"], 2);
        let (_, body) = t.get("/api/profiles/agents?availability=busy", &alice.token).await;
        assert_eq!(body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn test_assign_agent_respects_capacity() {
        let t = TestApp::new().await;
        let admin = t.admin().await;
        let alice = t.register("Alice Agent", "alice@ext.test", "agent").await;
        t.put("/api/profiles/agent/me", &alice.token, agent("EXT-001", 1)).await;
        let fiona = farmer_with_profile(&t, "Fiona Farmer", "fiona@farm.test").await;
        let peter = farmer_with_profile(&t, "Peter Farmer", "peter@farm.test").await;
        let body = json!({ "agent_id": alice.id });

        let (status, _) =
            t.put(&format!("/api/profiles/farmer/{}/agent", fiona.id), &alice.token, body.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, res) =
            t.put(&format!("/api/profiles/farmer/{}/agent", fiona.id), &admin.token, body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["data"]["assigned_agent_id"], alice.id.to_string());

        // Re-assigning the same pair is a no-op, not a capacity error
        let (status, _) =
            t.put(&format!("/api/profiles/farmer/{}/agent", fiona.id), &admin.token, body.clone()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) =
            t.put(&format!("/api/profiles/farmer/{}/agent", peter.id), &admin.token, body.clone()).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // Only agents can be assigned
        let (status, _) = t
            .put(&format!("/api/profiles/farmer/{}/agent", peter.id), &admin.token, json!({ "agent_id": fiona.id }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, res) = t.get("/api/profiles/agent/me/farmers", &alice.token).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["pagination"]["total"], 1);
        assert_eq!(res["data"][0]["user_id"], fiona.id.to_string());

        let (_, res) = t.get("/api/profiles/agent/me", &alice.token).await;
        assert_eq!(res["data"]["assigned_farmers"], 1);
    }
}
