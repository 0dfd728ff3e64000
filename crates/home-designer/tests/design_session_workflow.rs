//! Integration tests for design sessions driven through the public service facade and
//! HTTP router: contract loading, build-mode visibility, cut-offs, pricing, and export.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use home_designer::design::{
        CatalogRuleEvaluator, ContractState, DesignEngine, DesignRepository,
        DesignSessionService, Favorite, FavoriteId, PersistenceError, SessionDefaults,
        TreeBundle,
    };
    use serde_json::json;

    pub(super) const PLAN: u64 = 12;
    pub(super) const JOB: u64 = 900;

    pub(super) fn bundle() -> TreeBundle {
        serde_json::from_value(json!({
            "planId": PLAN,
            "planPrice": 350000.0,
            "tree": {
                "versionId": 7,
                "groups": [
                    {
                        "id": 1,
                        "label": "Interior",
                        "subGroups": [{
                            "id": 10,
                            "label": "Kitchen",
                            "points": [{
                                "id": 100,
                                "divPointCatalogId": 1100,
                                "label": "Countertops",
                                "pickType": "Pick1",
                                "choices": [
                                    { "id": 1000, "divChoiceCatalogId": 5000, "label": "Laminate", "price": 0.0 },
                                    { "id": 1001, "divChoiceCatalogId": 5001, "label": "Granite", "price": 2500.0 },
                                    { "id": 1002, "divChoiceCatalogId": 5002, "label": "Quartz", "price": 4000.0 }
                                ]
                            }]
                        }]
                    },
                    {
                        "id": 2,
                        "label": "Exterior",
                        "subGroups": [{
                            "id": 20,
                            "label": "Outdoor",
                            "points": [{
                                "id": 200,
                                "divPointCatalogId": 1200,
                                "label": "Patio",
                                "pickType": "Pick0or1",
                                "cutOffDate": "2026-06-01",
                                "choices": [
                                    { "id": 2000, "divChoiceCatalogId": 6000, "label": "Covered Patio", "price": 5200.0 },
                                    { "id": 2001, "divChoiceCatalogId": 6001, "label": "Pergola", "price": 3400.0 }
                                ]
                            }]
                        }]
                    }
                ]
            }
        }))
        .expect("bundle json is valid")
    }

    /// Agreement on granite plus a change order that swaps it for the covered patio.
    pub(super) fn contract(change_order_status: &str) -> ContractState {
        serde_json::from_value(json!({
            "salesAgreement": {
                "id": 41,
                "salePrice": 361000.0,
                "choices": [{ "divChoiceCatalogId": 5001, "quantity": 1, "price": 2500.0 }]
            },
            "changeOrder": {
                "id": 3,
                "status": change_order_status,
                "amount": 2700.0,
                "createdOn": "2026-08-14",
                "choices": [
                    { "action": "Add", "divChoiceCatalogId": 6000, "quantity": 1, "price": 5200.0 },
                    { "action": "Delete", "divChoiceCatalogId": 5001, "quantity": 1, "price": 2500.0 }
                ]
            }
        }))
        .expect("contract json is valid")
    }

    #[derive(Default)]
    pub(super) struct Repository {
        contracts: Mutex<HashMap<u64, ContractState>>,
        favorites: Mutex<HashMap<FavoriteId, Favorite>>,
    }

    impl Repository {
        pub(super) fn with_contract(contract: ContractState) -> Self {
            let repository = Self::default();
            repository
                .contracts
                .lock()
                .expect("contracts lock")
                .insert(JOB, contract);
            repository
        }

        pub(super) fn stored_favorite(&self, id: FavoriteId) -> Option<Favorite> {
            self.favorites.lock().expect("favorites lock").get(&id).cloned()
        }
    }

    impl DesignRepository for Repository {
        fn load_bundle(&self, plan_id: u64) -> Result<TreeBundle, PersistenceError> {
            if plan_id == PLAN {
                Ok(bundle())
            } else {
                Err(PersistenceError::not_found(format!("plan {plan_id}")))
            }
        }

        fn load_favorite(&self, id: FavoriteId) -> Result<Option<Favorite>, PersistenceError> {
            Ok(Some(
                self.stored_favorite(id)
                    .unwrap_or_else(|| Favorite::new(id, "Favorites")),
            ))
        }

        fn load_contract(&self, job_id: u64) -> Result<ContractState, PersistenceError> {
            self.contracts
                .lock()
                .expect("contracts lock")
                .get(&job_id)
                .cloned()
                .ok_or_else(|| PersistenceError::not_found(format!("job {job_id}")))
        }

        fn save_favorite(&self, favorite: &Favorite) -> Result<(), PersistenceError> {
            self.favorites
                .lock()
                .expect("favorites lock")
                .insert(favorite.id, favorite.clone());
            Ok(())
        }
    }

    pub(super) type Service = DesignSessionService<Repository, CatalogRuleEvaluator>;

    pub(super) fn build_service(repository: Repository) -> (Arc<Service>, Arc<Repository>) {
        let repository = Arc::new(repository);
        let service = Arc::new(DesignSessionService::new(
            Arc::clone(&repository),
            Arc::new(DesignEngine::new(CatalogRuleEvaluator)),
            SessionDefaults::default(),
        ));
        (service, repository)
    }
}

mod contracts {
    use super::common::*;
    use home_designer::design::{ChoiceId, OpenSession};

    fn quantity(service: &Service, session: &home_designer::design::SessionId, id: u64) -> u32 {
        service
            .state(session)
            .expect("session exists")
            .tree
            .choice(ChoiceId(id))
            .map_or(0, |choice| choice.quantity)
    }

    #[test]
    fn approved_change_order_replaces_contracted_choices() {
        let (service, _) = build_service(Repository::with_contract(contract("approved")));
        let summary = service
            .open(OpenSession {
                plan_id: PLAN,
                job_id: Some(JOB),
                ..OpenSession::default()
            })
            .expect("session opens");

        assert_eq!(summary.contracted_choices, 1);
        assert_eq!(quantity(&service, &summary.session_id, 2000), 1);
        assert_eq!(quantity(&service, &summary.session_id, 1001), 0);

        let price = service
            .price_breakdown(&summary.session_id)
            .expect("session exists");
        assert_eq!(price.selections, 5200.0);
        assert_eq!(price.change_order_amount, 2700.0);
        assert_eq!(price.total_price, 363_700.0);
    }

    #[test]
    fn pending_change_order_leaves_the_agreement_in_force() {
        let (service, _) = build_service(Repository::with_contract(contract("pending")));
        let summary = service
            .open(OpenSession {
                plan_id: PLAN,
                job_id: Some(JOB),
                ..OpenSession::default()
            })
            .expect("session opens");

        assert_eq!(summary.contracted_choices, 1);
        assert_eq!(quantity(&service, &summary.session_id, 1001), 1);
        assert_eq!(quantity(&service, &summary.session_id, 2000), 0);

        let price = service
            .price_breakdown(&summary.session_id)
            .expect("session exists");
        assert_eq!(price.change_order_amount, 0.0);
        assert_eq!(price.total_price, 361_000.0);
    }
}

mod visibility {
    use super::common::*;
    use chrono::NaiveDate;
    use home_designer::design::{
        BuildMode, ChoiceDisplay, ChoiceId, Command, OpenSession, PointId, PointStatus,
    };

    #[test]
    fn preview_mode_shows_everything_in_both_views() {
        let (service, _) = build_service(Repository::with_contract(contract("pending")));
        let session = service
            .open(OpenSession {
                plan_id: PLAN,
                job_id: Some(JOB),
                build_mode: Some(BuildMode::Preview),
                ..OpenSession::default()
            })
            .expect("session opens")
            .session_id;

        let filtered = service.filtered_view(&session).expect("view");
        assert_eq!(filtered.choice_count(), 5);
        assert_eq!(
            filtered.display_of(ChoiceId(1001)),
            Some(ChoiceDisplay::Contracted)
        );
        assert_eq!(
            filtered.display_of(ChoiceId(1002)),
            Some(ChoiceDisplay::ViewOnly)
        );

        let contracted = service.contracted_view(&session).expect("view");
        assert_eq!(contracted.choice_count(), 5);
        assert_eq!(
            contracted.display_of(ChoiceId(2001)),
            Some(ChoiceDisplay::ViewOnly)
        );
    }

    #[test]
    fn buyer_contracted_view_holds_only_committed_choices() {
        let (service, _) = build_service(Repository::with_contract(contract("pending")));
        let session = service
            .open(OpenSession {
                plan_id: PLAN,
                job_id: Some(JOB),
                ..OpenSession::default()
            })
            .expect("session opens")
            .session_id;

        let contracted = service.contracted_view(&session).expect("view");
        assert_eq!(contracted.choice_count(), 1);
        assert!(contracted.choice(ChoiceId(1001)).is_some());

        let filtered = service.filtered_view(&session).expect("view");
        assert!(filtered.point(PointId(100)).is_none());
        assert!(filtered.point(PointId(200)).is_some());
    }

    #[test]
    fn points_past_cut_off_complete_and_leave_the_buyer_view() {
        let (service, _) = build_service(Repository::default());
        let today = NaiveDate::from_ymd_opt(2026, 10, 16);
        let session = service
            .open(OpenSession {
                plan_id: PLAN,
                today,
                ..OpenSession::default()
            })
            .expect("session opens")
            .session_id;

        let state = service.state(&session).expect("session exists");
        let patio = state.tree.point(PointId(200)).expect("patio present");
        assert!(patio.is_past_cut_off);
        assert_eq!(patio.status, PointStatus::Completed);

        let filtered = service.filtered_view(&session).expect("view");
        assert!(filtered.point(PointId(200)).is_none());

        service
            .dispatch(&session, Command::SetBuildMode(BuildMode::Presale))
            .expect("dispatch succeeds");
        let presale = service.filtered_view(&session).expect("view");
        assert_eq!(
            presale.display_of(ChoiceId(2000)),
            Some(ChoiceDisplay::ViewOnly)
        );
    }
}

mod routing {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use home_designer::design::{design_router, FavoriteId};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.expect("router dispatch");
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        (status, serde_json::from_slice(&body).expect("json"))
    }

    fn post(uri: &str, payload: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn declining_through_the_api_persists_the_favorite() {
        let (service, repository) = build_service(Repository::default());
        let router = design_router(service);

        let (status, opened) = send(
            router.clone(),
            post(
                "/api/v1/design/sessions",
                json!({ "planId": PLAN, "favoriteId": 55 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let session = opened
            .get("sessionId")
            .and_then(Value::as_str)
            .expect("session id")
            .to_string();

        let (status, summary) = send(
            router.clone(),
            post(
                &format!("/api/v1/design/sessions/{session}/intents"),
                json!({ "type": "decline_point", "divPointCatalogId": 1200 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            summary.pointer("/favorite/declinedPoints/0/divPointCatalogId"),
            Some(&json!(1200))
        );

        let stored = repository
            .stored_favorite(FavoriteId(55))
            .expect("favorite saved");
        assert_eq!(stored.declined_points.len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_returns_not_found() {
        let (service, _) = build_service(Repository::default());
        let (status, payload) = send(
            design_router(service),
            Request::builder()
                .method("GET")
                .uri("/api/v1/design/sessions/ses-999999/filtered")
                .body(Body::empty())
                .expect("request"),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(payload.get("error").is_some());
    }
}

mod export {
    use super::common::*;
    use home_designer::design::projection::export::write_summary_csv;
    use home_designer::design::{ChoiceChange, ChoiceId, Command, OpenSession};

    #[test]
    fn summary_csv_lists_each_visible_choice() {
        let (service, _) = build_service(Repository::default());
        let session = service
            .open(OpenSession {
                plan_id: PLAN,
                ..OpenSession::default()
            })
            .expect("session opens")
            .session_id;
        service
            .dispatch(
                &session,
                Command::SelectChoices(vec![ChoiceChange::new(ChoiceId(1002), 1)]),
            )
            .expect("dispatch succeeds");

        let view = service.filtered_view(&session).expect("view");
        let mut buffer = Vec::new();
        write_summary_csv(&view, &mut buffer).expect("csv written");
        let text = String::from_utf8(buffer).expect("utf8");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6, "header plus five choices");
        assert!(lines[0].starts_with("group,sub_group,point"));
        assert!(lines
            .iter()
            .any(|line| line.contains("Quartz") && line.contains(",1,")));
    }
}
