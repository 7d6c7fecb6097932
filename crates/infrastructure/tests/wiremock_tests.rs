//! Integration tests for infrastructure crate
//!
//! Tests cover:
//! - Geocoding and routing adapters against mock OSM services
//! - Lead webhook delivery and retries
//! - A fully wired estimator
//! - Retry backoff properties

use std::sync::Arc;
use std::time::Duration;

use application::ports::{GeocodingPort, LeadSubmissionPort, RegionBias, RoutingPort};
use application::{AddressRole, ApplicationError, EstimatorUpdate};
use domain::{GeoPoint, LeadSubmission, RiderCategory};
use integration_osm::{NominatimConfig, OsrmConfig, USER_AGENT};
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use infrastructure::{
    AppConfig, CircuitBreakerConfig, LeadConfig, NominatimGeocodingAdapter, OsrmRoutingAdapter,
    RetryConfig, WebhookLeadAdapter, build_estimator,
};

fn nominatim(base_url: &str) -> NominatimConfig {
    NominatimConfig {
        base_url: base_url.to_string(),
        ..NominatimConfig::for_testing()
    }
}

fn osrm(base_url: &str) -> OsrmConfig {
    OsrmConfig {
        base_url: base_url.to_string(),
        ..OsrmConfig::for_testing()
    }
}

fn place_json(name: &str, lat: f64, lon: f64) -> serde_json::Value {
    serde_json::json!([{
        "place_id": 1,
        "lat": lat.to_string(),
        "lon": lon.to_string(),
        "display_name": name,
    }])
}

fn route_json(distance_meters: f64) -> serde_json::Value {
    serde_json::json!({
        "code": "Ok",
        "routes": [{
            "distance": distance_meters,
            "duration": 1500.0,
            "geometry": {
                "type": "LineString",
                "coordinates": [[27.8953, -26.2309], [27.9800, -26.1700], [28.0567, -26.1076]]
            }
        }],
        "waypoints": []
    })
}

// ============================================================================
// Geocoding adapter
// ============================================================================

mod geocoding_tests {
    use super::*;

    #[tokio::test]
    async fn search_returns_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Sandton, Gauteng"))
            .and(query_param("countrycodes", "za"))
            .respond_with(ResponseTemplate::new(200).set_body_json(place_json(
                "Sandton, Johannesburg, Gauteng, South Africa",
                -26.1076,
                28.0567,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = NominatimGeocodingAdapter::new(&nominatim(&server.uri())).unwrap();
        let candidates = adapter
            .search("Sandton", &RegionBias::default(), 5)
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].primary_name(), "Sandton, Johannesburg, Gauteng");
    }

    #[tokio::test]
    async fn server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = NominatimGeocodingAdapter::new(&nominatim(&server.uri())).unwrap();
        let err = adapter
            .search("Sandton", &RegionBias::default(), 5)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn breaker_stops_hammering_a_failing_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let adapter = NominatimGeocodingAdapter::new(&nominatim(&server.uri()))
            .unwrap()
            .with_circuit_breaker(CircuitBreakerConfig {
                failure_threshold: 2,
                ..Default::default()
            });
        let bias = RegionBias::default();

        for _ in 0..4 {
            assert!(adapter.search("Sandton", &bias, 5).await.is_err());
        }
    }
}

mod debounced_search_tests {
    use application::{DebouncedSearch, GeoSearchConfig, GeoSearchService, SearchStatus};

    use super::*;

    #[tokio::test]
    async fn steady_typing_gets_a_prompt_answer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(place_json(
                        "Protea Glen, Soweto, Johannesburg, Gauteng, South Africa",
                        -26.2309,
                        27.8953,
                    ))
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;

        let config = NominatimConfig {
            base_url: server.uri(),
            ..NominatimConfig::default()
        };
        let adapter = NominatimGeocodingAdapter::new(&config).unwrap();
        let service = GeoSearchService::new(Arc::new(adapter), GeoSearchConfig::default());
        let mut search = DebouncedSearch::new(service);

        let text = "Protea Glen Ext";
        for end in 3..=text.len() {
            search.submit(&text[..end]);
            tokio::time::sleep(Duration::from_millis(350)).await;
        }
        let typed = std::time::Instant::now();

        let outcome = timeout(Duration::from_secs(10), search.next_response())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(outcome.query, text);
        assert_eq!(outcome.status, SearchStatus::Matched);
        assert!(
            typed.elapsed() < Duration::from_secs(2),
            "answered after {:?}",
            typed.elapsed()
        );
    }
}

// ============================================================================
// Routing adapter
// ============================================================================

mod routing_tests {
    use super::*;

    fn endpoints() -> (GeoPoint, GeoPoint) {
        (
            GeoPoint::new(-26.2309, 27.8953, "Protea Glen").unwrap(),
            GeoPoint::new(-26.1076, 28.0567, "Sandton").unwrap(),
        )
    }

    #[tokio::test]
    async fn route_returns_distance_and_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/route/v1/driving/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(route_json(21_450.0)))
            .mount(&server)
            .await;

        let adapter = OsrmRoutingAdapter::new(&osrm(&server.uri())).unwrap();
        let (pickup, dropoff) = endpoints();
        let summary = adapter.route(&pickup, &dropoff).await.unwrap();

        assert!((summary.distance_meters - 21_450.0).abs() < 1e-6);
        assert_eq!(summary.path.len(), 3);
    }

    #[tokio::test]
    async fn no_route_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/route/v1/driving/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "NoRoute",
                "routes": []
            })))
            .mount(&server)
            .await;

        let adapter = OsrmRoutingAdapter::new(&osrm(&server.uri())).unwrap();
        let (pickup, dropoff) = endpoints();
        let err = adapter.route(&pickup, &dropoff).await.unwrap_err();

        assert!(matches!(err, ApplicationError::ExternalService(ref m) if m.contains("NoRoute")));
    }
}

// ============================================================================
// Lead webhook
// ============================================================================

mod lead_tests {
    use super::*;

    fn adapter(server: &MockServer) -> WebhookLeadAdapter {
        WebhookLeadAdapter::new(
            format!("{}/leads", server.uri()),
            Duration::from_secs(5),
            RetryConfig::for_testing(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn posts_budget_lead_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/leads"))
            .and(body_partial_json(serde_json::json!({
                "source": "budget-slider",
                "budget": 1250,
                "rider_category": "scholar"
            })))
            .and(header("User-Agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let lead = LeadSubmission::from_budget(1250, RiderCategory::Scholar);
        adapter(&server).submit(&lead).await.unwrap();
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/leads"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/leads"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let lead = LeadSubmission::from_cta(RiderCategory::Staff);
        adapter(&server).submit(&lead).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_lead_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/leads"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let lead = LeadSubmission::from_cta(RiderCategory::Staff);
        let err = adapter(&server).submit(&lead).await.unwrap_err();

        assert!(matches!(err, ApplicationError::Configuration(_)));
    }
}

// ============================================================================
// Wired estimator
// ============================================================================

mod estimator_tests {
    use super::*;

    async fn next_update(
        estimator: &mut application::EstimatorController,
    ) -> EstimatorUpdate {
        timeout(Duration::from_secs(10), estimator.pump())
            .await
            .expect("no update within ten seconds")
            .expect("pump closed")
    }

    async fn mount_place(server: &MockServer, query: &str, name: &str, lat: f64, lon: f64) {
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", query))
            .respond_with(ResponseTemplate::new(200).set_body_json(place_json(name, lat, lon)))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn quote_from_live_services() {
        let geo = MockServer::start().await;
        mount_place(
            &geo,
            "Protea Glen, Gauteng",
            "Protea Glen, Soweto, Johannesburg, Gauteng, South Africa",
            -26.2309,
            27.8953,
        )
        .await;
        mount_place(
            &geo,
            "Sandton, Gauteng",
            "Sandton, Johannesburg, Gauteng, South Africa",
            -26.1076,
            28.0567,
        )
        .await;

        let routes = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/route/v1/driving/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(route_json(13_000.0)))
            .mount(&routes)
            .await;

        let leads = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/leads"))
            .and(body_partial_json(serde_json::json!({ "source": "estimator-cta" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&leads)
            .await;

        let mut config = AppConfig {
            nominatim: nominatim(&geo.uri()),
            osrm: osrm(&routes.uri()),
            leads: LeadConfig::for_testing(format!("{}/leads", leads.uri())),
            ..Default::default()
        };
        config.estimator.search.debounce_ms = 20;
        let mut estimator = build_estimator(&config).unwrap();

        for (role, text) in [
            (AddressRole::Pickup, "Protea Glen"),
            (AddressRole::Dropoff, "Sandton"),
        ] {
            estimator.edit_address(role, text);
            assert_eq!(
                next_update(&mut estimator).await,
                EstimatorUpdate::Candidates { role, count: 1 }
            );
            estimator.select_candidate(role, 0).unwrap();
        }

        assert_eq!(
            next_update(&mut estimator).await,
            EstimatorUpdate::DistanceRefined { kilometers: 13.0 }
        );

        let summary = estimator.calculate().unwrap();
        assert_eq!(summary.own_service_label(), "R3 464");

        let lead = estimator.convert();
        assert_eq!(lead.source.tag(), "estimator-cta");
        // delivery is detached from the controller
        for _ in 0..50 {
            if !leads.received_requests().await.unwrap_or_default().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        estimator.shutdown();
    }

    #[tokio::test]
    async fn search_outage_degrades_to_manual_tier() {
        let geo = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&geo)
            .await;

        let mut config = AppConfig {
            nominatim: nominatim(&geo.uri()),
            ..Default::default()
        };
        config.estimator.search.debounce_ms = 20;
        let mut estimator = build_estimator(&config).unwrap();

        estimator.edit_address(AddressRole::Pickup, "Protea Glen");
        assert_eq!(
            next_update(&mut estimator).await,
            EstimatorUpdate::SearchDegraded {
                role: AddressRole::Pickup
            }
        );
        assert!(estimator.search_notice().is_some());
        assert!(estimator.is_manual_tier_active());
        assert!(estimator.calculate().is_ok());
    }

    #[test]
    fn port_objects_are_shareable() {
        fn assert_port<T: ?Sized + Send + Sync>(_: &Arc<T>) {}
        let leads: Arc<dyn LeadSubmissionPort> = Arc::new(infrastructure::LogOnlyLeadAdapter);
        assert_port(&leads);
    }
}

// ============================================================================
// Property-based tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn retry_delay_never_exceeds_max_without_jitter(
            initial in 1u64..1000u64,
            max in 1000u64..100_000u64,
            multiplier in 1.0f64..5.0f64,
            attempt in 0u32..20u32
        ) {
            let config = RetryConfig {
                initial_delay_ms: initial,
                max_delay_ms: max,
                multiplier,
                max_retries: 10,
                jitter_factor: 0.0,
            };
            prop_assert!(config.delay_for_attempt(attempt).as_millis() <= u128::from(max));
        }

        #[test]
        fn jitter_stays_within_spread(
            initial in 100u64..1000u64,
            max in 5000u64..50_000u64,
            jitter_factor in 0.0f64..0.5f64,
            attempt in 0u32..10u32
        ) {
            let config = RetryConfig {
                initial_delay_ms: initial,
                max_delay_ms: max,
                multiplier: 2.0,
                max_retries: 10,
                jitter_factor,
            };
            let ceiling = (max as f64) * (1.0 + jitter_factor) + 1.0;
            prop_assert!((config.delay_for_attempt(attempt).as_millis() as f64) <= ceiling);
        }
    }
}
