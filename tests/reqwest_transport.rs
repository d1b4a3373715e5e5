use bytes::Bytes;
use futures::StreamExt;
use graphql_rest_link::{Error, Fetch, HttpMethod, Operation, ReqwestFetch, RestLink, RestRequest};
use http::HeaderMap;
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

async fn mock_server() -> MockServer {
    MockServer::builder().start().await
}

fn request(method: HttpMethod, url: String) -> RestRequest {
    RestRequest {
        url,
        method,
        headers: HeaderMap::new(),
        body: None,
        credentials: None,
    }
}

#[tokio::test]
async fn test_fetch_get_with_headers() {
    let server = mock_server().await;
    Mock::given(method("GET"))
        .and(path("/post/1"))
        .and(header("authorization", "Bearer token"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "abc")
                .set_body_json(json!({"id": 1})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request(HttpMethod::GET, format!("{}/post/1", server.uri()));
    req.headers
        .insert("authorization", "Bearer token".parse().unwrap());

    let response = ReqwestFetch::new().fetch(req).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.header("x-request-id"), Some("abc"));
    assert_eq!(response.json().unwrap(), json!({"id": 1}));
}

#[tokio::test]
async fn test_fetch_post_body() {
    let server = mock_server().await;
    Mock::given(method("POST"))
        .and(path("/posts"))
        .and(body_json(json!({"title": "Hello"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;

    let mut req = request(HttpMethod::POST, format!("{}/posts", server.uri()));
    req.headers
        .insert("content-type", "application/json".parse().unwrap());
    req.body = Some(Bytes::from(json!({"title": "Hello"}).to_string()));

    let response = ReqwestFetch::new().fetch(req).await.unwrap();
    assert_eq!(response.status, 201);
    assert_eq!(response.json().unwrap(), json!({"id": 7}));
}

#[tokio::test]
async fn test_fetch_timeout_is_a_transport_error() {
    let server = mock_server().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let fetch = ReqwestFetch::new().timeout(Duration::from_millis(50));
    let err = fetch
        .fetch(request(HttpMethod::GET, format!("{}/slow", server.uri())))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn test_link_with_default_transport() {
    let server = mock_server().await;
    Mock::given(method("GET"))
        .and(path("/post/1"))
        .and(header("accept", "application/json"))
        .and(header("x-client", "tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1", "title": "Love apollo"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust lang"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "2"}])))
        .expect(1)
        .mount(&server)
        .await;

    let link = RestLink::builder()
        .uri(server.uri())
        .default_header("x-client", "tests")
        .build()
        .unwrap();

    let operation = Operation::new(
        r#"
        query {
            post @rest(type: "Post", path: "/post/1") { id title }
            search(q: "rust lang") @rest(type: "[Post]", path: "/search?{args}") { id }
        }
        "#,
    )
    .unwrap();

    let result = link.execute(&operation).await.unwrap();
    assert_eq!(
        result.data,
        Some(json!({
            "post": {"id": "1", "title": "Love apollo", "__typename": "Post"},
            "search": [{"id": "2", "__typename": "Post"}]
        }))
    );
    assert_eq!(operation.get_context().rest_responses.len(), 2);
}

#[tokio::test]
async fn test_link_surfaces_server_errors() {
    let server = mock_server().await;
    Mock::given(method("GET"))
        .and(path("/post/1"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let link = RestLink::builder().uri(server.uri()).build().unwrap();
    let operation =
        Operation::new(r#"query { post @rest(type: "Post", path: "/post/1") { id } }"#).unwrap();

    let results: Vec<_> = link.request(operation, None).collect().await;
    assert_eq!(results.len(), 1);

    match &results[0] {
        Err(Error::Server(err)) => {
            assert_eq!(err.status_code(), 404);
            assert_eq!(err.result(), json!("Not Found"));
            assert_eq!(
                err.to_string(),
                "Response not successful: Received status code 404"
            );
        }
        other => panic!("expected server error, got {:?}", other),
    }
}
