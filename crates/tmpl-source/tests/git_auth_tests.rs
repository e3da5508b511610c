//! Tests for the authenticated clone retry against an HTTP remote that
//! demands basic auth

use serial_test::serial;
use tmpl_source::{
    CancellationToken, Error, Fetcher, GIT_PASSWORD_ENV, GIT_USERNAME_ENV, GitFetcher, Location,
};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Fetch from a remote that rejects every request, with the given
/// credential variables in place. Returns the fetch error and the requests
/// the remote received.
fn fetch_from_locked_remote(
    username: Option<&str>,
    password: Option<&str>,
) -> (Error, Vec<Request>) {
    temp_env::with_vars(
        [(GIT_USERNAME_ENV, username), (GIT_PASSWORD_ENV, password)],
        || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let server = MockServer::start().await;
                Mock::given(method("GET"))
                    .respond_with(
                        ResponseTemplate::new(401)
                            .insert_header("WWW-Authenticate", "Basic realm=\"git\""),
                    )
                    .mount(&server)
                    .await;

                let host = server.uri().trim_start_matches("http://").to_string();
                let location =
                    Location::classify(&format!("git+http://{host}/org/repo.git/values.yaml"));
                let err = GitFetcher::new()
                    .fetch(&CancellationToken::new(), &location)
                    .await
                    .unwrap_err();
                let requests = server.received_requests().await.unwrap_or_default();
                (err, requests)
            })
        },
    )
}

fn authorized(requests: &[Request]) -> usize {
    requests
        .iter()
        .filter(|r| r.headers.contains_key("authorization"))
        .count()
}

#[test]
#[serial]
fn test_rejected_clone_retries_once_with_credentials() {
    let (err, requests) = fetch_from_locked_remote(Some("deploy"), Some("hunter2"));

    assert!(matches!(err, Error::Clone { .. }), "got: {err}");
    assert!(requests.len() >= 2, "requests: {}", requests.len());
    assert_eq!(authorized(&requests), 1);
}

#[test]
#[serial]
fn test_partial_credentials_skip_the_retry() {
    let (err, requests) = fetch_from_locked_remote(Some("deploy"), None);

    assert!(matches!(err, Error::Clone { .. }), "got: {err}");
    assert!(!requests.is_empty());
    assert_eq!(authorized(&requests), 0);
}

#[test]
#[serial]
fn test_no_credentials_means_anonymous_only() {
    let (err, requests) = fetch_from_locked_remote(None, None);

    assert!(matches!(err, Error::Clone { .. }), "got: {err}");
    assert_eq!(authorized(&requests), 0);
}
