//! End-to-end values pipeline tests
//!
//! These run the real remote fetcher against a local git repository and a
//! mocked OCI registry, with an in-memory decryptor standing in for sops.

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tmpl_source::{GitFetcher, OciFetcher, OciFetcherConfig, RemoteFetcher, S3Fetcher};
use tmpl_test_utils::git::{branch_with_files, file_location, repo_with_files};
use tmpl_test_utils::StaticDecryptor;
use tmpl_values::{CancellationToken, ConfigTree, EnvResolver, Error, Loader};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn yaml(text: &str) -> ConfigTree {
    ConfigTree::from_yaml_str(text).expect("Should parse fixture YAML")
}

fn remote_fetcher() -> RemoteFetcher {
    RemoteFetcher::new(
        GitFetcher::new(),
        S3Fetcher::default(),
        OciFetcher::new(OciFetcherConfig {
            plain_http: true,
            ..OciFetcherConfig::default()
        }),
    )
}

/// Serve `payload` as the single layer of `<repository>:<tag>` and return
/// the `oci://` reference for it.
async fn publish_artifact(server: &MockServer, repository: &str, tag: &str, payload: &str) -> String {
    let digest = format!("sha256:{}", hex::encode(Sha256::digest(payload.as_bytes())));
    let manifest = json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.manifest.v1+json",
        "layers": [{
            "mediaType": "application/yaml",
            "digest": digest,
            "size": payload.len()
        }]
    });

    Mock::given(method("GET"))
        .and(path(format!("/v2/{repository}/manifests/{tag}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/{repository}/blobs/{digest}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(payload))
        .mount(server)
        .await;

    let host = server.uri().trim_start_matches("http://").to_string();
    format!("oci://{host}/{repository}:{tag}")
}

fn write(dir: &Path, name: &str, contents: &str) {
    let target = dir.join(name);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(target, contents).unwrap();
}

#[tokio::test]
async fn test_chart_with_git_and_registry_layers() {
    let chart = TempDir::new().unwrap();
    write(
        chart.path(),
        "values.yaml",
        "image:\n  tag: ${TAG}\nreplicas: 1\ndb:\n  password.enc: secrets/db.enc\n",
    );

    let origin = TempDir::new().unwrap();
    let (repo, _) = repo_with_files(
        origin.path(),
        &[("env/prod.yaml", "replicas: 2\nregion: ${REGION}\n")],
    );
    branch_with_files(
        &repo,
        "staging",
        &[("env/prod.yaml", "replicas: 3\nregion: ${REGION}\n")],
    );

    let registry = MockServer::start().await;
    let artifact = publish_artifact(
        &registry,
        "team/values",
        "1.0",
        "region: us-east-1\nfeature:\n  flag: true\n",
    )
    .await;

    let decryptor = StaticDecryptor::new().with_file(chart.path().join("secrets/db.enc"), "hunter2\n");
    let env = EnvResolver::from_vars([("TAG", "v5"), ("REGION", "eu-west-1")]);
    let loader = Loader::with_components(env, Arc::new(decryptor), Arc::new(remote_fetcher()));

    let values = loader
        .load(
            &CancellationToken::new(),
            chart.path(),
            &[
                file_location(origin.path(), "env/prod.yaml", Some("staging")),
                artifact,
            ],
        )
        .await
        .expect("Should resolve layered values");

    assert_eq!(
        values,
        yaml(
            "db:\n  password: hunter2\nfeature:\n  flag: true\nimage:\n  tag: v5\nregion: us-east-1\nreplicas: 3\n"
        )
    );
}

#[tokio::test]
async fn test_git_layer_on_default_branch_expands_env() {
    let chart = TempDir::new().unwrap();
    let origin = TempDir::new().unwrap();
    let (repo, _) = repo_with_files(
        origin.path(),
        &[("env/prod.yaml", "replicas: 2\nregion: ${REGION}\n")],
    );
    branch_with_files(&repo, "staging", &[("env/prod.yaml", "replicas: 3\n")]);

    let env = EnvResolver::from_vars([("REGION", "ap-south-1")]);
    let loader = Loader::with_components(
        env,
        Arc::new(StaticDecryptor::new()),
        Arc::new(remote_fetcher()),
    );

    let values = loader
        .load(
            &CancellationToken::new(),
            chart.path(),
            &[file_location(origin.path(), "env/prod.yaml", None)],
        )
        .await
        .unwrap();

    assert_eq!(values, yaml("region: ap-south-1\nreplicas: 2\n"));
}

#[tokio::test]
async fn test_remote_file_with_absolute_secret_reference() {
    let chart = TempDir::new().unwrap();
    let secret = chart.path().join("api.enc");
    let origin = TempDir::new().unwrap();
    let contents = format!("api.enc: {}\n", secret.display());
    repo_with_files(origin.path(), &[("values.yaml", contents.as_str())]);

    let decryptor = Arc::new(StaticDecryptor::new().with_file(&secret, "key-123"));
    let loader = Loader::with_components(
        EnvResolver::from_vars(Vec::<(String, String)>::new()),
        decryptor.clone(),
        Arc::new(remote_fetcher()),
    );

    let values = loader
        .load(
            &CancellationToken::new(),
            chart.path(),
            &[file_location(origin.path(), "values.yaml", None)],
        )
        .await
        .unwrap();

    assert_eq!(values, yaml("api: key-123"));
    assert_eq!(decryptor.calls(), vec![secret]);
}

#[tokio::test]
async fn test_unknown_repository_reports_location() {
    let chart = TempDir::new().unwrap();
    let missing = chart.path().join("no-such-repo");
    let raw = file_location(&missing, "values.yaml", None);
    let loader = Loader::with_components(
        EnvResolver::from_vars(Vec::<(String, String)>::new()),
        Arc::new(StaticDecryptor::new()),
        Arc::new(remote_fetcher()),
    );

    let err = loader
        .load(&CancellationToken::new(), chart.path(), &[raw.as_str()])
        .await
        .unwrap_err();

    match err {
        Error::Fetch { location, source } => {
            assert_eq!(location, raw);
            assert!(matches!(source, tmpl_source::Error::Clone { .. }), "got: {source}");
        }
        other => panic!("Expected Fetch error, got: {other}"),
    }
}

#[tokio::test]
async fn test_registry_layer_without_manifest_fails() {
    let chart = TempDir::new().unwrap();
    let registry = MockServer::start().await;
    let host = registry.uri().trim_start_matches("http://").to_string();
    let loader = Loader::with_components(
        EnvResolver::from_vars(Vec::<(String, String)>::new()),
        Arc::new(StaticDecryptor::new()),
        Arc::new(remote_fetcher()),
    );

    let err = loader
        .load(
            &CancellationToken::new(),
            chart.path(),
            &[format!("oci://{host}/team/missing:1.0")],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Fetch { .. }), "got: {err}");
}
