//! Federated login against a mock identity provider.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

const KID: &str = "integration-key";
const CLIENT_ID: &str = "client-123.apps.example.com";
const ISSUER: &str = "https://accounts.example.com";

const RSA_PEM: &str = include_str!("../../../src/server/tasker-auth/testdata/provider_rsa.pem");
const RSA_N: &str = "2k42YvRD-EznfnLoblYnOljcLprXRCQCXZ-6O4_tuYJhwjhMjWFrvnRx9qcckKe4POh7TvFBSvw_mlZoncy42mQplvgMXQTfeMJTABgYBY-TojTA8dn5XxtuhEj_EHCNFmsgOq1KMlFj3V5wIp7rj8AG1VRxHllYJkNm-0JI_p0Hb25_0GPT6qk1j3DGfdmPb8plf6fcwsSwd-Eyc_j_gGxcs1vW33yXy7X3OKM-zoEi9S_nd289EOKUNA_BlsIKTkmNiIzGXP_WLJaXt3dMdo9t32XQepyXf9mFWZ4HSoMZHVSCZoFbbA3Gkplc7tLpdYpnrf_0-i-O_Cr14-IUXw";

#[derive(Serialize)]
struct IdClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    sub: &'a str,
    email: &'a str,
    email_verified: bool,
    iat: u64,
    exp: u64,
}

fn id_token(sub: &str, email: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = IdClaims {
        iss: ISSUER,
        aud: CLIENT_ID,
        sub,
        email,
        email_verified: true,
        iat: now,
        exp: now + 600,
    };

    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(
        &header,
        &claims,
        &EncodingKey::from_rsa_pem(RSA_PEM.as_bytes()).unwrap(),
    )
    .unwrap()
}

/// Provider whose token endpoint hands out one ID token per code.
async fn provider(logins: &[(&str, &str, &str)]) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/certs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{
                "kty": "RSA",
                "use": "sig",
                "alg": "RS256",
                "kid": KID,
                "n": RSA_N,
                "e": "AQAB",
            }]
        })))
        .mount(&server)
        .await;

    for (code, sub, email) in logins {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(wiremock::matchers::body_string_contains(format!("code={code}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "provider-access",
                "id_token": id_token(sub, email),
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .with_priority(10)
        .mount(&server)
        .await;

    server
}

fn provider_config(server: &MockServer) -> OAuthProviderConfig {
    let mut config = OAuthProviderConfig::google(
        CLIENT_ID,
        "provider-secret".to_string().into(),
        "http://127.0.0.1/auth/google/callback",
    );
    config.authorization_endpoint = format!("{}/auth", server.uri());
    config.token_endpoint = format!("{}/token", server.uri());
    config.jwks_uri = format!("{}/certs", server.uri());
    config.issuers = vec![ISSUER.to_string()];
    config.http_timeout = Duration::from_secs(5);
    config
}

/// Completes a callback and returns the token handed to the frontend.
async fn callback(client: &TaskerClient, code: &str) -> String {
    let (status, location) = client
        .get_redirect(&format!("/auth/google/callback?code={code}"))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::FOUND);

    location
        .unwrap()
        .strip_prefix(&format!("{TEST_FRONTEND_URL}/login?token="))
        .expect("redirect to frontend login")
        .to_string()
}

#[tokio::test]
async fn test_authorization_redirect() {
    let idp = provider(&[]).await;
    let server = TestServer::start_with_provider(provider_config(&idp))
        .await
        .unwrap();

    let (status, location) = server.client().get_redirect("/auth/google").await.unwrap();

    assert_eq!(status, StatusCode::FOUND);
    let location = location.unwrap();
    assert!(location.starts_with(&format!("{}/auth?", idp.uri())));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("scope=openid+email+profile"));
}

#[tokio::test]
async fn test_repeated_federated_logins_are_one_user() {
    let idp = provider(&[
        ("code-1", "sub-erin", "erin@example.com"),
        ("code-2", "sub-erin", "erin@example.com"),
    ])
    .await;
    let server = TestServer::start_with_provider(provider_config(&idp))
        .await
        .unwrap();
    let client = server.client();

    let first = callback(&client, "code-1").await;
    client
        .clone()
        .with_token(&first)
        .add_todo("from first login")
        .await
        .unwrap();

    let second = callback(&client, "code-2").await;
    let list = client.clone().with_token(&second).list_todos().await.unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(list[0].task, "from first login");
}

#[tokio::test]
async fn test_federated_login_links_local_account() {
    let idp = provider(&[("code-1", "sub-frank", "frank@example.com")]).await;
    let server = TestServer::start_with_provider(provider_config(&idp))
        .await
        .unwrap();
    let client = server.client();

    client.register("frank@example.com", "secret1").await.unwrap();
    let local = client.login("frank@example.com", "secret1").await.unwrap();
    let created = client
        .clone()
        .with_token(&local)
        .add_todo("made locally")
        .await
        .unwrap();
    assert_eq!(created.email_status, "queued");

    let federated = callback(&client, "code-1").await;
    let list = client
        .clone()
        .with_token(&federated)
        .list_todos()
        .await
        .unwrap();

    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, created.id);

    // The password keeps working after linking.
    client.login("frank@example.com", "secret1").await.unwrap();
}

#[tokio::test]
async fn test_callback_failures() {
    let idp = provider(&[]).await;
    let server = TestServer::start_with_provider(provider_config(&idp))
        .await
        .unwrap();
    let client = server.client();

    let resp = reqwest::get(format!("{}/auth/google/callback", server.base_url))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = resp.json().await.unwrap();
    assert_eq!(body.error, "missing_authorization_code");

    let (status, location) = client
        .get_redirect("/auth/google/callback?code=unknown")
        .await
        .unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(location.is_none());
}
