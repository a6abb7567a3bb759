//! Integration tests for the coordination backend.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use reqwest::{multipart, Client, RequestBuilder};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::{create_router, AppState};

const ADMIN_UID: &str = "admin-uid";

const SQUAD_HEADER: &str = "Marca temporal,DNI,Nombre y apellido,Numero mobil,\
    Cuantos andan en su cuadrilla? 👷,Zona de intervencion 📍,\
    Link de ubicacion Google Maps del lugar de intervencion 📍 (Optional),\
    Lleva agua potable? 💧,Lleva maquinaria grande? 🚜";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            admin_uids: vec![ADMIN_UID.to_string()],
            sheet_fetch_timeout: Duration::from_secs(5),
        };

        let state = AppState::new(Repository::new(pool), config).expect("Failed to build state");
        let addr = serve(create_router(state)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url: format!("http://{}", addr),
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn create_post(&self, uid: &str, title: &str) -> Value {
        let resp = as_user(self.client.post(self.url("/api/posts")), uid, "Vecina")
            .json(&json!({
                "type": "necesidad",
                "category": "agua",
                "title": title,
                "location": "Epuyen"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    async fn commit(&self, post_id: &str, uid: &str, name: &str, note: &str) -> reqwest::Response {
        as_user(
            self.client
                .post(self.url(&format!("/api/posts/{}/commitments", post_id))),
            uid,
            name,
        )
        .json(&json!({ "note": note }))
        .send()
        .await
        .unwrap()
    }

    async fn upload(&self, uid: &str, sheet: &str) -> reqwest::Response {
        let part = multipart::Part::bytes(sheet.as_bytes().to_vec()).file_name("cuadrillas.csv");
        let form = multipart::Form::new().part("file", part);
        as_user(self.client.post(self.url("/api/squads/upload")), uid, "Admin")
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    async fn squads(&self) -> Vec<Value> {
        let body: Value = self
            .client
            .get(self.url("/api/squads"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["data"].as_array().unwrap().clone()
    }
}

/// Bind to a random port and spawn the router.
async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(100)).await;
    addr
}

fn as_user(request: RequestBuilder, uid: &str, name: &str) -> RequestBuilder {
    request.header("x-user-id", uid).header("x-user-name", name)
}

fn squad_sheet(rows: &[&str]) -> String {
    let mut sheet = SQUAD_HEADER.to_string();
    for row in rows {
        sheet.push('\n');
        sheet.push_str(row);
    }
    sheet.push('\n');
    sheet
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Request without API key
    let resp = Client::new()
        .get(fixture.url("/api/posts"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::new().await;

    let resp = Client::new()
        .get(fixture.url("/api/posts"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = Client::new()
        .get(fixture.url("/api/posts"))
        .header("authorization", "Bearer test-api-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_no_psk_configured_allows_requests() {
    let fixture = TestFixture::with_psk(None).await;

    let resp = fixture
        .client
        .get(fixture.url("/api/posts"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_create_post_starts_open() {
    let fixture = TestFixture::new().await;

    let post = fixture.create_post("owner", "Agua para 10 personas").await;
    assert_eq!(post["type"], "necesidad");
    assert_eq!(post["category"], "agua");
    assert_eq!(post["status"], "abierto");
    assert_eq!(post["resolved"], false);
    assert_eq!(post["userId"], "owner");
    assert_eq!(post["userName"], "Vecina");
    assert_eq!(post["assignedTo"], json!([]));
    assert_eq!(post["history"], json!([]));

    let id = post["id"].as_str().unwrap();
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["title"], "Agua para 10 personas");
    assert!(body["revisionId"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_create_post_requires_actor_and_title() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/posts"))
        .json(&json!({ "type": "oferta", "category": "hospedaje", "title": "Cama" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = as_user(fixture.client.post(fixture.url("/api/posts")), "u1", "Ana")
        .json(&json!({ "type": "oferta", "category": "hospedaje", "title": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_feed_is_newest_first() {
    let fixture = TestFixture::new().await;

    fixture.create_post("owner", "Primero").await;
    fixture.create_post("owner", "Segundo").await;

    let body: Value = fixture
        .client
        .get(fixture.url("/api/posts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let posts = body["data"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["title"], "Segundo");
    assert_eq!(posts[1]["title"], "Primero");
}

#[tokio::test]
async fn test_commitments_move_post_in_progress() {
    let fixture = TestFixture::new().await;
    let post = fixture.create_post("owner", "Bidones").await;
    let id = post["id"].as_str().unwrap();

    let resp = fixture.commit(id, "vol-1", "Vol Uno", "voy con 2 bidones").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let post = &body["data"];
    assert_eq!(post["status"], "en_proceso");
    assert_eq!(post["resolved"], false);
    assert_eq!(post["history"].as_array().unwrap().len(), 1);
    assert_eq!(post["history"][0]["action"], "en_camino");
    assert_eq!(post["history"][0]["user"], "Vol Uno");
    assert_eq!(post["history"][0]["userId"], "vol-1");
    assert_eq!(post["history"][0]["note"], "voy con 2 bidones");
    assert_eq!(post["assignedTo"], json!([{ "uid": "vol-1", "name": "Vol Uno" }]));

    // A second volunteer joins
    let resp = fixture.commit(id, "vol-2", "Vol Dos", "llevo la camioneta").await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["history"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["assignedTo"].as_array().unwrap().len(), 2);

    // The first volunteer commits again: history grows, assignments do not
    let resp = fixture.commit(id, "vol-1", "Vol Uno", "sumo otro bidon").await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let post = &body["data"];
    assert_eq!(post["status"], "en_proceso");
    assert_eq!(post["history"].as_array().unwrap().len(), 3);
    assert_eq!(post["history"][2]["note"], "sumo otro bidon");
    assert_eq!(
        post["assignedTo"],
        json!([
            { "uid": "vol-1", "name": "Vol Uno" },
            { "uid": "vol-2", "name": "Vol Dos" }
        ])
    );
}

#[tokio::test]
async fn test_simultaneous_commitments_all_land() {
    let fixture = TestFixture::new().await;
    let post = fixture.create_post("owner", "Viveres").await;
    let url = fixture.url(&format!("/api/posts/{}/commitments", post["id"].as_str().unwrap()));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let request = as_user(
                fixture.client.post(&url),
                &format!("vol-{}", i),
                &format!("Voluntario {}", i),
            )
            .json(&json!({ "note": format!("voy, soy el {}", i) }));
            tokio::spawn(async move { request.send().await.unwrap().status() })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        assert_eq!(handle.unwrap(), 200);
    }

    let body: Value = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", post["id"].as_str().unwrap())))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post = &body["data"];
    assert_eq!(post["status"], "en_proceso");
    assert_eq!(post["history"].as_array().unwrap().len(), 20);
    assert_eq!(post["assignedTo"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_commitment_rejections_leave_post_unchanged() {
    let fixture = TestFixture::new().await;
    let post = fixture.create_post("owner", "Pala").await;
    let id = post["id"].as_str().unwrap();

    // Empty note
    let resp = fixture.commit(id, "vol-1", "Vol Uno", "   ").await;
    assert_eq!(resp.status(), 400);

    // Anonymous caller
    let resp = fixture
        .client
        .post(fixture.url(&format!("/api/posts/{}/commitments", id)))
        .json(&json!({ "note": "voy" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Unknown post
    let resp = fixture.commit("missing", "vol-1", "Vol Uno", "voy").await;
    assert_eq!(resp.status(), 404);

    let body: Value = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["status"], "abierto");
    assert_eq!(body["data"]["history"], json!([]));
    assert_eq!(body["data"]["assignedTo"], json!([]));
}

#[tokio::test]
async fn test_only_owner_deletes_post() {
    let fixture = TestFixture::new().await;
    let post = fixture.create_post("owner", "Carpa").await;
    let id = post["id"].as_str().unwrap();
    fixture.commit(id, "vol-1", "Vol Uno", "voy").await;

    let resp = as_user(
        fixture.client.delete(fixture.url(&format!("/api/posts/{}", id))),
        "intruder",
        "Otro",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "PERMISSION_DENIED");

    let resp = as_user(
        fixture.client.delete(fixture.url(&format!("/api/posts/{}", id))),
        "owner",
        "Vecina",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/posts/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_resolve_post() {
    let fixture = TestFixture::new().await;
    let post = fixture.create_post("owner", "Medicamentos").await;
    let id = post["id"].as_str().unwrap();
    fixture.commit(id, "vol-1", "Vol Uno", "los llevo").await;

    let resolve_url = fixture.url(&format!("/api/posts/{}/resolve", id));

    let resp = as_user(fixture.client.post(&resolve_url), "vol-1", "Vol Uno")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = as_user(fixture.client.post(&resolve_url), "owner", "Vecina")
        .json(&json!({ "note": "recibido, gracias" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "resuelto");
    assert_eq!(body["data"]["resolved"], true);
    assert_eq!(body["data"]["history"][1]["action"], "resuelto");
    assert_eq!(body["data"]["history"][1]["note"], "recibido, gracias");

    // Terminal state
    let resp = fixture.commit(id, "vol-2", "Vol Dos", "voy igual").await;
    assert_eq!(resp.status(), 400);
    let resp = as_user(fixture.client.post(&resolve_url), "owner", "Vecina")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_admin_resolves_any_post() {
    let fixture = TestFixture::new().await;
    let post = fixture.create_post("owner", "Forraje").await;
    let id = post["id"].as_str().unwrap();

    let resp = as_user(
        fixture
            .client
            .post(fixture.url(&format!("/api/posts/{}/resolve", id))),
        ADMIN_UID,
        "Admin",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["status"], "resuelto");
}

#[tokio::test]
async fn test_upload_ingests_squads() {
    let fixture = TestFixture::new().await;
    let sheet = squad_sheet(&[
        "2026-01-10 09:30,30111222,Ana Diaz,2944000000,5 personas,Epuyen,\
         \"https://www.google.com/maps/@-42.2301,-71.3602,15z\",Si,No",
        ",,,,,,,,",
        "2026-01-10 10:00,,Beto,,tres,,,no,sí",
    ]);

    let resp = fixture.upload(ADMIN_UID, &sheet).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["unmappedColumns"], json!([]));
    assert!(body["data"]["missingColumns"]
        .as_array()
        .unwrap()
        .contains(&json!("Dia de salida")));

    let resp = fixture
        .client
        .get(fixture.url("/api/squads/30111222"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let ana = &body["data"];
    assert_eq!(ana["leaderName"], "Ana Diaz");
    assert_eq!(ana["leaderDni"], "30111222");
    assert_eq!(ana["name"], "Cuadrilla Ana Diaz");
    assert_eq!(ana["membersCount"], 5);
    assert_eq!(ana["interventionZone"], "Epuyen");
    assert_eq!(ana["lat"], -42.2301);
    assert_eq!(ana["lng"], -71.3602);
    assert_eq!(ana["equipment"]["hasWater"], true);
    assert_eq!(ana["equipment"]["hasMachinery"], false);
    assert_eq!(ana["mission"]["lastUpdate"], "2026-01-10 09:30");

    let squads = fixture.squads().await;
    let beto = squads
        .iter()
        .find(|s| s["leaderName"] == "Beto")
        .expect("Beto's squad");
    assert!(beto["id"].as_str().unwrap().starts_with("SQUAD-"));
    assert_eq!(beto["membersCount"], 0);
    assert_eq!(beto["interventionZone"], "Sin asignar");
    assert_eq!(beto["lat"], Value::Null);
    assert_eq!(beto["equipment"]["hasMachinery"], true);
}

#[tokio::test]
async fn test_reingest_replaces_whole_record() {
    let fixture = TestFixture::new().await;

    let first = squad_sheet(&[
        "2026-01-10 09:30,30111222,Ana Diaz,2944000000,5,Epuyen,\
         \"https://maps.google.com/?q=-42.1,-71.2\",Si,Si",
    ]);
    assert_eq!(fixture.upload(ADMIN_UID, &first).await.status(), 200);
    assert_eq!(fixture.upload(ADMIN_UID, &first).await.status(), 200);
    assert_eq!(fixture.squads().await.len(), 1);

    // Same DNI, fewer details: nothing from the previous version survives
    let second = "DNI,Nombre y apellido\n30111222,Ana Diaz\n";
    let resp = fixture.upload(ADMIN_UID, second).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["missingColumns"]
        .as_array()
        .unwrap()
        .contains(&json!("Lleva agua potable? 💧")));

    let squads = fixture.squads().await;
    assert_eq!(squads.len(), 1);
    assert_eq!(squads[0]["leaderPhone"], "");
    assert_eq!(squads[0]["membersCount"], 0);
    assert_eq!(squads[0]["lat"], Value::Null);
    assert_eq!(squads[0]["lng"], Value::Null);
    assert_eq!(squads[0]["equipment"]["hasWater"], false);
}

#[tokio::test]
async fn test_empty_sheet_writes_nothing() {
    let fixture = TestFixture::new().await;
    let sheet = squad_sheet(&["2026-01-10 09:30,1,Ana,,2,Epuyen,,Si,No"]);
    assert_eq!(fixture.upload(ADMIN_UID, &sheet).await.status(), 200);

    let resp = fixture.upload(ADMIN_UID, &squad_sheet(&[])).await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INGESTION_ERROR");
    assert_eq!(body["error"]["message"], "empty sheet");

    assert_eq!(fixture.squads().await.len(), 1);
}

#[tokio::test]
async fn test_upload_requires_admin() {
    let fixture = TestFixture::new().await;
    let sheet = squad_sheet(&["2026-01-10 09:30,1,Ana,,2,Epuyen,,Si,No"]);

    let resp = fixture.upload("someone", &sheet).await;
    assert_eq!(resp.status(), 403);
    assert!(fixture.squads().await.is_empty());

    // Missing file field
    let form = multipart::Form::new().text("other", "x");
    let resp = as_user(
        fixture.client.post(fixture.url("/api/squads/upload")),
        ADMIN_UID,
        "Admin",
    )
    .multipart(form)
    .send()
    .await
    .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_sync_from_published_sheet() {
    let fixture = TestFixture::new().await;

    let sheet = squad_sheet(&[
        "2026-01-10 09:30,30111222,Ana Diaz,2944000000,5,Epuyen,,Si,No",
        "2026-01-10 09:45,28999000,Carla,2944111111,3,Lago Puelo,,No,No",
    ]);
    let source = Router::new()
        .route("/pub", get(move || async move { sheet }))
        .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "gone") }));
    let source_addr = serve(source).await;

    let sync_url = fixture.url("/api/squads/sync");

    // Nothing configured yet
    let resp = as_user(fixture.client.post(&sync_url), ADMIN_UID, "Admin")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = as_user(fixture.client.post(&sync_url), ADMIN_UID, "Admin")
        .json(&json!({ "url": format!("http://{}/pub?output=csv", source_addr) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(fixture.squads().await.len(), 2);

    let resp = as_user(fixture.client.post(&sync_url), ADMIN_UID, "Admin")
        .json(&json!({ "url": format!("http://{}/gone?output=csv", source_addr) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INGESTION_ERROR");
    assert_eq!(fixture.squads().await.len(), 2);
}

#[tokio::test]
async fn test_sheet_config_flow() {
    let fixture = TestFixture::new().await;

    let sheet = squad_sheet(&["2026-01-10 09:30,1,Ana,,2,Epuyen,,Si,No"]);
    let source = Router::new().route("/pub", get(move || async move { sheet }));
    let source_addr = serve(source).await;
    let config_url = fixture.url("/api/config");

    let resp = as_user(fixture.client.get(&config_url), "someone", "Otro")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = as_user(fixture.client.put(&config_url), ADMIN_UID, "Admin")
        .json(&json!({ "sheetsCsvUrl": format!("http://{}/pub", source_addr) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = as_user(fixture.client.put(&config_url), ADMIN_UID, "Admin")
        .header("x-user-email", "admin@example.com")
        .json(&json!({ "sheetsCsvUrl": format!("http://{}/pub?output=csv", source_addr) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["updatedBy"], "admin@example.com");

    let resp = as_user(fixture.client.get(&config_url), ADMIN_UID, "Admin")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["data"]["sheetsCsvUrl"]
        .as_str()
        .unwrap()
        .ends_with("/pub?output=csv"));
    assert!(body["data"]["lastConfigUpdate"].is_string());

    // Sync without a body uses the stored URL
    let resp = as_user(
        fixture.client.post(fixture.url("/api/squads/sync")),
        ADMIN_UID,
        "Admin",
    )
    .send()
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(fixture.squads().await.len(), 1);
}

#[tokio::test]
async fn test_user_profiles_and_roles() {
    let fixture = TestFixture::new().await;
    let me_url = fixture.url("/api/users/me");

    let resp = as_user(fixture.client.get(&me_url), "vol-1", "Vol Uno")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = as_user(fixture.client.put(&me_url), "vol-1", "Vol Uno")
        .header("x-user-email", "vol@example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "user");
    assert_eq!(body["data"]["email"], "vol@example.com");
    assert_eq!(body["data"]["displayName"], "Vol Uno");

    let resp = as_user(fixture.client.put(&me_url), ADMIN_UID, "Admin")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["role"], "admin");

    // Only admins change roles
    let role_url = fixture.url("/api/users/vol-1/role");
    let resp = as_user(fixture.client.put(&role_url), "vol-1", "Vol Uno")
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = as_user(fixture.client.put(&role_url), ADMIN_UID, "Admin")
        .json(&json!({ "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // The promoted user now passes admin checks
    let sheet = squad_sheet(&["2026-01-10 09:30,1,Ana,,2,Epuyen,,Si,No"]);
    assert_eq!(fixture.upload("vol-1", &sheet).await.status(), 200);

    let resp = as_user(
        fixture.client.put(fixture.url("/api/users/nobody/role")),
        ADMIN_UID,
        "Admin",
    )
    .json(&json!({ "role": "brigadista" }))
    .send()
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_public_squads_is_plain_array() {
    let fixture = TestFixture::new().await;
    let sheet = squad_sheet(&["2026-01-10 09:30,1,Ana,,2,Epuyen,,Si,No"]);
    assert_eq!(fixture.upload(ADMIN_UID, &sheet).await.status(), 200);

    let resp = Client::new()
        .get(fixture.url("/public/squads"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let squads = body.as_array().expect("plain array");
    assert_eq!(squads.len(), 1);
    assert_eq!(squads[0]["id"], "1");
}

#[tokio::test]
async fn test_post_stream_sends_snapshots() {
    let fixture = TestFixture::new().await;

    let mut resp = fixture
        .client
        .get(fixture.url("/api/posts/stream"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let first = read_until(&mut resp, "data: []").await;
    assert!(first.contains("event: snapshot"));

    fixture.create_post("owner", "Generador").await;

    let next = read_until(&mut resp, "Generador").await;
    assert!(next.contains("event: snapshot"));
}

/// Read SSE chunks until `needle` shows up.
async fn read_until(resp: &mut reqwest::Response, needle: &str) -> String {
    let mut received = String::new();
    while !received.contains(needle) {
        let chunk = tokio::time::timeout(Duration::from_secs(5), resp.chunk())
            .await
            .expect("timed out waiting for event")
            .unwrap()
            .expect("stream closed");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    received
}
