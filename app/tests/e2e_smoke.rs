//! ABOUTME: End-to-end smoke test exercising bootstrap, job creation and execution lifecycle
//! ABOUTME: Drives the REST surface with real HTTP requests against a server bound to an ephemeral port

use cronctl_config::Config;
use cronctl_core::telemetry;
use cronctl_db::{CreateUserRequest, Db, TableNames, UNSCOPED_CATEGORY_ID};
use cronctl_scheduler::{Engine, EngineConfig, Registry};
use cronctl_web::{auth::PasswordAuth, AppState};
use reqwest::Client;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::time::Duration;
use tempfile::TempDir;
use test_support::create_test_id;
use tokio::time::timeout;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind ephemeral port")
        .local_addr()
        .expect("local addr")
        .port()
}

struct Harness {
    _temp_dir: TempDir,
    config: Config,
    client: Client,
    base_url: String,
}

impl Harness {
    async fn start() -> Self {
        let test_id = create_test_id();
        let temp_dir = TempDir::new().expect("temp dir");
        let db_path = temp_dir.path().join(format!("test_{}.db", test_id));

        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = free_port();
        config.server.obs_port = free_port();
        config.database.path = db_path.to_string_lossy().to_string();
        config.security.jwt_secret = format!("test_jwt_secret_32_characters_{}", test_id);

        let db = Db::new(&config.database.path, TableNames::default())
            .await
            .expect("open db");

        let password_hash =
            PasswordAuth::hash_password("testpass123", &config.security.argon2_params)
                .expect("hash password");
        db.users()
            .create(CreateUserRequest {
                username: "admin".to_string(),
                password_hash,
                is_admin: true,
                category_id: UNSCOPED_CATEGORY_ID,
                is_permission: true,
            })
            .await
            .expect("create admin user");

        let engine_config =
            EngineConfig::from_scheduler_config(&config.scheduler).expect("engine config");
        let engine = Engine::new(db.clone(), Registry::new(), engine_config);
        engine.load().await.expect("load engine");
        let _engine_handle = engine.clone().spawn();

        let app_state = AppState {
            db: db.clone(),
            engine,
            security_config: config.security.clone(),
            rate_limit_config: config.server.rate_limit.clone(),
            body_limits_config: config.server.body_limits.clone(),
        };

        let bind_addr = format!("{}:{}", config.server.host, config.server.port);
        tokio::spawn(cronctl_web::start_server(&bind_addr, app_state));
        // Give the listener a moment to bind before the first request.
        tokio::time::sleep(Duration::from_millis(150)).await;

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .cookie_store(true)
            .build()
            .expect("http client");

        Self {
            _temp_dir: temp_dir,
            base_url: format!("http://{}", bind_addr),
            config,
            client,
        }
    }

    async fn login(&self) -> String {
        let response = timeout(
            Duration::from_secs(5),
            self.client
                .post(format!("{}/api/v1/auth/login", self.base_url))
                .json(&json!({ "username": "admin", "password": "testpass123" }))
                .send(),
        )
        .await
        .expect("login timeout")
        .expect("login request");

        assert!(response.status().is_success(), "login failed: {}", response.status());
        let body: Value = response.json().await.expect("login body");
        body["token"].as_str().expect("token field").to_string()
    }
}

#[tokio::test]
async fn bootstrap_login_and_job_lifecycle() {
    telemetry::init_tracing("test", "cronctl-e2e-smoke");

    let harness = Harness::start().await;
    assert!(harness.config.security.jwt_secret.len() >= 32);

    let token = harness.login().await;

    let create_response = harness
        .client
        .post(format!("{}/api/v1/jobs", harness.base_url))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "name": "smoke-test-job",
            "job_class_string": "echo",
            "pub_args": ["hello"],
            "minute": "*",
            "hour": "*",
            "day": "*",
            "month": "*",
            "day_of_week": "*",
        }))
        .send()
        .await
        .expect("create job request");

    assert!(
        create_response.status().is_success(),
        "create job failed: {}",
        create_response.status()
    );
    let created: Value = create_response.json().await.expect("create job body");
    let job_id = created["job_id"].as_str().expect("job_id field").to_string();

    let run_response = harness
        .client
        .post(format!("{}/api/v1/executions/{}", harness.base_url, job_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("run now request");
    assert!(
        run_response.status().is_success(),
        "run now failed: {}",
        run_response.status()
    );
    let run_now_body: Value = run_response.json().await.expect("run now body");
    let execution_id = run_now_body["execution_id"]
        .as_str()
        .expect("execution_id field")
        .to_string();

    let get_execution_response = harness
        .client
        .get(format!("{}/api/v1/executions/{}", harness.base_url, execution_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("get execution request");
    assert!(get_execution_response.status().is_success());
    let execution: Value = get_execution_response.json().await.expect("execution body");
    assert_eq!(execution["state"], "SUCCEEDED");

    let list_response = harness
        .client
        .get(format!("{}/api/v1/jobs", harness.base_url))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("list jobs request");
    assert!(list_response.status().is_success());
    let jobs: Value = list_response.json().await.expect("list jobs body");
    let jobs = jobs["jobs"].as_array().expect("jobs array");
    assert!(jobs.iter().any(|j| j["job_id"] == job_id));

    let pause_response = harness
        .client
        .patch(format!("{}/api/v1/jobs/{}", harness.base_url, job_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("pause job request");
    assert!(pause_response.status().is_success());

    let delete_response = harness
        .client
        .delete(format!("{}/api/v1/jobs/{}", harness.base_url, job_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("delete job request");
    assert!(delete_response.status().is_success());
}
