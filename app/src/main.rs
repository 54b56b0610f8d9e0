use clap::{Parser, Subcommand};
use cronctl_config::Config;
use cronctl_core::telemetry;
use cronctl_db::{CreateUserRequest, Db, TableNames, UNSCOPED_CATEGORY_ID};
use cronctl_obs::ObsState;
use cronctl_scheduler::{Engine, EngineConfig, Registry};
use cronctl_web::{auth::PasswordAuth, AppState};
use std::process;

#[derive(Parser)]
#[command(name = "cronctl")]
#[command(about = "Cron-style job scheduler with a REST control plane")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the first admin user (interactive)
    Bootstrap,
    /// Start the scheduler and both HTTP servers (default)
    Start,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    telemetry::init_tracing("development", "cronctl");

    let config = match Config::load() {
        Ok(config) => {
            tracing::debug!(?config, "Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let table_names = table_names_from_config(&config);

    let db = match Db::new(&config.database.path, table_names).await {
        Ok(db) => {
            tracing::info!("Database initialized successfully");
            db
        }
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = db.health_check().await {
        tracing::error!("Database health check failed: {}", e);
        process::exit(1);
    }

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Bootstrap => {
            interactive_bootstrap(&db, &config).await;
        }
        Commands::Start => {
            tracing::info!("cronctl starting");
            if let Err(e) = run(config, db).await {
                tracing::error!("Failed to start server: {}", e);
                process::exit(1);
            }
        }
    }
}

fn table_names_from_config(config: &Config) -> TableNames {
    TableNames {
        jobs: config.database.table_names.jobs.clone(),
        executions: config.database.table_names.executions.clone(),
        audit_logs: config.database.table_names.audit_logs.clone(),
        users: config.database.table_names.users.clone(),
        categories: config.database.table_names.categories.clone(),
        job_categories: config.database.table_names.job_categories.clone(),
    }
}

async fn interactive_bootstrap(db: &Db, config: &Config) {
    use std::io::{self, Write};

    println!();
    println!("cronctl admin user bootstrap");
    println!("=============================");
    println!();

    print!("Enter admin username (default: admin): ");
    io::stdout().flush().unwrap();
    let mut username = String::new();
    io::stdin().read_line(&mut username).unwrap();
    let username = username.trim();
    let username = if username.is_empty() { "admin" } else { username };

    if db
        .users()
        .find_by_username(username)
        .await
        .ok()
        .flatten()
        .is_some()
    {
        println!("User '{}' already exists, nothing to do.", username);
        return;
    }

    let password = match rpassword::prompt_password("Enter admin password: ") {
        Ok(pass) => pass,
        Err(_) => {
            eprintln!("Failed to read password");
            process::exit(1);
        }
    };

    if password.len() < 8 {
        eprintln!("Password must be at least 8 characters long");
        process::exit(1);
    }

    let confirm_password = match rpassword::prompt_password("Confirm admin password: ") {
        Ok(pass) => pass,
        Err(_) => {
            eprintln!("Failed to read password confirmation");
            process::exit(1);
        }
    };

    if password != confirm_password {
        eprintln!("Passwords do not match");
        process::exit(1);
    }

    let password_hash = match PasswordAuth::hash_password(&password, &config.security.argon2_params)
    {
        Ok(hash) => hash,
        Err(e) => {
            eprintln!("Failed to hash password: {}", e);
            process::exit(1);
        }
    };

    let user = match db
        .users()
        .create(CreateUserRequest {
            username: username.to_string(),
            password_hash,
            is_admin: true,
            category_id: UNSCOPED_CATEGORY_ID,
            is_permission: true,
        })
        .await
    {
        Ok(user) => user,
        Err(e) => {
            eprintln!("Failed to create user: {}", e);
            process::exit(1);
        }
    };

    println!();
    println!("Admin user '{}' created (id {}).", user.username, user.id);
}

/// Insert any `AUTH_CREDENTIALS` entries as admin users in the unscoped
/// category, skipping usernames that already exist. The password hashes in
/// this map are pre-computed argon2 PHC strings, so no hashing happens here.
async fn seed_auth_credentials(db: &Db, config: &Config) -> cronctl_core::Result<()> {
    for (username, password_hash) in &config.security.auth_credentials {
        if db.users().find_by_username(username).await?.is_some() {
            continue;
        }
        db.users()
            .create(CreateUserRequest {
                username: username.clone(),
                password_hash: password_hash.clone(),
                is_admin: true,
                category_id: UNSCOPED_CATEGORY_ID,
                is_permission: true,
            })
            .await?;
        tracing::info!(%username, "Seeded admin user from AUTH_CREDENTIALS");
    }
    Ok(())
}

async fn run(config: Config, db: Db) -> cronctl_core::Result<()> {
    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        obs_port = %config.server.obs_port,
        db_path = %config.database.path,
        "Application configured and ready"
    );

    seed_auth_credentials(&db, &config).await?;

    let engine_config = EngineConfig::from_scheduler_config(&config.scheduler)?;
    let registry = Registry::new();
    let engine = Engine::new(db.clone(), registry, engine_config);
    engine.load().await?;
    let engine_handle = engine.clone().spawn();

    let obs_state = ObsState::new();

    let web_app_state = AppState {
        db: db.clone(),
        engine: engine.clone(),
        security_config: config.security.clone(),
        rate_limit_config: config.server.rate_limit.clone(),
        body_limits_config: config.server.body_limits.clone(),
    };

    let obs_bind_addr = format!("{}:{}", config.server.host, config.server.obs_port);
    tracing::info!("Starting observability server on {}", obs_bind_addr);

    let web_bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting web server on {}", web_bind_addr);

    let obs_future = cronctl_obs::start_server(&obs_bind_addr, obs_state);
    let web_future = cronctl_web::start_server(&web_bind_addr, web_app_state);

    let result = tokio::select! {
        obs_result = obs_future => {
            tracing::error!("Observability server exited");
            obs_result
        }
        web_result = web_future => {
            tracing::error!("Web server exited");
            web_result
        }
    };

    engine.shutdown();
    engine_handle.abort();

    result
}
