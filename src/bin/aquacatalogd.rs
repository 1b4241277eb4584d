use std::sync::Arc;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use aquacatalog::{
    AppState, CatalogConfig, CatalogService, DataStore, Environment, InMemoryDataStore,
    PgDataStore, create_species_router,
};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Args {
    #[arrrg(optional, "Path to a YAML configuration file")]
    config: Option<String>,
    #[arrrg(optional, "Host to bind the HTTP server")]
    host: Option<String>,
    #[arrrg(optional, "Port to bind the HTTP server")]
    port: Option<u16>,
    #[arrrg(optional, "PostgreSQL database URL; the catalog is kept in memory without one")]
    database_url: Option<String>,
    #[arrrg(optional, "Deployment environment: production, development or test")]
    environment: Option<String>,
    #[arrrg(flag, "Enable verbose logging")]
    verbose: bool,
}

const HELP_TEXT: &str = r#"aquacatalogd - species catalog daemon

USAGE:
    aquacatalogd [OPTIONS]

OPTIONS:
    --config <PATH>          YAML configuration file
    --host <HOST>            Host to bind the HTTP server [default: 127.0.0.1]
    --port <PORT>            Port to bind the HTTP server [default: 8080]
    --database-url <URL>     PostgreSQL database URL [default: in-memory store]
    --environment <ENV>      production, development or test [default: from config]
    --verbose                Enable verbose logging

DESCRIPTION:
    Serves the species catalog under /api/.  Callers authenticate with a
    bearer token whose payload carries their id and roles; requests without
    one are served as anonymous.

    In production, species can only be published once they hold every
    sub-document their kind requires.

    The server supports graceful shutdown via Ctrl+C.

API ENDPOINTS:
    Species:
      GET    /api/species                 List visible species
      POST   /api/species                 Post a species
      GET    /api/species/{id}            Get a species
      PATCH  /api/species/{id}            Update a species
      DELETE /api/species/{id}            Delete a species
      PATCH  /api/species/{id}/validate   Change the validation state
      GET    /api/species/{id}/{type}     Read an attached sub-document, where
                                          {type} is species_naming, water_constraints,
                                          species_reproduction, animal_behaviour,
                                          animal_specs, plant_specs or invertebrate_specs

    Sub-documents, for each of species_namings, water_constraints,
    species_reproductions, animal_behaviours, common_living_properties,
    animal_specs, plant_specs, invertebrate_specs and images:
      POST   /api/{collection}            Create and attach
      GET    /api/{collection}/{id}       Get
      PATCH  /api/{collection}/{id}       Update or re-point
      DELETE /api/{collection}/{id}       Delete"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, free) = Args::from_command_line("USAGE: aquacatalogd [OPTIONS]");

    if !free.is_empty() && free[0] == "help" {
        println!("{}", HELP_TEXT);
        return Ok(());
    }

    let settings = ServerSettings::from_args(args)?;
    init_tracing(settings.verbose);

    let store: Arc<dyn DataStore> = match &settings.database_url {
        Some(url) => {
            tracing::info!("connecting to PostgreSQL");
            Arc::new(PgDataStore::connect(url).await?)
        }
        None => {
            tracing::warn!("no --database-url given; the catalog lives in memory only");
            Arc::new(InMemoryDataStore::new())
        }
    };

    tracing::info!(
        environment = %settings.catalog.environment,
        enforce_completeness = settings.catalog.enforces_publication_completeness(),
        page_size = settings.catalog.page_size,
        "catalog configured"
    );

    let state = AppState::new(CatalogService::new(store, settings.catalog.clone()));
    let app = Router::new().nest("/api", create_species_router(state));

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    println!("aquacatalogd listening on http://{}/api", addr);
    println!(
        "Storage: {}",
        if settings.database_url.is_some() {
            "postgresql"
        } else {
            "in-memory"
        }
    );
    println!("Use Ctrl+C for graceful shutdown");

    let shutdown_signal = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        () = shutdown_signal => {
            println!();
            println!("Shutdown signal received, stopping server");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "aquacatalog=debug,aquacatalogd=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

struct ServerSettings {
    catalog: CatalogConfig,
    host: String,
    port: u16,
    database_url: Option<String>,
    verbose: bool,
}

impl ServerSettings {
    fn from_args(args: Args) -> Result<Self, Box<dyn std::error::Error>> {
        let mut catalog = match &args.config {
            Some(path) => CatalogConfig::load(path)?,
            None => CatalogConfig::default(),
        };
        if let Some(environment) = &args.environment {
            catalog.environment = environment.parse::<Environment>()?;
        }
        Ok(Self {
            catalog,
            host: args.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: args.port.unwrap_or(8080),
            database_url: args.database_url,
            verbose: args.verbose,
        })
    }
}
