use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use herbgarden::api::{self, ApiState};
use herbgarden::catalog::{CatalogBackend, Herb, HerbForm, RestCatalog, SessionContext};
use herbgarden::client::{self, PlantIdentifier, ProxyClient};
use herbgarden::config::{self, Config, LoggingConfig};
use herbgarden::language;
use herbgarden::proxy::{IdentificationProxy, TranslationProxy};
use herbgarden::secrets::{self, EnvSecrets, SecretResolver, SecretStore};
use herbgarden::upstream::{
    IdentificationOutcome, OpenAiChat, OpenAiChatConfig, PlantIdClient, PlantIdConfig,
};
use herbgarden::view::{HerbDetailView, HerbListView, ViewState};

#[derive(Parser)]
#[command(name = "herbgarden")]
#[command(author, version, about = "Herb catalog with plant identification and translation proxies", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the identification and translation proxy server
    Serve {
        /// Override the bind address (e.g., "0.0.0.0:8787")
        #[arg(long)]
        bind: Option<String>,
    },

    /// List herbs from the catalog
    List {
        /// Display language (en, hi, es, ...)
        #[arg(
            short,
            long,
            default_value = language::DEFAULT_LANGUAGE,
            value_parser = language::parse_language
        )]
        language: String,

        /// Case-insensitive search over name and description
        #[arg(short, long)]
        search: Option<String>,

        /// Category filter ("all" disables it)
        #[arg(long)]
        category: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one herb
    Show {
        /// Herb id
        id: String,

        /// Display language
        #[arg(
            short,
            long,
            default_value = language::DEFAULT_LANGUAGE,
            value_parser = language::parse_language
        )]
        language: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Identify a plant from photos
    Identify {
        /// Image files
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Add a herb to the catalog (admin only)
    Add(AddArgs),

    /// Configure settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// Manage secrets in the system keyring
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },

    /// Manage the proxy API key
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
}

#[derive(clap::Args)]
struct AddArgs {
    /// Admin account email (password is prompted)
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    description: String,
    #[arg(long)]
    category: String,
    #[arg(long, default_value = "")]
    scientific_name: String,
    /// Comma-separated
    #[arg(long, default_value = "")]
    benefits: String,
    /// Comma-separated
    #[arg(long, default_value = "")]
    uses: String,
    #[arg(long, default_value = "")]
    growing_conditions: String,
    #[arg(long, default_value = "")]
    medicinal_properties: String,
    #[arg(long, default_value = "")]
    culinary_uses: String,
    #[arg(long, default_value = "")]
    precautions: String,
    #[arg(long, default_value = "")]
    image_url: String,
    #[arg(long, default_value = "")]
    amazon_link: String,
}

impl From<AddArgs> for HerbForm {
    fn from(args: AddArgs) -> Self {
        HerbForm {
            name: args.name,
            scientific_name: args.scientific_name,
            description: args.description,
            category: args.category,
            image_url: args.image_url,
            benefits: args.benefits,
            uses: args.uses,
            growing_conditions: args.growing_conditions,
            medicinal_properties: args.medicinal_properties,
            culinary_uses: args.culinary_uses,
            precautions: args.precautions,
            amazon_link: args.amazon_link,
        }
    }
}

#[derive(Subcommand)]
enum SecretAction {
    /// Store a secret (value is prompted)
    Set {
        /// Secret name (e.g., "plant-id")
        name: String,
    },
    /// Delete a secret
    Delete { name: String },
    /// Check keyring availability
    Check,
}

#[derive(Subcommand)]
enum ApiKeyAction {
    /// Generate a new API key and print its hash
    Generate {
        /// Store the hash in the config file
        #[arg(long)]
        save: bool,
    },
}

fn init_logging(verbose: bool, config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = if verbose {
        EnvFilter::new("herbgarden=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("herbgarden={},tower_http=info", config.level))
        })
    };

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "herbgarden.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    guard
}

fn config_path(cli_path: Option<&Path>) -> anyhow::Result<PathBuf> {
    match cli_path {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Config::config_path()?),
    }
}

/// Resolve a config value that may be a keyring: reference.
fn resolve(value: &str) -> anyhow::Result<String> {
    secrets::resolve_secret(value, &SecretStore::new())
        .with_context(|| format!("Failed to resolve secret '{}'", value))
}

fn catalog(config: &Config) -> anyhow::Result<RestCatalog> {
    let anon_key = resolve(&config.catalog.anon_key)?;
    Ok(RestCatalog::new(
        &config.catalog.url,
        &anon_key,
        config.catalog.timeout_secs,
    )?)
}

fn proxy_client(config: &Config) -> anyhow::Result<ProxyClient> {
    let api_key = config
        .catalog
        .proxy_api_key
        .as_deref()
        .map(resolve)
        .transpose()?;
    Ok(ProxyClient::new(
        &config.catalog.proxy_url,
        api_key,
        config.catalog.timeout_secs,
    )?)
}

async fn serve(config: &Config, bind: Option<String>) -> anyhow::Result<()> {
    let secrets: Arc<dyn SecretResolver> = Arc::new(EnvSecrets::new());

    let plant_id = PlantIdClient::new(PlantIdConfig::from(&config.identification))?;
    let chat = OpenAiChat::new(OpenAiChatConfig::from(&config.translation))?;
    info!(
        "Translation model: {} ({})",
        config.translation.model, config.translation.base_url
    );

    let state = ApiState::new(
        Arc::new(IdentificationProxy::new(
            Arc::new(plant_id),
            Arc::clone(&secrets),
            &config.identification.api_key_env,
        )),
        Arc::new(TranslationProxy::new(
            Arc::new(chat),
            secrets,
            &config.translation.api_key_env,
        )),
        config.server.api_key_hash.clone(),
    );

    let mut server = config.server.clone();
    if let Some(bind) = bind {
        server.bind = bind;
    }
    api::serve(state, &server).await
}

fn print_herb(herb: &Herb) {
    println!("{}", herb.name);
    println!("  Category: {}", herb.category);
    println!("  {}", herb.description);
    if !herb.benefits.is_empty() {
        println!("  Benefits: {}", herb.benefits.join(", "));
    }
    if !herb.uses.is_empty() {
        println!("  Uses: {}", herb.uses.join(", "));
    }
    for (label, value) in herb.detail_fields() {
        println!("  {}: {}", label, value);
    }
    println!("  Buy: {}", herb.purchase_link());
}

async fn list(
    config: &Config,
    lang: &str,
    search: Option<String>,
    category: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let backend = catalog(config)?;
    let translator = Arc::new(proxy_client(config)?);

    let mut view = HerbListView::new(translator, config.queue.max_in_flight);
    view.set_language(lang);
    view.load(&backend).await;
    if let ViewState::Error(notice) = view.state() {
        anyhow::bail!("{}", notice);
    }
    view.settle().await;
    if view.failed_translations() > 0 {
        eprintln!(
            "{} herb(s) could not be translated and are shown in English",
            view.failed_translations()
        );
    }

    if let Some(search) = search {
        view.set_search(&search);
    }
    if let Some(category) = category {
        view.set_category(&category);
    }

    let herbs = view.visible();
    if json {
        println!("{}", serde_json::to_string_pretty(&herbs)?);
        return Ok(());
    }

    if herbs.is_empty() {
        println!("No herbs found");
        return Ok(());
    }
    for herb in herbs {
        println!("{:<38} {:<24} {}", herb.id, herb.name, herb.category);
    }
    println!("\nCategories: {}", view.categories().join(", "));
    Ok(())
}

async fn show(config: &Config, id: &str, lang: &str, json: bool) -> anyhow::Result<()> {
    let backend = catalog(config)?;
    let translator = proxy_client(config)?;

    let mut view = HerbDetailView::new();
    view.load(&backend, id).await;
    if let ViewState::Error(notice) = view.state() {
        anyhow::bail!("{}", notice);
    }
    view.set_language(lang, &translator).await;

    let herb = view
        .display()
        .ok_or_else(|| anyhow::anyhow!("Herb not found"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(herb)?);
    } else {
        print_herb(herb);
    }
    Ok(())
}

async fn identify(config: &Config, paths: &[PathBuf]) -> anyhow::Result<()> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        images.push(client::read_image(path).await?);
    }

    match proxy_client(config)?.identify(&images).await? {
        IdentificationOutcome::Match(result) => {
            println!(
                "{} ({:.1}% confidence)",
                result.name,
                result.probability * 100.0
            );
            if !result.common_names.is_empty() {
                println!("  Common names: {}", result.common_names.join(", "));
            }
            if let Some(family) = result.family {
                println!("  Family: {}", family);
            }
            if let Some(description) = result.description {
                println!("  {}", description);
            }
        }
        IdentificationOutcome::NoMatch => {
            println!("No plant could be identified. Try a clearer photo.");
        }
    }
    Ok(())
}

async fn add(config: &Config, args: AddArgs) -> anyhow::Result<()> {
    let backend = catalog(config)?;
    let email = args.email.clone();
    let herb = HerbForm::from(args).into_new_herb()?;

    let password = secrets::prompt_secret(&format!("Password for {}: ", email))?;
    let mut ctx = SessionContext::acquire(&backend, &email, &password).await?;

    let result = match ctx.require_admin() {
        Ok(session) => backend.insert_herb(session, &herb).await,
        Err(e) => Err(e),
    };
    if let Err(e) = ctx.sign_out(&backend).await {
        tracing::warn!("Sign-out failed: {}", e);
    }

    let inserted = result?;
    println!("Added {} ({})", inserted.name, inserted.id);
    Ok(())
}

fn generate_api_key(path: &Path, save: bool) -> anyhow::Result<()> {
    let key = api::generate_api_key();
    let hash = api::hash_api_key(&key);

    println!("API key:  {}", key);
    println!("Key hash: {}", hash);

    if save {
        let mut config = Config::load_from(path)?;
        config.server.api_key_hash = Some(hash);
        config.save_to(path)?;
        println!("\nHash saved to {}", path.display());
    } else {
        println!("\nAdd the hash to [server] api_key_hash, or rerun with --save.");
    }
    println!("Clients send the key in the apikey or X-API-Key header.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = config_path(cli.config.as_deref())?;

    // Commands that must work with a broken config file
    match &cli.command {
        Commands::Config { show } => {
            if *show {
                config::show(&path)?;
            } else {
                println!("Config file: {}", path.display());
                println!("Edit it directly, or use --show to print it.");
            }
            return Ok(());
        }
        Commands::Secret { action } => {
            return match action {
                SecretAction::Set { name } => secrets::cli::handle_set(name),
                SecretAction::Delete { name } => secrets::cli::handle_delete(name),
                SecretAction::Check => secrets::cli::handle_check(),
            };
        }
        _ => {}
    }

    let config = Config::load_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    let _guard = init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Serve { bind } => serve(&config, bind).await?,
        Commands::List {
            language,
            search,
            category,
            json,
        } => list(&config, &language, search, category, json).await?,
        Commands::Show { id, language, json } => show(&config, &id, &language, json).await?,
        Commands::Identify { images } => identify(&config, &images).await?,
        Commands::Add(args) => add(&config, args).await?,
        Commands::ApiKey {
            action: ApiKeyAction::Generate { save },
        } => generate_api_key(&path, save)?,
        Commands::Config { .. } | Commands::Secret { .. } => {}
    }

    Ok(())
}
