use clap::{Parser, Subcommand};
use servershots::config::{self, ServerConfig};
use servershots::generate::{SiteGenerator, TemplateSource};
use servershots::layout::Layout;
use servershots::server::{self, AppState};
use servershots::{assets, store};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let hash = env!("SERVERSHOTS_GIT_HASH");
    if hash.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "servershots")]
#[command(about = "Self-hosted screenshot gallery")]
#[command(long_about = "\
Self-hosted screenshot gallery

Visitors upload screenshots tagged with a server name. Every upload or
delete regenerates a static index.html in the output directory, which is
served together with the images.

Output structure:

  out/
  ├── index.html          # Generated page
  ├── style.css           # Bundled or installed from static_dir
  ├── data.json           # Gallery state (written at most once per quiet window)
  ├── images/             # Uploaded screenshots
  └── deleted_images/     # Deleted screenshots (moved, never erased)

Run 'servershots gen-config' to print a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Output directory (site, images, data file)
    #[arg(long, default_value = "out", global = true)]
    out: PathBuf,

    /// Config file (TOML); stock defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Args, Default)]
struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,
    /// Port to bind (overrides config)
    #[arg(long)]
    port: Option<u16>,
    /// Development mode: reload template and symlink assets
    #[arg(long)]
    live: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gallery server (default)
    Serve(ServeArgs),
    /// Regenerate index.html from data.json and exit
    Generate,
    /// Print a stock config file with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => {
            let mut config = config::load_config(cli.config.as_deref())?;
            if let Some(host) = args.host {
                config.hostname = host;
            }
            if let Some(port) = args.port {
                config.port = port;
            }
            config.live |= args.live;
            config.validate()?;
            serve(&cli.out, config).await?;
        }
        Command::Generate => {
            let config = config::load_config(cli.config.as_deref())?;
            generate_once(&cli.out, &config).await?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

async fn serve(out: &Path, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let layout = Layout::new(out);
    layout.prepare()?;
    assets::install(config.static_dir.as_deref(), &layout.root, config.live)?;

    let (state, _persister) = AppState::open(layout, &config).await?;
    let saver = state.saver.clone();
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind((config.hostname.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Server running at http://{addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    saver.flush().await?;
    Ok(())
}

async fn generate_once(
    out: &Path,
    config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = Layout::new(out);
    let gallery = store::load(&layout.data_file);

    let source = match &config.template {
        Some(path) => TemplateSource::File(path.clone()),
        None => TemplateSource::Bundled,
    };
    let site =
        SiteGenerator::new(source, false, config.site_title.clone(), &layout.index_file).await?;
    std::fs::create_dir_all(&layout.root)?;
    site.regenerate(&gallery).await?;

    for collection in &gallery.servers {
        println!(
            "{} → #{} ({} images)",
            collection.name,
            collection.slug,
            collection.images.len()
        );
    }
    println!(
        "Generated {} with {} collections, {} images",
        layout.index_file.display(),
        gallery.servers.len(),
        gallery.image_count()
    );
    Ok(())
}
