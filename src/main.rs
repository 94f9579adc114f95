use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};

use sporlsync::{cli, config, error, logging};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Authorize a Spotify user
    Auth,

    /// Sync the followed artists of every user
    Followed,

    /// Check followed artists for new albums and singles
    FollowedAlbums(FollowedAlbumsOptions),

    /// Search new releases
    Releases(ReleasesOptions),

    /// Handle stored albums
    Albums(AlbumsOptions),

    /// Handle stored artists
    Artists(ArtistsOptions),

    /// Remove unfollowed and excluded artists
    Cleanup,

    /// Catalog counts and request cooldown status
    Info,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct FollowedAlbumsOptions {
    /// Check at most this many artists
    #[clap(long)]
    pub limit: Option<i64>,
}

#[derive(Parser, Debug, Clone)]
pub struct ReleasesOptions {
    /// Search tag to sweep; can be repeated (default: configured tags)
    #[clap(long = "tag")]
    pub tags: Vec<String>,

    /// Market to sweep; can be repeated (default: configured markets)
    #[clap(long = "market")]
    pub markets: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct AlbumsOptions {
    #[command(subcommand)]
    pub command: AlbumsSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AlbumsSubcommand {
    /// Re-fetch stored albums and write back changes
    Refresh,
}

#[derive(Parser, Debug, Clone)]
pub struct ArtistsOptions {
    #[command(subcommand)]
    pub command: ArtistsSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ArtistsSubcommand {
    /// Refresh artists that have no genre yet
    MissingGenres,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let settings = match config::Settings::load().await {
        Ok(settings) => settings,
        Err(e) => error!("Cannot load settings. Err: {}", e),
    };
    logging::init(&settings.log_level, &settings.log_format);

    let context = match cli::Context::init(settings).await {
        Ok(context) => context,
        Err(e) => error!("Cannot initialize. Err: {}", e),
    };

    let result = match cli.command {
        Command::Auth => cli::auth(&context).await,
        Command::Followed => cli::sync_followed(&context).await,
        Command::FollowedAlbums(opt) => cli::followed_albums(&context, opt.limit).await,
        Command::Releases(opt) => cli::releases(&context, opt.tags, opt.markets).await,
        Command::Albums(opt) => match opt.command {
            AlbumsSubcommand::Refresh => cli::refresh_albums(&context).await,
        },
        Command::Artists(opt) => match opt.command {
            ArtistsSubcommand::MissingGenres => cli::missing_genres(&context).await,
        },
        Command::Cleanup => cli::cleanup(&context).await,
        Command::Info => cli::info(&context).await,
        Command::Completions(_) => Ok(()),
    };

    if let Err(e) = result {
        error!("{}", e);
    }
}
