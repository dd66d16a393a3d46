use clap::{Parser, Subcommand};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "loadbox")]
#[command(about = "loadbox CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a URL through the dispatcher and report what the client saw
    Fetch(FetchArgs),
    /// Print the resolved configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// URL to load (http, https or file)
    pub url: Url,

    /// Run as a synchronous load on the calling thread
    #[arg(long)]
    pub sync: bool,

    /// Capture the body for the load-end hook instead of streaming it
    #[arg(long)]
    pub capture: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Extra request header, `Name: value` (repeatable)
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "loadbox",
            "fetch",
            "http://example.com/",
            "--sync",
            "--json",
            "-H",
            "Accept: text/html",
        ])
        .unwrap();

        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.url.as_str(), "http://example.com/");
        assert!(args.sync);
        assert!(!args.capture);
        assert!(args.json);
        assert_eq!(args.headers, vec!["Accept: text/html".to_string()]);
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(Cli::try_parse_from(["loadbox", "fetch", "not a url"]).is_err());
    }
}
