use std::collections::HashMap;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    name = "gh-migrate-packages",
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output logs and the final report as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    #[command(flatten)]
    pub settings: SettingArgs,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Flags that override config file and environment values.
#[derive(clap::Args, Default)]
pub struct SettingArgs {
    /// Organization to migrate packages from
    #[arg(long, short = 's', global = true)]
    pub source_organization: Option<String>,

    /// Organization to migrate packages to
    #[arg(long, short = 't', global = true)]
    pub target_organization: Option<String>,

    /// Token with read access to the source packages
    #[arg(long, global = true)]
    pub source_token: Option<String>,

    /// Token with write access to the target packages
    #[arg(long, global = true)]
    pub target_token: Option<String>,

    /// GitHub hostname of the source organization
    #[arg(long, global = true)]
    pub source_hostname: Option<String>,

    /// GitHub hostname of the target organization
    #[arg(long, global = true)]
    pub target_hostname: Option<String>,

    /// Comma separated package types (maven, npm, container, rubygems, nuget)
    #[arg(long, global = true, value_delimiter = ',')]
    pub package_types: Option<Vec<String>>,

    /// Directory holding exported catalogs and pulled packages
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    pub work_dir: Option<String>,

    /// Retries for failed HTTP requests
    #[arg(long, global = true)]
    pub retry_max: Option<u32>,

    /// Base delay between retries, e.g. 1s or 500ms
    #[arg(long, global = true)]
    pub retry_delay: Option<String>,

    /// Proxy for plain HTTP requests
    #[arg(long, global = true)]
    pub http_proxy: Option<String>,

    /// Proxy for HTTPS requests
    #[arg(long, global = true)]
    pub https_proxy: Option<String>,

    /// Hosts that bypass the proxy
    #[arg(long, global = true)]
    pub no_proxy: Option<String>,
}

impl SettingArgs {
    /// Flag values keyed like their environment overrides.
    pub fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                overrides.insert(key.to_string(), value);
            }
        };

        set("GHMPKG_SOURCE_ORGANIZATION", self.source_organization.clone());
        set("GHMPKG_TARGET_ORGANIZATION", self.target_organization.clone());
        set("GHMPKG_SOURCE_TOKEN", self.source_token.clone());
        set("GHMPKG_TARGET_TOKEN", self.target_token.clone());
        set("GHMPKG_SOURCE_HOSTNAME", self.source_hostname.clone());
        set("GHMPKG_TARGET_HOSTNAME", self.target_hostname.clone());
        set(
            "GHMPKG_PACKAGE_TYPES",
            self.package_types.as_ref().map(|types| types.join(",")),
        );
        set("GHMPKG_WORK_DIR", self.work_dir.clone());
        set("GHMPKG_RETRY_MAX", self.retry_max.map(|n| n.to_string()));
        set("GHMPKG_RETRY_DELAY", self.retry_delay.clone());
        set("HTTP_PROXY", self.http_proxy.clone());
        set("HTTPS_PROXY", self.https_proxy.clone());
        set("NO_PROXY", self.no_proxy.clone());
        overrides
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a CSV catalog of the source organization's packages
    #[clap(name = "export", visible_alias = "e")]
    Export,

    /// Download every package in the latest exported catalog
    #[clap(name = "pull", visible_alias = "p")]
    Pull,

    /// Publish pulled packages to the target organization
    #[clap(name = "sync")]
    Sync,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_become_overrides() {
        let args = Args::parse_from([
            "gh-migrate-packages",
            "sync",
            "--source-organization",
            "acme",
            "-t",
            "acme-new",
            "--package-types",
            "npm,maven",
            "--retry-max",
            "5",
        ]);
        assert!(matches!(args.command, Commands::Sync));

        let overrides = args.settings.overrides();
        assert_eq!(overrides["GHMPKG_SOURCE_ORGANIZATION"], "acme");
        assert_eq!(overrides["GHMPKG_TARGET_ORGANIZATION"], "acme-new");
        assert_eq!(overrides["GHMPKG_PACKAGE_TYPES"], "npm,maven");
        assert_eq!(overrides["GHMPKG_RETRY_MAX"], "5");
        assert!(!overrides.contains_key("GHMPKG_SOURCE_TOKEN"));
    }
}
