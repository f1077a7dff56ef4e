//! CLI argument parsing and run orchestration.

pub mod args;

use anyhow::Result;
use args::Cli;
use clap::Parser;
use std::io::IsTerminal;
use tracing::Level;

use mklocal_core::{
    issue_all, AltNames, CaSettings, FailurePolicy, OpensslCli, Settings, Subject,
};

use crate::config::Config;
use crate::output;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;
    let (settings, hosts) = resolve(cli, config);

    let backend = OpensslCli::new(&settings.tool);
    let run = issue_all(&settings, &backend, &hosts).await?;
    output::print_run(&run);

    Ok(())
}

/// Diagnostics, including every openssl command line and its output, go to
/// stdout alongside the report.
fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stdout().is_terminal())
        .with_writer(std::io::stdout)
        .try_init()
        .ok();
}

/// Merge command line, defaults file and built-in defaults into the
/// settings for this run.
pub fn resolve(cli: Cli, config: Config) -> (Settings, Vec<String>) {
    let mut settings = Settings::new(cli.mode());
    let defaults = CaSettings::default();

    if let Some(tool) = cli.openssl.or(config.openssl) {
        settings.tool = tool;
    }
    settings.bits = cli.bits.or(config.bits).unwrap_or(settings.bits);
    settings.days = cli.days.or(config.days).unwrap_or(settings.days);

    settings.subject = Subject {
        country: cli.country,
        state: cli.state,
        city: cli.city,
        organization: cli.org,
        unit: cli.unit,
    }
    .with_defaults(config.subject);

    settings.alt_names = AltNames {
        domains: if cli.domain.is_empty() {
            config.domains
        } else {
            cli.domain
        },
        dns: cli.dns,
        ip: cli.ip,
        email: cli.email,
    };

    if let Some(dir) = cli.out_dir.or(config.out_dir) {
        settings.out_dir = dir;
    }

    settings.ca = CaSettings {
        dir: cli.ca_dir.or(config.ca.dir).unwrap_or(defaults.dir),
        prefix: cli.ca_prefix.or(config.ca.prefix).unwrap_or(defaults.prefix),
        days: cli.ca_days.or(config.ca.days).unwrap_or(defaults.days),
        bits: cli.ca_bits.or(config.ca.bits).unwrap_or(defaults.bits),
        passphrase_len: cli
            .ca_codigo_len
            .or(config.ca.codigo_len)
            .unwrap_or(defaults.passphrase_len),
    };

    settings.failure_policy = if cli.keep_going {
        FailurePolicy::KeepGoing
    } else {
        config.failure_policy.unwrap_or_default()
    };
    settings.jobs = usize::from(cli.jobs.or(config.jobs).unwrap_or(1));
    settings.verbose = cli.verbose;

    (settings, cli.hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaConfig;
    use mklocal_core::Mode;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mklocal").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn built_in_defaults() {
        let (settings, hosts) = resolve(parse(&["--self", "web"]), Config::default());

        assert_eq!(hosts, vec!["web"]);
        assert_eq!(settings, Settings::new(Mode::SelfSigned));
    }

    #[test]
    fn command_line_beats_config_file() {
        let config = Config {
            bits: Some(2048),
            days: Some(90),
            openssl: Some(PathBuf::from("/opt/bin/openssl")),
            subject: Subject {
                country: Some("CA".into()),
                state: Some("BC".into()),
                ..Subject::default()
            },
            domains: vec!["corp.test".into()],
            ca: CaConfig {
                prefix: Some("CorpCA".into()),
                days: Some(1000),
                ..CaConfig::default()
            },
            ..Config::default()
        };

        let (settings, _) = resolve(
            parse(&[
                "--ca",
                "--bits",
                "3072",
                "--country",
                "US",
                "--domain",
                "home.test",
                "--caDays",
                "365",
                "nas",
            ]),
            config,
        );

        assert_eq!(settings.mode, Mode::Ca);
        assert_eq!(settings.bits, 3072);
        assert_eq!(settings.days, 90);
        assert_eq!(settings.tool, PathBuf::from("/opt/bin/openssl"));
        assert_eq!(settings.subject.country.as_deref(), Some("US"));
        assert_eq!(settings.subject.state.as_deref(), Some("BC"));
        assert_eq!(settings.alt_names.domains, vec!["home.test"]);
        assert_eq!(settings.ca.prefix, "CorpCA");
        assert_eq!(settings.ca.days, 365);
        assert_eq!(settings.ca.dir, PathBuf::from("CA"));
    }

    #[test]
    fn config_domains_apply_when_none_given() {
        let config = Config {
            domains: vec!["lan".into()],
            ..Config::default()
        };
        let (settings, _) = resolve(parse(&["--csr", "printer"]), config);
        assert_eq!(settings.alt_names.domains, vec!["lan"]);
    }

    #[test]
    fn keep_going_flag_overrides_policy() {
        let (settings, _) = resolve(
            parse(&["--self", "--keep-going", "-j", "3", "a"]),
            Config::default(),
        );
        assert_eq!(settings.failure_policy, FailurePolicy::KeepGoing);
        assert_eq!(settings.jobs, 3);

        let config = Config {
            failure_policy: Some(FailurePolicy::KeepGoing),
            ..Config::default()
        };
        let (settings, _) = resolve(parse(&["--self", "a"]), config);
        assert_eq!(settings.failure_policy, FailurePolicy::KeepGoing);
    }
}
