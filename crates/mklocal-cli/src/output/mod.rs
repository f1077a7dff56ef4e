//! Human-readable reporting of a run.

use colored::Colorize;
use std::path::Path;

use mklocal_core::{CaBootstrap, HostReport, HostState, PkiError, RunReport};

/// Print everything a run produced, hosts in the order they were given.
pub fn print_run(run: &RunReport) {
    if let Some(ca) = &run.ca {
        print_ca(ca);
    }

    for report in &run.hosts {
        print_host(report);
    }

    print_summary(run);
}

fn print_ca(ca: &CaBootstrap) {
    let verb = if ca.created { "Created" } else { "Using" };
    println!(
        "{} CA {}",
        verb.bold(),
        ca.artifacts.cert.display().to_string().cyan()
    );
    if let Some(dump) = &ca.dump {
        println!("{dump}");
    }
}

fn print_host(report: &HostReport) {
    println!();
    println!("{}", report.host.bold().underline());

    for text in &report.dumps {
        println!("{text}");
    }

    for err in &report.errors {
        println!("  {} {}", "ERROR:".red().bold(), err);
        if let PkiError::ToolFailed { output, .. } = err {
            for line in output.lines() {
                println!("    {}", line.dimmed());
            }
        }
    }

    match report.state {
        HostState::Pending => {}
        HostState::KeyReady => {
            print_file("key", &report.files.key);
        }
        HostState::CsrReady | HostState::Stopped => {
            print_file("key", &report.files.key);
            print_file("csr", &report.files.csr);
        }
        HostState::Signed => {
            print_file("key", &report.files.key);
            print_file("cert", &report.files.cert);
            if let Some(bundle) = &report.bundle {
                print_file("bundle", bundle);
            }
        }
    }
}

/// List a produced file; a step that failed under `--keep-going` may have
/// left nothing behind.
fn print_file(label: &str, path: &Path) {
    if path.exists() {
        println!("  {:<8} {}", label.green(), path.display());
    }
}

fn print_summary(run: &RunReport) {
    let total = run.hosts.len();
    let skipped = run.hosts.iter().filter(|r| r.skipped()).count();
    let failed = run
        .hosts
        .iter()
        .filter(|r| !r.succeeded() && !r.skipped())
        .count();
    let ok = total - skipped - failed;

    println!();
    let mut line = format!("{total} host(s): {ok} ok");
    if skipped > 0 {
        line.push_str(&format!(", {skipped} skipped"));
    }
    if failed > 0 {
        line.push_str(&format!(", {failed} failed"));
    }

    if skipped + failed == 0 {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line.yellow().bold());
    }
}
