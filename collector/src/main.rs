//! Collector entry-point: loads settings, wires a backend and runs one
//! command or an interactive shell.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use collector::inbound::cli::{self, CliArgs, Command, Console};
use collector::outbound::memory::InMemoryBackend;
use collector::outbound::supabase::SupabaseBackend;
use collector::{Collector, CollectorSettings, Ports};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(err) => err.exit(),
    };

    let settings = CollectorSettings::load_from_iter([OsString::from("collector")])
        .wrap_err("load settings")?;
    init_tracing(settings.log_json);

    let app = build_app(&settings, &args)?;
    let _follower = app.start().await.wrap_err("restore session")?;

    let stdout = io::stdout();
    let mut console = Console::new(app, stdout.lock());
    match args.command {
        Command::Shell => console.shell(io::stdin().lock()).await?,
        command => console.execute(command).await?,
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let builder = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    if let Err(e) = result {
        warn!(error = %e, "tracing init failed");
    }
}

fn build_app(settings: &CollectorSettings, args: &CliArgs) -> Result<Collector> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let undo_window = settings.undo_window()?;
    let ports: Ports = if args.offline || settings.offline {
        info!("using in-process backend; nothing is persisted");
        InMemoryBackend::new(clock.clone()).into()
    } else {
        let mut endpoint = settings.supabase_endpoint()?;
        if let Some(path) = &args.session_file {
            endpoint.session_file = Some(path.clone());
        }
        info!(url = %endpoint.base_url, "using hosted backend");
        SupabaseBackend::connect(&endpoint, clock.clone())
            .wrap_err("connect to backend")?
            .into()
    };
    Ok(Collector::new(ports, clock, undo_window))
}

#[cfg(test)]
mod tests {
    //! Wiring checks for the binary entry-point.

    use super::*;
    use clap::Parser;
    use env_lock::lock_env;
    use rstest::rstest;

    #[rstest]
    #[tokio::test]
    async fn offline_flag_builds_an_in_process_app() {
        let settings = {
            let _guard = lock_env([
                ("COLLECTOR_SUPABASE_URL", None::<&str>),
                ("COLLECTOR_OFFLINE", None),
                ("COLLECTOR_UNDO_WINDOW_SECS", Some("7")),
            ]);
            CollectorSettings::load_from_iter([OsString::from("collector")])
                .expect("settings load")
        };
        let args = CliArgs::try_parse_from(["collector", "--offline", "whoami"]).expect("args");

        let app = build_app(&settings, &args).expect("offline app");
        app.start().await.expect("start");

        assert_eq!(app.items.undo_window(), std::time::Duration::from_secs(7));
        assert!(app.auth.current_user().is_none());
    }
}
