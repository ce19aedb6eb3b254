use camino::Utf8PathBuf;
use tokio::signal::unix::SignalKind;

use crate::modes::Mode;
use crate::modes::ModeName;

mod button;
mod cache;
mod canvas;
mod cli;
mod color;
mod compositor;
mod config;
mod display;
mod error;
mod feed;
mod led;
mod logging;
mod modes;
mod screens;
mod selector;
mod systemd;

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::eyre::Result<()> {
    setup_panic();
    color_eyre::install().map_err(crate::error::Error::InstallingColorEyre)?;
    let cli = <crate::cli::Cli as clap::Parser>::parse();
    crate::logging::setup(cli.verbosity);

    let cfg = crate::config::Config::load(&cli.config).await?;
    let warnings = cfg.validate()?;
    for warning in &warnings {
        tracing::warn!(%warning, "Configuration warning");
    }

    match cli.command {
        cli::Command::Run => {
            run(cfg).await?;
        }
        cli::Command::VerifyConfig => {
            let enabled: Vec<ModeName> = ModeName::ALL
                .into_iter()
                .filter(|mode| cfg.is_enabled(*mode))
                .collect();
            tracing::info!(?enabled, warnings = warnings.len(), "Configuration verified");
        }
        cli::Command::Render { mode, output } => {
            render(&cfg, mode, output).await?;
        }
    }

    Ok(())
}

fn setup_panic() {
    human_panic::setup_panic!(human_panic::Metadata::new(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ));
}

fn http_client(config: &crate::config::HttpConfig) -> Result<reqwest::Client, crate::error::Error> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str())
        .build()
        .map_err(crate::error::Error::HttpClient)
}

async fn run(config: crate::config::Config) -> Result<(), crate::error::Error> {
    let process_state = crate::systemd::ProcessState {
        span: tracing::info_span!("systemd"),
    };

    let client = http_client(&config.http)?;
    let modes = crate::modes::build_all(&config, &client);
    tracing::info!(modes = ?modes.keys().collect::<Vec<_>>(), "Modes ready");

    let (led_worker, led) = match config
        .gpio
        .led
        .and_then(|offset| crate::led::LedWorker::start(&config.gpio.chip, offset))
    {
        Some((worker, sender)) => (Some(worker), Some(sender)),
        None => (None, None),
    };

    let mut selector = crate::selector::Selector::new(modes, config.scheduler.initial_mode);
    if let Some(led) = led.clone() {
        selector = selector.with_led(led);
    }

    let monitor = crate::button::ButtonMonitor::start(
        &config.gpio,
        led,
        crate::button::switch_on_press(config.buttons.clone(), selector.pending()),
    );
    if monitor.is_none() {
        tracing::warn!("Running without buttons");
    }

    let mut display = crate::display::PaletteDisplay::new(&config.display);
    if let Err(error) = crate::screens::show_loading(&mut display, "Starting up...") {
        tracing::error!(?error, "Failed to show startup screen");
    }

    let cancellation_token = tokio_util::sync::CancellationToken::new();
    let mut sigterm =
        tokio::signal::unix::signal(SignalKind::terminate()).map_err(crate::error::Error::Signal)?;
    tokio::task::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Ctrl-C received, shutting down"),
                _ = sigterm.recv() => tracing::info!("SIGTERM received, shutting down"),
            }
            cancellation_token.cancel();
        }
    });

    process_state.set_ready();
    if let Some(mode) = selector.current() {
        tracing::info!(%mode, "Starting");
        process_state.set_mode(mode);
    }

    let mut tick_interval = tokio::time::interval(config.scheduler.tick_interval);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => break,

            _ = tick_interval.tick() => {
                if selector.tick(&mut display).await {
                    if let Some(mode) = selector.current() {
                        process_state.set_mode(mode);
                    }
                }
            }
        }
    }

    process_state.set_stopping();
    if let Some(monitor) = monitor {
        monitor.stop();
    }
    // The selector holds the last LED sender; the worker exits once it is gone.
    drop(selector);
    if let Some(worker) = led_worker {
        worker.join();
    }

    tracing::info!("Stopped");
    Ok(())
}

async fn render(
    config: &crate::config::Config,
    name: ModeName,
    output: Utf8PathBuf,
) -> Result<(), crate::error::Error> {
    let client = http_client(&config.http)?;
    let mut mode = crate::modes::build(name, config, &client)
        .ok_or(crate::error::Error::ModeUnavailable(name))?;
    let mut display = crate::display::PaletteDisplay::to_file(&config.display, output.clone());

    mode.on_enter();
    mode.update(&mut display)
        .await
        .map_err(|source| crate::error::Error::Render { name, source })?;

    tracing::info!(mode = %name, %output, "Frame written");
    Ok(())
}
