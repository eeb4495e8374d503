use copheselect::error::Result;
use copheselect::param::{self, Param};
use copheselect::run;
use copheselect::utils::version;
use flexi_logger::{Duplicate, FileSpec, Logger, LoggerHandle};
use log::{error, info, warn};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn start_logger(param: &Param) -> std::result::Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(&param.general.log_level)?;
    if param.general.log_base.is_empty() {
        logger.start()
    } else {
        // <log_base>_<timestamp>.<log_suffix>, echoed on stderr
        logger
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix),
            )
            .duplicate_to_stderr(Duplicate::Info)
            .start()
    }
}

/// The flag goes down on SIGINT, SIGTERM or SIGHUP; the search then stops
/// after the generation in progress.
fn watch_signals(running: Arc<AtomicBool>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            warn!("Received signal {}, finishing the current generation...", sig);
            running.store(false, Ordering::Relaxed);
        }
    });
    Ok(())
}

fn main() {
    let param_path = std::env::args().nth(1).unwrap_or_else(|| "param.yaml".to_string());

    let param = match param::get(param_path.clone()) {
        Ok(param) => param,
        Err(e) => {
            eprintln!("Cannot read parameters from {}: {}", param_path, e);
            std::process::exit(1);
        }
    };

    let _logger = match start_logger(&param) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start logger: {}", e);
            std::process::exit(1);
        }
    };

    info!("copheselect {} with parameters from {}", version(), param_path);

    let running = Arc::new(AtomicBool::new(true));
    if let Err(e) = watch_signals(Arc::clone(&running)) {
        warn!("Signal handling unavailable: {}", e);
    }

    let exp = match run(&param, running) {
        Ok(exp) => exp,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    for name in exp.best_features() {
        println!("{}", name);
    }

    if !param.general.save_exp.is_empty() {
        match exp.save_auto(&param.general.save_exp) {
            Ok(()) => info!("Experiment saved to {}", param.general.save_exp),
            Err(e) => {
                error!("Cannot save experiment: {}", e);
                std::process::exit(1);
            }
        }
    }
}
