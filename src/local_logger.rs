use std::{env, io::Write, sync::Arc, time::Duration};

use crate::logger::{GroupEvent, get_group_event};
use crate::prelude::*;
use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use log::Log;
use parking_lot::Mutex;
use simplelog::{CombinedLogger, SharedLogger};

pub const PROCTREE_U8_COLOR_CODE: u8 = 37; // #00AFAF

lazy_static! {
    pub static ref SPINNER: Arc<Mutex<Option<ProgressBar>>> = Arc::new(Mutex::new(None));
    pub static ref IS_TTY: bool = std::io::IsTerminal::is_terminal(&std::io::stdout());
}

/// Hide the spinner temporarily, execute `f`, then redraw the spinner.
///
/// If the output is not a TTY, `f` will be executed without hiding the spinner.
pub fn suspend_progress_bar<F: FnOnce() -> R, R>(f: F) -> R {
    if *IS_TTY {
        if let Some(spinner) = SPINNER.lock().as_ref() {
            return spinner.suspend(f);
        }
    }

    f()
}

fn log_level_from_env() -> log::LevelFilter {
    env::var("PROCTREE_LOG")
        .ok()
        .and_then(|log_level| log_level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info)
}

pub struct LocalLogger {
    log_level: log::LevelFilter,
}

impl LocalLogger {
    pub fn new() -> Self {
        LocalLogger {
            log_level: log_level_from_env(),
        }
    }

    fn start_spinner(name: &str) {
        let template = format!(
            "  {{spinner:>.{PROCTREE_U8_COLOR_CODE}}} {{wide_msg:.{PROCTREE_U8_COLOR_CODE}.bold}}"
        );
        let spinner = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::with_template(&template) {
            spinner.set_style(spinner_style);
        }
        spinner.set_message(format!("{name}..."));
        spinner.enable_steady_tick(Duration::from_millis(100));
        SPINNER.lock().replace(spinner);
    }
}

impl Default for LocalLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for LocalLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.log_level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if let Some(group_event) = get_group_event(record) {
            match group_event {
                // Only decorate interactive sessions, piped output stays parseable
                GroupEvent::Start(name) if *IS_TTY => Self::start_spinner(&name),
                GroupEvent::Start(_) => {}
                GroupEvent::End => clean_logger(),
            }
            return;
        }

        suspend_progress_bar(|| print_record(record));
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Print a log record to stderr with the appropriate style.
///
/// Query results own stdout, so every level goes to stderr.
fn print_record(record: &log::Record) {
    let error_style = Style::new().red();
    let info_style = Style::new().color256(PROCTREE_U8_COLOR_CODE);
    let warn_style = Style::new().yellow();
    let debug_style = Style::new().blue().dim();
    let trace_style = Style::new().black().dim();

    match record.level() {
        log::Level::Error => eprintln!("{}", error_style.apply_to(record.args())),
        log::Level::Warn => eprintln!("{}", warn_style.apply_to(record.args())),
        log::Level::Info => eprintln!("{}", info_style.apply_to(record.args())),
        log::Level::Debug => eprintln!(
            "{}",
            debug_style.apply_to(format!("[DEBUG::{}] {}", record.target(), record.args())),
        ),
        log::Level::Trace => eprintln!(
            "{}",
            trace_style.apply_to(format!("[TRACE::{}] {}", record.target(), record.args()))
        ),
    }
}

impl SharedLogger for LocalLogger {
    fn level(&self) -> log::LevelFilter {
        self.log_level
    }

    fn config(&self) -> Option<&simplelog::Config> {
        None
    }

    fn as_log(self: Box<Self>) -> Box<dyn Log> {
        Box::new(*self)
    }
}

pub fn init_local_logger() -> Result<()> {
    CombinedLogger::init(vec![Box::new(LocalLogger::new())])?;
    Ok(())
}

pub fn clean_logger() {
    if let Some(spinner) = SPINNER.lock().take() {
        spinner.finish_and_clear();
    }
}

/// Style a header line of the CLI output
pub fn style_header(text: &str) -> String {
    style(text)
        .bold()
        .color256(PROCTREE_U8_COLOR_CODE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use temp_env::with_var;

    #[rstest]
    #[case(None, log::LevelFilter::Info)]
    #[case(Some("debug"), log::LevelFilter::Debug)]
    #[case(Some("TRACE"), log::LevelFilter::Trace)]
    #[case(Some("loud"), log::LevelFilter::Info)]
    fn test_level_from_env(#[case] value: Option<&str>, #[case] expected: log::LevelFilter) {
        with_var("PROCTREE_LOG", value, || {
            assert_eq!(LocalLogger::new().level(), expected);
        });
    }

    #[test]
    fn test_clean_logger_without_spinner() {
        clean_logger();
        assert!(SPINNER.lock().is_none());
    }
}
