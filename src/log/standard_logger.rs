//! `log4rs` backend: everything goes to stderr, with one logger per decode target.

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

use crate::log::{LogSettings, DECODE_TARGETS};

const STDERR_APPENDER: &str = "stderr";
// ISO 8601 timestamp, colored level, module path
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

impl LogSettings {
    /// Installs (or reconfigures) the global logger to match these settings.
    pub(in crate::log) fn apply(&mut self) {
        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build();
        let appender = Appender::builder().build(STDERR_APPENDER, Box::new(stderr));
        let decode_level = self.effective_decode_level();
        let builder = DECODE_TARGETS.iter().fold(
            Config::builder().appender(appender),
            |builder, target| builder.logger(Logger::builder().build(*target, decode_level)),
        );
        let root = Root::builder().appender(STDERR_APPENDER).build(self.level);

        let Ok(config) = builder.build(root) else {
            log::set_max_level(self.level);
            return;
        };
        match &self.handle {
            Some(handle) => handle.set_config(config),
            None => match log4rs::init_config(config) {
                Ok(handle) => self.handle = Some(handle),
                // Another logger is installed; it still honors the level.
                Err(_) => log::set_max_level(self.level),
            },
        }
    }
}
