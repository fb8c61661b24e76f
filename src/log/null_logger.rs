//! No backend of our own: used when the `logging` feature is off and on wasm. Whatever logger the
//! embedding application installed still sees the global level.

use crate::log::LogSettings;

impl LogSettings {
    pub(in crate::log) fn apply(&mut self) {
        log::set_max_level(self.level);
    }
}
