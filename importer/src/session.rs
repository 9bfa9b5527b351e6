//! One-shot "data just loaded" acknowledgement.
//!
//! The dashboard set a `justLoadedData` sentinel in session storage after a
//! successful load and consumed it on the next page load to show a toast
//! exactly once. The CLI equivalent is a marker file that `take` removes as
//! it reads.

use std::io;
use std::path::PathBuf;

const FLAG_FILE: &str = "just_loaded_data";

pub struct SessionFlags {
    dir: PathBuf,
}

impl SessionFlags {
    pub fn new(dir: impl Into<PathBuf>) -> SessionFlags {
        SessionFlags { dir: dir.into() }
    }

    pub fn default_location() -> SessionFlags {
        let dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("operator-dashboard");
        SessionFlags { dir }
    }

    fn flag_path(&self) -> PathBuf {
        self.dir.join(FLAG_FILE)
    }

    /// Arms the acknowledgement for the next run.
    pub fn set_just_loaded(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.flag_path(), "true")
    }

    /// Consumes the flag: true at most once per `set_just_loaded`.
    pub fn take_just_loaded(&self) -> bool {
        match std::fs::remove_file(self.flag_path()) {
            Ok(()) => true,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_consumed_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let flags = SessionFlags::new(dir.path().join("session"));

        assert!(!flags.take_just_loaded());
        flags.set_just_loaded().unwrap();
        assert!(flags.take_just_loaded());
        assert!(!flags.take_just_loaded());
    }
}
