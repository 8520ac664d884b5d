use camino::{Utf8Path, Utf8PathBuf};
use dirs::home_dir;

pub const DEFAULT_PODINDEX_HOME: &str = ".podindex";

pub fn default_home_dir() -> Utf8PathBuf {
    if let Some(home) = home_dir() {
        if let Some(home) = Utf8Path::from_path(&home) {
            return home.join(DEFAULT_PODINDEX_HOME);
        }
    }

    Utf8PathBuf::from(DEFAULT_PODINDEX_HOME)
}
