//! Configuration access port trait.

use std::path::PathBuf;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
    /// A filesystem path; blank values count as missing.
    fn get_path(&self, section: &str, key: &str) -> Option<PathBuf>;
}
