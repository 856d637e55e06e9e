//! Environment configuration for the `wqkit` binary.

use std::env;
use std::path::PathBuf;

use wqkit_io_xlsx::C_FONT_NAME_DEFAULT;

pub const C_ENV_STORE_PATH: &str = "WQKIT_STORE_PATH";
pub const C_ENV_EXPORT_PATH: &str = "WQKIT_EXPORT_PATH";
pub const C_ENV_FONT_NAME: &str = "WQKIT_FONT_NAME";

pub const C_STORE_PATH_DEFAULT: &str = "wqkit_store.json";
pub const C_EXPORT_PATH_DEFAULT: &str = "output_lokasi.xlsx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON snapshot backing the measurement store.
    pub store_path: PathBuf,
    /// Default workbook written by `export`.
    pub export_path: PathBuf,
    /// Font applied to every exported cell.
    pub font_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Read configuration from the process environment. Unset or blank
    /// variables fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup_non_blank = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        Config {
            store_path: lookup_non_blank(C_ENV_STORE_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(C_STORE_PATH_DEFAULT)),
            export_path: lookup_non_blank(C_ENV_EXPORT_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(C_EXPORT_PATH_DEFAULT)),
            font_name: lookup_non_blank(C_ENV_FONT_NAME)
                .unwrap_or_else(|| C_FONT_NAME_DEFAULT.to_string()),
        }
    }
}
