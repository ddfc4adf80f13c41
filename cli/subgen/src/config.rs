//! Output path configuration.
//!
//! Every path the CLI touches is derived here from flags, so the core
//! libraries never read the filesystem layout themselves.

use std::path::{Path, PathBuf};

/// Default location of the downloaded subscription.
pub const DEFAULT_SUBSCRIPTION_FILE: &str = "./server_list/downloaded_subscription.txt";

/// Default base path of the generated documents.
pub const DEFAULT_OUTPUT: &str = "./config/config.json";

/// Default path of the mapping JSON.
pub const DEFAULT_MAP: &str = "./config/inbound_outbound_map.json";

/// Default directory for diagnostic artifacts.
pub const DEFAULT_WORK_DIR: &str = "./server_list";

const DECODED_URLS_FILE: &str = "decoded_server_urls.txt";
const PARSED_DETAILS_FILE: &str = "parsed_server_details.txt";
const DEFAULT_EXTENSION: &str = "json";

/// Document variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Local,
    Lan,
}

impl Variant {
    fn suffix(self) -> &'static str {
        match self {
            Variant::Local => "_local",
            Variant::Lan => "_lan",
        }
    }
}

/// Resolved paths for one `generate` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub subscription_file: PathBuf,
    pub local_config: PathBuf,
    pub lan_config: PathBuf,
    pub map_json: PathBuf,
    pub map_csv: PathBuf,
    pub work_dir: PathBuf,
}

impl OutputPaths {
    pub fn new(
        subscription_file: PathBuf,
        output: &Path,
        map_json: PathBuf,
        map_csv: Option<PathBuf>,
        work_dir: PathBuf,
    ) -> Self {
        let map_csv = map_csv.unwrap_or_else(|| map_json.with_extension("csv"));
        Self {
            subscription_file,
            local_config: variant_path(output, Variant::Local),
            lan_config: variant_path(output, Variant::Lan),
            map_json,
            map_csv,
            work_dir,
        }
    }

    pub fn decoded_urls(&self) -> PathBuf {
        self.work_dir.join(DECODED_URLS_FILE)
    }

    pub fn parsed_details(&self) -> PathBuf {
        self.work_dir.join(PARSED_DETAILS_FILE)
    }
}

/// `<dir>/<stem><suffix>.<ext>`, with `ext` defaulting to `json`.
pub fn variant_path(base: &Path, variant: Variant) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    base.with_file_name(format!("{}{}.{}", stem, variant.suffix(), ext))
}
