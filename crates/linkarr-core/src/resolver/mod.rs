//! Seam to the metadata catalog that turns a classified file into a canonical
//! destination. The network-backed catalog lives outside this crate;
//! [`FilenameResolver`] derives destinations offline from names alone.

mod filename;

pub use filename::FilenameResolver;

use crate::classifier::Classification;
use crate::error::Error;
use crate::task::{Identifiers, LinkSettings, SourceFile};
use std::path::{Path, PathBuf};

pub struct ResolveContext<'a> {
    pub classification: &'a Classification,
    pub dest_root: &'a Path,
    pub actual_dir: &'a str,
    pub settings: LinkSettings,
    pub identifiers: &'a Identifiers,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub auto_select: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub destination: PathBuf,
    pub canonical_id: Option<String>,
    pub season: Option<u32>,
    pub is_extra: bool,
}

pub trait MetadataResolver: Send + Sync {
    /// `Ok(None)` means no usable destination could be determined.
    fn resolve(
        &self,
        source: &SourceFile,
        context: &ResolveContext<'_>,
    ) -> Result<Option<Resolution>, Error>;

    /// Resolvers that may prompt the user cannot run on the worker pool.
    fn is_interactive(&self) -> bool {
        false
    }
}
