/// Shared-library probe for BMI sub-models built under `ngen/extern`.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::submodel::SubModel;

/// Platform shared-library extension.
#[cfg(target_os = "macos")]
pub const SHARED_LIB_EXT: &str = "dylib";
#[cfg(not(target_os = "macos"))]
pub const SHARED_LIB_EXT: &str = "so";

/// Library path per sub-model, stored without the platform extension
/// (`.../cmake_build/libcfebmi`); ngen appends it at load time.
#[derive(Debug, Clone, Default)]
pub struct LibraryIndex {
    extern_dir: PathBuf,
    libs: BTreeMap<SubModel, PathBuf>,
}

impl LibraryIndex {
    /// Scan `<ngen_dir>/extern` for every known sub-model.
    pub fn probe(ngen_dir: &Path) -> Self {
        let extern_dir = ngen_dir.join("extern");
        let mut libs = BTreeMap::new();
        for model in SubModel::ALL {
            for name in model.extern_names() {
                let build = if model.flat_build() {
                    extern_dir.join(name).join("cmake_build")
                } else {
                    extern_dir.join(name).join(name).join("cmake_build")
                };
                if let Some(lib) = find_library(&build) {
                    libs.insert(model, lib);
                    break;
                }
            }
        }
        Self { extern_dir, libs }
    }

    pub fn from_paths(
        extern_dir: PathBuf,
        libs: impl IntoIterator<Item = (SubModel, PathBuf)>,
    ) -> Self {
        Self {
            extern_dir,
            libs: libs.into_iter().collect(),
        }
    }

    pub fn get(&self, model: SubModel) -> Option<&Path> {
        self.libs.get(&model).map(PathBuf::as_path)
    }

    /// Library for `model`, or an error naming the directory searched.
    pub fn require(&self, model: SubModel) -> Result<&Path> {
        self.get(model).ok_or_else(|| Error::MissingLibrary {
            model,
            dir: self.extern_dir.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubModel, &Path)> {
        self.libs.iter().map(|(m, p)| (*m, p.as_path()))
    }
}

/// First `lib*.<ext>` file in `dir`, by name, with everything from the first
/// `.` of the file name stripped.
fn find_library(dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<String> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with("lib") && name.ends_with(&format!(".{SHARED_LIB_EXT}")))
        .collect();
    candidates.sort();
    let name = candidates.into_iter().next()?;
    let stem = name.split('.').next().unwrap_or(&name);
    Some(dir.join(stem))
}
