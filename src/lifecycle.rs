/// Basin directory lifecycle: archive, clean and re-create the generated
/// directories before configuration generation.
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Input directory; never removed.
pub const DATA_DIR: &str = "data";

/// Directories written by configuration generation and simulation.
pub const GENERATED_DIRS: [&str; 3] = ["configs", "json", "outputs"];

/// Created under `outputs/` by setup.
const OUTPUT_SUBDIRS: [&str; 3] = ["div", "troute", "troute_parq"];

/// Stale DEM working directory left by geopackage generation.
const DEM_DIR: &str = "dem";

/// What to delete from a basin directory before setup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "CleanRepr")]
pub enum CleanPolicy {
    #[default]
    None,
    /// Everything except `data`.
    All,
    /// The generated directories.
    Existing,
    /// Only these entries.
    Named(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CleanRepr {
    One(String),
    Many(Vec<String>),
}

impl From<CleanRepr> for CleanPolicy {
    fn from(repr: CleanRepr) -> Self {
        let names = match repr {
            CleanRepr::One(s) => vec![s],
            CleanRepr::Many(v) => v,
        };
        let names: Vec<String> = names
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let has = |token: &str| names.iter().any(|n| n.eq_ignore_ascii_case(token));
        if names.is_empty() || has("none") {
            CleanPolicy::None
        } else if has("all") {
            CleanPolicy::All
        } else if has("existing") {
            CleanPolicy::Existing
        } else {
            CleanPolicy::Named(names)
        }
    }
}

impl CleanPolicy {
    /// Entries of `basin_dir` this policy removes.
    pub fn targets(&self, basin_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut targets = match self {
            CleanPolicy::None => Vec::new(),
            CleanPolicy::All => fs::read_dir(basin_dir)
                .with_context(|| format!("listing {}", basin_dir.display()))?
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name() != DATA_DIR)
                .map(|entry| entry.path())
                .collect(),
            CleanPolicy::Existing => GENERATED_DIRS.iter().map(|d| basin_dir.join(d)).collect(),
            CleanPolicy::Named(names) => names
                .iter()
                .filter(|n| {
                    let keep = n.as_str() == DATA_DIR;
                    if keep {
                        log::warn!("clean: refusing to remove `{DATA_DIR}`");
                    }
                    !keep
                })
                .map(|n| basin_dir.join(n))
                .collect(),
        };
        targets.retain(|p| p.exists());
        targets.sort();
        Ok(targets)
    }
}

fn remove_entry(path: &Path) -> Result<()> {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.with_context(|| format!("removing {}", path.display()))
}

// -- Confirmation --

/// Asks the operator before a destructive batch-wide action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Reads `yes`/`no` from stdin.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        print!("{prompt} (yes/no): ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

/// Non-interactive runs (`--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Confirms `clean=all` once for the whole batch; other policies pass through.
pub fn confirm_policy(policy: &CleanPolicy, confirm: &dyn Confirm) -> Result<()> {
    if *policy == CleanPolicy::All
        && !confirm.confirm("clean=all deletes everything except `data` in every basin. Continue?")?
    {
        bail!("clean=all not confirmed");
    }
    Ok(())
}

// -- Per-basin lifecycle --

#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    pub clean: CleanPolicy,
    pub rename_existing: Option<String>,
    pub setup_simulation: bool,
}

impl Lifecycle {
    /// Archive, clean, then re-create the generated layout of `basin_dir`.
    pub fn apply(&self, basin_dir: &Path) -> Result<()> {
        if let Some(name) = &self.rename_existing {
            archive_generated(basin_dir, name)?;
        }

        for target in self.clean.targets(basin_dir)? {
            log::debug!("removing {}", target.display());
            remove_entry(&target)?;
        }

        if self.setup_simulation {
            for dir in GENERATED_DIRS {
                let path = basin_dir.join(dir);
                if path.exists() {
                    remove_entry(&path)?;
                }
            }
            let mut dirs: Vec<PathBuf> = vec![basin_dir.join("configs"), basin_dir.join("json")];
            dirs.extend(OUTPUT_SUBDIRS.iter().map(|d| basin_dir.join("outputs").join(d)));
            for dir in dirs {
                fs::create_dir_all(&dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
            let dem = basin_dir.join(DEM_DIR);
            if dem.exists() {
                remove_entry(&dem)?;
            }
        }
        Ok(())
    }
}

/// Move `configs`, `json` and `outputs` into `<basin_dir>/<name>/`.
fn archive_generated(basin_dir: &Path, name: &str) -> Result<()> {
    let archive = basin_dir.join(name);
    for dir in GENERATED_DIRS {
        let src = basin_dir.join(dir);
        if !src.exists() {
            continue;
        }
        let dst = archive.join(dir);
        if dst.exists() {
            bail!(
                "cannot archive {}: {} already exists",
                src.display(),
                dst.display()
            );
        }
        fs::create_dir_all(&archive)
            .with_context(|| format!("creating {}", archive.display()))?;
        fs::rename(&src, &dst)
            .with_context(|| format!("moving {} to {}", src.display(), dst.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decline;

    impl Confirm for Decline {
        fn confirm(&self, _prompt: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn basin() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for d in ["data", "configs/cfe", "json", "outputs/div", "dem", "extra"] {
            fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        fs::write(tmp.path().join("data/b.gpkg"), b"").unwrap();
        fs::write(tmp.path().join("json/realization_nom_cfe.json"), b"{}").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        tmp
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    fn policy(yaml: &str) -> CleanPolicy {
        serde_yaml::from_str(yaml).unwrap()
    }

    // -- policy parsing --

    #[test]
    fn policy_from_string_or_list() {
        assert_eq!(policy("all"), CleanPolicy::All);
        assert_eq!(policy("[all]"), CleanPolicy::All);
        assert_eq!(policy("[none]"), CleanPolicy::None);
        assert_eq!(policy("existing"), CleanPolicy::Existing);
        assert_eq!(policy("''"), CleanPolicy::None);
        assert_eq!(
            policy("[json, dem]"),
            CleanPolicy::Named(vec!["json".into(), "dem".into()])
        );
    }

    // -- cleaning --

    #[test]
    fn clean_all_keeps_only_data() {
        let tmp = basin();
        let lc = Lifecycle {
            clean: CleanPolicy::All,
            ..Default::default()
        };
        lc.apply(tmp.path()).unwrap();
        assert_eq!(entries(tmp.path()), ["data"]);
        assert!(tmp.path().join("data/b.gpkg").exists());
    }

    #[test]
    fn clean_none_removes_nothing() {
        let tmp = basin();
        let before = entries(tmp.path());
        Lifecycle::default().apply(tmp.path()).unwrap();
        assert_eq!(entries(tmp.path()), before);
        assert!(tmp.path().join("json/realization_nom_cfe.json").exists());
    }

    #[test]
    fn clean_existing_removes_generated_dirs() {
        let tmp = basin();
        let lc = Lifecycle {
            clean: CleanPolicy::Existing,
            ..Default::default()
        };
        lc.apply(tmp.path()).unwrap();
        assert_eq!(entries(tmp.path()), ["data", "dem", "extra", "notes.txt"]);
    }

    #[test]
    fn named_clean_never_touches_data() {
        let tmp = basin();
        let targets = CleanPolicy::Named(vec!["data".into(), "extra".into(), "missing".into()])
            .targets(tmp.path())
            .unwrap();
        assert_eq!(targets, [tmp.path().join("extra")]);
    }

    // -- setup and archive --

    #[test]
    fn setup_recreates_layout_and_drops_dem() {
        let tmp = basin();
        let lc = Lifecycle {
            setup_simulation: true,
            ..Default::default()
        };
        lc.apply(tmp.path()).unwrap();
        assert!(!tmp.path().join("json/realization_nom_cfe.json").exists());
        assert!(!tmp.path().join("configs/cfe").exists());
        for d in ["outputs/div", "outputs/troute", "outputs/troute_parq", "configs", "json"] {
            assert!(tmp.path().join(d).is_dir(), "{d}");
        }
        assert!(!tmp.path().join("dem").exists());
    }

    #[test]
    fn rename_archives_previous_run() {
        let tmp = basin();
        let lc = Lifecycle {
            rename_existing: Some("run_1".into()),
            setup_simulation: true,
            ..Default::default()
        };
        lc.apply(tmp.path()).unwrap();
        assert!(tmp.path().join("run_1/json/realization_nom_cfe.json").exists());
        assert!(tmp.path().join("run_1/configs/cfe").is_dir());
        assert!(tmp.path().join("configs").is_dir());

        // A second archive under the same name would overwrite it.
        fs::write(tmp.path().join("json/new.json"), b"{}").unwrap();
        assert!(lc.apply(tmp.path()).is_err());
    }

    // -- confirmation --

    #[test]
    fn declined_clean_all_aborts() {
        assert!(confirm_policy(&CleanPolicy::All, &Decline).is_err());
        assert!(confirm_policy(&CleanPolicy::All, &AssumeYes).is_ok());
        assert!(confirm_policy(&CleanPolicy::Existing, &Decline).is_ok());
    }
}
