//! Install profiles: which packages a menu choice downloads, and where to.
//!
//! The table is plain data (`profiles.toml`, or the file named by
//! `profiles_file` in the config), parsed and validated once at startup.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::Config;
use crate::error::{Result, SetupError};

const BUILTIN_PROFILES: &str = include_str!("profiles.toml");
const PACKAGES_PLACEHOLDER: &str = "{packages}";

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Download, extract onto the root, delete afterwards
    #[default]
    Archive,
    /// Download straight to its final place
    File,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Feature {
    pub key: String,
    pub label: String,
    pub package: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PackageStep {
    pub name: String,
    pub url: String,
    pub destination: PathBuf,
    pub trust_anchor: String,
    #[serde(default)]
    pub kind: StepKind,
    #[serde(default)]
    pub packages: Vec<String>,
    /// Feature keys whose packages join the URL when selected
    #[serde(default)]
    pub optional: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InstallProfile {
    pub id: String,
    pub title: String,
    /// Feature keys offered in this profile's option menu
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(rename = "step")]
    pub steps: Vec<PackageStep>,
}

#[derive(Deserialize)]
struct TableFile {
    #[serde(rename = "feature", default)]
    features: Vec<Feature>,
    #[serde(rename = "profile", default)]
    profiles: Vec<InstallProfile>,
}

/// Which optional features the user ticked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSelection(BTreeMap<String, bool>);

impl FeatureSelection {
    pub fn set(&mut self, key: &str, enabled: bool) {
        self.0.insert(key.to_string(), enabled);
    }

    pub fn toggle(&mut self, key: &str) {
        self.set(key, !self.is_enabled(key));
    }

    pub fn is_enabled(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }
}

/// A step with its URL expanded and its paths made absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStep {
    pub name: String,
    pub url: String,
    pub destination: PathBuf,
    pub trust_anchor: PathBuf,
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallPlan {
    pub profile: String,
    pub steps: Vec<PlannedStep>,
    /// Downloaded archives to delete once every step succeeded
    pub temp_archives: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ProfileTable {
    features: Vec<Feature>,
    profiles: Vec<InstallProfile>,
}

impl ProfileTable {
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_PROFILES)
    }

    /// Loads the override file from the config, or the built-in table.
    pub fn load(config: &Config) -> Result<Self> {
        match &config.profiles_file {
            Some(path) => {
                tracing::info!("Loading profiles from {}", path.display());
                let content = fs::read_to_string(path).map_err(|e| {
                    SetupError::profiles(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&content)
            }
            None => Self::builtin(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: TableFile =
            toml::from_str(content).map_err(|e| SetupError::profiles(e.to_string()))?;
        let table = ProfileTable {
            features: file.features,
            profiles: file.profiles,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn profiles(&self) -> &[InstallProfile] {
        &self.profiles
    }

    pub fn get(&self, id: &str) -> Option<&InstallProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn feature(&self, key: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.key == key)
    }

    /// Menu labels for the features a profile offers, in order.
    pub fn feature_labels(&self, profile: &InstallProfile) -> Vec<String> {
        profile
            .features
            .iter()
            .filter_map(|key| self.feature(key))
            .map(|f| f.label.clone())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.profiles.is_empty() {
            return Err(SetupError::profiles("no profiles defined"));
        }

        let mut ids = HashSet::new();
        for profile in &self.profiles {
            let fail = |msg: String| SetupError::profiles(format!("profile '{}': {}", profile.id, msg));

            if !ids.insert(profile.id.as_str()) {
                return Err(fail("duplicate id".into()));
            }
            if profile.steps.is_empty() {
                return Err(fail("has no steps".into()));
            }
            for key in &profile.features {
                if self.feature(key).is_none() {
                    return Err(fail(format!("unknown feature '{}'", key)));
                }
            }

            let mut destinations = HashSet::new();
            for step in &profile.steps {
                if !is_plain_relative(&step.destination) {
                    return Err(fail(format!(
                        "step '{}' destination {} must be relative to the storage root",
                        step.name,
                        step.destination.display()
                    )));
                }
                if !destinations.insert(step.destination.as_path()) {
                    return Err(fail(format!(
                        "destination {} is used twice",
                        step.destination.display()
                    )));
                }
                if step.trust_anchor.is_empty() || !is_plain_relative(Path::new(&step.trust_anchor)) {
                    return Err(fail(format!("step '{}' has a bad trust anchor", step.name)));
                }
                for key in &step.optional {
                    if self.feature(key).is_none() {
                        return Err(fail(format!("step '{}' uses unknown feature '{}'", step.name, key)));
                    }
                }
                let templated = step.url.contains(PACKAGES_PLACEHOLDER);
                if !templated && !(step.packages.is_empty() && step.optional.is_empty()) {
                    return Err(fail(format!(
                        "step '{}' lists packages but its url has no {}",
                        step.name, PACKAGES_PLACEHOLDER
                    )));
                }
            }
        }
        Ok(())
    }

    /// Package list for a templated step; `None` when nothing is left to fetch.
    fn resolve_url(&self, step: &PackageStep, selection: &FeatureSelection) -> Option<String> {
        if !step.url.contains(PACKAGES_PLACEHOLDER) {
            return Some(step.url.clone());
        }

        let selected = step
            .optional
            .iter()
            .filter(|key| selection.is_enabled(key))
            .filter_map(|key| self.feature(key))
            .map(|f| f.package.clone());
        let packages: Vec<String> = step.packages.iter().cloned().chain(selected).collect();

        if packages.is_empty() {
            None
        } else {
            Some(step.url.replace(PACKAGES_PLACEHOLDER, &packages.join(",")))
        }
    }

    pub fn plan(
        &self,
        profile: &InstallProfile,
        selection: &FeatureSelection,
        storage_root: &Path,
        cert_dir: &Path,
    ) -> InstallPlan {
        let mut steps = Vec::new();
        let mut temp_archives = Vec::new();

        for step in &profile.steps {
            let Some(url) = self.resolve_url(step, selection) else {
                tracing::info!("Skipping '{}': nothing selected", step.name);
                continue;
            };
            let destination = storage_root.join(&step.destination);
            if step.kind == StepKind::Archive {
                temp_archives.push(destination.clone());
            }
            steps.push(PlannedStep {
                name: step.name.clone(),
                url,
                destination,
                trust_anchor: cert_dir.join(&step.trust_anchor),
                kind: step.kind,
            });
        }

        InstallPlan {
            profile: profile.id.clone(),
            steps,
            temp_archives,
        }
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aroma_plan(selection: &FeatureSelection) -> InstallPlan {
        let table = ProfileTable::builtin().unwrap();
        let aroma = table.get("aroma").unwrap();
        table.plan(aroma, selection, Path::new("/vol/external01"), Path::new("romfs"))
    }

    #[test]
    fn builtin_table_is_valid() {
        let table = ProfileTable::builtin().unwrap();
        let ids: Vec<&str> = table.profiles().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["tiramisu", "vwii", "aroma"]);
        assert_eq!(table.feature_labels(table.get("aroma").unwrap()).len(), 7);
        assert!(table.feature_labels(table.get("tiramisu").unwrap()).is_empty());
    }

    #[test]
    fn tiramisu_plan_resolves_paths() {
        let table = ProfileTable::builtin().unwrap();
        let plan = table.plan(
            table.get("tiramisu").unwrap(),
            &FeatureSelection::default(),
            Path::new("/vol/external01"),
            Path::new("romfs"),
        );

        assert_eq!(plan.steps.len(), 4);
        assert!(plan.steps.iter().all(|s| s.destination.is_absolute()));
        assert_eq!(plan.steps[0].trust_anchor, PathBuf::from("romfs/github-com.pem"));
        assert_eq!(plan.steps[1].kind, StepKind::File);
        assert_eq!(
            plan.temp_archives,
            [
                PathBuf::from("/vol/external01/tiramisu.zip"),
                PathBuf::from("/vol/external01/appstore.zip"),
                PathBuf::from("/vol/external01/savemii.zip"),
            ]
        );
    }

    #[test]
    fn aroma_urls_follow_selection() {
        let plan = aroma_plan(&FeatureSelection::default());
        assert_eq!(
            plan.steps[0].url,
            "https://aroma.foryour.cafe/api/download?packages=environmentloader"
        );
        // no plugin ticked: the plugin step drops out entirely
        assert!(plan.steps.iter().all(|s| s.name != "Plugins and Modules"));
        assert_eq!(plan.steps.len(), 5);

        let mut selection = FeatureSelection::default();
        selection.set("fwimgloader", true);
        selection.set("wiiload", true);
        selection.set("sdcafiine", true);
        let plan = aroma_plan(&selection);
        assert_eq!(
            plan.steps[0].url,
            "https://aroma.foryour.cafe/api/download?packages=environmentloader,fw_img_loader"
        );
        let plugins = plan.steps.iter().find(|s| s.name == "Plugins and Modules").unwrap();
        assert_eq!(
            plugins.url,
            "https://aroma.foryour.cafe/api/download?packages=wiiload,sdcafiine"
        );
        assert!(plan.temp_archives.contains(&PathBuf::from("/vol/external01/plugins.zip")));
    }

    #[test]
    fn rejects_absolute_or_escaping_destinations() {
        for dest in ["/etc/passwd", "../outside.zip", ""] {
            let table = format!(
                "[[profile]]\nid = \"x\"\ntitle = \"X\"\n[[profile.step]]\nname = \"a\"\nurl = \"http://h/a\"\ndestination = \"{}\"\ntrust_anchor = \"a.pem\"\n",
                dest
            );
            assert!(matches!(ProfileTable::from_toml(&table), Err(SetupError::Profiles(_))), "{}", dest);
        }
    }

    #[test]
    fn rejects_reused_destination_and_unknown_features() {
        let reused = r#"
            [[profile]]
            id = "x"
            title = "X"
            [[profile.step]]
            name = "a"
            url = "http://h/a"
            destination = "a.zip"
            trust_anchor = "a.pem"
            [[profile.step]]
            name = "b"
            url = "http://h/b"
            destination = "a.zip"
            trust_anchor = "a.pem"
        "#;
        let err = ProfileTable::from_toml(reused).unwrap_err();
        assert!(err.to_string().contains("used twice"));

        let unknown = r#"
            [[profile]]
            id = "x"
            title = "X"
            features = ["turbo"]
            [[profile.step]]
            name = "a"
            url = "http://h/a"
            destination = "a.zip"
            trust_anchor = "a.pem"
        "#;
        let err = ProfileTable::from_toml(unknown).unwrap_err();
        assert!(err.to_string().contains("turbo"));
    }

    #[test]
    fn rejects_packages_without_placeholder() {
        let table = r#"
            [[profile]]
            id = "x"
            title = "X"
            [[profile.step]]
            name = "a"
            url = "http://h/a"
            packages = ["base"]
            destination = "a.zip"
            trust_anchor = "a.pem"
        "#;
        assert!(ProfileTable::from_toml(table).is_err());
        assert!(ProfileTable::from_toml("").is_err());
    }

    #[test]
    fn load_prefers_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.toml");
        fs::write(
            &path,
            r#"
            [[profile]]
            id = "only"
            title = "Only one"
            [[profile.step]]
            name = "a"
            url = "http://h/a.zip"
            destination = "a.zip"
            trust_anchor = "a.pem"
            "#,
        )
        .unwrap();

        let config = Config {
            profiles_file: Some(path),
            ..Config::default()
        };
        let table = ProfileTable::load(&config).unwrap();
        assert!(table.get("only").is_some());
        assert!(table.get("tiramisu").is_none());

        let config = Config {
            profiles_file: Some(dir.path().join("missing.toml")),
            ..Config::default()
        };
        assert!(ProfileTable::load(&config).is_err());
    }

    proptest! {
        #[test]
        fn double_toggle_restores_value(start in any::<bool>(), idx in 0usize..7) {
            let table = ProfileTable::builtin().unwrap();
            let key = table.get("aroma").unwrap().features[idx].clone();
            let mut selection = FeatureSelection::default();
            selection.set(&key, start);
            let before = selection.clone();

            selection.toggle(&key);
            prop_assert_eq!(selection.is_enabled(&key), !start);
            selection.toggle(&key);
            prop_assert_eq!(selection, before);
        }
    }
}
