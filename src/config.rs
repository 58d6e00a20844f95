//! # Properties and named configurations
//!
//! Precedence when reading a property (highest to lowest):
//! 1. Command-line flag (handled by the caller)
//! 2. `CLOUDSDK_<SECTION>_<NAME>` environment variable
//! 3. The active named configuration file
//!
//! On disk the store looks like:
//! ```text
//! <root>/active_config                  name of the active configuration
//! <root>/configurations/config_default  TOML, one [section] per property group
//! <root>/legacy_credentials/<account>/adc.json
//! ```
//! `<root>` is `$CLOUDSDK_CONFIG` when set, otherwise the platform config
//! directory (`~/.config/gcloud` on Linux).

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Environment variable overriding the store root.
pub const CONFIG_DIR_ENV: &str = "CLOUDSDK_CONFIG";
/// Environment variable overriding the active configuration name.
pub const ACTIVE_CONFIG_ENV: &str = "CLOUDSDK_ACTIVE_CONFIG_NAME";

const ACTIVE_CONFIG_FILE: &str = "active_config";
const DEFAULT_CONFIG: &str = "default";

/// Every property `config set` accepts, by section. Reads of unknown
/// properties fail instead of silently returning nothing.
static KNOWN_PROPERTIES: &[(&str, &[&str])] = &[
    ("core", &["account", "disable_prompts", "project"]),
    ("compute", &["region", "zone"]),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Section [{section}] has no property [{name}].")]
    UnknownProperty { section: String, name: String },

    #[error(
        "The required property [{property}] is not currently set.\n\
         Set it for all further invocations by running:\n\
         \x20 $ gcloud config set {property} VALUE\n\
         or for this invocation only via the [{}] environment variable.",
        .property.env_var()
    )]
    Unset { property: Property },

    #[error(
        "Invalid configuration name [{0}]. Names start with a lower-case letter \
         and contain only letters a-z, digits 0-9, and hyphens."
    )]
    InvalidName(String),

    #[error("The configuration [{0}] does not exist.")]
    NoSuchConfiguration(String),

    #[error("The configuration [{0}] already exists.")]
    ConfigurationExists(String),

    #[error(
        "Cannot delete the active configuration [{0}]; activate another \
         configuration first."
    )]
    DeleteActiveConfiguration(String),

    #[error("could not determine a configuration directory; set ${CONFIG_DIR_ENV}")]
    NoConfigDir,

    #[error("could not parse [{path}]: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("could not write configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("configuration store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A property key, written `section/name` or bare `name` for core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub section: String,
    pub name: String,
}

impl Property {
    pub fn parse(spec: &str) -> Result<Property, ConfigError> {
        let (section, name) = match spec.split_once('/') {
            Some((section, name)) => (section, name),
            None => ("core", spec),
        };
        let known = KNOWN_PROPERTIES
            .iter()
            .find(|(s, _)| *s == section)
            .is_some_and(|(_, names)| names.contains(&name));
        if !known {
            return Err(ConfigError::UnknownProperty {
                section: section.to_string(),
                name: name.to_string(),
            });
        }
        Ok(Property {
            section: section.to_string(),
            name: name.to_string(),
        })
    }

    /// The environment variable that overrides this property,
    /// e.g. `CLOUDSDK_COMPUTE_ZONE` for `compute/zone`.
    pub fn env_var(&self) -> String {
        format!(
            "CLOUDSDK_{}_{}",
            self.section.to_uppercase(),
            self.name.to_uppercase()
        )
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Core properties read naturally without the section prefix.
        if self.section == "core" {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.section, self.name)
        }
    }
}

/// Handle on the on-disk configuration store.
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Opens the store rooted at `$CLOUDSDK_CONFIG`, falling back to the
    /// platform configuration directory. Nothing is created until a write.
    pub fn open() -> Result<ConfigStore, ConfigError> {
        match env::var_os(CONFIG_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Ok(ConfigStore { root: dir.into() }),
            _ => ProjectDirs::from("", "", "gcloud")
                .map(|dirs| ConfigStore {
                    root: dirs.config_dir().to_path_buf(),
                })
                .ok_or(ConfigError::NoConfigDir),
        }
    }

    /// Opens a store at an explicit root. Tests use this to avoid touching
    /// the real configuration.
    pub fn at(root: impl Into<PathBuf>) -> ConfigStore {
        ConfigStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn configurations_dir(&self) -> PathBuf {
        self.root.join("configurations")
    }

    fn config_file(&self, name: &str) -> PathBuf {
        self.configurations_dir().join(format!("config_{name}"))
    }

    /// Name of the active configuration. `$CLOUDSDK_ACTIVE_CONFIG_NAME` wins
    /// over the `active_config` marker file; a fresh store is `default`.
    pub fn active_configuration(&self) -> String {
        if let Ok(name) = env::var(ACTIVE_CONFIG_ENV)
            && !name.is_empty()
        {
            return name;
        }
        fs::read_to_string(self.root.join(ACTIVE_CONFIG_FILE))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG.to_string())
    }

    pub fn create_configuration(&self, name: &str) -> Result<(), ConfigError> {
        validate_name(name)?;
        let file = self.config_file(name);
        if file.exists() {
            return Err(ConfigError::ConfigurationExists(name.to_string()));
        }
        atomic_write(&file, "")
    }

    pub fn activate_configuration(&self, name: &str) -> Result<(), ConfigError> {
        validate_name(name)?;
        if !self.config_file(name).exists() && name != DEFAULT_CONFIG {
            return Err(ConfigError::NoSuchConfiguration(name.to_string()));
        }
        atomic_write(&self.root.join(ACTIVE_CONFIG_FILE), name)
    }

    /// Deletes a named configuration. The active one cannot be deleted,
    /// since the store would be left pointing at nothing.
    pub fn delete_configuration(&self, name: &str) -> Result<(), ConfigError> {
        validate_name(name)?;
        if name == self.active_configuration() {
            return Err(ConfigError::DeleteActiveConfiguration(name.to_string()));
        }
        let file = self.config_file(name);
        if !file.exists() {
            return Err(ConfigError::NoSuchConfiguration(name.to_string()));
        }
        fs::remove_file(file)?;
        Ok(())
    }

    /// All configuration names on disk, sorted. A store that has never been
    /// written still reports `default`, which is implicitly active.
    pub fn list_configurations(&self) -> Result<Vec<String>, ConfigError> {
        let mut names = Vec::new();
        match fs::read_dir(self.configurations_dir()) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry?;
                    if let Some(name) = entry
                        .file_name()
                        .to_str()
                        .and_then(|n| n.strip_prefix("config_"))
                    {
                        names.push(name.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if names.is_empty() {
            names.push(DEFAULT_CONFIG.to_string());
        }
        names.sort();
        Ok(names)
    }

    /// All properties of the named configuration, section by section.
    pub fn load_configuration(&self, name: &str) -> Result<toml::Table, ConfigError> {
        self.load_file(&self.config_file(name))
    }

    /// All properties of the active configuration.
    pub fn load(&self) -> Result<toml::Table, ConfigError> {
        self.load_configuration(&self.active_configuration())
    }

    fn load_file(&self, path: &Path) -> Result<toml::Table, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(toml::Table::new()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads one property. Environment overrides win over the file.
    pub fn get(&self, property: &Property) -> Result<Option<String>, ConfigError> {
        if let Ok(value) = env::var(property.env_var())
            && !value.is_empty()
        {
            return Ok(Some(value));
        }
        let table = self.load()?;
        Ok(table
            .get(&property.section)
            .and_then(|section| section.get(&property.name))
            .and_then(|value| value.as_str())
            .map(|value| value.to_string()))
    }

    /// Reads a property that must be set, with a settable hint on failure.
    pub fn require(&self, property: &Property) -> Result<String, ConfigError> {
        self.get(property)?.ok_or_else(|| ConfigError::Unset {
            property: property.clone(),
        })
    }

    pub fn set(&self, property: &Property, value: &str) -> Result<(), ConfigError> {
        let path = self.config_file(&self.active_configuration());
        let mut table = self.load_file(&path)?;
        let section = table
            .entry(property.section.clone())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        match section.as_table_mut() {
            Some(section) => {
                section.insert(
                    property.name.clone(),
                    toml::Value::String(value.to_string()),
                );
            }
            None => {
                return Err(ConfigError::Parse {
                    path,
                    source: <toml::de::Error as serde::de::Error>::custom(format!(
                        "[{}] is not a section",
                        property.section
                    )),
                });
            }
        }
        self.write_config(&path, &table)
    }

    pub fn unset(&self, property: &Property) -> Result<(), ConfigError> {
        let path = self.config_file(&self.active_configuration());
        let mut table = self.load_file(&path)?;
        if let Some(section) = table
            .get_mut(&property.section)
            .and_then(|v| v.as_table_mut())
        {
            section.remove(&property.name);
            if section.is_empty() {
                table.remove(&property.section);
            }
        }
        self.write_config(&path, &table)
    }

    /// Effective values of every known property, in table order. This is the
    /// `config list` view: file contents with environment overrides applied.
    pub fn effective_properties(&self) -> Result<Vec<(Property, String)>, ConfigError> {
        let mut out = Vec::new();
        for (section, names) in KNOWN_PROPERTIES {
            for name in *names {
                let property = Property {
                    section: section.to_string(),
                    name: name.to_string(),
                };
                if let Some(value) = self.get(&property)? {
                    out.push((property, value));
                }
            }
        }
        Ok(out)
    }

    fn write_config(&self, path: &Path, table: &toml::Table) -> Result<(), ConfigError> {
        atomic_write(path, &toml::to_string_pretty(table)?)
    }

    /// Directory holding activated credentials for `account`.
    pub fn credentials_dir(&self, account: &str) -> PathBuf {
        self.root.join("legacy_credentials").join(account)
    }

    /// Key file stored by `auth activate-service-account`.
    pub fn credentials_file(&self, account: &str) -> PathBuf {
        self.credentials_dir(account).join("adc.json")
    }

    /// Well-known application default credentials file.
    pub fn adc_file(&self) -> PathBuf {
        self.root.join("application_default_credentials.json")
    }

    /// Accounts with stored credentials, sorted.
    pub fn credentialed_accounts(&self) -> Result<Vec<String>, ConfigError> {
        let mut accounts = Vec::new();
        match fs::read_dir(self.root.join("legacy_credentials")) {
            Ok(entries) => {
                for entry in entries {
                    let entry = entry?;
                    if entry.file_type()?.is_dir()
                        && let Some(name) = entry.file_name().to_str()
                    {
                        accounts.push(name.to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        accounts.sort();
        Ok(accounts)
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidName(name.to_string()))
    }
}

/// Write via a temp file in the same directory followed by a rename, so a
/// crash never leaves a half-written configuration behind.
fn atomic_write(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Serializes the tests that read or write CLOUDSDK_* variables; the
    // environment is process-global and the test harness runs threads in
    // parallel.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn parses_bare_name_as_core() {
        let p = Property::parse("project").unwrap();
        assert_eq!(p.section, "core");
        assert_eq!(p.name, "project");
        assert_eq!(p.to_string(), "project");
        assert_eq!(p.env_var(), "CLOUDSDK_CORE_PROJECT");
    }

    #[test]
    fn parses_sectioned_name() {
        let p = Property::parse("compute/zone").unwrap();
        assert_eq!(p.section, "compute");
        assert_eq!(p.to_string(), "compute/zone");
        assert_eq!(p.env_var(), "CLOUDSDK_COMPUTE_ZONE");
    }

    #[test]
    fn rejects_unknown_property() {
        let err = Property::parse("core/flavor").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Section [core] has no property [flavor]."
        );
        assert!(Property::parse("nonexistent/thing").is_err());
    }

    #[test]
    fn set_get_unset_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path());
        let prop = Property::parse("project").unwrap();

        assert_eq!(store.get(&prop).unwrap(), None);
        store.set(&prop, "my-project").unwrap();
        assert_eq!(store.get(&prop).unwrap().as_deref(), Some("my-project"));

        // The write is atomic: no temp file left behind.
        let config = dir.path().join("configurations").join("config_default");
        assert!(config.exists());
        assert!(!config.with_extension("tmp").exists());

        store.unset(&prop).unwrap();
        assert_eq!(store.get(&prop).unwrap(), None);
        // Empty sections are dropped from the file entirely.
        assert_eq!(fs::read_to_string(&config).unwrap().trim(), "");
    }

    #[test]
    fn require_reports_settable_hint() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path());
        let err = store
            .require(&Property::parse("compute/zone").unwrap())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("[compute/zone] is not currently set"), "{msg}");
        assert!(msg.contains("gcloud config set compute/zone VALUE"), "{msg}");
        assert!(msg.contains("CLOUDSDK_COMPUTE_ZONE"), "{msg}");
    }

    #[test]
    fn environment_overrides_file() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path());
        let prop = Property::parse("compute/region").unwrap();
        store.set(&prop, "us-central1").unwrap();
        // Only this test touches CLOUDSDK_COMPUTE_REGION.
        unsafe { env::set_var("CLOUDSDK_COMPUTE_REGION", "europe-west1") };
        assert_eq!(
            store.get(&prop).unwrap().as_deref(),
            Some("europe-west1")
        );
        unsafe { env::remove_var("CLOUDSDK_COMPUTE_REGION") };
        assert_eq!(store.get(&prop).unwrap().as_deref(), Some("us-central1"));
    }

    #[test]
    fn named_configurations() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path());

        assert_eq!(store.active_configuration(), "default");
        assert_eq!(store.list_configurations().unwrap(), vec!["default"]);

        store.create_configuration("staging").unwrap();
        let err = store.create_configuration("staging").unwrap_err();
        assert!(err.to_string().contains("already exists"));

        store.activate_configuration("staging").unwrap();
        assert_eq!(store.active_configuration(), "staging");
        assert_eq!(
            store.list_configurations().unwrap(),
            vec!["default", "staging"]
        );

        // Properties now land in the staging file.
        let prop = Property::parse("project").unwrap();
        store.set(&prop, "staging-project").unwrap();
        assert!(dir
            .path()
            .join("configurations")
            .join("config_staging")
            .exists());

        assert!(store.activate_configuration("missing").is_err());
        assert!(store.create_configuration("Bad_Name").is_err());
    }

    #[test]
    fn delete_configuration_guards() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path());
        store.create_configuration("staging").unwrap();
        store.activate_configuration("staging").unwrap();

        let err = store.delete_configuration("staging").unwrap_err();
        assert!(err.to_string().contains("active configuration"), "{err}");
        let err = store.delete_configuration("missing").unwrap_err();
        assert!(err.to_string().contains("does not exist"), "{err}");

        store.activate_configuration("default").unwrap();
        store.delete_configuration("staging").unwrap();
        assert_eq!(store.list_configurations().unwrap(), vec!["default"]);
    }

    #[test]
    fn effective_properties_lists_set_values() {
        let _env = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path());
        store
            .set(&Property::parse("project").unwrap(), "p1")
            .unwrap();
        store
            .set(&Property::parse("compute/zone").unwrap(), "us-central1-a")
            .unwrap();
        let props: Vec<String> = store
            .effective_properties()
            .unwrap()
            .into_iter()
            .map(|(p, v)| format!("{p}={v}"))
            .collect();
        assert_eq!(props, vec!["project=p1", "compute/zone=us-central1-a"]);
    }

    #[test]
    fn credential_store_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path());
        assert_eq!(store.credentialed_accounts().unwrap(), Vec::<String>::new());
        let file = store.credentials_file("robot@dev.iam.gserviceaccount.com");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "{}").unwrap();
        assert_eq!(
            store.credentialed_accounts().unwrap(),
            vec!["robot@dev.iam.gserviceaccount.com"]
        );
    }
}
