use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use pokr_common::room::ParticipantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefKey {
    ParticipantId,
    UserName,
    Theme,
}

impl PrefKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefKey::ParticipantId => "participant_id",
            PrefKey::UserName => "user_name",
            PrefKey::Theme => "theme",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Dark,
    /// Dark mode is opt-in; anything but a stored `dark` is light.
    #[default]
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("preferences io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preferences encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Durable per-profile key-value preferences, kept as a small JSON object on disk.
pub struct PreferenceStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl PreferenceStore {
    /// Location used when no `--prefs` path is given.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("POKR_PREFS") {
            return PathBuf::from(path);
        }
        match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home)
                .join(".config")
                .join("pokr")
                .join("prefs.json"),
            None => PathBuf::from("pokr-prefs.json"),
        }
    }

    /// Load preferences from `path`. A missing file is an empty store; an unreadable
    /// one is logged and replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt preferences at {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: PrefKey) -> Option<&str> {
        self.values.get(key.as_str()).map(String::as_str)
    }

    pub fn set(&mut self, key: PrefKey, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.as_str().to_string(), value.to_string());
        self.save()
    }

    /// The stored participant id, generating and persisting one on first use.
    pub fn participant_id(&mut self) -> Result<ParticipantId, PrefsError> {
        if let Some(id) = self.get(PrefKey::ParticipantId).filter(|id| !id.is_empty()) {
            return Ok(ParticipantId::new(id));
        }
        let id = ParticipantId::random();
        tracing::info!("Generated participant id {}", id);
        self.set(PrefKey::ParticipantId, id.as_str())?;
        Ok(id)
    }

    pub fn user_name(&self) -> Option<&str> {
        self.get(PrefKey::UserName)
    }

    pub fn set_user_name(&mut self, name: &str) -> Result<(), PrefsError> {
        self.set(PrefKey::UserName, name.trim())
    }

    pub fn theme(&self) -> Theme {
        self.get(PrefKey::Theme)
            .and_then(Theme::parse)
            .unwrap_or_default()
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), PrefsError> {
        self.set(PrefKey::Theme, theme.as_str())
    }

    fn save(&self) -> Result<(), PrefsError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(&self.values)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("pokr-test-{}", uuid::Uuid::new_v4()))
            .join("prefs.json")
    }

    #[test]
    fn test_participant_id_is_stable_across_opens() {
        let path = temp_path();
        let first = PreferenceStore::open(&path).unwrap().participant_id().unwrap();
        let second = PreferenceStore::open(&path).unwrap().participant_id().unwrap();
        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(first.as_str()).is_ok());
    }

    #[test]
    fn test_name_is_trimmed_and_persisted() {
        let path = temp_path();
        let mut prefs = PreferenceStore::open(&path).unwrap();
        assert_eq!(prefs.user_name(), None);
        prefs.set_user_name("  Alice ").unwrap();

        let reopened = PreferenceStore::open(&path).unwrap();
        assert_eq!(reopened.user_name(), Some("Alice"));
    }

    #[test]
    fn test_theme_defaults_and_toggles() {
        let path = temp_path();
        let mut prefs = PreferenceStore::open(&path).unwrap();
        assert_eq!(prefs.theme(), Theme::Light);
        prefs.set_theme(prefs.theme().toggled()).unwrap();
        assert_eq!(PreferenceStore::open(&path).unwrap().theme(), Theme::Dark);
        assert_eq!(prefs.get(PrefKey::Theme), Some("dark"));

        prefs.set(PrefKey::Theme, "solarized").unwrap();
        assert_eq!(prefs.theme(), Theme::Light);
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let path = temp_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();
        let mut prefs = PreferenceStore::open(&path).unwrap();
        assert_eq!(prefs.get(PrefKey::UserName), None);
        prefs.set_user_name("Bob").unwrap();
        assert_eq!(PreferenceStore::open(&path).unwrap().user_name(), Some("Bob"));
    }
}
