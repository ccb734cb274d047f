use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use upkeep_core::StoreData;

pub fn upkeep_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("UPKEEP_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".upkeep"))
}

pub fn ensure_upkeep_home() -> Result<PathBuf> {
    let dir = upkeep_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Load the store file; a missing file is an empty store.
pub fn load_store(path: &Path) -> Result<StoreData> {
    if !path.exists() {
        return Ok(StoreData::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

/// Write the store file via a temp file + rename so a crash never leaves half a file.
pub fn save_store(path: &Path, data: &StoreData) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(data).context("serialize store")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use upkeep_core::{ChecklistKind, Clock, MemoryStore};

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let data = load_store(&dir.path().join("store.json")).unwrap();
        assert_eq!(data, StoreData::default());
    }

    #[test]
    fn store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = MemoryStore::new(Clock::System);
        let model = store.add_model("Cessna 150");
        store
            .add_checklist(&model.id, "Service", ChecklistKind::Maintenance)
            .unwrap();

        save_store(&path, store.data()).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let back = load_store(&path).unwrap();
        assert_eq!(&back, store.data());
    }

    #[test]
    fn corrupt_store_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_store(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }
}
