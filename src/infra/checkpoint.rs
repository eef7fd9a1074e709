// ============================================================
// Layer 6: Checkpoint Manager
// ============================================================
// Saves and restores model weights once per epoch.
//
// File naming convention:
//   {save_path}/checkpoint/
//     vqvae_001.mpk      ← weights after the 1st completed epoch
//     vqvae_002.mpk      ← weights after the 2nd completed epoch
//     ...
//     run_config.json    ← architecture + hyper-parameters of the run
//
// The number in the name is the count of completed epochs, so it
// is also the zero-based index of the next epoch to run. Three
// digits cap the scheme at epoch 999; asking for more is an error
// rather than a silently wider name.
//
// "Latest" is the highest parsed number, never the newest mtime.
// Writes go to a hidden `.vqvae_NNN.partial.mpk` file that is
// fsynced and then renamed, so a crash mid-write cannot leave a
// half-written file that discovery would pick up.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::domain::error::{TrainError, TrainResult};
use crate::domain::traits::Persistable;

/// Fixed model identifier at the front of every checkpoint name.
pub const CHECKPOINT_NAME: &str = "vqvae";

/// Width of the zero-padded epoch field.
pub const EPOCH_DIGITS: usize = 3;

/// Highest epoch number the naming scheme can represent.
pub const MAX_CHECKPOINT_EPOCH: usize = 999;

/// Extension written by the full-precision MessagePack recorder.
pub const CHECKPOINT_EXTENSION: &str = "mpk";

const RUN_CONFIG_FILE: &str = "run_config.json";

/// A discovered checkpoint on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointHandle {
    /// Number encoded in the file name (completed epochs, 1-based)
    pub number: usize,
    pub path:   PathBuf,
}

impl CheckpointHandle {
    /// Zero-based index of the first epoch to train after restoring.
    pub fn start_epoch(&self) -> usize {
        self.number
    }
}

pub struct CheckpointManager {
    /// {save_path}/checkpoint
    dir:  PathBuf,
    name: String,
}

impl CheckpointManager {
    /// Create the manager for `{save_path}/checkpoint`, creating the
    /// directory if needed.
    pub fn new(save_path: impl AsRef<Path>) -> TrainResult<Self> {
        Self::with_name(save_path, CHECKPOINT_NAME)
    }

    pub fn with_name(save_path: impl AsRef<Path>, name: impl Into<String>) -> TrainResult<Self> {
        let dir = save_path.as_ref().join("checkpoint");
        fs::create_dir_all(&dir).map_err(persistence(&dir))?;
        Ok(Self { dir, name: name.into() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `vqvae_NNN.mpk` for checkpoint number `number`.
    pub fn file_name(&self, number: usize) -> TrainResult<String> {
        if number > MAX_CHECKPOINT_EPOCH {
            return Err(TrainError::EpochOutOfRange { number, digits: EPOCH_DIGITS });
        }
        Ok(format!(
            "{}_{:0width$}.{}",
            self.name,
            number,
            CHECKPOINT_EXTENSION,
            width = EPOCH_DIGITS
        ))
    }

    pub fn path_for(&self, number: usize) -> TrainResult<PathBuf> {
        Ok(self.dir.join(self.file_name(number)?))
    }

    /// Parse the epoch number back out of a file name. Only the exact
    /// `{name}_DDD.mpk` form is accepted.
    pub fn parse_number(&self, file_name: &str) -> Option<usize> {
        let rest   = file_name.strip_prefix(self.name.as_str())?.strip_prefix('_')?;
        let digits = rest.strip_suffix(CHECKPOINT_EXTENSION)?.strip_suffix('.')?;
        if digits.len() != EPOCH_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Persist the weights after epoch `epoch_index` (zero-based) under
    /// the name for `epoch_index + 1`.
    pub fn save(&self, epoch_index: usize, weights: &impl Persistable) -> TrainResult<CheckpointHandle> {
        let number = epoch_index + 1;
        let path   = self.path_for(number)?;
        let tmp    = self.dir.join(format!(
            ".{}_{:0width$}.partial.{}",
            self.name,
            number,
            CHECKPOINT_EXTENSION,
            width = EPOCH_DIGITS
        ));

        if tmp.exists() {
            fs::remove_file(&tmp).map_err(persistence(&tmp))?;
        }

        if let Err(e) = weights.save(&tmp) {
            // Leave nothing behind that looks like a checkpoint.
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::File::open(&tmp)
            .and_then(|f| f.sync_all())
            .map_err(persistence(&tmp))?;

        if path.exists() {
            tracing::warn!("Overwriting existing checkpoint '{}'", path.display());
        }
        fs::rename(&tmp, &path).map_err(persistence(&path))?;
        // Make the rename itself durable where directories can be synced.
        if let Ok(dir) = fs::File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(CheckpointHandle { number, path })
    }

    /// All well-formed checkpoints, lowest number first.
    pub fn list(&self) -> TrainResult<Vec<CheckpointHandle>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(persistence(&self.dir))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };
            if let Some(number) = self.parse_number(name) {
                found.push(CheckpointHandle { number, path: entry.path() });
            }
        }
        found.sort_by_key(|h| h.number);
        Ok(found)
    }

    /// The checkpoint with the highest epoch number. An empty
    /// directory is an error: resuming from nothing is a misconfiguration.
    pub fn find_latest(&self) -> TrainResult<CheckpointHandle> {
        self.list()?
            .pop()
            .ok_or_else(|| TrainError::NoCheckpoint(self.dir.clone()))
    }

    /// Load `handle` into `weights` in place and return the zero-based
    /// epoch index training continues at.
    pub fn restore(&self, handle: &CheckpointHandle, weights: &mut impl Persistable) -> TrainResult<usize> {
        if !handle.path.is_file() {
            return Err(TrainError::CheckpointNotFound(handle.path.clone()));
        }
        weights.load(&handle.path)?;
        tracing::info!(
            "Restored '{}', continuing at epoch index {}",
            handle.path.display(),
            handle.start_epoch()
        );
        Ok(handle.start_epoch())
    }

    /// Load checkpoint number `number` (completed epochs) directly.
    pub fn load_explicit(&self, number: usize, weights: &mut impl Persistable) -> TrainResult<CheckpointHandle> {
        let handle = CheckpointHandle { number, path: self.path_for(number)? };
        self.restore(&handle, weights)?;
        Ok(handle)
    }

    /// Save the run configuration next to the checkpoints so the
    /// architecture can be rebuilt later.
    pub fn save_config<T: Serialize>(&self, cfg: &T) -> TrainResult<()> {
        let path = self.dir.join(RUN_CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)
            .map_err(|e| TrainError::Config(format!("cannot serialise run config: {e}")))?;
        fs::write(&path, json).map_err(persistence(&path))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> TrainResult<T> {
        let path = self.dir.join(RUN_CONFIG_FILE);
        let json = fs::read_to_string(&path).map_err(|e| {
            TrainError::Config(format!(
                "cannot read '{}' ({e}). Has `train` been run with this save path?",
                path.display()
            ))
        })?;
        serde_json::from_str(&json)
            .map_err(|e| TrainError::Config(format!("malformed '{}': {e}", path.display())))
    }
}

fn persistence(path: &Path) -> impl FnOnce(io::Error) -> TrainError + '_ {
    move |e| TrainError::Persistence { path: path.to_path_buf(), reason: e.to_string() }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    /// Weights stored as JSON so round-trips can be compared bit for bit.
    #[derive(Debug, Default, PartialEq)]
    struct FakeWeights {
        values: Vec<f32>,
    }

    impl Persistable for FakeWeights {
        fn save(&self, path: &Path) -> TrainResult<()> {
            let bits: Vec<u32> = self.values.iter().map(|v| v.to_bits()).collect();
            fs::write(path, serde_json::to_string(&bits).unwrap())?;
            Ok(())
        }

        fn load(&mut self, path: &Path) -> TrainResult<()> {
            let bits: Vec<u32> = serde_json::from_str(&fs::read_to_string(path)?).unwrap();
            self.values = bits.into_iter().map(f32::from_bits).collect();
            Ok(())
        }
    }

    /// Writes half a file and then fails, like a full disk would.
    struct FailingWeights;

    impl Persistable for FailingWeights {
        fn save(&self, path: &Path) -> TrainResult<()> {
            fs::write(path, b"{\"trunc")?;
            Err(TrainError::Persistence { path: path.to_path_buf(), reason: "disk full".into() })
        }

        fn load(&mut self, _path: &Path) -> TrainResult<()> {
            Ok(())
        }
    }

    fn manager() -> (TempDir, CheckpointManager) {
        let dir = TempDir::new().unwrap();
        let mgr = CheckpointManager::new(dir.path()).unwrap();
        (dir, mgr)
    }

    #[test]
    fn test_names_are_zero_padded_and_capped() {
        let (_dir, mgr) = manager();
        assert_eq!(mgr.file_name(1).unwrap(), "vqvae_001.mpk");
        assert_eq!(mgr.file_name(560).unwrap(), "vqvae_560.mpk");
        assert_eq!(mgr.file_name(999).unwrap(), "vqvae_999.mpk");
        assert!(matches!(
            mgr.file_name(1000),
            Err(TrainError::EpochOutOfRange { number: 1000, .. })
        ));
    }

    #[test]
    fn test_parse_accepts_only_exact_form() {
        let (_dir, mgr) = manager();
        assert_eq!(mgr.parse_number("vqvae_003.mpk"), Some(3));
        assert_eq!(mgr.parse_number("vqvae_120.mpk"), Some(120));
        assert_eq!(mgr.parse_number("vqvae_3.mpk"), None);
        assert_eq!(mgr.parse_number("vqvae_0003.mpk"), None);
        assert_eq!(mgr.parse_number("vqvae_00a.mpk"), None);
        assert_eq!(mgr.parse_number(".vqvae_003.partial.mpk"), None);
        assert_eq!(mgr.parse_number("vqvae_003.pt"), None);
        assert_eq!(mgr.parse_number("other_003.mpk"), None);
    }

    #[test]
    fn test_round_trip_is_bit_identical() {
        let (_dir, mgr) = manager();
        let saved = FakeWeights { values: vec![0.1, -2.5e-8, f32::MIN_POSITIVE, 3.0] };

        let handle = mgr.save(4, &saved).unwrap();
        assert_eq!(handle.number, 5);
        assert!(handle.path.ends_with("vqvae_005.mpk"));

        let mut restored = FakeWeights::default();
        let start = mgr.restore(&handle, &mut restored).unwrap();
        assert_eq!(start, 5);
        assert_eq!(restored, saved);
    }

    #[test]
    fn test_latest_is_highest_number_not_newest_file() {
        let (_dir, mgr) = manager();
        let w = FakeWeights { values: vec![1.0] };
        // Written out of order: mtime would pick epoch 2.
        mgr.save(2, &w).unwrap();
        mgr.save(0, &w).unwrap();
        mgr.save(1, &w).unwrap();

        let latest = mgr.find_latest().unwrap();
        assert_eq!(latest.number, 3);
        assert_eq!(latest.start_epoch(), 3);
        assert_eq!(
            mgr.list().unwrap().iter().map(|h| h.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_find_latest_on_empty_directory_is_an_error() {
        let (_dir, mgr) = manager();
        let err = mgr.find_latest().unwrap_err();
        assert!(matches!(err, TrainError::NoCheckpoint(_)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_load_explicit_missing_is_not_found() {
        let (_dir, mgr) = manager();
        let mut w = FakeWeights::default();
        assert!(matches!(
            mgr.load_explicit(7, &mut w),
            Err(TrainError::CheckpointNotFound(_))
        ));
    }

    #[test]
    fn test_load_explicit_uses_completed_epoch_number() {
        let (_dir, mgr) = manager();
        mgr.save(2, &FakeWeights { values: vec![3.0] }).unwrap();
        let mut w = FakeWeights::default();
        let handle = mgr.load_explicit(3, &mut w).unwrap();
        assert_eq!(handle.start_epoch(), 3);
        assert_eq!(w.values, vec![3.0]);
    }

    #[test]
    fn test_failed_save_leaves_nothing_discoverable() {
        let (_dir, mgr) = manager();
        mgr.save(0, &FakeWeights { values: vec![1.0] }).unwrap();

        assert!(mgr.save(1, &FailingWeights).is_err());

        assert_eq!(mgr.find_latest().unwrap().number, 1);
        let leftovers: Vec<_> = fs::read_dir(mgr.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_config_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Cfg {
            size:  usize,
            sched: Option<String>,
        }

        let (_dir, mgr) = manager();
        let cfg = Cfg { size: 256, sched: Some("cycle".into()) };
        mgr.save_config(&cfg).unwrap();
        assert_eq!(mgr.load_config::<Cfg>().unwrap(), cfg);
    }

    #[test]
    fn test_missing_config_is_configuration_error() {
        let (_dir, mgr) = manager();
        let err = mgr.load_config::<serde_json::Value>().unwrap_err();
        assert!(err.is_configuration());
    }
}
