use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::geometry::Envelope;
use crate::tap::TapTiming;
use crate::viewport::{SimpleMap, SimpleViewport};

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thresholds {
    pub short_click_ms: u64,
    pub short_tap_ms: u64,
    pub long_tap_ms: u64,
    pub double_tap_defer_ms: u64,
    pub fling_velocity: f64,
    pub swipe_velocity: f64,
    pub unsnap_rotation_deg: f64,
    pub resnap_rotation_deg: f64,
    #[serde(default = "default_velocity_window_ms")]
    pub velocity_window_ms: u64,
}

fn default_velocity_window_ms() -> u64 {
    crate::velocity::DEFAULT_WINDOW_MS
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Locks {
    pub pan: bool,
    pub zoom: bool,
    pub rotation: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Taps {
    #[serde(default = "yes")]
    pub enable_double_tap: bool,
}

impl Default for Taps {
    fn default() -> Self {
        Self {
            enable_double_tap: true,
        }
    }
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewportSettings {
    pub width: f64,
    pub height: f64,
    pub resolution: f64,
    pub resolutions: Vec<f64>,
    pub envelope: Envelope,
}

impl ViewportSettings {
    /// Viewport centred on the envelope, plus the map that owns it.
    pub fn build(&self) -> (SimpleViewport, SimpleMap) {
        let vp = SimpleViewport::new(
            self.width,
            self.height,
            self.envelope.centre(),
            self.resolution,
        );
        let map = SimpleMap::new(self.envelope, self.resolutions.clone());
        (vp, map)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub thresholds: Thresholds,
    #[serde(default)]
    pub locks: Locks,
    #[serde(default)]
    pub taps: Taps,
    pub viewport: ViewportSettings,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        Ok(profile)
    }

    pub fn builtin() -> Result<Self> {
        Self::parse(default_profile_text())
    }

    pub fn gesture_config(&self) -> GestureConfig {
        let th = &self.thresholds;
        GestureConfig {
            locks: self.locks,
            timing: TapTiming {
                short_click_ms: th.short_click_ms,
                short_tap_ms: th.short_tap_ms,
                long_tap_ms: th.long_tap_ms,
                defer_ms: th.double_tap_defer_ms,
            },
            enable_double_tap: self.taps.enable_double_tap,
            fling_velocity: th.fling_velocity,
            swipe_velocity: th.swipe_velocity,
            unsnap_rotation_deg: th.unsnap_rotation_deg,
            resnap_rotation_deg: th.resnap_rotation_deg,
            velocity_window_ms: th.velocity_window_ms,
        }
    }
}

/// Runtime knobs of the gesture core.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    pub locks: Locks,
    pub timing: TapTiming,
    pub enable_double_tap: bool,
    pub fling_velocity: f64,
    pub swipe_velocity: f64,
    pub unsnap_rotation_deg: f64,
    pub resnap_rotation_deg: f64,
    pub velocity_window_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            locks: Locks::default(),
            timing: TapTiming::default(),
            enable_double_tap: true,
            fling_velocity: 10_000.0,
            swipe_velocity: 2_000.0,
            unsnap_rotation_deg: 30.0,
            resnap_rotation_deg: 5.0,
            velocity_window_ms: crate::velocity::DEFAULT_WINDOW_MS,
        }
    }
}

impl GestureConfig {
    /// Tap timing with the defer delay zeroed when double taps are off.
    pub fn tap_timing(&self) -> TapTiming {
        if self.enable_double_tap {
            self.timing
        } else {
            TapTiming {
                defer_ms: 0,
                ..self.timing
            }
        }
    }
}

/// Profiles on disk plus the `active` pointer file.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn default_config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("touchview"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open(default_config_dir()?)
    }

    pub fn open(config_dir: PathBuf) -> Result<Self> {
        let profiles_dir = config_dir.join("profiles");
        fs::create_dir_all(&profiles_dir)?;

        let def_path = profiles_dir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = config_dir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let mut active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = match load_profile(&profiles_dir, &active_name) {
            Ok(p) => p,
            Err(e) if active_name != "default" => {
                warn!("active profile '{active_name}' unusable ({e}); falling back to default");
                active_name = "default".to_string();
                load_profile(&profiles_dir, &active_name)?
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            active_name,
            profile,
            config_dir,
            profiles_dir,
            active_ptr,
        })
    }

    /// Re-reads the active profile; the last good one stays on error.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml")
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                {
                    v.push(stem.to_string());
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self, devices: &[String]) -> serde_json::Value {
        serde_json::json!({
            "input_group_member": check_in_input_group(),
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profiles": self.list_profiles(),
            "devices": devices,
            "hints": {
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

pub fn load_profile_file(path: &Path) -> Result<Profile> {
    let txt = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
}

fn load_profile(profiles_dir: &Path, name: &str) -> Result<Profile> {
    load_profile_file(&profiles_dir.join(format!("{name}.toml")))
}

fn validate_profile(p: &Profile) -> Result<()> {
    let th = &p.thresholds;
    if th.short_click_ms == 0 || th.short_tap_ms == 0 || th.long_tap_ms == 0 {
        return Err(anyhow!("thresholds must be positive durations"));
    }
    if th.velocity_window_ms == 0 {
        return Err(anyhow!("thresholds.velocity_window_ms must be positive"));
    }
    for (name, v) in [
        ("fling_velocity", th.fling_velocity),
        ("swipe_velocity", th.swipe_velocity),
        ("unsnap_rotation_deg", th.unsnap_rotation_deg),
        ("resnap_rotation_deg", th.resnap_rotation_deg),
    ] {
        if !v.is_finite() || v < 0.0 {
            return Err(anyhow!("thresholds.{name} must be a non-negative number"));
        }
    }
    if th.swipe_velocity > th.fling_velocity {
        return Err(anyhow!("thresholds.swipe_velocity must not exceed fling_velocity"));
    }
    if th.resnap_rotation_deg > th.unsnap_rotation_deg {
        return Err(anyhow!(
            "thresholds.resnap_rotation_deg must not exceed unsnap_rotation_deg"
        ));
    }

    let vp = &p.viewport;
    if !(vp.width > 0.0 && vp.height > 0.0 && vp.resolution > 0.0) {
        return Err(anyhow!("viewport width, height and resolution must be positive"));
    }
    if vp.resolutions.is_empty() {
        return Err(anyhow!("viewport.resolutions must not be empty"));
    }
    if vp.resolutions.iter().any(|r| !r.is_finite() || *r <= 0.0)
        || vp.resolutions.windows(2).any(|w| w[0] <= w[1])
    {
        return Err(anyhow!(
            "viewport.resolutions must be positive and strictly decreasing"
        ));
    }
    if !vp.envelope.is_valid() {
        return Err(anyhow!("viewport.envelope is empty or not finite"));
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:")
                && line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
            {
                return true;
            }
        }
    }
    false
}
