// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ember_core::init_tracing;
use ember_platform::{PlatformWindow, WindowConfig};
use ember_vk::{vk, AshDriver, Bootstrap, BootstrapConfig};
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, default_value = "ember.toml")]
    config: PathBuf,
    /// Force validation layers and the debug messenger on or off
    #[arg(long)]
    validation: Option<bool>,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    title: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
struct WindowCfg {
    title: String,
    width: u32,
    height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "ember".into(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
struct VulkanCfg {
    app_name: String,
    api_version: [u32; 2],
    validation: bool,
    portability_enumeration: bool,
    validation_layers: Vec<String>,
    device_extensions: Vec<String>,
}

impl Default for VulkanCfg {
    fn default() -> Self {
        VulkanCfg {
            app_name: "ember".into(),
            api_version: [1, 3],
            validation: cfg!(debug_assertions),
            portability_enumeration: true,
            validation_layers: vec!["VK_LAYER_KHRONOS_validation".into()],
            device_extensions: vec!["VK_KHR_swapchain".into()],
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
struct AppCfg {
    #[serde(default)]
    window: WindowCfg,
    #[serde(default)]
    vulkan: VulkanCfg,
}

impl AppCfg {
    fn apply(&mut self, args: &Args) {
        if let Some(v) = args.validation {
            self.vulkan.validation = v;
        }
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(t) = &args.title {
            self.window.title = t.clone();
        }
    }

    fn window_config(&self) -> WindowConfig {
        WindowConfig {
            title: self.window.title.clone(),
            width: self.window.width.max(1),
            height: self.window.height.max(1),
        }
    }

    fn bootstrap_config(&self) -> Result<BootstrapConfig> {
        let v = &self.vulkan;
        let [major, minor] = v.api_version;
        Ok(BootstrapConfig {
            app_name: CString::new(v.app_name.as_str()).context("vulkan.app_name")?,
            api_version: vk::make_api_version(0, major, minor, 0),
            diagnostics: v.validation,
            portability_enumeration: v.portability_enumeration,
            validation_layers: c_names(&v.validation_layers).context("vulkan.validation_layers")?,
            device_extensions: c_names(&v.device_extensions).context("vulkan.device_extensions")?,
            ..Default::default()
        })
    }
}

fn c_names(names: &[String]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|n| CString::new(n.as_str()).with_context(|| format!("{n:?} contains a NUL byte")))
        .collect()
}

fn parse_cfg(s: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(s)
}

fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => parse_cfg(&s).unwrap_or_else(|e| {
            warn!("ignoring {}: {e}", path.display());
            AppCfg::default()
        }),
        Err(_) => AppCfg::default(),
    }
}

fn run(args: &Args) -> Result<()> {
    let mut cfg = load_cfg(&args.config);
    cfg.apply(args);
    let boot_cfg = cfg.bootstrap_config()?;
    info!(
        "window {}x{}, validation = {}",
        cfg.window.width, cfg.window.height, boot_cfg.diagnostics
    );

    // Declared before the bootstrap so the surface is destroyed first.
    let mut window = PlatformWindow::open(&cfg.window_config())?;
    let driver = AshDriver::load()?;
    let mut bootstrap = Bootstrap::new(driver, boot_cfg);

    bootstrap.run(&mut window)?;
    Ok(())
}

// The only place a failure is reported.
fn main() -> ExitCode {
    init_tracing("info");
    let args = Args::parse();

    match run(&args) {
        Ok(()) => {
            info!("clean shutdown");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::parse_from(std::iter::once("ember").chain(extra.iter().copied()))
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg = parse_cfg("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.vulkan.api_version, [1, 3]);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = parse_cfg(
            r#"
            [window]
            title = "demo"

            [vulkan]
            validation = false
            device_extensions = ["VK_KHR_swapchain", "VK_KHR_maintenance1"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "demo");
        assert_eq!(cfg.window.height, 600);
        assert!(!cfg.vulkan.validation);
        assert_eq!(cfg.vulkan.device_extensions.len(), 2);
        assert_eq!(cfg.vulkan.validation_layers, vec!["VK_LAYER_KHRONOS_validation"]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(parse_cfg("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        assert_eq!(load_cfg(Path::new("definitely/not/here.toml")), AppCfg::default());
    }

    #[test]
    fn cli_overrides_file() {
        let mut cfg = AppCfg::default();
        cfg.apply(&args(&["--validation", "true", "--width", "1280", "--title", "x"]));
        assert!(cfg.vulkan.validation);
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.window.height, 600);
        assert_eq!(cfg.window.title, "x");
    }

    #[test]
    fn converts_to_bootstrap_config() {
        let mut cfg = AppCfg::default();
        cfg.vulkan.api_version = [1, 2];
        cfg.vulkan.validation = true;

        let boot = cfg.bootstrap_config().unwrap();
        assert_eq!(boot.api_version, vk::API_VERSION_1_2);
        assert!(boot.diagnostics);
        assert_eq!(boot.validation_layers, vec![ember_vk::VALIDATION_LAYER.to_owned()]);
        assert_eq!(boot.device_extensions, vec![c"VK_KHR_swapchain".to_owned()]);
    }

    #[test]
    fn interior_nul_is_rejected() {
        let mut cfg = AppCfg::default();
        cfg.vulkan.device_extensions = vec!["VK_KHR_\0swapchain".into()];
        assert!(cfg.bootstrap_config().is_err());
    }

    #[test]
    fn zero_sized_window_is_clamped() {
        let mut cfg = AppCfg::default();
        cfg.window.width = 0;
        assert_eq!(cfg.window_config().width, 1);
    }
}
