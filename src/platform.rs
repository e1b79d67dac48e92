// Platform Detection
//
// Supplies the OS family and the default shell path. The gateway only
// consults these when legacy shell mode is enabled, plus for the platform
// info report and the per-platform default whitelist.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Windows,
    #[serde(rename = "macos")]
    MacOs,
    Linux,
    Unknown,
}

impl PlatformFamily {
    /// Detect the family of the host this binary was built for
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            PlatformFamily::Windows
        } else if cfg!(target_os = "macos") {
            PlatformFamily::MacOs
        } else if cfg!(target_os = "linux") {
            PlatformFamily::Linux
        } else {
            PlatformFamily::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlatformFamily::Windows => "windows",
            PlatformFamily::MacOs => "macos",
            PlatformFamily::Linux => "linux",
            PlatformFamily::Unknown => "unknown",
        }
    }

    /// Flag that makes this family's shell run a command string
    pub fn shell_command_flag(self) -> &'static str {
        match self {
            PlatformFamily::Windows => "/c",
            _ => "-c",
        }
    }

    /// Shells worth suggesting on this family
    pub fn shell_suggestions(self) -> Vec<String> {
        let shells: &[&str] = match self {
            PlatformFamily::Windows => &["cmd.exe", "powershell.exe", "pwsh.exe"],
            PlatformFamily::MacOs => &["/bin/zsh", "/bin/bash", "/bin/sh"],
            PlatformFamily::Linux => &["/bin/bash", "/bin/sh", "/bin/zsh"],
            PlatformFamily::Unknown => &["/bin/sh"],
        };
        shells.iter().map(|s| s.to_string()).collect()
    }

    /// Usual install locations of shells on this family
    pub fn common_shell_locations(self) -> Vec<String> {
        match self {
            PlatformFamily::Windows => vec![
                std::env::var("COMSPEC")
                    .unwrap_or_else(|_| r"C:\Windows\System32\cmd.exe".to_string()),
                r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe".to_string(),
                r"C:\Program Files\PowerShell\7\pwsh.exe".to_string(),
            ],
            PlatformFamily::MacOs => vec![
                "/bin/zsh".to_string(),
                "/bin/bash".to_string(),
                "/bin/sh".to_string(),
            ],
            PlatformFamily::Linux => vec![
                "/bin/bash".to_string(),
                "/bin/sh".to_string(),
                "/usr/bin/bash".to_string(),
                "/usr/bin/zsh".to_string(),
            ],
            PlatformFamily::Unknown => vec!["/bin/sh".to_string()],
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supplier of the host's OS family and default shell
pub trait PlatformResolver: Send + Sync {
    fn platform_family(&self) -> PlatformFamily;

    fn default_shell_path(&self) -> String;
}

/// Resolver backed by the running host
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPlatform;

impl PlatformResolver for HostPlatform {
    fn platform_family(&self) -> PlatformFamily {
        PlatformFamily::detect()
    }

    fn default_shell_path(&self) -> String {
        match self.platform_family() {
            PlatformFamily::Windows => {
                std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
            }
            PlatformFamily::MacOs => "/bin/zsh".to_string(),
            PlatformFamily::Linux => {
                std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
            }
            PlatformFamily::Unknown => {
                std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
            }
        }
    }
}

/// Resolver with fixed answers, for hosts that want to pin the shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPlatform {
    pub family: PlatformFamily,
    pub shell: String,
}

impl PlatformResolver for StaticPlatform {
    fn platform_family(&self) -> PlatformFamily {
        self.family
    }

    fn default_shell_path(&self) -> String {
        self.shell.clone()
    }
}

/// Check that a shell path exists and is a file
pub fn validate_shell_path(shell_path: &str) -> bool {
    let path = Path::new(shell_path);
    path.exists() && path.is_file()
}

/// Human-readable help for configuring a shell on this family
pub fn shell_configuration_help(family: PlatformFamily) -> String {
    let mut message = String::from("Shell Configuration Help:\n\n");
    message.push_str(&format!("Detected platform: {}\n\n", family));
    message.push_str("Suggested shells for this platform:\n");
    for shell in family.shell_suggestions() {
        message.push_str(&format!("- {}\n", shell));
    }
    message.push_str("\nCommon shell locations on this platform:\n");
    for location in family.common_shell_locations() {
        message.push_str(&format!("- {}\n", location));
    }
    message.push_str("\nTo configure a custom shell, provide the full path to the shell executable.");
    message
}

/// Platform report returned by `get_platform_info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    pub platform: PlatformFamily,
    pub current_shell: String,
    pub shell_mode: bool,
    pub suggested_shells: Vec<String>,
    pub common_locations: Vec<String>,
    pub help_message: String,
}

impl PlatformInfo {
    pub fn new(family: PlatformFamily, current_shell: String, shell_mode: bool) -> Self {
        let help_message = format!(
            "Shellgate is running on {} using {}\n\n{}",
            family,
            if shell_mode {
                current_shell.as_str()
            } else {
                "direct argument-vector execution"
            },
            shell_configuration_help(family)
        );
        Self {
            platform: family,
            suggested_shells: family.shell_suggestions(),
            common_locations: family.common_shell_locations(),
            current_shell,
            shell_mode,
            help_message,
        }
    }
}
