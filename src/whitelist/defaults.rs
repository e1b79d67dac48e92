//! Per-platform default whitelist.

use super::entry::{SecurityLevel, WhitelistEntry};
use crate::platform::PlatformFamily;

fn entries(level: SecurityLevel, commands: &[(&str, &str)]) -> Vec<WhitelistEntry> {
    commands
        .iter()
        .map(|(command, description)| WhitelistEntry::new(*command, level).with_description(*description))
        .collect()
}

/// Safe on every platform
pub fn common_safe_commands() -> Vec<WhitelistEntry> {
    entries(
        SecurityLevel::Safe,
        &[("echo", "Print text to standard output")],
    )
}

fn windows_commands() -> Vec<WhitelistEntry> {
    let mut all = entries(
        SecurityLevel::Safe,
        &[
            ("dir", "List directory contents"),
            ("type", "Display the contents of a text file"),
            ("cd", "Change directory"),
            ("findstr", "Search for strings in files"),
            ("where", "Locate programs"),
            ("whoami", "Display current user"),
            ("hostname", "Display computer name"),
            ("ver", "Display operating system version"),
        ],
    );
    all.extend(entries(
        SecurityLevel::RequiresApproval,
        &[
            ("copy", "Copy files"),
            ("move", "Move files"),
            ("mkdir", "Create directories"),
            ("rmdir", "Remove directories"),
            ("rename", "Rename files"),
            ("attrib", "Change file attributes"),
        ],
    ));
    all.extend(entries(
        SecurityLevel::Forbidden,
        &[
            ("del", "Delete files"),
            ("erase", "Delete files"),
            ("format", "Format a disk"),
            ("runas", "Execute a program as another user"),
        ],
    ));
    all
}

fn unix_commands() -> Vec<WhitelistEntry> {
    let mut all = entries(
        SecurityLevel::Safe,
        &[
            ("ls", "List directory contents"),
            ("pwd", "Print working directory"),
            ("cat", "Concatenate and print files"),
            ("grep", "Search for patterns in files"),
            ("find", "Find files in a directory hierarchy"),
            ("cd", "Change directory"),
            ("head", "Output the first part of files"),
            ("tail", "Output the last part of files"),
            ("wc", "Print newline, word, and byte counts"),
        ],
    );
    all.extend(entries(
        SecurityLevel::RequiresApproval,
        &[
            ("mv", "Move (rename) files"),
            ("cp", "Copy files and directories"),
            ("mkdir", "Create directories"),
            ("touch", "Change file timestamps or create empty files"),
            ("chmod", "Change file mode bits"),
            ("chown", "Change file owner and group"),
        ],
    ));
    all.extend(entries(
        SecurityLevel::Forbidden,
        &[
            ("rm", "Remove files or directories"),
            ("sudo", "Execute a command as another user"),
        ],
    ));
    all
}

/// Default entries for a platform family
///
/// Unknown platforms get the Unix set.
pub fn platform_default_commands(family: PlatformFamily) -> Vec<WhitelistEntry> {
    let mut all = common_safe_commands();
    match family {
        PlatformFamily::Windows => all.extend(windows_commands()),
        PlatformFamily::MacOs | PlatformFamily::Linux | PlatformFamily::Unknown => {
            all.extend(unix_commands())
        }
    }
    all
}
