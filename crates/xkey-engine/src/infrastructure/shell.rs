//! Desktop shell detection.
//!
//! GNOME Shell, Cinnamon and Unity take Super combinations for themselves
//! when they are only grabbed on the root window.  While one of them is
//! running, global Super hotkeys are also grabbed on every window.

use std::process::Command;

use tracing::{debug, info};

/// Process names of shells that swallow root Super grabs.
const SUPER_GRABBING_SHELLS: &[&str] = &["gnome-shell", "cinnamon", "unity"];

/// Returns `true` when a process command line in `ps_output` belongs to a
/// shell that swallows root Super grabs.
pub fn mentions_super_shell(ps_output: &str) -> bool {
    ps_output
        .lines()
        .any(|line| SUPER_GRABBING_SHELLS.iter().any(|shell| line.contains(shell)))
}

/// Lists running processes and looks for such a shell.  Returns `false` when
/// `ps` cannot be run.
pub fn super_grab_workaround_needed() -> bool {
    match Command::new("ps").args(["-eo", "command"]).output() {
        Ok(output) => {
            let needed = mentions_super_shell(&String::from_utf8_lossy(&output.stdout));
            if needed {
                info!("desktop shell grabs Super keys; enabling per-window Super grabs");
            }
            needed
        }
        Err(e) => {
            debug!("cannot list processes: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gnome_shell_is_detected() {
        // Arrange
        let ps = "COMMAND\n/sbin/init\n/usr/bin/gnome-shell --mode=user\nbash\n";

        // Act / Assert
        assert!(mentions_super_shell(ps));
    }

    #[test]
    fn test_plain_window_manager_is_not_detected() {
        let ps = "COMMAND\n/sbin/init\nxfwm4\nxfce4-panel\n";
        assert!(!mentions_super_shell(ps));
    }

    #[test]
    fn test_cinnamon_and_unity_are_detected() {
        assert!(mentions_super_shell("cinnamon --replace\n"));
        assert!(mentions_super_shell("/usr/bin/compiz\nunity-panel-service\n"));
    }
}
