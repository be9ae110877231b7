//! Human-facing text for each live state.
//!
//! Presentation layers (the CLI report, tray indicators reading the feed)
//! share one table so the wording stays in sync. Report bodies are
//! templates; `{safe}`, `{unsafe}`, `{output}` and `{exit_code}` are filled
//! from the snapshot's detail strings.

use crate::types::{LiveSnapshot, LiveState};

pub const ICON_BASE_PATH: &str = "/usr/share/icons/gnome-colors-common/32x32/";

const LIVE_MODE_WIKI: &str = "https://www.kicksecure.com/wiki/Live_Mode";
const PERSISTENT_MODE_WIKI: &str = "https://www.kicksecure.com/wiki/Persistent_Mode";
const REPORT_HEADER: &str = "Live Check Result:";
const ISO_INSTALL_NOTE: &str =
    "This message can be safely ignored if only using this ISO to install to the\nhard drive.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDescriptor {
    pub state: LiveState,
    pub tooltip: &'static str,
    /// Icon path relative to [`ICON_BASE_PATH`].
    pub icon: &'static str,
    body: &'static str,
}

impl StateDescriptor {
    pub fn icon_path(&self) -> String {
        format!("{}{}", ICON_BASE_PATH, self.icon)
    }

    /// Fills the body template from `snapshot`'s details.
    pub fn render_body(&self, snapshot: &LiveSnapshot) -> String {
        let body = if self.state.is_error() {
            self.body
                .replace("{output}", &snapshot.detail_one)
                .replace("{exit_code}", &snapshot.detail_two)
        } else {
            self.body
                .replace("{safe}", &snapshot.detail_one)
                .replace("{unsafe}", &snapshot.detail_two)
        };
        body.replace("{live_wiki}", LIVE_MODE_WIKI)
            .replace("{persistent_wiki}", PERSISTENT_MODE_WIKI)
            .replace("{iso_note}", ISO_INSTALL_NOTE)
    }
}

const ERROR_TOOLTIP: &str =
    "ERROR: The system's live state cannot be determined. Click on the icon for more information.";
const ERROR_ICON: &str = "status/software-update-urgent.png";
const SAFE_ICON: &str = "status/dialog-warning.png";
const DANGER_ICON: &str = "status/dialog-error.png";

pub fn describe(state: LiveState) -> StateDescriptor {
    let (tooltip, icon, body) = match state {
        LiveState::Loading => (
            "Livecheck is loading information about the system's persistence state...",
            "status/user-extended-away.png",
            "Livecheck is still loading information about the system's persistence state.",
        ),
        LiveState::IsoLive => (
            "Live Mode Active (ISO Live): No changes will be made to disk. Click on the icon for more information.",
            "devices/media-optical.png",
            "Live Mode Active: Yes (ISO Live)
Persistent Mode Active: No

* No changes will be made to disk.
* For more information, see the following link:

{live_wiki}

{iso_note}",
        ),
        LiveState::IsoLiveSemiPersistent => (
            "Live Mode Active (ISO Live semi-persistent): No changes will be made to the system disk. Changes to removable media will persist. Click on the icon for more information.",
            SAFE_ICON,
            "Live Mode Active: Yes (ISO Live semi-persistent)
Persistent Mode Active: Yes (removable media is mounted)

* Changes to the system will be lost after a reboot. Changes to removable
  media may be preserved.
* The following removable media directories have a writable filesystem mounted
  to them:
{safe}
* For more information, see the following link:

{live_wiki}

{iso_note}",
        ),
        LiveState::IsoLiveSemiPersistentUnsafe => (
            "Live Mode Active (ISO Live semi-persistent): Changes to the disk may be preserved after a reboot. Click on the icon for more information.",
            DANGER_ICON,
            "Live Mode Active: Yes (ISO Live semi-persistent)
Persistent Mode Active: Yes (writable filesystems are mounted)

* Changes to the system should be lost after a reboot, but this is
  not guaranteed.
* The following removable media directories have a writable filesystem mounted
  to them:
{safe}
* The following directories have an unexpected writable filesystem mounted
  to them:
{unsafe}
* You should unmount all of the above listed directories to ensure changes
  made will not persist through a reboot.
* For more information, see the following link:

{live_wiki}

{iso_note}",
        ),
        LiveState::GrubLive => (
            "Live Mode Active (grub-live): No changes will be made to disk. Click on the icon for more information.",
            "status/user-available.png",
            "Live Mode Active: Yes (grub-live)
Persistent Mode Active: No

* No changes will be made to disk.
* For more information, see the following link:

{live_wiki}",
        ),
        LiveState::GrubLiveReadOnly => (
            "Live Mode Active (grub-live read-only): No changes will be made to disk. Click on the icon for more information.",
            "apps/computerjanitor.png",
            "Live Mode Active: Yes (grub-live read-only)
Persistent Mode Active: No

* No changes will be made to disk.
* All storage media available to the OS is set read-only by hardware
  or drivers.
* For more information, see the following link:

{live_wiki}",
        ),
        LiveState::GrubLiveSemiPersistent => (
            "Live Mode Active (grub-live semi-persistent): No changes will be made to the system disk. Changes to removable media will persist. Click on the icon for more information.",
            SAFE_ICON,
            "Live Mode Active: Yes (grub-live semi-persistent)
Persistent Mode Active: Yes (removable media is mounted)

* Changes to the system will be lost after a reboot. Changes to removable
  media may be preserved.
* The following removable media directories have a writable filesystem mounted
  to them:
{safe}
* For more information, see the following link:

{live_wiki}",
        ),
        LiveState::GrubLiveSemiPersistentUnsafe => (
            "Live Mode Active (grub-live semi-persistent): Changes to the disk may be preserved after a reboot. Click on the icon for more information.",
            DANGER_ICON,
            "Live Mode Active: Yes (grub-live semi-persistent)
Persistent Mode Active: Yes (writable filesystems are mounted)

* Changes to the system should be lost after a reboot, but this is
  not guaranteed.
* The following removable media directories have a writable filesystem mounted
  to them:
{safe}
* The following directories have an unexpected writable filesystem mounted
  to them:
{unsafe}
* You should unmount all of the above listed directories to ensure changes
  made will not persist through a reboot.
* For more information, see the following link:

{live_wiki}",
        ),
        LiveState::InstallingDistribution => (
            "The system installer is currently installing this operating system.",
            "apps/system-installer.png",
            "The system installer is currently installing this operating system.",
        ),
        LiveState::Persistent => (
            "Persistent Mode Active: All changes to the disk will be preserved after a reboot. Click on the icon for more information.",
            "status/dialog-information.png",
            "Live Mode Active: No
Persistent Mode Active: Yes

* All changes to the disk will be preserved after a reboot.
* If you prefer a temporary session where changes are not saved, consider
  switching to live mode.
* For more information, see the following link:

{persistent_wiki}",
        ),
        LiveState::ErrorLiveMode => (
            ERROR_TOOLTIP,
            ERROR_ICON,
            "ERROR: The system's live state cannot be determined!

Technical details: The live-state probe exited with code '{exit_code}'.

Probe output:
{output}
Please report this bug!",
        ),
        LiveState::ErrorGetWritableFsLists => (
            ERROR_TOOLTIP,
            ERROR_ICON,
            "ERROR: The system's live state cannot be determined!

Technical details: The writable-filesystem-list probe exited with code
'{exit_code}'.

Probe output:
{output}
Please report this bug!",
        ),
        LiveState::ErrorLiveModeInvalidOutput => (
            ERROR_TOOLTIP,
            ERROR_ICON,
            "ERROR: The system's live state cannot be determined!

Technical details: The live-state probe ran successfully, but its output
could not be parsed.

Probe output:
{output}
Please report this bug!",
        ),
        LiveState::ErrorGetWritableFsListsInvalidOutput => (
            ERROR_TOOLTIP,
            ERROR_ICON,
            "ERROR: The system's live state cannot be determined!

Technical details: The writable-filesystem-list probe ran successfully, but
its output could not be parsed.

Probe output:
{output}
Please report this bug!",
        ),
    };

    StateDescriptor {
        state,
        tooltip,
        icon,
        body,
    }
}

/// Full plain-text report for one snapshot.
pub fn render_report(snapshot: &LiveSnapshot) -> String {
    let body = describe(snapshot.state).render_body(snapshot);
    format!("{}\n\n{}\n", REPORT_HEADER, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_has_text_and_icon() {
        for state in LiveState::ALL {
            let descriptor = describe(state);
            assert_eq!(descriptor.state, state);
            assert!(!descriptor.tooltip.is_empty());
            assert!(descriptor.icon.ends_with(".png"));
            assert!(descriptor.icon_path().starts_with(ICON_BASE_PATH));
        }
    }

    #[test]
    fn error_states_share_tooltip_and_icon() {
        for state in LiveState::ALL.into_iter().filter(|state| state.is_error()) {
            assert_eq!(describe(state).tooltip, ERROR_TOOLTIP);
            assert_eq!(describe(state).icon, ERROR_ICON);
        }
    }

    #[test]
    fn semi_persistent_report_lists_filesystems() {
        let snapshot = LiveSnapshot::new(
            LiveState::GrubLiveSemiPersistentUnsafe,
            "  - /media/usb",
            "  - /home",
        );
        let report = render_report(&snapshot);
        assert!(report.starts_with("Live Check Result:\n\n"));
        assert!(report.contains("to them:\n  - /media/usb\n"));
        assert!(report.contains("to them:\n  - /home\n"));
        assert!(report.contains(LIVE_MODE_WIKI));
        assert!(!report.contains('{'));
    }

    #[test]
    fn error_report_includes_output_and_exit_code() {
        let snapshot = LiveSnapshot::new(LiveState::ErrorLiveMode, "boom\n", "3");
        let report = render_report(&snapshot);
        assert!(report.contains("exited with code '3'"));
        assert!(report.contains("Probe output:\nboom\n"));
    }

    #[test]
    fn iso_reports_carry_install_note() {
        let report = render_report(&LiveSnapshot::bare(LiveState::IsoLive));
        assert!(report.contains(ISO_INSTALL_NOTE));
        let report = render_report(&LiveSnapshot::bare(LiveState::GrubLive));
        assert!(!report.contains(ISO_INSTALL_NOTE));
    }
}
