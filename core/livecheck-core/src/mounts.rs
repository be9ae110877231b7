//! Writable mount classification.
//!
//! Splits writable mounts into "safe" (removable media under `/media` or
//! `/mnt`) and "unsafe" (any other writable device or network/guest share).
//! Two inputs are supported and normalize to the same
//! [`WritableFilesystemSet`]:
//!
//! - raw mount-table records (`/proc/self/mounts` format), via [`classify`]
//! - the two pre-classified token lines printed by the writable-list probe,
//!   via [`parse_token_lists`]
//!
//! Classification is pure apart from the removable-marker lookup, which is
//! injected through [`RemovableMedia`].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::types::WritableFilesystemSet;

const SAFE_ROOTS: [&str; 2] = ["/media", "/mnt"];
const SHARED_FS_PREFIXES: [&str; 4] = ["nfs", "vboxsf", "virtiofs", "9pfs"];
const MIN_RECORD_FIELDS: usize = 6;

static OCTAL_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(\d+)").expect("octal escape pattern is valid"));

/// Answers whether a block device carries a kernel "removable" marker.
pub trait RemovableMedia {
    fn has_removable_marker(&self, device_name: &str) -> bool;
}

/// Looks up `<root>/<name>/removable`, normally under `/sys/class/block`.
#[derive(Debug, Clone)]
pub struct SysfsBlock {
    root: PathBuf,
}

impl SysfsBlock {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for SysfsBlock {
    fn default() -> Self {
        Self::new("/sys/class/block")
    }
}

impl RemovableMedia for SysfsBlock {
    fn has_removable_marker(&self, device_name: &str) -> bool {
        self.root.join(device_name).join("removable").exists()
    }
}

impl RemovableMedia for HashSet<String> {
    fn has_removable_marker(&self, device_name: &str) -> bool {
        self.contains(device_name)
    }
}

/// One parsed mount-table line. The mount point is already octal-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord<'a> {
    pub device: &'a str,
    pub mount_point: String,
    pub fs_type: &'a str,
    pub options: &'a str,
}

impl MountRecord<'_> {
    fn is_writable(&self) -> bool {
        self.options.split(',').any(|option| option == "rw")
    }

    fn is_device_or_shared(&self) -> bool {
        self.device.starts_with("/dev/")
            || SHARED_FS_PREFIXES
                .iter()
                .any(|prefix| self.fs_type.starts_with(prefix))
    }

    fn is_under_safe_root(&self) -> bool {
        SAFE_ROOTS.iter().any(|root| {
            self.mount_point == *root
                || self
                    .mount_point
                    .strip_prefix(root)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Direct block devices (`/dev/sdb1`) must carry a removable marker.
    /// Nested paths such as `/dev/mapper/x` are not checked.
    fn passes_removable_check(&self, removable: &dyn RemovableMedia) -> bool {
        if self.device.matches('/').count() != 2 {
            return true;
        }
        let name = self.device.rsplit('/').next().unwrap_or_default();
        removable.has_removable_marker(name)
    }
}

/// Parses one mount-table line; lines with fewer than six fields yield `None`.
pub fn parse_mount_record(line: &str) -> Option<MountRecord<'_>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_RECORD_FIELDS {
        return None;
    }
    Some(MountRecord {
        device: fields[0],
        mount_point: decode_octal_escapes(fields[1]),
        fs_type: fields[2],
        options: fields[3],
    })
}

/// Classifies raw mount-table lines.
pub fn classify<'a, I>(lines: I, removable: &dyn RemovableMedia) -> WritableFilesystemSet
where
    I: IntoIterator<Item = &'a str>,
{
    let mut set = WritableFilesystemSet::default();

    for line in lines {
        let Some(record) = parse_mount_record(line) else {
            continue;
        };
        if !record.is_writable() || !record.is_device_or_shared() {
            continue;
        }

        if record.is_under_safe_root() && record.passes_removable_check(removable) {
            set.safe.push(record.mount_point);
        } else {
            set.unsafe_.push(record.mount_point);
        }
    }

    set
}

/// Classifies the full contents of a mount-table file.
pub fn classify_mount_table(contents: &str, removable: &dyn RemovableMedia) -> WritableFilesystemSet {
    classify(contents.lines(), removable)
}

/// Builds a set from the writable-list probe's two token lines.
pub fn parse_token_lists(safe_line: &str, unsafe_line: &str) -> WritableFilesystemSet {
    WritableFilesystemSet {
        safe: decode_tokens(safe_line),
        unsafe_: decode_tokens(unsafe_line),
    }
}

fn decode_tokens(line: &str) -> Vec<String> {
    line.split(' ')
        .filter(|token| !token.is_empty())
        .map(decode_octal_escapes)
        .collect()
}

/// Replaces `\NNN` escapes with the character they encode in base 8.
///
/// Escapes that are not valid octal (e.g. `\9`) are kept verbatim.
pub fn decode_octal_escapes(token: &str) -> String {
    OCTAL_ESCAPE
        .replace_all(token, |caps: &Captures<'_>| {
            u32::from_str_radix(&caps[1], 8)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn decode_octal_escapes_handles_spaces_and_invalid_digits() {
        assert_eq!(decode_octal_escapes(r"foo\040bar"), "foo bar");
        assert_eq!(decode_octal_escapes(r"/media/a\011b\134c"), "/media/a\tb\\c");
        assert_eq!(decode_octal_escapes(r"/mnt/x\9y"), r"/mnt/x\9y");
        assert_eq!(decode_octal_escapes("/plain/path"), "/plain/path");
    }

    #[test]
    fn records_without_rw_are_ignored() {
        let lines = [
            "/dev/sdb1 /media/usb vfat ro,nosuid 0 0",
            "/dev/sdc1 /data ext4 ro,relatime 0 0",
            "server:/export /srv nfs4 ro 0 0",
        ];
        let set = classify(lines, &markers(&["sdb1", "sdc1"]));
        assert!(set.is_empty());
    }

    #[test]
    fn rw_must_be_a_whole_option() {
        let set = classify(["/dev/sdb1 /data ext4 nosuid,rwx 0 0"], &markers(&[]));
        assert!(set.is_empty());
    }

    #[test]
    fn removable_marker_decides_safe_under_mnt() {
        let line = "/dev/usb1 /mnt/usb1 vfat rw,nosuid 0 0";

        let with_marker = classify([line], &markers(&["usb1"]));
        assert_eq!(with_marker.safe, vec!["/mnt/usb1".to_string()]);
        assert!(with_marker.unsafe_.is_empty());

        let without_marker = classify([line], &markers(&[]));
        assert!(without_marker.safe.is_empty());
        assert_eq!(without_marker.unsafe_, vec!["/mnt/usb1".to_string()]);
    }

    #[test]
    fn network_shares_outside_safe_roots_are_unsafe() {
        let set = classify(["server:/export /data nfs4 rw,relatime 0 0"], &markers(&[]));
        assert_eq!(set.unsafe_, vec!["/data".to_string()]);
        assert!(set.safe.is_empty());
    }

    #[test]
    fn network_shares_under_safe_roots_skip_removable_check() {
        let lines = [
            "share /media/share vboxsf rw 0 0",
            "host0 /mnt virtiofs rw 0 0",
            "/dev/mapper/luks-1 /media/vault ext4 rw 0 0",
        ];
        let set = classify(lines, &markers(&[]));
        assert_eq!(
            set.safe,
            vec![
                "/media/share".to_string(),
                "/mnt".to_string(),
                "/media/vault".to_string()
            ]
        );
    }

    #[test]
    fn virtual_filesystems_are_ignored() {
        let lines = [
            "proc /proc proc rw,nosuid 0 0",
            "tmpfs /run tmpfs rw,nosuid 0 0",
            "overlay / overlay rw,relatime 0 0",
        ];
        assert!(classify(lines, &markers(&[])).is_empty());
    }

    #[test]
    fn lookalike_roots_are_not_safe() {
        let lines = [
            "/dev/sdb1 /mediadata ext4 rw 0 0",
            "/dev/sdb2 /mnt2 ext4 rw 0 0",
        ];
        let set = classify(lines, &markers(&["sdb1", "sdb2"]));
        assert!(set.safe.is_empty());
        assert_eq!(
            set.unsafe_,
            vec!["/mediadata".to_string(), "/mnt2".to_string()]
        );
    }

    #[test]
    fn short_records_are_skipped_and_order_is_kept() {
        let contents = "\
garbage line\n\
/dev/sdd1 /home ext4 rw 0 0\n\
/dev/sdb1 /media/a\\040b vfat rw 0 0\n\
/dev/sdd1 /home ext4 rw 0 0\n";
        let set = classify_mount_table(contents, &markers(&["sdb1"]));
        assert_eq!(set.safe, vec!["/media/a b".to_string()]);
        assert_eq!(set.unsafe_, vec!["/home".to_string(), "/home".to_string()]);
    }

    #[test]
    fn sysfs_lookup_uses_removable_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let device_dir = temp_dir.path().join("sdb1");
        fs_err::create_dir_all(&device_dir).expect("create device dir");
        fs_err::write(device_dir.join("removable"), "1\n").expect("write marker");

        let sysfs = SysfsBlock::new(temp_dir.path());
        assert!(sysfs.has_removable_marker("sdb1"));
        assert!(!sysfs.has_removable_marker("sda"));
    }

    #[test]
    fn token_lists_decode_and_drop_empty_tokens() {
        let set = parse_token_lists(r"/media/usb  /mnt/my\040disk", "");
        assert_eq!(
            set.safe,
            vec!["/media/usb".to_string(), "/mnt/my disk".to_string()]
        );
        assert!(set.unsafe_.is_empty());
    }
}
