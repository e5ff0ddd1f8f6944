//! Canonical identifiers for operating systems, releases, architectures and clouds
//!
//! Clients report these facts in many spellings (`x86_64`, `amd64`, `Ubuntu`,
//! `ec2`, ...). Conditions and substitution only ever see the canonical ids
//! below. Anything not listed resolves to the `unknown` entry of its table,
//! with a warning, rather than failing the request.

use log::warn;

/// Identifier used for any fact that did not resolve to a known entry
pub const UNKNOWN: &str = "unknown";

/// A known operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsInfo {
    pub id: &'static str,
    pub package_manager: &'static str,
    pub init_system: &'static str,
}

/// Support status of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    Stable,
    Testing,
    EndOfLife,
    Unknown,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Stable => "stable",
            ReleaseStatus::Testing => "testing",
            ReleaseStatus::EndOfLife => "eol",
            ReleaseStatus::Unknown => UNKNOWN,
        }
    }
}

/// A known release of an operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub id: &'static str,
    pub os: &'static str,
    pub lts: bool,
    pub status: ReleaseStatus,
}

const OPERATING_SYSTEMS: &[OsInfo] = &[
    OsInfo { id: "ubuntu", package_manager: "apt", init_system: "systemd" },
    OsInfo { id: "debian", package_manager: "apt", init_system: "systemd" },
    OsInfo { id: "fedora", package_manager: "dnf", init_system: "systemd" },
    OsInfo { id: "rocky", package_manager: "dnf", init_system: "systemd" },
    OsInfo { id: "almalinux", package_manager: "dnf", init_system: "systemd" },
    OsInfo { id: "centos", package_manager: "dnf", init_system: "systemd" },
    OsInfo { id: "alpine", package_manager: "apk", init_system: "openrc" },
    OsInfo { id: "arch", package_manager: "pacman", init_system: "systemd" },
];

const UNKNOWN_OS: OsInfo = OsInfo {
    id: UNKNOWN,
    package_manager: UNKNOWN,
    init_system: UNKNOWN,
};

const OS_ALIASES: &[(&str, &str)] = &[
    ("rhel-rocky", "rocky"),
    ("alma", "almalinux"),
    ("archlinux", "arch"),
];

const RELEASES: &[ReleaseInfo] = &[
    ReleaseInfo { id: "focal", os: "ubuntu", lts: true, status: ReleaseStatus::Stable },
    ReleaseInfo { id: "jammy", os: "ubuntu", lts: true, status: ReleaseStatus::Stable },
    ReleaseInfo { id: "noble", os: "ubuntu", lts: true, status: ReleaseStatus::Stable },
    ReleaseInfo { id: "mantic", os: "ubuntu", lts: false, status: ReleaseStatus::EndOfLife },
    ReleaseInfo { id: "oracular", os: "ubuntu", lts: false, status: ReleaseStatus::Stable },
    ReleaseInfo { id: "plucky", os: "ubuntu", lts: false, status: ReleaseStatus::Testing },
    ReleaseInfo { id: "buster", os: "debian", lts: true, status: ReleaseStatus::EndOfLife },
    ReleaseInfo { id: "bullseye", os: "debian", lts: true, status: ReleaseStatus::Stable },
    ReleaseInfo { id: "bookworm", os: "debian", lts: true, status: ReleaseStatus::Stable },
    ReleaseInfo { id: "trixie", os: "debian", lts: false, status: ReleaseStatus::Testing },
    ReleaseInfo { id: "sid", os: "debian", lts: false, status: ReleaseStatus::Testing },
];

const UNKNOWN_RELEASE: ReleaseInfo = ReleaseInfo {
    id: UNKNOWN,
    os: UNKNOWN,
    lts: false,
    status: ReleaseStatus::Unknown,
};

const ARCHITECTURES: &[(&str, &[&str])] = &[
    ("amd64", &["x86_64", "x64", "x86-64"]),
    ("arm64", &["aarch64", "armv8", "arm64v8"]),
    ("armhf", &["armv7l", "armv7", "arm"]),
    ("riscv64", &[]),
    ("i386", &["i686", "x86"]),
];

const CLOUDS: &[(&str, &[&str])] = &[
    ("aws", &["ec2", "amazon"]),
    ("azure", &[]),
    ("gce", &["gcp", "google"]),
    ("hetzner", &[]),
    ("oracle", &["oci"]),
    ("digitalocean", &["do"]),
    ("openstack", &[]),
    ("nocloud", &["none", "lxd"]),
];

/// Resolve an operating system id, including known aliases
pub fn lookup_os(raw: &str) -> OsInfo {
    let wanted = raw.trim().to_ascii_lowercase();
    if wanted.is_empty() {
        return UNKNOWN_OS;
    }
    let canonical = OS_ALIASES
        .iter()
        .find(|(alias, _)| *alias == wanted)
        .map(|(_, id)| *id)
        .unwrap_or(wanted.as_str());

    match OPERATING_SYSTEMS.iter().find(|os| os.id == canonical) {
        Some(os) => *os,
        None => {
            warn!("Unknown operating system '{}', using '{}'", raw, UNKNOWN);
            UNKNOWN_OS
        }
    }
}

/// Resolve a release codename
pub fn lookup_release(raw: &str) -> ReleaseInfo {
    let wanted = raw.trim().to_ascii_lowercase();
    if wanted.is_empty() {
        return UNKNOWN_RELEASE;
    }
    match RELEASES.iter().find(|release| release.id == wanted) {
        Some(release) => *release,
        None => {
            warn!("Unknown release '{}', using '{}'", raw, UNKNOWN);
            UNKNOWN_RELEASE
        }
    }
}

/// Resolve an architecture id or alias to its canonical Debian-style name
pub fn lookup_arch(raw: &str) -> &'static str {
    lookup_aliased("architecture", ARCHITECTURES, raw)
}

/// Resolve a cloud provider id or alias
pub fn lookup_cloud(raw: &str) -> &'static str {
    lookup_aliased("cloud", CLOUDS, raw)
}

fn lookup_aliased(kind: &str, table: &[(&'static str, &[&str])], raw: &str) -> &'static str {
    let wanted = raw.trim().to_ascii_lowercase();
    if wanted.is_empty() {
        return UNKNOWN;
    }
    for (id, aliases) in table {
        if *id == wanted || aliases.contains(&wanted.as_str()) {
            return *id;
        }
    }
    warn!("Unknown {} '{}', using '{}'", kind, raw, UNKNOWN);
    UNKNOWN
}
