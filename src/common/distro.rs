use std::fs;
use std::path::Path;

use crate::common::package::PackageManager;

/// Linux distribution detected from /etc/os-release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatingSystem {
    /// instantOS (Arch-based)
    InstantOS,
    Arch,
    Manjaro,
    EndeavourOS,
    Debian,
    Ubuntu,
    /// Pop!_OS (Ubuntu-based)
    PopOS,
    /// Linux Mint (Ubuntu-based)
    LinuxMint,
    /// elementary OS (Ubuntu-based)
    Elementary,
    Fedora,
    /// Red Hat Enterprise Linux
    Rhel,
    CentOS,
    Rocky,
    AlmaLinux,
    /// openSUSE (Leap and Tumbleweed)
    OpenSUSE,
    /// Unrecognized distribution, carrying its os-release ID
    Unknown(String),
}

/// Distribution plus the VERSION_ID it reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsRelease {
    pub os: OperatingSystem,
    pub version_id: Option<String>,
}

impl OsRelease {
    /// Read /etc/os-release. Returns `None` when the file is missing or
    /// unreadable, which callers treat as "distribution unknown".
    pub fn detect() -> Option<Self> {
        let path = Path::new("/etc/os-release");
        let content = fs::read_to_string(path).ok()?;
        Some(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let version_id = os_release_value(content, "VERSION_ID").filter(|v| !v.is_empty());
        Self {
            os: OperatingSystem::parse_os_release(content),
            version_id,
        }
    }
}

fn os_release_value(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim().trim_matches('"').trim_matches('\'').to_string())
    })
}

impl OperatingSystem {
    /// Detect the current distribution, `Unknown` when os-release is absent.
    pub fn detect() -> Self {
        OsRelease::detect()
            .map(|r| r.os)
            .unwrap_or_else(|| Self::Unknown("No /etc/os-release found".to_string()))
    }

    /// Parse os-release content and return the detected distribution
    pub fn parse_os_release(content: &str) -> Self {
        let id = os_release_value(content, "ID").unwrap_or_default();
        let id_like = os_release_value(content, "ID_LIKE").unwrap_or_default();

        match id.as_str() {
            "instantos" => Self::InstantOS,
            "arch" => Self::Arch,
            "manjaro" => Self::Manjaro,
            "endeavouros" => Self::EndeavourOS,
            "debian" => Self::Debian,
            "ubuntu" => Self::Ubuntu,
            "pop" => Self::PopOS,
            "linuxmint" => Self::LinuxMint,
            "elementary" => Self::Elementary,
            "fedora" => Self::Fedora,
            "rhel" => Self::Rhel,
            "centos" => Self::CentOS,
            "rocky" => Self::Rocky,
            "almalinux" => Self::AlmaLinux,
            "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" => Self::OpenSUSE,
            _ => {
                // Unknown IDs fall back to their family through ID_LIKE
                if id_like.contains("arch") {
                    Self::Arch
                } else if id_like.contains("ubuntu") {
                    Self::Ubuntu
                } else if id_like.contains("debian") {
                    Self::Debian
                } else if id_like.contains("rhel") || id_like.contains("centos") {
                    Self::Rhel
                } else if id_like.contains("fedora") {
                    Self::Fedora
                } else if id_like.contains("suse") {
                    Self::OpenSUSE
                } else {
                    Self::Unknown(id)
                }
            }
        }
    }

    /// Returns the distribution this one is derived from, `None` for roots.
    pub fn based_on(&self) -> Option<Self> {
        match self {
            Self::InstantOS | Self::Manjaro | Self::EndeavourOS => Some(Self::Arch),
            Self::PopOS | Self::LinuxMint | Self::Elementary => Some(Self::Ubuntu),
            Self::Ubuntu => Some(Self::Debian),
            Self::CentOS | Self::Rocky | Self::AlmaLinux => Some(Self::Rhel),
            Self::Rhel => Some(Self::Fedora),
            Self::Arch | Self::Debian | Self::Fedora | Self::OpenSUSE | Self::Unknown(_) => None,
        }
    }

    /// This distribution followed by every ancestor, nearest first.
    pub fn lineage(&self) -> Vec<Self> {
        let mut chain = vec![self.clone()];
        while let Some(parent) = chain.last().and_then(|os| os.based_on()) {
            chain.push(parent);
        }
        chain
    }

    fn descends_from(&self, root: &Self) -> bool {
        self.lineage().contains(root)
    }

    pub fn is_arch_based(&self) -> bool {
        self.descends_from(&Self::Arch)
    }

    pub fn is_debian_based(&self) -> bool {
        self.descends_from(&Self::Debian)
    }

    pub fn is_ubuntu_based(&self) -> bool {
        self.descends_from(&Self::Ubuntu)
    }

    pub fn is_rhel_based(&self) -> bool {
        self.descends_from(&Self::Rhel)
    }

    pub fn is_rpm_based(&self) -> bool {
        self.descends_from(&Self::Fedora) || *self == Self::OpenSUSE
    }

    /// Identifier used for this distribution in package catalogs.
    pub fn id(&self) -> &str {
        match self {
            Self::InstantOS => "instantos",
            Self::Arch => "arch",
            Self::Manjaro => "manjaro",
            Self::EndeavourOS => "endeavouros",
            Self::Debian => "debian",
            Self::Ubuntu => "ubuntu",
            Self::PopOS => "pop",
            Self::LinuxMint => "linuxmint",
            Self::Elementary => "elementary",
            Self::Fedora => "fedora",
            Self::Rhel => "rhel",
            Self::CentOS => "centos",
            Self::Rocky => "rocky",
            Self::AlmaLinux => "almalinux",
            Self::OpenSUSE => "opensuse",
            Self::Unknown(id) => id,
        }
    }

    /// Whether a catalog distribution name refers to this distribution.
    /// Accepts a few common spellings besides the canonical id.
    pub fn matches_name(&self, name: &str) -> bool {
        let name = name.trim().to_ascii_lowercase();
        if name == self.id() {
            return true;
        }
        match self {
            Self::LinuxMint => name == "mint",
            Self::PopOS => name == "popos" || name == "pop_os",
            Self::OpenSUSE => name.starts_with("opensuse"),
            Self::Rhel => name == "redhat",
            Self::AlmaLinux => name == "alma",
            _ => false,
        }
    }

    /// Check whether any entry in `names` covers this distribution,
    /// directly or through one of its ancestors.
    pub fn is_supported_by<S: AsRef<str>>(&self, names: &[S]) -> bool {
        self.lineage()
            .iter()
            .any(|os| names.iter().any(|n| os.matches_name(n.as_ref())))
    }

    /// Installation methods this family prefers, most preferred first.
    /// Entries are matched against variant names and variant types.
    pub fn preferred_methods(&self) -> &'static [&'static str] {
        if self.is_ubuntu_based() {
            &["apt", "snap", "deb"]
        } else if self.is_debian_based() {
            &["apt", "deb", "snap"]
        } else if self.is_rhel_based() {
            &["dnf", "rpm", "yum", "snap"]
        } else if *self == Self::Fedora {
            &["dnf", "rpm", "snap"]
        } else if self.is_arch_based() {
            &["pacman", "snap"]
        } else if *self == Self::OpenSUSE {
            &["zypper", "rpm", "snap"]
        } else {
            &["snap", "apt", "dnf", "pacman"]
        }
    }

    /// The system package manager of this distribution.
    pub fn native_package_manager(&self) -> Option<PackageManager> {
        if self.is_arch_based() {
            Some(PackageManager::Pacman)
        } else if self.is_debian_based() {
            Some(PackageManager::Apt)
        } else if self.is_rpm_based() && *self != Self::OpenSUSE {
            Some(PackageManager::Dnf)
        } else if *self == Self::OpenSUSE {
            Some(PackageManager::Zypper)
        } else {
            None
        }
    }

    /// Get the display name of the distribution
    pub fn name(&self) -> &str {
        match self {
            Self::InstantOS => "instantOS",
            Self::Arch => "Arch Linux",
            Self::Manjaro => "Manjaro",
            Self::EndeavourOS => "EndeavourOS",
            Self::Debian => "Debian",
            Self::Ubuntu => "Ubuntu",
            Self::PopOS => "Pop!_OS",
            Self::LinuxMint => "Linux Mint",
            Self::Elementary => "elementary OS",
            Self::Fedora => "Fedora",
            Self::Rhel => "Red Hat Enterprise Linux",
            Self::CentOS => "CentOS",
            Self::Rocky => "Rocky Linux",
            Self::AlmaLinux => "AlmaLinux",
            Self::OpenSUSE => "openSUSE",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl std::fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(name) => write!(f, "Unknown ({})", name),
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arch() {
        let content = r#"NAME="Arch Linux"
PRETTY_NAME="Arch Linux"
ID=arch
BUILD_ID=rolling
HOME_URL="https://archlinux.org/"
LOGO=archlinux-logo"#;
        let release = OsRelease::parse(content);
        assert_eq!(release.os, OperatingSystem::Arch);
        assert_eq!(release.version_id, None);
    }

    #[test]
    fn test_parse_ubuntu_with_version() {
        let content = r#"PRETTY_NAME="Ubuntu 22.04.3 LTS"
NAME="Ubuntu"
VERSION_ID="22.04"
VERSION="22.04.3 LTS (Jammy Jellyfish)"
VERSION_CODENAME=jammy
ID=ubuntu
ID_LIKE=debian
UBUNTU_CODENAME=jammy"#;
        let release = OsRelease::parse(content);
        assert_eq!(release.os, OperatingSystem::Ubuntu);
        assert_eq!(release.version_id.as_deref(), Some("22.04"));
    }

    #[test]
    fn test_parse_rocky() {
        let content = r#"NAME="Rocky Linux"
VERSION="9.3 (Blue Onyx)"
ID="rocky"
ID_LIKE="rhel centos fedora"
VERSION_ID="9.3""#;
        let release = OsRelease::parse(content);
        assert_eq!(release.os, OperatingSystem::Rocky);
        assert!(release.os.is_rhel_based());
        assert!(release.os.is_rpm_based());
        assert_eq!(release.version_id.as_deref(), Some("9.3"));
    }

    #[test]
    fn test_parse_unknown_derivative_uses_id_like() {
        let content = r#"NAME="Custom Arch"
ID="customarch"
ID_LIKE="arch""#;
        assert_eq!(
            OperatingSystem::parse_os_release(content),
            OperatingSystem::Arch
        );

        let content = r#"ID=zorin
ID_LIKE="ubuntu debian""#;
        assert_eq!(
            OperatingSystem::parse_os_release(content),
            OperatingSystem::Ubuntu
        );
    }

    #[test]
    fn test_parse_unrecognized() {
        let content = "ID=plan9\n";
        assert_eq!(
            OperatingSystem::parse_os_release(content),
            OperatingSystem::Unknown("plan9".to_string())
        );
    }

    #[test]
    fn test_lineage() {
        assert_eq!(
            OperatingSystem::PopOS.lineage(),
            vec![
                OperatingSystem::PopOS,
                OperatingSystem::Ubuntu,
                OperatingSystem::Debian
            ]
        );
        assert_eq!(OperatingSystem::Arch.lineage(), vec![OperatingSystem::Arch]);
    }

    #[test]
    fn test_is_supported_by() {
        assert!(OperatingSystem::Ubuntu.is_supported_by(&["ubuntu"]));
        assert!(OperatingSystem::LinuxMint.is_supported_by(&["ubuntu"]));
        assert!(OperatingSystem::LinuxMint.is_supported_by(&["mint"]));
        assert!(OperatingSystem::Ubuntu.is_supported_by(&["debian"]));
        // Parent is not covered by its child
        assert!(!OperatingSystem::Debian.is_supported_by(&["ubuntu"]));
        assert!(!OperatingSystem::Fedora.is_supported_by(&["ubuntu", "debian"]));
        assert!(OperatingSystem::AlmaLinux.is_supported_by(&["fedora"]));
    }

    #[test]
    fn test_preferred_methods() {
        assert_eq!(
            OperatingSystem::Ubuntu.preferred_methods(),
            &["apt", "snap", "deb"]
        );
        assert_eq!(
            OperatingSystem::LinuxMint.preferred_methods(),
            &["apt", "snap", "deb"]
        );
        assert_eq!(
            OperatingSystem::Debian.preferred_methods(),
            &["apt", "deb", "snap"]
        );
        assert_eq!(
            OperatingSystem::Fedora.preferred_methods(),
            &["dnf", "rpm", "snap"]
        );
        assert_eq!(
            OperatingSystem::Rocky.preferred_methods(),
            &["dnf", "rpm", "yum", "snap"]
        );
        assert_eq!(
            OperatingSystem::Manjaro.preferred_methods(),
            &["pacman", "snap"]
        );
        assert_eq!(
            OperatingSystem::Unknown("plan9".into()).preferred_methods(),
            &["snap", "apt", "dnf", "pacman"]
        );
    }

    #[test]
    fn test_native_package_manager() {
        assert_eq!(
            OperatingSystem::InstantOS.native_package_manager(),
            Some(PackageManager::Pacman)
        );
        assert_eq!(
            OperatingSystem::PopOS.native_package_manager(),
            Some(PackageManager::Apt)
        );
        assert_eq!(
            OperatingSystem::CentOS.native_package_manager(),
            Some(PackageManager::Dnf)
        );
        assert_eq!(
            OperatingSystem::OpenSUSE.native_package_manager(),
            Some(PackageManager::Zypper)
        );
        assert_eq!(
            OperatingSystem::Unknown("x".into()).native_package_manager(),
            None
        );
    }
}
