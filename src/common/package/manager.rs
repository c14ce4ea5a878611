//! Package manager enum and the commands each one is driven with.

/// Every package manager a catalog variant can name as its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    // =========================================================================
    // Native distro package managers
    // =========================================================================
    /// APT - Debian/Ubuntu family
    Apt,
    /// DNF - Fedora/RHEL family
    Dnf,
    /// YUM - older RHEL/CentOS
    Yum,
    /// Pacman - Arch Linux family
    Pacman,
    /// Zypper - openSUSE
    Zypper,

    // =========================================================================
    // Universal and language-level managers
    // =========================================================================
    Snap,
    Pip,
    Pipx,
    AnsibleGalaxy,
    Chocolatey,
    Winget,
    Brew,
}

impl PackageManager {
    /// Parse a catalog type tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let manager = match tag {
            "apt" => Self::Apt,
            "dnf" => Self::Dnf,
            "yum" => Self::Yum,
            "pacman" => Self::Pacman,
            "zypper" => Self::Zypper,
            "snap" => Self::Snap,
            "pip" => Self::Pip,
            "pipx" => Self::Pipx,
            "ansible-galaxy" | "ansible_galaxy" => Self::AnsibleGalaxy,
            "chocolatey" | "choco" => Self::Chocolatey,
            "winget" => Self::Winget,
            "brew" | "homebrew" => Self::Brew,
            _ => return None,
        };
        Some(manager)
    }

    /// Returns true for the primary package manager of a distribution.
    pub fn is_native(&self) -> bool {
        matches!(
            self,
            Self::Apt | Self::Dnf | Self::Yum | Self::Pacman | Self::Zypper
        )
    }

    /// Managers that write system locations and need root on Unix.
    pub fn is_system_wide(&self) -> bool {
        self.is_native() || *self == Self::Snap
    }

    /// Binary that must be on the command search path.
    pub fn binary(&self) -> &'static str {
        self.install_command().0
    }

    /// Get the install command and base arguments, without any sudo prefix.
    pub fn install_command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::Apt => ("apt-get", &["install", "-y"]),
            Self::Dnf => ("dnf", &["install", "-y"]),
            Self::Yum => ("yum", &["install", "-y"]),
            Self::Pacman => ("pacman", &["-S", "--noconfirm", "--needed"]),
            Self::Zypper => ("zypper", &["--non-interactive", "install"]),
            Self::Snap => ("snap", &["install"]),
            Self::Pip => ("pip", &["install", "--user"]),
            Self::Pipx => ("pipx", &["install"]),
            Self::AnsibleGalaxy => ("ansible-galaxy", &["collection", "install"]),
            Self::Chocolatey => ("choco", &["install", "-y"]),
            Self::Winget => (
                "winget",
                &[
                    "install",
                    "--silent",
                    "--accept-package-agreements",
                    "--accept-source-agreements",
                    "--id",
                ],
            ),
            Self::Brew => ("brew", &["install"]),
        }
    }

    /// Index refresh run before installing, for managers that keep one.
    pub fn update_command(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Apt => Some(&["apt-get", "update"]),
            Self::Pacman => Some(&["pacman", "-Sy"]),
            Self::Zypper => Some(&["zypper", "--non-interactive", "refresh"]),
            Self::Brew => Some(&["brew", "update"]),
            _ => None,
        }
    }

    /// Query that exits non-zero when `package` is unknown to the manager.
    pub fn availability_check(&self, package: &str) -> Option<(&'static str, Vec<String>)> {
        let (program, args): (&'static str, &[&str]) = match self {
            Self::Apt => ("apt-cache", &["show"]),
            Self::Dnf => ("dnf", &["info"]),
            Self::Yum => ("yum", &["info"]),
            Self::Pacman => ("pacman", &["-Si"]),
            Self::Snap => ("snap", &["info"]),
            _ => return None,
        };
        let mut args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        args.push(package.to_string());
        Some((program, args))
    }

    /// Winget takes a single package id per invocation.
    pub fn installs_one_at_a_time(&self) -> bool {
        *self == Self::Winget
    }

    /// Get a human-readable name for this package manager.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Apt => "APT",
            Self::Dnf => "DNF",
            Self::Yum => "YUM",
            Self::Pacman => "Pacman",
            Self::Zypper => "Zypper",
            Self::Snap => "Snap",
            Self::Pip => "pip",
            Self::Pipx => "pipx",
            Self::AnsibleGalaxy => "Ansible Galaxy",
            Self::Chocolatey => "Chocolatey",
            Self::Winget => "WinGet",
            Self::Brew => "Homebrew",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        for (tag, expected) in [
            ("apt", PackageManager::Apt),
            ("pacman", PackageManager::Pacman),
            ("snap", PackageManager::Snap),
            ("ansible-galaxy", PackageManager::AnsibleGalaxy),
            ("ansible_galaxy", PackageManager::AnsibleGalaxy),
            ("choco", PackageManager::Chocolatey),
            ("homebrew", PackageManager::Brew),
            ("winget", PackageManager::Winget),
        ] {
            assert_eq!(PackageManager::from_tag(tag), Some(expected));
        }
        assert_eq!(PackageManager::from_tag("flatpak"), None);
    }

    #[test]
    fn test_system_wide() {
        assert!(PackageManager::Apt.is_system_wide());
        assert!(PackageManager::Snap.is_system_wide());
        assert!(!PackageManager::Snap.is_native());
        assert!(!PackageManager::Pip.is_system_wide());
        assert!(!PackageManager::Winget.is_system_wide());
    }

    #[test]
    fn test_availability_check() {
        let (program, args) = PackageManager::Apt
            .availability_check("nodejs")
            .expect("apt has a check");
        assert_eq!(program, "apt-cache");
        assert_eq!(args, vec!["show", "nodejs"]);
        assert!(PackageManager::Pip.availability_check("requests").is_none());
    }

    #[test]
    fn test_binary() {
        assert_eq!(PackageManager::Apt.binary(), "apt-get");
        assert_eq!(PackageManager::Chocolatey.binary(), "choco");
    }
}
