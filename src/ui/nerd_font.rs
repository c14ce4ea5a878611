/// Nerd font icons used in installer output.
///
/// Kept to a small set so messages stay readable on terminals whose font
/// only covers the Font Awesome range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerdFont {
    // Status and feedback
    Check,          // 
    Cross,          // 
    Warning,        // 
    Info,           // 
    Question,       // 

    // Files and artifacts
    Download,       // 
    Archive,        // 
    Package,        // 

    // System
    Terminal,       // 
    Gear,           // 
    Wrench,         // 
    Lock,           // 

    // Navigation and hints
    ArrowRight,     // 
    Link,           // 
    Search,         // 
    List,           // 
    Lightbulb,      // 
    Rocket,         // 
    Refresh,        // 
}

impl NerdFont {
    pub fn unicode(&self) -> char {
        match self {
            Self::Check => '\u{f00c}',          // fa-check
            Self::Cross => '\u{f00d}',          // fa-times
            Self::Warning => '\u{f071}',        // fa-exclamation-triangle
            Self::Info => '\u{f05a}',           // fa-info-circle
            Self::Question => '\u{f059}',       // fa-question-circle

            Self::Download => '\u{f019}',       // fa-download
            Self::Archive => '\u{f187}',        // fa-archive
            Self::Package => '\u{f187}',        // fa-archive (reused)

            Self::Terminal => '\u{f120}',       // fa-terminal
            Self::Gear => '\u{f013}',           // fa-gear
            Self::Wrench => '\u{f0ad}',         // fa-wrench
            Self::Lock => '\u{f023}',           // fa-lock

            Self::ArrowRight => '\u{f061}',     // fa-arrow-right
            Self::Link => '\u{f0c1}',           // fa-link
            Self::Search => '\u{f002}',         // fa-search
            Self::List => '\u{f03a}',           // fa-list
            Self::Lightbulb => '\u{f0eb}',      // fa-lightbulb
            Self::Rocket => '\u{f135}',         // fa-rocket
            Self::Refresh => '\u{f021}',        // fa-refresh
        }
    }
}

impl std::fmt::Display for NerdFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.unicode())
    }
}

impl From<NerdFont> for char {
    fn from(icon: NerdFont) -> Self {
        icon.unicode()
    }
}

impl From<NerdFont> for String {
    fn from(icon: NerdFont) -> Self {
        icon.unicode().to_string()
    }
}
