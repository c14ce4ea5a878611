//! Package managers known to the installer.
//!
//! [`PackageManager`] maps catalog type tags such as `apt` or `winget` to the
//! commands used to refresh indexes, check availability and install.

mod manager;

pub use manager::PackageManager;
