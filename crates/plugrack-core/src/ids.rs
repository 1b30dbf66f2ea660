//! Stable identities for plugins and chains.

use core::fmt;

/// Identity of a plugin instance, unique within its session.
///
/// Allocated by [`Session::create_plugin`](crate::Session::create_plugin)
/// and never reused, so it stays valid as a key after the plugin leaves a
/// chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginId(pub u32);

/// Identity of a plugin chain (one per track or bus), unique within its session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainId(pub u32);

impl PluginId {
    /// Raw `u32` value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl ChainId {
    /// Raw `u32` value.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}
