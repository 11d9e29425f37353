/// Handle used by edges that do not name one.
pub const DEFAULT_HANDLE: &str = "source";

/// Runner version assumed when a node does not declare one.
pub const DEFAULT_VERSION: &str = "1";

/// Node type that seeds the frontier when no explicit start ids are given.
pub const START_NODE_TYPE: &str = "start";

/// Node type whose result becomes the run output.
pub const END_NODE_TYPE: &str = "end";
