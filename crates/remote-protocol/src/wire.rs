//! Fixed wire strings and separators.

/// Default TCP port the service listens on.
pub const DEFAULT_PORT: u16 = 6545;

/// Separates the verb and arguments within a line.
pub const FIELD_SEPARATOR: char = '|';

/// Separates entries inside a chapter/track list payload.
pub const LIST_ENTRY_SEPARATOR: &str = "]]";

/// Separates fields inside one chapter/track list entry.
pub const LIST_FIELD_SEPARATOR: &str = ">>";

/// A line consisting of exactly this ends the session after dispatch.
pub const EXIT_MARKER: &str = "Exit";

/// `Exit|<reason>` reasons sent by the server.
pub const EXIT_UNAUTHORIZED: &str = "Unauthorized";
pub const EXIT_DISCONNECTED_BY_USER: &str = "Disconnected by User";

/// On-screen notifications raised on the player.
pub const OSD_REMOTE_CONNECTED: &str = "Remote Connected";
pub const OSD_REMOTE_DISCONNECTED: &str = "Remote Disconnected";
