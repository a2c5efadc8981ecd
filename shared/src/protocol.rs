//! Wire protocol constants shared by the server and its data files.

/// Default server port
pub const DEFAULT_PORT: u16 = 5000;

/// Longest line a client may send before the connection is dropped
pub const MAX_LINE_LEN: usize = 4 * 1024;

// =============================================================================
// Telnet
// =============================================================================

/// Telnet command and option bytes used during negotiation.
pub mod telnet {
    /// Interpret As Command
    pub const IAC: u8 = 255;
    pub const DONT: u8 = 254;
    pub const DO: u8 = 253;
    pub const WONT: u8 = 252;
    pub const WILL: u8 = 251;
    /// Subnegotiation begin
    pub const SB: u8 = 250;
    /// Go ahead
    pub const GA: u8 = 249;
    /// Subnegotiation end
    pub const SE: u8 = 240;

    /// Echo option
    pub const ECHO: u8 = 1;
    /// Suppress go-ahead option
    pub const SGA: u8 = 3;

    /// Server takes over echo: the client stops echoing locally (password entry).
    pub const ECHO_OFF: [u8; 3] = [IAC, WILL, ECHO];
    /// Server gives echo back to the client.
    pub const ECHO_ON: [u8; 3] = [IAC, WONT, ECHO];
    /// Server will not send go-ahead markers.
    pub const SUPPRESS_GA: [u8; 3] = [IAC, WILL, SGA];
}

// =============================================================================
// Directions
// =============================================================================

/// Every exit direction a room can carry, in display order.
pub const DIRECTIONS: [&str; 10] = [
    "north", "east", "south", "west", "northeast", "northwest", "southeast", "southwest", "up",
    "down",
];

/// Expand a typed direction (`n`, `ne`, `north`, ...) to its canonical name.
pub fn expand_direction(input: &str) -> Option<&'static str> {
    let dir = match input.to_lowercase().as_str() {
        "n" | "north" => "north",
        "s" | "south" => "south",
        "e" | "east" => "east",
        "w" | "west" => "west",
        "ne" | "northeast" => "northeast",
        "nw" | "northwest" => "northwest",
        "se" | "southeast" => "southeast",
        "sw" | "southwest" => "southwest",
        "u" | "up" => "up",
        "d" | "down" => "down",
        _ => return None,
    };
    Some(dir)
}

/// The direction that leads back through an exit.
pub fn reverse_direction(direction: &str) -> Option<&'static str> {
    let rev = match direction {
        "north" => "south",
        "south" => "north",
        "east" => "west",
        "west" => "east",
        "northeast" => "southwest",
        "northwest" => "southeast",
        "southeast" => "northwest",
        "southwest" => "northeast",
        "up" => "down",
        "down" => "up",
        _ => return None,
    };
    Some(rev)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_direction() {
        assert_eq!(expand_direction("n"), Some("north"));
        assert_eq!(expand_direction("SW"), Some("southwest"));
        assert_eq!(expand_direction("sideways"), None);
    }

    #[test]
    fn test_reverse_direction_pairs() {
        for dir in DIRECTIONS {
            let rev = reverse_direction(dir).unwrap();
            assert_eq!(reverse_direction(rev), Some(dir));
        }
    }
}
