/**
 * How long (milliseconds) to wait before reconnecting after the connection was lost or could not
 * be established. This is a fixed delay, there is no exponential backoff.
 */
pub const RECONNECT_DELAY: u64 = 3000;

/**
 * The endpoint used when no config file exists yet. This is where the ESP32 firmware serves its
 * websocket by default.
 */
pub const DEFAULT_ENDPOINT: &str = "ws://192.168.1.70/ws";

/**
 * Distance (centimeters) below which something is considered to be nearby.
 */
pub const DEFAULT_PROXIMITY_THRESHOLD: f64 = 10.0;

/**
 * How many snapshots may be buffered for a single subscriber before publishing waits for it.
 */
pub const SUBSCRIPTION_BUFFER: usize = 64;
