//! Actuator seam
//!
//! The protocol engine translates decoded pan-tilt commands into calls on
//! this trait. The physical backend (serial VISCA, ONVIF PTZ, a motor
//! driver) lives behind it and is out of scope for the gateway itself.
//!
//! Conventions carried over from the wire protocol:
//! - `vertical`/`horizontal` are -1, 0 or +1 (down/left, stop, up/right)
//! - pan positions are 5 raw nibble-packed bytes, tilt positions 4,
//!   passed through unmodified

/// Semantic pan/tilt operations produced by the protocol engine
pub trait Actuator: Send {
    /// Continuous drive in the given direction at the given speeds
    fn drive(&mut self, vertical: i8, horizontal: i8, pan_speed: u8, tilt_speed: u8);

    /// Move to an absolute pan/tilt position
    fn absolute_move(&mut self, speed: u8, pan: [u8; 5], tilt: [u8; 4]);

    /// Move by a relative pan/tilt offset
    fn relative_move(&mut self, speed: u8, pan: [u8; 5], tilt: [u8; 4]);

    /// Return to the home position
    fn home(&mut self);

    /// Reset the pan/tilt unit
    fn reset(&mut self);

    /// Set a movement limit for the given position selector
    fn limit_set(&mut self, position: u8, pan: [u8; 5], tilt: [u8; 4]);

    /// Clear the movement limit for the given position selector
    fn limit_clear(&mut self, position: u8);

    /// Select the acceleration ramp curve (1-3)
    fn ramp_curve(&mut self, value: u8);

    /// Enable (2) or disable (3) pan-tilt slow mode
    fn slow_mode(&mut self, value: u8);
}

/// Default actuator that logs each operation and does nothing else
///
/// Useful as a stand-in while bringing up a deployment, and in the demos.
#[derive(Debug, Default)]
pub struct TracingActuator;

impl Actuator for TracingActuator {
    fn drive(&mut self, vertical: i8, horizontal: i8, pan_speed: u8, tilt_speed: u8) {
        tracing::info!(vertical, horizontal, pan_speed, tilt_speed, "actuator: drive");
    }

    fn absolute_move(&mut self, speed: u8, pan: [u8; 5], tilt: [u8; 4]) {
        tracing::info!(speed, pan = ?pan, tilt = ?tilt, "actuator: absolute move");
    }

    fn relative_move(&mut self, speed: u8, pan: [u8; 5], tilt: [u8; 4]) {
        tracing::info!(speed, pan = ?pan, tilt = ?tilt, "actuator: relative move");
    }

    fn home(&mut self) {
        tracing::info!("actuator: home");
    }

    fn reset(&mut self) {
        tracing::info!("actuator: reset");
    }

    fn limit_set(&mut self, position: u8, pan: [u8; 5], tilt: [u8; 4]) {
        tracing::info!(position, pan = ?pan, tilt = ?tilt, "actuator: limit set");
    }

    fn limit_clear(&mut self, position: u8) {
        tracing::info!(position, "actuator: limit clear");
    }

    fn ramp_curve(&mut self, value: u8) {
        tracing::info!(value, "actuator: ramp curve");
    }

    fn slow_mode(&mut self, value: u8) {
        tracing::info!(value, "actuator: slow mode");
    }
}
