//! Minimal VISCA gateway
//!
//! Run with: cargo run --example gateway [BIND_IP] [CAMERA_ADDRESS ...]
//!
//! Examples:
//!   cargo run --example gateway                             # 0.0.0.0, one default camera
//!   cargo run --example gateway 0.0.0.0 192.168.1.77        # camera on derived port 1077
//!   cargo run --example gateway 127.0.0.1 10.0.31.45 10.0.31.46
//!
//! Each camera address is served on its derived UDP port. Point a VISCA
//! controller at the gateway IP and the camera's port; pan-tilt commands
//! are logged by the default actuator.

use std::net::IpAddr;

use tracing_subscriber::EnvFilter;
use visca_gateway::{Dispatcher, GatewayConfig, TracingActuator};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);

    let bind_ip: IpAddr = args.next().unwrap_or_else(|| "0.0.0.0".into()).parse()?;

    let mut config = GatewayConfig::default().bind(bind_ip);
    for address in args {
        config = config.camera(address);
    }
    if config.cameras.is_empty() {
        config = config.camera("192.168.1.77");
    }

    let mut dispatcher = Dispatcher::new(config, Box::new(TracingActuator));
    dispatcher.register_cameras().await?;

    tracing::info!(endpoints = dispatcher.registry().len(), "gateway running");

    dispatcher.run().await?;
    Ok(())
}
