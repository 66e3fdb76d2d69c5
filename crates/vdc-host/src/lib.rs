//! digitalSTROM vDC host.
//!
//! Server side of the vDC API: accepts a vdSM (controller) connection,
//! completes the hello handshake, advertises its vDC and devices, then
//! serves property reads/writes, control notifications (scenes, output
//! values, dimming, identify), and keep-alives for the session lifetime.
//!
//! # Architecture
//!
//! ```text
//! VdcHost (accept loop, one session at a time)
//!   ├─ HostShared
//!   │    ├─ DeviceRegistry ── SharedDevice ── Device + DeviceBehavior
//!   │    └─ generic-request method handlers
//!   └─ session (per connection)
//!        ├─ reader/dispatcher task (responses, notifications)
//!        ├─ announcer task (unsolicited frames after hello)
//!        └─ FrameSender (single serialized writer)
//! ```
//!
//! The wire format (framing, schema, property trees) lives in [`vdc_proto`].
//!
//! # Example
//!
//! ```no_run
//! use vdc_host::{Device, DeviceClass, HostConfig, VdcHost};
//! use vdc_proto::Dsuid;
//!
//! # async fn serve() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HostConfig::new(
//!     Dsuid::new("198C6F8CE1D511E78D1C7C669D5A4F48B0")?,
//!     Dsuid::new("198C6F8CE1D511E78D1C7C669D5A4F48B1")?,
//! );
//! let host = VdcHost::bind(config).await?;
//!
//! let handle = host.handle();
//! handle
//!     .add_device(Device::new(
//!         Dsuid::new("198C6F8CE1D511E78D1C7C669D5A4F48B2")?,
//!         "Living Room Light",
//!         "Demo Dimmer",
//!         "vdc:demo-dimmer",
//!         DeviceClass::Light,
//!     ))
//!     .await;
//!
//! host.run().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod device;
mod error;
mod host;
mod registry;
mod session;

pub use device::{
    Device, DeviceBehavior, DeviceClass, DeviceError, DimMode, Output, StandardBehavior,
};
pub use error::HostError;
pub use host::{DEFAULT_PORT, HostConfig, HostHandle, MethodError, MethodHandler, VdcHost};
pub use registry::{DeviceRegistry, SharedDevice, lock_device};
