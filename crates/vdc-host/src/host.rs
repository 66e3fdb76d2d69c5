//! vDC host: listener, shared state, and the public control handle.
//!
//! [`VdcHost`] binds the listening socket and serves vdSM sessions one at a
//! time; [`HostHandle`] is the cloneable control surface for device and
//! lifecycle management from any task. The host's `(dSUID, vDC dSUID)` pair
//! is fixed for the process lifetime.

use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use thiserror::Error;
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};
use vdc_proto::{Dsuid, PropMap, wire::ResultCode};

use crate::{
    device::Device,
    error::HostError,
    registry::{DeviceRegistry, SharedDevice},
    session::{self, SessionHandle},
};

/// Default TCP port of the vDC API.
pub const DEFAULT_PORT: u16 = 8444;

const VDC_NAME: &str = "Virtual Device Connector";
const VDC_MODEL: &str = "vdc-host";
const VDC_MODEL_UID: &str = "org.vdc-host.generic";
const HOST_NAME: &str = "vDC host";
const HOST_MODEL: &str = "vdc-host";

/// Host construction parameters.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// dSUID of the vDC host itself.
    pub dsuid: Dsuid,
    /// dSUID of the vDC aggregating the devices.
    pub vdc_dsuid: Dsuid,
    /// TCP port to listen on; 0 binds an ephemeral port.
    pub port: u16,
}

impl HostConfig {
    /// Configuration with the default port.
    #[must_use]
    pub fn new(dsuid: Dsuid, vdc_dsuid: Dsuid) -> Self {
        Self {
            dsuid,
            vdc_dsuid,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Failure reported by a registered generic-request method.
///
/// Carries the wire result code to answer with plus a description.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct MethodError {
    code: ResultCode,
    message: String,
}

impl MethodError {
    /// Failure with an explicit result code.
    #[must_use]
    pub fn new(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Wire code to answer with.
    #[must_use]
    pub fn code(&self) -> ResultCode {
        self.code
    }
}

/// Handler invoked for `VDSM_REQUEST_GENERIC_REQUEST` by method name.
///
/// Receives the request parameters lowered to a property map. Handlers run
/// inline on the session's reader task and must not block.
pub type MethodHandler = dyn Fn(&PropMap) -> Result<(), MethodError> + Send + Sync;

/// State shared between the listener, the active session, and host handles.
pub(crate) struct HostShared {
    dsuid: Dsuid,
    registry: DeviceRegistry,
    methods: RwLock<HashMap<String, Arc<MethodHandler>>>,
    session: Mutex<Option<Arc<SessionHandle>>>,
}

impl HostShared {
    fn new(dsuid: Dsuid, vdc_dsuid: Dsuid) -> Self {
        Self {
            dsuid,
            registry: DeviceRegistry::new(vdc_dsuid),
            methods: RwLock::new(HashMap::new()),
            session: Mutex::new(None),
        }
    }

    pub(crate) fn dsuid(&self) -> &Dsuid {
        &self.dsuid
    }

    pub(crate) fn vdc_dsuid(&self) -> &Dsuid {
        self.registry.vdc_dsuid()
    }

    pub(crate) fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub(crate) fn register_method(&self, name: String, handler: Arc<MethodHandler>) {
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, handler);
    }

    /// Handler for a method name, cloned out so no lock is held while the
    /// handler runs.
    pub(crate) fn method(&self, name: &str) -> Option<Arc<MethodHandler>> {
        self.methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub(crate) fn set_session(&self, handle: Arc<SessionHandle>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Drop the stored session, but only if it still is this one.
    pub(crate) fn clear_session(&self, handle: &Arc<SessionHandle>) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            *session = None;
        }
    }

    pub(crate) fn active_session(&self) -> Option<Arc<SessionHandle>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|handle| handle.is_active())
            .cloned()
    }

    /// Fixed descriptive tree of the vDC.
    pub(crate) fn vdc_properties(&self) -> PropMap {
        PropMap::new()
            .with("dSUID", self.vdc_dsuid().as_str())
            .with("type", "vDC")
            .with("name", VDC_NAME)
            .with("model", VDC_MODEL)
            .with("modelUID", VDC_MODEL_UID)
    }

    /// Fixed descriptive tree of the host.
    pub(crate) fn host_properties(&self) -> PropMap {
        PropMap::new()
            .with("dSUID", self.dsuid.as_str())
            .with("type", "vDChost")
            .with("name", HOST_NAME)
            .with("model", HOST_MODEL)
    }
}

/// The vDC host server.
///
/// Binds the listener at construction; [`run`](Self::run) then serves one
/// session at a time until [`HostHandle::stop`] is called. Session-fatal
/// errors close the session and loop back to accept; only a listener
/// failure is host-fatal.
pub struct VdcHost {
    shared: Arc<HostShared>,
    listener: TcpListener,
    shutdown: watch::Sender<bool>,
}

impl VdcHost {
    /// Bind the listening socket on all IPv4 interfaces.
    ///
    /// # Errors
    ///
    /// - [`HostError::Bind`] if the port cannot be bound
    pub async fn bind(config: HostConfig) -> Result<Self, HostError> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port))
            .await
            .map_err(|source| HostError::Bind {
                port: config.port,
                source,
            })?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(HostShared::new(config.dsuid, config.vdc_dsuid)),
            listener,
            shutdown,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, HostError> {
        Ok(self.listener.local_addr()?)
    }

    /// Cloneable control handle for device and lifecycle management.
    #[must_use]
    pub fn handle(&self) -> HostHandle {
        HostHandle {
            shared: Arc::clone(&self.shared),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Serve sessions until stopped.
    ///
    /// Connections are accepted one at a time: while a session runs the
    /// listener does not accept, and a finished session loops back to
    /// accept.
    pub async fn run(self) -> Result<(), HostError> {
        info!(
            host = %self.shared.dsuid(),
            vdc = %self.shared.vdc_dsuid(),
            addr = %self.local_addr()?,
            "vDC host listening"
        );

        let mut shutdown = self.shutdown.subscribe();
        loop {
            let accepted = tokio::select! {
                accepted = self.listener.accept() => accepted,
                _ = shutdown.changed() => break,
            };

            match accepted {
                Ok((stream, _)) => {
                    session::run(stream, Arc::clone(&self.shared), self.shutdown.subscribe())
                        .await;
                }
                Err(error) => warn!(%error, "accept failed"),
            }
        }

        info!("vDC host stopped");
        Ok(())
    }
}

/// Cloneable handle to a host, usable from any task.
#[derive(Clone)]
pub struct HostHandle {
    shared: Arc<HostShared>,
    shutdown: watch::Sender<bool>,
}

impl HostHandle {
    /// Add a device; it is announced immediately when a session is active.
    pub async fn add_device(&self, device: Device) -> SharedDevice {
        let dsuid = device.dsuid().clone();
        info!(%dsuid, name = device.name(), "adding device");
        let shared_device = self.shared.registry().add(device);

        if let Some(session) = self.shared.active_session() {
            if let Err(error) = session
                .announce_device(&dsuid, self.shared.vdc_dsuid())
                .await
            {
                warn!(%error, %dsuid, "failed to announce added device");
            }
        }

        shared_device
    }

    /// Remove a device, emitting a vanish frame first when a session is
    /// active. Returns `false` if no such device is registered.
    pub async fn remove_device(&self, dsuid: &Dsuid) -> bool {
        if self.shared.registry().lookup(dsuid).is_none() {
            return false;
        }

        if let Some(session) = self.shared.active_session() {
            if let Err(error) = session.send_vanish(dsuid).await {
                warn!(%error, %dsuid, "failed to send vanish");
            }
        }

        let removed = self.shared.registry().remove(dsuid).is_some();
        if removed {
            info!(%dsuid, "removed device");
        }
        removed
    }

    /// Registered device by dSUID.
    #[must_use]
    pub fn device(&self, dsuid: &Dsuid) -> Option<SharedDevice> {
        self.shared.registry().lookup(dsuid)
    }

    /// Register a handler for a generic-request method name.
    pub fn register_method(
        &self,
        name: impl Into<String>,
        handler: impl Fn(&PropMap) -> Result<(), MethodError> + Send + Sync + 'static,
    ) {
        self.shared.register_method(name.into(), Arc::new(handler));
    }

    /// Stop the host: the listener and any active session shut down.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}
