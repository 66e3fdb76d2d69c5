//! Per-connection session: state machine, dispatch, and send serialization.
//!
//! One session exists per accepted TCP connection. The reader loop decodes
//! frames and dispatches them against the state machine:
//!
//! ```text
//! ┌─────────────────┐  VDSM_REQUEST_HELLO   ┌────────┐  VDSM_SEND_BYE  ┌─────────┐
//! │ Unauthenticated │──────────────────────>│ Active │────────────────>│ Closing │
//! └─────────────────┘                       └────────┘                 └─────────┘
//! ```
//!
//! Requests yield exactly one response (echoing the request id);
//! notifications yield none and are handled inline on the reader task, so
//! responses stay FIFO. Unsolicited frames (announcements, vanish) carry
//! message id 0 and are produced by the announcer task or by registry
//! mutations, never before the hello response is on the wire.
//!
//! All writes funnel through the session's single [`FrameSender`], an async
//! mutex around the socket's write half. Frames therefore interleave only
//! at record boundaries, and no pacing delays are needed between the hello
//! response and the announcements that follow it.

use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{
    net::{TcpStream, tcp::OwnedWriteHalf},
    sync::watch,
};
use tracing::{debug, info, warn};
use vdc_proto::{
    Dsuid, PropMap, ProtocolError, VDC_API_VERSION, build_property_tree, property_tree_to_map,
    read_frame, write_frame,
    wire::{self, Message, MessageType, ResultCode},
};

use crate::{
    device::DimMode,
    host::HostShared,
    registry::lock_device,
};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Connected, handshake not yet completed.
    Unauthenticated,
    /// Handshake completed; serving requests and notifications.
    Active,
    /// Bye received or fatal error; no further inbound is processed.
    Closing,
}

/// Serialized writer over the socket's write half.
///
/// The reader task (responses), the announcer task, and registry mutations
/// (announce/vanish) all send through this one sender; the async mutex
/// guarantees frames interleave only at record boundaries.
struct FrameSender {
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
}

impl FrameSender {
    async fn send(&self, message: &Message) -> Result<(), ProtocolError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, message).await
    }
}

/// Shared face of a session, handed to the host for unsolicited sends.
pub(crate) struct SessionHandle {
    sender: FrameSender,
    active: AtomicBool,
    announced: Mutex<HashSet<Dsuid>>,
}

impl SessionHandle {
    fn new(writer: OwnedWriteHalf) -> Self {
        Self {
            sender: FrameSender {
                writer: tokio::sync::Mutex::new(writer),
            },
            active: AtomicBool::new(false),
            announced: Mutex::new(HashSet::new()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    async fn send(&self, message: &Message) -> Result<(), ProtocolError> {
        self.sender.send(message).await
    }

    /// Record a device as announced. Returns `false` if it already was;
    /// each device is announced at most once per session, even when
    /// `add_device` races the announcer task.
    fn mark_announced(&self, dsuid: &Dsuid) -> bool {
        self.announced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dsuid.clone())
    }

    /// Forget a device's announcement, so re-adding it announces again.
    fn clear_announced(&self, dsuid: &Dsuid) {
        self.announced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(dsuid);
    }

    /// Send a device announcement unless the session is gone or the device
    /// was already announced.
    pub(crate) async fn announce_device(
        &self,
        device: &Dsuid,
        vdc: &Dsuid,
    ) -> Result<(), ProtocolError> {
        if !self.is_active() || !self.mark_announced(device) {
            return Ok(());
        }
        self.send(&Message::announce_device(device, vdc)).await?;
        info!(dsuid = %device, "announced device");
        Ok(())
    }

    /// Send a vanish frame unless the session is gone.
    ///
    /// The device is dropped from the announced set either way, so a later
    /// re-add of the same dSUID is announced afresh.
    pub(crate) async fn send_vanish(&self, device: &Dsuid) -> Result<(), ProtocolError> {
        self.clear_announced(device);
        if !self.is_active() {
            return Ok(());
        }
        self.send(&Message::vanish(device)).await?;
        info!(dsuid = %device, "sent vanish");
        Ok(())
    }
}

/// Announce the vDC and every registered device.
///
/// Spawned once per session, after the hello response has been fully
/// written. A send failure aborts the announcement phase but leaves the
/// session running; devices registered later are announced by `add_device`.
async fn announce_all(handle: Arc<SessionHandle>, shared: Arc<HostShared>) {
    if !handle.is_active() {
        return;
    }

    let vdc = shared.vdc_dsuid().clone();
    if let Err(error) = handle.send(&Message::announce_vdc(&vdc)).await {
        warn!(%error, "failed to announce vDC; aborting announcements");
        return;
    }
    info!(dsuid = %vdc, "announced vDC");

    for dsuid in shared.registry().dsuids() {
        if !handle.is_active() {
            return;
        }
        if let Err(error) = handle.announce_device(&dsuid, &vdc).await {
            warn!(%error, dsuid = %dsuid, "failed to announce device; aborting announcements");
            return;
        }
    }
}

/// Serve one connection until the peer leaves, a fatal error occurs, or the
/// host shuts down.
pub(crate) async fn run(
    stream: TcpStream,
    shared: Arc<HostShared>,
    mut shutdown: watch::Receiver<bool>,
) {
    let peer = stream.peer_addr().ok();
    let (mut reader, writer) = stream.into_split();
    let handle = Arc::new(SessionHandle::new(writer));
    let mut session = Session::new(Arc::clone(&handle), shared.clone());

    info!(?peer, "vdSM connected");

    loop {
        let next = tokio::select! {
            result = read_frame(&mut reader) => result,
            _ = shutdown.changed() => {
                debug!("host shutdown requested");
                break;
            }
        };

        match next {
            Ok(Some(message)) => {
                if let Err(error) = session.handle_message(message).await {
                    warn!(%error, "failed to handle message");
                    break;
                }
                if session.state == SessionState::Closing {
                    break;
                }
            }
            Ok(None) => {
                debug!("peer closed the connection");
                break;
            }
            Err(error) => {
                warn!(%error, "fatal protocol error");
                break;
            }
        }
    }

    handle.deactivate();
    shared.clear_session(&handle);
    info!(?peer, vdsm = ?session.peer_dsuid, "session ended");
}

struct Session {
    state: SessionState,
    peer_dsuid: Option<Dsuid>,
    announcer_spawned: bool,
    handle: Arc<SessionHandle>,
    shared: Arc<HostShared>,
}

impl Session {
    fn new(handle: Arc<SessionHandle>, shared: Arc<HostShared>) -> Self {
        Self {
            state: SessionState::Unauthenticated,
            peer_dsuid: None,
            announcer_spawned: false,
            handle,
            shared,
        }
    }

    async fn respond(&self, message: Message) -> Result<(), ProtocolError> {
        self.handle.send(&message).await
    }

    async fn handle_message(&mut self, message: Message) -> Result<(), ProtocolError> {
        let message_id = message.id();
        let Some(kind) = message.message_type() else {
            debug!(tag = message.r#type, "unknown message type");
            return self
                .respond(Message::generic_response(
                    message_id,
                    ResultCode::ErrNotImplemented,
                    Some("unknown message type".to_owned()),
                ))
                .await;
        };

        match self.state {
            SessionState::Unauthenticated => {
                if kind == MessageType::VdsmRequestHello {
                    self.handle_hello(message_id, message.vdsm_request_hello)
                        .await
                } else {
                    debug!(?kind, "message before handshake");
                    self.respond(Message::generic_response(
                        message_id,
                        ResultCode::ErrNotImplemented,
                        Some("handshake required".to_owned()),
                    ))
                    .await
                }
            }
            SessionState::Active => self.dispatch_active(kind, message_id, message).await,
            SessionState::Closing => Ok(()),
        }
    }

    async fn dispatch_active(
        &mut self,
        kind: MessageType,
        message_id: u32,
        message: Message,
    ) -> Result<(), ProtocolError> {
        match kind {
            MessageType::VdsmRequestHello => {
                self.handle_hello(message_id, message.vdsm_request_hello)
                    .await
            }
            MessageType::VdsmRequestGetProperty => {
                self.handle_get_property(message_id, message.vdsm_request_get_property)
                    .await
            }
            MessageType::VdsmRequestSetProperty => {
                self.handle_set_property(message_id, message.vdsm_request_set_property)
                    .await
            }
            MessageType::VdsmSendPing => {
                let dsuid = message
                    .vdsm_send_ping
                    .and_then(|ping| ping.dsuid)
                    .unwrap_or_default();
                self.respond(Message::pong(message_id, &dsuid)).await
            }
            MessageType::VdsmSendBye => {
                info!(vdsm = ?self.peer_dsuid, "vdSM said bye");
                self.state = SessionState::Closing;
                Ok(())
            }
            MessageType::VdsmRequestGenericRequest => {
                self.handle_generic_request(message_id, message.vdsm_request_generic_request)
                    .await
            }
            MessageType::VdsmNotificationCallScene
            | MessageType::VdsmNotificationSaveScene
            | MessageType::VdsmNotificationUndoScene
            | MessageType::VdsmNotificationIdentify
            | MessageType::VdsmNotificationDimChannel
            | MessageType::VdsmNotificationSetOutputChannelValue => {
                self.handle_notification(kind, &message);
                Ok(())
            }
            MessageType::GenericResponse
            | MessageType::VdcResponseHello
            | MessageType::VdcResponseGetProperty
            | MessageType::VdcSendPong
            | MessageType::VdcSendAnnounceDevice
            | MessageType::VdcSendVanish
            | MessageType::VdcSendAnnounceVdc => {
                debug!(?kind, "unexpected host-emitted kind from peer");
                self.respond(Message::generic_response(
                    message_id,
                    ResultCode::ErrNotImplemented,
                    None,
                ))
                .await
            }
        }
    }

    async fn handle_hello(
        &mut self,
        message_id: u32,
        hello: Option<wire::VdsmRequestHello>,
    ) -> Result<(), ProtocolError> {
        let Some(hello) = hello else {
            return self
                .respond(Message::generic_response(
                    message_id,
                    ResultCode::ErrMissingSubmessage,
                    Some("hello payload missing".to_owned()),
                ))
                .await;
        };

        let Some(raw_dsuid) = hello.dsuid else {
            return self
                .respond(Message::generic_response(
                    message_id,
                    ResultCode::ErrMissingData,
                    Some("vdSM dSUID missing".to_owned()),
                ))
                .await;
        };

        let peer_dsuid = match Dsuid::new(raw_dsuid) {
            Ok(dsuid) => dsuid,
            Err(error) => {
                warn!(%error, "rejecting hello");
                return self
                    .respond(Message::generic_response(
                        message_id,
                        ResultCode::ErrInvalidValueType,
                        Some(error.to_string()),
                    ))
                    .await;
            }
        };

        let api_version = hello.api_version.unwrap_or(0);
        info!(vdsm = %peer_dsuid, api_version, "hello from vdSM");
        if api_version > VDC_API_VERSION {
            // Version-tentative: served anyway, no behavioral divergence.
            warn!(
                api_version,
                supported = VDC_API_VERSION,
                "peer requests a newer api version"
            );
        }

        self.peer_dsuid = Some(peer_dsuid);
        self.respond(Message::hello_response(message_id, self.shared.dsuid()))
            .await?;

        self.state = SessionState::Active;
        self.handle.activate();
        self.shared.set_session(Arc::clone(&self.handle));

        // The hello response is on the wire; unsolicited frames may follow.
        if !self.announcer_spawned {
            self.announcer_spawned = true;
            tokio::spawn(announce_all(
                Arc::clone(&self.handle),
                Arc::clone(&self.shared),
            ));
        }

        Ok(())
    }

    async fn handle_get_property(
        &self,
        message_id: u32,
        request: Option<wire::VdsmRequestGetProperty>,
    ) -> Result<(), ProtocolError> {
        let request = request.unwrap_or_default();
        let target = request.dsuid.unwrap_or_default();

        // The query MAY narrow the returned subtree; the full basic set is
        // returned, which never over-discloses beyond it.
        let response = match self.lookup_properties(&target) {
            Some(properties) => {
                Message::get_property_response(message_id, build_property_tree(&properties))
            }
            None => {
                debug!(%target, "get-property for unknown target");
                Message::generic_response(
                    message_id,
                    ResultCode::ErrNotFound,
                    Some(format!("no entity with dSUID {target}")),
                )
            }
        };
        self.respond(response).await
    }

    /// Resolve a get-property target to its property tree.
    fn lookup_properties(&self, target: &str) -> Option<PropMap> {
        let target = Dsuid::new(target).ok()?;
        if target == *self.shared.vdc_dsuid() {
            Some(self.shared.vdc_properties())
        } else if target == *self.shared.dsuid() {
            Some(self.shared.host_properties())
        } else {
            let device = self.shared.registry().lookup(&target)?;
            let tree = lock_device(&device).property_tree();
            Some(tree)
        }
    }

    async fn handle_set_property(
        &self,
        message_id: u32,
        request: Option<wire::VdsmRequestSetProperty>,
    ) -> Result<(), ProtocolError> {
        let request = request.unwrap_or_default();
        let target = request.dsuid.unwrap_or_default();

        let device = Dsuid::new(target.as_str())
            .ok()
            .and_then(|dsuid| self.shared.registry().lookup(&dsuid));
        let Some(device) = device else {
            debug!(%target, "set-property for unknown target");
            return self
                .respond(Message::generic_response(
                    message_id,
                    ResultCode::ErrNotFound,
                    Some(format!("no device with dSUID {target}")),
                ))
                .await;
        };

        let updates = property_tree_to_map(&request.properties);
        let outcome = {
            let mut device = lock_device(&device);
            // First failure abandons the remaining entries of this request.
            updates
                .iter()
                .try_for_each(|(name, prop)| device.set_property(name, prop))
        };

        let response = match outcome {
            Ok(()) => Message::generic_response(message_id, ResultCode::ErrOk, None),
            Err(error) => {
                warn!(%error, "set-property failed");
                Message::generic_response(
                    message_id,
                    ResultCode::ErrInvalidValueType,
                    Some(error.to_string()),
                )
            }
        };
        self.respond(response).await
    }

    async fn handle_generic_request(
        &self,
        message_id: u32,
        request: Option<wire::VdsmRequestGenericRequest>,
    ) -> Result<(), ProtocolError> {
        let request = request.unwrap_or_default();
        let methodname = request.methodname.unwrap_or_default();

        let Some(handler) = self.shared.method(&methodname) else {
            info!(%methodname, "generic request without registered handler");
            return self
                .respond(Message::generic_response(
                    message_id,
                    ResultCode::ErrNotImplemented,
                    Some(format!("method {methodname:?} not implemented")),
                ))
                .await;
        };

        let params = property_tree_to_map(&request.params);
        let response = match handler(&params) {
            Ok(()) => Message::generic_response(message_id, ResultCode::ErrOk, None),
            Err(error) => {
                warn!(%methodname, %error, "generic request failed");
                Message::generic_response(message_id, error.code(), Some(error.to_string()))
            }
        };
        self.respond(response).await
    }

    /// Dispatch a notification. Unknown and malformed dSUIDs are silently
    /// skipped; notifications never produce a response.
    fn handle_notification(&self, kind: MessageType, message: &Message) {
        match kind {
            MessageType::VdsmNotificationCallScene => {
                let Some(notification) = &message.vdsm_send_call_scene else {
                    return;
                };
                let Some(scene) = scene_number(notification.scene) else {
                    return;
                };
                let force = notification.force.unwrap_or(false);
                for raw in &notification.dsuid {
                    self.with_device(raw, |device| {
                        device.call_scene(scene, force);
                        info!(scene, name = device.name(), "called scene");
                    });
                }
            }
            MessageType::VdsmNotificationSaveScene => {
                let Some(notification) = &message.vdsm_send_save_scene else {
                    return;
                };
                let Some(scene) = scene_number(notification.scene) else {
                    return;
                };
                for raw in &notification.dsuid {
                    self.with_device(raw, |device| {
                        device.save_scene(scene);
                        info!(scene, name = device.name(), "saved scene");
                    });
                }
            }
            MessageType::VdsmNotificationUndoScene => {
                let Some(notification) = &message.vdsm_send_undo_scene else {
                    return;
                };
                let Some(scene) = scene_number(notification.scene) else {
                    return;
                };
                for raw in &notification.dsuid {
                    self.with_device(raw, |device| {
                        device.undo_scene(scene);
                        info!(scene, name = device.name(), "undid scene");
                    });
                }
            }
            MessageType::VdsmNotificationIdentify => {
                let Some(notification) = &message.vdsm_send_identify else {
                    return;
                };
                for raw in &notification.dsuid {
                    self.with_device(raw, |device| {
                        device.identify();
                        info!(name = device.name(), "identify requested");
                    });
                }
            }
            MessageType::VdsmNotificationDimChannel => {
                let Some(notification) = &message.vdsm_send_dim_channel else {
                    return;
                };
                let Some(mode) = DimMode::from_wire(notification.mode.unwrap_or(0)) else {
                    debug!(mode = ?notification.mode, "dim notification with unknown mode");
                    return;
                };
                let channel = u32::try_from(notification.channel.unwrap_or(0)).unwrap_or(0);
                for raw in &notification.dsuid {
                    self.with_device(raw, |device| {
                        device.dim_channel(mode, channel);
                        info!(?mode, channel, name = device.name(), "dimmed channel");
                    });
                }
            }
            MessageType::VdsmNotificationSetOutputChannelValue => {
                let Some(notification) = &message.vdsm_send_output_channel_value else {
                    return;
                };
                let value = notification.value.unwrap_or(0.0);
                // Schema default: an absent apply_now means apply immediately.
                let apply_now = notification.apply_now.unwrap_or(true);
                for raw in &notification.dsuid {
                    self.with_device(raw, |device| {
                        device.set_output_value(value, apply_now);
                        info!(value, name = device.name(), "set output value");
                    });
                }
            }
            _ => {}
        }
    }

    /// Run `apply` on the addressed device, skipping unknown targets.
    fn with_device(&self, raw: &str, apply: impl FnOnce(&mut crate::device::Device)) {
        let Ok(dsuid) = Dsuid::new(raw) else {
            debug!(raw, "skipping malformed dSUID in notification");
            return;
        };
        let Some(device) = self.shared.registry().lookup(&dsuid) else {
            debug!(%dsuid, "skipping unknown device in notification");
            return;
        };
        apply(&mut lock_device(&device));
    }
}

/// Scene numbers live in 0..=126; anything else is ignored.
fn scene_number(raw: Option<i32>) -> Option<u8> {
    let scene = u8::try_from(raw.unwrap_or(0)).ok()?;
    (scene <= 126).then_some(scene)
}
