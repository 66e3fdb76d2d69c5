//! Hand-annotated prost mirror of `proto/genericvdc.proto`.
//!
//! The schema file is the authority; these structs replicate it field for
//! field (proto2 semantics, explicit field presence via `Option`). Keeping
//! the mirror by hand avoids a protoc build-time dependency; the round-trip
//! tests in `tests/frame_properties.rs` pin the wire layout.
//!
//! The envelope is a discriminated union: [`Message::type`](Message) selects
//! the variant and exactly one of the optional sub-messages is populated.
//! Requests echo their `message_id` in the response; notifications and
//! unsolicited frames carry id 0.

use crate::Dsuid;

/// Message discriminator tag.
///
/// `VDSM_*` kinds are consumed from the controller; `VDC_*` kinds and
/// [`MessageType::GenericResponse`] are emitted by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    /// Generic success/error reply to any request.
    GenericResponse = 1,
    /// Session handshake request.
    VdsmRequestHello = 2,
    /// Handshake reply carrying the host dSUID.
    VdcResponseHello = 3,
    /// Property read request.
    VdsmRequestGetProperty = 4,
    /// Property read reply.
    VdcResponseGetProperty = 5,
    /// Property write request.
    VdsmRequestSetProperty = 6,
    /// Keep-alive probe.
    VdsmSendPing = 8,
    /// Keep-alive reply echoing the probe dSUID.
    VdcSendPong = 9,
    /// Unsolicited device advertisement.
    VdcSendAnnounceDevice = 10,
    /// Unsolicited revocation of a device advertisement.
    VdcSendVanish = 11,
    /// Graceful session termination; never answered.
    VdsmSendBye = 13,
    /// Scene invocation notification.
    VdsmNotificationCallScene = 14,
    /// Scene save notification.
    VdsmNotificationSaveScene = 15,
    /// Scene undo notification.
    VdsmNotificationUndoScene = 16,
    /// Device identification notification.
    VdsmNotificationIdentify = 19,
    /// Dimming notification.
    VdsmNotificationDimChannel = 22,
    /// Output channel value notification.
    VdsmNotificationSetOutputChannelValue = 23,
    /// Unsolicited vDC advertisement.
    VdcSendAnnounceVdc = 24,
    /// Method call by name.
    VdsmRequestGenericRequest = 25,
}

/// Result code carried in [`GenericResponse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ResultCode {
    /// Success.
    ErrOk = 0,
    /// Message kind not known to the peer.
    ErrMessageUnknown = 1,
    /// Peer API version cannot be served.
    ErrIncompatibleApi = 2,
    /// Addressed service is not available.
    ErrServiceNotAvailable = 3,
    /// Persistent storage exhausted.
    ErrInsufficientStorage = 4,
    /// Operation not permitted.
    ErrForbidden = 5,
    /// Message kind or method understood but not implemented.
    ErrNotImplemented = 6,
    /// Array query matched no content.
    ErrNoContentForArray = 7,
    /// Supplied value has the wrong type for the property.
    ErrInvalidValueType = 8,
    /// Expected sub-message missing from the envelope.
    ErrMissingSubmessage = 9,
    /// Required field missing from the sub-message.
    ErrMissingData = 10,
    /// Addressed entity does not exist.
    ErrNotFound = 11,
    /// Peer is not authorized for the operation.
    ErrNotAuthorized = 12,
}

/// Scalar property value; exactly one field is populated.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PropertyValue {
    /// Boolean value.
    #[prost(bool, optional, tag = "1")]
    pub v_bool: Option<bool>,
    /// Unsigned 64-bit integer value.
    #[prost(uint64, optional, tag = "2")]
    pub v_uint64: Option<u64>,
    /// Signed 64-bit integer value.
    #[prost(int64, optional, tag = "3")]
    pub v_int64: Option<i64>,
    /// IEEE-754 double value.
    #[prost(double, optional, tag = "4")]
    pub v_double: Option<f64>,
    /// UTF-8 string value.
    #[prost(string, optional, tag = "5")]
    pub v_string: Option<String>,
    /// Opaque byte sequence value.
    #[prost(bytes = "vec", optional, tag = "6")]
    pub v_bytes: Option<Vec<u8>>,
}

/// Node of the property tree: a name plus an optional value and/or children.
///
/// Sibling order is significant and preserved on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PropertyElement {
    /// Property name.
    #[prost(string, optional, tag = "1")]
    pub name: Option<String>,
    /// Scalar value, if this node carries one.
    #[prost(message, optional, tag = "2")]
    pub value: Option<PropertyValue>,
    /// Child elements, if this node is a branch.
    #[prost(message, repeated, tag = "3")]
    pub elements: Vec<PropertyElement>,
}

/// Generic success/error reply.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GenericResponse {
    /// Outcome code; see [`ResultCode`].
    #[prost(enumeration = "ResultCode", required, tag = "1")]
    pub code: i32,
    /// Optional human-readable detail.
    #[prost(string, optional, tag = "2")]
    pub description: Option<String>,
}

/// Handshake request from the vdSM.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmRequestHello {
    /// dSUID of the requesting vdSM.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
    /// API version the vdSM wants to speak.
    #[prost(uint32, optional, tag = "2")]
    pub api_version: Option<u32>,
}

/// Handshake reply from the vDC host.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdcResponseHello {
    /// dSUID of the answering host.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
}

/// Property read request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmRequestGetProperty {
    /// dSUID of the addressed entity (host, vDC, or device).
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
    /// Optional subtree filter; an empty query requests the full tree.
    #[prost(message, repeated, tag = "2")]
    pub query: Vec<PropertyElement>,
}

/// Property read reply.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdcResponseGetProperty {
    /// Resulting property tree.
    #[prost(message, repeated, tag = "1")]
    pub properties: Vec<PropertyElement>,
}

/// Property write request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmRequestSetProperty {
    /// dSUID of the addressed device.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
    /// Properties to apply, in order.
    #[prost(message, repeated, tag = "2")]
    pub properties: Vec<PropertyElement>,
}

/// Keep-alive probe.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmSendPing {
    /// Opaque probe identifier, echoed verbatim in the pong.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
}

/// Keep-alive reply.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdcSendPong {
    /// Probe identifier from the ping.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
}

/// Unsolicited vDC advertisement.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdcSendAnnounceVdc {
    /// dSUID of the advertised vDC.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
}

/// Unsolicited device advertisement.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdcSendAnnounceDevice {
    /// dSUID of the advertised device.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
    /// dSUID of the vDC owning the device.
    #[prost(string, optional, tag = "2")]
    pub vdc_dsuid: Option<String>,
}

/// Unsolicited revocation of a device advertisement.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdcSendVanish {
    /// dSUID of the vanished device.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
}

/// Graceful session termination.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmSendBye {
    /// dSUID of the departing vdSM.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
}

/// Scene invocation notification.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmNotificationCallScene {
    /// Addressed device dSUIDs.
    #[prost(string, repeated, tag = "1")]
    pub dsuid: Vec<String>,
    /// Scene number (0-126).
    #[prost(int32, optional, tag = "2")]
    pub scene: Option<i32>,
    /// Force execution past local priority; defaults to `false`.
    #[prost(bool, optional, tag = "3")]
    pub force: Option<bool>,
}

/// Scene save notification.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmNotificationSaveScene {
    /// Addressed device dSUIDs.
    #[prost(string, repeated, tag = "1")]
    pub dsuid: Vec<String>,
    /// Scene number (0-126).
    #[prost(int32, optional, tag = "2")]
    pub scene: Option<i32>,
}

/// Scene undo notification.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmNotificationUndoScene {
    /// Addressed device dSUIDs.
    #[prost(string, repeated, tag = "1")]
    pub dsuid: Vec<String>,
    /// Scene number (0-126).
    #[prost(int32, optional, tag = "2")]
    pub scene: Option<i32>,
}

/// Device identification notification.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmNotificationIdentify {
    /// Addressed device dSUIDs.
    #[prost(string, repeated, tag = "1")]
    pub dsuid: Vec<String>,
}

/// Dimming notification.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmNotificationDimChannel {
    /// Addressed device dSUIDs.
    #[prost(string, repeated, tag = "1")]
    pub dsuid: Vec<String>,
    /// Output channel; defaults to 0.
    #[prost(int32, optional, tag = "2")]
    pub channel: Option<i32>,
    /// Dim direction: +1 up, -1 down, 0 stop.
    #[prost(int32, optional, tag = "3")]
    pub mode: Option<i32>,
}

/// Output channel value notification.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmNotificationSetOutputChannelValue {
    /// Addressed device dSUIDs.
    #[prost(string, repeated, tag = "1")]
    pub dsuid: Vec<String>,
    /// Apply immediately; the schema default is `true` when absent.
    #[prost(bool, optional, tag = "2")]
    pub apply_now: Option<bool>,
    /// Output channel; defaults to 0.
    #[prost(int32, optional, tag = "3")]
    pub channel: Option<i32>,
    /// New output value.
    #[prost(double, optional, tag = "4")]
    pub value: Option<f64>,
}

/// Method call by name.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VdsmRequestGenericRequest {
    /// dSUID of the addressed entity.
    #[prost(string, optional, tag = "1")]
    pub dsuid: Option<String>,
    /// Method name to invoke.
    #[prost(string, optional, tag = "2")]
    pub methodname: Option<String>,
    /// Method parameters as a property tree.
    #[prost(message, repeated, tag = "3")]
    pub params: Vec<PropertyElement>,
}

/// Protocol envelope: a type tag, a message id, and one populated variant.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Message {
    /// Discriminator selecting which sub-message is populated.
    #[prost(enumeration = "MessageType", required, tag = "1")]
    pub r#type: i32,
    /// Request/response correlation id; 0 for notifications and unsolicited
    /// frames.
    #[prost(uint32, optional, tag = "2")]
    pub message_id: Option<u32>,

    /// Payload for [`MessageType::GenericResponse`].
    #[prost(message, optional, tag = "100")]
    pub generic_response: Option<GenericResponse>,
    /// Payload for [`MessageType::VdsmRequestHello`].
    #[prost(message, optional, tag = "101")]
    pub vdsm_request_hello: Option<VdsmRequestHello>,
    /// Payload for [`MessageType::VdcResponseHello`].
    #[prost(message, optional, tag = "102")]
    pub vdc_response_hello: Option<VdcResponseHello>,
    /// Payload for [`MessageType::VdsmRequestGetProperty`].
    #[prost(message, optional, tag = "103")]
    pub vdsm_request_get_property: Option<VdsmRequestGetProperty>,
    /// Payload for [`MessageType::VdcResponseGetProperty`].
    #[prost(message, optional, tag = "104")]
    pub vdc_response_get_property: Option<VdcResponseGetProperty>,
    /// Payload for [`MessageType::VdsmRequestSetProperty`].
    #[prost(message, optional, tag = "105")]
    pub vdsm_request_set_property: Option<VdsmRequestSetProperty>,
    /// Payload for [`MessageType::VdsmSendPing`].
    #[prost(message, optional, tag = "106")]
    pub vdsm_send_ping: Option<VdsmSendPing>,
    /// Payload for [`MessageType::VdcSendPong`].
    #[prost(message, optional, tag = "107")]
    pub vdc_send_pong: Option<VdcSendPong>,
    /// Payload for [`MessageType::VdcSendAnnounceDevice`].
    #[prost(message, optional, tag = "108")]
    pub vdc_send_announce_device: Option<VdcSendAnnounceDevice>,
    /// Payload for [`MessageType::VdcSendVanish`].
    #[prost(message, optional, tag = "109")]
    pub vdc_send_vanish: Option<VdcSendVanish>,
    /// Payload for [`MessageType::VdsmSendBye`].
    #[prost(message, optional, tag = "110")]
    pub vdsm_send_bye: Option<VdsmSendBye>,
    /// Payload for [`MessageType::VdsmNotificationCallScene`].
    #[prost(message, optional, tag = "111")]
    pub vdsm_send_call_scene: Option<VdsmNotificationCallScene>,
    /// Payload for [`MessageType::VdsmNotificationSaveScene`].
    #[prost(message, optional, tag = "112")]
    pub vdsm_send_save_scene: Option<VdsmNotificationSaveScene>,
    /// Payload for [`MessageType::VdsmNotificationUndoScene`].
    #[prost(message, optional, tag = "113")]
    pub vdsm_send_undo_scene: Option<VdsmNotificationUndoScene>,
    /// Payload for [`MessageType::VdsmNotificationIdentify`].
    #[prost(message, optional, tag = "114")]
    pub vdsm_send_identify: Option<VdsmNotificationIdentify>,
    /// Payload for [`MessageType::VdsmNotificationDimChannel`].
    #[prost(message, optional, tag = "115")]
    pub vdsm_send_dim_channel: Option<VdsmNotificationDimChannel>,
    /// Payload for [`MessageType::VdsmNotificationSetOutputChannelValue`].
    #[prost(message, optional, tag = "116")]
    pub vdsm_send_output_channel_value: Option<VdsmNotificationSetOutputChannelValue>,
    /// Payload for [`MessageType::VdcSendAnnounceVdc`].
    #[prost(message, optional, tag = "117")]
    pub vdc_send_announce_vdc: Option<VdcSendAnnounceVdc>,
    /// Payload for [`MessageType::VdsmRequestGenericRequest`].
    #[prost(message, optional, tag = "118")]
    pub vdsm_request_generic_request: Option<VdsmRequestGenericRequest>,
}

impl Message {
    /// Decoded type tag. `None` if the peer sent a tag this schema does not
    /// know, in which case the session answers not-implemented.
    #[must_use]
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::try_from(self.r#type).ok()
    }

    /// Correlation id, treating an absent field as the reserved id 0.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.message_id.unwrap_or(0)
    }

    fn envelope(kind: MessageType, message_id: u32) -> Self {
        Self {
            r#type: kind as i32,
            message_id: Some(message_id),
            ..Self::default()
        }
    }

    /// Build a [`MessageType::GenericResponse`] frame.
    #[must_use]
    pub fn generic_response(
        message_id: u32,
        code: ResultCode,
        description: Option<String>,
    ) -> Self {
        Self {
            generic_response: Some(GenericResponse {
                code: code as i32,
                description,
            }),
            ..Self::envelope(MessageType::GenericResponse, message_id)
        }
    }

    /// Build the handshake reply carrying the host dSUID.
    #[must_use]
    pub fn hello_response(message_id: u32, host_dsuid: &Dsuid) -> Self {
        Self {
            vdc_response_hello: Some(VdcResponseHello {
                dsuid: Some(host_dsuid.as_str().to_owned()),
            }),
            ..Self::envelope(MessageType::VdcResponseHello, message_id)
        }
    }

    /// Build a property read reply.
    #[must_use]
    pub fn get_property_response(message_id: u32, properties: Vec<PropertyElement>) -> Self {
        Self {
            vdc_response_get_property: Some(VdcResponseGetProperty { properties }),
            ..Self::envelope(MessageType::VdcResponseGetProperty, message_id)
        }
    }

    /// Build a keep-alive reply echoing the probe identifier.
    #[must_use]
    pub fn pong(message_id: u32, dsuid: &str) -> Self {
        Self {
            vdc_send_pong: Some(VdcSendPong {
                dsuid: Some(dsuid.to_owned()),
            }),
            ..Self::envelope(MessageType::VdcSendPong, message_id)
        }
    }

    /// Build the unsolicited vDC advertisement (message id 0).
    #[must_use]
    pub fn announce_vdc(vdc_dsuid: &Dsuid) -> Self {
        Self {
            vdc_send_announce_vdc: Some(VdcSendAnnounceVdc {
                dsuid: Some(vdc_dsuid.as_str().to_owned()),
            }),
            ..Self::envelope(MessageType::VdcSendAnnounceVdc, 0)
        }
    }

    /// Build an unsolicited device advertisement (message id 0).
    #[must_use]
    pub fn announce_device(device_dsuid: &Dsuid, vdc_dsuid: &Dsuid) -> Self {
        Self {
            vdc_send_announce_device: Some(VdcSendAnnounceDevice {
                dsuid: Some(device_dsuid.as_str().to_owned()),
                vdc_dsuid: Some(vdc_dsuid.as_str().to_owned()),
            }),
            ..Self::envelope(MessageType::VdcSendAnnounceDevice, 0)
        }
    }

    /// Build an unsolicited vanish frame (message id 0).
    #[must_use]
    pub fn vanish(device_dsuid: &Dsuid) -> Self {
        Self {
            vdc_send_vanish: Some(VdcSendVanish {
                dsuid: Some(device_dsuid.as_str().to_owned()),
            }),
            ..Self::envelope(MessageType::VdcSendVanish, 0)
        }
    }
}
