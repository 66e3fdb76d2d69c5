//! Property-based tests for message encoding and framing.
//!
//! Round-trip encoding must be the identity for every supported message
//! kind, and the framer must never produce a record larger than the
//! protocol's 16 KiB message limit plus the 2-byte prefix.

use proptest::prelude::*;
use vdc_proto::{
    LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE, decode_frame, encode_frame,
    wire::{
        GenericResponse, Message, MessageType, PropertyElement, PropertyValue, ResultCode,
        VdcResponseGetProperty, VdcResponseHello, VdcSendAnnounceDevice, VdcSendAnnounceVdc,
        VdcSendPong, VdcSendVanish, VdsmNotificationCallScene, VdsmNotificationDimChannel,
        VdsmNotificationIdentify, VdsmNotificationSaveScene, VdsmNotificationSetOutputChannelValue,
        VdsmNotificationUndoScene, VdsmRequestGenericRequest, VdsmRequestGetProperty,
        VdsmRequestHello, VdsmRequestSetProperty, VdsmSendBye, VdsmSendPing,
    },
};

fn envelope(kind: MessageType, message_id: u32) -> Message {
    Message {
        r#type: kind as i32,
        message_id: Some(message_id),
        ..Message::default()
    }
}

/// Strategy for well-formed dSUID strings.
fn arbitrary_dsuid() -> impl Strategy<Value = String> {
    "[0-9A-Fa-f]{34}"
}

/// Strategy for a small property tree, up to two levels deep.
fn arbitrary_elements() -> impl Strategy<Value = Vec<PropertyElement>> {
    let leaf = ("[a-z]{1,8}", prop_oneof![
        any::<bool>().prop_map(|v| PropertyValue {
            v_bool: Some(v),
            ..PropertyValue::default()
        }),
        any::<u64>().prop_map(|v| PropertyValue {
            v_uint64: Some(v),
            ..PropertyValue::default()
        }),
        (-1.0e12..1.0e12_f64).prop_map(|v| PropertyValue {
            v_double: Some(v),
            ..PropertyValue::default()
        }),
        "[a-z ]{0,12}".prop_map(|v| PropertyValue {
            v_string: Some(v),
            ..PropertyValue::default()
        }),
    ])
        .prop_map(|(name, value)| PropertyElement {
            name: Some(name),
            value: Some(value),
            elements: Vec::new(),
        });

    let branch = ("[a-z]{1,8}", prop::collection::vec(leaf.clone(), 0..4)).prop_map(
        |(name, children)| PropertyElement {
            name: Some(name),
            value: None,
            elements: children,
        },
    );

    prop::collection::vec(prop_oneof![leaf, branch], 0..4)
}

/// Request/response kinds carrying a correlation id.
fn request_frames() -> impl Strategy<Value = Message> {
    let ids = any::<u32>();

    prop_oneof![
        (ids, "[a-z ]{0,16}").prop_map(|(id, description)| Message {
            generic_response: Some(GenericResponse {
                code: ResultCode::ErrNotFound as i32,
                description: Some(description),
            }),
            ..envelope(MessageType::GenericResponse, id)
        }),
        (ids, arbitrary_dsuid(), any::<u32>()).prop_map(|(id, dsuid, api_version)| Message {
            vdsm_request_hello: Some(VdsmRequestHello {
                dsuid: Some(dsuid),
                api_version: Some(api_version),
            }),
            ..envelope(MessageType::VdsmRequestHello, id)
        }),
        (ids, arbitrary_dsuid()).prop_map(|(id, dsuid)| Message {
            vdc_response_hello: Some(VdcResponseHello { dsuid: Some(dsuid) }),
            ..envelope(MessageType::VdcResponseHello, id)
        }),
        (ids, arbitrary_dsuid(), arbitrary_elements()).prop_map(|(id, dsuid, query)| Message {
            vdsm_request_get_property: Some(VdsmRequestGetProperty {
                dsuid: Some(dsuid),
                query,
            }),
            ..envelope(MessageType::VdsmRequestGetProperty, id)
        }),
        (ids, arbitrary_elements()).prop_map(|(id, properties)| Message {
            vdc_response_get_property: Some(VdcResponseGetProperty { properties }),
            ..envelope(MessageType::VdcResponseGetProperty, id)
        }),
        (ids, arbitrary_dsuid(), arbitrary_elements()).prop_map(|(id, dsuid, properties)| {
            Message {
                vdsm_request_set_property: Some(VdsmRequestSetProperty {
                    dsuid: Some(dsuid),
                    properties,
                }),
                ..envelope(MessageType::VdsmRequestSetProperty, id)
            }
        }),
        (ids, "[a-zA-Z0-9]{0,16}").prop_map(|(id, dsuid)| Message {
            vdsm_send_ping: Some(VdsmSendPing { dsuid: Some(dsuid) }),
            ..envelope(MessageType::VdsmSendPing, id)
        }),
        (ids, "[a-zA-Z0-9]{0,16}").prop_map(|(id, dsuid)| Message {
            vdc_send_pong: Some(VdcSendPong { dsuid: Some(dsuid) }),
            ..envelope(MessageType::VdcSendPong, id)
        }),
        (ids, arbitrary_dsuid(), "[a-z]{1,12}", arbitrary_elements()).prop_map(
            |(id, dsuid, methodname, params)| Message {
                vdsm_request_generic_request: Some(VdsmRequestGenericRequest {
                    dsuid: Some(dsuid),
                    methodname: Some(methodname),
                    params,
                }),
                ..envelope(MessageType::VdsmRequestGenericRequest, id)
            }
        ),
    ]
}

/// Unsolicited announcement/teardown kinds (message id 0).
fn unsolicited_frames() -> impl Strategy<Value = Message> {
    prop_oneof![
        (arbitrary_dsuid(), arbitrary_dsuid()).prop_map(|(dsuid, vdc_dsuid)| Message {
            vdc_send_announce_device: Some(VdcSendAnnounceDevice {
                dsuid: Some(dsuid),
                vdc_dsuid: Some(vdc_dsuid),
            }),
            ..envelope(MessageType::VdcSendAnnounceDevice, 0)
        }),
        arbitrary_dsuid().prop_map(|dsuid| Message {
            vdc_send_announce_vdc: Some(VdcSendAnnounceVdc { dsuid: Some(dsuid) }),
            ..envelope(MessageType::VdcSendAnnounceVdc, 0)
        }),
        arbitrary_dsuid().prop_map(|dsuid| Message {
            vdc_send_vanish: Some(VdcSendVanish { dsuid: Some(dsuid) }),
            ..envelope(MessageType::VdcSendVanish, 0)
        }),
        arbitrary_dsuid().prop_map(|dsuid| Message {
            vdsm_send_bye: Some(VdsmSendBye { dsuid: Some(dsuid) }),
            ..envelope(MessageType::VdsmSendBye, 0)
        }),
    ]
}

/// Notification kinds (message id 0, no response expected).
fn notification_frames() -> impl Strategy<Value = Message> {
    prop_oneof![
        (
            prop::collection::vec(arbitrary_dsuid(), 0..3),
            0..127_i32,
            any::<bool>()
        )
            .prop_map(|(dsuid, scene, force)| Message {
                vdsm_send_call_scene: Some(VdsmNotificationCallScene {
                    dsuid,
                    scene: Some(scene),
                    force: Some(force),
                }),
                ..envelope(MessageType::VdsmNotificationCallScene, 0)
            }),
        (prop::collection::vec(arbitrary_dsuid(), 0..3), 0..127_i32).prop_map(|(dsuid, scene)| {
            Message {
                vdsm_send_save_scene: Some(VdsmNotificationSaveScene {
                    dsuid,
                    scene: Some(scene),
                }),
                ..envelope(MessageType::VdsmNotificationSaveScene, 0)
            }
        }),
        (prop::collection::vec(arbitrary_dsuid(), 0..3), 0..127_i32).prop_map(|(dsuid, scene)| {
            Message {
                vdsm_send_undo_scene: Some(VdsmNotificationUndoScene {
                    dsuid,
                    scene: Some(scene),
                }),
                ..envelope(MessageType::VdsmNotificationUndoScene, 0)
            }
        }),
        prop::collection::vec(arbitrary_dsuid(), 0..3).prop_map(|dsuid| Message {
            vdsm_send_identify: Some(VdsmNotificationIdentify { dsuid }),
            ..envelope(MessageType::VdsmNotificationIdentify, 0)
        }),
        (prop::collection::vec(arbitrary_dsuid(), 0..3), -1..2_i32).prop_map(|(dsuid, mode)| {
            Message {
                vdsm_send_dim_channel: Some(VdsmNotificationDimChannel {
                    dsuid,
                    channel: Some(0),
                    mode: Some(mode),
                }),
                ..envelope(MessageType::VdsmNotificationDimChannel, 0)
            }
        }),
        (
            prop::collection::vec(arbitrary_dsuid(), 0..3),
            any::<bool>(),
            0.0..100.0_f64
        )
            .prop_map(|(dsuid, apply_now, value)| Message {
                vdsm_send_output_channel_value: Some(VdsmNotificationSetOutputChannelValue {
                    dsuid,
                    apply_now: Some(apply_now),
                    channel: Some(0),
                    value: Some(value),
                }),
                ..envelope(MessageType::VdsmNotificationSetOutputChannelValue, 0)
            }),
    ]
}

/// Strategy covering every supported message kind.
fn arbitrary_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        request_frames(),
        unsolicited_frames(),
        notification_frames(),
    ]
}

proptest! {
    /// Encoding then decoding any supported message is the identity.
    #[test]
    fn message_round_trip(message in arbitrary_message()) {
        let frame = encode_frame(&message).expect("encode should succeed");
        let decoded = decode_frame(&frame[LENGTH_PREFIX_SIZE..]).expect("decode should succeed");

        prop_assert_eq!(decoded, message);
    }

    /// The framer never produces a record beyond prefix + message limit.
    #[test]
    fn frames_respect_the_size_cap(message in arbitrary_message()) {
        let frame = encode_frame(&message).expect("encode should succeed");

        prop_assert!(frame.len() <= LENGTH_PREFIX_SIZE + MAX_MESSAGE_SIZE);

        let announced = u16::from_be_bytes([frame[0], frame[1]]) as usize;
        prop_assert_eq!(announced, frame.len() - LENGTH_PREFIX_SIZE);
    }
}
