//! Virtual device model and behavior dispatch.
//!
//! A [`Device`] is a record (identity, static description, output state,
//! custom properties) plus a boxed [`DeviceBehavior`] dispatch table for the
//! verbs the session dispatcher invokes. The trait ships the default policy
//! as default methods; user code overrides any subset to model real
//! hardware, so no subclassing is needed to customize behavior.

use std::fmt;

use thiserror::Error;
use vdc_proto::{Dsuid, Prop, PropMap};

/// Dim step applied per dim-channel invocation, in percent.
const DIM_STEP: f64 = 10.0;

/// Device class from the digitalSTROM color groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    /// Light (yellow group).
    Light,
    /// Shade (grey group).
    Shade,
    /// Heating (blue group).
    Heating,
    /// Cooling (blue group).
    Cooling,
    /// Ventilation (blue group).
    Ventilation,
    /// Window (blue group).
    Window,
    /// Joker (black group).
    Joker,
    /// Audio (cyan group).
    Audio,
    /// Video (magenta group).
    Video,
    /// Security system (red group).
    SecuritySystem,
    /// Access (green group).
    Access,
    /// Single push-button.
    SingleButton,
}

impl DeviceClass {
    /// Class name as exposed in the property tree.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Shade => "Shade",
            Self::Heating => "Heating",
            Self::Cooling => "Cooling",
            Self::Ventilation => "Ventilation",
            Self::Window => "Window",
            Self::Joker => "Joker",
            Self::Audio => "Audio",
            Self::Video => "Video",
            Self::SecuritySystem => "SecuritySystem",
            Self::Access => "Access",
            Self::SingleButton => "SingleButton",
        }
    }

    /// Whether devices of this class expose an `output` subtree.
    #[must_use]
    pub fn has_output(self) -> bool {
        matches!(
            self,
            Self::Light | Self::Shade | Self::Heating | Self::Cooling
        )
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable output channel state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Output {
    /// Output value, conventionally 0.0-100.0.
    pub value: f64,
    /// Output mode.
    pub mode: i64,
}

/// Dim direction for [`DeviceBehavior::dim_channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimMode {
    /// Decrease the output value.
    Down,
    /// Stop dimming.
    Stop,
    /// Increase the output value.
    Up,
}

impl DimMode {
    /// Map the wire encoding (-1/0/+1) to a mode. `None` for anything else.
    #[must_use]
    pub fn from_wire(mode: i32) -> Option<Self> {
        match mode {
            -1 => Some(Self::Down),
            0 => Some(Self::Stop),
            1 => Some(Self::Up),
            _ => None,
        }
    }
}

/// Default scene number → output value mapping.
fn default_scene_value(scene: u8) -> Option<f64> {
    match scene {
        0 => Some(0.0),    // Off
        5 => Some(100.0),  // On/Full
        12 => Some(75.0),  // Preset 3
        13 => Some(50.0),  // Preset 2
        14 => Some(25.0),  // Preset 1
        _ => None,
    }
}

/// Verb dispatch table consumed by the session dispatcher.
///
/// Every method ships the default policy, so an implementation only
/// overrides the verbs its hardware cares about. Verbs run under the
/// device's own lock; implementations must not block.
pub trait DeviceBehavior: Send {
    /// Apply a scene preset. Scenes without a default mapping are a no-op.
    fn call_scene(&mut self, output: &mut Output, scene: u8, force: bool) {
        let _ = force;
        if let Some(value) = default_scene_value(scene) {
            output.value = value;
        }
    }

    /// Set the output value. The default drops staged (non-immediate)
    /// values; override to implement staging.
    fn set_output_value(&mut self, output: &mut Output, value: f64, apply_now: bool) {
        if apply_now {
            output.value = value;
        }
    }

    /// Dim the output by one step, clamped to 0.0-100.0.
    fn dim_channel(&mut self, output: &mut Output, mode: DimMode, channel: u32) {
        let _ = channel;
        match mode {
            DimMode::Up => output.value = (output.value + DIM_STEP).min(100.0),
            DimMode::Down => output.value = (output.value - DIM_STEP).max(0.0),
            DimMode::Stop => {}
        }
    }

    /// Make the physical device identify itself (blink, beep). Default no-op.
    fn identify(&mut self) {}

    /// Persist the current state as a scene. Default no-op; persistence is
    /// delegated to user code.
    fn save_scene(&mut self, output: &mut Output, scene: u8) {
        let _ = (output, scene);
    }

    /// Revert the last scene invocation. Default no-op.
    fn undo_scene(&mut self, output: &mut Output, scene: u8) {
        let _ = (output, scene);
    }
}

/// The default policy with no overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardBehavior;

impl DeviceBehavior for StandardBehavior {}

/// Invalid property assignment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("property {name:?} cannot take a value of this type")]
pub struct DeviceError {
    /// Name of the rejected property.
    pub name: String,
}

/// A virtual device.
///
/// Created by user code, inserted into the host registry (which assigns the
/// owning vDC dSUID), mutated by the session dispatcher through the verb
/// methods, and removed explicitly.
pub struct Device {
    dsuid: Dsuid,
    name: String,
    model: String,
    model_uid: String,
    class: DeviceClass,
    vdc_dsuid: Option<Dsuid>,
    output: Output,
    custom: PropMap,
    behavior: Box<dyn DeviceBehavior>,
}

impl Device {
    /// Create a device with the default behavior.
    pub fn new(
        dsuid: Dsuid,
        name: impl Into<String>,
        model: impl Into<String>,
        model_uid: impl Into<String>,
        class: DeviceClass,
    ) -> Self {
        Self {
            dsuid,
            name: name.into(),
            model: model.into(),
            model_uid: model_uid.into(),
            class,
            vdc_dsuid: None,
            output: Output::default(),
            custom: PropMap::new(),
            behavior: Box::new(StandardBehavior),
        }
    }

    /// Replace the verb dispatch table.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl DeviceBehavior + 'static) -> Self {
        self.behavior = Box::new(behavior);
        self
    }

    /// Device identity.
    #[must_use]
    pub fn dsuid(&self) -> &Dsuid {
        &self.dsuid
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Model identifier.
    #[must_use]
    pub fn model_uid(&self) -> &str {
        &self.model_uid
    }

    /// Device class.
    #[must_use]
    pub fn device_class(&self) -> DeviceClass {
        self.class
    }

    /// Owning vDC; `None` until the device is added to a registry.
    #[must_use]
    pub fn vdc_dsuid(&self) -> Option<&Dsuid> {
        self.vdc_dsuid.as_ref()
    }

    pub(crate) fn set_vdc_dsuid(&mut self, vdc_dsuid: Dsuid) {
        self.vdc_dsuid = Some(vdc_dsuid);
    }

    /// Current output state.
    #[must_use]
    pub fn output(&self) -> Output {
        self.output
    }

    /// Apply a scene preset.
    pub fn call_scene(&mut self, scene: u8, force: bool) {
        self.behavior.call_scene(&mut self.output, scene, force);
    }

    /// Set the output value.
    pub fn set_output_value(&mut self, value: f64, apply_now: bool) {
        self.behavior.set_output_value(&mut self.output, value, apply_now);
    }

    /// Dim the output by one step.
    pub fn dim_channel(&mut self, mode: DimMode, channel: u32) {
        self.behavior.dim_channel(&mut self.output, mode, channel);
    }

    /// Make the device identify itself.
    pub fn identify(&mut self) {
        self.behavior.identify();
    }

    /// Persist the current state as a scene.
    pub fn save_scene(&mut self, scene: u8) {
        self.behavior.save_scene(&mut self.output, scene);
    }

    /// Revert the last scene invocation.
    pub fn undo_scene(&mut self, scene: u8) {
        self.behavior.undo_scene(&mut self.output, scene);
    }

    /// Apply one property assignment.
    ///
    /// `"name"` replaces the display name, `"output.value"`/`"outputValue"`
    /// coerce to a double and replace the output value, and everything else
    /// lands in the custom properties.
    ///
    /// # Errors
    ///
    /// - [`DeviceError`] when the value cannot be coerced to the property's
    ///   type
    pub fn set_property(&mut self, name: &str, prop: &Prop) -> Result<(), DeviceError> {
        match name {
            "name" => {
                let Prop::Value(value) = prop else {
                    return Err(DeviceError { name: name.to_owned() });
                };
                let Some(text) = value.as_str() else {
                    return Err(DeviceError { name: name.to_owned() });
                };
                self.name = text.to_owned();
            }
            "output.value" | "outputValue" => {
                let value = match prop {
                    Prop::Value(value) => value.as_double(),
                    _ => None,
                };
                let Some(value) = value else {
                    return Err(DeviceError { name: name.to_owned() });
                };
                self.output.value = value;
            }
            _ => self.custom.insert(name, prop.clone()),
        }
        Ok(())
    }

    /// The device's property tree: descriptive fields merged with custom
    /// properties, plus the `output` subtree for classes that have one.
    #[must_use]
    pub fn property_tree(&self) -> PropMap {
        let mut props = PropMap::new()
            .with("dSUID", self.dsuid.as_str())
            .with("name", self.name.as_str())
            .with("model", self.model.as_str())
            .with("modelUID", self.model_uid.as_str())
            .with("type", "vdSD")
            .with("deviceClass", self.class.as_str());

        props.merge(self.custom.clone());

        if self.class.has_output() {
            props.insert(
                "output",
                PropMap::new()
                    .with("value", self.output.value)
                    .with("mode", self.output.mode),
            );
        }

        props
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("dsuid", &self.dsuid)
            .field("name", &self.name)
            .field("model", &self.model)
            .field("class", &self.class)
            .field("vdc_dsuid", &self.vdc_dsuid)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use vdc_proto::{PropValue, property_tree_to_map};

    use super::*;

    fn light(name: &str) -> Device {
        Device::new(
            Dsuid::new("CC000000000000000000000000000000C1").unwrap(),
            name,
            "Test Dimmer",
            "vdc:test-dimmer",
            DeviceClass::Light,
        )
    }

    #[test]
    fn default_scene_map_drives_output() {
        let mut device = light("lamp");

        device.call_scene(5, false);
        assert_eq!(device.output().value, 100.0);

        device.call_scene(13, false);
        assert_eq!(device.output().value, 50.0);

        device.call_scene(0, false);
        assert_eq!(device.output().value, 0.0);
    }

    #[test]
    fn unmapped_scene_is_a_no_op() {
        let mut device = light("lamp");
        device.call_scene(5, false);

        device.call_scene(42, false);
        assert_eq!(device.output().value, 100.0);
    }

    #[test]
    fn dimming_clamps_to_bounds() {
        let mut device = light("lamp");

        for _ in 0..12 {
            device.dim_channel(DimMode::Up, 0);
        }
        assert_eq!(device.output().value, 100.0);

        for _ in 0..12 {
            device.dim_channel(DimMode::Down, 0);
        }
        assert_eq!(device.output().value, 0.0);

        device.dim_channel(DimMode::Stop, 0);
        assert_eq!(device.output().value, 0.0);
    }

    #[test]
    fn staged_output_values_are_dropped_by_default() {
        let mut device = light("lamp");

        device.set_output_value(80.0, false);
        assert_eq!(device.output().value, 0.0);

        device.set_output_value(80.0, true);
        assert_eq!(device.output().value, 80.0);
    }

    #[test]
    fn set_property_routes_by_name() {
        let mut device = light("lamp");

        device
            .set_property("name", &Prop::from("Ceiling"))
            .unwrap();
        assert_eq!(device.name(), "Ceiling");

        device
            .set_property("output.value", &Prop::from(33.0))
            .unwrap();
        assert_eq!(device.output().value, 33.0);

        // Numeric strings coerce like the loosely typed original.
        device
            .set_property("outputValue", &Prop::from("55.5"))
            .unwrap();
        assert_eq!(device.output().value, 55.5);

        device.set_property("zone", &Prop::from(7_u64)).unwrap();
        assert_eq!(
            device.property_tree().value("zone"),
            Some(&PropValue::Uint64(7))
        );
    }

    #[test]
    fn invalid_assignments_are_rejected() {
        let mut device = light("lamp");

        assert!(device.set_property("name", &Prop::from(5_u64)).is_err());
        assert!(
            device
                .set_property("output.value", &Prop::from("bright"))
                .is_err()
        );
        assert_eq!(device.name(), "lamp");
        assert_eq!(device.output().value, 0.0);
    }

    #[test]
    fn property_tree_describes_the_device() {
        let tree = light("Living Room Light").property_tree();

        assert_eq!(tree.value("dSUID"), Some(&PropValue::String("CC000000000000000000000000000000C1".into())));
        assert_eq!(tree.value("name"), Some(&PropValue::String("Living Room Light".into())));
        assert_eq!(tree.value("type"), Some(&PropValue::String("vdSD".into())));
        assert_eq!(tree.value("deviceClass"), Some(&PropValue::String("Light".into())));

        let output = tree.map("output").unwrap();
        assert_eq!(output.value("value"), Some(&PropValue::Double(0.0)));
        assert_eq!(output.value("mode"), Some(&PropValue::Uint64(0)));
    }

    #[test]
    fn output_subtree_is_gated_by_class() {
        let button = Device::new(
            Dsuid::new("CC000000000000000000000000000000C2").unwrap(),
            "button",
            "Test Button",
            "vdc:test-button",
            DeviceClass::SingleButton,
        );

        assert!(button.property_tree().get("output").is_none());
    }

    #[test]
    fn property_tree_round_trips_through_the_wire_shape() {
        let device = light("lamp");
        let tree = device.property_tree();

        let lowered = property_tree_to_map(&vdc_proto::build_property_tree(&tree));
        assert_eq!(lowered, tree);
    }

    proptest! {
        /// Any sequence of dim steps keeps the output within 0.0-100.0.
        #[test]
        fn dimming_stays_in_bounds(modes in prop::collection::vec(-1..2_i32, 0..64)) {
            let mut device = light("lamp");
            for raw in modes {
                if let Some(mode) = DimMode::from_wire(raw) {
                    device.dim_channel(mode, 0);
                }
                let value = device.output().value;
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }
    }

    #[test]
    fn custom_behavior_overrides_verbs() {
        struct Inverted;

        impl DeviceBehavior for Inverted {
            fn call_scene(&mut self, output: &mut Output, scene: u8, _force: bool) {
                // Only scene 5 is honored, and it turns the output off.
                if scene == 5 {
                    output.value = 0.0;
                }
            }

            fn set_output_value(&mut self, output: &mut Output, value: f64, _apply_now: bool) {
                output.value = 100.0 - value;
            }
        }

        let mut device = light("lamp").with_behavior(Inverted);

        device.set_output_value(30.0, false);
        assert_eq!(device.output().value, 70.0);

        device.call_scene(5, true);
        assert_eq!(device.output().value, 0.0);

        // Unoverridden verbs keep the default policy.
        device.dim_channel(DimMode::Up, 0);
        assert_eq!(device.output().value, 10.0);
    }
}
