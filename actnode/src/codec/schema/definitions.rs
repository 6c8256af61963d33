//! DSDL sources embedded in the firmware image, keyed by full type name

pub(super) fn find(name: &str) -> Option<(&'static str, &'static str)> {
    DEFINITIONS
        .iter()
        .find(|(key, _)| *key == name)
        .copied()
}

const DEFINITIONS: &[(&str, &str)] = &[
    (
        "uavcan.si.unit.angle.Scalar.1.0",
        "float32 radian\n\
         @sealed\n",
    ),
    (
        "uavcan.si.unit.angular_velocity.Scalar.1.0",
        "float32 radian_per_second\n\
         @sealed\n",
    ),
    (
        "uavcan.si.unit.angular_acceleration.Scalar.1.0",
        "float32 radian_per_second_per_second\n\
         @sealed\n",
    ),
    (
        "uavcan.si.unit.torque.Scalar.1.0",
        "float32 newton_meter\n\
         @sealed\n",
    ),
    (
        "reg.udral.physics.kinematics.rotation.Planar.0.1",
        "# Planar rotational kinematics.\n\
         uavcan.si.unit.angle.Scalar.1.0                angular_position\n\
         uavcan.si.unit.angular_velocity.Scalar.1.0     angular_velocity\n\
         uavcan.si.unit.angular_acceleration.Scalar.1.0 angular_acceleration\n\
         @sealed\n",
    ),
    (
        "reg.udral.physics.dynamics.rotation.Planar.0.1",
        "# Planar rotational kinematics with the torque that drives it.\n\
         reg.udral.physics.kinematics.rotation.Planar.0.1 kinematics\n\
         uavcan.si.unit.torque.Scalar.1.0                 torque\n\
         @sealed\n",
    ),
    (
        "reg.udral.service.common.Readiness.0.1",
        "# Coarse actuator permission level.\n\
         uint2 SLEEP   = 0\n\
         uint2 STANDBY = 2\n\
         uint2 ENGAGED = 3\n\
         truncated uint2 value\n\
         @extent 8 * 8\n",
    ),
    (
        "uavcan.primitive.scalar.Bit.1.0",
        "bool value\n\
         @sealed\n",
    ),
    (
        "uavcan.node.Heartbeat.1.0",
        "# Abstract node status information.\n\
         uint16 MAX_PUBLICATION_PERIOD = 1  # [second]\n\
         uint16 OFFLINE_TIMEOUT = 3         # [second]\n\
         saturated uint32 uptime            # [second]\n\
         Health.1.0 health\n\
         Mode.1.0 mode\n\
         saturated uint8 vendor_specific_status_code\n\
         @extent 12 * 8\n",
    ),
    (
        "uavcan.node.Health.1.0",
        "uint2 value\n\
         uint2 NOMINAL  = 0\n\
         uint2 ADVISORY = 1\n\
         uint2 CAUTION  = 2\n\
         uint2 WARNING  = 3\n\
         @sealed\n",
    ),
    (
        "uavcan.node.Mode.1.0",
        "uint3 value\n\
         uint3 OPERATIONAL     = 0\n\
         uint3 INITIALIZATION  = 1\n\
         uint3 MAINTENANCE     = 2\n\
         uint3 SOFTWARE_UPDATE = 3\n\
         @sealed\n",
    ),
];
