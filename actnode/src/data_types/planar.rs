use actnode_encoding as enc;

/// `reg.udral.physics.dynamics.rotation.Planar.0.1`
///
/// Fixed size 16 bytes
///
/// Rotational kinematic state with the torque that drives it.
/// Servo setpoints are carried in this type on the actuator command subjects.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Planar {
    /// `reg.udral.physics.kinematics.rotation.Planar.0.1`
    ///
    /// Always aligned,
    /// size 96 bits
    pub kinematics: PlanarKinematics,
    /// \[newton meter\] `uavcan.si.unit.torque.Scalar.1.0`
    ///
    /// Always aligned,
    /// size 32 bits
    pub torque: f32,
}
impl enc::DataType for Planar {
    /// This type is sealed.
    const EXTENT_BYTES: Option<u32> = None;
}
impl enc::Message for Planar {}
impl enc::FixedSize for Planar {
    const SIZE_BYTES: usize = 16;
}
impl enc::Serialize for Planar {
    fn size_bits(&self) -> usize {
        128
    }
    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_composite(&self.kinematics);
        cursor.write_f32(self.torque);
    }
}
impl enc::Deserialize for Planar {
    fn deserialize(
        cursor: &mut enc::ReadCursor<'_>,
    ) -> ::core::result::Result<Self, enc::DeserializeError>
    where
        Self: Sized,
    {
        Ok(Planar {
            kinematics: { cursor.read_composite()? },
            torque: { cursor.read_f32() },
        })
    }
}

/// `reg.udral.physics.kinematics.rotation.Planar.0.1`
///
/// Fixed size 12 bytes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlanarKinematics {
    /// \[radian\] `uavcan.si.unit.angle.Scalar.1.0`
    pub angular_position: f32,
    /// \[radian per second\] `uavcan.si.unit.angular_velocity.Scalar.1.0`
    pub angular_velocity: f32,
    /// \[radian per second squared\] `uavcan.si.unit.angular_acceleration.Scalar.1.0`
    pub angular_acceleration: f32,
}
impl enc::DataType for PlanarKinematics {
    /// This type is sealed.
    const EXTENT_BYTES: Option<u32> = None;
}
impl enc::Message for PlanarKinematics {}
impl enc::Serialize for PlanarKinematics {
    fn size_bits(&self) -> usize {
        96
    }
    fn serialize(&self, cursor: &mut enc::WriteCursor<'_>) {
        cursor.write_f32(self.angular_position);
        cursor.write_f32(self.angular_velocity);
        cursor.write_f32(self.angular_acceleration);
    }
}
impl enc::Deserialize for PlanarKinematics {
    fn deserialize(
        cursor: &mut enc::ReadCursor<'_>,
    ) -> ::core::result::Result<Self, enc::DeserializeError>
    where
        Self: Sized,
    {
        Ok(PlanarKinematics {
            angular_position: { cursor.read_f32() },
            angular_velocity: { cursor.read_f32() },
            angular_acceleration: { cursor.read_f32() },
        })
    }
}
