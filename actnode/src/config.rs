use crate::codec::CodecKind;
use crate::core::{NodeId, SubjectId};
use crate::data_types::Heartbeat;
use crate::engine::MAX_EXTENT;
use crate::frame::Mtu;
use crate::supervisor::SERVO_COUNT;
use crate::time::Duration;

/// Subjects the node subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubjectConfig {
    /// `reg.udral.service.common.Readiness.0.1`
    pub readiness: SubjectId,
    /// `reg.udral.physics.dynamics.rotation.Planar.0.1`, one subject per servo channel
    pub servo: [SubjectId; SERVO_COUNT],
    /// `uavcan.primitive.scalar.Bit.1.0`
    pub pump: SubjectId,
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            readiness: SubjectId::from_u16_truncating(3005),
            servo: [
                SubjectId::from_u16_truncating(3010),
                SubjectId::from_u16_truncating(3011),
                SubjectId::from_u16_truncating(3012),
                SubjectId::from_u16_truncating(3013),
            ],
            pump: SubjectId::from_u16_truncating(3020),
        }
    }
}

/// Actuator node configuration
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Local node ID, used as the source of published transfers
    ///
    /// Default: 0
    pub node_id: NodeId,
    /// Frame size of published transfers
    ///
    /// Default: CAN FD
    pub mtu: Mtu,
    pub subjects: SubjectConfig,
    /// Largest accepted command payload, at most [`MAX_EXTENT`]
    ///
    /// Default: 64 bytes
    pub extent: usize,
    /// Default: 2 s
    pub transfer_id_timeout: Duration,
    /// Commands older than this put the node into the safe state.
    ///
    /// Default: 1000 ms
    pub staleness_timeout: Duration,
    /// Upper bound of one wait in [`ActuatorNode::run`](crate::node::ActuatorNode::run)
    ///
    /// Default: 20 ms
    pub cycle_period: Duration,
    /// Lifetime of a published transfer in the outbound queue
    ///
    /// Default: 100 ms
    pub tx_deadline: Duration,
    /// Default: [`CodecKind::Compiled`]
    pub codec: CodecKind,
    /// Heartbeat publication period; `None` disables the heartbeat.
    ///
    /// Default: 1 s
    pub heartbeat_period: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: NodeId::from_u8_truncating(0),
            mtu: Mtu::Fd,
            subjects: SubjectConfig::default(),
            extent: MAX_EXTENT,
            transfer_id_timeout: Duration::from_secs(2),
            staleness_timeout: Duration::from_millis(1000),
            cycle_period: Duration::from_millis(20),
            tx_deadline: Duration::from_millis(100),
            codec: CodecKind::Compiled,
            heartbeat_period: Some(Duration::from_secs(Heartbeat::MAX_PUBLICATION_PERIOD as u64)),
        }
    }
}
