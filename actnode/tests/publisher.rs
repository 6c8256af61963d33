use actnode::can_id::Header;
use actnode::codec::{Codec, CodecKind, Message, SelectedCodec};
use actnode::config::Config;
use actnode::controller::{CanTx, MailboxFull};
use actnode::core::{NodeId, Priority, SubjectId, TransferId};
use actnode::data_types::{Bit, FixedSize, Planar, PlanarKinematics};
use actnode::engine::{Engine, Subscription, SubscriptionTable, Transfer, TransferHandler};
use actnode::frame::{Frame, Mtu};
use actnode::ingest::FrameChannel;
use actnode::node::{ActuatorNode, PublishError, Publisher};
use actnode::outbound::{EnqueueError, OutboundQueue};
use actnode::supervisor::{ActuatorOutput, SERVO_COUNT};
use actnode::time::{Duration, Instant};
use std::vec::Vec;

const NODE_ID: NodeId = NodeId::new(42).unwrap();
const STATUS_SUBJECT: SubjectId = SubjectId::new(1200).unwrap();
const QUEUE_CAPACITY: usize = 64;

#[derive(Default)]
struct Mailbox {
    frames: Vec<Frame>,
}

impl CanTx for Mailbox {
    fn try_push(&mut self, frame: &Frame) -> Result<(), MailboxFull> {
        self.frames.push(*frame);
        Ok(())
    }
}

struct Idle;

impl ActuatorOutput for Idle {
    fn apply(&mut self, _servo: &[f32; SERVO_COUNT], _pump: bool, _readiness: u8) {}
}

#[derive(Default)]
struct Collector {
    messages: Vec<(TransferId, Message)>,
}

impl TransferHandler<()> for Collector {
    fn on_transfer(&mut self, _tag: (), transfer: &Transfer<'_>) {
        let codec = SelectedCodec::new(CodecKind::Schema);
        let message = codec.decode(actnode::codec::MessageKind::Planar, transfer.payload);
        self.messages.push((transfer.transfer_id, message.unwrap()));
    }
}

fn ts(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

fn tail_transfer_id(frame: &Frame) -> u8 {
    frame.data.last().unwrap() & 0x1f
}

fn node_config() -> Config {
    let mut config = Config::default();
    config.node_id = NODE_ID;
    config.heartbeat_period = None;
    config
}

#[test]
fn test_queue_capacity_and_priority_order() {
    let mut queue: OutboundQueue = OutboundQueue::new(NODE_ID, Mtu::Classic);
    let mut mailbox = Mailbox::default();

    for i in 0..QUEUE_CAPACITY {
        let priority = Priority::from_u8_truncating((i % 8) as u8);
        // Every fourth transfer expires before the drain.
        let deadline = if i % 4 == 3 { ts(5) } else { ts(100) };
        let tid = TransferId::from_u8_truncating(i as u8);
        assert_eq!(
            queue.enqueue(STATUS_SUBJECT, tid, priority, &[i as u8], deadline),
            Ok(1)
        );
    }
    assert_eq!(
        queue.enqueue(
            STATUS_SUBJECT,
            TransferId::SESSION_START,
            Priority::Exceptional,
            &[0xff],
            ts(100)
        ),
        Err(EnqueueError::QueueFull)
    );
    assert_eq!(queue.stats().rejected, 1);

    let report = queue.drain(ts(10), &mut mailbox);
    assert_eq!(report.expired, 16);
    assert_eq!(report.sent, 48);
    assert!(queue.is_empty());

    let sent: Vec<(u8, u8)> = mailbox
        .frames
        .iter()
        .map(|frame| {
            let header = Header::parse(frame.id).unwrap();
            (header.priority.into_u8(), frame.data[0])
        })
        .collect();

    // Priority order, FIFO within a level, no expired frame.
    let mut expected: Vec<(u8, u8)> = (0..QUEUE_CAPACITY as u8)
        .filter(|i| i % 4 != 3)
        .map(|i| (i % 8, i))
        .collect();
    expected.sort_by_key(|(priority, _)| *priority);
    assert_eq!(sent, expected);
}

#[test]
fn test_published_transfer_reassembles() {
    let mut channel: FrameChannel = FrameChannel::new();
    let (_sink, source) = channel.split();
    let mut config = node_config();
    config.mtu = Mtu::Classic;
    let mut node = ActuatorNode::new(config, source, Mailbox::default(), Idle, ts(0)).unwrap();

    let message = Message::Planar(Planar {
        kinematics: PlanarKinematics {
            angular_position: 0.25,
            angular_velocity: -1.5,
            angular_acceleration: 3.0,
        },
        torque: 0.125,
    });
    let mut publisher = Publisher::new(STATUS_SUBJECT, Priority::Fast);
    assert_eq!(node.publish(&mut publisher, &message, ts(0)), Ok(3));
    assert_eq!(node.publish(&mut publisher, &message, ts(0)), Ok(3));
    assert_eq!(node.pending_frames(), 6);

    node.step(ts(1));
    assert_eq!(node.pending_frames(), 0);
    assert_eq!(node.outbound_stats().sent, 6);

    let frames = &node.tx().frames;
    for frame in frames {
        let header = Header::parse(frame.id).unwrap();
        assert_eq!(header.subject, STATUS_SUBJECT);
        assert_eq!(header.source, Some(NODE_ID));
        assert_eq!(header.priority, Priority::Fast);
    }

    let mut table = SubscriptionTable::new();
    table
        .subscribe(Subscription {
            subject: STATUS_SUBJECT,
            extent: Planar::SIZE_BYTES,
            timeout: Duration::from_secs(2),
            tag: (),
        })
        .unwrap();
    let mut engine = Engine::new(table);
    let mut collector = Collector::default();
    assert_eq!(engine.process_pending(frames.iter().copied(), &mut collector), 2);
    assert_eq!(
        collector.messages,
        [
            (TransferId::from_u8_truncating(0), message),
            (TransferId::from_u8_truncating(1), message)
        ]
    );
}

#[test]
fn test_fd_transfer_fits_one_frame() {
    let mut channel: FrameChannel = FrameChannel::new();
    let (_sink, source) = channel.split();
    let mut node =
        ActuatorNode::new(node_config(), source, Mailbox::default(), Idle, ts(0)).unwrap();

    let message = Message::Planar(Planar::default());
    let mut publisher = Publisher::new(STATUS_SUBJECT, Priority::Nominal);
    assert_eq!(node.publish(&mut publisher, &message, ts(0)), Ok(1));
    node.step(ts(1));

    // 16 bytes and the tail byte are padded to the next DLC.
    let frame = &node.tx().frames[0];
    assert_eq!(frame.data.len(), 20);
    assert_eq!(frame.data[..19], [0; 19]);
    assert_eq!(frame.data[19], 0xe0);
}

#[test]
fn test_expired_transfer_is_not_sent() {
    let mut channel: FrameChannel = FrameChannel::new();
    let (_sink, source) = channel.split();
    let mut node =
        ActuatorNode::new(node_config(), source, Mailbox::default(), Idle, ts(0)).unwrap();

    let mut publisher = Publisher::new(STATUS_SUBJECT, Priority::Nominal);
    let message = Message::Bit(Bit { value: true });
    node.publish(&mut publisher, &message, ts(0)).unwrap();

    // The deadline is 100 ms after publication.
    node.step(ts(101));
    assert!(node.tx().frames.is_empty());
    assert_eq!(node.outbound_stats().expired, 1);

    node.publish(&mut publisher, &message, ts(200)).unwrap();
    node.step(ts(300));
    assert_eq!(node.tx().frames.len(), 1);
    assert_eq!(tail_transfer_id(&node.tx().frames[0]), 1);
}

#[test]
fn test_transfer_id_wraps_around() {
    let mut channel: FrameChannel = FrameChannel::new();
    let (_sink, source) = channel.split();
    let mut node =
        ActuatorNode::new(node_config(), source, Mailbox::default(), Idle, ts(0)).unwrap();

    let mut publisher = Publisher::new(STATUS_SUBJECT, Priority::Nominal);
    let message = Message::Bit(Bit { value: false });
    for cycle in 0..34 {
        node.publish(&mut publisher, &message, ts(cycle)).unwrap();
        node.step(ts(cycle));
    }

    let ids: Vec<u8> = node.tx().frames.iter().map(tail_transfer_id).collect();
    assert_eq!(ids.len(), 34);
    assert_eq!(ids[31], 31);
    assert_eq!(ids[32], 0);
    assert_eq!(ids[33], 1);
    assert_eq!(publisher.next_transfer_id().into_u8(), 2);
}

#[test]
fn test_full_queue_keeps_transfer_id() {
    let mut channel: FrameChannel = FrameChannel::new();
    let (_sink, source) = channel.split();
    let mut node =
        ActuatorNode::new(node_config(), source, Mailbox::default(), Idle, ts(0)).unwrap();

    let mut publisher = Publisher::new(STATUS_SUBJECT, Priority::Nominal);
    let message = Message::Bit(Bit { value: true });
    for _ in 0..QUEUE_CAPACITY {
        node.publish(&mut publisher, &message, ts(0)).unwrap();
    }
    assert_eq!(
        node.publish(&mut publisher, &message, ts(0)),
        Err(PublishError::Enqueue(EnqueueError::QueueFull))
    );
    assert_eq!(publisher.next_transfer_id().into_u8(), 0);
}
